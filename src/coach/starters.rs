// ABOUTME: Conversation starter suggestions derived from a scout's pipeline state
// ABOUTME: Picks three opening prompts for new, active, and successful scouts
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Scoutline Sports

use serde::{Deserialize, Serialize};

use crate::models::ScoutFacts;

/// Tenure below which a scout with no referrals is treated as brand new
const NEW_SCOUT_TENURE_DAYS: i64 = 7;

/// A suggested opening prompt shown above the chat input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Starter {
    pub emoji: String,
    pub text: String,
}

impl Starter {
    fn new(emoji: &str, text: &str) -> Self {
        Self {
            emoji: emoji.to_owned(),
            text: text.to_owned(),
        }
    }
}

/// Choose three starter prompts from the scout's pipeline state.
///
/// Brand-new scouts (no referrals, joined under a week ago) get onboarding
/// questions, scouts with a placement get growth questions, everyone else
/// gets pipeline questions.
#[must_use]
pub fn starters_for(facts: &ScoutFacts) -> Vec<Starter> {
    if facts.referred_athletes == 0 && facts.tenure_days < NEW_SCOUT_TENURE_DAYS {
        return vec![
            Starter::new("👋", "How does scouting work?"),
            Starter::new("🎯", "What's my first step as a scout?"),
            Starter::new("💰", "How do I earn commissions?"),
        ];
    }

    if facts.placed_athletes > 0 {
        return vec![
            Starter::new("📋", "Quick eligibility recap"),
            Starter::new("⭐", "How do showcases work?"),
            Starter::new("💸", "Commission payout timeline"),
        ];
    }

    vec![
        Starter::new("💬", "Tips for talking to parents"),
        Starter::new("📅", "Recruiting timeline overview"),
        Starter::new("🔍", "How to find more athletes"),
    ]
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_new_scout_gets_onboarding_starters() {
        let facts = ScoutFacts {
            tenure_days: 2,
            referred_athletes: 0,
            ..ScoutFacts::default()
        };

        let starters = starters_for(&facts);
        assert_eq!(starters.len(), 3);
        assert_eq!(starters[0].text, "How does scouting work?");
    }

    #[test]
    fn test_scout_with_placement_gets_growth_starters() {
        let facts = ScoutFacts {
            tenure_days: 120,
            referred_athletes: 5,
            placed_athletes: 1,
            ..ScoutFacts::default()
        };

        let starters = starters_for(&facts);
        assert_eq!(starters[0].text, "Quick eligibility recap");
    }

    #[test]
    fn test_active_scout_gets_pipeline_starters() {
        let facts = ScoutFacts {
            tenure_days: 30,
            referred_athletes: 3,
            placed_athletes: 0,
            ..ScoutFacts::default()
        };

        let starters = starters_for(&facts);
        assert_eq!(starters[0].text, "Tips for talking to parents");
    }

    #[test]
    fn test_old_scout_without_referrals_is_not_new() {
        // Past the first week the onboarding set no longer applies even
        // with zero referrals.
        let facts = ScoutFacts {
            tenure_days: 30,
            referred_athletes: 0,
            ..ScoutFacts::default()
        };

        let starters = starters_for(&facts);
        assert_eq!(starters[0].text, "Tips for talking to parents");
    }
}
