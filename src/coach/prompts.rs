// ABOUTME: Prompt templates for the Scout Coach assistant loaded at compile time
// ABOUTME: Renders the system instruction with per-scout facts plus the one-shot task prompts
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Scoutline Sports

//! # Coach Prompts
//!
//! The system instruction is assembled from three parts: a persona/safety
//! header, an interpolated per-scout context block, and the static knowledge
//! corpus embedded at compile time from `knowledge.md`.

use crate::models::ScoutFacts;

/// Static scouting knowledge corpus appended verbatim to every system prompt
pub const KNOWLEDGE_BASE: &str = include_str!("knowledge.md");

/// Fixed assistant turn inserted after the system instruction so the model
/// enters the conversation already committed to the persona.
pub const ACKNOWLEDGEMENT: &str = "Understood. I am the Scout Coach. I will help this scout with \
     their questions about scouting, recruiting, and Scoutline.";

/// Placeholder used when the scout has not filled in a display name
const NAME_PLACEHOLDER: &str = "Scout";

/// Render the full system instruction for a coach chat request.
///
/// The scout context block is always present; missing profile data shows up
/// as neutral values rather than being omitted, so the model never has to
/// guess whether a fact is unknown or zero.
#[must_use]
pub fn render_system_prompt(facts: &ScoutFacts) -> String {
    let name = if facts.display_name.trim().is_empty() {
        NAME_PLACEHOLDER
    } else {
        facts.display_name.trim()
    };
    let profile_line = if facts.profile_complete {
        "Yes"
    } else {
        "No — encourage them to complete it"
    };
    let verified_line = if facts.verified { "Yes" } else { "Not yet" };

    format!(
        "You are the Scout Coach — a friendly, knowledgeable AI assistant embedded in the \
         Scoutline Scout Portal.\n\
         \n\
         IDENTITY & TONE:\n\
         - You are motivational, concise, and supportive\n\
         - Use the scout's first name when natural\n\
         - Keep responses under 200 words unless the question requires more detail\n\
         - Use bullet points and short paragraphs for readability\n\
         - Respond in the same language the scout writes in (German if they write German, \
         English if English, etc.)\n\
         - Be encouraging but honest — don't overpromise\n\
         \n\
         SAFETY RULES:\n\
         - NEVER share specific pricing, fees, or commission rates — direct them to \
         scoutlinesports.com or the Scoutline team\n\
         - NEVER give legal or immigration advice — say \"consult the Scoutline team or an \
         immigration professional\"\n\
         - NEVER share other scouts' data or personal information\n\
         - If you don't know something specific, say so honestly and suggest who to ask\n\
         - Stay on topic: scouting, recruiting, athletes, Scoutline. Redirect off-topic \
         questions politely.\n\
         \n\
         SCOUT CONTEXT:\n\
         - Name: {name}\n\
         - Member since: {tenure} days ago\n\
         - Total leads referred: {referred}\n\
         - Signed athletes: {signed}\n\
         - Placed athletes: {placed}\n\
         - Total commission earned: €{total_commission:.0}\n\
         - Commission paid out: €{paid_commission:.0}\n\
         - Profile complete: {profile_line}\n\
         - Verified: {verified_line}\n\
         \n\
         KNOWLEDGE BASE:\n\
         {knowledge}",
        name = name,
        tenure = facts.tenure_days,
        referred = facts.referred_athletes,
        signed = facts.signed_athletes,
        placed = facts.placed_athletes,
        total_commission = facts.total_commission_eur,
        paid_commission = facts.paid_commission_eur,
        profile_line = profile_line,
        verified_line = verified_line,
        knowledge = KNOWLEDGE_BASE,
    )
}

/// Render the one-shot feedback triage prompt.
///
/// The model is asked for a single JSON object; the caller extracts it with
/// a lenient span match, so instruction-following failures degrade instead
/// of erroring.
#[must_use]
pub fn feedback_prompt(message: &str, page: Option<&str>) -> String {
    format!(
        "Summarize this user feedback in ONE line (max 15 words).\n\
         Classify as: Bug | Feature | Question | Other\n\
         \n\
         If the feedback is too vague to understand, return type \"Unclear\" and include a \
         clarifyingQuestion.\n\
         \n\
         Feedback: \"{message}\"\n\
         Page: {page}\n\
         \n\
         Return ONLY valid JSON: {{ \"summary\": \"...\", \"type\": \
         \"Bug|Feature|Question|Other|Unclear\", \"clarifyingQuestion\": \"optional - only if \
         Unclear\" }}",
        message = message,
        page = page.unwrap_or("Scout Portal"),
    )
}

/// One-shot CV extraction prompt sent alongside the inline PDF part
pub const CV_EXTRACTION_PROMPT: &str = "Extract profile information from this CV/resume. Return ONLY a JSON object with these \
     fields (omit any field not confidently found):\n\
     \n\
     - \"bio\": Professional summary in 2-4 sentences, English, max 300 characters\n\
     - \"education\": Degree and institution (e.g., \"B.S. Sports Science, University of \
     Cologne\")\n\
     - \"achievements\": Notable sports or professional achievements, max 300 characters\n\
     - \"sport\": Primary sport mentioned\n\
     - \"linkedin_url\": LinkedIn profile URL if present in contact/header section\n\
     - \"instagram_url\": Instagram profile URL if present in contact/header section\n\
     \n\
     Return ONLY valid JSON, no markdown, no explanation. Example:\n\
     {\"bio\": \"...\", \"education\": \"...\", \"sport\": \"Soccer\"}";

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn sample_facts() -> ScoutFacts {
        ScoutFacts {
            display_name: "Lena Fischer".to_owned(),
            tenure_days: 42,
            referred_athletes: 7,
            placed_athletes: 2,
            signed_athletes: 4,
            total_commission_eur: 1500.75,
            paid_commission_eur: 500.25,
            profile_complete: true,
            verified: true,
        }
    }

    #[test]
    fn test_system_prompt_interpolates_facts() {
        let prompt = render_system_prompt(&sample_facts());

        assert!(prompt.contains("- Name: Lena Fischer"));
        assert!(prompt.contains("- Member since: 42 days ago"));
        assert!(prompt.contains("- Total leads referred: 7"));
        assert!(prompt.contains("- Signed athletes: 4"));
        assert!(prompt.contains("- Placed athletes: 2"));
        assert!(prompt.contains("- Total commission earned: €1501"));
        assert!(prompt.contains("- Commission paid out: €500"));
        assert!(prompt.contains("- Profile complete: Yes"));
        assert!(prompt.contains("- Verified: Yes"));
    }

    #[test]
    fn test_system_prompt_defaults_for_empty_profile() {
        let prompt = render_system_prompt(&ScoutFacts::default());

        assert!(prompt.contains("- Name: Scout"));
        assert!(prompt.contains("- Member since: 0 days ago"));
        assert!(prompt.contains("- Total commission earned: €0"));
        assert!(prompt.contains("- Profile complete: No — encourage them to complete it"));
        assert!(prompt.contains("- Verified: Not yet"));
    }

    #[test]
    fn test_system_prompt_embeds_knowledge_base() {
        let prompt = render_system_prompt(&ScoutFacts::default());

        assert!(prompt.contains("KNOWLEDGE BASE:"));
        assert!(prompt.contains("WHAT IS SCOUTLINE SPORTS"));
        assert!(prompt.contains("COMMISSION STRUCTURE"));
    }

    #[test]
    fn test_feedback_prompt_includes_message_and_page() {
        let prompt = feedback_prompt("The leads table won't load", Some("Leads"));

        assert!(prompt.contains("Feedback: \"The leads table won't load\""));
        assert!(prompt.contains("Page: Leads"));
    }

    #[test]
    fn test_feedback_prompt_defaults_page() {
        let prompt = feedback_prompt("something broke", None);

        assert!(prompt.contains("Page: Scout Portal"));
    }

    #[test]
    fn test_cv_prompt_lists_allowed_fields() {
        for field in [
            "bio",
            "education",
            "achievements",
            "sport",
            "linkedin_url",
            "instagram_url",
        ] {
            assert!(
                CV_EXTRACTION_PROMPT.contains(field),
                "prompt should mention {field}"
            );
        }
    }
}
