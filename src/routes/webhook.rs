// ABOUTME: Lead intake webhook receiving form submissions from the public website
// ABOUTME: Shared-secret gated, maps form fields to a lead by name heuristics
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Scoutline Sports

//! Lead intake webhook.
//!
//! The website's form plugin POSTs every submission here. The shared
//! secret is checked before anything else, then the submission is
//! rate-limited per source IP. Field names vary per form and language, so
//! name, email, phone, and sport are extracted by header-name heuristics
//! over the `{ field_id: { name, value } }` map; the full raw map is
//! stored alongside for later re-processing.

use crate::auth::{client_ip, verify_webhook_secret};
use crate::database::{form_source_label, NewLead};
use crate::errors::AppError;
use crate::server::ServerResources;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use tracing::info;

static PHONE_FIELD: OnceLock<Option<Regex>> = OnceLock::new();

/// Request body as sent by the form plugin
#[derive(Debug, Deserialize)]
pub struct LeadIntakeRequest {
    /// Form identifier; the plugin sends it as a string or a number
    pub form_id: Option<serde_json::Value>,
    /// Submitted fields keyed by field id: `{ id: { name, value } }`
    pub fields: Option<serde_json::Value>,
    /// Referring scout's tracking code
    #[serde(default)]
    pub scout_ref: Option<String>,
    /// Shared secret when the plugin cannot set headers
    #[serde(default)]
    pub secret: Option<String>,
}

/// Response body after a stored submission
#[derive(Debug, Serialize, Deserialize)]
pub struct LeadIntakeResponse {
    /// Always `true` on a 200
    pub success: bool,
    /// Generated lead ID
    pub lead_id: String,
}

/// Webhook routes handler
pub struct WebhookRoutes;

impl WebhookRoutes {
    /// Create the lead intake route
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/webhook/lead-intake", post(Self::lead_intake))
            .with_state(resources)
    }

    async fn lead_intake(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<LeadIntakeRequest>,
    ) -> Result<Json<LeadIntakeResponse>, AppError> {
        // Secret first, rate limit second: an attacker without the secret
        // never consumes another caller's window.
        let header_secret = headers
            .get("x-webhook-secret")
            .and_then(|v| v.to_str().ok());
        verify_webhook_secret(
            resources.config.webhook.shared_secret.as_deref(),
            header_secret.or(request.secret.as_deref()),
        )?;

        resources.limits.webhook.require(&client_ip(&headers))?;

        let form_id = request
            .form_id
            .as_ref()
            .map(form_id_string)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::invalid_input("Missing form_id"))?;
        let fields = request
            .fields
            .as_ref()
            .and_then(serde_json::Value::as_object)
            .ok_or_else(|| AppError::invalid_input("Missing fields"))?;

        let values = field_values(fields);
        let lead = build_lead(&form_id, &values, request.scout_ref.as_deref());

        let lead_id = resources.database.leads().insert_lead(&lead).await?;

        info!(form_source = %lead.form_source, lead_id = %lead_id, "website lead stored");

        Ok(Json(LeadIntakeResponse {
            success: true,
            lead_id,
        }))
    }
}

/// Normalize the plugin's string-or-number form id
fn form_id_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.trim().to_owned(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// Flatten `{ id: { name, value } }` into a name → value map, dropping
/// entries missing either part
fn field_values(fields: &serde_json::Map<String, serde_json::Value>) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    for field in fields.values() {
        let name = field.get("name").and_then(serde_json::Value::as_str);
        let value = field.get("value").and_then(serde_json::Value::as_str);
        if let (Some(name), Some(value)) = (name, value) {
            if !name.is_empty() && !value.is_empty() {
                values.insert(name.to_owned(), value.to_owned());
            }
        }
    }
    values
}

/// Map the flattened field values onto a lead by field-name heuristics.
///
/// German and English label variants are checked explicitly; a combined
/// "Name" field is split on the first space. Phone field labels vary the
/// most (e.g. "Telefon/WhatsApp #"), so any label containing
/// telefon/phone matches, case-insensitively.
fn build_lead(form_id: &str, values: &BTreeMap<String, String>, scout_ref: Option<&str>) -> NewLead {
    let combined_name = values.get("Name").map(String::as_str).unwrap_or_default();
    let first_name = values
        .get("Vorname")
        .or_else(|| values.get("First Name"))
        .map_or_else(
            || combined_name.split_whitespace().next().unwrap_or_default().to_owned(),
            Clone::clone,
        );
    let last_name = values
        .get("Nachname")
        .or_else(|| values.get("Last Name"))
        .map_or_else(
            || {
                combined_name
                    .split_whitespace()
                    .skip(1)
                    .collect::<Vec<_>>()
                    .join(" ")
            },
            Clone::clone,
        );

    let email = values
        .get("Email")
        .or_else(|| values.get("E-Mail"))
        .or_else(|| values.get("E-mail"))
        .cloned();

    let phone_regex = PHONE_FIELD
        .get_or_init(|| Regex::new(r"(?i)telefon|phone").ok())
        .as_ref();
    let phone = phone_regex.and_then(|re| {
        values
            .iter()
            .find(|(name, _)| re.is_match(name))
            .map(|(_, value)| value.clone())
    });

    let sport = values
        .get("Sportart")
        .or_else(|| values.get("Sport"))
        .cloned();

    NewLead {
        form_source: form_source_label(form_id),
        first_name,
        last_name,
        email,
        phone,
        sport,
        scout_ref: scout_ref
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned),
        raw_fields: serde_json::to_value(values).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_build_lead_german_labels() {
        let lead = build_lead(
            "1260",
            &values(&[
                ("Vorname", "Max"),
                ("Nachname", "Müller"),
                ("E-Mail", "max@example.de"),
                ("Telefon/WhatsApp #", "+49 170 1234567"),
                ("Sportart", "Fußball"),
            ]),
            Some("SCOUT-7"),
        );

        assert_eq!(lead.form_source, "sportstipendium");
        assert_eq!(lead.first_name, "Max");
        assert_eq!(lead.last_name, "Müller");
        assert_eq!(lead.email.as_deref(), Some("max@example.de"));
        assert_eq!(lead.phone.as_deref(), Some("+49 170 1234567"));
        assert_eq!(lead.sport.as_deref(), Some("Fußball"));
        assert_eq!(lead.scout_ref.as_deref(), Some("SCOUT-7"));
    }

    #[test]
    fn test_build_lead_splits_combined_name() {
        let lead = build_lead(
            "6861",
            &values(&[("Name", "Ana Maria Costa"), ("Email", "ana@example.com")]),
            None,
        );

        assert_eq!(lead.first_name, "Ana");
        assert_eq!(lead.last_name, "Maria Costa");
        assert_eq!(lead.form_source, "sportstipendium_en");
    }

    #[test]
    fn test_build_lead_phone_heuristic_is_case_insensitive() {
        let lead = build_lead(
            "5187",
            &values(&[("PHONE NUMBER", "555-0100")]),
            None,
        );
        assert_eq!(lead.phone.as_deref(), Some("555-0100"));
    }

    #[test]
    fn test_build_lead_tolerates_empty_submission() {
        let lead = build_lead("9999", &BTreeMap::new(), None);

        assert_eq!(lead.form_source, "form_9999");
        assert!(lead.first_name.is_empty());
        assert!(lead.last_name.is_empty());
        assert!(lead.email.is_none());
        assert!(lead.scout_ref.is_none());
    }

    #[test]
    fn test_field_values_drops_incomplete_entries() {
        let fields = serde_json::json!({
            "1": { "name": "Vorname", "value": "Max" },
            "2": { "name": "Nachname" },
            "3": { "value": "orphan" },
            "4": { "name": "", "value": "x" }
        });
        let map = field_values(fields.as_object().unwrap());

        assert_eq!(map.len(), 1);
        assert_eq!(map.get("Vorname").map(String::as_str), Some("Max"));
    }

    #[test]
    fn test_form_id_accepts_number_or_string() {
        assert_eq!(form_id_string(&serde_json::json!("1260")), "1260");
        assert_eq!(form_id_string(&serde_json::json!(1260)), "1260");
        assert_eq!(form_id_string(&serde_json::json!(["x"])), "");
    }
}
