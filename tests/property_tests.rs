//! Property tests for parameter validation and message flattening.

use gsgmail_connector::utils::{map_email_details, parse_ids, validate_integer};
use gsgmail_connector::{describe, RemoteError};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

fn arb_header_name() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("Subject"),
        Just("SUBJECT"),
        Just("Delivered-To"),
        Just("From"),
        Just("to"),
        Just("Message-ID"),
        Just("Received"),
        Just("X-Mailer"),
    ]
}

fn arb_headers() -> impl Strategy<Value = Vec<(&'static str, String)>> {
    prop::collection::vec(
        (arb_header_name(), "[a-zA-Z0-9 @.<>]{0,20}"),
        0..12,
    )
}

proptest! {
    /// Any non-negative integer, as number or string, validates to itself
    #[test]
    fn proptest_valid_integers_round_trip(n in 1u64..=u32::MAX as u64, as_string in any::<bool>()) {
        let value = if as_string { json!(n.to_string()) } else { json!(n) };
        prop_assert_eq!(validate_integer(&value, "max_results", false).ok(), Some(n));
    }

    /// Negative integers are always rejected, zero allowed or not
    #[test]
    fn proptest_negative_integers_rejected(n in i64::MIN..0, allow_zero in any::<bool>()) {
        let err = validate_integer(&json!(n), "max_items", allow_zero).unwrap_err();
        prop_assert!(err.to_string().contains("non-negative"));
    }

    /// Non-integral numbers never validate
    #[test]
    fn proptest_fractions_rejected(whole in 0u32..10_000, frac in 1u32..100) {
        let value = json!(whole as f64 + frac as f64 / 100.0);
        prop_assert!(validate_integer(&value, "max_results", true).is_err());
    }

    /// Each promoted header takes the value of its first occurrence
    #[test]
    fn proptest_first_header_occurrence_wins(headers in arb_headers()) {
        let header_values: Vec<Value> = headers
            .iter()
            .map(|(name, value)| json!({ "name": name, "value": value }))
            .collect();
        let message = json!({ "id": "m1", "payload": { "headers": header_values } });
        let mapped = map_email_details(message.as_object().cloned().unwrap_or_default());

        prop_assert!(!mapped.contains_key("payload"));
        prop_assert_eq!(&mapped["id"], "m1");

        for wanted in ["subject", "delivered-to", "from", "to", "message-id"] {
            let key = wanted.replace('-', "_");
            let first = headers
                .iter()
                .find(|(name, _)| name.to_lowercase() == wanted)
                .map(|(_, value)| Value::String(value.clone()));
            prop_assert_eq!(mapped.get(&key).cloned(), first);
        }

        let known = ["id", "subject", "delivered_to", "from", "to", "message_id"];
        prop_assert!(mapped.keys().all(|k| known.contains(&k.as_str())));
    }

    /// Parsed ids are trimmed and never empty
    #[test]
    fn proptest_parse_ids_clean(raw in "[a-f0-9 ,]{0,40}") {
        for id in parse_ids(&raw) {
            prop_assert!(!id.is_empty());
            prop_assert_eq!(id.trim(), id.as_str());
            prop_assert!(!id.contains(','));
        }
    }

    /// Normalized errors never carry an empty code or message
    #[test]
    fn proptest_describe_never_empty(status in 400u16..600, body in ".{0,40}") {
        let desc = describe(&RemoteError::Api { status, body });
        prop_assert!(!desc.code.trim().is_empty());
        prop_assert!(!desc.message.trim().is_empty());
    }
}

#[test]
fn test_empty_header_list_keeps_message() {
    let message: Map<String, Value> = json!({ "id": "m1", "payload": { "headers": [] } })
        .as_object()
        .cloned()
        .unwrap_or_default();
    let mapped = map_email_details(message);
    assert_eq!(mapped.len(), 1);
}
