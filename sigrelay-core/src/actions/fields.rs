//! Field-mapping driven sync: document tokens → CRM fields.

use crate::entities::field_mappings::FieldMapping;
use crate::payload::field_values;
use lazy_static::lazy_static;
use super::template::compile;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;

lazy_static! {
    static ref TOKEN_DELIMITERS: Regex = compile(r"[\[\]{}]");
}

/// Normalize a token name: strip `[[ ]]`, `[ ]` and `{{ }}`, trim, lowercase.
pub fn clean_token(token: &str) -> String {
    TOKEN_DELIMITERS
        .replace_all(token, "")
        .trim()
        .to_lowercase()
}

/// Build the single bulk update for `module`.
///
/// Every active mapping of the module whose cleaned token has a non-null
/// value in the payload contributes `source_field: value`. With `only`,
/// mappings are further restricted to the listed tokens.
pub fn sync_update(
    mappings: &[FieldMapping],
    module: &str,
    payload: &Value,
    only: Option<&[String]>,
) -> Map<String, Value> {
    let values = field_values(payload);
    let allowed: Option<HashSet<String>> =
        only.map(|tokens| tokens.iter().map(|t| clean_token(t)).collect());

    let mut update = Map::new();
    for mapping in mappings
        .iter()
        .filter(|m| m.active && m.source_module.eq_ignore_ascii_case(module))
    {
        let token = clean_token(&mapping.token);
        if allowed.as_ref().is_some_and(|set| !set.contains(&token)) {
            continue;
        }
        match values.get(&token) {
            Some(Value::Null) | None => {}
            Some(value) => {
                update.insert(mapping.source_field.clone(), value.clone());
            }
        }
    }
    update
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn mapping(module: &str, field: &str, token: &str) -> FieldMapping {
        FieldMapping {
            id: Uuid::new_v4(),
            tenant_id: "t1".to_string(),
            source_module: module.to_string(),
            source_field: field.to_string(),
            token: token.to_string(),
            active: true,
        }
    }

    #[test]
    fn test_clean_token() {
        assert_eq!(clean_token("[[Customer_Name]]"), "customer_name");
        assert_eq!(clean_token("[Amount]"), "amount");
        assert_eq!(clean_token("{{ Close Date }}"), "close date");
        assert_eq!(clean_token("plain"), "plain");
    }

    #[test]
    fn test_bracketed_token_matches_case_insensitively() {
        let payload = json!({"data": {"fields": [
            {"merge_field": "Customer_Name", "value": "Ada Lovelace"}
        ]}});
        let mappings = [mapping("Opportunities", "customer_c", "[[Customer_Name]]")];
        let update = sync_update(&mappings, "Opportunities", &payload, None);
        assert_eq!(update.get("customer_c"), Some(&json!("Ada Lovelace")));
    }

    #[test]
    fn test_module_and_token_filters() {
        let payload = json!({"data": {"fields": [
            {"name": "amount", "value": "500"},
            {"name": "term", "value": "12"},
            {"name": "empty", "value": null}
        ]}});
        let mappings = [
            mapping("Opportunities", "amount_c", "amount"),
            mapping("opportunities", "term_c", "[term]"),
            mapping("Accounts", "amount_c", "amount"),
            mapping("Opportunities", "empty_c", "empty"),
            mapping("Opportunities", "missing_c", "missing"),
        ];

        let all = sync_update(&mappings, "Opportunities", &payload, None);
        assert_eq!(all.len(), 2);
        assert_eq!(all["amount_c"], json!("500"));
        assert_eq!(all["term_c"], json!("12"));

        let only = vec!["[[TERM]]".to_string()];
        let some = sync_update(&mappings, "Opportunities", &payload, Some(&only));
        assert_eq!(some.len(), 1);
        assert!(some.contains_key("term_c"));

        assert!(sync_update(&mappings, "Contacts", &payload, None).is_empty());
    }
}
