//! `{{path}}` interpolation against the event payload.

use crate::payload::{coerce_string, resolve_path};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::Value;

lazy_static! {
    /// `{{ data.fields.0.value }}`, whitespace inside the braces allowed.
    static ref PLACEHOLDER: Regex = compile(r"\{\{\s*([^{}\s]+)\s*\}\}");
}

#[allow(clippy::expect_used)]
pub(crate) fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("Invalid regex pattern")
}

/// Replace every placeholder with the payload value at its path.
///
/// Paths that are missing or `null` render as the empty string.
pub fn render(template: &str, payload: &Value) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            resolve_path(payload, &caps[1])
                .and_then(coerce_string)
                .unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render() {
        let payload = json!({
            "eventType": "document_signed",
            "data": {"name": "NDA", "fields": [{"value": 500}], "signer": null}
        });
        assert_eq!(
            render("{{data.name}} was {{ eventType }}", &payload),
            "NDA was document_signed"
        );
        assert_eq!(render("Amount: {{data.fields.0.value}}", &payload), "Amount: 500");
        assert_eq!(render("[{{data.signer}}|{{data.nope}}]", &payload), "[|]");
        assert_eq!(render("no placeholders", &payload), "no placeholders");
    }

    #[test]
    fn test_render_ignores_single_braces() {
        let payload = json!({"a": {"b": "x"}, "c": 1});
        assert_eq!(render("{{a.b}} and {{ c }} and {not}", &payload), "x and 1 and {not}");
    }
}
