//! Reason-act action parsing
//!
//! An `[ACTION]` section is either a JSON object `{"tool_name": …,
//! "params": {…}}` or a call-style expression `toolName(k1=v1, k2=v2)`.
//! Anything else is unrecognized and becomes an observation, never an error.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::llm::extract_json_object;
use crate::tools::ToolParams;

/// Result of interpreting one `[ACTION]` section
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedAction {
    Invoke {
        tool_name: String,
        params: ToolParams,
    },
    Unrecognized,
}

fn call_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\w+)\(([^)]*)\)").expect("valid call regex"))
}

/// Parse one action string into a tool invocation
pub fn parse_action(action: &str) -> ParsedAction {
    if let Some(parsed) = parse_json_action(action) {
        return parsed;
    }
    if let Some(parsed) = parse_call_action(action) {
        return parsed;
    }
    ParsedAction::Unrecognized
}

/// JSON form: the first balanced `{…}` with a string `tool_name` field
fn parse_json_action(action: &str) -> Option<ParsedAction> {
    let raw = extract_json_object(action)?;
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;

    let tool_name = object.get("tool_name")?.as_str()?.to_string();
    let params = match object.get("params") {
        Some(Value::Object(map)) => map.clone(),
        _ => ToolParams::new(),
    };

    Some(ParsedAction::Invoke { tool_name, params })
}

/// Call form: `toolName(k1=v1, k2="v2", flag)`. Values lose surrounding
/// quotes; bare tokens without `=` become boolean true.
fn parse_call_action(action: &str) -> Option<ParsedAction> {
    let captures = call_pattern().captures(action.trim())?;
    let tool_name = captures[1].to_string();
    let params = parse_call_params(&captures[2]);
    Some(ParsedAction::Invoke { tool_name, params })
}

fn parse_call_params(params_str: &str) -> ToolParams {
    let mut params = ToolParams::new();
    for part in params_str.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match part.split_once('=') {
            Some((key, value)) => {
                let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
                params.insert(key.trim().to_string(), Value::String(value.to_string()));
            }
            None => {
                params.insert(part.to_string(), Value::Bool(true));
            }
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_action() {
        let parsed = parse_action(
            r#"I should call {"tool_name": "getWeather", "params": {"city": "Uberlândia"}}"#,
        );
        let ParsedAction::Invoke { tool_name, params } = parsed else {
            panic!("expected invoke");
        };
        assert_eq!(tool_name, "getWeather");
        assert_eq!(params["city"], json!("Uberlândia"));
    }

    #[test]
    fn test_json_action_without_params_object() {
        let parsed = parse_action(r#"{"tool_name": "listCapabilities"}"#);
        let ParsedAction::Invoke { tool_name, params } = parsed else {
            panic!("expected invoke");
        };
        assert_eq!(tool_name, "listCapabilities");
        assert!(params.is_empty());
    }

    #[test]
    fn test_call_action_with_quoted_values() {
        let parsed = parse_action(r#"sendEmail(subject="Meeting", recipient='bob')"#);
        let ParsedAction::Invoke { tool_name, params } = parsed else {
            panic!("expected invoke");
        };
        assert_eq!(tool_name, "sendEmail");
        assert_eq!(params["subject"], json!("Meeting"));
        assert_eq!(params["recipient"], json!("bob"));
    }

    #[test]
    fn test_call_action_bare_token_is_true() {
        let parsed = parse_action("getWeather(city=Uberlândia, verbose)");
        let ParsedAction::Invoke { params, .. } = parsed else {
            panic!("expected invoke");
        };
        assert_eq!(params["city"], json!("Uberlândia"));
        assert_eq!(params["verbose"], json!(true));
    }

    #[test]
    fn test_free_text_is_unrecognized() {
        assert_eq!(
            parse_action("I should look this up"),
            ParsedAction::Unrecognized
        );
    }

    #[test]
    fn test_json_and_call_forms_dispatch_identically() {
        let from_json =
            parse_action(r#"{"tool_name": "getWeather", "params": {"city": "Uberlândia"}}"#);
        let from_call = parse_action(r#"getWeather(city="Uberlândia")"#);
        assert_eq!(from_json, from_call);
    }
}
