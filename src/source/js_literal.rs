//! Parsing of `var name = <json>;` source files.

use serde_json::{Map, Value};

use super::RecordError;

const DECLARATION_KEYWORDS: [&str; 3] = ["var", "let", "const"];

/// Parse a single JS variable declaration whose initializer is a JSON literal.
///
/// Returns a map with exactly one entry: the variable name mapped to its value.
pub fn parse_js_literal(text: &str) -> Result<Map<String, Value>, RecordError> {
    let (lhs, rhs) = text.split_once('=').ok_or(RecordError::NotAnAssignment)?;

    let mut name = lhs.trim();
    for keyword in DECLARATION_KEYWORDS {
        if let Some(rest) = name.strip_prefix(keyword) {
            if rest.starts_with(char::is_whitespace) {
                name = rest.trim_start();
                break;
            }
        }
    }
    if name.is_empty() || DECLARATION_KEYWORDS.contains(&name) {
        return Err(RecordError::MissingName);
    }

    let body = rhs.trim();
    let body = body.strip_suffix(';').unwrap_or(body).trim_end();
    let value: Value = serde_json::from_str(body).map_err(|source| RecordError::InvalidJson {
        name: name.to_string(),
        source,
    })?;

    let mut map = Map::new();
    map.insert(name.to_string(), value);
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_preserves_types() {
        let js = r#"var myvar = {"key": "value", "sub_dict": {"number_one": 1, "truedat": true}};"#;

        let parsed = parse_js_literal(js).unwrap();
        assert_eq!(parsed.len(), 1);

        let myvar = &parsed["myvar"];
        assert_eq!(myvar["key"], Value::String("value".to_string()));
        assert_eq!(myvar["sub_dict"]["number_one"].as_i64(), Some(1));
        assert_eq!(myvar["sub_dict"]["truedat"], Value::Bool(true));
    }

    #[test]
    fn test_parse_without_semicolon() {
        let parsed = parse_js_literal("var topics = [1, 2, 3]").unwrap();
        assert_eq!(parsed["topics"].as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn test_parse_keeps_equals_inside_value() {
        let parsed = parse_js_literal(r#"const content = [{"formula": "a = b"}];"#).unwrap();
        assert_eq!(parsed["content"][0]["formula"], "a = b");
    }

    #[test]
    fn test_name_starting_with_keyword_is_kept() {
        let parsed = parse_js_literal("variance = 3;").unwrap();
        assert!(parsed.contains_key("variance"));
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            parse_js_literal("no assignment here"),
            Err(RecordError::NotAnAssignment)
        ));
        assert!(matches!(
            parse_js_literal("var = {}"),
            Err(RecordError::MissingName)
        ));
        assert!(matches!(
            parse_js_literal("var x = {not json};"),
            Err(RecordError::InvalidJson { .. })
        ));
    }
}
