//! Recovers strict JSON from an object literal embedded in program source.
//!
//! The normalization is plain text rewriting, not a parser. Keys are quoted
//! wherever `{` or `,` is followed by `identifier:`, which also matches inside
//! string values that contain that shape and rewrites them. Catalogs are
//! expected to avoid `, word:` inside strings.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::error::AtlasError;

static UNQUOTED_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([,{]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:").unwrap());
static SINGLE_QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'([^'\\]*(?:\\.[^'\\]*)*)'").unwrap());
static TRAILING_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",\s*([}\]])").unwrap());

/// Locates the object literal that follows `marker` in `text` and parses it.
pub fn parse_embedded_literal(text: &str, marker: &str) -> Result<Value, AtlasError> {
    let object = extract_object(text, marker)?;
    let normalized = normalize_literal(object);
    serde_json::from_str(&normalized).map_err(|err| AtlasError::CatalogParse(err.to_string()))
}

/// Returns the slice from the first `{` after `marker` to its matching `}`.
pub fn extract_object<'a>(text: &'a str, marker: &str) -> Result<&'a str, AtlasError> {
    let start = text
        .find(marker)
        .ok_or_else(|| AtlasError::LiteralMarkerMissing(marker.to_string()))?;
    let after_marker = start + marker.len();
    let open = text[after_marker..]
        .find('{')
        .map(|offset| after_marker + offset)
        .ok_or_else(|| AtlasError::LiteralUnbalanced(marker.to_string()))?;

    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (offset, ch) in text[open..].char_indices() {
        if let Some(active) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == active {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' | '`' => quote = Some(ch),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&text[open..open + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    Err(AtlasError::LiteralUnbalanced(marker.to_string()))
}

/// Rewrites a JavaScript-style object literal into JSON text.
pub fn normalize_literal(object: &str) -> String {
    let keyed = UNQUOTED_KEY.replace_all(object, "$1\"$2\":");
    let quoted = SINGLE_QUOTED.replace_all(&keyed, |caps: &Captures<'_>| {
        format!("\"{}\"", requote(&caps[1]))
    });
    TRAILING_COMMA.replace_all(&quoted, "$1").into_owned()
}

fn requote(body: &str) -> String {
    let mut out = String::with_capacity(body.len() + 2);
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some('\'') => out.push('\''),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            },
            '"' => out.push_str("\\\""),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    const MARKER: &str = "const sectionOrganisms";

    #[test]
    fn parses_minimal_catalog() {
        let text = "const sectionOrganisms = { animals: [{scientific: 'Panthera leo'}] };";
        let value = parse_embedded_literal(text, MARKER).unwrap();
        assert_eq!(value, json!({"animals": [{"scientific": "Panthera leo"}]}));
    }

    #[test]
    fn strips_trailing_commas() {
        let text = r#"
            // generated by hand
            const sectionOrganisms = {
              plants: [
                { scientific: 'Quercus robur', common: 'English oak', },
              ],
              fungi: [],
            };
            export default sectionOrganisms;
        "#;
        let value = parse_embedded_literal(text, MARKER).unwrap();
        assert_eq!(
            value,
            json!({
                "plants": [{"scientific": "Quercus robur", "common": "English oak"}],
                "fungi": []
            })
        );
    }

    #[test]
    fn converts_escaped_and_embedded_quotes() {
        let text = r#"const sectionOrganisms = { animals: [{ scientific: 'Vulpes vulpes', note: 'the fox\'s "red" coat' }] };"#;
        let value = parse_embedded_literal(text, MARKER).unwrap();
        assert_eq!(value["animals"][0]["note"], json!("the fox's \"red\" coat"));
    }

    #[test]
    fn ignores_braces_inside_strings() {
        let text = "const sectionOrganisms = { animals: [{ scientific: 'A}b' }] }; const other = { x: 1 };";
        let object = extract_object(text, MARKER).unwrap();
        assert_eq!(object, "{ animals: [{ scientific: 'A}b' }] }");
    }

    #[test]
    fn missing_marker_is_an_error() {
        let err = parse_embedded_literal("const other = {};", MARKER).unwrap_err();
        assert_matches!(err, AtlasError::LiteralMarkerMissing(_));
    }

    #[test]
    fn unbalanced_literal_is_an_error() {
        let err = parse_embedded_literal("const sectionOrganisms = { animals: [", MARKER).unwrap_err();
        assert_matches!(err, AtlasError::LiteralUnbalanced(_));
    }

    #[test]
    fn key_shape_inside_string_is_rewritten() {
        let text = "const sectionOrganisms = { animals: [{ scientific: 'Canis lupus', note: 'pack, size: large' }] };";
        let value = parse_embedded_literal(text, MARKER).unwrap();
        assert_eq!(value["animals"][0]["note"], json!("pack, \"size\": large"));
    }

    #[test]
    fn invalid_json_after_normalization_is_an_error() {
        let text = "const sectionOrganisms = { animals: [{ scientific: 'Canis lupus', size: large }] };";
        let err = parse_embedded_literal(text, MARKER).unwrap_err();
        assert_matches!(err, AtlasError::CatalogParse(_));
    }
}
