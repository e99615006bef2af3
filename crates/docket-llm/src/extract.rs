//! Pulls the structured payload out of free-text backend output.
//!
//! The backend is asked for JSON but replies in prose, so the payload is the
//! first balanced `{...}` span. Braces inside string literals do not count.

use serde::de::DeserializeOwned;

use docket_core::errors::GenerationError;

/// Return the first balanced JSON-object span in `text`.
pub fn extract_object(text: &str) -> Result<&str, GenerationError> {
    let start = text
        .find('{')
        .ok_or_else(|| GenerationError::Parse("no JSON object found in response".into()))?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth -= 1;
                if depth == 0 {
                    if ch != '}' {
                        break;
                    }
                    return Ok(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    Err(GenerationError::Parse("unbalanced JSON object in response".into()))
}

/// Extract and deserialize the payload. Shape mismatches are parse errors too.
pub fn parse_payload<T: DeserializeOwned>(text: &str) -> Result<T, GenerationError> {
    let span = extract_object(text)?;
    serde_json::from_str(span).map_err(|e| GenerationError::Parse(format!("invalid payload: {e}")))
}
