use serde::de::DeserializeOwned;

/// Truncate a string to at most `max_bytes` bytes at a character boundary.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    &s[..end]
}

/// Strip markdown code fences from a model reply.
pub fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```JSON")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Parse a JSON reply, fenced or not. `None` when it is not the expected shape.
pub fn parse_json_reply<T: DeserializeOwned>(response: &str) -> Option<T> {
    match serde_json::from_str(strip_code_blocks(response)) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!("Unparseable AI reply: {}", e);
            None
        }
    }
}
