//! Utility functions shared across the codebase

/// Cut `input` to at most `max` characters, appending `...` when shortened.
pub fn truncate_snippet(input: &str, max: usize) -> String {
    match input.char_indices().nth(max) {
        None => input.to_string(),
        Some((byte_idx, _)) => format!("{}...", &input[..byte_idx]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_snippet() {
        assert_eq!(truncate_snippet("short", 10), "short");
        assert_eq!(truncate_snippet("abcdef", 3), "abc...");
        // multi-byte characters must not be split
        assert_eq!(truncate_snippet("héllo wörld", 4), "héll...");
    }
}
