//! Core data transfer types: profiles, tools, messages, and the normalized
//! completion result that downstream collaborators consume.

pub mod message;
pub mod profile;
pub mod tool;

pub use message::{CompletionRequest, CompletionResponse, Message, Role, ToolCall, Usage};
pub use profile::ProfileOptions;
pub use tool::{Property, SystemTool, Tool, ToolFunction, ToolParameters};

/// Comma-join the serialized form used both for persistence columns and for
/// length ceilings on list-valued profile fields.
pub fn comma_joined(parts: &[String]) -> String {
    parts.join(",")
}

/// Inverse of [`comma_joined`]; empty input yields an empty list.
pub fn comma_split(joined: &str) -> Vec<String> {
    if joined.is_empty() {
        return Vec::new();
    }
    joined.split(',').map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comma_round_trip() {
        let parts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(comma_split(&comma_joined(&parts)), parts);
        assert!(comma_split("").is_empty());
    }
}
