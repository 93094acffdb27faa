//! LLM-backed workflow generators.
//!
//! Contains concrete implementations of the
//! [`WorkflowGenerator`](flowforge_core::generator::WorkflowGenerator) trait,
//! plus the helper that pulls the workflow JSON out of free-form model text.

pub mod anthropic;

use secrecy::SecretString;

pub use anthropic::AnthropicGenerator;

/// Environment variable holding the Anthropic API key.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Read the Anthropic API key from the environment. Empty values count as unset.
pub fn api_key_from_env() -> Option<SecretString> {
    std::env::var(API_KEY_ENV)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .map(SecretString::from)
}

/// Extract the workflow JSON from model output.
///
/// Prefers the first ```json (or bare ```) fenced block. Without a fence, takes
/// the span from the first `{` to the last `}`. Returns `None` when neither is
/// present.
pub fn extract_workflow_json(text: &str) -> Option<String> {
    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        // Skip the info string ("json") up to the end of the fence line.
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after[body_start..];
        if let Some(end) = body.find("```") {
            let candidate = body[..end].trim();
            if !candidate.is_empty() {
                return Some(candidate.to_string());
            }
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| text[start..=end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_fenced_json() {
        let text = "Here is the workflow:\n```json\n{\"id\": \"a\"}\n```\nDone.";
        assert_eq!(extract_workflow_json(text).as_deref(), Some("{\"id\": \"a\"}"));
    }

    #[test]
    fn test_extract_bare_fence() {
        let text = "```\n{\"id\": \"b\"}\n```";
        assert_eq!(extract_workflow_json(text).as_deref(), Some("{\"id\": \"b\"}"));
    }

    #[test]
    fn test_extract_unfenced_object() {
        let text = "Summary line. {\"id\": \"c\", \"nodes\": [{\"id\": \"x\"}]} trailing";
        assert_eq!(
            extract_workflow_json(text).as_deref(),
            Some("{\"id\": \"c\", \"nodes\": [{\"id\": \"x\"}]}")
        );
    }

    #[test]
    fn test_extract_nothing() {
        assert!(extract_workflow_json("I cannot help with that.").is_none());
        assert!(extract_workflow_json("} backwards {").is_none());
    }
}
