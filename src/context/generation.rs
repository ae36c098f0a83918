//! Contract with the test generation backend.
//!
//! The engine only renders the payload and cleans up the reply. What the
//! backend is (a local model, an HTTP service) is up to the caller.

use serde::{Deserialize, Serialize};

use super::AssembledContext;
use crate::error::{ContextError, Result};

pub const GENERATION_INSTRUCTIONS: &str = "\
=== INSTRUCTIONS ===
Generate a complete unit test file for the function above with:
1. All necessary #include directives
2. Mocks for the external calls
3. A test fixture
4. Test cases covering normal paths, edge cases and error handling

Return only the test code.
";

/// Sampling settings passed through to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 8192,
            top_p: 0.95,
        }
    }
}

pub trait GenerationBackend {
    fn name(&self) -> &str;

    /// Returns the generated text for `payload`, or `ContextError::Generation`.
    fn generate(&self, payload: &str, params: &GenerationParams) -> Result<String>;
}

/// Removes a leading ```` ```lang ```` line and a trailing ```` ``` ```` line.
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let mut lines: Vec<&str> = trimmed.lines().skip(1).collect();
    if lines.last().is_some_and(|l| l.trim() == "```") {
        lines.pop();
    }
    lines.join("\n").trim().to_string()
}

/// Renders `context`, hands it to `backend` and returns the cleaned reply.
pub fn request_tests(
    backend: &dyn GenerationBackend,
    context: &AssembledContext,
    params: &GenerationParams,
) -> Result<String> {
    let mut payload = context.render();
    payload.push('\n');
    payload.push_str(GENERATION_INSTRUCTIONS);

    tracing::info!(
        "Requesting tests for {} from {} ({} bytes)",
        context.function.name,
        backend.name(),
        payload.len()
    );
    let reply = backend.generate(&payload, params)?;
    let code = strip_code_fence(&reply);
    if code.is_empty() {
        return Err(ContextError::Generation(format!(
            "{} returned no code for {}",
            backend.name(),
            context.function.name
        )));
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```cpp\nTEST(A, B) {}\n```"), "TEST(A, B) {}");
        assert_eq!(strip_code_fence("```\nint x;\n```\n"), "int x;");
        assert_eq!(strip_code_fence("  int x;  "), "int x;");
        assert_eq!(strip_code_fence("```c\nint x;"), "int x;");
    }

    #[test]
    fn test_strip_code_fence_keeps_inner_fences() {
        let reply = "```c\n// ```\nint x;\n```";
        assert_eq!(strip_code_fence(reply), "// ```\nint x;");
    }

    #[test]
    fn test_default_params() {
        let params = GenerationParams::default();
        assert_eq!(params.max_tokens, 8192);
        assert!((params.temperature - 0.7).abs() < f32::EPSILON);
        assert!((params.top_p - 0.95).abs() < f32::EPSILON);
    }
}
