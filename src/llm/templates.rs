//! Prompt templates
//!
//! Templates are loaded from the prompts directory at adapter construction;
//! a missing or unreadable file falls back to the embedded default so the
//! worker never starts without instructions.

use std::path::Path;

use handlebars::Handlebars;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;

/// Template name for the base system instruction
pub const SYSTEM_INSTRUCTION: &str = "system_instruction";
/// Template name for the orchestrator delegation decision
pub const DELEGATOR: &str = "delegator";
/// Template name for the manager reason-act cycle
pub const REACT_CYCLE: &str = "react_cycle";
/// Template name for the final-response consolidation
pub const FINAL_RESPONSE: &str = "final_response";

const DEFAULT_SYSTEM_INSTRUCTION: &str = include_str!("../../prompts/system_instruction.md");
const DEFAULT_DELEGATOR: &str = include_str!("../../prompts/delegator_prompt.md");
const DEFAULT_REACT_CYCLE: &str = include_str!("../../prompts/react_cycle_prompt.md");
const DEFAULT_FINAL_RESPONSE: &str = include_str!("../../prompts/final_response_prompt.md");

/// The full set of prompt templates used by the adapter
pub struct PromptSet {
    registry: Handlebars<'static>,
    system_instruction: String,
}

impl PromptSet {
    /// Load templates from `dir`, falling back to the embedded defaults for
    /// any file that cannot be read
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut registry = Handlebars::new();
        // prompts are plain text, not HTML
        registry.register_escape_fn(handlebars::no_escape);

        let sources = [
            (DELEGATOR, "delegator_prompt.md", DEFAULT_DELEGATOR),
            (REACT_CYCLE, "react_cycle_prompt.md", DEFAULT_REACT_CYCLE),
            (
                FINAL_RESPONSE,
                "final_response_prompt.md",
                DEFAULT_FINAL_RESPONSE,
            ),
        ];

        for (name, file, default) in sources {
            let template = read_or_default(dir, file, default);
            registry.register_template_string(name, template)?;
        }

        let system_instruction =
            read_or_default(dir, "system_instruction.md", DEFAULT_SYSTEM_INSTRUCTION);

        Ok(PromptSet {
            registry,
            system_instruction,
        })
    }

    /// Render the named template with the given data
    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String> {
        Ok(self.registry.render(name, data)?)
    }

    /// The base system instruction text
    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }
}

fn read_or_default(dir: &Path, file: &str, default: &str) -> String {
    let path = dir.join(file);
    match std::fs::read_to_string(&path) {
        Ok(content) => {
            debug!(path = %path.display(), "loaded prompt template");
            content
        }
        Err(e) => {
            warn!(
                path = %path.display(),
                "prompt template unavailable ({}); using embedded default",
                e
            );
            default.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_dir_uses_embedded_defaults() {
        let prompts = PromptSet::load("/nonexistent/prompt/dir").unwrap();
        assert!(!prompts.system_instruction().is_empty());

        let rendered = prompts
            .render(
                DELEGATOR,
                &json!({
                    "user_id": "alice",
                    "chat_history": "",
                    "user_input": "hi",
                    "available_managers": "[]",
                    "previous_results": "{}",
                    "react_history": "Nenhum histórico de raciocínio ainda.",
                    "current_date": "01/08/2026 12:00",
                }),
            )
            .unwrap();
        assert!(rendered.contains("alice"));
    }

    #[test]
    fn test_directory_override_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("react_cycle_prompt.md"),
            "custom template for {{manager_id}}",
        )
        .unwrap();

        let prompts = PromptSet::load(dir.path()).unwrap();
        let rendered = prompts
            .render(REACT_CYCLE, &json!({"manager_id": "WeatherManager"}))
            .unwrap();
        assert_eq!(rendered, "custom template for WeatherManager");
    }
}
