use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

/// A rendered prompt: system instructions plus the per-item user content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// PromptTemplate
// ---------------------------------------------------------------------------

/// Instructions and the JSON schema the answer must follow. Rendered into a
/// system message once per stage, then paired with each item's content.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    pub requirement: &'static str,
    pub schema: &'static str,
}

impl PromptTemplate {
    pub const fn new(requirement: &'static str, schema: &'static str) -> Self {
        Self {
            requirement,
            schema,
        }
    }

    pub fn system_message(&self) -> String {
        format!(
            "User Requirement:\n{}\nSchema:\n```json\n{}\n```",
            self.requirement.trim(),
            self.schema.trim()
        )
    }

    pub fn render(&self, user: impl Into<String>) -> Prompt {
        Prompt::new(self.system_message(), user)
    }
}
