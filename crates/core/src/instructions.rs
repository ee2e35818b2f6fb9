//! Instructions — the assistant's static prompt record.
//!
//! Loaded once when a context pipeline is built and never hot-reloaded.
//! The file is TOML:
//!
//! ```toml
//! name = "Juliet"
//! system_message = "You are Juliet, ..."
//! assistant_intro = "Hi, I'm Juliet."
//! assistant_focus = "Help the user with whatever they are working on."
//! ```
//!
//! A missing file falls back to built-in defaults. Missing fields fall back
//! individually.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// The static instruction fields rendered at the top of every prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instructions {
    /// Assistant display name
    #[serde(default = "default_name")]
    pub name: String,

    /// Optional free-form description of this assistant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default = "default_system_message")]
    pub system_message: String,

    #[serde(default = "default_assistant_intro")]
    pub assistant_intro: String,

    #[serde(default = "default_assistant_focus")]
    pub assistant_focus: String,
}

fn default_name() -> String {
    "Juliet".into()
}

fn default_system_message() -> String {
    concat!(
        "You are Juliet, a thoughtful personal assistant with long-term memory. ",
        "Context blocks below are retrieved from your memory and knowledge base; ",
        "use them when they are relevant and ignore them when they are not.",
    )
    .into()
}

fn default_assistant_intro() -> String {
    "Hi, I'm Juliet. I remember our past conversations and the documents you've shared with me.".into()
}

fn default_assistant_focus() -> String {
    "Answer the user's latest request directly and concisely.".into()
}

impl Default for Instructions {
    fn default() -> Self {
        Self {
            name: default_name(),
            description: None,
            system_message: default_system_message(),
            assistant_intro: default_assistant_intro(),
            assistant_focus: default_assistant_focus(),
        }
    }
}

impl Instructions {
    /// Load instructions from a TOML file, falling back to defaults when the
    /// file is missing or unreadable.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => {
                debug!(path = %path.display(), "No instructions file, using defaults");
                return Self::default();
            }
        };

        match toml::from_str::<Self>(&content) {
            Ok(instructions) => {
                debug!(path = %path.display(), name = %instructions.name, "Loaded instructions");
                instructions
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Invalid instructions file, using defaults");
                Self::default()
            }
        }
    }

    /// Parse instructions from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Render as TOML (for `juliet onboard`).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_uses_defaults() {
        let instructions = Instructions::load(Path::new("/nonexistent/instructions.toml"));
        assert_eq!(instructions, Instructions::default());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed = Instructions::from_toml("system_message = \"Be brief.\"").unwrap();
        assert_eq!(parsed.system_message, "Be brief.");
        assert_eq!(parsed.name, "Juliet");
        assert_eq!(parsed.assistant_focus, default_assistant_focus());
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("instructions.toml");
        std::fs::write(
            &path,
            "name = \"Romeo\"\nassistant_intro = \"Hey.\"\nassistant_focus = \"Poetry.\"\n",
        )
        .unwrap();

        let instructions = Instructions::load(&path);
        assert_eq!(instructions.name, "Romeo");
        assert_eq!(instructions.assistant_intro, "Hey.");
        assert_eq!(instructions.assistant_focus, "Poetry.");
    }

    #[test]
    fn malformed_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("instructions.toml");
        std::fs::write(&path, "name = [").unwrap();
        assert_eq!(Instructions::load(&path), Instructions::default());
    }

    #[test]
    fn toml_roundtrip() {
        let original = Instructions::default();
        let parsed = Instructions::from_toml(&original.to_toml()).unwrap();
        assert_eq!(parsed, original);
    }
}
