//! Persona prompts and prompt assembly.
//!
//! Prompts live in the `prompts/` directory at the project root. The
//! assistant persona falls back to a built-in text when the file is absent.

use std::path::PathBuf;

use tracing::debug;

use crate::{Error, Result};

/// Built-in persona preamble.
pub const DEFAULT_PERSONA: &str = "\
You are PARK, a friendly robot assistant at LPU college. You are currently in \
development and were trained by your developer Raj on LPU-specific data.

Personality traits:
- Friendly and approachable
- Proud to be a robot in development
- Honest about your limitations
- Enthusiastic about helping students";

/// Reply used when nothing relevant is stored.
pub const NO_CONTEXT_REPLY: &str = "I apologize, but I'm still in my development phase and \
my knowledge is limited. My developer Raj is actively working on expanding my dataset to \
help me answer such questions better. Would you like me to notify him about this topic?";

/// First message of every chat session.
pub const GREETING: &str = "Hi! I'm PARK, a friendly robot assistant currently being \
developed for LPU. I'm learning new things every day! How can I help you?";

const CLOSING_INSTRUCTIONS: &str = "\
Important: Base your answer on the context above. If the context does not contain the \
answer, say that you are still learning and that your developer is working on expanding \
your knowledge. Keep a friendly, helpful tone.";

/// Available prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    /// Persona preamble for answers.
    Assistant,
}

impl Prompt {
    /// Prompt file name (Markdown).
    pub fn filename(&self) -> &'static str {
        match self {
            Prompt::Assistant => "assistant.md",
        }
    }

    /// Load the prompt from its file.
    pub fn load(&self) -> Result<String> {
        load_prompt(self.filename())
    }

    /// Load the prompt, or the built-in text if the file is missing or empty.
    pub fn load_or_default(&self) -> String {
        match self.load() {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => self.builtin().to_string(),
            Err(e) => {
                debug!("Using built-in prompt: {}", e);
                self.builtin().to_string()
            }
        }
    }

    fn builtin(&self) -> &'static str {
        match self {
            Prompt::Assistant => DEFAULT_PERSONA,
        }
    }
}

/// Load a prompt by file name.
pub fn load_prompt(filename: &str) -> Result<String> {
    let path = prompts_dir().join(filename);
    std::fs::read_to_string(&path)
        .map_err(|e| Error::InvalidArgument(format!("failed to load prompt {}: {}", filename, e)))
}

/// Path to the prompts directory.
pub fn prompts_dir() -> PathBuf {
    let candidates = [
        PathBuf::from("prompts"),
        PathBuf::from("../prompts"),
        PathBuf::from("../../prompts"),
    ];

    for path in candidates {
        if path.exists() {
            return path;
        }
    }

    PathBuf::from("prompts")
}

/// Persona + retrieved context + question.
pub fn build_prompt<S: AsRef<str>>(persona: &str, contexts: &[S], question: &str) -> String {
    let context = contexts
        .iter()
        .map(|c| c.as_ref())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "{persona}\n\nUse this context to answer the question:\n{context}\n\nQuestion: {question}\n\n{CLOSING_INSTRUCTIONS}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistant_prompt_is_markdown() {
        assert_eq!(Prompt::Assistant.filename(), "assistant.md");
    }

    #[test]
    fn load_prompt_nonexistent_file() {
        assert!(load_prompt("nonexistent_file_12345.md").is_err());
    }

    #[test]
    fn load_or_default_never_empty() {
        assert!(!Prompt::Assistant.load_or_default().is_empty());
    }

    #[test]
    fn prompt_contains_contexts_in_order_and_question() {
        let prompt = build_prompt("PERSONA", &["first chunk", "second chunk"], "When is the fest?");

        assert!(prompt.starts_with("PERSONA"));
        let first = prompt.find("first chunk").unwrap();
        let second = prompt.find("second chunk").unwrap();
        assert!(first < second);
        assert!(prompt.contains("first chunk\n\nsecond chunk"));
        assert!(prompt.contains("Question: When is the fest?"));
        assert!(prompt.ends_with(CLOSING_INSTRUCTIONS));
    }

    #[test]
    fn canned_texts_mention_persona() {
        assert!(GREETING.contains("PARK"));
        assert!(NO_CONTEXT_REPLY.contains("development phase"));
    }
}
