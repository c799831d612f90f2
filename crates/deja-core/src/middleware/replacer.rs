//! Placeholder replacement stage

use super::Middleware;
use crate::history::{ChatHistory, Message};

/// A single substitution applied by [`Replacer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    /// The substring to be replaced, e.g. `{{name}}`
    pub pattern: String,
    /// The string to replace it with
    pub value: String,
}

impl Replacement {
    /// Create a new replacement
    pub fn new(pattern: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            value: value.into(),
        }
    }
}

/// Write-side stage that substitutes placeholder text in message content.
///
/// Useful for keying the cache on a canonical form of templated prompts:
/// `{{name}}` in the live conversation becomes the concrete value before the
/// window is built. Substitutions are applied in order and must not
/// reintroduce their own patterns, which keeps re-application over already
/// transformed history a no-op.
#[derive(Debug, Clone, Default)]
pub struct Replacer {
    replacements: Vec<Replacement>,
}

impl Replacer {
    /// Create a new replacer with an ordered list of substitutions
    pub fn new(replacements: Vec<Replacement>) -> Self {
        Self { replacements }
    }
}

impl Middleware for Replacer {
    fn pre_cache_save(&self, message: Message, _history: &ChatHistory) -> Option<Message> {
        let mut content = message.content.clone();
        for replacement in &self.replacements {
            content = content.replace(&replacement.pattern, &replacement.value);
        }
        Some(message.with_content(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name_and_age() -> Replacer {
        Replacer::new(vec![
            Replacement::new("{{name}}", "Anmol"),
            Replacement::new("{{age}}", "23"),
        ])
    }

    #[test]
    fn substitutes_all_placeholders() {
        let history = ChatHistory::new();
        let out = name_and_age()
            .pre_cache_save(Message::user("I am {{name}}, {{age}} years old"), &history)
            .unwrap();
        assert_eq!(out.content, "I am Anmol, 23 years old");
    }

    #[test]
    fn reapplication_is_idempotent() {
        let history = ChatHistory::new();
        let replacer = name_and_age();
        let once = replacer
            .pre_cache_save(Message::user("hello {{name}}"), &history)
            .unwrap();
        let twice = replacer.pre_cache_save(once.clone(), &history).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn read_side_is_identity() {
        let history = ChatHistory::new();
        let message = Message::assistant("hello {{name}}");
        let out = name_and_age()
            .post_cache_retrieval(message.clone(), &history)
            .unwrap();
        assert_eq!(out, message);
    }
}
