//! Contracts consumed from the content-management layer.
//!
//! The engine never owns content; it reads source text and writes
//! translations through [`ContentSource`], and lets a [`Glossary`] pin
//! fixed terminology around the provider call. [`MemoryContent`] is the
//! in-memory implementation used by tests and the CLI demo.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::EngineError;
use crate::queue::ContentKey;

/// Resolves and stores content field values on behalf of the engine.
pub trait ContentSource: Send + Sync {
    /// The current source-language text for a field, or `None` when the
    /// object no longer exists.
    fn resolve_source_text(&self, key: &ContentKey) -> Result<Option<String>, EngineError>;

    /// Persist the translated value for a field.
    fn write_translated_value(&self, key: &ContentKey, value: &str) -> Result<(), EngineError>;

    /// The previously stored translated value, recorded as `old_value` in
    /// version history. Collaborators without history return `None`.
    fn previous_value(&self, _key: &ContentKey) -> Option<String> {
        None
    }
}

/// Fixed-term substitution around a provider call.
pub trait Glossary: Send + Sync {
    fn apply_pre(&self, text: &str, source: &str, target: &str, domain: Option<&str>) -> String;
    fn apply_post(&self, text: &str, source: &str, target: &str, domain: Option<&str>) -> String;
}

/// Default glossary: passes text through untouched.
pub struct NoGlossary;

impl Glossary for NoGlossary {
    fn apply_pre(&self, text: &str, _: &str, _: &str, _: Option<&str>) -> String {
        text.to_string()
    }

    fn apply_post(&self, text: &str, _: &str, _: &str, _: Option<&str>) -> String {
        text.to_string()
    }
}

/// Glossary that shields fixed terms from the provider.
///
/// Terms are swapped for opaque placeholders before sending and replaced
/// with their pinned target-language form afterwards, so providers cannot
/// "translate" product names or protected vocabulary.
pub struct TermGlossary {
    terms: Vec<(String, String)>,
}

impl TermGlossary {
    /// `terms` maps a source-language term to its pinned target form.
    pub fn new(terms: Vec<(String, String)>) -> Self {
        Self { terms }
    }

    fn placeholder(index: usize) -> String {
        format!("\u{27e6}{index}\u{27e7}")
    }
}

impl Glossary for TermGlossary {
    fn apply_pre(&self, text: &str, _: &str, _: &str, _: Option<&str>) -> String {
        let mut out = text.to_string();
        for (i, (source_term, _)) in self.terms.iter().enumerate() {
            out = out.replace(source_term, &Self::placeholder(i));
        }
        out
    }

    fn apply_post(&self, text: &str, _: &str, _: &str, _: Option<&str>) -> String {
        let mut out = text.to_string();
        for (i, (_, target_term)) in self.terms.iter().enumerate() {
            out = out.replace(&Self::placeholder(i), target_term);
        }
        out
    }
}

/// In-memory content store for tests and the CLI demo.
#[derive(Default)]
pub struct MemoryContent {
    source: Mutex<HashMap<ContentKey, String>>,
    translated: Mutex<HashMap<ContentKey, String>>,
}

impl MemoryContent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: ContentKey, text: impl Into<String>) {
        self.source.lock().unwrap().insert(key, text.into());
    }

    pub fn remove(&self, key: &ContentKey) {
        self.source.lock().unwrap().remove(key);
    }

    /// The translated value written back by the processor, if any.
    pub fn translated(&self, key: &ContentKey) -> Option<String> {
        self.translated.lock().unwrap().get(key).cloned()
    }
}

impl ContentSource for MemoryContent {
    fn resolve_source_text(&self, key: &ContentKey) -> Result<Option<String>, EngineError> {
        Ok(self.source.lock().unwrap().get(key).cloned())
    }

    fn write_translated_value(&self, key: &ContentKey, value: &str) -> Result<(), EngineError> {
        self.translated
            .lock()
            .unwrap()
            .insert(key.clone(), value.to_string());
        Ok(())
    }

    fn previous_value(&self, key: &ContentKey) -> Option<String> {
        self.translated.lock().unwrap().get(key).cloned()
    }
}
