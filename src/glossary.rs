//! Glossary and text-pipeline collaborators
//!
//! The translation core consumes these through narrow trait seams: the
//! glossary supplies a context prompt and absorbs newly discovered terms,
//! and the text pipeline gets a pre/post hook around each upstream attempt.

use std::collections::HashMap;
use std::fs;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::{Mutex, RwLock};

/// Term store consulted while building prompts and harvesting new terms.
pub trait Glossary: Send + Sync {
    /// Point the glossary at a backing file. Called on every config update
    /// while the glossary feature is enabled.
    fn set_file_path(&self, path: &str);

    /// A prompt block describing the known terms relevant to `text`, or an
    /// empty string when there is nothing to say.
    fn context_prompt(&self, text: &str) -> String;

    /// Record a term pair the model discovered.
    fn add_new_term(&self, source: &str, target: &str);
}

/// Regex-style pre/post processing around the upstream call. The default
/// hooks pass text through unchanged.
pub trait TextPipeline: Send + Sync {
    fn process_pre(&self, text: String) -> String {
        text
    }

    fn process_post(&self, text: String) -> String {
        text
    }
}

/// Pipeline that performs no rewriting.
pub struct NoopPipeline;

impl TextPipeline for NoopPipeline {}

/// File-backed glossary holding `source=target` lines.
///
/// Lines starting with `#` are comments. New terms are appended to the
/// backing file as they are discovered; append failures are logged and
/// otherwise ignored so a read-only glossary cannot fail a translation.
#[derive(Default)]
pub struct FileGlossary {
    path: Mutex<Option<PathBuf>>,
    terms: RwLock<HashMap<String, String>>,
}

impl FileGlossary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, source: &str) -> Option<String> {
        self.terms.read().unwrap().get(source).cloned()
    }

    pub fn term_count(&self) -> usize {
        self.terms.read().unwrap().len()
    }

    fn load(&self, path: &PathBuf) {
        let mut terms = HashMap::new();
        match fs::read_to_string(path) {
            Ok(content) => {
                for line in content.lines() {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    if let Some((source, target)) = line.split_once('=') {
                        let (source, target) = (source.trim(), target.trim());
                        if !source.is_empty() && !target.is_empty() {
                            terms.insert(source.to_string(), target.to_string());
                        }
                    }
                }
                tracing::info!(path = %path.display(), terms = terms.len(), "glossary loaded");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read glossary file");
            }
        }
        *self.terms.write().unwrap() = terms;
    }
}

impl Glossary for FileGlossary {
    fn set_file_path(&self, path: &str) {
        let mut current = self.path.lock().unwrap();
        if path.is_empty() {
            *current = None;
            self.terms.write().unwrap().clear();
            return;
        }

        let new_path = PathBuf::from(path);
        if current.as_ref() == Some(&new_path) {
            return;
        }
        self.load(&new_path);
        *current = Some(new_path);
    }

    fn context_prompt(&self, text: &str) -> String {
        let terms = self.terms.read().unwrap();
        let mut relevant: Vec<(&String, &String)> =
            terms.iter().filter(|(source, _)| text.contains(source.as_str())).collect();
        if relevant.is_empty() {
            return String::new();
        }
        relevant.sort();

        let mut block = String::from("【Glossary】:\n");
        for (source, target) in relevant {
            block.push_str(source);
            block.push('=');
            block.push_str(target);
            block.push('\n');
        }
        block
    }

    fn add_new_term(&self, source: &str, target: &str) {
        {
            let mut terms = self.terms.write().unwrap();
            if terms.contains_key(source) {
                return;
            }
            terms.insert(source.to_string(), target.to_string());
        }

        let path = self.path.lock().unwrap().clone();
        if let Some(path) = path {
            let appended = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .and_then(|mut f| writeln!(f, "{source}={target}"));
            if let Err(e) = appended {
                tracing::warn!(path = %path.display(), error = %e, "failed to append glossary term");
            }
        }
    }
}
