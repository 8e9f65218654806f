//! Application configuration and the hot-reload snapshot discipline

mod loader;

use std::sync::Mutex;

pub use loader::{load_config, save_config};

use crate::rotator::split_keys;
use crate::strings::Lang;

/// Main application configuration.
///
/// A value of this type is an immutable snapshot: request attempts copy the
/// whole struct once and never observe a half-updated reload.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Upstream endpoint URL prefix, e.g. `https://api.openai.com/v1`.
    pub api_base: String,
    /// Raw comma-separated bearer tokens.
    pub api_key: String,
    /// Upstream model identifier.
    pub model: String,
    /// TCP listen port.
    pub port: u16,
    /// Base instruction text for the system turn.
    pub system_prompt: String,
    /// User-turn prefix prepended to each input.
    pub pre_prompt: String,
    /// Max history pairs retained per client.
    pub context_num: usize,
    /// Upstream sampling temperature.
    pub temperature: f64,
    /// Worker-pool size.
    pub max_threads: usize,
    /// Log string table: 0 = English, 1 = Chinese.
    pub language: u8,
    /// Toggle for the glossary and regex collaborators.
    pub enable_glossary: bool,
    /// Glossary backing file, opaque to the core.
    pub glossary_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-3.5-turbo".to_string(),
            port: 6800,
            system_prompt: "你是专业的游戏文本翻译引擎。将输入的游戏文本翻译为简体中文，\
                            完整保留所有标签、占位符与特殊标记，只输出译文本身。"
                .to_string(),
            pre_prompt: "将下面的文本翻译成简体中文：".to_string(),
            context_num: 5,
            temperature: 1.0,
            max_threads: 8,
            language: 1,
            enable_glossary: false,
            glossary_path: String::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an INI file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        load_config(path)
    }

    /// The ordered bearer-token list derived from the raw key string.
    pub fn api_keys(&self) -> Vec<String> {
        split_keys(&self.api_key)
    }

    pub fn lang(&self) -> Lang {
        Lang::from_index(self.language)
    }

    /// Worker-pool size with the minimum of one worker enforced.
    pub fn worker_count(&self) -> usize {
        self.max_threads.max(1)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] ini::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Mutex-guarded configuration snapshot, swappable wholesale.
///
/// Every attempt calls [`ConfigHandle::current`] exactly once; retries that
/// span a reload pick up the new snapshot on their next attempt without ever
/// tearing the one in use.
#[derive(Debug)]
pub struct ConfigHandle {
    inner: Mutex<AppConfig>,
}

impl ConfigHandle {
    pub fn new(config: AppConfig) -> Self {
        Self {
            inner: Mutex::new(config),
        }
    }

    /// Copy of the current snapshot, stable for the rest of the attempt.
    pub fn current(&self) -> AppConfig {
        self.inner.lock().unwrap().clone()
    }

    /// Swap in a new snapshot atomically.
    pub fn update(&self, config: AppConfig) {
        *self.inner.lock().unwrap() = config;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_keys_split() {
        let config = AppConfig {
            api_key: "k1, k2 ,,k3".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(config.api_keys(), vec!["k1", "k2", "k3"]);
    }

    #[test]
    fn test_worker_count_minimum() {
        let config = AppConfig {
            max_threads: 0,
            ..AppConfig::default()
        };
        assert_eq!(config.worker_count(), 1);
    }

    #[test]
    fn test_snapshot_swap_is_atomic_per_read() {
        let handle = ConfigHandle::new(AppConfig::default());
        let before = handle.current();

        let updated = AppConfig {
            model: "other-model".to_string(),
            port: 7000,
            ..AppConfig::default()
        };
        handle.update(updated.clone());

        // The snapshot taken before the swap is unchanged; the next read
        // observes exactly the new configuration.
        assert_eq!(before.model, "gpt-3.5-turbo");
        assert_eq!(handle.current(), updated);
    }
}
