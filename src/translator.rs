//! Translation pipeline orchestration
//!
//! A request is translated by a bounded retry loop; every attempt starts
//! from a fresh configuration snapshot so reloads take effect between
//! retries, freezes the fragile parts of the input, sends the prompt
//! upstream and restores the protected fragments in the reply.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::api::ChatMessage;
use crate::config::{AppConfig, ConfigHandle};
use crate::context::{self, ContextStore};
use crate::events::EventSink;
use crate::extract::ResponseExtractor;
use crate::glossary::{Glossary, TextPipeline};
use crate::protector::EscapeProtector;
use crate::rotator::KeyRotator;
use crate::strings;
use crate::upstream::{UpstreamClient, UpstreamError};

const MAX_RETRY: usize = 5;
const RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Instruction block appended to every system prompt. The model sees the
/// `[T_n]` tokens produced by the escape protector and must return them
/// untouched.
const TRANSLATION_RULES: &str = concat!(
    "\n\n【Translation Rules】:\n",
    "1. 🛑 PRESERVE TAGS: You will see tags like '[T_0]', '[T_1]'.\n",
    "   - These replace newlines or code. Keep them EXACTLY as is.\n",
    "   - Input: \"Hello [T_0] World\"\n",
    "   - Output: \"你好 [T_0] 世界\"\n",
    "2. 🛑 NO CLEANUP: Do NOT remove the tags.\n",
    "3. 🔰 TERM CODES: Keep 'Z[A-Z]{2}Z' (e.g., 'ZMCZ') codes exactly as is.\n",
    "4. Translate the text BETWEEN the tags naturally.\n",
    "5. Output ONLY the translated result.\n",
);

/// Instruction block that asks the model to wrap its translation in `<tl>`
/// and surface unknown proper nouns as `<tm>` pairs. Only sent when the
/// glossary is enabled and the input is long enough to bother.
const TERM_EXTRACTION_RULES: &str = concat!(
    "\n【Term Extraction】:\n",
    "1. Wrap translation in <tl>...</tl>.\n",
    "2. If you find Proper Nouns (Names) NOT in glossary, append <tm>Src=Trgt</tm> AFTER the translation.\n",
    "3. Keep <tm> tags OUTSIDE of <tl> tags.\n",
);

/// Inputs of at most this many characters never trigger term extraction.
const EXTRACTION_MIN_CHARS: usize = 5;

/// A usable translation: non-empty, not an error banner and not one of the
/// upstream failure phrases.
pub fn is_valid_result(result: &str) -> bool {
    if result.is_empty() {
        return false;
    }
    let lower = result.to_lowercase();
    !lower.starts_with("error") && !lower.contains("翻译失败") && !lower.contains("translation failed")
}

/// The translation core: configuration snapshotting, key rotation, context
/// memory and the retry/abort envelope around the upstream client.
pub struct Translator {
    config: ConfigHandle,
    rotator: KeyRotator,
    contexts: ContextStore,
    protector: EscapeProtector,
    extractor: ResponseExtractor,
    upstream: UpstreamClient,
    glossary: Arc<dyn Glossary>,
    pipeline: Arc<dyn TextPipeline>,
    sink: Arc<dyn EventSink>,
}

impl Translator {
    pub fn new(
        config: AppConfig,
        glossary: Arc<dyn Glossary>,
        pipeline: Arc<dyn TextPipeline>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, reqwest::Error> {
        let rotator = KeyRotator::new();
        rotator.set_keys(config.api_keys());
        if config.enable_glossary {
            glossary.set_file_path(&config.glossary_path);
        }

        Ok(Self {
            config: ConfigHandle::new(config),
            rotator,
            contexts: ContextStore::new(),
            protector: EscapeProtector::new(),
            extractor: ResponseExtractor::new(),
            upstream: UpstreamClient::new()?,
            glossary,
            pipeline,
            sink,
        })
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    pub fn sink(&self) -> &dyn EventSink {
        self.sink.as_ref()
    }

    /// Swap in a new configuration snapshot and re-seed the key rotator.
    /// In-flight attempts keep the snapshot they already copied; the next
    /// attempt observes the new one.
    pub fn update_config(&self, config: AppConfig) {
        self.rotator.set_keys(config.api_keys());
        if config.enable_glossary {
            self.glossary.set_file_path(&config.glossary_path);
        }
        self.config.update(config);
    }

    /// Erase every client's conversation memory.
    pub fn clear_contexts(&self) {
        self.contexts.clear();
        let lang = self.config.current().lang();
        self.sink.log_message(strings::contexts_cleared(lang));
    }

    /// Translate `text` for the caller at `client_ip`, retrying failed
    /// attempts up to the bound. Returns the empty string on failure or
    /// abort.
    pub async fn translate(
        &self,
        text: &str,
        client_ip: &str,
        cancel: &CancellationToken,
    ) -> String {
        let lang = self.config.current().lang();
        let mut retry = 0;

        while retry < MAX_RETRY {
            if cancel.is_cancelled() {
                self.sink.log_message(strings::aborted(lang));
                return String::new();
            }

            if retry > 0 {
                self.sink
                    .log_message(&strings::retry_attempt(lang, retry + 1, MAX_RETRY));
                tokio::select! {
                    _ = cancel.cancelled() => return String::new(),
                    _ = tokio::time::sleep(RETRY_DELAY) => {}
                }
            }

            let attempt = self.attempt(text, client_ip, cancel).await;

            if cancel.is_cancelled() {
                return String::new();
            }

            if is_valid_result(&attempt) {
                if retry > 0 {
                    self.sink.log_message(strings::retry_success(lang));
                }
                return attempt;
            }

            retry += 1;
            if retry >= MAX_RETRY {
                self.sink.log_message(strings::retry_failed(lang));
            }
        }

        String::new()
    }

    /// One upstream attempt: snapshot → key → freeze → prompt assembly →
    /// POST → post-process → thaw → validate → context append.
    async fn attempt(&self, text: &str, client_ip: &str, cancel: &CancellationToken) -> String {
        if cancel.is_cancelled() {
            return String::new();
        }

        // Re-reading the snapshot here is what makes hot reload effective
        // across retries without tearing a single attempt.
        let config = self.config.current();
        let lang = config.lang();

        let Some(api_key) = self.rotator.next_key() else {
            self.sink
                .log_message(&format!("❌ {}", strings::invalid_key(lang)));
            return String::new();
        };

        let (frozen, escape_map) = self.protector.freeze(text);
        let frozen = if config.enable_glossary {
            self.pipeline.process_pre(frozen)
        } else {
            frozen
        };

        let client_id = context::client_id(client_ip);

        let mut system_prompt = config.system_prompt.clone();
        system_prompt.push_str(TRANSLATION_RULES);

        let mut perform_extraction = false;
        if config.enable_glossary {
            let glossary_context = self.glossary.context_prompt(&frozen);
            if !glossary_context.is_empty() {
                system_prompt.push('\n');
                system_prompt.push_str(&glossary_context);
            }

            if text.chars().count() > EXTRACTION_MIN_CHARS {
                perform_extraction = true;
                system_prompt.push_str(TERM_EXTRACTION_RULES);
            }
        }

        let mut messages = vec![ChatMessage::system(system_prompt)];
        for entry in self.contexts.read(&client_id, config.context_num) {
            messages.push(ChatMessage::user(entry.user));
            messages.push(ChatMessage::assistant(entry.assistant));
        }

        let user_content = format!("{}{}", config.pre_prompt, frozen);
        messages.push(ChatMessage::user(user_content.clone()));

        let response = match self
            .upstream
            .chat_completion(&config, &api_key, messages, cancel)
            .await
        {
            Ok(response) => response,
            Err(UpstreamError::Aborted) => return String::new(),
            Err(UpstreamError::Timeout) => {
                self.sink.log_message("❌ Request Timeout");
                return String::new();
            }
            Err(UpstreamError::Json(_)) => {
                self.sink
                    .log_message(&format!("❌ {}", strings::json_error(lang)));
                return String::new();
            }
            Err(e) => {
                self.sink.log_message(&format!("❌ Network Error: {e}"));
                return String::new();
            }
        };

        if let Some(usage) = &response.usage {
            if usage.prompt_tokens > 0 || usage.completion_tokens > 0 {
                self.sink
                    .token_usage(usage.prompt_tokens, usage.completion_tokens);
            }
        }

        let Some(choice) = response.choices.first() else {
            self.sink
                .log_message(&format!("❌ {}", strings::invalid_format(lang)));
            return String::new();
        };

        let mut clean = self.extractor.strip_think(&choice.message.content);
        if perform_extraction {
            clean = self.extractor.harvest_terms(
                &clean,
                &frozen,
                self.glossary.as_ref(),
                self.sink.as_ref(),
                lang,
            );
        }

        let mut result = self.extractor.extract_translation(&clean);
        result = self.protector.thaw(&result, &escape_map);
        if config.enable_glossary {
            result = self.pipeline.process_post(result);
        }

        self.sink.log_message(&format!("  -> {result}"));

        if is_valid_result(&result) {
            self.contexts
                .append(&client_id, user_content, result.clone(), config.context_num);
            result
        } else {
            String::new()
        }
    }
}
