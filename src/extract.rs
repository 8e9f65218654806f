//! Upstream response post-processing
//!
//! Raw model output is cleaned in stages: reasoning spans are stripped,
//! `<tm>Src=Trgt</tm>` annotations are harvested into the glossary while
//! their translated side is spliced back into the text, and the final
//! translation is pulled out of the first `<tl>…</tl>` block.

use regex::Regex;

use crate::events::EventSink;
use crate::glossary::Glossary;
use crate::strings::{self, Lang};

pub struct ResponseExtractor {
    think: Regex,
    term: Regex,
    token: Regex,
    term_code: Regex,
    tl_block: Regex,
    tl_literal: Regex,
}

impl ResponseExtractor {
    pub fn new() -> Self {
        Self {
            think: Regex::new(r"(?s)<think>.*?</think>").expect("think pattern is valid"),
            term: Regex::new(r"(?s)<tm>\s*(.*?)\s*=\s*(.*?)\s*</tm>").expect("term pattern is valid"),
            token: Regex::new(r"\[T_\d+\]").expect("token pattern is valid"),
            term_code: Regex::new(r"Z[A-Z]{2}Z").expect("term code pattern is valid"),
            tl_block: Regex::new(r"(?s)<tl>(.*?)</tl>").expect("tl pattern is valid"),
            tl_literal: Regex::new(r"(?i)</?tl>").expect("tl literal pattern is valid"),
        }
    }

    /// Remove `<think>…</think>` reasoning spans entirely.
    pub fn strip_think(&self, content: &str) -> String {
        self.think.replace_all(content, "").into_owned()
    }

    /// Harvest `<tm>Src=Trgt</tm>` annotations.
    ///
    /// Each span is substituted with its translated side so meaningful text
    /// is never dropped, even when the model nests the tag inside a
    /// sentence. Valid terms whose source actually occurs in the frozen
    /// input are handed to the glossary and logged.
    pub fn harvest_terms(
        &self,
        content: &str,
        frozen_input: &str,
        glossary: &dyn Glossary,
        sink: &dyn EventSink,
        lang: Lang,
    ) -> String {
        let frozen_lower = frozen_input.to_lowercase();
        let mut rebuilt = String::with_capacity(content.len());
        let mut last = 0;

        for caps in self.term.captures_iter(content) {
            let whole = caps.get(0).expect("group 0 always present");
            let source = caps[1].trim().to_string();
            let target = caps[2].trim().to_string();

            rebuilt.push_str(&content[last..whole.start()]);

            if self.is_valid_term(&source, &target)
                && frozen_lower.contains(&source.to_lowercase())
            {
                glossary.add_new_term(&source, &target);
                sink.log_message(&format!("{}{source} = {target}", strings::new_term(lang)));
            }

            rebuilt.push_str(&target);
            last = whole.end();
        }

        rebuilt.push_str(&content[last..]);
        rebuilt
    }

    /// A harvested pair is usable only when both sides carry real text and
    /// neither side smuggles protection tokens or term codes.
    fn is_valid_term(&self, source: &str, target: &str) -> bool {
        !source.is_empty()
            && !target.is_empty()
            && !self.token.is_match(source)
            && !self.token.is_match(target)
            && !self.term_code.is_match(source)
            && !self.term_code.is_match(target)
    }

    /// Take the inner text of the first `<tl>…</tl>` block, or the whole
    /// cleaned content when no block is present, then scrub any residual
    /// `<tl>` literals the model left behind.
    pub fn extract_translation(&self, content: &str) -> String {
        let picked = match self.tl_block.captures(content) {
            Some(caps) => caps[1].trim().to_string(),
            None => content.trim().to_string(),
        };
        self.tl_literal.replace_all(&picked, "").into_owned()
    }
}

impl Default for ResponseExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingGlossary {
        added: Mutex<Vec<(String, String)>>,
    }

    impl Glossary for RecordingGlossary {
        fn set_file_path(&self, _path: &str) {}

        fn context_prompt(&self, _text: &str) -> String {
            String::new()
        }

        fn add_new_term(&self, source: &str, target: &str) {
            self.added
                .lock()
                .unwrap()
                .push((source.to_string(), target.to_string()));
        }
    }

    struct NullSink;

    impl EventSink for NullSink {
        fn log_message(&self, _message: &str) {}
    }

    fn harvest(content: &str, frozen: &str) -> (String, Vec<(String, String)>) {
        let extractor = ResponseExtractor::new();
        let glossary = RecordingGlossary::default();
        let rebuilt = extractor.harvest_terms(content, frozen, &glossary, &NullSink, Lang::En);
        let added = glossary.added.lock().unwrap().clone();
        (rebuilt, added)
    }

    #[test]
    fn test_strip_think_spans() {
        let extractor = ResponseExtractor::new();
        assert_eq!(
            extractor.strip_think("<think>step\nby step</think>你好"),
            "你好"
        );
        assert_eq!(extractor.strip_think("no reasoning"), "no reasoning");
    }

    #[test]
    fn test_harvest_substitutes_translation() {
        let (rebuilt, added) = harvest(
            "<tl>勇者里昂登场</tl><tm>リオン=里昂</tm>",
            "勇者リオン登场",
        );
        assert_eq!(rebuilt, "<tl>勇者里昂登场</tl>里昂");
        assert_eq!(added, vec![("リオン".to_string(), "里昂".to_string())]);
    }

    #[test]
    fn test_harvest_inline_tag_keeps_text() {
        let (rebuilt, added) = harvest("<tl>你好，<tm>Li=李</tm></tl>", "Hello Li");
        assert_eq!(rebuilt, "<tl>你好，李</tl>");
        assert_eq!(added.len(), 1);
    }

    #[test]
    fn test_harvest_rejects_token_and_code_terms() {
        let (_, added) = harvest("<tm>[T_0]=里昂</tm><tm>ZMCZ=码</tm><tm>=空</tm>", "[T_0] ZMCZ");
        assert!(added.is_empty());
    }

    #[test]
    fn test_harvest_requires_source_in_input() {
        // The model hallucinated a term that never appeared in the input;
        // the glossary is not polluted but the text still reads through.
        let (rebuilt, added) = harvest("译文<tm>ノエル=诺艾尔</tm>", "勇者リオン登场");
        assert_eq!(rebuilt, "译文诺艾尔");
        assert!(added.is_empty());
    }

    #[test]
    fn test_harvest_source_match_is_case_insensitive() {
        let (_, added) = harvest("<tm>LION=里昂</tm>", "the lion appears");
        assert_eq!(added.len(), 1);
    }

    #[test]
    fn test_extract_translation_first_block_only() {
        let extractor = ResponseExtractor::new();
        assert_eq!(
            extractor.extract_translation("<tl>第一段</tl>junk<tl>第二段</tl>"),
            "第一段"
        );
    }

    #[test]
    fn test_extract_translation_without_block() {
        let extractor = ResponseExtractor::new();
        assert_eq!(extractor.extract_translation("  纯文本译文  "), "纯文本译文");
    }

    #[test]
    fn test_extract_translation_scrubs_residual_literals() {
        let extractor = ResponseExtractor::new();
        assert_eq!(extractor.extract_translation("你好</TL>余<TL>"), "你好余");
    }

    #[test]
    fn test_extract_translation_multiline_block() {
        let extractor = ResponseExtractor::new();
        assert_eq!(
            extractor.extract_translation("<tl>第一行\n第二行</tl>"),
            "第一行\n第二行"
        );
    }
}
