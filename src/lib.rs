//! llm-translate-proxy: local HTTP translation proxy
//!
//! Accepts `GET /?text=…` requests from a game-side caller and answers with
//! a translated snippet, forwarding each request to an OpenAI-compatible
//! chat-completion upstream. Features:
//! - escape protection so the model cannot corrupt embedded markup
//! - per-client rolling conversation context
//! - API-key rotation and a bounded retry loop
//! - hot-reloadable whole-snapshot configuration

pub mod api;
pub mod config;
pub mod context;
pub mod events;
pub mod extract;
pub mod glossary;
pub mod protector;
pub mod rotator;
pub mod server;
pub mod strings;
pub mod translator;
pub mod upstream;

pub use config::{load_config, save_config, AppConfig, ConfigHandle};
pub use events::{EventSink, TracingSink};
pub use glossary::{FileGlossary, Glossary, NoopPipeline, TextPipeline};
pub use server::Server;
pub use translator::Translator;
