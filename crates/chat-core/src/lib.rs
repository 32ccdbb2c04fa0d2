pub mod augmentation;
pub mod chat_service;
pub mod citations;
pub mod config;
mod config_env;
pub mod context_window;
pub mod fallbacks;
pub mod llm;
pub mod models;
pub mod repos;
pub mod summary_cache;

#[cfg(test)]
mod test_support;

pub use augmentation::AugmentationEngine;
pub use chat_service::{ChatError, ChatProviders, ChatService};
pub use citations::{Citation, CitationPipeline, CitationPolicy};
pub use config::{ChatServiceConfig, ConfigError, EmbeddingConfig, LlmProviderConfig, StoreConfig};
pub use context_window::ContextWindow;
pub use repos::{ChatStore, InMemoryStore, Store, StoreError};
pub use summary_cache::{SummaryCache, SummaryError, SummaryPolicy, SummaryTrigger};
