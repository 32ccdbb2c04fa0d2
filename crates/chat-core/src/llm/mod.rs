pub mod chat_completions;
pub mod embeddings;
pub mod gateway;
pub mod prompts;

pub use chat_completions::ChatCompletionsGateway;
pub use embeddings::{EmbeddingsClient, embed_or_zero};
pub use gateway::{
    ChatMessage, ChatRole, CompletionProvider, CompletionRequest, CompletionResponse,
    EmbeddingProvider, LlmGatewayError, LlmTokenUsage, ProviderFuture, SummaryProvider,
    TopicProvider,
};
