pub mod embeddings;
pub mod llm_provider;
pub mod openai_provider;
pub mod pinecone_index;

pub use embeddings::{EmbeddingClient, EmbeddingConfig};
pub use llm_provider::{
    GenerationConfig, LlmProvider, LlmResponse, LlmResult, Message, MessageRole,
};
pub use openai_provider::{OpenAiConfig, OpenAiProvider};
pub use pinecone_index::{PineconeConfig, PineconeIndex};
