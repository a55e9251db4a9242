//! Shared application state, built once at startup.

use std::sync::Arc;

use crate::core::config::{AppPaths, Settings};
use crate::core::errors::ApiError;
use crate::history::{ChatSink, SqliteChatSink};
use crate::llm::CompletionClient;
use crate::rag::{Embedder, HashEmbedder, HttpEmbedder, Indexer, Retriever, SqliteVectorStore, VectorStore};

pub struct AppState {
    pub settings: Settings,
    pub paths: AppPaths,
    pub indexer: Indexer,
    pub retriever: Retriever,
    pub gateway: CompletionClient,
    pub chat: Arc<dyn ChatSink>,
}

impl AppState {
    /// Wires the pipeline: one embedder and one store instance shared by
    /// indexing and retrieval, so both sides of a collection see the same
    /// embedding transformation.
    pub async fn initialize() -> Result<Self, ApiError> {
        let settings = Settings::from_env();
        let paths = AppPaths::new();

        let embedder: Arc<dyn Embedder> = match &settings.embedding_base_url {
            Some(url) => {
                tracing::info!("Using remote embedding endpoint at {}", url);
                Arc::new(HttpEmbedder::new(url.clone(), &settings))
            }
            None => {
                tracing::info!(
                    "No embedding endpoint configured, using in-process hashing embedder (dim {})",
                    settings.embedding_dimension
                );
                Arc::new(HashEmbedder::new(settings.embedding_dimension))
            }
        };

        let store: Arc<dyn VectorStore> = Arc::new(SqliteVectorStore::new(&paths).await?);
        let chat: Arc<dyn ChatSink> = Arc::new(SqliteChatSink::new(&paths).await?);

        let indexer = Indexer::new(embedder.clone(), store.clone());
        let retriever = Retriever::new(embedder, store);
        let gateway = CompletionClient::new(&settings);

        Ok(Self {
            settings,
            paths,
            indexer,
            retriever,
            gateway,
            chat,
        })
    }
}
