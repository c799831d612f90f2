//! Ask the same question twice with different wording; the second answer is
//! served from the cache without touching the completion service.
//!
//! Run: `cargo run -p deja-sdk --example semantic_cache_demo`

use deja_core::{CacheEngine, DejaResult, EngineConfig, HashingVectorizer, MemoryBackend, Message};
use deja_sdk::client::{ChatCompletion, ChatCompletions, ChatRequest, CompletionStream};
use deja_sdk::CachedCompletions;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Stand-in for a real completion service; counts how often it is reached.
/// Swap in `OpenAiClient::new(api_key)` to run against a live endpoint.
struct CannedService {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl ChatCompletions for CannedService {
    async fn create(&self, request: ChatRequest) -> DejaResult<ChatCompletion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ChatCompletion {
            id: "canned".to_string(),
            model: request.model,
            content: "Arr, ye be wantin' isinstance(obj, SomeClass)!".to_string(),
            finish_reason: Some("stop".to_string()),
            created: 0,
        })
    }

    async fn create_stream(&self, request: ChatRequest) -> DejaResult<CompletionStream> {
        let completion = self.create(request).await?;
        let chunks = vec![
            Ok(deja_sdk::CompletionChunk::content(completion.content)),
            Ok(deja_sdk::CompletionChunk::final_chunk(Some("stop".to_string()))),
        ];
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

#[tokio::main]
async fn main() -> DejaResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let backend = Arc::new(MemoryBackend::new(Arc::new(HashingVectorizer::default())));
    let engine = CacheEngine::new(
        backend,
        Vec::new(),
        EngineConfig::new().with_distance_threshold(0.3),
    )
    .await?;
    let client = CachedCompletions::new(
        CannedService {
            calls: AtomicUsize::new(0),
        },
        engine,
    );

    let first = client
        .create(ChatRequest::new(
            "gpt-4o",
            vec![
                Message::system("Talk like a pirate."),
                Message::user("How do I check if a Python object is an instance of a class?"),
            ],
        ))
        .await?;
    println!("first attempt:  {}", first.content);

    client.flush().await;

    // Similar wording, same meaning: close enough for the window to match.
    let second = client
        .create(ChatRequest::new(
            "gpt-4o",
            vec![
                Message::system("Talk like a pirate."),
                Message::user("How do I check if an object is an instance of a class?"),
            ],
        ))
        .await?;
    println!("second attempt: {}", second.content);
    println!(
        "completion service was called {} time(s)",
        client.inner().calls.load(Ordering::SeqCst)
    );

    client.dispose().await;
    Ok(())
}
