//! Mock AI Provider for testing.
//!
//! Provides a configurable mock implementation of the AIProvider port,
//! allowing tests and local runs to exercise the relay without calling
//! a real provider.
//!
//! # Features
//!
//! - Scripted deltas, emitted exactly as configured
//! - Simulated open latency and per-chunk latency
//! - Error injection before the stream opens or mid-stream
//! - Streams that never finish, for disconnect testing
//! - Call and chunk tracking for verification
//!
//! # Example
//!
//! ```ignore
//! let provider = MockAIProvider::new()
//!     .with_chunks(["Hel", "lo"])
//!     .with_chunk_delay(Duration::from_millis(10));
//!
//! let stream = provider.stream_complete(request).await?;
//! ```

use async_trait::async_trait;
use futures::future;
use futures::stream;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{
    AIError, AIProvider, ChunkStream, CompletionRequest, FinishReason, ProviderInfo, StreamChunk,
    TokenUsage,
};

/// Mock AI provider for testing.
///
/// Configurable to return specific responses, simulate delays, or inject errors.
#[derive(Debug, Clone)]
pub struct MockAIProvider {
    /// Pre-configured responses (consumed in order).
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    /// Provider info to return.
    info: ProviderInfo,
    /// Simulated latency before the stream opens.
    delay: Duration,
    /// Simulated latency before each chunk.
    chunk_delay: Duration,
    /// Call history for verification.
    calls: Arc<Mutex<Vec<CompletionRequest>>>,
    /// Chunks handed to consumers across all streams.
    chunks_yielded: Arc<AtomicUsize>,
    /// Streams created and not yet dropped.
    open_streams: Arc<AtomicUsize>,
}

/// A configured mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Stream the deltas, then finish normally.
    Chunks { deltas: Vec<String>, usage: TokenUsage },
    /// Stream the deltas, then fail.
    FailAfter { deltas: Vec<String>, error: MockError },
    /// Stream the deltas, then never finish.
    Pending { deltas: Vec<String> },
    /// Fail before any output.
    Error(MockError),
}

/// Mock error types for testing error handling.
#[derive(Debug, Clone)]
pub enum MockError {
    /// Simulate rate limiting.
    RateLimited { retry_after_secs: u32 },
    /// Simulate an overloaded provider.
    Overloaded,
    /// Simulate provider unavailable.
    Unavailable { message: String },
    /// Simulate authentication failure.
    AuthenticationFailed,
    /// Simulate network error.
    Network { message: String },
    /// Simulate timeout.
    Timeout { timeout_secs: u32 },
}

impl From<MockError> for AIError {
    fn from(err: MockError) -> Self {
        match err {
            MockError::RateLimited { retry_after_secs } => AIError::rate_limited(retry_after_secs),
            MockError::Overloaded => AIError::Overloaded,
            MockError::Unavailable { message } => AIError::unavailable(message),
            MockError::AuthenticationFailed => AIError::AuthenticationFailed,
            MockError::Network { message } => AIError::network(message),
            MockError::Timeout { timeout_secs } => AIError::Timeout { timeout_secs },
        }
    }
}

impl Default for MockAIProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockAIProvider {
    /// Creates a new mock provider with default settings.
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            info: ProviderInfo::new("mock", "mock-model-1"),
            delay: Duration::ZERO,
            chunk_delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
            chunks_yielded: Arc::new(AtomicUsize::new(0)),
            open_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn push(self, response: MockResponse) -> Self {
        lock(&self.responses).push_back(response);
        self
    }

    /// Adds a response streamed word by word, whitespace preserved.
    pub fn with_response(self, content: impl Into<String>) -> Self {
        let content = content.into();
        let deltas = content.split_inclusive(' ').map(str::to_string).collect::<Vec<_>>();
        self.with_chunks(deltas)
    }

    /// Adds a response streamed as exactly these deltas.
    pub fn with_chunks<I, S>(self, deltas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(MockResponse::Chunks {
            deltas: deltas.into_iter().map(Into::into).collect(),
            usage: TokenUsage::new(10, 20),
        })
    }

    /// Adds an error returned before any output.
    pub fn with_error(self, error: MockError) -> Self {
        self.push(MockResponse::Error(error))
    }

    /// Adds a response that fails after streaming `deltas`.
    pub fn with_stream_error<I, S>(self, deltas: I, error: MockError) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(MockResponse::FailAfter {
            deltas: deltas.into_iter().map(Into::into).collect(),
            error,
        })
    }

    /// Adds a response that streams `deltas` and then hangs.
    pub fn with_pending<I, S>(self, deltas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(MockResponse::Pending {
            deltas: deltas.into_iter().map(Into::into).collect(),
        })
    }

    /// Sets simulated latency before the stream opens.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sets simulated latency before each chunk.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Returns the number of calls made to this provider.
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Returns all recorded calls.
    pub fn get_calls(&self) -> Vec<CompletionRequest> {
        lock(&self.calls).clone()
    }

    /// Total chunks consumers have pulled from this provider's streams.
    pub fn chunks_yielded(&self) -> usize {
        self.chunks_yielded.load(Ordering::SeqCst)
    }

    /// Streams handed out and not yet dropped.
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    /// Gets the next response or a default.
    fn next_response(&self) -> MockResponse {
        lock(&self.responses)
            .pop_front()
            .unwrap_or_else(|| MockResponse::Chunks {
                deltas: vec!["Mock ".to_string(), "response".to_string()],
                usage: TokenUsage::new(5, 10),
            })
    }
}

/// Decrements the open-stream counter when a stream is dropped.
struct StreamGuard(Arc<AtomicUsize>);

impl StreamGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct ScriptState {
    items: VecDeque<Result<StreamChunk, AIError>>,
    hang_at_end: bool,
    chunk_delay: Duration,
    yielded: Arc<AtomicUsize>,
    _guard: StreamGuard,
}

#[async_trait]
impl AIProvider for MockAIProvider {
    async fn stream_complete(&self, request: CompletionRequest) -> Result<ChunkStream, AIError> {
        lock(&self.calls).push(request);

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        let content = |deltas: Vec<String>| {
            deltas
                .into_iter()
                .map(|d| Ok(StreamChunk::content(d)))
                .collect::<VecDeque<_>>()
        };

        let (items, hang_at_end) = match self.next_response() {
            MockResponse::Chunks { deltas, usage } => {
                let mut items = content(deltas);
                items.push_back(Ok(StreamChunk::final_chunk(FinishReason::Stop, usage)));
                (items, false)
            }
            MockResponse::FailAfter { deltas, error } => {
                let mut items = content(deltas);
                items.push_back(Err(error.into()));
                (items, false)
            }
            MockResponse::Pending { deltas } => (content(deltas), true),
            MockResponse::Error(err) => return Err(err.into()),
        };

        let state = ScriptState {
            items,
            hang_at_end,
            chunk_delay: self.chunk_delay,
            yielded: self.chunks_yielded.clone(),
            _guard: StreamGuard::new(self.open_streams.clone()),
        };

        let stream = stream::unfold(state, |mut st| async move {
            if !st.chunk_delay.is_zero() {
                sleep(st.chunk_delay).await;
            }
            match st.items.pop_front() {
                Some(item) => {
                    st.yielded.fetch_add(1, Ordering::SeqCst);
                    Some((item, st))
                }
                None if st.hang_at_end => {
                    future::pending::<()>().await;
                    None
                }
                None => None,
            }
        });

        Ok(Box::pin(stream))
    }

    fn provider_info(&self) -> ProviderInfo {
        self.info.clone()
    }
}
