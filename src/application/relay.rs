//! StreamRelay - forwards a provider's incremental output as relay events.
//!
//! One relay run per accepted request:
//!
//! 1. trim the history to the context window
//! 2. compose the system instruction for the request's language
//! 3. open the upstream stream and forward each text increment unchanged
//! 4. finish with exactly one `message_stop` or `error`, unless the caller
//!    went away first
//!
//! The caller's side of the channel is the only disconnect signal. Once the
//! receiver is dropped the run stops emitting, drops the upstream stream
//! (cancelling the provider call) and ends as `Aborted`.

use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::domain::chat::{
    trim_context, RelayState, StreamEvent, SystemPromptComposer, ValidatedRequest,
};
use crate::domain::foundation::StateMachine;
use crate::ports::{AIProvider, CompletionRequest, TokenUsage};

/// Buffered events between the relay task and the response writer.
const EVENT_BUFFER: usize = 32;

/// Generation settings applied to every relayed request.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Most recent messages forwarded upstream.
    pub context_window: usize,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            context_window: 20,
            max_tokens: 1024,
            temperature: None,
        }
    }
}

/// How a relay run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOutcome {
    pub request_id: String,
    pub state: RelayState,
    /// Text deltas delivered to the caller.
    pub deltas_sent: usize,
    pub usage: Option<TokenUsage>,
}

/// Relays upstream generation to one caller at a time per run.
pub struct StreamRelay {
    ai_provider: Arc<dyn AIProvider>,
    composer: SystemPromptComposer,
    settings: RelaySettings,
}

/// Per-run bookkeeping.
struct RelayRun {
    request_id: String,
    state: RelayState,
    deltas_sent: usize,
    usage: Option<TokenUsage>,
}

impl RelayRun {
    fn advance(&mut self, target: RelayState) {
        match self.state.transition_to(target) {
            Ok(next) => self.state = next,
            Err(e) => tracing::error!(request_id = %self.request_id, error = %e, "Invalid relay transition"),
        }
    }

    fn into_outcome(self) -> RelayOutcome {
        RelayOutcome {
            request_id: self.request_id,
            state: self.state,
            deltas_sent: self.deltas_sent,
            usage: self.usage,
        }
    }
}

/// Sends unless the caller has gone; returns false if it has.
async fn emit(tx: &mpsc::Sender<StreamEvent>, event: StreamEvent) -> bool {
    if tx.is_closed() {
        return false;
    }
    tx.send(event).await.is_ok()
}

impl StreamRelay {
    pub fn new(
        ai_provider: Arc<dyn AIProvider>,
        composer: SystemPromptComposer,
        settings: RelaySettings,
    ) -> Self {
        Self {
            ai_provider,
            composer,
            settings,
        }
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    /// Starts a run on its own task and returns the event receiver.
    ///
    /// Dropping the receiver aborts the run.
    pub fn spawn(
        self: Arc<Self>,
        request: ValidatedRequest,
    ) -> (mpsc::Receiver<StreamEvent>, JoinHandle<RelayOutcome>) {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let handle = tokio::spawn(async move { self.run(request, tx).await });
        (rx, handle)
    }

    /// Runs one relay to completion, writing events to `tx`.
    pub async fn run(&self, request: ValidatedRequest, tx: mpsc::Sender<StreamEvent>) -> RelayOutcome {
        let mut run = RelayRun {
            request_id: Uuid::new_v4().to_string(),
            state: RelayState::Open,
            deltas_sent: 0,
            usage: None,
        };

        let messages = trim_context(&request.messages, self.settings.context_window);
        tracing::debug!(
            request_id = %run.request_id,
            received = request.messages.len(),
            forwarded = messages.len(),
            language = ?request.language,
            "Relaying chat request"
        );

        let mut completion = CompletionRequest::new(run.request_id.clone())
            .with_messages(messages)
            .with_system_prompt(self.composer.compose(request.language.as_deref()))
            .with_max_tokens(self.settings.max_tokens);
        if let Some(temperature) = self.settings.temperature {
            completion = completion.with_temperature(temperature);
        }

        let opened = tokio::select! {
            biased;
            _ = tx.closed() => None,
            result = self.ai_provider.stream_complete(completion) => Some(result),
        };

        let mut stream = match opened {
            None => {
                tracing::info!(request_id = %run.request_id, "Caller disconnected before upstream opened");
                run.advance(RelayState::Aborted);
                return run.into_outcome();
            }
            Some(Ok(stream)) => stream,
            Some(Err(e)) => {
                let failure = e.failure_class();
                tracing::error!(
                    request_id = %run.request_id,
                    error = %e,
                    failure = ?failure,
                    "Upstream request failed"
                );
                if emit(&tx, StreamEvent::error(failure)).await {
                    run.advance(RelayState::Errored);
                } else {
                    run.advance(RelayState::Aborted);
                }
                return run.into_outcome();
            }
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = tx.closed() => {
                    run.advance(RelayState::Aborted);
                    break;
                }
                item = stream.next() => item,
            };

            match next {
                Some(Ok(chunk)) => {
                    if !chunk.delta.is_empty() {
                        if run.state == RelayState::Open {
                            run.advance(RelayState::Streaming);
                        }
                        if !emit(&tx, StreamEvent::text_delta(chunk.delta)).await {
                            run.advance(RelayState::Aborted);
                            break;
                        }
                        run.deltas_sent += 1;
                    }
                    if chunk.usage.is_some() {
                        run.usage = chunk.usage;
                    }
                }
                Some(Err(e)) => {
                    let failure = e.failure_class();
                    tracing::error!(
                        request_id = %run.request_id,
                        error = %e,
                        failure = ?failure,
                        deltas_sent = run.deltas_sent,
                        "Upstream stream failed"
                    );
                    if emit(&tx, StreamEvent::error(failure)).await {
                        run.advance(RelayState::Errored);
                    } else {
                        run.advance(RelayState::Aborted);
                    }
                    break;
                }
                None => {
                    if emit(&tx, StreamEvent::MessageStop).await {
                        run.advance(RelayState::Stopped);
                    } else {
                        run.advance(RelayState::Aborted);
                    }
                    break;
                }
            }
        }

        drop(stream);

        match (&run.state, &run.usage) {
            (RelayState::Aborted, _) => tracing::info!(
                request_id = %run.request_id,
                deltas_sent = run.deltas_sent,
                "Caller disconnected, relay aborted"
            ),
            (_, Some(usage)) => tracing::info!(
                request_id = %run.request_id,
                state = ?run.state,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Relay finished"
            ),
            (_, None) => tracing::info!(
                request_id = %run.request_id,
                state = ?run.state,
                deltas_sent = run.deltas_sent,
                "Relay finished"
            ),
        }

        run.into_outcome()
    }
}
