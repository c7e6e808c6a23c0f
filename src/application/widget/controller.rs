//! ConversationController - the widget's view and request state machines.
//!
//! The view (`home`/`chat`/`stores`/`catalog`) and the request lifecycle
//! (`Idle`/`Submitting`/`Streaming`) are independent; the controller owns
//! both plus the display history.
//!
//! A submission spawns a reader task that pulls relay events from the
//! transport and forwards them over a channel. [`ConversationController::next_update`]
//! consumes that channel, applying the thinking floor while `Submitting`.
//! Cancelling drops the channel and aborts the reader, so anything still in
//! flight is discarded without reaching the display.

use futures::StreamExt;
use std::mem;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::domain::chat::{trim_context, Message, StreamEvent};
use crate::domain::foundation::{InvalidTransition, StateMachine};
use crate::domain::widget::{
    CancelPolicy, DisplayMessage, DisplayRole, RequestStatus, View, ViewKind,
};
use crate::ports::{ChatRequest, ChatTransport, TransportError};

use super::config::ControllerConfig;

/// Items buffered between the reader task and the controller.
const INBOX_BUFFER: usize = 64;

/// Shown when the relay closes the stream without a terminal event.
const INCOMPLETE_RESPONSE: &str = "The response ended unexpectedly. Please try again.";

/// Visible change produced by [`ConversationController::next_update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerUpdate {
    /// The thinking indicator gave way to the first visible text.
    StreamingStarted { text: String },
    /// More text was appended to the in-progress message.
    TextAppended { text: String },
    /// The reply finished; `content` is the finalized text.
    Completed { content: String },
    /// The request failed; `message` was added to the history.
    Failed { message: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControllerError {
    #[error("message is empty")]
    EmptyMessage,

    #[error("a request is in flight")]
    Busy,

    #[error("action requires the {expected:?} view, current view is {actual:?}")]
    WrongView { expected: ViewKind, actual: ViewKind },

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

/// What the reader task hands to the controller.
#[derive(Debug)]
enum Inbound {
    Event(StreamEvent),
    Failed(TransportError),
    /// The event stream closed without a terminal event.
    Ended,
}

/// The one open submission.
struct ActiveRequest {
    inbox: mpsc::Receiver<Inbound>,
    reader: JoinHandle<()>,
    started: Instant,
    /// Text received but not yet shown.
    pending: String,
    /// Terminal item received while the thinking floor was still running.
    deferred: Option<Inbound>,
    /// Position of the streaming message in the history.
    streaming_index: Option<usize>,
}

impl Drop for ActiveRequest {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

enum Wake {
    Floor,
    Item(Option<Inbound>),
}

/// Drives one widget instance.
pub struct ConversationController {
    transport: Arc<dyn ChatTransport>,
    config: ControllerConfig,
    view: View,
    status: RequestStatus,
    history: Vec<DisplayMessage>,
    active: Option<ActiveRequest>,
}

impl ConversationController {
    pub fn new(transport: Arc<dyn ChatTransport>, config: ControllerConfig) -> Self {
        Self {
            transport,
            config,
            view: View::default(),
            status: RequestStatus::Idle,
            history: Vec::new(),
            active: None,
        }
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn history(&self) -> &[DisplayMessage] {
        &self.history
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn is_busy(&self) -> bool {
        self.status.is_in_flight()
    }

    // ─── Views ───────────────────────────────────────────────────────

    /// Switches view; an in-flight stream keeps running.
    pub fn navigate(&mut self, kind: ViewKind) {
        self.view = View::enter(kind);
    }

    /// Cancels any in-flight stream and returns to the home view.
    pub fn reset_to_home(&mut self) {
        self.cancel();
        self.view = View::Home;
    }

    pub fn select_store(&mut self, store: impl Into<String>) -> Result<(), ControllerError> {
        match &mut self.view {
            View::Stores { selected_store } => {
                *selected_store = Some(store.into());
                Ok(())
            }
            other => Err(ControllerError::WrongView {
                expected: ViewKind::Stores,
                actual: other.kind(),
            }),
        }
    }

    pub fn select_category(&mut self, category: impl Into<String>) -> Result<(), ControllerError> {
        match &mut self.view {
            View::Catalog { selected_category } => {
                *selected_category = Some(category.into());
                Ok(())
            }
            other => Err(ControllerError::WrongView {
                expected: ViewKind::Catalog,
                actual: other.kind(),
            }),
        }
    }

    // ─── History ─────────────────────────────────────────────────────

    /// Seeds the display history, e.g. from client-local storage.
    ///
    /// Unfinished streaming entries are dropped.
    pub fn restore_history(&mut self, history: Vec<DisplayMessage>) -> Result<(), ControllerError> {
        if self.is_busy() {
            return Err(ControllerError::Busy);
        }
        self.history = history
            .into_iter()
            .filter(|m| m.role != DisplayRole::Streaming)
            .collect();
        Ok(())
    }

    /// Conversation sent to the relay: finalized user and assistant
    /// entries, most recent `max_outbound_messages` only.
    fn outbound_messages(&self) -> Vec<Message> {
        let all: Vec<_> = self
            .history
            .iter()
            .filter_map(DisplayMessage::to_outbound)
            .collect();
        trim_context(&all, self.config.max_outbound_messages)
    }

    // ─── Request Lifecycle ───────────────────────────────────────────

    /// Appends a user message and opens a relay connection.
    ///
    /// An in-flight request is cancelled first. Must be called from within
    /// a Tokio runtime.
    pub fn submit(&mut self, text: &str) -> Result<(), ControllerError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ControllerError::EmptyMessage);
        }

        if self.is_busy() {
            self.cancel();
        }
        self.status = self.status.transition_to(RequestStatus::Submitting)?;

        self.history.push(DisplayMessage::user(text));
        self.view = View::Chat;

        let request = ChatRequest {
            messages: self.outbound_messages(),
            language: self.config.language.clone(),
        };
        let (tx, rx) = mpsc::channel(INBOX_BUFFER);
        let reader = tokio::spawn(read_events(self.transport.clone(), request, tx));

        self.active = Some(ActiveRequest {
            inbox: rx,
            reader,
            started: Instant::now(),
            pending: String::new(),
            deferred: None,
            streaming_index: None,
        });
        Ok(())
    }

    /// Aborts the open connection and returns to `Idle`.
    ///
    /// Shown text is kept or removed per the cancel policy; text not yet
    /// shown is discarded. Returns false if nothing was in flight.
    pub fn cancel(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        let streaming_index = active.streaming_index;
        drop(active);

        if let Some(index) = streaming_index {
            match self.config.cancel_policy {
                CancelPolicy::KeepPartial => self.history[index].role = DisplayRole::Assistant,
                CancelPolicy::Discard => {
                    self.history.remove(index);
                }
            }
        }

        self.set_status(RequestStatus::Idle);
        tracing::debug!(policy = ?self.config.cancel_policy, "Request cancelled");
        true
    }

    /// Waits for the next visible change of the in-flight request.
    ///
    /// Returns `None` when nothing is in flight.
    pub async fn next_update(&mut self) -> Option<ControllerUpdate> {
        loop {
            match self.status {
                RequestStatus::Idle => return None,
                RequestStatus::Submitting => {
                    if let Some(update) = self.step_submitting().await {
                        return Some(update);
                    }
                }
                RequestStatus::Streaming => return Some(self.step_streaming().await),
            }
        }
    }

    /// Runs the in-flight request to completion, collecting every update.
    pub async fn run_to_idle(&mut self) -> Vec<ControllerUpdate> {
        let mut updates = Vec::new();
        while let Some(update) = self.next_update().await {
            updates.push(update);
        }
        updates
    }

    /// One wake-up while `Submitting`; `None` means keep waiting.
    async fn step_submitting(&mut self) -> Option<ControllerUpdate> {
        let floor_delay = self.config.min_thinking();
        if self.active.is_none() {
            self.set_status(RequestStatus::Idle);
            return None;
        }
        let active = self.active.as_mut()?;
        let floor = active.started + floor_delay;
        let ready = !active.pending.is_empty() || active.deferred.is_some();

        let wake = tokio::select! {
            biased;
            _ = sleep_until(floor), if ready => Wake::Floor,
            item = active.inbox.recv(), if active.deferred.is_none() => Wake::Item(item),
        };

        match wake {
            Wake::Item(Some(Inbound::Event(StreamEvent::TextDelta { text }))) => {
                active.pending.push_str(&text);
                None
            }
            Wake::Item(Some(item)) => {
                active.deferred = Some(item);
                None
            }
            Wake::Item(None) => {
                active.deferred = Some(Inbound::Ended);
                None
            }
            Wake::Floor if !active.pending.is_empty() => {
                let text = mem::take(&mut active.pending);
                active.streaming_index = Some(self.history.len());
                self.history
                    .push(DisplayMessage::new(DisplayRole::Streaming, text.clone()));
                self.set_status(RequestStatus::Streaming);
                Some(ControllerUpdate::StreamingStarted { text })
            }
            Wake::Floor => {
                let item = active.deferred.take().unwrap_or(Inbound::Ended);
                Some(self.finish(item))
            }
        }
    }

    /// One item while `Streaming`.
    async fn step_streaming(&mut self) -> ControllerUpdate {
        let (item, index) = match self.active.as_mut() {
            Some(active) => {
                let item = match active.deferred.take() {
                    Some(item) => Some(item),
                    None => active.inbox.recv().await,
                };
                (item, active.streaming_index)
            }
            None => (None, None),
        };

        match (item, index) {
            (Some(Inbound::Event(StreamEvent::TextDelta { text })), Some(index)) => {
                self.history[index].content.push_str(&text);
                ControllerUpdate::TextAppended { text }
            }
            (Some(item), _) => self.finish(item),
            (None, _) => self.finish(Inbound::Ended),
        }
    }

    /// Closes the active request with a terminal item and returns to `Idle`.
    fn finish(&mut self, item: Inbound) -> ControllerUpdate {
        let streaming_index = self.active.take().and_then(|a| a.streaming_index);
        let shown = streaming_index.map(|index| {
            self.history[index].role = DisplayRole::Assistant;
            self.history[index].content.clone()
        });
        self.set_status(RequestStatus::Idle);

        let failure = match item {
            Inbound::Event(StreamEvent::MessageStop) => {
                return ControllerUpdate::Completed {
                    content: shown.unwrap_or_default(),
                };
            }
            Inbound::Event(StreamEvent::Error { message }) => message,
            Inbound::Event(StreamEvent::TextDelta { .. }) | Inbound::Ended => {
                INCOMPLETE_RESPONSE.to_string()
            }
            Inbound::Failed(e) => {
                tracing::warn!(error = %e, "Relay request failed");
                e.user_message()
            }
        };

        if let Some(index) = streaming_index {
            if self.history[index].content.is_empty() {
                self.history.remove(index);
            }
        }
        self.history.push(DisplayMessage::error(failure.clone()));
        ControllerUpdate::Failed { message: failure }
    }

    fn set_status(&mut self, target: RequestStatus) {
        if self.status == target {
            return;
        }
        match self.status.transition_to(target) {
            Ok(next) => self.status = next,
            Err(e) => {
                tracing::error!(error = %e, "Invalid request transition");
                self.status = target;
            }
        }
    }
}

/// Reader task: opens the relay connection and forwards its events until a
/// terminal event, a failure, or the controller hanging up.
async fn read_events(
    transport: Arc<dyn ChatTransport>,
    request: ChatRequest,
    tx: mpsc::Sender<Inbound>,
) {
    let opened = tokio::select! {
        biased;
        _ = tx.closed() => return,
        opened = transport.open(request) => opened,
    };

    let mut events = match opened {
        Ok(events) => events,
        Err(e) => {
            let _ = tx.send(Inbound::Failed(e)).await;
            return;
        }
    };

    loop {
        let next = tokio::select! {
            biased;
            _ = tx.closed() => return,
            next = events.next() => next,
        };

        let (inbound, done) = match next {
            Some(Ok(event)) => {
                let terminal = event.is_terminal();
                (Inbound::Event(event), terminal)
            }
            Some(Err(e)) => (Inbound::Failed(e), true),
            None => (Inbound::Ended, true),
        };

        if tx.send(inbound).await.is_err() || done {
            return;
        }
    }
}
