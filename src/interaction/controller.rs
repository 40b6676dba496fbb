//! Interaction controller
//!
//! A single task owns the interaction state. User events and the completions
//! of spawned work arrive on one channel; every state change advances an
//! epoch, and a completion is applied only if it carries the current epoch
//! and the state is the one it was issued from.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::state::{InteractionState, Status, Trigger};
use crate::ai::AiClient;
use crate::config::{Config, DEFAULT_ADDRESSES, DEFAULT_WELCOME_MESSAGE};
use crate::order::{OrderRecord, Suggestion};
use crate::screen::ScreenSnapshotProvider;
use crate::voice::{AudioOutput, CaptureHandle, CaptureOutcome, CaptureSession, SpeechCapture};
use crate::{Error, Result};

/// Longest a single line may take to synthesize and queue
const SPEECH_TIMEOUT: Duration = Duration::from_secs(45);

/// Capabilities the controller drives
#[derive(Clone)]
pub struct Collaborators {
    pub ai: Arc<dyn AiClient>,
    pub capture: Arc<dyn SpeechCapture>,
    pub audio: Arc<dyn AudioOutput>,
    /// `None` when no screen capture is available; scans are skipped
    pub screen: Option<Arc<dyn ScreenSnapshotProvider>>,
}

/// Fixed parameters of an interaction
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Location passed to every decision
    pub location: String,
    /// How long the order-placed state lasts
    pub order_placed_delay: Duration,
    /// Spoken after a successful scan
    pub welcome_message: Option<String>,
}

impl ControllerOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            location: config.ordering.location().to_string(),
            order_placed_delay: config.ordering.order_placed_delay,
            welcome_message: config.ordering.welcome_message.clone(),
        }
    }
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            location: DEFAULT_ADDRESSES[0].to_string(),
            order_placed_delay: Duration::from_secs(3),
            welcome_message: Some(DEFAULT_WELCOME_MESSAGE.to_string()),
        }
    }
}

/// Snapshot of the interaction for front ends
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InteractionView {
    pub state: InteractionState,
    pub status: Status,
    pub suggestion: Option<Suggestion>,
    pub history_len: usize,
    pub epoch: u64,
}

enum Event {
    PrimaryAction,
    Cancel,
    ScanHistory,
    ReplaceHistory(Vec<OrderRecord>),
    History(oneshot::Sender<Vec<OrderRecord>>),
    Settle(oneshot::Sender<()>),
    Shutdown,
    CaptureFinished {
        epoch: u64,
        outcome: CaptureOutcome,
    },
    DecisionFinished {
        epoch: u64,
        result: Result<Suggestion>,
    },
    SuggestionSpoken {
        epoch: u64,
    },
    ScanFinished {
        epoch: u64,
        history: Option<Vec<OrderRecord>>,
    },
    OrderTimeout {
        epoch: u64,
    },
}

/// Cloneable handle to a running controller
#[derive(Clone)]
pub struct AssistantHandle {
    tx: mpsc::UnboundedSender<Event>,
    view: watch::Receiver<InteractionView>,
}

impl AssistantHandle {
    fn send(&self, event: Event) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|_| Error::Interaction("controller stopped".to_string()))
    }

    /// Press the main control: start, cancel, or confirm depending on state
    ///
    /// # Errors
    ///
    /// Returns error if the controller has stopped
    pub fn primary_action(&self) -> Result<()> {
        self.send(Event::PrimaryAction)
    }

    /// Press the cancel control
    ///
    /// # Errors
    ///
    /// Returns error if the controller has stopped
    pub fn cancel(&self) -> Result<()> {
        self.send(Event::Cancel)
    }

    /// Snapshot the screen and replace the order history from it
    ///
    /// # Errors
    ///
    /// Returns error if the controller has stopped
    pub fn scan_history(&self) -> Result<()> {
        self.send(Event::ScanHistory)
    }

    /// Replace the order history directly
    ///
    /// # Errors
    ///
    /// Returns error if the controller has stopped
    pub fn replace_history(&self, history: Vec<OrderRecord>) -> Result<()> {
        self.send(Event::ReplaceHistory(history))
    }

    /// Current order history
    ///
    /// # Errors
    ///
    /// Returns error if the controller has stopped
    pub async fn history(&self) -> Result<Vec<OrderRecord>> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::History(tx))?;
        rx.await
            .map_err(|_| Error::Interaction("controller stopped".to_string()))
    }

    /// Latest published view
    #[must_use]
    pub fn view(&self) -> InteractionView {
        self.view.borrow().clone()
    }

    /// Watch every published view
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<InteractionView> {
        self.view.clone()
    }

    /// Wait until a published view satisfies `predicate`
    ///
    /// # Errors
    ///
    /// Returns error if the controller stops first
    pub async fn wait_until(
        &self,
        predicate: impl FnMut(&InteractionView) -> bool,
    ) -> Result<InteractionView> {
        let mut rx = self.view.clone();
        let view = rx
            .wait_for(predicate)
            .await
            .map_err(|_| Error::Interaction("controller stopped".to_string()))?;
        Ok(view.clone())
    }

    /// Wait until every event sent before this call has been handled
    ///
    /// # Errors
    ///
    /// Returns error if the controller has stopped
    pub async fn settle(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::Settle(tx))?;
        rx.await
            .map_err(|_| Error::Interaction("controller stopped".to_string()))
    }

    /// Stop the controller, cancelling any capture in progress
    ///
    /// # Errors
    ///
    /// Returns error if the controller has already stopped
    pub fn shutdown(&self) -> Result<()> {
        self.send(Event::Shutdown)
    }
}

/// Start a controller task
///
/// The task ends on [`AssistantHandle::shutdown`] or when every handle is
/// dropped and no spawned work is outstanding.
#[must_use]
pub fn spawn(
    collaborators: Collaborators,
    options: ControllerOptions,
) -> (AssistantHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (view_tx, view) = watch::channel(InteractionView::default());

    let controller = Controller {
        collaborators,
        options,
        events: tx.downgrade(),
        view_tx,
        epoch_tx: watch::Sender::new(0),
        state: InteractionState::Idle,
        status: Status::Ready,
        epoch: 0,
        suggestion: None,
        history: Vec::new(),
        capture: None,
    };

    let task = tokio::spawn(controller.run(rx));
    (AssistantHandle { tx, view }, task)
}

struct Controller {
    collaborators: Collaborators,
    options: ControllerOptions,
    events: mpsc::WeakUnboundedSender<Event>,
    view_tx: watch::Sender<InteractionView>,
    epoch_tx: watch::Sender<u64>,
    state: InteractionState,
    status: Status,
    epoch: u64,
    suggestion: Option<Suggestion>,
    history: Vec<OrderRecord>,
    capture: Option<CaptureHandle>,
}

impl Controller {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Event>) {
        tracing::debug!("interaction controller started");

        while let Some(event) = rx.recv().await {
            if matches!(event, Event::Shutdown) {
                break;
            }
            self.handle(event);
            self.publish();
        }

        if let Some(capture) = self.capture.take() {
            capture.cancel();
        }
        tracing::debug!("interaction controller stopped");
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::PrimaryAction => self.on_primary_action(),
            Event::Cancel => {
                self.transition(Trigger::CancelControl, Status::Ready);
            }
            Event::ScanHistory => self.start_scan(),
            Event::ReplaceHistory(history) => {
                tracing::info!(orders = history.len(), "order history replaced");
                self.history = history;
            }
            Event::History(reply) => {
                let _ = reply.send(self.history.clone());
            }
            Event::Settle(reply) => {
                let _ = reply.send(());
            }
            Event::Shutdown => {}
            Event::CaptureFinished { epoch, outcome } => {
                if self.is_current(epoch, InteractionState::Recording, "capture") {
                    self.on_capture_finished(outcome);
                }
            }
            Event::DecisionFinished { epoch, result } => {
                if self.is_current(epoch, InteractionState::Processing, "decision") {
                    self.on_decision_finished(result);
                }
            }
            Event::SuggestionSpoken { epoch } => {
                if self.is_current(epoch, InteractionState::Processing, "suggestion speech") {
                    self.transition(Trigger::DecisionResolved, Status::AwaitingConfirmation);
                }
            }
            Event::ScanFinished { epoch, history } => self.on_scan_finished(epoch, history),
            Event::OrderTimeout { epoch } => {
                if self.is_current(epoch, InteractionState::OrderPlaced, "order timeout") {
                    self.transition(Trigger::TimeoutElapsed, Status::Ready);
                }
            }
        }
    }

    fn is_current(&self, epoch: u64, expected: InteractionState, what: &str) -> bool {
        let current = epoch == self.epoch && self.state == expected;
        if !current {
            tracing::debug!(
                what,
                epoch,
                current_epoch = self.epoch,
                state = %self.state,
                "discarding stale completion"
            );
        }
        current
    }

    /// Apply a trigger; returns whether the state changed
    fn transition(&mut self, trigger: Trigger, status: Status) -> bool {
        let Some(next) = self.state.on(trigger) else {
            tracing::debug!(state = %self.state, ?trigger, "trigger ignored");
            return false;
        };

        tracing::info!(from = %self.state, to = %next, ?trigger, "interaction transition");

        if let Some(capture) = self.capture.take() {
            capture.cancel();
        }

        self.state = next;
        self.status = status;
        self.epoch += 1;
        self.epoch_tx.send_replace(self.epoch);

        if next == InteractionState::Idle {
            self.suggestion = None;
        }
        true
    }

    fn on_primary_action(&mut self) {
        match self.state {
            InteractionState::Idle => {
                if self.transition(Trigger::PrimaryAction, Status::Listening) {
                    self.start_capture();
                }
            }
            InteractionState::Confirming => {
                if self.transition(Trigger::PrimaryAction, Status::Ordered) {
                    self.start_order_timer();
                    self.confirm_order();
                }
            }
            InteractionState::Recording | InteractionState::Processing => {
                self.transition(Trigger::PrimaryAction, Status::Ready);
            }
            InteractionState::OrderPlaced => {
                tracing::debug!(state = %self.state, "primary action ignored");
            }
        }
    }

    fn on_capture_finished(&mut self, outcome: CaptureOutcome) {
        match outcome {
            CaptureOutcome::Transcript(command) => {
                tracing::info!(command = %command, "command heard");
                if self.transition(Trigger::CaptureSucceeded, Status::Processing) {
                    self.start_decision(command);
                }
            }
            CaptureOutcome::NoSpeech | CaptureOutcome::Cancelled => {
                tracing::info!("no command heard");
                self.transition(Trigger::CaptureFailed, Status::Ready);
            }
            CaptureOutcome::Failed(reason) => {
                tracing::warn!(reason = %reason, "speech capture failed");
                self.transition(Trigger::CaptureFailed, Status::Ready);
            }
        }
    }

    fn on_decision_finished(&mut self, result: Result<Suggestion>) {
        match result {
            Ok(suggestion) => {
                tracing::info!(
                    meal = %suggestion.suggested_meal,
                    restaurant = %suggestion.restaurant,
                    new_location = suggestion.is_new_location,
                    "suggestion received"
                );
                let line = suggestion.spoken_response.clone();
                self.suggestion = Some(suggestion);
                self.speak(line, Some(Event::SuggestionSpoken { epoch: self.epoch }));
            }
            Err(e) => {
                tracing::warn!(error = %e, "decision failed");
                self.transition(Trigger::DecisionRejected, Status::Error);
            }
        }
    }

    fn on_scan_finished(&mut self, epoch: u64, history: Option<Vec<OrderRecord>>) {
        let scanned = history.is_some();
        if let Some(history) = history {
            tracing::info!(orders = history.len(), "order history updated from screen");
            self.history = history;
        }

        if epoch != self.epoch {
            tracing::debug!(
                epoch,
                current_epoch = self.epoch,
                "scan finished after interaction moved on"
            );
            return;
        }

        if self.status == Status::Scanning {
            self.status = Status::Ready;
        }
        if scanned
            && self.state == InteractionState::Idle
            && let Some(welcome) = self.options.welcome_message.clone()
        {
            self.speak(welcome, None);
        }
    }

    fn post(&self) -> Option<mpsc::UnboundedSender<Event>> {
        self.events.upgrade()
    }

    fn start_capture(&mut self) {
        let Some(tx) = self.post() else { return };
        let epoch = self.epoch;
        let session = CaptureSession::start(Arc::clone(&self.collaborators.capture));
        self.capture = Some(session.handle());

        tokio::spawn(async move {
            let outcome = session.finished().await;
            let _ = tx.send(Event::CaptureFinished { epoch, outcome });
        });
    }

    fn start_decision(&self, command: String) {
        let Some(tx) = self.post() else { return };
        let epoch = self.epoch;
        let ai = Arc::clone(&self.collaborators.ai);
        let history = self.history.clone();
        let location = self.options.location.clone();

        tokio::spawn(async move {
            let result = ai.decide(&command, &history, &location).await;
            let _ = tx.send(Event::DecisionFinished { epoch, result });
        });
    }

    fn confirm_order(&self) {
        let Some(suggestion) = &self.suggestion else {
            tracing::warn!("confirmed without a suggestion");
            return;
        };

        tracing::info!(
            meal = %suggestion.suggested_meal,
            restaurant = %suggestion.restaurant,
            "order placed"
        );

        self.speak(suggestion.confirmation_line(), None);
    }

    /// Return to idle after the order-placed delay, whatever the speech does
    fn start_order_timer(&self) {
        let Some(tx) = self.post() else { return };
        let epoch = self.epoch;
        let delay = self.options.order_placed_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Event::OrderTimeout { epoch });
        });
    }

    fn start_scan(&mut self) {
        let Some(screen) = self.collaborators.screen.clone() else {
            tracing::info!("screen capture unavailable, scan skipped");
            return;
        };
        let Some(tx) = self.post() else { return };

        if self.state == InteractionState::Idle {
            self.status = Status::Scanning;
        }

        let epoch = self.epoch;
        let ai = Arc::clone(&self.collaborators.ai);

        tokio::spawn(async move {
            let history = match screen.snapshot().await {
                Ok(image) => Some(ai.extract_history(&image).await),
                Err(e) => {
                    tracing::warn!(error = %e, "scan skipped");
                    None
                }
            };
            let _ = tx.send(Event::ScanFinished { epoch, history });
        });
    }

    /// Synthesize and play `text` unless the interaction moves on first,
    /// then post `then`
    ///
    /// Speech that takes longer than [`SPEECH_TIMEOUT`] is abandoned and
    /// `then` is posted anyway.
    fn speak(&self, text: String, then: Option<Event>) {
        let tx = self.post();
        let epoch = self.epoch;
        let ai = Arc::clone(&self.collaborators.ai);
        let audio = Arc::clone(&self.collaborators.audio);
        let current_epoch = self.epoch_tx.subscribe();

        tokio::spawn(async move {
            let spoken = tokio::time::timeout(SPEECH_TIMEOUT, async {
                let encoded = ai.synthesize_speech(&text).await;

                if *current_epoch.borrow() != epoch {
                    tracing::debug!(epoch, "interaction moved on, speech dropped");
                } else if let Some(encoded) = encoded
                    && let Err(e) = audio.play(&encoded).await
                {
                    tracing::warn!(error = %e, "playback failed");
                }
            })
            .await;

            if spoken.is_err() {
                tracing::warn!(epoch, timeout = ?SPEECH_TIMEOUT, "speech timed out");
            }

            if let Some(event) = then
                && let Some(tx) = tx
            {
                let _ = tx.send(event);
            }
        });
    }

    fn publish(&self) {
        let view = InteractionView {
            state: self.state,
            status: self.status,
            suggestion: self.suggestion.clone(),
            history_len: self.history.len(),
            epoch: self.epoch,
        };

        self.view_tx.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }
}
