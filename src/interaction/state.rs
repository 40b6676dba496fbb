//! Interaction lifecycle states and the transition table

use std::fmt;

/// Where the single interaction currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InteractionState {
    /// Waiting for the user
    #[default]
    Idle,
    /// Listening for a spoken command
    Recording,
    /// Waiting for the model to pick a meal
    Processing,
    /// Suggestion spoken, waiting for confirmation
    Confirming,
    /// Order confirmed, showing the result briefly
    OrderPlaced,
}

/// Something that may move the interaction to another state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The overloaded main control (start, cancel, or confirm)
    PrimaryAction,
    /// The explicit cancel control
    CancelControl,
    /// Speech capture produced a transcript
    CaptureSucceeded,
    /// Speech capture failed or heard nothing
    CaptureFailed,
    /// The model returned a suggestion
    DecisionResolved,
    /// The decision call failed
    DecisionRejected,
    /// The order-placed display time is over
    TimeoutElapsed,
}

/// What the main control does in the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryIntent {
    Start,
    Cancel,
    Confirm,
    None,
}

impl InteractionState {
    /// Next state for `trigger`, or `None` if the trigger does not apply here
    #[must_use]
    pub const fn on(self, trigger: Trigger) -> Option<Self> {
        use InteractionState::{Confirming, Idle, OrderPlaced, Processing, Recording};
        use Trigger::{
            CancelControl, CaptureFailed, CaptureSucceeded, DecisionRejected, DecisionResolved,
            PrimaryAction, TimeoutElapsed,
        };

        match (self, trigger) {
            (Idle, PrimaryAction) => Some(Recording),
            (Recording | Processing, PrimaryAction | CancelControl)
            | (Recording, CaptureFailed)
            | (Processing, DecisionRejected)
            | (Confirming, CancelControl)
            | (OrderPlaced, TimeoutElapsed) => Some(Idle),
            (Recording, CaptureSucceeded) => Some(Processing),
            (Processing, DecisionResolved) => Some(Confirming),
            (Confirming, PrimaryAction) => Some(OrderPlaced),
            _ => None,
        }
    }

    /// Meaning of the main control in this state
    #[must_use]
    pub const fn primary_intent(self) -> PrimaryIntent {
        match self {
            Self::Idle => PrimaryIntent::Start,
            Self::Recording | Self::Processing => PrimaryIntent::Cancel,
            Self::Confirming => PrimaryIntent::Confirm,
            Self::OrderPlaced => PrimaryIntent::None,
        }
    }
}

impl fmt::Display for InteractionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Processing => "processing",
            Self::Confirming => "confirming",
            Self::OrderPlaced => "order_placed",
        };
        f.write_str(name)
    }
}

/// User-visible status line
///
/// Presentation only; nothing branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Ready,
    Scanning,
    Listening,
    Processing,
    AwaitingConfirmation,
    Ordered,
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Ready => "Ready",
            Self::Scanning => "Scanning screen...",
            Self::Listening => "Listening...",
            Self::Processing => "Processing...",
            Self::AwaitingConfirmation => "Tap to Confirm",
            Self::Ordered => "Ordered!",
            Self::Error => "Error",
        };
        f.write_str(text)
    }
}
