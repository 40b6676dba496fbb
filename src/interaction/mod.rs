//! The listen → decide → confirm interaction

mod controller;
mod state;

pub use controller::{AssistantHandle, Collaborators, ControllerOptions, InteractionView, spawn};
pub use state::{InteractionState, PrimaryIntent, Status, Trigger};
