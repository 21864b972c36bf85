mod gate;
mod reliability;
mod retry;

pub use gate::{Interaction, InteractionGate};
pub use reliability::{PlaybackOutcome, PlaybackReliability};
pub use retry::{RetryCounter, RetryDecision, RetryPolicy};
