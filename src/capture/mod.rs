mod sequencer;
mod state;
#[cfg(test)]
mod tests;

pub use sequencer::{CaptureResult, CaptureSequencer, CaptureSequencerBuilder};
pub use state::{CaptureSession, Phase, SessionHandle};
