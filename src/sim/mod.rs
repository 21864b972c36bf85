//! Simulated collaborators.
//!
//! Every host-side trait has an in-process implementation here with
//! scriptable delays and failures. The test suite and the headless binary
//! run on these.

mod camera;
mod media;
mod share;
mod stage;

pub use camera::{SimCameraSource, SimCameraStream};
pub use media::{SimMediaBackend, SimMediaElement, SimScript};
pub use share::SimShareTarget;
pub use stage::{SimStage, StageCall};
