mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;


pub use orchestrator::PosecamApp;
pub use types::{AppStatus, Collaborators, Component, ComponentState, Lifecycle, ShutdownReason};
