// Fall detection core: pose landmarks in, movement states and alerts out.
//
// The message-bus and GUI layers are thin adapters around these components;
// see the `fall-detection-cli` crate for the line-oriented message loop.

pub mod config;
pub mod errors;
pub mod models;
pub mod services;

pub use errors::{ClassifierError, EnvelopeError, InvalidFrameError, PipelineError};
