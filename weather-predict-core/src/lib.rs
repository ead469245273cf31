//! Core library for the `weather-predict` CLI.
//!
//! This crate defines:
//! - Configuration (prediction endpoint, optional timeout)
//! - The selection surface and preview references
//! - The prediction service abstraction and its HTTP implementation
//! - The submission controller tying them together
//!
//! Nothing here renders anything: a front end reads the controller's state and
//! forwards user actions to it.

pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod preview;
pub mod selection;
pub mod service;

pub use config::{Config, DEFAULT_ENDPOINT};
pub use controller::{PendingSubmission, PredictionController, Settled};
pub use error::{PredictError, SelectionError};
pub use model::{ERROR_MESSAGE, ImageFile, Prediction, SelectedImage, SubmissionState};
pub use preview::{MemoryPreviews, Preview, PreviewStore, TempDirPreviews};
pub use selection::{SelectionOutcome, SelectionSurface};
pub use service::{HttpPredictionService, PredictionService};
