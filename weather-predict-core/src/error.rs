//! Error types for selection and prediction.

use reqwest::StatusCode;
use thiserror::Error;

/// Why a submission attempt failed.
///
/// None of these reach the user as-is: the controller maps every variant to
/// [`crate::model::ERROR_MESSAGE`] and logs the detail.
#[derive(Error, Debug)]
pub enum PredictError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("prediction service answered with status {status}")]
    Server { status: StatusCode },

    #[error("cannot upload with media type '{0}'")]
    InvalidMediaType(String),

    #[error("malformed prediction response: {0}")]
    MalformedResponse(String),
}

/// Why a dropped or picked file was not taken as the new selection.
#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("'{name}' is not an image (media type: {media_type})")]
    UnsupportedMediaType { name: String, media_type: String },

    #[error("failed to create preview for '{name}': {source}")]
    Preview {
        name: String,
        #[source]
        source: std::io::Error,
    },
}
