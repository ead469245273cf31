use anyhow::{Context, Result, anyhow};
use image::ImageFormat;
use std::{fmt, fs, path::Path};
use url::Url;

use crate::preview::Preview;

/// Shown in place of a prediction whenever a submission fails, whatever the cause.
pub const ERROR_MESSAGE: &str = "Error al procesar la imagen";

/// A file as handed over by a drop or a file picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub name: String,
    /// Media type reported by whoever delivered the file, if any.
    pub media_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: None,
            bytes,
        }
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    /// Read a file from disk. The media type is left to be sniffed.
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("Not a file path: {}", path.display()))?;

        let bytes =
            fs::read(path).with_context(|| format!("Failed to read image file: {}", path.display()))?;

        Ok(Self::new(name, bytes))
    }

    /// Declared media type, else sniffed from the content, else guessed from the name.
    pub fn effective_media_type(&self) -> Option<String> {
        if let Some(declared) = self.media_type.as_deref() {
            let essence = declared.split(';').next().unwrap_or_default().trim();
            if !essence.is_empty() {
                return Some(essence.to_ascii_lowercase());
            }
        }

        image::guess_format(&self.bytes)
            .or_else(|_| ImageFormat::from_path(&self.name))
            .ok()
            .map(|format| format.to_mime_type().to_string())
    }

    pub fn is_image(&self) -> bool {
        self.effective_media_type()
            .is_some_and(|mt| is_image_media_type(&mt))
    }

    /// File extension, used to name preview files.
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.name).extension().and_then(|ext| ext.to_str())
    }
}

/// `image/<subtype>` with a non-empty subtype made of RFC 6838 name characters.
pub fn is_image_media_type(media_type: &str) -> bool {
    media_type.strip_prefix("image/").is_some_and(|subtype| {
        !subtype.is_empty()
            && subtype
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "!#$&-^_.+".contains(c))
    })
}

/// The accepted file together with its preview reference.
///
/// Replaced wholesale on every new selection; dropping it releases the preview.
#[derive(Debug)]
pub struct SelectedImage {
    file: ImageFile,
    preview: Preview,
}

impl SelectedImage {
    pub(crate) fn new(file: ImageFile, preview: Preview) -> Self {
        Self { file, preview }
    }

    pub fn file(&self) -> &ImageFile {
        &self.file
    }

    pub fn name(&self) -> &str {
        &self.file.name
    }

    pub fn preview_url(&self) -> &Url {
        self.preview.url()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionState {
    #[default]
    Idle,
    Submitting,
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionState::Idle => f.write_str("idle"),
            SubmissionState::Submitting => f.write_str("submitting"),
        }
    }
}

/// Outcome of the last finished submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prediction {
    /// The `result` string returned by the service.
    Forecast(String),
    Failed,
}

impl Prediction {
    /// Text for the result panel.
    pub fn text(&self) -> &str {
        match self {
            Prediction::Forecast(text) => text,
            Prediction::Failed => ERROR_MESSAGE,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Prediction::Failed)
    }
}
