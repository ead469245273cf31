//! Submission controller: the explicit state behind the prediction view.
//!
//! Holds the selection, the submission state and the last prediction. A
//! submission goes through three steps so the state can be observed while the
//! request is in flight:
//!
//! 1. [`PredictionController::begin_submit`] checks the guard, moves to
//!    `Submitting`, clears the old prediction and hands out a [`PendingSubmission`].
//! 2. [`PendingSubmission::run`] performs the upload without borrowing the controller.
//! 3. [`PredictionController::finish`] records the outcome and returns to `Idle`.
//!
//! [`PredictionController::submit`] chains the three.
//!
//! The in-flight flag travels with the pending submission and its [`Settled`]
//! result. Dropping either before `finish` (a cancelled future, a panicking
//! service) clears the flag, so the controller always gets back to `Idle`.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::{
    error::{PredictError, SelectionError},
    model::{ImageFile, Prediction, SelectedImage, SubmissionState},
    preview::PreviewStore,
    selection::{SelectionOutcome, SelectionSurface},
    service::PredictionService,
};

#[derive(Debug)]
pub struct PredictionController {
    service: Arc<dyn PredictionService>,
    surface: SelectionSurface,
    in_flight: Arc<AtomicBool>,
    prediction: Option<Prediction>,
}

/// Holds the controller in `Submitting` for as long as it lives.
#[derive(Debug)]
struct InFlight {
    flag: Arc<AtomicBool>,
    finished: bool,
}

impl InFlight {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                flag: Arc::clone(flag),
                finished: false,
            })
    }

    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!("submission abandoned before it finished");
        }
        self.flag.store(false, Ordering::Release);
    }
}

/// An upload that has been started and must be handed back to [`PredictionController::finish`].
#[derive(Debug)]
#[must_use = "the controller stays in `Submitting` until this is finished or dropped"]
pub struct PendingSubmission {
    image: ImageFile,
    service: Arc<dyn PredictionService>,
    guard: InFlight,
}

/// Result of [`PendingSubmission::run`].
#[derive(Debug)]
#[must_use = "pass this to `PredictionController::finish` to record the prediction"]
pub struct Settled {
    outcome: Result<String, PredictError>,
    guard: InFlight,
}

impl PendingSubmission {
    pub fn image(&self) -> &ImageFile {
        &self.image
    }

    pub async fn run(self) -> Settled {
        let PendingSubmission {
            image,
            service,
            guard,
        } = self;

        let outcome = service.predict(&image).await;
        Settled { outcome, guard }
    }
}

impl Settled {
    pub fn outcome(&self) -> &Result<String, PredictError> {
        &self.outcome
    }
}

impl PredictionController {
    pub fn new(service: Arc<dyn PredictionService>, previews: Arc<dyn PreviewStore>) -> Self {
        Self {
            service,
            surface: SelectionSurface::new(previews),
            in_flight: Arc::new(AtomicBool::new(false)),
            prediction: None,
        }
    }

    pub fn select<I>(&mut self, files: I) -> Result<SelectionOutcome, SelectionError>
    where
        I: IntoIterator<Item = ImageFile>,
    {
        self.surface.accept(files)
    }

    pub fn drag_enter(&mut self) {
        self.surface.drag_enter();
    }

    pub fn drag_leave(&mut self) {
        self.surface.drag_leave();
    }

    pub fn is_drag_active(&self) -> bool {
        self.surface.is_drag_active()
    }

    pub fn selected(&self) -> Option<&SelectedImage> {
        self.surface.selected()
    }

    pub fn state(&self) -> SubmissionState {
        if self.in_flight.load(Ordering::Acquire) {
            SubmissionState::Submitting
        } else {
            SubmissionState::Idle
        }
    }

    pub fn prediction(&self) -> Option<&Prediction> {
        self.prediction.as_ref()
    }

    pub fn prediction_text(&self) -> Option<&str> {
        self.prediction.as_ref().map(Prediction::text)
    }

    /// Whether the submit control should be enabled.
    pub fn can_submit(&self) -> bool {
        self.state() == SubmissionState::Idle && self.surface.selected().is_some()
    }

    /// Start a submission. `None` when nothing is selected or one is already running.
    pub fn begin_submit(&mut self) -> Option<PendingSubmission> {
        if self.state() == SubmissionState::Submitting {
            tracing::debug!("submission already in flight, ignoring submit");
            return None;
        }

        let Some(selected) = self.surface.selected() else {
            tracing::debug!("no image selected, ignoring submit");
            return None;
        };
        let image = selected.file().clone();

        let guard = InFlight::acquire(&self.in_flight)?;
        self.prediction = None;

        tracing::info!(name = %image.name, "submitting image for prediction");

        Some(PendingSubmission {
            image,
            service: Arc::clone(&self.service),
            guard,
        })
    }

    /// Record the outcome of a submission and return to `Idle`.
    pub fn finish(&mut self, settled: Settled) -> &Prediction {
        let Settled { outcome, guard } = settled;

        let prediction = match outcome {
            Ok(text) => {
                tracing::info!(prediction = %text, "prediction received");
                Prediction::Forecast(text)
            }
            Err(err) => {
                tracing::error!(error = %err, "prediction failed");
                Prediction::Failed
            }
        };

        guard.finish();
        self.prediction.insert(prediction)
    }

    /// Run a whole submission. `None` if the submit was a no-op.
    ///
    /// Dropping the returned future mid-request leaves the controller `Idle`
    /// with no prediction.
    pub async fn submit(&mut self) -> Option<&Prediction> {
        let pending = self.begin_submit()?;
        let settled = pending.run().await;
        Some(self.finish(settled))
    }
}
