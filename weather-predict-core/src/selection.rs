//! The selection surface: takes dropped or picked files and keeps the current image.

use std::sync::Arc;

use crate::{
    error::SelectionError,
    model::{ImageFile, SelectedImage, is_image_media_type},
    preview::{Preview, PreviewStore},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// Nothing was delivered; the previous selection stays.
    Unchanged,
    /// The first file became the selection; `ignored` further files were dropped.
    Selected { ignored: usize },
}

#[derive(Debug)]
pub struct SelectionSurface {
    store: Arc<dyn PreviewStore>,
    current: Option<SelectedImage>,
    drag_active: bool,
}

impl SelectionSurface {
    pub fn new(store: Arc<dyn PreviewStore>) -> Self {
        Self {
            store,
            current: None,
            drag_active: false,
        }
    }

    pub fn selected(&self) -> Option<&SelectedImage> {
        self.current.as_ref()
    }

    pub fn is_drag_active(&self) -> bool {
        self.drag_active
    }

    pub fn drag_enter(&mut self) {
        self.drag_active = true;
    }

    pub fn drag_leave(&mut self) {
        self.drag_active = false;
    }

    /// Handle a drop or a picker result.
    ///
    /// Only the first file is considered. A non-image file is rejected and the
    /// current selection is kept. Always ends the drag-over state.
    pub fn accept<I>(&mut self, files: I) -> Result<SelectionOutcome, SelectionError>
    where
        I: IntoIterator<Item = ImageFile>,
    {
        self.drag_active = false;

        let mut files = files.into_iter();
        let Some(mut file) = files.next() else {
            tracing::debug!("drop delivered no files");
            return Ok(SelectionOutcome::Unchanged);
        };

        let ignored = files.count();
        if ignored > 0 {
            tracing::debug!(ignored, kept = %file.name, "keeping only the first file");
        }

        let media_type = file.effective_media_type();
        match media_type {
            Some(mt) if is_image_media_type(&mt) => file.media_type = Some(mt),
            other => {
                let media_type = other.unwrap_or_else(|| "unknown".to_string());
                tracing::warn!(name = %file.name, %media_type, "rejected non-image file");
                return Err(SelectionError::UnsupportedMediaType {
                    name: file.name,
                    media_type,
                });
            }
        }

        let preview = Preview::create(&self.store, &file).map_err(|source| SelectionError::Preview {
            name: file.name.clone(),
            source,
        })?;

        tracing::info!(name = %file.name, bytes = file.bytes.len(), "image selected");

        // The replaced selection drops here and releases its preview.
        self.current = Some(SelectedImage::new(file, preview));

        Ok(SelectionOutcome::Selected { ignored })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::MemoryPreviews;

    fn surface() -> (Arc<MemoryPreviews>, SelectionSurface) {
        let memory = Arc::new(MemoryPreviews::new());
        let surface = SelectionSurface::new(memory.clone());
        (memory, surface)
    }

    fn png(name: &str) -> ImageFile {
        ImageFile::new(name, vec![1, 2, 3]).with_media_type("image/png")
    }

    #[test]
    fn empty_drop_keeps_selection() {
        let (memory, mut surface) = surface();
        surface.accept([png("a.png")]).expect("select");

        let outcome = surface.accept(Vec::<ImageFile>::new()).expect("empty drop");

        assert_eq!(outcome, SelectionOutcome::Unchanged);
        assert_eq!(surface.selected().map(|s| s.name()), Some("a.png"));
        assert!(memory.released().is_empty());
    }

    #[test]
    fn multi_drop_keeps_first() {
        let (memory, mut surface) = surface();

        let outcome = surface
            .accept([png("first.png"), png("second.png"), png("third.png")])
            .expect("select");

        assert_eq!(outcome, SelectionOutcome::Selected { ignored: 2 });
        assert_eq!(surface.selected().map(|s| s.name()), Some("first.png"));
        assert_eq!(memory.live().len(), 1);
    }

    #[test]
    fn new_selection_releases_previous_preview_once() {
        let (memory, mut surface) = surface();

        surface.accept([png("a.png")]).expect("select a");
        let first_url = surface.selected().map(|s| s.preview_url().clone()).expect("url");

        surface.accept([png("b.png")]).expect("select b");
        let second_url = surface.selected().map(|s| s.preview_url().clone()).expect("url");

        assert_ne!(first_url, second_url);
        assert_eq!(memory.released(), vec![first_url]);
        assert_eq!(memory.live(), vec![second_url.clone()]);

        drop(surface);
        assert_eq!(memory.released().iter().filter(|u| **u == second_url).count(), 1);
        assert!(memory.live().is_empty());
    }

    #[test]
    fn non_image_rejected_and_selection_kept() {
        let (memory, mut surface) = surface();
        surface.accept([png("a.png")]).expect("select");

        let err = surface
            .accept([ImageFile::new("notes.txt", b"hola".to_vec()).with_media_type("text/plain")])
            .unwrap_err();

        assert!(matches!(err, SelectionError::UnsupportedMediaType { ref media_type, .. } if media_type == "text/plain"));
        assert_eq!(surface.selected().map(|s| s.name()), Some("a.png"));
        assert!(memory.released().is_empty());
    }

    #[test]
    fn malformed_image_media_type_rejected() {
        let (_memory, mut surface) = surface();

        for media_type in ["image/", "image/<png>"] {
            let err = surface
                .accept([ImageFile::new("raro.png", vec![1]).with_media_type(media_type)])
                .unwrap_err();
            assert!(matches!(err, SelectionError::UnsupportedMediaType { .. }));
        }
        assert!(surface.selected().is_none());
    }

    #[test]
    fn accepted_file_carries_effective_media_type() {
        let (_memory, mut surface) = surface();
        surface
            .accept([ImageFile::new("foto.jpeg", b"data".to_vec())])
            .expect("select");

        let selected = surface.selected().expect("selected");
        assert_eq!(selected.file().media_type.as_deref(), Some("image/jpeg"));
    }

    #[test]
    fn drag_state_tracks_enter_leave_and_drop() {
        let (_memory, mut surface) = surface();
        assert!(!surface.is_drag_active());

        surface.drag_enter();
        assert!(surface.is_drag_active());
        surface.drag_leave();
        assert!(!surface.is_drag_active());

        surface.drag_enter();
        let _ = surface.accept([ImageFile::new("x.txt", vec![]).with_media_type("text/plain")]);
        assert!(!surface.is_drag_active());
    }
}
