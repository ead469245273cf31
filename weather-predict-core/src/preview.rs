//! Preview references for the selected image.
//!
//! A [`Preview`] is minted by a [`PreviewStore`] when a file is accepted and
//! released back to it when the handle is dropped, so every reference is
//! released exactly once: when the selection is replaced or when its owner goes away.

use std::{
    fmt::Debug,
    fs, io,
    path::Path,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use tempfile::TempDir;
use url::Url;

use crate::model::ImageFile;

pub trait PreviewStore: Send + Sync + Debug {
    /// Create a displayable reference to `file`.
    fn create(&self, file: &ImageFile) -> io::Result<Url>;

    /// Release a reference previously returned by [`PreviewStore::create`].
    fn release(&self, url: &Url);
}

/// Owned preview reference. Released on drop.
#[derive(Debug)]
pub struct Preview {
    url: Url,
    store: Arc<dyn PreviewStore>,
}

impl Preview {
    pub fn create(store: &Arc<dyn PreviewStore>, file: &ImageFile) -> io::Result<Self> {
        let url = store.create(file)?;
        tracing::debug!(%url, name = %file.name, "preview created");

        Ok(Self {
            url,
            store: Arc::clone(store),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl Drop for Preview {
    fn drop(&mut self) {
        tracing::debug!(url = %self.url, "preview released");
        self.store.release(&self.url);
    }
}

/// Writes each preview into a private temporary directory and hands out `file://` URLs.
///
/// The directory is removed once the store itself is dropped.
#[derive(Debug)]
pub struct TempDirPreviews {
    dir: TempDir,
    next: AtomicU64,
}

impl TempDirPreviews {
    pub fn new() -> io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("weather-predict-")
            .tempdir()?;

        Ok(Self {
            dir,
            next: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

impl PreviewStore for TempDirPreviews {
    fn create(&self, file: &ImageFile) -> io::Result<Url> {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        let ext = file.extension().unwrap_or("img");
        let path = self.dir.path().join(format!("preview-{n}.{ext}"));

        fs::write(&path, &file.bytes)?;

        Url::from_file_path(&path).map_err(|()| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot express {} as a file URL", path.display()),
            )
        })
    }

    fn release(&self, url: &Url) {
        let Ok(path) = url.to_file_path() else {
            tracing::warn!(%url, "not a file preview, nothing to release");
            return;
        };

        if let Err(err) = fs::remove_file(&path) {
            tracing::warn!(path = %path.display(), error = %err, "failed to remove preview file");
        }
    }
}

/// Keeps previews in memory only; records what was handed out and released.
///
/// Useful for front ends that render from the bytes directly, and for tests.
#[derive(Debug, Default)]
pub struct MemoryPreviews {
    next: AtomicU64,
    live: Mutex<Vec<Url>>,
    released: Mutex<Vec<Url>>,
}

impl MemoryPreviews {
    pub fn new() -> Self {
        Self::default()
    }

    /// References created and not yet released.
    pub fn live(&self) -> Vec<Url> {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every release, in order. A URL appearing twice means a double release.
    pub fn released(&self) -> Vec<Url> {
        self.released
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PreviewStore for MemoryPreviews {
    fn create(&self, file: &ImageFile) -> io::Result<Url> {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        let url = Url::parse(&format!("memory:preview/{n}/{}", file.name))
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;

        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.clone());

        Ok(url)
    }

    fn release(&self, url: &Url) {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|live| live != url);

        self.released
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.clone());
    }
}
