use std::io;
use std::path::{Path, PathBuf};

use rand::Rng;
use tracing::trace;

/// A temporary media file inside the staging directory.
///
/// The file is owned exclusively by the operation that reserved it and is
/// removed when the guard is dropped, whether or not it was ever written.
#[derive(Debug)]
pub struct MediaFile {
    path: PathBuf,
}

impl MediaFile {
    /// Reserve a unique path `<dir>/<nanos>_<n>.<extension>`. Nothing is
    /// created on disk until [`MediaFile::write`] is called.
    #[must_use]
    pub fn reserve(dir: &Path, extension: &str) -> Self {
        let extension = extension.trim_start_matches('.');
        let path = dir.join(format!("{}.{extension}", random_file_name()));
        Self { path }
    }

    /// Location of the staged file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the file contents
    ///
    /// # Errors
    ///
    /// Returns any I/O error from the write.
    pub async fn write(&self, bytes: &[u8]) -> io::Result<()> {
        tokio::fs::write(&self.path, bytes).await
    }

    /// Read the whole file
    ///
    /// # Errors
    ///
    /// Returns any I/O error from the read.
    pub async fn read(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}

impl Drop for MediaFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            trace!(path = %self.path.display(), error = %e, "Temp file cleanup skipped");
        }
    }
}

/// `<unix-nanos>_<random 0..=10000>`, collisions tolerated
#[must_use]
pub fn random_file_name() -> String {
    let nanos = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default();
    let suffix: u32 = rand::rng().random_range(0..=10_000);
    format!("{nanos}_{suffix}")
}

/// Create the staging directory if it does not exist yet
///
/// # Errors
///
/// Returns any I/O error from directory creation.
pub async fn ensure_dir(dir: &Path) -> io::Result<()> {
    tokio::fs::create_dir_all(dir).await
}
