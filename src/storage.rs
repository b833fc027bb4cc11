// SPDX-License-Identifier: GPL-3.0-only

//! Destination storage: writability probing and durable writes

use crate::errors::CaptureError;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Check that a destination path can receive a durable write.
///
/// This is the proactive check: it runs before a capture is attempted so
/// an unwritable medium is reported as `StorageUnavailable` instead of
/// being inferred from a failed write later.
pub fn ensure_writable(target: &Path) -> Result<(), CaptureError> {
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let meta = std::fs::metadata(&parent).map_err(|e| {
        CaptureError::StorageUnavailable(format!(
            "destination directory {} is not accessible: {}",
            parent.display(),
            e
        ))
    })?;

    if !meta.is_dir() {
        return Err(CaptureError::StorageUnavailable(format!(
            "{} is not a directory",
            parent.display()
        )));
    }

    if meta.permissions().readonly() {
        return Err(CaptureError::StorageUnavailable(format!(
            "destination directory {} is read-only",
            parent.display()
        )));
    }

    Ok(())
}

/// Write captured bytes to the destination and make them durable.
///
/// The file is created, written, synced and closed before this returns
/// Ok. On failure the partial file is removed on a best-effort basis;
/// callers must not assume a failed write leaves nothing behind.
pub async fn durable_write(target: &Path, bytes: Vec<u8>) -> Result<(), CaptureError> {
    let path = target.to_path_buf();

    let result = tokio::task::spawn_blocking(move || write_synced(&path, &bytes))
        .await
        .map_err(|e| CaptureError::WriteFailed(format!("write task failed: {}", e)))?;

    match result {
        Ok(()) => {
            debug!(path = %target.display(), "Image written and synced");
            Ok(())
        }
        Err(e) => {
            if let Err(cleanup) = std::fs::remove_file(target) {
                debug!(path = %target.display(), error = %cleanup, "Partial file cleanup skipped");
            } else {
                warn!(path = %target.display(), "Removed partial file after failed write");
            }
            Err(CaptureError::WriteFailed(format!(
                "{}: {}",
                target.display(),
                e
            )))
        }
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

/// Default destination for a capture when the caller supplies none:
/// `~/Pictures/IMG_<timestamp>.jpg` (or the current directory as a
/// fallback).
pub fn default_destination() -> PathBuf {
    let dir = dirs::picture_dir().unwrap_or_else(|| PathBuf::from("."));
    let name = chrono::Local::now().format("IMG_%Y%m%d_%H%M%S.jpg");
    dir.join(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_durable_write_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.jpg");

        durable_write(&target, vec![1, 2, 3]).await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_missing_directory_is_unavailable() {
        let err = ensure_writable(Path::new("/nonexistent-dir/out.jpg")).unwrap_err();
        assert!(matches!(err, CaptureError::StorageUnavailable(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_readonly_directory_is_unavailable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o555)).unwrap();

        let err = ensure_writable(&dir.path().join("out.jpg")).unwrap_err();
        assert!(matches!(err, CaptureError::StorageUnavailable(_)));

        // Restore so the tempdir can be cleaned up
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_writable_directory_passes() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ensure_writable(&dir.path().join("out.jpg")).is_ok());
    }

    #[test]
    fn test_default_destination_has_jpg_extension() {
        let path = default_destination();
        assert_eq!(path.extension().unwrap(), "jpg");
    }
}
