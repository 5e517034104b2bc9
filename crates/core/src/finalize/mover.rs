//! Moving finished files into the destination tree.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tracing::debug;

use super::error::FinalizeError;

const DEFAULT_BUFFER_SIZE: usize = 256 * 1024;

/// Moves files into place without ever exposing a partial destination.
///
/// A rename is tried first. Across filesystems the file is copied to a
/// sibling `.partial` path while hashing, the copy is verified, and only
/// then renamed over the destination.
#[derive(Debug, Clone)]
pub struct FileMover {
    buffer_size: usize,
}

impl Default for FileMover {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl FileMover {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves `source` to `destination`, replacing any existing file, and
    /// returns the size of the placed file.
    pub async fn move_file(&self, source: &Path, destination: &Path) -> Result<u64, FinalizeError> {
        if !fs::try_exists(source).await.unwrap_or(false) {
            return Err(FinalizeError::InputNotFound {
                path: source.to_path_buf(),
            });
        }

        if Self::try_atomic_move(source, destination)
            .await
            .map_err(|e| move_failed(source, destination, e))?
        {
            debug!(from = %source.display(), to = %destination.display(), "Renamed into place");
        } else {
            debug!(from = %source.display(), to = %destination.display(), "Cross-device move, copying");
            self.copy_verified(source, destination).await?;
            fs::remove_file(source)
                .await
                .map_err(|e| move_failed(source, destination, e))?;
        }

        Ok(fs::metadata(destination).await?.len())
    }

    /// Attempts to move a file atomically (rename).
    async fn try_atomic_move(source: &Path, destination: &Path) -> Result<bool, std::io::Error> {
        match fs::rename(source, destination).await {
            Ok(()) => Ok(true),
            Err(e) => {
                // EXDEV is 18 on Linux
                if e.kind() == std::io::ErrorKind::CrossesDevices || e.raw_os_error() == Some(18) {
                    Ok(false)
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Copies through a `.partial` sibling and renames it over `destination`
    /// once its checksum matches the source.
    async fn copy_verified(&self, source: &Path, destination: &Path) -> Result<(), FinalizeError> {
        let partial = partial_path(destination);

        let expected = match self.copy_hashing(source, &partial).await {
            Ok(checksum) => checksum,
            Err(e) => {
                let _ = fs::remove_file(&partial).await;
                return Err(e);
            }
        };

        let actual = self.checksum(&partial).await?;
        if actual != expected {
            let _ = fs::remove_file(&partial).await;
            return Err(FinalizeError::ChecksumMismatch {
                path: destination.to_path_buf(),
                expected,
                actual,
            });
        }

        fs::rename(&partial, destination)
            .await
            .map_err(|e| move_failed(source, destination, e))
    }

    async fn copy_hashing(&self, source: &Path, destination: &Path) -> Result<String, FinalizeError> {
        let source_file = File::open(source)
            .await
            .map_err(|e| move_failed(source, destination, e))?;
        let dest_file = File::create(destination)
            .await
            .map_err(|e| move_failed(source, destination, e))?;

        let mut reader = BufReader::with_capacity(self.buffer_size, source_file);
        let mut writer = BufWriter::with_capacity(self.buffer_size, dest_file);
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; self.buffer_size];

        loop {
            let bytes_read = reader
                .read(&mut buffer)
                .await
                .map_err(|e| move_failed(source, destination, e))?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
            writer
                .write_all(&buffer[..bytes_read])
                .await
                .map_err(|e| move_failed(source, destination, e))?;
        }

        writer
            .flush()
            .await
            .map_err(|e| move_failed(source, destination, e))?;

        Ok(format!("{:x}", hasher.finalize()))
    }

    async fn checksum(&self, path: &Path) -> Result<String, FinalizeError> {
        let file = File::open(path).await?;
        let mut reader = BufReader::with_capacity(self.buffer_size, file);
        let mut buffer = vec![0u8; self.buffer_size];
        let mut hasher = Sha256::new();

        loop {
            let bytes_read = reader.read(&mut buffer).await?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    }
}

/// Sibling path used while a file is being written, e.g.
/// `S01E01 - A.mkv` → `.S01E01 - A.mkv.partial`.
pub(crate) fn partial_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    destination.with_file_name(format!(".{}.partial", name))
}

fn move_failed(source: &Path, destination: &Path, error: std::io::Error) -> FinalizeError {
    FinalizeError::MoveFailed {
        source: source.to_path_buf(),
        destination: destination.to_path_buf(),
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_move_renames_file() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("raw.mkv");
        let destination = dir.path().join("S01E01 - A.mkv");
        std::fs::write(&source, b"episode data").unwrap();

        let size = FileMover::new().move_file(&source, &destination).await.unwrap();

        assert_eq!(size, 12);
        assert!(!source.exists());
        assert_eq!(std::fs::read(&destination).unwrap(), b"episode data");
    }

    #[tokio::test]
    async fn test_move_replaces_existing_destination() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("raw.mkv");
        let destination = dir.path().join("S01E01 - A.mkv");
        std::fs::write(&source, b"new").unwrap();
        std::fs::write(&destination, b"old and stale").unwrap();

        FileMover::new().move_file(&source, &destination).await.unwrap();

        assert_eq!(std::fs::read(&destination).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_missing_source() {
        let dir = TempDir::new().unwrap();
        let err = FileMover::new()
            .move_file(&dir.path().join("absent.mkv"), &dir.path().join("out.mkv"))
            .await
            .unwrap_err();
        assert!(matches!(err, FinalizeError::InputNotFound { .. }));
        assert!(!dir.path().join("out.mkv").exists());
    }

    #[tokio::test]
    async fn test_verified_copy_leaves_no_partial() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("raw.mkv");
        let destination = dir.path().join("final.mkv");
        let data: Vec<u8> = (0..600_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&source, &data).unwrap();

        let mover = FileMover { buffer_size: 4096 };
        mover.copy_verified(&source, &destination).await.unwrap();

        assert_eq!(std::fs::read(&destination).unwrap(), data);
        assert!(!partial_path(&destination).exists());
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_failed_copy_cleans_partial() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("final.mkv");

        let result = FileMover::new()
            .copy_verified(&dir.path().join("absent.mkv"), &destination)
            .await;

        assert!(matches!(result, Err(FinalizeError::MoveFailed { .. })));
        assert!(!destination.exists());
        assert!(!partial_path(&destination).exists());
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/out/S01E01 - A.mkv")),
            PathBuf::from("/out/.S01E01 - A.mkv.partial")
        );
    }
}
