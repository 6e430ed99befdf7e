//! Filesystem helpers.

use std::path::Path;
use std::time::Duration;

use tokio::fs;
use tracing::{debug, warn};

/// Remove a file, retrying while another process still holds it.
///
/// Returns `true` once the file is gone. A file that never existed counts as
/// removed. After the last attempt the failure is logged, not returned.
pub async fn remove_with_retry(path: &Path, attempts: u32, delay: Duration) -> bool {
    let attempts = attempts.max(1);

    for attempt in 1..=attempts {
        match fs::remove_file(path).await {
            Ok(()) => return true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return true,
            Err(e) if attempt < attempts => {
                debug!(path = %path.display(), attempt, error = %e, "File removal failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                warn!(path = %path.display(), attempts, error = %e, "Giving up on file removal");
            }
        }
    }

    false
}

/// Create `dir` and any missing parents.
pub async fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_remove_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("source.mp4");
        fs::write(&path, b"video").await.unwrap();

        assert!(remove_with_retry(&path, 5, Duration::from_millis(1)).await);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_remove_missing_file_is_ok() {
        let dir = TempDir::new().unwrap();
        assert!(remove_with_retry(&dir.path().join("gone.mp4"), 5, Duration::from_millis(1)).await);
    }

    #[tokio::test]
    async fn test_remove_directory_gives_up() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).await.unwrap();

        assert!(!remove_with_retry(&sub, 2, Duration::from_millis(1)).await);
        assert!(sub.exists());
    }

    #[tokio::test]
    async fn test_ensure_dir_nested() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
    }
}
