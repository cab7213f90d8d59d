//! Storage-permission policy for still capture
//!
//! The desktop stand-in for a storage permission dialog: capture is allowed
//! while the configured capture directory exists (or can be created) and is
//! writable. Refusal surfaces as a prompt to the user; nothing is captured.

use controller::StoragePolicy;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Capture-directory based storage policy
pub struct CaptureDir {
    dir: PathBuf,
}

impl CaptureDir {
    /// Policy over the configured capture directory
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// The directory stills are written to
    pub fn path(&self) -> &PathBuf {
        &self.dir
    }
}

impl StoragePolicy for CaptureDir {
    fn capture_allowed(&self) -> bool {
        if let Err(e) = fs::create_dir_all(&self.dir) {
            debug!("capture dir unavailable: {e}");
            return false;
        }
        match fs::metadata(&self.dir) {
            Ok(meta) => !meta.permissions().readonly(),
            Err(e) => {
                debug!("capture dir not accessible: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writable_directory_allows_capture() {
        let tmp = tempfile::tempdir().unwrap();
        let policy = CaptureDir::new(tmp.path().join("captures"));
        assert!(policy.capture_allowed());
        // The missing subdirectory was created on the way
        assert!(policy.path().is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_readonly_directory_denies_capture() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("captures");
        fs::create_dir_all(&dir).unwrap();
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o555)).unwrap();

        let policy = CaptureDir::new(dir.clone());
        assert!(!policy.capture_allowed());

        fs::set_permissions(&dir, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_uncreatable_directory_denies_capture() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("not-a-dir");
        fs::write(&file, b"x").unwrap();

        // A file where the directory should be
        let policy = CaptureDir::new(file.join("captures"));
        assert!(!policy.capture_allowed());
    }
}
