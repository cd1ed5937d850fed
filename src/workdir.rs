//! Scratch directory owned by one participant for its lifetime.

use crate::errors::Result;
use crate::policy::PolicyMetadata;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

const POLICY_DIR: &str = "policies";

/// Wiped when acquired, removed when dropped.
#[derive(Debug)]
pub struct WorkDir {
    path: PathBuf,
}

impl WorkDir {
    pub fn acquire<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            debug!("Wiping previous working directory {}", path.display());
            fs::remove_dir_all(&path)?;
        }
        fs::create_dir_all(path.join(POLICY_DIR))?;
        Ok(WorkDir { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn policy_path(&self, label: &[u8]) -> PathBuf {
        self.path
            .join(POLICY_DIR)
            .join(format!("{}.json", hex::encode(label)))
    }

    /// Keyed by the raw label bytes. Overwrites any record already cached
    /// for the label.
    pub fn cache_policy(&self, label: &[u8], record: &PolicyMetadata) -> Result<PathBuf> {
        let path = self.policy_path(label);
        record.save(&path)?;
        debug!("Cached policy {:?} at {}", record.label, path.display());
        Ok(path)
    }

    pub fn cached_policy(&self, label: &[u8]) -> Result<Option<PolicyMetadata>> {
        let path = self.policy_path(label);
        if !path.exists() {
            return Ok(None);
        }
        PolicyMetadata::load(&path).map(Some)
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_dir_all(&self.path) {
            warn!("Could not remove {}: {}", self.path.display(), err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pre::{new_standard_params, KeyPair, Signer};

    #[test]
    fn acquire_wipes_and_drop_removes() {
        let root = tempfile::tempdir().expect("tempdir");
        let path = root.path().join("tmp");
        fs::create_dir_all(&path).expect("mkdir");
        fs::write(path.join("stale.json"), b"{}").expect("write");

        let workdir = WorkDir::acquire(&path).expect("acquire");
        assert!(!path.join("stale.json").exists());
        assert!(path.join(POLICY_DIR).is_dir());

        drop(workdir);
        assert!(!path.exists());
    }

    #[test]
    fn policy_cache() {
        let params = new_standard_params();
        let root = tempfile::tempdir().expect("tempdir");
        let workdir = WorkDir::acquire(root.path().join("tmp")).expect("acquire");
        assert_eq!(workdir.cached_policy(b"heart-data").expect("lookup"), None);

        let first = PolicyMetadata::new(
            KeyPair::new(&params).public_key(),
            Signer::new(&params).public_key(),
            "heart-data",
        );
        let path = workdir.cache_policy(b"heart-data", &first).expect("cache");
        assert!(path.ends_with("policies/68656172742d64617461.json"));

        let second = PolicyMetadata::new(
            KeyPair::new(&params).public_key(),
            Signer::new(&params).public_key(),
            "heart-data",
        );
        workdir.cache_policy(b"heart-data", &second).expect("cache");
        assert_eq!(workdir.cached_policy(b"heart-data").expect("lookup"), Some(second));
    }

    #[test]
    fn non_utf8_labels_keep_their_own_entry() {
        let params = new_standard_params();
        let root = tempfile::tempdir().expect("tempdir");
        let workdir = WorkDir::acquire(root.path().join("tmp")).expect("acquire");

        let record = PolicyMetadata::new(
            KeyPair::new(&params).public_key(),
            Signer::new(&params).public_key(),
            "\u{fffd}",
        );
        let path = workdir.cache_policy(b"\xff", &record).expect("cache");
        assert!(path.ends_with("policies/ff.json"));
        assert_eq!(workdir.cached_policy(b"\xff").expect("lookup"), Some(record));
        assert_eq!(workdir.cached_policy("\u{fffd}".as_bytes()).expect("lookup"), None);
    }
}
