//! Content-addressed evidence files.
//!
//! Evidence bytes live on local disk under their SHA-256 digest; only
//! the digest is anchored, travelling in a lifecycle event's `data`
//! map through the normal dispatcher path.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::NodeError;

pub struct EvidenceStore {
    root: PathBuf,
}

impl EvidenceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Write evidence bytes and return where they landed plus their
    /// SHA-256 hex digest. Identical content lands on the same path, so
    /// a re-upload is a cheap overwrite with the same bytes.
    pub fn store(&self, bytes: &[u8], name: &str) -> Result<(PathBuf, String), NodeError> {
        let digest = hex::encode(Sha256::digest(bytes));
        let file_name = format!("{}_{}", digest, sanitize(name));
        let path = self.root.join(file_name);
        std::fs::create_dir_all(&self.root)?;
        std::fs::write(&path, bytes)?;
        debug!(path = %path.display(), digest = %digest, "evidence stored");
        Ok((path, digest))
    }

    /// Read evidence back by path.
    pub fn retrieve(&self, path: &Path) -> Result<Vec<u8>, NodeError> {
        Ok(std::fs::read(path)?)
    }
}

/// Keep file names flat: path separators and oddities become '_'.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
