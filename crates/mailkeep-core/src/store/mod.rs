//! Content-addressed blob store for raw messages.
//!
//! Raw RFC 5322 bytes are stored once per distinct content under
//! `<root>/<digest[0..2]>/<digest>`; a digest collision with different
//! content falls back to `<digest>-1`, `<digest>-2`, ... probed linearly
//! until a byte-identical slot is found or a free slot is claimed.

use md5::{Digest as _, Md5};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::Result;

/// Location of a stored blob: digest plus collision index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    /// Lowercase hex MD5 of the blob.
    pub digest: String,
    /// 0 for the primary slot, n for `<digest>-n`.
    pub collision: u32,
}

impl BlobRef {
    /// Filename of the slot inside its fan-out directory.
    #[must_use]
    pub fn filename(&self) -> String {
        if self.collision == 0 {
            self.digest.clone()
        } else {
            format!("{}-{}", self.digest, self.collision)
        }
    }
}

impl std::fmt::Display for BlobRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.filename())
    }
}

/// Filesystem blob store rooted at one directory.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Creates a store rooted at the given directory.
    ///
    /// The directory tree is created lazily on the first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lowercase hex MD5 digest used as the storage key.
    #[must_use]
    pub fn digest(data: &[u8]) -> String {
        format!("{:x}", Md5::digest(data))
    }

    /// Stores a blob, deduplicating byte-identical content.
    ///
    /// If the primary slot holds identical bytes the existing reference is
    /// returned. Otherwise collision slots are probed in order until an
    /// identical blob is found or the first free slot is written.
    ///
    /// # Errors
    ///
    /// Returns an error if a filesystem operation fails.
    pub async fn put(&self, data: &[u8]) -> Result<BlobRef> {
        let digest = Self::digest(data);
        fs::create_dir_all(self.dir_for(&digest)).await?;

        let mut collision = 0;
        loop {
            let candidate = BlobRef {
                digest: digest.clone(),
                collision,
            };
            let path = self.path_for(&candidate);

            match fs::read(&path).await {
                Ok(existing) => {
                    if existing == data {
                        return Ok(candidate);
                    }
                    collision += 1;
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    fs::write(&path, data).await?;
                    debug!(blob = %candidate, size = data.len(), "stored blob");
                    return Ok(candidate);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Reads a blob back; a missing slot yields `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if a filesystem operation other than a missing
    /// file fails.
    pub async fn get(&self, blob: &BlobRef) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(blob)).await {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Checks whether a slot exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the filesystem check fails.
    pub async fn contains(&self, blob: &BlobRef) -> Result<bool> {
        Ok(fs::try_exists(self.path_for(blob)).await?)
    }

    /// Two-level fan-out directory for a digest.
    fn dir_for(&self, digest: &str) -> PathBuf {
        self.root.join(&digest[..2.min(digest.len())])
    }

    fn path_for(&self, blob: &BlobRef) -> PathBuf {
        self.dir_for(&blob.digest).join(blob.filename())
    }
}
