//! Persisted provisioning state.
//!
//! One JSON marker file under the install root records that the release was
//! downloaded and which digest it verified against. The orchestrator loads
//! it once at pipeline start and stores it once after verification; nothing
//! else reads or writes it, so every cache decision flows through a single
//! value instead of ad-hoc file-existence checks.
//!
//! The marker is a claim, never an authority: a cache hit still re-hashes
//! the cached archive against the pinned digest before skipping the fetch.

use crate::artefact::digest::Sha256Digest;
use crate::error::{ProvisionError, Result};
use camino::Utf8Path;
use serde::{Deserialize, Serialize};

/// Filename of the provisioning state marker inside the install root.
pub const STATE_FILENAME: &str = "provision-state.json";

/// Recorded outcome of a previous pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheState {
    /// Whether a release archive was downloaded into the cache.
    downloaded: bool,
    /// Hex digest the cached archive verified against, when verification
    /// completed.
    verified_digest: Option<String>,
}

impl CacheState {
    /// State recording a completed download and verification.
    #[must_use]
    pub fn verified(digest: &Sha256Digest) -> Self {
        Self {
            downloaded: true,
            verified_digest: Some(digest.as_str().to_owned()),
        }
    }

    /// Whether a download was recorded.
    #[must_use]
    pub fn downloaded(&self) -> bool {
        self.downloaded
    }

    /// Whether this state claims verification against exactly `expected`.
    ///
    /// A marker recording a different digest (a release bump, or a
    /// hand-edited file) does not count.
    #[must_use]
    pub fn claims_verified(&self, expected: &Sha256Digest) -> bool {
        self.downloaded
            && self
                .verified_digest
                .as_deref()
                .is_some_and(|recorded| recorded == expected.as_str())
    }
}

/// Load the state marker at `path`.
///
/// A missing file yields the default (empty) state. A malformed file is
/// treated as empty state and flagged, so one corrupt write never wedges the
/// pipeline; the next store overwrites it.
#[must_use]
pub fn load(path: &Utf8Path) -> (CacheState, bool) {
    let Ok(contents) = std::fs::read_to_string(path.as_std_path()) else {
        return (CacheState::default(), false);
    };
    match serde_json::from_str(&contents) {
        Ok(state) => (state, false),
        Err(e) => {
            log::debug!("state marker at {path} is invalid ({e}); treating as empty");
            (CacheState::default(), true)
        }
    }
}

/// Persist `state` to the marker at `path`.
///
/// # Errors
///
/// Returns [`ProvisionError::StateStore`] if serialisation or the write
/// fails.
pub fn store(path: &Utf8Path, state: &CacheState) -> Result<()> {
    let json = serde_json::to_string_pretty(state).map_err(|e| ProvisionError::StateStore {
        path: path.to_owned(),
        reason: e.to_string(),
    })?;
    std::fs::write(path.as_std_path(), json).map_err(|e| ProvisionError::StateStore {
        path: path.to_owned(),
        reason: e.to_string(),
    })
}
