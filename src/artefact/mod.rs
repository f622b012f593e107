//! Release artefact handling: download, integrity, authenticity, and
//! extraction.
//!
//! Submodules are ordered along the pipeline: [`download`] fetches the
//! archive and manifests, [`digest`] and [`manifest`] establish integrity,
//! [`signature`] attempts the advisory authenticity check, and
//! [`extraction`] unpacks the verified bytes.

pub mod digest;
pub mod download;
pub mod extraction;
pub mod manifest;
pub mod signature;
