use std::path::PathBuf;

use thiserror::Error;

use crate::variant::SiteVariant;

/// Why a URL could not be resolved into a work descriptor.
///
/// Callers of [`crate::resolver::Resolver::resolve_work_json`] only ever see
/// `None`; the variants exist so the cause can be logged.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no page content retrieved for {0}")]
    Fetch(String),
    #[error("url does not belong to a known site: {0}")]
    Classification(String),
    #[error("no embedded payload found for {0}")]
    PayloadNotFound(SiteVariant),
    #[error("malformed scene payload: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("init data response carried no work object")]
    EmptyScene,
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("scene has no panorama entries")]
    NoPanorama,
    #[error("first panorama url has no `images` segment: {0}")]
    MissingBaseToken(String),
    #[error("{field} does not start with `{base}`: {url}")]
    PrefixMismatch {
        field: String,
        base: String,
        url: String,
    },
}

/// Refusals when handing a manifest to the download layer.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("no download directory selected")]
    MissingDirectory,
    #[error("no download name given")]
    MissingName,
    #[error("download name must be a single path segment: {0}")]
    InvalidName(String),
    #[error("no work json given")]
    MissingManifest,
    #[error("{} already exists or is already queued", .0.display())]
    Conflict(PathBuf),
    #[error("task manager rejected the download: {0}")]
    Rejected(String),
}
