//! Release download logic with bounded retry.
//!
//! Provides a trait-based abstraction for fetching the release archive and
//! its manifests over HTTPS, enabling dependency injection for testing.
//! Transport-level failures are retried a fixed number of times with a fixed
//! inter-attempt delay; an HTTP 404 is treated as definitive and never
//! retried.

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

/// Network timeout for each individual request.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum fetch attempts per resource.
const MAX_ATTEMPTS: u32 = 3;

/// Fixed delay between attempts.
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Trait for fetching release files from the distribution host.
///
/// Abstraction allows tests to mock HTTP behaviour without network access.
#[cfg_attr(test, mockall::automock)]
pub trait ReleaseDownloader {
    /// Fetch a URL and return the body as text.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the resource is not found.
    fn fetch_text(&self, url: &str) -> Result<String, DownloadError>;

    /// Fetch a URL and write the body to `dest`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request or the file write fails.
    fn fetch_file(&self, url: &str, dest: &Path) -> Result<(), DownloadError>;
}

/// Errors arising from release download operations.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// HTTP request failed at the transport or status level.
    #[error("request failed for {url}: {reason}")]
    HttpError {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The requested resource was not found (HTTP 404).
    #[error("resource not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// I/O error writing the downloaded file.
    #[error("I/O error writing download: {0}")]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    /// Whether a retry could plausibly succeed.
    ///
    /// A 404 means the release layout is wrong or the mirror is incomplete;
    /// repeating the request cannot change that.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::NotFound { .. })
    }
}

/// HTTPS downloader using `ureq`.
pub struct HttpDownloader;

impl ReleaseDownloader for HttpDownloader {
    fn fetch_text(&self, url: &str) -> Result<String, DownloadError> {
        let response = http_agent()
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        response
            .into_body()
            .read_to_string()
            .map_err(|e| DownloadError::HttpError {
                url: url.to_owned(),
                reason: e.to_string(),
            })
    }

    fn fetch_file(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        let response = http_agent()
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        let mut file = std::fs::File::create(dest)?;
        std::io::copy(&mut response.into_body().as_reader(), &mut file)
            .map_err(DownloadError::Io)?;
        Ok(())
    }
}

/// Shared `ureq` agent with request timeout configuration.
fn http_agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(DOWNLOAD_TIMEOUT))
            .build();
        ureq::Agent::new_with_config(config)
    })
}

/// Map a ureq error to a [`DownloadError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> DownloadError {
    match err {
        ureq::Error::StatusCode(404) => DownloadError::NotFound {
            url: url.to_owned(),
        },
        other => DownloadError::HttpError {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}

/// Run `operation` up to [`MAX_ATTEMPTS`] times, sleeping [`RETRY_DELAY`]
/// between attempts, until it succeeds or fails non-transiently.
///
/// The sleep blocks the calling thread; the pipeline is strictly
/// sequential and nothing else can make progress while a fetch is pending.
///
/// # Errors
///
/// Returns the last error once the attempt budget is exhausted, or the
/// first non-transient error immediately.
pub fn with_retry<T>(
    mut operation: impl FnMut() -> Result<T, DownloadError>,
) -> Result<T, DownloadError> {
    let mut attempt = 1;
    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < MAX_ATTEMPTS => {
                log::debug!("attempt {attempt}/{MAX_ATTEMPTS} failed, retrying: {err}");
                std::thread::sleep(RETRY_DELAY);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn map_ureq_error_maps_404_to_not_found() {
        let err = ureq::Error::StatusCode(404);
        let mapped = map_ureq_error("https://example.test/SHA256SUMS", &err);
        assert!(matches!(mapped, DownloadError::NotFound { .. }));
    }

    #[test]
    fn map_ureq_error_maps_other_status_to_http_error() {
        let err = ureq::Error::StatusCode(503);
        let mapped = map_ureq_error("https://example.test/SHA256SUMS", &err);
        assert!(matches!(mapped, DownloadError::HttpError { .. }));
    }

    #[test]
    fn not_found_is_not_transient() {
        let err = DownloadError::NotFound {
            url: "https://example.test/missing".to_owned(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn with_retry_succeeds_after_transient_failures() {
        let calls = Cell::new(0u32);
        let result = with_retry(|| {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(DownloadError::HttpError {
                    url: "https://example.test".to_owned(),
                    reason: "connection reset".to_owned(),
                })
            } else {
                Ok("body")
            }
        });
        assert_eq!(result.expect("third attempt succeeds"), "body");
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn with_retry_exhausts_budget_on_persistent_failure() {
        let calls = Cell::new(0u32);
        let result: Result<(), _> = with_retry(|| {
            calls.set(calls.get() + 1);
            Err(DownloadError::HttpError {
                url: "https://example.test".to_owned(),
                reason: "timed out".to_owned(),
            })
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), MAX_ATTEMPTS);
    }

    #[test]
    fn with_retry_stops_immediately_on_not_found() {
        let calls = Cell::new(0u32);
        let result: Result<(), _> = with_retry(|| {
            calls.set(calls.get() + 1);
            Err(DownloadError::NotFound {
                url: "https://example.test/gone".to_owned(),
            })
        });
        assert!(matches!(result, Err(DownloadError::NotFound { .. })));
        assert_eq!(calls.get(), 1);
    }
}
