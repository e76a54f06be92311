//! Persist the response body to disk instead of returning it.

use std::path::PathBuf;
use std::time::Duration;

use futures_util::future::BoxFuture;

use crate::http::request::ProxyRequest;
use crate::http::response::{ProxyResponse, SaveOutcome};
use crate::pipeline::{Filter, Next};

pub const DEFAULT_SAVE_TIMEOUT: Duration = Duration::from_secs(3600);

/// Writes the body to `path` once the origin answered.
///
/// The headers are cleared, so nothing of the origin response is relayed.
/// The result is recorded on the response as a [`SaveOutcome`]; a failed
/// write does not alter the status code.
#[derive(Debug, Clone)]
pub struct SaveToFile {
    path: PathBuf,
    timeout: Duration,
}

impl SaveToFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            timeout: DEFAULT_SAVE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Filter for SaveToFile {
    fn call<'a>(
        &'a self,
        req: &'a mut ProxyRequest,
        resp: &'a mut ProxyResponse,
        next: Next<'a>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            req.set_timeout(self.timeout);
            next.run(req, resp).await;

            resp.clear_headers();
            let outcome = match resp.save_to_file(&self.path).await {
                Ok(written) => {
                    tracing::info!(path = %self.path.display(), bytes = written, "Saved response body");
                    SaveOutcome::Written(written)
                }
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "Failed to save response body");
                    SaveOutcome::Failed(e.to_string())
                }
            };
            resp.set_saved(outcome);
        })
    }
}
