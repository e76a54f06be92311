//! Local file forwarding.

use crate::http::response::{BodyStream, ProxyResponse};

/// True when `path` contains `..` anywhere.
pub fn has_traversal(path: &str) -> bool {
    path.contains("..")
}

/// True when a URL path has a `..` segment, plain or percent-encoded.
pub fn has_traversal_segment(path: &str) -> bool {
    path.split(['/', '\\'])
        .any(|segment| segment == ".." || segment.eq_ignore_ascii_case("%2e%2e"))
}

/// Open `path` and stream it. Traversal is rejected before any filesystem
/// call is made.
pub async fn open(path: &str, resp: &mut ProxyResponse) {
    if has_traversal(path) {
        tracing::warn!(path = %path, "Rejected path traversal");
        resp.set_code(403);
        return;
    }

    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) => {
            tracing::debug!(path = %path, error = %e, "Local file unavailable");
            resp.set_code(404);
            return;
        }
    };

    match file.metadata().await {
        Ok(meta) if meta.is_file() => {
            resp.set_code(200);
            resp.set_stream(BodyStream::File(file));
        }
        _ => {
            tracing::debug!(path = %path, "Local path is not a regular file");
            resp.set_code(404);
        }
    }
}
