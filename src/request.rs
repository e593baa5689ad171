//! Crawl request type.

use std::sync::Arc;

use http::Uri;

/// An immutable crawl request: an HTTP request shell plus the depth at
/// which it was discovered (spec.md §3). The scheduler never constructs
/// the underlying HTTP request — that is the fetcher's transport concern
/// (out of scope per spec.md §1) — it only carries the URI and depth
/// needed for admission and dispatch.
#[derive(Debug, Clone)]
pub struct Request {
    uri: Arc<Uri>,
    depth: u32,
}

impl Request {
    pub fn new(uri: Uri, depth: u32) -> Self {
        Request {
            uri: Arc::new(uri),
            depth,
        }
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// A request derived from this one at `depth + 1`, reusing the same
    /// URI. Mirrors the original analyzer's re-depthing of requests
    /// produced while parsing a response one level deeper.
    pub fn child(&self, uri: Uri) -> Request {
        Request::new(uri, self.depth + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_increments_depth() {
        let req = Request::new(Uri::from_static("http://example.com/"), 2);
        let child = req.child(Uri::from_static("http://example.com/a"));
        assert_eq!(child.depth(), 3);
    }
}
