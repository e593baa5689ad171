//! Crawl response type and the multi-read body wrapper analyzers rely on.

use bytes::Bytes;
use http::{HeaderMap, StatusCode, Uri};

/// An immutable HTTP response shell plus the depth of the request that
/// produced it (spec.md §3). The body is pre-buffered into [`Bytes`] by
/// the fetcher so it can be handed to multiple analyzer parsers without
/// each needing to re-read a single-shot stream (spec.md §9 "Body
/// reusability" design note).
#[derive(Debug, Clone)]
pub struct Response {
    uri: Uri,
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    depth: u32,
}

impl Response {
    pub fn new(uri: Uri, status: StatusCode, headers: HeaderMap, body: Bytes, depth: u32) -> Self {
        Response {
            uri,
            status,
            headers,
            body,
            depth,
        }
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// A fresh, independent reader over the body. Because the body is
    /// already a cheaply-cloneable `Bytes`, "fresh reader" is just a
    /// clone of the handle — no re-reading or copying of the payload,
    /// unlike the original's `io.Reader`-based multi-reader.
    pub fn body(&self) -> Bytes {
        self.body.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_clones_are_independent_views_of_same_bytes() {
        let resp = Response::new(
            Uri::from_static("http://example.com/"),
            StatusCode::OK,
            HeaderMap::new(),
            Bytes::from_static(b"hello"),
            0,
        );
        let a = resp.body();
        let b = resp.body();
        assert_eq!(a, b);
        assert_eq!(a, Bytes::from_static(b"hello"));
    }
}
