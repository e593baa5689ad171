//! Registrable-domain extraction and request admission (spec.md §4.6).
//!
//! `primary_domain` is grounded directly on the original's
//! `scheduler/domain.go`: the same IPv4 regex short-circuit and the same
//! ordered list of public-suffix patterns, walked in full so that the
//! *last* match wins (a later, more specific pattern in the list can
//! override an earlier coarser one on the same host).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CrawlError, CrawlResult};

static IPV4: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?:25[0-5]|2[0-4]\d|[01]?\d?\d)\.){3}(?:25[0-5]|2[0-4]\d|[01]?\d?\d)$")
        .expect("static IPv4 pattern is valid")
});

/// Ordered the same way as the original's `regexpForDomains`: two-part
/// public suffixes first, then single-label suffixes, then the bare
/// two-letter country-code fallback last.
static SUFFIX_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\.(com|com\.\w{2})$",
        r"\.(gov|gov\.\w{2})$",
        r"\.(net|net\.\w{2})$",
        r"\.(org|org\.\w{2})$",
        r"\.me$",
        r"\.biz$",
        r"\.info$",
        r"\.name$",
        r"\.mobi$",
        r"\.so$",
        r"\.asia$",
        r"\.tel$",
        r"\.tv$",
        r"\.cc$",
        r"\.co$",
        r"\.\w{2}$",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("static suffix pattern is valid"))
    .collect()
});

/// Returns the registrable domain for `host` (spec.md §4.6, §8 S5):
/// unchanged if `host` is an IPv4 literal; otherwise the label starting
/// immediately left of the last-matching suffix pattern. Empty host or
/// unrecognized suffix is an error.
pub fn primary_domain(host: &str) -> CrawlResult<String> {
    let host = host.trim();
    if host.is_empty() {
        return Err(CrawlError::IllegalParameter("empty host".to_string()));
    }
    if IPV4.is_match(host) {
        return Ok(host.to_string());
    }

    let mut suffix_index: Option<usize> = None;
    for pattern in SUFFIX_PATTERNS.iter() {
        if let Some(m) = pattern.find(host) {
            suffix_index = Some(m.start());
        }
    }

    match suffix_index {
        Some(index) if index > 0 => {
            let first_part = &host[..index];
            let start = first_part.rfind('.').map(|i| i + 1).unwrap_or(0);
            Ok(host[start..].to_string())
        }
        _ => Err(CrawlError::IllegalParameter(format!(
            "unrecognized host suffix: {host:?}"
        ))),
    }
}

/// The accepted-domain allowlist plus maximum crawl depth used by the
/// admission pipeline (spec.md §4.6).
pub struct DomainFilter {
    accepted: Vec<String>,
}

impl DomainFilter {
    pub fn new(accepted: Vec<String>) -> Self {
        DomainFilter { accepted }
    }

    pub fn accepts_domain(&self, host: &str) -> bool {
        match primary_domain(host) {
            Ok(domain) => self.accepted.iter().any(|d| d == &domain),
            Err(_) => false,
        }
    }
}
