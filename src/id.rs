//! Module identifiers.
//!
//! A [`ModuleId`] is a typed identifier with three parts — the module's
//! kind, a monotonic sequence number, and an optional network-address
//! string — parsed from and formatted to the compact string form
//! `<kind-letter>|<sequence>|<address>` (spec.md §3, §6).

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::CrawlError;

/// The three module families the scheduler dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleKind {
    Fetcher,
    Analyzer,
    Processor,
}

impl ModuleKind {
    fn letter(self) -> char {
        match self {
            ModuleKind::Fetcher => 'D',
            ModuleKind::Analyzer => 'A',
            ModuleKind::Processor => 'P',
        }
    }

    fn from_letter(c: char) -> Option<Self> {
        match c {
            'D' => Some(ModuleKind::Fetcher),
            'A' => Some(ModuleKind::Analyzer),
            'P' => Some(ModuleKind::Processor),
            _ => None,
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModuleKind::Fetcher => "fetcher",
            ModuleKind::Analyzer => "analyzer",
            ModuleKind::Processor => "processor",
        };
        write!(f, "{name}")
    }
}

/// Structured identifier `<kind>|<sequence>|<address>`.
///
/// `address` is optional and empty when the module has none (e.g. an
/// in-process mock fetcher). Equality and ordering are by string form,
/// giving a stable, deterministic tie-break for the registry (spec.md §4.4).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn new(kind: ModuleKind, sequence: u64, address: impl Into<String>) -> Self {
        ModuleId(format!("{}|{}|{}", kind.letter(), sequence, address.into()))
    }

    pub fn kind(&self) -> ModuleKind {
        self.parts().0
    }

    pub fn sequence(&self) -> u64 {
        self.parts().1
    }

    pub fn address(&self) -> String {
        self.parts().2
    }

    fn parts(&self) -> (ModuleKind, u64, String) {
        // Constructed only via `new` or `FromStr`, both of which validate,
        // so unwraps here can't observe a malformed string.
        let mut split = self.0.splitn(3, '|');
        let kind_letter = split.next().and_then(|s| s.chars().next()).unwrap_or('D');
        let kind = ModuleKind::from_letter(kind_letter).unwrap_or(ModuleKind::Fetcher);
        let sequence: u64 = split.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        let address = split.next().unwrap_or("").to_string();
        (kind, sequence, address)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ModuleId {
    type Err = CrawlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.splitn(3, '|').collect();
        if parts.len() < 2 {
            return Err(CrawlError::IllegalParameter(format!(
                "malformed module id {s:?}: expected <kind>|<sequence>|<address>"
            )));
        }
        let kind_letter = parts[0].chars().next().ok_or_else(|| {
            CrawlError::IllegalParameter(format!("malformed module id {s:?}: empty kind"))
        })?;
        if ModuleKind::from_letter(kind_letter).is_none() {
            return Err(CrawlError::IllegalParameter(format!(
                "malformed module id {s:?}: unknown kind letter {kind_letter:?}"
            )));
        }
        parts[1].parse::<u64>().map_err(|_| {
            CrawlError::IllegalParameter(format!(
                "malformed module id {s:?}: non-numeric sequence"
            ))
        })?;
        Ok(ModuleId(s.to_string()))
    }
}

/// Monotonically increasing sequence number generator.
///
/// Mirrors the original's `toolkit/generator` interface: a bounded counter
/// that wraps back to `start` after `max` (spec.md Design Notes say "a
/// single atomic counter per process... suffices"; the wraparound is kept
/// for parity with the original's cycle-count semantics).
pub struct SequenceGenerator {
    start: u64,
    max: u64,
    next: AtomicU64,
    cycle_count: AtomicU64,
}

impl SequenceGenerator {
    pub fn new(start: u64, max: u64) -> Self {
        SequenceGenerator {
            start,
            max,
            next: AtomicU64::new(start),
            cycle_count: AtomicU64::new(0),
        }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count.load(Ordering::Relaxed)
    }

    /// Returns the next sequence number and advances the generator,
    /// wrapping to `start` (and bumping `cycle_count`) after `max`.
    pub fn get(&self) -> u64 {
        let mut current = self.next.load(Ordering::Relaxed);
        loop {
            let next_value = if current >= self.max {
                self.cycle_count.fetch_add(1, Ordering::Relaxed);
                self.start
            } else {
                current + 1
            };
            match self.next.compare_exchange_weak(
                current,
                next_value,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return current,
                Err(observed) => current = observed,
            }
        }
    }
}

impl Default for SequenceGenerator {
    fn default() -> Self {
        SequenceGenerator::new(1, u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_string_form() {
        let id = ModuleId::new(ModuleKind::Analyzer, 7, "10.0.0.1:8080");
        let s = id.to_string();
        let parsed: ModuleId = s.parse().expect("parses");
        assert_eq!(parsed.kind(), ModuleKind::Analyzer);
        assert_eq!(parsed.sequence(), 7);
        assert_eq!(parsed.address(), "10.0.0.1:8080");
    }

    #[test]
    fn empty_address_round_trips() {
        let id = ModuleId::new(ModuleKind::Fetcher, 1, "");
        assert_eq!(id.to_string(), "D|1|");
        assert_eq!(id.address(), "");
    }

    #[test]
    fn rejects_unknown_kind_letter() {
        let err = "X|1|addr".parse::<ModuleId>().unwrap_err();
        assert!(matches!(err, CrawlError::IllegalParameter(_)));
    }

    #[test]
    fn rejects_non_numeric_sequence() {
        let err = "D|abc|addr".parse::<ModuleId>().unwrap_err();
        assert!(matches!(err, CrawlError::IllegalParameter(_)));
    }

    #[test]
    fn sequence_generator_is_monotonic_and_wraps() {
        let gen = SequenceGenerator::new(1, 3);
        assert_eq!(gen.get(), 1);
        assert_eq!(gen.get(), 2);
        assert_eq!(gen.get(), 3);
        assert_eq!(gen.get(), 1); // wrapped
        assert_eq!(gen.cycle_count(), 1);
    }
}
