//! Per-prefix atomic sequences
//!
//! [`SequenceStore`] is the in-process counter table a store keeps behind
//! [`CodeCounter::next_sequence`](crate::CodeCounter::next_sequence).

use dashmap::DashMap;

/// Which independent sequence a prefix belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceScope {
    Study,
    Assay,
    External,
}

impl SequenceScope {
    /// `"{scope}:{prefix}"`
    #[must_use]
    pub fn key(self, prefix: &str) -> String {
        let scope = match self {
            Self::Study => "study",
            Self::Assay => "assay",
            Self::External => "external",
        };
        format!("{scope}:{prefix}")
    }
}

/// Atomically incremented ordinals keyed by scope and prefix
///
/// Increments happen under the map's shard lock, so two callers can never
/// observe the same ordinal for the same key.
#[derive(Debug, Default)]
pub struct SequenceStore {
    counters: DashMap<String, u64>,
}

impl SequenceStore {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Next ordinal, never at or below `floor`
    pub fn next(&self, scope: SequenceScope, prefix: &str, floor: u64) -> u64 {
        let mut entry = self.counters.entry(scope.key(prefix)).or_insert(0);
        *entry = (*entry).max(floor) + 1;
        *entry
    }

    /// Last ordinal handed out
    #[must_use]
    pub fn current(&self, scope: SequenceScope, prefix: &str) -> Option<u64> {
        self.counters.get(&scope.key(prefix)).map(|v| *v)
    }
}
