use crate::config::DedupScope;
use crate::models::ListingEntry;
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Append-only collection of admitted listings, keyed by identity.
///
/// Identity is the listing URL, else the title. With `DedupScope::City`
/// each city keeps its own set of seen keys, so a listing that shows up
/// under two cities is recorded once for each.
#[derive(Debug)]
pub struct DedupAccumulator {
    scope: DedupScope,
    seen: HashMap<String, HashSet<String>>,
    entries: Vec<ListingEntry>,
}

impl DedupAccumulator {
    pub fn new(scope: DedupScope) -> Self {
        Self {
            scope,
            seen: HashMap::new(),
            entries: Vec::new(),
        }
    }

    /// Record the entry if its identity is new within its scope.
    ///
    /// The first entry for a key wins; later duplicates are dropped, not
    /// merged. Entries with neither URL nor title are never admitted.
    pub fn admit(&mut self, entry: ListingEntry) -> bool {
        let Some(key) = entry.identity_key() else {
            trace!("dropping entry without identity");
            return false;
        };
        let bucket = match self.scope {
            DedupScope::Run => String::new(),
            DedupScope::City => entry.city.clone(),
        };
        if !self.seen.entry(bucket).or_default().insert(key.to_string()) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ListingEntry] {
        &self.entries
    }
}
