// Bounded FIFO cache of parsed translation units.
//
// Keyed by the original (logical) filename; the facade's flags are fixed for
// its lifetime, so they don't participate in the key. An entry is only a hit
// while the contents file and its mtime are unchanged.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use tracing::debug;

use super::tunit::TranslationUnit;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Keep at most this many units, evicting the oldest first.
    Bounded(usize),
    /// Never cache; the choice for short-lived indexing children that touch
    /// every file exactly once.
    Disabled,
}

struct Entry {
    original: PathBuf,
    contents: PathBuf,
    modified: Option<SystemTime>,
    tunit: Arc<TranslationUnit>,
}

pub struct TunitCache {
    policy: CachePolicy,
    entries: Mutex<VecDeque<Entry>>,
}

impl TunitCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn fetch(&self, original: &Path, contents: &Path) -> Option<Arc<TranslationUnit>> {
        if self.policy == CachePolicy::Disabled {
            return None;
        }
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let index = entries.iter().position(|e| e.original == original)?;
        let entry = &entries[index];
        let fresh = entry.contents == contents && entry.modified == mtime_of(contents);
        if fresh {
            debug!("Translation unit cache hit for '{}'", original.display());
            Some(Arc::clone(&entry.tunit))
        } else {
            entries.remove(index);
            None
        }
    }

    pub fn store(&self, tunit: Arc<TranslationUnit>) {
        let CachePolicy::Bounded(capacity) = self.policy else {
            return;
        };
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let original = tunit.original().to_path_buf();
        entries.retain(|e| e.original != original);
        entries.push_back(Entry {
            original,
            contents: tunit.spelling().to_path_buf(),
            modified: mtime_of(tunit.spelling()),
            tunit,
        });
        while entries.len() > capacity {
            if let Some(evicted) = entries.pop_front() {
                debug!(
                    "Evicting '{}' from translation unit cache",
                    evicted.original.display()
                );
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn mtime_of(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
