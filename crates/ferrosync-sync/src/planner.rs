//! Diff planning
//!
//! Source and destination files wait in two queues. Each claim takes one
//! unit of work off them: the source head together with its destination
//! counterpart, or, once the source queue is drained, one obsolete
//! destination file.

use ferrosync_types::{normalize_path, FileEntry};
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::time::SystemTime;

/// One side of a run: its root and the files still waiting to be claimed
#[derive(Debug, Clone)]
pub struct SyncSide {
    root: String,
    entries: VecDeque<FileEntry>,
}

impl SyncSide {
    /// Queue `entries` found below `root`
    pub fn new(root: &str, entries: Vec<FileEntry>) -> Self {
        Self {
            root: normalize_path(root),
            entries: entries.into(),
        }
    }

    /// Root every entry is relative to
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Files still queued
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether every file has been claimed
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Both queues of a run, claimed from under one lock
#[derive(Debug, Clone)]
pub struct SyncQueues {
    /// Files to transfer
    pub source: SyncSide,
    /// Files already at the destination
    pub destination: SyncSide,
}

impl SyncQueues {
    /// Pair a source and a destination side
    pub fn new(source: SyncSide, destination: SyncSide) -> Self {
        Self {
            source,
            destination,
        }
    }

    /// Whether nothing is left to claim
    pub fn is_empty(&self) -> bool {
        self.source.is_empty() && self.destination.is_empty()
    }

    /// Rough number of units the queues will yield, used to size the pool
    pub fn estimate_units(&self) -> usize {
        estimate_units(self.source.len(), self.destination.len())
    }
}

/// Rough unit count for queues of `source` and `destination` files
///
/// When both sides have files, the difference in size hints at how many
/// obsolete units follow the matched ones.
pub fn estimate_units(source: usize, destination: usize) -> usize {
    let (max, min) = (source.max(destination), source.min(destination));
    if min == 0 {
        max
    } else {
        max + (max - min)
    }
}

/// Verdict on a matched pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Timestamps are equal
    Identical,
    /// The destination is newer; left alone
    ConflictSkip,
    /// The source is newer, or a timestamp is unknown
    Replace,
}

/// Classify a matched pair by modification time
pub fn classify(source: Option<SystemTime>, destination: Option<SystemTime>) -> Classification {
    match (source, destination) {
        (Some(source), Some(destination)) => match source.cmp(&destination) {
            Ordering::Equal => Classification::Identical,
            Ordering::Less => Classification::ConflictSkip,
            Ordering::Greater => Classification::Replace,
        },
        _ => Classification::Replace,
    }
}

/// A claimed unit of work
#[derive(Debug, Clone)]
pub enum WorkUnit {
    /// Source file without a destination counterpart
    New {
        /// Source file
        source: FileEntry,
    },
    /// Source file with a destination counterpart
    Matched {
        /// Source file
        source: FileEntry,
        /// Destination file at the same common path
        destination: FileEntry,
        /// What to do about the pair
        classification: Classification,
    },
    /// Destination file without a source counterpart
    Obsolete {
        /// Destination file
        destination: FileEntry,
    },
}

impl WorkUnit {
    /// Root-relative path the unit is about
    pub fn common_path(&self) -> &str {
        let entry = match self {
            Self::New { source } | Self::Matched { source, .. } => source,
            Self::Obsolete { destination } => destination,
        };
        entry.path.common().unwrap_or_else(|| entry.path.full())
    }
}

/// Matches source files against destination files, one claim at a time
#[derive(Debug, Default, Clone, Copy)]
pub struct DiffPlanner;

impl DiffPlanner {
    /// Create a planner
    pub fn new() -> Self {
        Self
    }

    /// Take the next unit of work off `queues`
    ///
    /// Returns `None` once both queues are empty. Obsolete units are only
    /// produced after the source queue has been drained.
    pub fn claim(&self, queues: &mut SyncQueues) -> Option<WorkUnit> {
        let Some(source) = queues.source.entries.pop_front() else {
            let destination = queues.destination.entries.pop_front()?;
            destination.path.resolve_common(&queues.destination.root);
            return Some(WorkUnit::Obsolete { destination });
        };

        let common = source.path.resolve_common(&queues.source.root);
        let destination_root = &queues.destination.root;
        let position = queues
            .destination
            .entries
            .iter()
            .position(|candidate| candidate.path.resolve_common(destination_root) == common);

        match position.and_then(|index| queues.destination.entries.remove(index)) {
            None => Some(WorkUnit::New { source }),
            Some(destination) => {
                let classification = classify(source.modified_at, destination.modified_at);
                Some(WorkUnit::Matched {
                    source,
                    destination,
                    classification,
                })
            }
        }
    }
}
