// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use sequencer_types::{LogEntry, LogTerm};

/// The replicated log, 1-indexed to match the Raft paper: index 0 means "no
/// entry", so an empty log's `last_index()` is 0 without a sentinel entry
/// taking up `entries[0]`.
#[derive(Default)]
pub struct ReplicatedLog {
    entries: Vec<LogEntry>,
}

impl ReplicatedLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_index(&self) -> u64 {
        self.entries.last().map(|e| e.index).unwrap_or(0)
    }

    pub fn last_term(&self) -> LogTerm {
        self.entries.last().map(|e| e.term).unwrap_or(LogTerm::ZERO)
    }

    pub fn term_at(&self, index: u64) -> Option<LogTerm> {
        if index == 0 {
            return Some(LogTerm::ZERO);
        }
        self.entries
            .iter()
            .find(|e| e.index == index)
            .map(|e| e.term)
    }

    pub fn get(&self, index: u64) -> Option<&LogEntry> {
        self.entries.iter().find(|e| e.index == index)
    }

    pub fn entries_from(&self, index: u64) -> Vec<LogEntry> {
        self.entries
            .iter()
            .filter(|e| e.index >= index)
            .cloned()
            .collect()
    }

    pub fn append(&mut self, entry: LogEntry) {
        debug_assert_eq!(entry.index, self.last_index() + 1);
        self.entries.push(entry);
    }

    /// Appends `new_entries`, first discarding any existing entry at or past
    /// the first new entry's index that conflicts with it (has a different
    /// term at the same index). This is the "if an existing entry conflicts
    /// with a new one ... delete the existing entry and all that follow it"
    /// step of `AppendEntries`.
    pub fn append_from_leader(&mut self, new_entries: &[LogEntry]) {
        for entry in new_entries {
            match self.term_at(entry.index) {
                Some(existing_term) if existing_term == entry.term && entry.index != 0 => {
                    // Already present and matching; nothing to do.
                }
                _ => {
                    self.entries.retain(|e| e.index < entry.index);
                    self.entries.push(entry.clone());
                }
            }
        }
    }

    /// Discards every entry at or before `up_to_index`, the suffix a
    /// snapshot has already folded in. Safe to call even if a follower is
    /// still behind `up_to_index`; it will need the snapshot itself rather
    /// than these entries to catch up.
    pub fn compact(&mut self, up_to_index: u64) {
        self.entries.retain(|e| e.index > up_to_index);
    }

    pub fn is_at_least_as_up_to_date_as(&self, other_last_term: LogTerm, other_last_index: u64) -> bool {
        match self.last_term().cmp(&other_last_term) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => self.last_index() >= other_last_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sequencer_types::{LogPayload, NodeId};

    fn entry(term: u64, index: u64) -> LogEntry {
        LogEntry::new(
            LogTerm(term),
            index,
            LogPayload::Config(sequencer_types::ConfigChange { members: vec![] }),
            NodeId::new(),
        )
    }

    #[test]
    fn append_from_leader_truncates_conflicting_suffix() {
        let mut log = ReplicatedLog::new();
        log.append(entry(1, 1));
        log.append(entry(1, 2));
        log.append(entry(1, 3));

        log.append_from_leader(&[entry(2, 2)]);
        assert_eq!(log.last_index(), 2);
        assert_eq!(log.term_at(2), Some(LogTerm(2)));
    }

    #[test]
    fn append_from_leader_is_idempotent_for_matching_entries() {
        let mut log = ReplicatedLog::new();
        log.append(entry(1, 1));
        log.append_from_leader(&[entry(1, 1)]);
        assert_eq!(log.last_index(), 1);
    }

    #[test]
    fn empty_log_is_never_more_up_to_date() {
        let log = ReplicatedLog::new();
        assert!(log.is_at_least_as_up_to_date_as(LogTerm::ZERO, 0));
        assert!(!log.is_at_least_as_up_to_date_as(LogTerm(1), 1));
    }

    #[test]
    fn compact_drops_entries_up_to_and_including_the_snapshot_index() {
        let mut log = ReplicatedLog::new();
        log.append(entry(1, 1));
        log.append(entry(1, 2));
        log.append(entry(1, 3));
        log.compact(2);
        assert!(log.get(1).is_none());
        assert!(log.get(2).is_none());
        assert!(log.get(3).is_some());
    }
}
