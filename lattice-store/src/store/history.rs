//! Snapshot History
//!
//! A bounded list of whole-tree snapshots with a cursor, backing undo and
//! redo. The cursor always points at the snapshot matching the live state.
//!
//! Taking a snapshot while the cursor is behind the tail discards everything
//! after the cursor. When the list grows past its limit the oldest snapshots
//! are evicted and the cursor moves down with them.

use std::collections::VecDeque;
use std::time::SystemTime;

use serde_json::Value;

/// Default bound for undoable stores.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// One recorded state.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub timestamp: SystemTime,
    pub state: Value,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMode {
    Recording,
    /// An undo/redo is restoring state; writes are not recorded.
    Replaying,
}

#[derive(Debug)]
pub struct History {
    entries: VecDeque<Snapshot>,
    cursor: usize,
    limit: usize,
    mode: HistoryMode,
    suspended: usize,
    deferred: bool,
}

impl History {
    /// Start a history whose first snapshot is `initial`.
    pub fn new(initial: Value, limit: usize) -> Self {
        let mut history = Self {
            entries: VecDeque::new(),
            cursor: 0,
            limit: limit.max(1),
            mode: HistoryMode::Recording,
            suspended: 0,
            deferred: false,
        };
        history.entries.push_back(Snapshot {
            timestamp: SystemTime::now(),
            state: initial,
            label: None,
        });
        history
    }

    /// Record `state` as the newest snapshot.
    ///
    /// Ignored while replaying. While suspended, the commit is deferred until
    /// the outermost [`resume`](Self::resume).
    pub fn commit(&mut self, state: &Value, label: Option<String>) {
        if self.mode == HistoryMode::Replaying {
            return;
        }
        if self.suspended > 0 {
            self.deferred = true;
            return;
        }

        self.entries.truncate(self.cursor + 1);
        self.entries.push_back(Snapshot {
            timestamp: SystemTime::now(),
            state: state.clone(),
            label,
        });
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
        self.cursor = self.entries.len() - 1;
    }

    /// Step back, returning the state to restore.
    pub fn undo(&mut self) -> Option<Value> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        Some(self.entries[self.cursor].state.clone())
    }

    /// Step forward, returning the state to restore.
    pub fn redo(&mut self) -> Option<Value> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        Some(self.entries[self.cursor].state.clone())
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    /// Forget everything and start over from `state`.
    pub fn clear(&mut self, state: &Value) {
        self.entries.clear();
        self.entries.push_back(Snapshot {
            timestamp: SystemTime::now(),
            state: state.clone(),
            label: None,
        });
        self.cursor = 0;
        self.deferred = false;
    }

    pub fn set_mode(&mut self, mode: HistoryMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> HistoryMode {
        self.mode
    }

    /// Hold commits until the matching [`resume`](Self::resume).
    pub fn suspend(&mut self) {
        self.suspended += 1;
    }

    /// Release one suspension level. Returns whether a commit was deferred
    /// and should now be taken by the caller.
    pub fn resume(&mut self) -> bool {
        self.suspended = self.suspended.saturating_sub(1);
        if self.suspended == 0 {
            std::mem::take(&mut self.deferred)
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> &Snapshot {
        &self.entries[self.cursor]
    }

    pub fn snapshots(&self) -> impl Iterator<Item = &Snapshot> {
        self.entries.iter()
    }
}
