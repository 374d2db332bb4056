// crates/core/src/event_log.rs
//! Bounded activity log shown next to the progress display.
//!
//! [`RingBuffer`] keeps fixed storage plus a head index so appends and
//! evictions are O(1). [`EventLog`] layers wall-clock stamping on top.

use serde::{Serialize, Serializer};

/// Entries kept in the activity log.
pub const EVENT_LOG_CAPACITY: usize = 50;

/// Fixed-capacity FIFO. Once full, every push overwrites the oldest slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingBuffer<T> {
    slots: Vec<T>,
    /// Index of the oldest element once the buffer has wrapped.
    head: usize,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// A capacity of zero is bumped to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            head: 0,
            capacity,
        }
    }

    /// Append `item`, returning the evicted oldest element when full.
    pub fn push(&mut self, item: T) -> Option<T> {
        if self.slots.len() < self.capacity {
            self.slots.push(item);
            return None;
        }
        let evicted = std::mem::replace(&mut self.slots[self.head], item);
        self.head = (self.head + 1) % self.capacity;
        Some(evicted)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        let (wrapped, fresh) = self.slots.split_at(self.head);
        fresh.iter().chain(wrapped.iter())
    }

    /// Element `index` positions after the oldest.
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.slots.len() {
            return None;
        }
        self.slots.get((self.head + index) % self.slots.len())
    }

    pub fn last(&self) -> Option<&T> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.head = 0;
    }
}

/// Timestamped activity log, capacity [`EVENT_LOG_CAPACITY`].
///
/// Entries are stored as `"[{local time}] {line}"` and never mutated after
/// append; eviction of the oldest entry is the only removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLog {
    entries: RingBuffer<String>,
    /// Appends since the last reset, including evicted ones.
    appended: u64,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            entries: RingBuffer::with_capacity(EVENT_LOG_CAPACITY),
            appended: 0,
        }
    }

    /// Stamp `line` with the local wall-clock time and append it.
    pub fn append(&mut self, line: impl AsRef<str>) {
        let stamp = chrono::Local::now().format("%H:%M:%S");
        self.append_stamped(format!("[{stamp}] {}", line.as_ref()));
    }

    fn append_stamped(&mut self, entry: String) {
        self.appended += 1;
        if let Some(evicted) = self.entries.push(entry) {
            tracing::trace!(evicted = %evicted, "activity log full, dropped oldest entry");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &str> + '_ {
        self.entries.iter().map(String::as_str)
    }

    /// Monotonic count of appends this session. Unlike [`len`](Self::len)
    /// it keeps growing once the log is full.
    pub fn total_appended(&self) -> u64 {
        self.appended
    }

    pub fn last(&self) -> Option<&str> {
        self.entries.last().map(String::as_str)
    }

    /// Entries oldest first.
    pub fn to_vec(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.appended = 0;
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl Serialize for EventLog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

/// Strip the `"[time] "` prefix from a log entry.
pub fn entry_message(entry: &str) -> &str {
    entry
        .strip_prefix('[')
        .and_then(|rest| rest.split_once("] "))
        .map_or(entry, |(_, message)| message)
}
