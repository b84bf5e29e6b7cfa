//! Bounded priority queue with eager admission.
//!
//! Entries are kept sorted by `(priority, sequence)`: priority first
//! (`High` before `Normal`), then arrival order. The sequence key is the
//! request id, allocated in strictly increasing creation order, so FIFO
//! within a priority class is a direct consequence of the sort key -- no
//! comparator tricks.
//!
//! Admission is *eager*: a request occupies its slot from the moment
//! [`RequestQueue::accept`] admits it at routing time, even though it is
//! still physically traveling. Refusal is a sentinel position
//! (`capacity + 1`), not an error.

use lanesim_types::{Priority, QueueId, RequestId, ServerId};

/// One admitted entry: the sort key plus the request it stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueEntry {
    /// Priority class, the primary sort key.
    pub priority: Priority,
    /// The admitted request; its id doubles as the FIFO tie-break key.
    pub request: RequestId,
}

impl QueueEntry {
    /// The two-part sort key: priority first, then creation order.
    pub const fn sort_key(self) -> (Priority, RequestId) {
        (self.priority, self.request)
    }
}

/// A bounded, priority-ordered admission buffer paired with one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestQueue {
    id: QueueId,
    capacity: usize,
    entries: Vec<QueueEntry>,
    can_bypass: bool,
    paired_server: Option<ServerId>,
}

impl RequestQueue {
    /// Create an empty queue with the given fixed capacity.
    ///
    /// A new queue has never dispatched, so `can_bypass` starts true.
    pub const fn new(id: QueueId, capacity: usize, paired_server: Option<ServerId>) -> Self {
        Self {
            id,
            capacity,
            entries: Vec::new(),
            can_bypass: true,
            paired_server,
        }
    }

    /// The queue's identifier.
    pub const fn id(&self) -> QueueId {
        self.id
    }

    /// The fixed admission capacity.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// The paired server, if any.
    pub const fn paired_server(&self) -> Option<ServerId> {
        self.paired_server
    }

    /// Whether new arrivals may skip this queue and go straight to its
    /// paired server.
    pub const fn can_bypass(&self) -> bool {
        self.can_bypass
    }

    /// Mark the bypass lane as taken: a request is now in flight to the
    /// paired server, so further arrivals must queue.
    pub const fn disable_bypass(&mut self) {
        self.can_bypass = false;
    }

    /// Current number of admitted entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the queue is at capacity.
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// The admitted entries, front (next to dispatch) first.
    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    /// Whether `request` holds a slot in this queue.
    pub fn contains(&self, request: RequestId) -> bool {
        self.entries.iter().any(|entry| entry.request == request)
    }

    /// The 1-based slot position of `request`, if admitted.
    pub fn position_of(&self, request: RequestId) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.request == request)
            .map(|index| index.saturating_add(1))
    }

    /// Admit a request, keeping entries sorted by `(priority, sequence)`.
    ///
    /// Returns the 1-based position of the inserted entry. If the queue is
    /// full, returns `capacity + 1` and leaves the entries untouched --
    /// the sentinel signals refusal and gives the caller a magnitude for
    /// display. Every entry behind the insertion point shifts one slot
    /// back; the caller is responsible for notifying those requests.
    pub fn accept(&mut self, priority: Priority, request: RequestId) -> usize {
        if self.is_full() {
            return self.capacity.saturating_add(1);
        }

        let entry = QueueEntry { priority, request };
        let key = entry.sort_key();
        // Insert after all entries with a smaller-or-equal key. Keys are
        // unique (the request id is), so "equal" never actually occurs;
        // the partition point is simply the first strictly-greater entry.
        let index = self
            .entries
            .partition_point(|existing| existing.sort_key() <= key);
        self.entries.insert(index, entry);
        index.saturating_add(1)
    }

    /// Remove and return the front entry (highest logical priority,
    /// earliest arrival).
    ///
    /// Returns `None` if the queue is empty; in that case the bypass flag
    /// is raised so the next arrival may go straight to the server. The
    /// flag is also raised when removing the front entry empties the
    /// queue. Every remaining entry shifts one slot forward; the caller
    /// notifies those requests and hands the popped request to the paired
    /// server.
    pub fn dispatch_next(&mut self) -> Option<QueueEntry> {
        if self.entries.is_empty() {
            self.can_bypass = true;
            return None;
        }
        let front = self.entries.remove(0);
        if self.entries.is_empty() {
            self.can_bypass = true;
        }
        Some(front)
    }

    /// Remove a specific request's entry, if present. Used when a lane is
    /// torn down and its admitted requests are dropped.
    pub fn remove(&mut self, request: RequestId) -> Option<QueueEntry> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.request == request)?;
        Some(self.entries.remove(index))
    }

    /// Drain all entries, front first. Used on lane removal.
    pub fn take_entries(&mut self) -> Vec<QueueEntry> {
        core::mem::take(&mut self.entries)
    }

    /// Whether the entries are sorted by `(priority, sequence)`.
    /// Invariant check used by tests.
    pub fn is_sorted(&self) -> bool {
        self.entries
            .windows(2)
            .all(|pair| match pair {
                [a, b] => a.sort_key() < b.sort_key(),
                _ => true,
            })
    }
}
