use std::collections::HashSet;

/// Spotify ids collected for one batched lookup.
///
/// Ids already pending are ignored, so the buffer never holds more than
/// `limit` distinct ids and [`IdBuffer::push`] reports the moment it has to
/// be flushed.
#[derive(Debug)]
pub struct IdBuffer {
    ids: Vec<String>,
    pending: HashSet<String>,
    limit: usize,
}

impl IdBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            ids: Vec::with_capacity(limit),
            pending: HashSet::with_capacity(limit),
            limit,
        }
    }

    /// Adds `id` and returns whether the buffer is now full.
    pub fn push(&mut self, id: &str) -> bool {
        if self.pending.insert(id.to_string()) {
            self.ids.push(id.to_string());
        }
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.ids.len() >= self.limit
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Empties the buffer and hands its ids over for flushing.
    pub fn take(&mut self) -> Vec<String> {
        self.pending.clear();
        std::mem::take(&mut self.ids)
    }
}
