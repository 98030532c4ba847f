//! Bounded accumulator for the most recent diagnostic output.

/// Fixed-capacity text window that drops the oldest characters on overflow.
///
/// Capacity is counted in `char`s so truncation never splits a UTF-8
/// sequence.
#[derive(Debug, Clone)]
pub struct TrailingBuffer {
    text: String,
    chars: usize,
    capacity: usize,
}

impl TrailingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            text: String::new(),
            chars: 0,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of characters currently held.
    pub fn len(&self) -> usize {
        self.chars
    }

    pub fn is_empty(&self) -> bool {
        self.chars == 0
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.chars = 0;
    }

    /// Append `chunk`, then discard from the front until within capacity.
    pub fn push(&mut self, chunk: &str) {
        let incoming = chunk.chars().count();
        if incoming >= self.capacity {
            // The chunk alone fills the window; keep only its tail.
            let skip = incoming - self.capacity;
            let start = chunk
                .char_indices()
                .nth(skip)
                .map_or(chunk.len(), |(idx, _)| idx);
            self.text.clear();
            self.text.push_str(&chunk[start..]);
            self.chars = self.capacity;
            return;
        }

        self.text.push_str(chunk);
        self.chars += incoming;
        if self.chars > self.capacity {
            let excess = self.chars - self.capacity;
            let cut = self
                .text
                .char_indices()
                .nth(excess)
                .map_or(self.text.len(), |(idx, _)| idx);
            self.text.drain(..cut);
            self.chars = self.capacity;
        }
    }
}
