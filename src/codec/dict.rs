//! Match dictionary for the ZLC longest-match search
//!
//! Keeps one bucket per possible first byte, each holding window positions in
//! most-recent-first order. Stale positions are pruned lazily: because every
//! bucket is recency-ordered, the first out-of-window candidate a search
//! reaches marks the start of a stale suffix that can be cut off wholesale.

use std::collections::VecDeque;

/// Per-byte-value history of window positions.
pub struct MatchDictionary {
    buckets: Vec<VecDeque<usize>>,
}

impl Default for MatchDictionary {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchDictionary {
    /// Create an empty dictionary.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buckets: (0..256).map(|_| VecDeque::new()).collect(),
        }
    }

    /// Record `pos` as the newest candidate for byte value `input[pos]`.
    pub fn add(&mut self, input: &[u8], pos: usize) {
        self.buckets[input[pos] as usize].push_front(pos);
    }

    /// Find the longest match for `input[pos..]` among recorded candidates.
    ///
    /// Candidates older than `window_start` are pruned on encounter. The
    /// comparison never reads at or past `pos` (the window end) and never
    /// extends past `max_len` bytes. The most recent candidate wins ties,
    /// which biases encoded offsets toward small values.
    ///
    /// Returns `(start, length)`; `start` is `None` when no candidate
    /// matched at all.
    pub fn find_best_match(
        &mut self,
        input: &[u8],
        pos: usize,
        max_len: usize,
        window_start: usize,
    ) -> (Option<usize>, usize) {
        if max_len == 0 {
            return (None, 0);
        }

        let bucket = &mut self.buckets[input[pos] as usize];
        let mut best_start = None;
        let mut best_len = 0;

        let mut i = 0;
        while i < bucket.len() {
            let cand = bucket[i];
            if cand < window_start {
                // everything from here on is older still
                bucket.truncate(i);
                break;
            }

            // first byte already known equal via the bucket key
            let end = pos.min(cand + max_len);
            let mut len = 1;
            while cand + len < end && input[cand + len] == input[pos + len] {
                len += 1;
            }

            if len == max_len {
                return (Some(cand), max_len);
            }
            if len > best_len {
                best_len = len;
                best_start = Some(cand);
            }
            i += 1;
        }

        (best_start, best_len)
    }
}
