//! Block range chunking and backfill window clipping.

use std::ops::RangeInclusive;

/// Yields consecutive inclusive block ranges of at most `chunk_size` blocks,
/// oldest first.
#[derive(Debug, Clone)]
pub struct BlockChunks {
    current: u64,
    end: u64,
    chunk_size: u64,
    done: bool,
}

impl BlockChunks {
    /// Chunks covering `[start, end]`. Empty when `start > end`; a zero
    /// `chunk_size` is treated as one.
    pub fn new(start: u64, end: u64, chunk_size: u64) -> Self {
        Self {
            current: start,
            end,
            chunk_size: chunk_size.max(1),
            done: start > end,
        }
    }

    /// Number of chunks still to be yielded.
    pub fn remaining(&self) -> u64 {
        if self.done {
            0
        } else {
            (self.end - self.current) / self.chunk_size + 1
        }
    }
}

impl Iterator for BlockChunks {
    type Item = RangeInclusive<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let chunk_start = self.current;
        let chunk_end = chunk_start.saturating_add(self.chunk_size - 1).min(self.end);
        if chunk_end == self.end {
            self.done = true;
        } else {
            self.current = chunk_end + 1;
        }
        Some(chunk_start..=chunk_end)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.remaining()).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

/// Clamp `start` so that `start..=end` spans at most `max_window` blocks.
pub fn clip_window(start: u64, end: u64, max_window: u64) -> u64 {
    if max_window > 0 && end >= start && end - start >= max_window {
        end - max_window + 1
    } else {
        start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_cover_range_exactly() {
        let chunks: Vec<_> = BlockChunks::new(100, 349, 100).collect();
        assert_eq!(chunks, vec![100..=199, 200..=299, 300..=349]);
    }

    #[test]
    fn single_block_and_empty() {
        assert_eq!(BlockChunks::new(7, 7, 250).collect::<Vec<_>>(), vec![7..=7]);
        assert_eq!(BlockChunks::new(8, 7, 250).count(), 0);
    }

    #[test]
    fn chunk_never_exceeds_size() {
        for r in BlockChunks::new(0, 1_000, 250) {
            assert!(r.end() - r.start() < 250);
        }
        assert_eq!(BlockChunks::new(0, 1_000, 250).remaining(), 5);
    }

    #[test]
    fn end_at_u64_max_terminates() {
        let chunks: Vec<_> = BlockChunks::new(u64::MAX - 2, u64::MAX, 2).collect();
        assert_eq!(chunks, vec![(u64::MAX - 2)..=(u64::MAX - 1), u64::MAX..=u64::MAX]);
    }

    #[test]
    fn window_clipping() {
        assert_eq!(clip_window(0, 10_000, 500), 9_501);
        assert_eq!(clip_window(9_500, 10_000, 500), 9_501);
        assert_eq!(clip_window(9_501, 10_000, 500), 9_501);
        assert_eq!(clip_window(9_800, 10_000, 500), 9_800);
        assert_eq!(clip_window(10_001, 10_000, 500), 10_001);
    }
}
