use crate::backfill::range::BlockRange;
use crate::error::BackfillError;

/// Split a range into contiguous, non-overlapping chunks of `step_size`
/// blocks, ascending, with the final chunk clipped to the range end.
/// Recomputing from the same inputs always yields the same sequence.
pub fn plan(range: BlockRange, step_size: u64) -> Result<Chunks, BackfillError> {
    if step_size == 0 {
        return Err(BackfillError::Configuration(
            "step size must be a positive number of blocks".to_string(),
        ));
    }
    Ok(Chunks {
        next_start: Some(range.start_block),
        end_block: range.end_block,
        step_size,
    })
}

/// Number of chunks `plan` will yield for a range.
pub fn chunk_count(range: BlockRange, step_size: u64) -> u64 {
    range.blocks().div_ceil(step_size)
}

#[derive(Debug, Clone)]
pub struct Chunks {
    next_start: Option<u64>,
    end_block: u64,
    step_size: u64,
}

impl Iterator for Chunks {
    type Item = BlockRange;

    fn next(&mut self) -> Option<BlockRange> {
        let start = self.next_start?;
        let end = start
            .saturating_add(self.step_size - 1)
            .min(self.end_block);
        self.next_start = if end >= self.end_block {
            None
        } else {
            Some(end + 1)
        };
        Some(BlockRange::new(start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks_of(start: u64, end: u64, step: u64) -> Vec<BlockRange> {
        plan(BlockRange::new(start, end), step).unwrap().collect()
    }

    #[test]
    fn chunks_reconstruct_the_range_without_gaps_or_overlap() {
        for (start, end, step) in [(0, 99, 10), (5, 103, 7), (0, 0, 10), (17, 17, 1), (0, 12, 5)] {
            let chunks = chunks_of(start, end, step);
            assert_eq!(chunks.first().unwrap().start_block, start);
            assert_eq!(chunks.last().unwrap().end_block, end);
            for pair in chunks.windows(2) {
                assert_eq!(pair[1].start_block, pair[0].end_block + 1);
            }
            let total: u64 = chunks.iter().map(|c| c.blocks()).sum();
            assert_eq!(total, end - start + 1);
            assert_eq!(chunks.len() as u64, chunk_count(BlockRange::new(start, end), step));
        }
    }

    #[test]
    fn planning_is_deterministic() {
        let first = chunks_of(1_000, 55_000, 10_000);
        let second = chunks_of(1_000, 55_000, 10_000);
        assert_eq!(first, second);
    }

    #[test]
    fn final_chunk_is_clipped() {
        let chunks = chunks_of(0, 12, 5);
        assert_eq!(
            chunks,
            vec![
                BlockRange::new(0, 4),
                BlockRange::new(5, 9),
                BlockRange::new(10, 12),
            ]
        );
    }

    #[test]
    fn single_block_range_yields_one_chunk() {
        assert_eq!(chunks_of(42, 42, 10_000), vec![BlockRange::new(42, 42)]);
    }

    #[test]
    fn zero_step_size_is_a_configuration_error() {
        let err = plan(BlockRange::new(0, 10), 0).unwrap_err();
        assert!(matches!(err, BackfillError::Configuration(_)));
    }

    #[test]
    fn chunk_starts_are_strictly_increasing() {
        let starts: Vec<u64> = chunks_of(0, 100_000, 7_777)
            .iter()
            .map(|c| c.start_block)
            .collect();
        assert!(starts.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
