/// Splitter selection for the parallel multiway mergesort.
///
/// The merge stage needs, for every worker and every sorted chunk, a
/// `(begin, end)` sub-range ("piece") such that the pieces of each chunk
/// tile it exactly across workers. Two interchangeable algorithms compute
/// these pieces: sampling (approximate balance, cheap) and exact rank
/// selection (perfect balance, see `select`). This module holds the range
/// partitioner shared by both plus the sampling half.
use std::cmp::Ordering;

/// One worker's slice of one sorted chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    /// Begin of the sub-range (inclusive).
    pub begin: usize,
    /// End of the sub-range (exclusive).
    pub end: usize,
}

impl Piece {
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.begin
    }
}

/// Divide `[0, length)` into `parts` near-equal contiguous spans.
///
/// Returns `parts + 1` monotonically non-decreasing offsets; the remainder
/// is distributed to the front spans, so the first `length % parts` spans
/// are one element longer. Used for the initial per-worker chunking and for
/// sample spacing.
pub fn equally_split(length: usize, parts: usize) -> Vec<usize> {
    debug_assert!(parts > 0);
    let chunk = length / parts;
    let rem = length % parts;
    let mut offsets = Vec::with_capacity(parts + 1);
    let mut pos = 0;
    offsets.push(0);
    for i in 0..parts {
        pos += if i < rem { chunk + 1 } else { chunk };
        offsets.push(pos);
    }
    offsets
}

/// First position in the sorted slice whose element is not ordered before
/// `probe` (lower-bound semantics).
#[inline]
pub(crate) fn lower_bound<T, C>(sorted: &[T], probe: &T, compare: &C) -> usize
where
    C: Fn(&T, &T) -> Ordering,
{
    sorted.partition_point(|x| compare(x, probe) == Ordering::Less)
}

/// Select `num_samples` equally spaced elements from one sorted chunk.
///
/// Sample positions come from `equally_split`; each sample is the element
/// at the offset following a split point. Offsets are clamped to the last
/// element so that tiny chunks (shorter than the sample count) simply
/// repeat their maximum instead of reading past the end.
pub(crate) fn select_samples<T: Clone>(chunk: &[T], num_samples: usize) -> Vec<T> {
    debug_assert!(!chunk.is_empty());
    let es = equally_split(chunk.len(), num_samples + 1);
    let mut samples = Vec::with_capacity(num_samples);
    for k in 0..num_samples {
        let idx = es[k + 1].min(chunk.len() - 1);
        samples.push(chunk[idx].clone());
    }
    samples
}

/// Compute worker `iam`'s pieces from the globally sorted sample pool.
///
/// The lower splitter is sample `num_samples * iam`, the upper splitter
/// sample `num_samples * (iam + 1)`; both are located in every chunk by
/// lower-bound binary search. Worker 0 starts at the absolute beginning of
/// each chunk and the last worker ends at the absolute end, so the pieces
/// of each chunk tile it exactly even though sizes are only approximately
/// balanced.
pub(crate) fn sampling_pieces<T, C>(
    views: &[&[T]],
    samples: &[T],
    num_samples: usize,
    iam: usize,
    compare: &C,
) -> Vec<Piece>
where
    C: Fn(&T, &T) -> Ordering,
{
    let num_threads = views.len();
    let mut pieces = Vec::with_capacity(num_threads);
    for view in views {
        let begin = if iam == 0 {
            0
        } else {
            lower_bound(view, &samples[num_samples * iam], compare)
        };
        let end = if iam + 1 == num_threads {
            view.len()
        } else {
            lower_bound(view, &samples[num_samples * (iam + 1)], compare)
        };
        pieces.push(Piece { begin, end });
    }
    pieces
}
