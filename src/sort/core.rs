/// Parallel multiway mergesort core.
///
/// The classic shared-memory design (known from the MCSTL and the
/// libstdc++ parallel mode): partition the input into one contiguous chunk
/// per worker, sort every chunk locally, compute a globally balanced
/// re-partitioning of the sorted chunks ("splitting"), then k-way merge in
/// parallel straight back into the caller's storage.
///
/// Key properties:
/// - fixed fork-join team per call (`std::thread::scope`), phases ordered
///   by one reusable `Barrier`, no locks and no work stealing
/// - every worker's write set is a pre-assigned disjoint index range, so
///   concurrent writes to the same memory never occur by construction
/// - peak memory overhead is one chunk's worth of temporary per worker:
///   either the sort buffer or the merge buffer is private, never both
use std::cmp::Ordering;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Barrier, OnceLock};
use std::thread;

use super::merge::multiway_merge;
use super::select::multisequence_partition;
use super::split::{Piece, equally_split, sampling_pieces, select_samples};

/// Default oversampling factor for sampling-mode splitting.
pub const DEFAULT_OVERSAMPLING: usize = 10;

/// How the per-chunk merge boundaries are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplittingMode {
    /// Equally spaced samples from every sorted chunk, pooled and sorted
    /// once; boundaries via binary search. Approximate balance, cheap —
    /// O(T·V·log(T·V)) extra work for oversampling factor V.
    Sampling,
    /// Exact multi-sequence rank selection. Every worker's merged output
    /// chunk is exactly as long as its input chunk.
    Exact,
}

/// Where the local sort runs and, consequently, where the merge writes.
///
/// Exactly one of the two stages uses a private per-worker buffer, bounding
/// the extra memory to one chunk per worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferStrategy {
    /// Sort inside the source sub-range; merge into a private buffer and
    /// copy it back at the end (writeback).
    InPlace,
    /// Copy the chunk into a private buffer and sort there; merge writes
    /// directly into the source, no writeback.
    CopyToTemp,
}

/// Configuration for one sort call.
#[derive(Debug, Clone)]
pub struct SortOptions {
    /// Preserve the input order of equal elements.
    pub stable: bool,
    /// Requested team size; clamped so no worker gets an empty chunk.
    pub threads: usize,
    /// Samples drawn per worker is `oversampling * threads - 1`; larger
    /// values improve balance at higher sampling cost. Minimum 1.
    pub oversampling: usize,
    pub splitting: SplittingMode,
    pub strategy: BufferStrategy,
}

impl Default for SortOptions {
    fn default() -> Self {
        SortOptions {
            stable: false,
            threads: thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            oversampling: DEFAULT_OVERSAMPLING,
            splitting: SplittingMode::Sampling,
            strategy: BufferStrategy::CopyToTemp,
        }
    }
}

/// Raw view of the caller's sequence, shared across the worker team.
///
/// Workers derive disjoint sub-slices from it per phase; the barriers in
/// `worker` order the phases so a range is never read while another worker
/// writes an overlapping range.
struct RawSlice<T> {
    ptr: *mut T,
    len: usize,
}

// SAFETY: hands out references only through the unsafe accessors below,
// whose callers uphold disjointness; the pointee is accessed from the
// spawned worker threads.
unsafe impl<T: Send + Sync> Send for RawSlice<T> {}
unsafe impl<T: Send + Sync> Sync for RawSlice<T> {}

impl<T> RawSlice<T> {
    fn new(data: &mut [T]) -> Self {
        RawSlice {
            ptr: data.as_mut_ptr(),
            len: data.len(),
        }
    }

    /// SAFETY: `begin..end` must be in bounds and no worker may mutate an
    /// overlapping range for the lifetime of the returned slice.
    unsafe fn slice(&self, begin: usize, end: usize) -> &[T] {
        debug_assert!(begin <= end && end <= self.len);
        unsafe { std::slice::from_raw_parts(self.ptr.add(begin), end - begin) }
    }

    /// SAFETY: as `slice`, plus `begin..end` must be disjoint from every
    /// range any other worker reads or writes during the current phase.
    #[allow(clippy::mut_from_ref)]
    unsafe fn slice_mut(&self, begin: usize, end: usize) -> &mut [T] {
        debug_assert!(begin <= end && end <= self.len);
        unsafe { std::slice::from_raw_parts_mut(self.ptr.add(begin), end - begin) }
    }
}

/// Data shared by the whole team for the duration of one sort call.
///
/// Created at call entry, fully consumed within the call, and dropped
/// (with all temporaries) before the call returns. Each `OnceLock` slot has
/// exactly one writer; readers only touch it after a barrier.
struct SharedState<T> {
    source: RawSlice<T>,
    /// Chunk boundary offsets, `starts[num_threads] == n`.
    starts: Vec<usize>,
    num_threads: usize,
    /// Samples per worker in sampling mode.
    num_samples: usize,
    stable: bool,
    splitting: SplittingMode,
    strategy: BufferStrategy,
    /// CopyToTemp: per-worker sorted private buffers, published before the
    /// first barrier and read-only afterwards.
    sorted_temp: Vec<OnceLock<Vec<T>>>,
    /// Sampling: per-worker sample rows.
    sample_rows: Vec<OnceLock<Vec<T>>>,
    /// Sampling: the pooled, globally sorted samples (written by worker 0).
    sorted_samples: OnceLock<Vec<T>>,
    /// Exact: per-worker end offsets, one per chunk; the last worker's row
    /// stays empty (its ends are the chunk lengths).
    split_ends: Vec<OnceLock<Vec<usize>>>,
    /// Set when a worker panicked. Checked after every barrier so the
    /// survivors stop touching the data and drain the remaining barriers.
    poisoned: AtomicBool,
    barrier: Barrier,
}

impl<T: Clone + Send + Sync> SharedState<T> {
    #[inline]
    fn chunk_len(&self, s: usize) -> usize {
        self.starts[s + 1] - self.starts[s]
    }

    /// Read-only view of sorted chunk `s`.
    ///
    /// Valid for the owner as soon as its local sort finished, and for
    /// everyone else between the post-sort barrier and the writeback
    /// barrier.
    fn chunk_view(&self, s: usize) -> &[T] {
        match self.strategy {
            BufferStrategy::InPlace => {
                // SAFETY: chunk `s` is mutated only by worker `s` during
                // the sort phase and by nobody until writeback, which a
                // barrier separates from all reads.
                unsafe { self.source.slice(self.starts[s], self.starts[s + 1]) }
            }
            BufferStrategy::CopyToTemp => match self.sorted_temp[s].get() {
                Some(buf) => buf.as_slice(),
                None => unreachable!("sorted chunk published before barrier"),
            },
        }
    }

    fn chunk_views(&self) -> Vec<&[T]> {
        (0..self.num_threads).map(|s| self.chunk_view(s)).collect()
    }

    /// Wait at the next phase barrier and report whether the whole team is
    /// still running. `false` means a teammate panicked; the caller must
    /// return at once so `worker` can drain the barriers it never reached.
    fn sync(&self, passed: &mut usize) -> bool {
        self.barrier.wait();
        *passed += 1;
        !self.poisoned.load(AtomicOrdering::Acquire)
    }
}

/// Every worker passes exactly this many barriers per call, in all four
/// splitting/strategy combinations. The fixed count is what lets a worker
/// that bailed out (or panicked) serve the barriers it never reached, so
/// no teammate blocks on it.
const BARRIER_POINTS: usize = 3;

/// Body executed by every team member, parameterized only by its id.
///
/// Contains panics from the comparator (or from `Clone`): a panicking
/// worker marks the team poisoned and keeps serving its remaining
/// barriers so no teammate blocks on it, then rethrows once the team is
/// past its last barrier. `thread::scope` carries the panic to the caller.
fn worker<T, C>(shared: &SharedState<T>, compare: &C, iam: usize)
where
    T: Clone + Send + Sync,
    C: Fn(&T, &T) -> Ordering + Sync,
{
    let mut passed = 0;
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        worker_phases(shared, compare, iam, &mut passed);
    }));
    if result.is_err() {
        shared.poisoned.store(true, AtomicOrdering::Release);
    }
    while passed < BARRIER_POINTS {
        shared.barrier.wait();
        passed += 1;
    }
    if let Err(payload) = result {
        panic::resume_unwind(payload);
    }
}

/// The phase sequence of one worker: local sort, splitting, merge.
///
/// Returns early when `sync` reports a poisoned team; `worker` then drains
/// the barriers this body never reached.
fn worker_phases<T, C>(shared: &SharedState<T>, compare: &C, iam: usize, passed: &mut usize)
where
    T: Clone + Send + Sync,
    C: Fn(&T, &T) -> Ordering + Sync,
{
    let num_threads = shared.num_threads;
    let (lo, hi) = (shared.starts[iam], shared.starts[iam + 1]);

    // Local sort stage.
    match shared.strategy {
        BufferStrategy::InPlace => {
            // SAFETY: chunk ranges tile the input; each worker sorts only
            // its own chunk.
            let chunk = unsafe { shared.source.slice_mut(lo, hi) };
            if shared.stable {
                chunk.sort_by(compare);
            } else {
                chunk.sort_unstable_by(compare);
            }
        }
        BufferStrategy::CopyToTemp => {
            // SAFETY: shared read of a range nobody mutates; the sort runs
            // in the private copy.
            let mut buf = unsafe { shared.source.slice(lo, hi) }.to_vec();
            if shared.stable {
                buf.sort_by(compare);
            } else {
                buf.sort_unstable_by(compare);
            }
            // sole writer of this slot
            let _ = shared.sorted_temp[iam].set(buf);
        }
    }

    // Splitter selection stage: this worker's piece of every chunk.
    let pieces: Vec<Piece> = match shared.splitting {
        SplittingMode::Sampling => {
            let num_samples = shared.num_samples;
            let row = select_samples(shared.chunk_view(iam), num_samples);
            let _ = shared.sample_rows[iam].set(row);

            // (a) all chunks sorted, all sample rows drawn
            if !shared.sync(passed) {
                return;
            }

            if iam == 0 {
                let mut pool: Vec<T> = Vec::with_capacity(num_threads * num_samples);
                for slot in &shared.sample_rows {
                    match slot.get() {
                        Some(row) => pool.extend_from_slice(row),
                        None => unreachable!("sample row published before barrier"),
                    }
                }
                pool.sort_unstable_by(compare);
                let _ = shared.sorted_samples.set(pool);
            }

            // (b) sample pool globally sorted
            if !shared.sync(passed) {
                return;
            }

            let samples = match shared.sorted_samples.get() {
                Some(samples) => samples,
                None => unreachable!("sample pool published before barrier"),
            };
            sampling_pieces(&shared.chunk_views(), samples, num_samples, iam, compare)
        }
        SplittingMode::Exact => {
            // (a) all sorted chunk views published
            if !shared.sync(passed) {
                return;
            }

            let views = shared.chunk_views();
            let ends: Vec<usize> = if iam + 1 < num_threads {
                let ends = multisequence_partition(&views, shared.starts[iam + 1], compare);
                let _ = shared.split_ends[iam].set(ends.clone());
                ends
            } else {
                // the last worker takes every chunk to its absolute end
                (0..num_threads).map(|s| shared.chunk_len(s)).collect()
            };

            // (b) neighbor end offsets visible; this worker's begins are
            // worker (iam - 1)'s ends
            if !shared.sync(passed) {
                return;
            }

            if iam == 0 {
                ends.into_iter().map(|end| Piece { begin: 0, end }).collect()
            } else {
                let prev = match shared.split_ends[iam - 1].get() {
                    Some(prev) => prev,
                    None => unreachable!("neighbor ends published before barrier"),
                };
                prev.iter()
                    .zip(ends)
                    .map(|(&begin, end)| Piece { begin, end })
                    .collect()
            }
        }
    };

    // Parallel merge stage: merge this worker's piece of every chunk into
    // its contiguous output segment. The segment offset is the number of
    // elements assigned to lower worker ids.
    let offset: usize = pieces.iter().map(|p| p.begin).sum();
    let length: usize = pieces.iter().map(|p| p.len()).sum();

    let views = shared.chunk_views();
    let seqs: Vec<&[T]> = pieces
        .iter()
        .enumerate()
        .map(|(s, p)| &views[s][p.begin..p.end])
        .collect();

    match shared.strategy {
        BufferStrategy::InPlace => {
            // The source still holds every worker's sorted chunk, so merge
            // into a private buffer first.
            let mut out: Vec<T> = Vec::with_capacity(length);
            multiway_merge(&seqs, compare, |x| out.push(x.clone()));
            debug_assert_eq!(out.len(), length);
            drop(seqs);
            drop(views);

            // (d) every merge done before any writeback overwrites a chunk
            if !shared.sync(passed) {
                return;
            }

            // SAFETY: output segments tile the input in worker-id order,
            // so writeback ranges are disjoint; all reads of the source
            // ended at the barrier above.
            let dst = unsafe { shared.source.slice_mut(offset, offset + length) };
            dst.clone_from_slice(&out);
        }
        BufferStrategy::CopyToTemp => {
            // SAFETY: output segments tile the input and every read goes
            // to the private sorted buffers, so writing the source races
            // with nothing.
            let dst = unsafe { shared.source.slice_mut(offset, offset + length) };
            let mut filled = 0;
            multiway_merge(&seqs, compare, |x| {
                dst[filled] = x.clone();
                filled += 1;
            });
            debug_assert_eq!(filled, length);

            // (d) the call is atomic: nobody returns until every segment
            // is written
            shared.sync(passed);
        }
    }
}

/// Sort `data` in place under `compare` with a fixed team of worker
/// threads.
///
/// The team exists for this call only; all temporaries are released before
/// returning. `n <= 1` returns immediately without allocating or spawning.
/// A comparator that panics aborts the whole call (the panic resumes on the
/// calling thread) and leaves the sequence in an unspecified order.
pub fn parallel_mergesort<T, C>(data: &mut [T], compare: C, options: &SortOptions)
where
    T: Clone + Send + Sync,
    C: Fn(&T, &T) -> Ordering + Sync,
{
    let n = data.len();
    if n <= 1 {
        return;
    }

    // at least one element per worker
    let num_threads = options.threads.clamp(1, n);
    let oversampling = options.oversampling.max(1);
    let num_samples = oversampling * num_threads - 1;

    let shared = SharedState {
        source: RawSlice::new(data),
        starts: equally_split(n, num_threads),
        num_threads,
        num_samples,
        stable: options.stable,
        splitting: options.splitting,
        strategy: options.strategy,
        sorted_temp: (0..num_threads).map(|_| OnceLock::new()).collect(),
        sample_rows: (0..num_threads).map(|_| OnceLock::new()).collect(),
        sorted_samples: OnceLock::new(),
        split_ends: (0..num_threads).map(|_| OnceLock::new()).collect(),
        poisoned: AtomicBool::new(false),
        barrier: Barrier::new(num_threads),
    };

    // Fork-join region: workers 1..T on spawned threads, worker 0 on the
    // calling thread.
    thread::scope(|scope| {
        for iam in 1..num_threads {
            let shared = &shared;
            let compare = &compare;
            scope.spawn(move || worker(shared, compare, iam));
        }
        worker(&shared, &compare, 0);
    });
}

/// `parallel_mergesort` with the natural `Ord` ordering.
pub fn parallel_sort<T>(data: &mut [T], options: &SortOptions)
where
    T: Ord + Clone + Send + Sync,
{
    parallel_mergesort(data, T::cmp, options);
}
