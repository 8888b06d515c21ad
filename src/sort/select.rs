/// Exact multi-sequence rank selection.
///
/// Given `K` sorted sequences and a target global rank `r`, computes one
/// offset per sequence such that the offsets sum to exactly `r` and every
/// element before an offset is not ordered after any element at or beyond
/// any other sequence's offset. In other words: the union of the prefixes
/// is a valid "first r elements" of the merged order. Exact-mode splitting
/// uses this to guarantee perfectly balanced merge output chunks.
use std::cmp::Ordering;

/// Count elements not ordered after `probe` (upper-bound position).
#[inline]
fn upper_bound<T, C>(sorted: &[T], probe: &T, compare: &C) -> usize
where
    C: Fn(&T, &T) -> Ordering,
{
    sorted.partition_point(|x| compare(x, probe) != Ordering::Greater)
}

/// Split `seqs` at global rank `rank`.
///
/// Algorithm: the splitter value is the `rank`-th smallest element of the
/// union, found as the least per-sequence candidate whose inclusive global
/// rank reaches `rank` (each candidate located by binary search, each probe
/// costing one binary search per sequence). Every element strictly below
/// the splitter is taken in full; the remaining deficit is filled from the
/// splitter-equal runs, front sequences first. Filling front-first keeps
/// equal elements in sequence order, which preserves stability when the
/// sequences are sorted chunks in original input order.
///
/// Cost is O(K^2 log^2 n) comparisons; the sort calls this once per worker.
pub fn multisequence_partition<T, C>(seqs: &[&[T]], rank: usize, compare: &C) -> Vec<usize>
where
    C: Fn(&T, &T) -> Ordering,
{
    let total: usize = seqs.iter().map(|s| s.len()).sum();
    debug_assert!(rank <= total);
    if rank == 0 {
        return vec![0; seqs.len()];
    }
    if rank >= total {
        return seqs.iter().map(|s| s.len()).collect();
    }

    // Inclusive global rank: how many elements across all sequences are
    // not ordered after x. Monotone along every sorted sequence.
    let rank_le = |x: &T| -> usize {
        seqs.iter().map(|s| upper_bound(s, x, compare)).sum()
    };

    // The splitter is the least element with rank_le >= rank. At least one
    // sequence contains it, and within a sequence the candidates form a
    // suffix, so each sequence contributes its first candidate.
    let mut splitter: Option<&T> = None;
    for s in seqs {
        let i = s.partition_point(|x| rank_le(x) < rank);
        if i < s.len() {
            let candidate = &s[i];
            splitter = match splitter {
                Some(v) if compare(candidate, v) != Ordering::Less => Some(v),
                _ => Some(candidate),
            };
        }
    }
    // rank < total guarantees a candidate exists
    let splitter = match splitter {
        Some(v) => v,
        None => unreachable!("rank below total implies a splitter exists"),
    };

    // Take everything strictly below the splitter, then fill the deficit
    // from splitter-equal runs in sequence order.
    let mut offsets: Vec<usize> = seqs
        .iter()
        .map(|s| s.partition_point(|x| compare(x, splitter) == Ordering::Less))
        .collect();
    let below: usize = offsets.iter().sum();
    debug_assert!(below < rank);
    let mut deficit = rank - below;
    for (i, s) in seqs.iter().enumerate() {
        if deficit == 0 {
            break;
        }
        let run_end = upper_bound(s, splitter, compare);
        let take = (run_end - offsets[i]).min(deficit);
        offsets[i] += take;
        deficit -= take;
    }
    debug_assert_eq!(deficit, 0);
    offsets
}
