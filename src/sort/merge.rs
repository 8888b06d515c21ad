/// K-way merge kernel.
///
/// Merges `K` disjoint sorted read-only slices under a caller comparator,
/// handing each element of the merged order to an `emit` sink. The sink
/// decouples the kernel from its destination: the sort pushes into a
/// private buffer under the in-place strategy and assigns into a source
/// segment under the copy-to-temporary strategy, so the kernel itself never
/// allocates.
///
/// Uses a binary min-heap of sequence indices keyed by each sequence's
/// current head, O(n log K). Ties are broken by sequence index, which makes
/// the merge stable whenever the input slices are given in original order.
use std::cmp::Ordering;

/// True if sequence `a`'s head must be emitted before sequence `b`'s head.
#[inline]
fn head_before<T, C>(seqs: &[&[T]], pos: &[usize], a: usize, b: usize, compare: &C) -> bool
where
    C: Fn(&T, &T) -> Ordering,
{
    match compare(&seqs[a][pos[a]], &seqs[b][pos[b]]) {
        Ordering::Less => true,
        Ordering::Greater => false,
        Ordering::Equal => a < b,
    }
}

/// Restore the heap property below `node`.
fn sift_down<T, C>(heap: &mut [usize], seqs: &[&[T]], pos: &[usize], compare: &C, mut node: usize)
where
    C: Fn(&T, &T) -> Ordering,
{
    loop {
        let left = 2 * node + 1;
        if left >= heap.len() {
            break;
        }
        let mut least = left;
        let right = left + 1;
        if right < heap.len() && head_before(seqs, pos, heap[right], heap[left], compare) {
            least = right;
        }
        if head_before(seqs, pos, heap[node], heap[least], compare) {
            break;
        }
        heap.swap(node, least);
        node = least;
    }
}

/// Merge `seqs` in comparator order, emitting exactly the total length.
pub fn multiway_merge<T, C, E>(seqs: &[&[T]], compare: &C, mut emit: E)
where
    C: Fn(&T, &T) -> Ordering,
    E: FnMut(&T),
{
    let mut pos = vec![0usize; seqs.len()];
    let mut heap: Vec<usize> = (0..seqs.len()).filter(|&s| !seqs[s].is_empty()).collect();
    for node in (0..heap.len() / 2).rev() {
        sift_down(&mut heap, seqs, &pos, compare, node);
    }

    while let Some(&s) = heap.first() {
        emit(&seqs[s][pos[s]]);
        pos[s] += 1;
        if pos[s] == seqs[s].len() {
            let last = heap.len() - 1;
            heap.swap(0, last);
            heap.pop();
        }
        sift_down(&mut heap, seqs, &pos, compare, 0);
    }
}
