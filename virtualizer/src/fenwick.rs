use alloc::vec::Vec;

/// Prefix sums over per-item extents (size plus trailing gap).
///
/// Point updates and prefix queries are `O(log n)`, which keeps a single measurement cheap
/// even for lists with millions of items.
#[derive(Clone, Debug, Default)]
pub(crate) struct Fenwick {
    nodes: Vec<u64>, // 1-indexed, nodes[0] unused
    total: u64,
    top_bit: usize,
}

impl Fenwick {
    /// Builds the tree in `O(n)`. Every item except the last is followed by `gap`.
    pub(crate) fn from_sizes(sizes: &[u32], gap: u32) -> Self {
        let n = sizes.len();
        let mut nodes = alloc::vec![0u64; n + 1];
        let mut total = 0u64;
        for i in 1..=n {
            let extent = extent(sizes[i - 1], gap, i < n);
            total = total.saturating_add(extent);
            nodes[i] = nodes[i].saturating_add(extent);
            let parent = i + lowest_bit(i);
            if parent <= n {
                nodes[parent] = nodes[parent].saturating_add(nodes[i]);
            }
        }
        Self {
            nodes,
            total,
            top_bit: top_bit(n),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    pub(crate) fn total(&self) -> u64 {
        self.total
    }

    pub(crate) fn add(&mut self, index: usize, delta: i64) {
        let n = self.len();
        if index >= n || delta == 0 {
            return;
        }
        self.total = apply_delta(self.total, delta);
        let mut i = index + 1;
        while i <= n {
            self.nodes[i] = apply_delta(self.nodes[i], delta);
            i += lowest_bit(i);
        }
    }

    /// Sum of the first `count` extents.
    pub(crate) fn prefix_sum(&self, count: usize) -> u64 {
        let mut i = count.min(self.len());
        let mut sum = 0u64;
        while i > 0 {
            sum = sum.saturating_add(self.nodes[i]);
            i &= i - 1;
        }
        sum
    }

    /// Number of leading items whose combined extent is `<= target`.
    pub(crate) fn items_within(&self, mut target: u64) -> usize {
        let n = self.len();
        let mut idx = 0usize;
        let mut bit = self.top_bit;
        while bit != 0 {
            let next = idx + bit;
            if next <= n && self.nodes[next] <= target {
                target -= self.nodes[next];
                idx = next;
            }
            bit >>= 1;
        }
        idx
    }
}

fn extent(size: u32, gap: u32, has_next: bool) -> u64 {
    if has_next {
        size as u64 + gap as u64
    } else {
        size as u64
    }
}

fn apply_delta(value: u64, delta: i64) -> u64 {
    if delta >= 0 {
        value.saturating_add(delta as u64)
    } else {
        debug_assert!(value >= delta.unsigned_abs(), "Fenwick underflow");
        value.saturating_sub(delta.unsigned_abs())
    }
}

fn lowest_bit(i: usize) -> usize {
    i & i.wrapping_neg()
}

fn top_bit(n: usize) -> usize {
    if n == 0 {
        0
    } else {
        1usize << (usize::BITS - 1 - n.leading_zeros())
    }
}
