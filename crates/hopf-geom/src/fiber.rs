//! Fiber-instance partition and multi-draw ranges.

use crate::layout::FiberInstance;
use std::ops::Range;

/// Builds one instance per fiber, each covering `resolution` consecutive
/// samples. `first_index[i] == i * resolution`.
pub fn fiber_instances(fiber_count: u32, resolution: u32, line_width: f32) -> Vec<FiberInstance> {
    (0..fiber_count)
        .map(|i| FiberInstance {
            draw_count: resolution,
            first_index: i * resolution,
            line_width,
            padding: 0,
        })
        .collect()
}

/// Closed line list for each fiber: sample `j` connects to `(j + 1) % count`.
///
/// The same pattern is written on the GPU by the hopf stage; this host version
/// seeds the buffer and serves as reference.
pub fn line_list_indices(instances: &[FiberInstance]) -> Vec<u32> {
    let total: usize = instances.iter().map(|f| f.draw_count as usize).sum();
    let mut out = Vec::with_capacity(total * 2);
    for fiber in instances {
        let n = fiber.draw_count;
        for j in 0..n {
            out.push(fiber.first_index + j);
            out.push(fiber.first_index + (j + 1) % n);
        }
    }
    out
}

/// A single `(first, count)` draw range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawRange {
    pub first: u32,
    pub count: u32,
}

impl DrawRange {
    pub fn as_range(&self) -> Range<u32> {
        self.first..self.first + self.count
    }
}

/// Ordered list of draw ranges issued against one index buffer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MultiIndex {
    ranges: Vec<DrawRange>,
}

impl MultiIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// `count` back-to-back ranges of `per` indices each, starting at 0.
    pub fn uniform(count: u32, per: u32) -> Self {
        Self {
            ranges: (0..count)
                .map(|i| DrawRange {
                    first: i * per,
                    count: per,
                })
                .collect(),
        }
    }

    pub fn push(&mut self, first: u32, count: u32) {
        self.ranges.push(DrawRange { first, count });
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn ranges(&self) -> &[DrawRange] {
        &self.ranges
    }

    pub fn firsts(&self) -> impl Iterator<Item = u32> + '_ {
        self.ranges.iter().map(|r| r.first)
    }

    pub fn total_count(&self) -> u64 {
        self.ranges.iter().map(|r| r.count as u64).sum()
    }

    /// First `n` ranges, merged where they are contiguous.
    pub fn coalesced(&self, n: usize) -> Vec<Range<u32>> {
        let mut out: Vec<Range<u32>> = Vec::new();
        for r in self.ranges.iter().take(n).filter(|r| r.count > 0) {
            match out.last_mut() {
                Some(last) if last.end == r.first => last.end = r.first + r.count,
                _ => out.push(r.as_range()),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn instances_partition_the_sample_buffer(n in 0u32..200, r in 0u32..1200) {
            let instances = fiber_instances(n, r, 1.0);
            prop_assert_eq!(instances.len(), n as usize);

            let mut next = 0u32;
            for (i, fiber) in instances.iter().enumerate() {
                prop_assert_eq!(fiber.first_index, i as u32 * r);
                prop_assert_eq!(fiber.first_index, next);
                prop_assert_eq!(fiber.draw_count, r);
                next = fiber.first_index + fiber.draw_count;
            }
            prop_assert_eq!(next, n * r);
        }
    }

    #[test]
    fn line_indices_close_each_fiber() {
        let instances = fiber_instances(2, 3, 1.0);
        assert_eq!(
            line_list_indices(&instances),
            vec![0, 1, 1, 2, 2, 0, 3, 4, 4, 5, 5, 3]
        );
    }

    #[test]
    fn coalesced_merges_contiguous_ranges() {
        let multi = MultiIndex::uniform(4, 10);
        assert_eq!(multi.total_count(), 40);
        assert_eq!(multi.coalesced(3), vec![0..30]);

        let mut sparse = MultiIndex::new();
        sparse.push(0, 5);
        sparse.push(10, 5);
        sparse.push(15, 0);
        assert_eq!(sparse.coalesced(usize::MAX), vec![0..5, 10..15]);
        assert_eq!(sparse.firsts().collect::<Vec<_>>(), vec![0, 10, 15]);
    }
}
