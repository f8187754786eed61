//! Pairwise range-overlap cache.
//!
//! Range `i` links into range `j` when `i` starts strictly inside `j`'s span
//! (`end(j) < start(i) < start(j)`). The overlap count of `i` is the number of
//! ranges it links into; the likelihood uses it as the number of places range
//! `i` could have originated from.
//!
//! The cache keeps the last known link for every ordered pair so an update only
//! has to revisit the rows and columns of ranges whose endpoints moved.

use pcr_config::Range;
use tracing::trace;

/// Whether `inner` starts strictly inside `outer`.
#[inline]
pub fn starts_within(inner: &Range, outer: &Range) -> bool {
    inner.start < outer.start && inner.start > outer.end
}

/// Overlap counts plus the relation matrix they were derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlapCache {
    len: usize,
    counts: Vec<usize>,
    /// Row-major `len x len`; entry `(i, j)` is `starts_within(i, j)`.
    links: Vec<bool>,
    dirty: Vec<bool>,
}

impl OverlapCache {
    /// An empty cache for `len` ranges. Every range starts dirty.
    pub fn new(len: usize) -> Self {
        Self {
            len,
            counts: vec![0; len],
            links: vec![false; len * len],
            dirty: vec![true; len],
        }
    }

    /// Build a cache with counts already computed.
    pub fn from_ranges(ranges: &[Range]) -> Self {
        let mut cache = Self::new(ranges.len());
        cache.recompute_all(ranges);
        cache
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn count(&self, i: usize) -> usize {
        self.counts[i]
    }

    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Last known link of `i` into `j`.
    pub fn links(&self, i: usize, j: usize) -> bool {
        self.links[i * self.len + j]
    }

    pub fn mark_dirty(&mut self, i: usize) {
        self.dirty[i] = true;
    }

    pub fn is_dirty(&self, i: usize) -> bool {
        self.dirty[i]
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.iter().filter(|&&d| d).count()
    }

    pub fn clear_dirty(&mut self) {
        self.dirty.iter_mut().for_each(|d| *d = false);
    }

    /// Recompute every link and count from zero. O(n²).
    pub fn recompute_all(&mut self, ranges: &[Range]) {
        debug_assert_eq!(ranges.len(), self.len);
        let n = self.len;
        for (i, ri) in ranges.iter().enumerate() {
            let mut count = 0;
            for (j, rj) in ranges.iter().enumerate() {
                let link = i != j && starts_within(ri, rj);
                self.links[i * n + j] = link;
                count += usize::from(link);
            }
            self.counts[i] = count;
        }
        trace!(ranges = n, "overlap counts recomputed");
    }

    /// Revisit only the ranges marked dirty, adjusting counts where a link
    /// changed since it was last recorded. O(d·n).
    ///
    /// Dirty flags are left set; [`clear_dirty`](Self::clear_dirty) is called
    /// once the caller commits to the current ranges.
    pub fn update_dirty(&mut self, ranges: &[Range]) {
        debug_assert_eq!(ranges.len(), self.len);
        let n = self.len;
        let mut touched = 0usize;
        for i in 0..n {
            if !self.dirty[i] {
                continue;
            }
            touched += 1;
            let ri = &ranges[i];
            for (j, rj) in ranges.iter().enumerate() {
                if i == j {
                    continue;
                }
                let link_ij = starts_within(ri, rj);
                let link_ji = starts_within(rj, ri);

                if self.links[i * n + j] != link_ij {
                    Self::adjust(&mut self.counts[i], link_ij);
                    self.links[i * n + j] = link_ij;
                }
                if self.links[j * n + i] != link_ji {
                    Self::adjust(&mut self.counts[j], link_ji);
                    self.links[j * n + i] = link_ji;
                }
            }
        }
        trace!(dirty = touched, ranges = n, "overlap counts updated");
    }

    fn adjust(count: &mut usize, gained: bool) {
        if gained {
            *count += 1;
        } else {
            *count -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(start: f64, end: f64) -> Range {
        Range::new(start, end, start, end)
    }

    #[test]
    fn strict_containment() {
        let outer = r(5.0, 1.0);
        assert!(starts_within(&r(3.0, 0.0), &outer));
        assert!(!starts_within(&r(5.0, 0.0), &outer));
        assert!(!starts_within(&r(1.0, 0.0), &outer));
        assert!(!starts_within(&r(6.0, 0.0), &outer));
    }

    #[test]
    fn relation_is_asymmetric() {
        let ranges = [r(5.0, 1.0), r(3.0, 0.0)];
        let cache = OverlapCache::from_ranges(&ranges);
        assert_eq!(cache.count(0), 0);
        assert_eq!(cache.count(1), 1);
        assert!(cache.links(1, 0));
        assert!(!cache.links(0, 1));
    }

    #[test]
    fn nested_ranges_accumulate() {
        let ranges = [r(10.0, 0.0), r(8.0, 1.0), r(6.0, 2.0), r(4.0, 3.5)];
        let cache = OverlapCache::from_ranges(&ranges);
        assert_eq!(cache.counts(), &[0, 1, 2, 3]);
    }

    #[test]
    fn identical_starts_do_not_link() {
        let ranges = [r(2.0, 0.0), r(2.0, 0.0), r(2.0, 0.0)];
        let cache = OverlapCache::from_ranges(&ranges);
        assert_eq!(cache.counts(), &[0, 0, 0]);
    }

    #[test]
    fn incremental_update_tracks_moves() {
        let mut ranges = vec![r(10.0, 0.0), r(8.0, 1.0), r(6.0, 2.0)];
        let mut cache = OverlapCache::from_ranges(&ranges);
        cache.clear_dirty();

        // move range 2 out of both spans
        ranges[2] = r(12.0, 2.0);
        cache.mark_dirty(2);
        cache.update_dirty(&ranges);
        assert_eq!(cache.counts(), OverlapCache::from_ranges(&ranges).counts());
        assert_eq!(cache.counts(), &[1, 2, 0]);

        // and shrink range 0 so nothing starts inside it
        ranges[0] = r(10.0, 9.0);
        cache.mark_dirty(0);
        cache.update_dirty(&ranges);
        assert_eq!(cache.counts(), OverlapCache::from_ranges(&ranges).counts());
    }

    #[test]
    fn update_is_idempotent_while_dirty() {
        let mut ranges = vec![r(10.0, 0.0), r(8.0, 1.0)];
        let mut cache = OverlapCache::from_ranges(&ranges);
        cache.clear_dirty();
        ranges[1] = r(11.0, 1.0);
        cache.mark_dirty(1);
        cache.update_dirty(&ranges);
        let once = cache.clone();
        cache.update_dirty(&ranges);
        assert_eq!(cache, once);
        assert_eq!(cache.dirty_count(), 1);
    }

    #[test]
    fn clean_ranges_are_skipped() {
        let mut ranges = vec![r(10.0, 0.0), r(8.0, 1.0)];
        let mut cache = OverlapCache::from_ranges(&ranges);
        cache.clear_dirty();
        // moved without marking: cache keeps the stale relation
        ranges[1] = r(11.0, 1.0);
        cache.update_dirty(&ranges);
        assert_eq!(cache.count(1), 1);
    }

    #[test]
    fn new_cache_is_all_dirty() {
        let cache = OverlapCache::new(4);
        assert_eq!(cache.dirty_count(), 4);
        assert!(cache.is_dirty(3));
        assert!(!cache.is_empty());
        assert!(OverlapCache::new(0).is_empty());
    }
}
