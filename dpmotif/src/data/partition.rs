use std::collections::BTreeSet;

use crate::data::range::{Range, RangeSet};
use crate::models::component::ComponentModel;
use crate::utils::assert_finite;

/// Index of a cluster slot within the partition's arena.
pub type ClusterTag = usize;

/// Index of a registered baseline template.
pub type BaselineTag = usize;

/// Occupancy counts consumed by process priors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OccupancyStats {
    /// Number of non-empty foreground clusters.
    pub foreground_clusters: usize,
    /// Number of foreground sites over all clusters.
    pub foreground_sites: usize,
}

/// A baseline template from which new foreground clusters are instantiated.
#[derive(Clone, Debug)]
struct Baseline<M> {
    weight: f64,
    log_weight: f64,
    width: usize,
    model: M,
}

/// A single cluster of the mixture: the component model plus the sufficient
/// bookkeeping to know how many observations it holds.
///
/// Foreground clusters record their member ranges; the background does not,
/// its membership is implicit in the assignment map.
#[derive(Clone, Debug)]
pub struct Cluster<M> {
    tag: ClusterTag,
    baseline: Option<BaselineTag>,
    width: Option<usize>,
    model: M,
    size: usize,
    members: BTreeSet<Range>,
}

impl<M> Cluster<M> {
    #[must_use]
    pub const fn tag(&self) -> ClusterTag {
        self.tag
    }

    #[must_use]
    pub const fn baseline(&self) -> Option<BaselineTag> {
        self.baseline
    }

    /// Characteristic length of the cluster's model; `None` for the
    /// background, which scores ranges of any length.
    #[must_use]
    pub const fn width(&self) -> Option<usize> {
        self.width
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[must_use]
    pub const fn model(&self) -> &M {
        &self.model
    }

    #[must_use]
    pub const fn members(&self) -> &BTreeSet<Range> {
        &self.members
    }

    /// The member ranges as a set, for block moves.
    ///
    /// # Panics
    /// Panics if the cluster records no members (the background does not).
    #[must_use]
    pub fn range_set(&self) -> RangeSet {
        RangeSet::from_ranges(self.members.iter().copied())
    }

    fn member_at(&self, sequence: usize, position: usize) -> Option<Range> {
        self.members
            .iter()
            .find(|r| r.sequence == sequence && r.position == position)
            .copied()
    }

    const fn destructible(&self) -> bool {
        self.baseline.is_some()
    }
}

impl<M: ComponentModel> Cluster<M> {
    fn add_observations(&mut self, range: &Range) {
        self.size += self.model.add(range);
        if self.destructible() {
            assert!(
                self.members.insert(*range),
                "cluster {}: range {range:?} added twice",
                self.tag
            );
        }
    }

    fn remove_observations(&mut self, range: &Range) {
        assert!(
            self.size >= self.model.count(range),
            "cluster {}: more observations removed than present",
            self.tag
        );
        self.size -= self.model.remove(range);
        if self.destructible() {
            assert!(
                self.members.remove(range),
                "cluster {}: range {range:?} is not a member",
                self.tag
            );
        }
    }
}

/// The partition of sequence positions into one background cluster and an
/// unbounded number of foreground clusters.
///
/// Cluster slots live in an index-based arena; emptied foreground slots are
/// recycled through a free list rather than deallocated. The background
/// cluster (tag 0) is created on construction, initially owns every position,
/// and is never freed.
#[derive(Clone, Debug)]
pub struct Partition<M> {
    clusters: Vec<Cluster<M>>,
    used: Vec<ClusterTag>,
    free: Vec<ClusterTag>,
    assignments: Vec<Vec<Option<ClusterTag>>>,
    site_starts: Vec<Vec<bool>>,
    baselines: Vec<Baseline<M>>,
    foreground_sites: usize,
    site_width: usize,
    capacity: Option<usize>,
}

impl<M: ComponentModel> Partition<M> {
    /// Create a partition over sequences of the given sizes, with every
    /// position assigned to a fresh background cluster.
    ///
    /// # Panics
    /// Panics if `site_width` is zero.
    pub fn new(sizes: &[usize], site_width: usize, background: M) -> Self {
        assert!(site_width > 0, "site width must be positive");

        let mut partition = Self {
            clusters: vec![Cluster {
                tag: 0,
                baseline: None,
                width: None,
                model: background,
                size: 0,
                members: BTreeSet::new(),
            }],
            used: vec![0],
            free: Vec::new(),
            assignments: sizes.iter().map(|&n| vec![None; n]).collect(),
            site_starts: sizes.iter().map(|&n| vec![false; n]).collect(),
            baselines: Vec::new(),
            foreground_sites: 0,
            site_width,
            capacity: None,
        };

        for (sequence, &size) in sizes.iter().enumerate() {
            for position in 0..size {
                partition.assign(&Range::new(sequence, position, 1), 0);
            }
        }

        partition
    }

    /// Register a baseline template. Baseline weights are renormalized to sum
    /// to one after every registration.
    ///
    /// # Panics
    /// Panics if the weight is not positive or the width is zero or exceeds
    /// the site width.
    pub fn add_baseline(&mut self, weight: f64, width: usize, model: M) -> BaselineTag {
        assert!(weight > 0.0, "baseline weight must be positive");
        assert!(
            width > 0 && width <= self.site_width,
            "baseline width {width} must lie in 1..={}",
            self.site_width
        );

        self.baselines.push(Baseline {
            weight,
            log_weight: 0.0,
            width,
            model,
        });

        let total: f64 = self.baselines.iter().map(|b| b.weight).sum();
        for baseline in &mut self.baselines {
            baseline.log_weight = (baseline.weight / total).ln();
        }

        self.baselines.len() - 1
    }

    /// Bound the total number of cluster slots. Exhausting the bound is a
    /// fatal error.
    pub fn set_capacity(&mut self, capacity: Option<usize>) {
        self.capacity = capacity;
    }

    // accessors
    ////////////////////////////////////////////////////////////////////////

    #[must_use]
    pub const fn bg_cluster_tag(&self) -> ClusterTag {
        0
    }

    #[must_use]
    pub fn is_background(&self, tag: ClusterTag) -> bool {
        self.clusters[tag].baseline.is_none()
    }

    /// Tags of all fixed (background) clusters.
    pub fn bg_cluster_tags(&self) -> impl Iterator<Item = ClusterTag> + '_ {
        self.used.iter().copied().filter(|&t| self.is_background(t))
    }

    /// # Panics
    /// Panics if `tag` names no cluster slot.
    #[must_use]
    pub fn cluster(&self, tag: ClusterTag) -> &Cluster<M> {
        assert!(tag < self.clusters.len(), "unknown cluster tag {tag}");
        &self.clusters[tag]
    }

    /// Non-empty clusters, background first, in stable order.
    #[must_use]
    pub fn used(&self) -> &[ClusterTag] {
        &self.used
    }

    #[must_use]
    pub fn free(&self) -> &[ClusterTag] {
        &self.free
    }

    /// Number of mixture components (used clusters).
    #[must_use]
    pub const fn n_used(&self) -> usize {
        self.used.len()
    }

    /// Tags of used foreground clusters, in stable order.
    #[must_use]
    pub fn foreground_tags(&self) -> Vec<ClusterTag> {
        self.used
            .iter()
            .copied()
            .filter(|&t| !self.is_background(t))
            .collect()
    }

    /// Sizes of used foreground clusters, in stable order.
    #[must_use]
    pub fn foreground_sizes(&self) -> Vec<usize> {
        self.foreground_tags()
            .into_iter()
            .map(|t| self.clusters[t].size)
            .collect()
    }

    #[must_use]
    pub const fn n_baselines(&self) -> usize {
        self.baselines.len()
    }

    #[must_use]
    pub fn baseline_width(&self, baseline: BaselineTag) -> usize {
        self.baselines[baseline].width
    }

    /// Log of the normalized weight of a baseline template.
    #[must_use]
    pub fn baseline_log_weight(&self, baseline: BaselineTag) -> f64 {
        self.baselines[baseline].log_weight
    }

    #[must_use]
    pub fn assignment(&self, sequence: usize, position: usize) -> Option<ClusterTag> {
        self.assignments[sequence][position]
    }

    #[must_use]
    pub fn assignments(&self) -> &[Vec<Option<ClusterTag>>] {
        &self.assignments
    }

    #[must_use]
    pub fn site_start(&self, sequence: usize, position: usize) -> bool {
        self.site_starts[sequence][position]
    }

    #[must_use]
    pub const fn site_width(&self) -> usize {
        self.site_width
    }

    /// Number of foreground sites over all clusters.
    #[must_use]
    pub const fn foreground_sites(&self) -> usize {
        self.foreground_sites
    }

    #[must_use]
    pub fn occupancy(&self) -> OccupancyStats {
        OccupancyStats {
            foreground_clusters: self.used.len() - self.bg_cluster_tags().count(),
            foreground_sites: self.foreground_sites,
        }
    }

    #[must_use]
    pub fn n_sequences(&self) -> usize {
        self.assignments.len()
    }

    #[must_use]
    pub fn sequence_size(&self, sequence: usize) -> usize {
        self.assignments[sequence].len()
    }

    /// Every `(sequence, position)` pair of the data.
    #[must_use]
    pub fn positions(&self) -> Vec<(usize, usize)> {
        self.assignments
            .iter()
            .enumerate()
            .flat_map(|(s, a)| (0..a.len()).map(move |p| (s, p)))
            .collect()
    }

    // partition operations
    ////////////////////////////////////////////////////////////////////////

    /// Attach `range` to cluster `tag`.
    ///
    /// # Panics
    /// Panics if the tag names no slot or any covered position is already
    /// assigned.
    pub fn assign(&mut self, range: &Range, tag: ClusterTag) {
        assert!(
            tag < self.clusters.len(),
            "assign into out-of-range cluster tag {tag}"
        );
        for position in range.position..range.end() {
            assert!(
                self.assignments[range.sequence][position].is_none(),
                "assign over an already-assigned position ({}, {position})",
                range.sequence
            );
        }

        let was_empty = self.clusters[tag].is_empty();
        self.clusters[tag].add_observations(range);

        for position in range.position..range.end() {
            self.assignments[range.sequence][position] = Some(tag);
        }

        if !self.is_background(tag) {
            self.site_starts[range.sequence][range.position] = true;
            self.foreground_sites += 1;
        }

        if was_empty && self.clusters[tag].destructible() {
            let index = self
                .free
                .iter()
                .position(|&t| t == tag)
                .expect("a filled empty cluster must come off the free list");
            self.free.remove(index);
            self.used.push(tag);
        }
    }

    /// Detach `range` from its cluster and return the old tag.
    ///
    /// # Panics
    /// Panics if the range is unassigned or spans more than one cluster.
    pub fn release(&mut self, range: &Range) -> ClusterTag {
        let tag = self.assignments[range.sequence][range.position]
            .unwrap_or_else(|| panic!("release of an unassigned range {range:?}"));
        for position in range.position..range.end() {
            assert_eq!(
                self.assignments[range.sequence][position],
                Some(tag),
                "release of a range spanning more than one cluster"
            );
        }

        self.clusters[tag].remove_observations(range);

        for position in range.position..range.end() {
            self.assignments[range.sequence][position] = None;
        }

        if !self.is_background(tag) {
            assert!(
                self.site_starts[range.sequence][range.position],
                "release of a foreground range that is not a site"
            );
            self.site_starts[range.sequence][range.position] = false;
            self.foreground_sites -= 1;
        }

        if self.clusters[tag].is_empty() && self.clusters[tag].destructible() {
            let index = self
                .used
                .iter()
                .position(|&t| t == tag)
                .expect("an emptied cluster must come off the used list");
            self.used.remove(index);
            self.free.push(tag);
        }

        tag
    }

    /// `release` followed by `assign`, as one logical step. Returns the old
    /// tag.
    pub fn reassign(&mut self, range: &Range, tag: ClusterTag) -> ClusterTag {
        let old = self.release(range);
        self.assign(range, tag);
        old
    }

    /// A recycled (or newly allocated) empty slot wired to the requested
    /// baseline template.
    ///
    /// # Panics
    /// Panics on an unknown baseline tag, or when the slot capacity is
    /// exhausted and no matching free slot remains.
    pub fn next_free_cluster(&mut self, baseline: BaselineTag) -> ClusterTag {
        assert!(
            baseline < self.baselines.len(),
            "unknown baseline tag {baseline}"
        );

        if let Some(&tag) = self
            .free
            .iter()
            .find(|&&t| self.clusters[t].baseline == Some(baseline))
        {
            return tag;
        }

        if let Some(capacity) = self.capacity {
            assert!(
                self.clusters.len() < capacity,
                "cluster capacity exhausted ({capacity} slots)"
            );
        }

        let tag = self.clusters.len();
        self.clusters.push(Cluster {
            tag,
            baseline: Some(baseline),
            width: Some(self.baselines[baseline].width),
            model: self.baselines[baseline].model.clone(),
            size: 0,
            members: BTreeSet::new(),
        });
        self.free.push(tag);
        tag
    }

    /// Attach a range to a cluster, splitting off a background remainder when
    /// the cluster is narrower than the range.
    ///
    /// # Panics
    /// Panics if a foreground target is wider than the range.
    pub fn assign_with_split(&mut self, range: &Range, tag: ClusterTag) {
        if self.is_background(tag) {
            // background observations are strand-less
            self.assign(&range.forward(), tag);
            return;
        }

        let width = self.clusters[tag]
            .width
            .expect("foreground cluster without width");
        assert!(
            width <= range.length,
            "cluster {tag} of width {width} cannot absorb a range of length {}",
            range.length
        );

        let (head, rest) = range.split_at(width);
        self.assign(&head, tag);
        if let Some(rest) = rest {
            let bg = self.bg_cluster_tag();
            self.assign(&rest.forward(), bg);
        }
    }

    /// Detach the full site window starting at a position: the site itself
    /// plus its background remainder, or a plain background window.
    ///
    /// # Panics
    /// Panics if the position is unassigned.
    pub fn release_site(&mut self, sequence: usize, position: usize) -> ClusterTag {
        let tag = self.assignments[sequence][position]
            .unwrap_or_else(|| panic!("release of an unassigned position ({sequence}, {position})"));

        if self.is_background(tag) {
            self.release(&Range::new(sequence, position, self.site_width));
            return tag;
        }

        let member = self.clusters[tag]
            .member_at(sequence, position)
            .unwrap_or_else(|| panic!("no site of cluster {tag} starts at ({sequence}, {position})"));
        self.release(&member);

        if member.length < self.site_width {
            self.release(&Range::new(
                sequence,
                position + member.length,
                self.site_width - member.length,
            ));
        }

        tag
    }

    /// Whether a full site window starting at this position may be resampled
    /// without tearing a neighbouring site.
    #[must_use]
    pub fn valid_for_sampling(&self, sequence: usize, position: usize) -> bool {
        let size = self.assignments[sequence].len();
        if position + self.site_width > size {
            return false;
        }

        let bg = self.bg_cluster_tag();

        if self.site_starts[sequence][position] {
            // a site starts here; its background remainder must be intact
            let tag = self.assignments[sequence][position].expect("site start without assignment");
            let width = self.clusters[tag].width.expect("foreground cluster without width");
            (width..self.site_width).all(|i| {
                self.assignments[sequence][position + i] == Some(bg)
                    && !self.site_starts[sequence][position + i]
            })
        } else {
            // background position; the window must not overlap any site
            if self.assignments[sequence][position] != Some(bg) {
                return false;
            }
            (0..self.site_width).all(|i| {
                self.assignments[sequence][position + i].is_some()
                    && (i == 0 || !self.site_starts[sequence][position + i])
            })
        }
    }

    // structural moves
    ////////////////////////////////////////////////////////////////////////

    /// Shift every member of a cluster one position to the left. Members for
    /// which the shifted window is invalid fall back to the background.
    /// Returns `false` if the cluster would dissolve mid-move.
    pub fn shift_left(&mut self, tag: ClusterTag) -> bool {
        self.shift(tag, false)
    }

    /// Shift every member of a cluster one position to the right.
    pub fn shift_right(&mut self, tag: ClusterTag) -> bool {
        self.shift(tag, true)
    }

    fn shift(&mut self, tag: ClusterTag, right: bool) -> bool {
        let members: Vec<Range> = self.clusters[tag].members.iter().copied().collect();
        let bg = self.bg_cluster_tag();

        for member in members {
            if self.clusters[tag].size <= 1 {
                return false;
            }

            let sequence = member.sequence;
            let size = self.assignments[sequence].len();

            self.release(&member);
            self.assign(&member.forward(), bg);

            let in_bounds = if right {
                member.end() + 1 <= size
            } else {
                member.position > 0
            };
            if !in_bounds {
                continue;
            }

            let position = if right {
                member.position + 1
            } else {
                member.position - 1
            };
            if !self.valid_for_sampling(sequence, position) {
                continue;
            }

            self.release(&Range::new(sequence, position, member.length));
            self.assign(
                &Range {
                    position,
                    ..member
                },
                tag,
            );
        }

        true
    }

    // summaries
    ////////////////////////////////////////////////////////////////////////

    /// Sum of the log likelihoods of all used component models.
    #[must_use]
    pub fn likelihood(&self) -> f64 {
        let total = self
            .used
            .iter()
            .map(|&t| self.clusters[t].model.log_likelihood())
            .sum();
        assert_finite(total, "likelihood")
    }

    /// Verify the partition invariants; for tests.
    ///
    /// # Panics
    /// Panics on any violated invariant.
    pub fn check_invariants(&self) {
        for &tag in &self.used {
            let cluster = &self.clusters[tag];
            assert!(
                !cluster.is_empty() || !cluster.destructible(),
                "empty destructible cluster {tag} on the used list"
            );
            assert!(
                !self.free.contains(&tag),
                "cluster {tag} on both the used and free lists"
            );
        }
        for &tag in &self.free {
            let cluster = &self.clusters[tag];
            assert!(
                cluster.is_empty() && cluster.destructible(),
                "cluster {tag} on the free list is not an empty foreground cluster"
            );
        }
        assert_eq!(
            self.used.len() + self.free.len(),
            self.clusters.len(),
            "cluster slots lost between the used and free lists"
        );

        let member_count: usize = self
            .foreground_tags()
            .into_iter()
            .map(|t| self.clusters[t].members.len())
            .sum();
        assert_eq!(
            member_count, self.foreground_sites,
            "foreground site counter out of sync with cluster members"
        );

        for tag in self.foreground_tags() {
            for member in &self.clusters[tag].members {
                assert!(
                    self.site_starts[member.sequence][member.position],
                    "member {member:?} of cluster {tag} has no site-start flag"
                );
                for position in member.position..member.end() {
                    assert_eq!(
                        self.assignments[member.sequence][position],
                        Some(tag),
                        "member {member:?} of cluster {tag} is not assigned to it"
                    );
                }
            }
        }

        for (sequence, row) in self.assignments.iter().enumerate() {
            for (position, assignment) in row.iter().enumerate() {
                if let Some(tag) = assignment {
                    assert!(
                        self.used.contains(tag),
                        "position ({sequence}, {position}) assigned to unused cluster {tag}"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::Partition;
    use crate::data::range::Range;
    use crate::data::sequences::SequenceData;
    use crate::models::multinomial::Multinomial;

    fn toy_partition() -> Partition<Multinomial> {
        let data = Arc::new(SequenceData::new(
            vec![vec![0, 1, 2, 3, 0, 1, 2, 3, 0, 1], vec![3, 2, 1, 0, 3, 2, 1, 0, 3, 2]],
            4,
        ));
        let mut partition = Partition::new(
            &data.sizes(),
            4,
            Multinomial::background(vec![1.0; 4], Arc::clone(&data)),
        );
        partition.add_baseline(1.0, 4, Multinomial::uniform(4, 1.0, Arc::clone(&data)));
        partition
    }

    #[test]
    fn starts_fully_background() {
        let partition = toy_partition();
        assert_eq!(partition.n_used(), 1);
        assert_eq!(partition.foreground_sites(), 0);
        assert_eq!(partition.cluster(0).size(), 20);
        for (s, p) in partition.positions() {
            assert_eq!(partition.assignment(s, p), Some(0));
        }
        partition.check_invariants();
    }

    #[test]
    fn free_list_tracks_occupancy() {
        let mut partition = toy_partition();
        let tag = partition.next_free_cluster(0);
        assert_eq!(partition.free(), &[tag]);

        let range = Range::new(0, 2, 4);
        partition.release(&range);
        partition.assign(&range, tag);
        assert!(partition.used().contains(&tag));
        assert!(partition.free().is_empty());
        assert_eq!(partition.foreground_sites(), 1);
        partition.check_invariants();

        partition.release(&range);
        assert!(!partition.used().contains(&tag));
        assert_eq!(partition.free(), &[tag]);
        assert_eq!(partition.foreground_sites(), 0);

        partition.assign(&range, 0);
        partition.check_invariants();
    }

    #[test]
    fn reassign_moves_between_clusters() {
        let mut partition = toy_partition();
        let tag = partition.next_free_cluster(0);

        let range = Range::new(1, 4, 4);
        partition.release(&range);
        partition.assign(&range, tag);

        let old = partition.reassign(&range, 0);
        assert_eq!(old, tag);
        assert_eq!(partition.assignment(1, 4), Some(0));
        partition.check_invariants();
    }

    #[test]
    fn recycles_freed_slots() {
        let mut partition = toy_partition();
        let first = partition.next_free_cluster(0);
        assert_eq!(partition.next_free_cluster(0), first);

        let range = Range::new(0, 0, 4);
        partition.release(&range);
        partition.assign(&range, first);

        // the slot is occupied now, a second request allocates a new one
        let second = partition.next_free_cluster(0);
        assert_ne!(first, second);

        partition.release(&range);
        partition.assign(&range, 0);
        // both slots free again; one of them is recycled
        let third = partition.next_free_cluster(0);
        assert!(third == first || third == second);
    }

    #[test]
    fn split_assignment_covers_the_remainder() {
        let data = Arc::new(SequenceData::new(vec![vec![0, 1, 2, 3, 0, 1, 2, 3]], 4));
        let mut partition = Partition::new(
            &data.sizes(),
            6,
            Multinomial::background(vec![1.0; 4], Arc::clone(&data)),
        );
        let narrow = partition.add_baseline(1.0, 4, Multinomial::uniform(4, 1.0, Arc::clone(&data)));
        let tag = partition.next_free_cluster(narrow);

        partition.release(&Range::new(0, 0, 6));
        partition.assign_with_split(&Range::new(0, 0, 6), tag);

        assert_eq!(partition.assignment(0, 0), Some(tag));
        assert_eq!(partition.assignment(0, 3), Some(tag));
        assert_eq!(partition.assignment(0, 4), Some(0));
        assert_eq!(partition.assignment(0, 5), Some(0));
        assert!(partition.site_start(0, 0));
        partition.check_invariants();

        let released = partition.release_site(0, 0);
        assert_eq!(released, tag);
        partition.assign(&Range::new(0, 0, 6), 0);
        partition.check_invariants();
    }

    #[test]
    fn sampling_validity_respects_neighbouring_sites() {
        let mut partition = toy_partition();
        let tag = partition.next_free_cluster(0);

        assert!(partition.valid_for_sampling(0, 0));
        // no room for a full window near the end
        assert!(!partition.valid_for_sampling(0, 7));

        let range = Range::new(0, 2, 4);
        partition.release(&range);
        partition.assign(&range, tag);

        // the site start itself stays sampleable
        assert!(partition.valid_for_sampling(0, 2));
        // interior of the site is not
        assert!(!partition.valid_for_sampling(0, 3));
        // windows overlapping the site from the left are vetoed
        assert!(!partition.valid_for_sampling(0, 0));
        assert!(!partition.valid_for_sampling(0, 1));
        // the first window past the site is fine
        assert!(partition.valid_for_sampling(0, 6));
    }

    #[test]
    #[should_panic(expected = "release of an unassigned range")]
    fn double_release_is_fatal() {
        let mut partition = toy_partition();
        let range = Range::new(0, 0, 4);
        partition.release(&range);
        partition.release(&range);
    }

    #[test]
    #[should_panic(expected = "out-of-range cluster tag")]
    fn assign_to_unknown_tag_is_fatal() {
        let mut partition = toy_partition();
        let range = Range::new(0, 0, 4);
        partition.release(&range);
        partition.assign(&range, 99);
    }

    #[test]
    #[should_panic(expected = "capacity exhausted")]
    fn capacity_exhaustion_is_fatal() {
        let mut partition = toy_partition();
        partition.set_capacity(Some(2));
        let tag = partition.next_free_cluster(0);

        let range = Range::new(0, 0, 4);
        partition.release(&range);
        partition.assign(&range, tag);

        // slot is taken and the arena is full
        partition.next_free_cluster(0);
    }

    #[test]
    fn shift_right_moves_members() {
        let mut partition = toy_partition();
        let tag = partition.next_free_cluster(0);

        for range in [Range::new(0, 1, 4), Range::new(1, 1, 4)] {
            partition.release(&range);
            partition.assign(&range, tag);
        }

        assert!(partition.shift_right(tag));
        assert_eq!(partition.cluster(tag).size(), 2);
        assert_eq!(partition.assignment(0, 1), Some(0));
        assert_eq!(partition.assignment(0, 2), Some(tag));
        assert!(partition.site_start(0, 2));
        assert!(partition.site_start(1, 2));
        partition.check_invariants();
    }
}
