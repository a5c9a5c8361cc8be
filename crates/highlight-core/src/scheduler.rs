//! Invalidation scheduling.
//!
//! The [`Scheduler`] decides which byte ranges need (re)classification and in which order, and
//! keeps the books on asynchronous query jobs. It never classifies anything itself: callers ask
//! for a [`Plan`], run its `inline` ranges synchronously, hand its `dispatch` jobs to a worker and
//! report completions back with [`Scheduler::complete`].
//!
//! # Staleness
//!
//! Every job captures the scheduler's `(epoch, revision)` when it is created. The revision moves
//! with each recorded edit; the epoch moves whenever the meaning of existing classifications
//! changes (language or style change, resync). A completed job whose key no longer matches is
//! [`Completion::Stale`] and must be discarded, which is the only form of cancellation.
//!
//! # Phases
//!
//! ```text
//! Idle -> Reparsing -> Queuing -> Querying -> Applying -> Idle
//!            ^                       |            |
//!            +-------- new edit -----+------------+
//! ```

use crate::edit::{Edit, Revision};
use crate::range::{ByteRange, RangeSet};

/// Classification configuration epoch.
pub type Epoch = u64;

/// Query job identifier.
pub type JobId = u64;

/// Scheduler tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Dirty totals up to this many bytes are classified inline (synchronous fast path).
    pub sync_threshold: usize,
    /// Dirty bytes inside the visible region are classified inline when they fit this budget.
    pub visible_budget: usize,
    /// Maximum size of one asynchronous job.
    pub job_chunk: usize,
    /// Maximum number of outstanding jobs, superseded ones included.
    pub max_in_flight: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sync_threshold: 8 * 1024,
            visible_budget: 32 * 1024,
            job_chunk: 64 * 1024,
            max_in_flight: 1,
        }
    }
}

impl SchedulerConfig {
    /// Set the synchronous fast path threshold.
    pub fn with_sync_threshold(mut self, bytes: usize) -> Self {
        self.sync_threshold = bytes;
        self
    }

    /// Set the inline budget for the visible region.
    pub fn with_visible_budget(mut self, bytes: usize) -> Self {
        self.visible_budget = bytes;
        self
    }

    /// Set the maximum asynchronous job size.
    pub fn with_job_chunk(mut self, bytes: usize) -> Self {
        self.job_chunk = bytes.max(1);
        self
    }

    /// Set the maximum number of outstanding jobs.
    pub fn with_max_in_flight(mut self, jobs: usize) -> Self {
        self.max_in_flight = jobs.max(1);
        self
    }
}

/// Scheduler state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    /// Nothing to do.
    #[default]
    Idle,
    /// Edits arrived; waiting for the syntax tree to catch up.
    Reparsing,
    /// Dirty ranges are queued and not yet handed out.
    Queuing,
    /// Classification is running (inline or on a worker).
    Querying,
    /// A result is being merged into the range index.
    Applying,
}

/// An outstanding asynchronous classification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryJob {
    /// Job id, unique per scheduler.
    pub id: JobId,
    /// Epoch the job was issued in.
    pub epoch: Epoch,
    /// Revision the job classifies.
    pub revision: Revision,
    /// Range to classify.
    pub range: ByteRange,
}

/// Work handed out by [`Scheduler::plan`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    /// Ranges to classify synchronously, visible ones first.
    pub inline: Vec<ByteRange>,
    /// Jobs to hand to the worker.
    pub dispatch: Vec<QueryJob>,
}

impl Plan {
    /// Returns `true` if there is nothing to do.
    pub fn is_empty(&self) -> bool {
        self.inline.is_empty() && self.dispatch.is_empty()
    }
}

/// Outcome of [`Scheduler::complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The job is current: merge its result.
    Apply(QueryJob),
    /// The job was superseded: drop its result.
    Stale(QueryJob),
    /// The job id is not outstanding (already completed, or abandoned by a reset).
    Unknown,
}

/// Dirty range tracking and job bookkeeping for one document.
#[derive(Debug, Clone)]
pub struct Scheduler {
    config: SchedulerConfig,
    phase: Phase,
    epoch: Epoch,
    revision: Revision,
    next_job: JobId,
    dirty: RangeSet,
    in_flight: Vec<QueryJob>,
    visible: Option<ByteRange>,
}

impl Scheduler {
    /// Create an idle scheduler at `revision`.
    pub fn new(config: SchedulerConfig, revision: Revision) -> Self {
        Self {
            config,
            phase: Phase::Idle,
            epoch: 0,
            revision,
            next_job: 0,
            dirty: RangeSet::new(),
            in_flight: Vec::new(),
            visible: None,
        }
    }

    /// Configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Current epoch.
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Current revision.
    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Ranges waiting to be classified.
    pub fn dirty(&self) -> &RangeSet {
        &self.dirty
    }

    /// Outstanding jobs, stale ones included.
    pub fn in_flight(&self) -> &[QueryJob] {
        &self.in_flight
    }

    /// Visible region hint.
    pub fn visible(&self) -> Option<ByteRange> {
        self.visible
    }

    /// Update the visible region hint. `None` gives every region equal priority.
    pub fn set_visible(&mut self, visible: Option<ByteRange>) {
        self.visible = visible.filter(|v| !v.is_empty());
    }

    /// Returns `true` when nothing is queued and no job is outstanding.
    pub fn is_idle(&self) -> bool {
        self.dirty.is_empty() && self.in_flight.is_empty()
    }

    /// Returns `true` if `job` matches the current epoch and revision.
    pub fn is_live(&self, job: &QueryJob) -> bool {
        job.epoch == self.epoch && job.revision == self.revision
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            log::trace!("scheduler phase {:?} -> {:?}", self.phase, phase);
            self.phase = phase;
        }
    }

    fn settle_phase(&mut self) {
        let phase = if self.in_flight.iter().any(|job| self.is_live(job)) {
            Phase::Querying
        } else if !self.dirty.is_empty() {
            Phase::Queuing
        } else {
            Phase::Idle
        };
        self.set_phase(phase);
    }

    /// Mark the start of a re-parse without new edits (for example a retry after a failure).
    pub fn begin_reparse(&mut self) {
        self.set_phase(Phase::Reparsing);
    }

    /// Move to the revision produced by `edit`.
    ///
    /// Queued ranges are mapped through the edit. Ranges promised by jobs of the previous
    /// revision are queued again: their results will come back stale.
    pub fn note_edit(&mut self, edit: &Edit) {
        let promised: Vec<ByteRange> = self
            .in_flight
            .iter()
            .filter(|job| self.is_live(job))
            .map(|job| job.range)
            .collect();
        self.dirty.extend(promised);
        self.dirty.apply_edit(edit);
        self.revision = edit.revision;
        self.set_phase(Phase::Reparsing);
    }

    /// Queue `range` at the current revision without leaving the current phase.
    ///
    /// Used for regions whose classification was dropped while mapping the index through an
    /// edit.
    pub fn mark_dirty(&mut self, range: ByteRange) {
        self.dirty.insert(range);
    }

    /// Queue `ranges` for classification at the current revision.
    ///
    /// Bytes already covered by a live outstanding job are not queued again.
    pub fn request(&mut self, ranges: impl IntoIterator<Item = ByteRange>) {
        for range in ranges {
            let mut wanted = RangeSet::new();
            wanted.insert(range);
            for job in self.in_flight.iter().filter(|job| self.is_live(job)) {
                wanted.remove(job.range);
            }
            self.dirty.extend(wanted.iter());
        }
        self.settle_phase();
    }

    /// Split the queued ranges into inline work and worker jobs for a document of `doc_len`
    /// bytes.
    pub fn plan(&mut self, doc_len: usize) -> Plan {
        self.dirty.truncate(doc_len);
        let mut plan = Plan::default();

        if !self.dirty.is_empty() && self.dirty.total_len() <= self.config.sync_threshold {
            plan.inline = self.dirty.iter().collect();
            self.dirty.clear();
        } else if let Some(visible) = self.visible {
            let urgent = self.dirty.intersecting(visible);
            if !urgent.is_empty() && urgent.total_len() <= self.config.visible_budget {
                for range in urgent.iter() {
                    self.dirty.remove(range);
                    plan.inline.push(range);
                }
            }
        }

        while self.in_flight.len() < self.config.max_in_flight {
            let Some(range) = self.next_chunk() else {
                break;
            };
            self.dirty.remove(range);
            self.next_job += 1;
            let job = QueryJob {
                id: self.next_job,
                epoch: self.epoch,
                revision: self.revision,
                range,
            };
            log::trace!(
                "dispatching job {} for {}..{} at revision {}",
                job.id,
                range.start,
                range.end,
                job.revision
            );
            self.in_flight.push(job);
            plan.dispatch.push(job);
        }

        if plan.is_empty() {
            self.settle_phase();
        } else {
            self.set_phase(Phase::Querying);
        }
        plan
    }

    /// Next dirty chunk: the visible region first, then onwards from it, then from the start.
    fn next_chunk(&self) -> Option<ByteRange> {
        let range = match self.visible {
            Some(visible) => self
                .dirty
                .iter()
                .find(|r| r.end > visible.start)
                .or_else(|| self.dirty.iter().next()),
            None => self.dirty.iter().next(),
        }?;
        let start = match self.visible {
            Some(visible) if range.contains(visible.start) => visible.start,
            _ => range.start,
        };
        let end = range.end.min(start.saturating_add(self.config.job_chunk.max(1)));
        Some(ByteRange::new(start, end))
    }

    /// Report that job `id` finished.
    pub fn complete(&mut self, id: JobId) -> Completion {
        let Some(pos) = self.in_flight.iter().position(|job| job.id == id) else {
            return Completion::Unknown;
        };
        let job = self.in_flight.remove(pos);
        if self.is_live(&job) {
            self.set_phase(Phase::Applying);
            Completion::Apply(job)
        } else {
            log::trace!(
                "discarding stale job {} (epoch {}, revision {}; now epoch {}, revision {})",
                job.id,
                job.epoch,
                job.revision,
                self.epoch,
                self.revision
            );
            self.settle_phase();
            Completion::Stale(job)
        }
    }

    /// Report that the result of an applied job (or inline work) has been merged.
    pub fn finish_applying(&mut self) {
        self.settle_phase();
    }

    /// Bump the epoch and queue the whole document.
    ///
    /// Used when the meaning of categories changes while the text and tree stay valid.
    pub fn invalidate_all(&mut self, doc_len: usize) {
        self.epoch += 1;
        self.dirty.clear();
        self.dirty.insert(ByteRange::new(0, doc_len));
        self.settle_phase();
    }

    /// Drop all queued and outstanding work and move to `revision` in a new epoch.
    ///
    /// Results of abandoned jobs complete as [`Completion::Unknown`].
    pub fn reset(&mut self, revision: Revision) {
        self.epoch += 1;
        self.revision = revision;
        self.dirty.clear();
        self.in_flight.clear();
        self.set_phase(Phase::Idle);
    }

    /// Queue the ranges of live outstanding jobs again and forget every outstanding job.
    ///
    /// Used when the worker is lost.
    pub fn requeue_in_flight(&mut self) {
        let live: Vec<ByteRange> = self
            .in_flight
            .iter()
            .filter(|job| self.is_live(job))
            .map(|job| job.range)
            .collect();
        self.in_flight.clear();
        self.dirty.extend(live);
        self.settle_phase();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> SchedulerConfig {
        SchedulerConfig::default()
            .with_sync_threshold(16)
            .with_visible_budget(64)
            .with_job_chunk(100)
            .with_max_in_flight(1)
    }

    fn stamped(revision: Revision, edit: Edit) -> Edit {
        Edit { revision, ..edit }
    }

    #[test]
    fn test_small_dirty_set_runs_inline() {
        let mut scheduler = Scheduler::new(config(), 0);
        scheduler.request([ByteRange::new(10, 20)]);
        assert_eq!(scheduler.phase(), Phase::Queuing);

        let plan = scheduler.plan(1000);
        assert_eq!(plan.inline, vec![ByteRange::new(10, 20)]);
        assert!(plan.dispatch.is_empty());
        assert_eq!(scheduler.phase(), Phase::Querying);

        scheduler.finish_applying();
        assert_eq!(scheduler.phase(), Phase::Idle);
        assert!(scheduler.is_idle());
    }

    #[test]
    fn test_large_dirty_set_is_chunked_one_job_at_a_time() {
        let mut scheduler = Scheduler::new(config(), 0);
        scheduler.request([ByteRange::new(0, 250)]);

        let mut covered = Vec::new();
        loop {
            let plan = scheduler.plan(250);
            assert!(plan.inline.is_empty());
            assert!(plan.dispatch.len() <= 1);
            let Some(job) = plan.dispatch.first().copied() else {
                break;
            };
            assert_eq!(scheduler.in_flight().len(), 1);
            // No second job while one is outstanding.
            assert!(scheduler.plan(250).dispatch.is_empty());

            assert_eq!(scheduler.complete(job.id), Completion::Apply(job));
            assert_eq!(scheduler.phase(), Phase::Applying);
            scheduler.finish_applying();
            covered.push(job.range);
        }

        assert_eq!(
            covered,
            vec![
                ByteRange::new(0, 100),
                ByteRange::new(100, 200),
                ByteRange::new(200, 250)
            ]
        );
        assert!(scheduler.is_idle());
        assert_eq!(scheduler.phase(), Phase::Idle);
    }

    #[test]
    fn test_visible_region_goes_first() {
        let mut scheduler = Scheduler::new(config(), 0);
        scheduler.set_visible(Some(ByteRange::new(500, 540)));
        scheduler.request([ByteRange::new(0, 1000)]);

        let plan = scheduler.plan(1000);
        assert_eq!(plan.inline, vec![ByteRange::new(500, 540)]);
        // Remainder continues right after the viewport.
        assert_eq!(plan.dispatch[0].range, ByteRange::new(540, 640));
        assert!(!scheduler.dirty().covers(ByteRange::new(500, 540)));
    }

    #[test]
    fn test_visible_region_over_budget_is_dispatched_first() {
        let mut scheduler = Scheduler::new(config(), 0);
        scheduler.set_visible(Some(ByteRange::new(300, 600)));
        scheduler.request([ByteRange::new(0, 1000)]);

        let plan = scheduler.plan(1000);
        assert!(plan.inline.is_empty());
        assert_eq!(plan.dispatch[0].range, ByteRange::new(300, 400));
    }

    #[test]
    fn test_overlapping_requests_do_not_duplicate_work() {
        let mut scheduler = Scheduler::new(config().with_sync_threshold(0), 0);
        scheduler.request([ByteRange::new(0, 80)]);
        let job = scheduler.plan(1000).dispatch[0];
        assert_eq!(job.range, ByteRange::new(0, 80));

        scheduler.request([ByteRange::new(40, 120)]);
        scheduler.request([ByteRange::new(40, 120)]);
        assert_eq!(
            scheduler.dirty().iter().collect::<Vec<_>>(),
            vec![ByteRange::new(80, 120)]
        );
    }

    #[test]
    fn test_edit_makes_outstanding_job_stale_and_requeues_its_range() {
        let mut scheduler = Scheduler::new(config().with_sync_threshold(0), 0);
        scheduler.request([ByteRange::new(100, 180)]);
        let job = scheduler.plan(1000).dispatch[0];

        // Insert 10 bytes before the job's range.
        scheduler.note_edit(&stamped(1, Edit::insert(0, "0123456789")));
        assert_eq!(scheduler.phase(), Phase::Reparsing);
        assert_eq!(scheduler.revision(), 1);
        assert_eq!(
            scheduler.dirty().iter().collect::<Vec<_>>(),
            vec![ByteRange::new(110, 190)]
        );

        assert_eq!(scheduler.complete(job.id), Completion::Stale(job));
        assert_eq!(scheduler.complete(job.id), Completion::Unknown);
    }

    #[test]
    fn test_mark_dirty_keeps_phase() {
        let mut scheduler = Scheduler::new(config(), 0);
        scheduler.note_edit(&stamped(1, Edit::insert(5, "ab")));
        scheduler.mark_dirty(ByteRange::new(0, 12));
        assert_eq!(scheduler.phase(), Phase::Reparsing);
        assert_eq!(
            scheduler.dirty().iter().collect::<Vec<_>>(),
            vec![ByteRange::new(0, 12)]
        );
    }

    #[test]
    fn test_burst_of_edits_keeps_one_job_in_flight() {
        let mut scheduler = Scheduler::new(config().with_sync_threshold(0), 0);
        let mut len = 5000;
        scheduler.request([ByteRange::new(0, len)]);
        let mut dispatched = Vec::new();
        dispatched.extend(scheduler.plan(len).dispatch);

        for revision in 1..=50 {
            let offset = 2000 + revision as usize;
            let edit = stamped(revision, Edit::insert(offset, "x"));
            len += 1;
            scheduler.note_edit(&edit);
            scheduler.request([ByteRange::new(offset, offset + 1)]);
            dispatched.extend(scheduler.plan(len).dispatch);
            assert!(scheduler.in_flight().len() <= 1);
        }

        // Only the first job was ever handed out: the worker never finished it.
        assert_eq!(dispatched.len(), 1);
        assert!(matches!(
            scheduler.complete(dispatched[0].id),
            Completion::Stale(_)
        ));

        // Everything the stale job promised is queued again, merged with the edits.
        assert!(scheduler.dirty().covers(ByteRange::new(0, len)));
        let next = scheduler.plan(len).dispatch;
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].revision, 50);
    }

    #[test]
    fn test_invalidate_all_bumps_epoch() {
        let mut scheduler = Scheduler::new(config().with_sync_threshold(0), 3);
        scheduler.request([ByteRange::new(0, 50)]);
        let job = scheduler.plan(500).dispatch[0];

        scheduler.invalidate_all(500);
        assert_eq!(scheduler.epoch(), 1);
        assert!(scheduler.dirty().covers(ByteRange::new(0, 500)));
        assert_eq!(scheduler.complete(job.id), Completion::Stale(job));
    }

    #[test]
    fn test_reset_abandons_outstanding_jobs() {
        let mut scheduler = Scheduler::new(config().with_sync_threshold(0), 0);
        scheduler.request([ByteRange::new(0, 50)]);
        let job = scheduler.plan(500).dispatch[0];

        scheduler.reset(9);
        assert!(scheduler.is_idle());
        assert_eq!(scheduler.revision(), 9);
        assert_eq!(scheduler.phase(), Phase::Idle);
        assert_eq!(scheduler.complete(job.id), Completion::Unknown);
    }

    #[test]
    fn test_requeue_in_flight() {
        let mut scheduler = Scheduler::new(config().with_sync_threshold(0), 0);
        scheduler.request([ByteRange::new(0, 50)]);
        let _job = scheduler.plan(500).dispatch[0];
        assert!(scheduler.dirty().is_empty());

        scheduler.requeue_in_flight();
        assert!(scheduler.in_flight().is_empty());
        assert!(scheduler.dirty().covers(ByteRange::new(0, 50)));
    }

    #[test]
    fn test_plan_drops_ranges_past_document_end() {
        let mut scheduler = Scheduler::new(config(), 0);
        scheduler.request([ByteRange::new(0, 10), ByteRange::new(40, 60)]);
        let plan = scheduler.plan(45);
        assert_eq!(
            plan.inline,
            vec![ByteRange::new(0, 10), ByteRange::new(40, 45)]
        );
    }
}
