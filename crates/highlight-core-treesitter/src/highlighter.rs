//! Highlighter façade: the single entry point a text view talks to.
//!
//! All methods are called from one owner thread. Classification that does not fit the
//! synchronous budget runs on a background thread; its results are merged in [`Highlighter::poll`].

use crate::error::HighlightError;
use crate::grammar::{ClassificationSource, GrammarRegistry, HighlightRules, StyleMap};
use crate::parser::{ParseMode, ParserAdapter, SyntaxTree};
use crate::worker::{ClassifyRequest, ClassifyWorker, Received};
use highlight_core::{
    ByteRange, Completion, DocumentSnapshot, Edit, EditLog, ListenerId, Phase, QueryJob,
    RangeIndex, RangeSet, Revision, Scheduler, SchedulerConfig, StyleCategory, StyleListeners,
    StyleRange, edited_spans,
};
use std::collections::VecDeque;
use std::sync::Arc;

/// Configuration of a [`Highlighter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlighterConfig {
    /// Scheduling thresholds.
    pub scheduler: SchedulerConfig,
    /// Failed parses of one revision before the document degrades to unclassified.
    pub max_parse_failures: u32,
    /// Run jobs on a background thread. When disabled, one job runs per [`Highlighter::poll`].
    pub background: bool,
}

impl Default for HighlighterConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            max_parse_failures: 2,
            background: true,
        }
    }
}

impl HighlighterConfig {
    /// Replace the scheduler configuration.
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Dirty total (bytes) classified synchronously.
    pub fn with_sync_threshold(mut self, bytes: usize) -> Self {
        self.scheduler = self.scheduler.with_sync_threshold(bytes);
        self
    }

    /// Dirty bytes inside the visible region classified synchronously.
    pub fn with_visible_budget(mut self, bytes: usize) -> Self {
        self.scheduler = self.scheduler.with_visible_budget(bytes);
        self
    }

    /// Maximum size of one background job.
    pub fn with_job_chunk(mut self, bytes: usize) -> Self {
        self.scheduler = self.scheduler.with_job_chunk(bytes);
        self
    }

    /// Maximum number of outstanding jobs.
    pub fn with_max_in_flight(mut self, jobs: usize) -> Self {
        self.scheduler = self.scheduler.with_max_in_flight(jobs);
        self
    }

    /// Failed parses of one revision tolerated before degrading.
    pub fn with_max_parse_failures(mut self, failures: u32) -> Self {
        self.max_parse_failures = failures.max(1);
        self
    }

    /// Enable or disable the background thread.
    pub fn with_background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }
}

/// Incremental syntax highlighter for one document.
///
/// Feed it edits with [`text_did_change`](Self::text_did_change), call [`poll`](Self::poll)
/// from the event loop, and read styles with [`style_at`](Self::style_at) /
/// [`query`](Self::query) or receive them through [`subscribe`](Self::subscribe).
///
/// Until a region has been classified at the current revision it reads back as
/// [`StyleCategory::Unclassified`]; a style computed for older text is never returned.
pub struct Highlighter {
    config: HighlighterConfig,
    source: ClassificationSource,
    styles: StyleMap,
    rules: Option<Arc<HighlightRules>>,
    parser: Option<ParserAdapter>,
    snapshot: DocumentSnapshot,
    log: EditLog,
    index: RangeIndex,
    scheduler: Scheduler,
    listeners: StyleListeners,
    worker: Option<ClassifyWorker>,
    deferred: VecDeque<ClassifyRequest>,
    attached: bool,
    needs_parse: bool,
    degraded: Option<Revision>,
}

impl Highlighter {
    /// Create a detached highlighter for `snapshot` with no language.
    pub fn new(snapshot: DocumentSnapshot, styles: StyleMap, config: HighlighterConfig) -> Self {
        let revision = snapshot.revision();
        Self {
            config,
            source: ClassificationSource::Plain,
            styles,
            rules: None,
            parser: None,
            log: EditLog::new(revision, snapshot.len_bytes()),
            snapshot,
            index: RangeIndex::new(),
            scheduler: Scheduler::new(config.scheduler, revision),
            listeners: StyleListeners::new(),
            worker: None,
            deferred: VecDeque::new(),
            attached: false,
            needs_parse: true,
            degraded: None,
        }
    }

    /// Start highlighting: spawn the worker and queue the whole document.
    ///
    /// Calling it again while attached does nothing. If the worker thread cannot be started the
    /// error is returned, but the highlighter stays attached and classifies on the owner thread.
    pub fn attach(&mut self) -> Result<(), HighlightError> {
        if self.attached {
            return Ok(());
        }
        self.attached = true;
        log::debug!("attaching highlighter ({})", self.source.name());

        let mut result = Ok(());
        if self.config.background {
            match ClassifyWorker::spawn() {
                Ok(worker) => self.worker = Some(worker),
                Err(err) => {
                    log::warn!("cannot start highlight worker, classifying inline: {err}");
                    result = Err(HighlightError::Worker(err.to_string()));
                }
            }
        }

        self.needs_parse = true;
        self.scheduler.invalidate_all(self.snapshot.len_bytes());
        self.reconcile();
        result
    }

    /// Stop highlighting: stop the worker and release the tree and the index.
    ///
    /// Calling it again while detached does nothing.
    pub fn detach(&mut self) {
        if !self.attached {
            return;
        }
        log::debug!("detaching highlighter");
        self.attached = false;
        self.worker = None;
        self.clear_state();
        if let Some(parser) = &mut self.parser {
            parser.discard();
        }
    }

    /// Returns `true` between [`attach`](Self::attach) and [`detach`](Self::detach).
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Switch the classification source.
    ///
    /// Everything classified so far is dropped (listeners receive the whole document as
    /// unclassified) and the document is parsed from scratch. If the grammar cannot be loaded
    /// into the parser, the highlighter falls back to [`ClassificationSource::Plain`] and
    /// returns the error.
    pub fn set_language(&mut self, source: ClassificationSource) -> Result<(), HighlightError> {
        log::debug!("switching language to {}", source.name());
        self.clear_state();
        self.parser = None;
        self.rules = None;

        let mut result = Ok(());
        let source = match source {
            ClassificationSource::TreeSitter(grammar) => match ParserAdapter::new(&grammar) {
                Ok(parser) => {
                    self.parser = Some(parser);
                    self.rules = Some(Arc::new(HighlightRules::new(
                        Arc::clone(&grammar),
                        &self.styles,
                    )));
                    ClassificationSource::TreeSitter(grammar)
                }
                Err(err) => {
                    log::warn!(
                        "cannot use grammar '{}', highlighting disabled: {err}",
                        grammar.name()
                    );
                    result = Err(err);
                    ClassificationSource::Plain
                }
            },
            ClassificationSource::Plain => ClassificationSource::Plain,
        };
        self.source = source;

        self.notify_unclassified(self.snapshot.full_range());
        if self.attached {
            self.needs_parse = true;
            self.scheduler.invalidate_all(self.snapshot.len_bytes());
            self.reconcile();
        }
        result
    }

    /// Switch to the language registered as `name`.
    ///
    /// Fails closed: an unknown language highlights nothing and a malformed query yields a
    /// grammar with zero patterns. The error is still returned.
    pub fn set_language_from(
        &mut self,
        registry: &GrammarRegistry,
        name: &str,
    ) -> Result<(), HighlightError> {
        let (source, err) = registry.source_for(name);
        let result = self.set_language(source);
        match err {
            Some(err) => Err(err),
            None => result,
        }
    }

    /// Current classification source.
    pub fn source(&self) -> &ClassificationSource {
        &self.source
    }

    /// Change the capture-to-style mapping and re-query the whole document with the current tree.
    pub fn set_style_map(&mut self, styles: StyleMap) {
        self.styles = styles;
        if let Some(rules) = &self.rules {
            let grammar = Arc::clone(rules.grammar());
            self.rules = Some(Arc::new(HighlightRules::new(grammar, &self.styles)));
        }
        if self.attached {
            self.scheduler.invalidate_all(self.snapshot.len_bytes());
            self.reconcile();
        }
    }

    /// Current style map.
    pub fn style_map(&self) -> &StyleMap {
        &self.styles
    }

    /// Region the user can see, classified ahead of everything else.
    pub fn set_visible_range(&mut self, range: Option<ByteRange>) {
        let len = self.snapshot.len_bytes();
        self.scheduler.set_visible(range.map(|r| r.clamp_to(len)));
        if self.attached {
            self.pump();
        }
    }

    /// Take `edits`, which turn the previous snapshot into `snapshot`.
    ///
    /// The index is shifted at once (edited spans read as unclassified), the tree is re-parsed
    /// once for the whole batch, and work is scheduled. Returns without waiting for the worker.
    ///
    /// Edits stamped with a revision must follow the last one seen; a gap, an invalid edit or a
    /// final revision other than `snapshot`'s makes the highlighter start over from `snapshot`.
    pub fn text_did_change(&mut self, snapshot: DocumentSnapshot, edits: Vec<Edit>) {
        self.collect_results();

        let mut in_sync = true;
        for edit in edits {
            let expected = self.log.revision() + 1;
            if edit.revision != 0 && edit.revision != expected {
                log::warn!("expected edit of revision {expected}, got {}", edit.revision);
                in_sync = false;
                break;
            }
            if let Err(err) = self.log.record(edit) {
                log::warn!("rejecting edit: {err}");
                in_sync = false;
                break;
            }
            let Some(recorded) = self.log.pending().last() else {
                continue;
            };
            let lost = self.index.apply_edit(recorded.range, recorded.replacement_len());
            self.scheduler.note_edit(recorded);
            if let Some(lost) = lost {
                self.scheduler.mark_dirty(lost);
            }
        }

        if in_sync
            && (self.log.revision() != snapshot.revision()
                || self.log.len() != snapshot.len_bytes())
        {
            log::warn!(
                "edits lead to revision {} ({} bytes), snapshot is revision {} ({} bytes)",
                self.log.revision(),
                self.log.len(),
                snapshot.revision(),
                snapshot.len_bytes()
            );
            in_sync = false;
        }

        self.snapshot = snapshot;
        if !in_sync {
            self.resync();
            return;
        }

        self.needs_parse = true;
        if self.attached {
            self.reconcile();
        } else {
            self.log.take_pending();
        }
    }

    /// Re-classify `range`, or the whole document for `None`, with the current tree.
    pub fn invalidate(&mut self, range: Option<ByteRange>) {
        if !self.attached {
            return;
        }
        let len = self.snapshot.len_bytes();
        match range {
            Some(range) => self.scheduler.request([range.clamp_to(len)]),
            None => self.scheduler.invalidate_all(len),
        }
        self.reconcile();
    }

    /// Merge finished background work, retry a pending parse and hand out more work.
    ///
    /// Returns the number of results merged into the index.
    pub fn poll(&mut self) -> usize {
        let applied = self.collect_results();
        self.reconcile();
        applied
    }

    /// Category at byte `offset`; unclassified past the end of the document.
    pub fn style_at(&self, offset: usize) -> StyleCategory {
        if offset >= self.snapshot.len_bytes() {
            return StyleCategory::Unclassified;
        }
        self.index.style_at(offset)
    }

    /// Categories covering `range`, as a coalesced partition of it.
    pub fn query(&self, range: ByteRange) -> Vec<StyleRange> {
        self.index.query(range)
    }

    /// Register a listener for changed style ranges.
    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&[StyleRange]) + Send + 'static,
    {
        self.listeners.subscribe(listener)
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Revision of the latest edit taken.
    pub fn revision(&self) -> Revision {
        self.log.revision()
    }

    /// Snapshot of the latest text taken.
    pub fn snapshot(&self) -> &DocumentSnapshot {
        &self.snapshot
    }

    /// Scheduling phase.
    pub fn phase(&self) -> Phase {
        if self.parse_pending() {
            Phase::Reparsing
        } else {
            self.scheduler.phase()
        }
    }

    /// Returns `true` when every region is classified at the current revision.
    pub fn is_idle(&self) -> bool {
        !self.parse_pending() && self.scheduler.is_idle()
    }

    /// Current syntax tree.
    pub fn syntax_tree(&self) -> Option<&SyntaxTree> {
        self.parser.as_ref().and_then(ParserAdapter::tree)
    }

    /// How the current tree was produced.
    pub fn last_parse_mode(&self) -> Option<ParseMode> {
        self.parser.as_ref().and_then(ParserAdapter::last_mode)
    }

    /// Number of outstanding jobs, superseded ones included.
    pub fn in_flight_jobs(&self) -> usize {
        self.scheduler.in_flight().len()
    }

    /// Returns `true` while the current revision could not be parsed.
    pub fn is_degraded(&self) -> bool {
        self.degraded == Some(self.snapshot.revision())
    }

    fn parse_pending(&self) -> bool {
        self.attached && self.needs_parse && self.parser.is_some() && !self.is_degraded()
    }

    /// Drop classifications and outstanding work; keeps language, tree and attachment.
    fn clear_state(&mut self) {
        self.index.clear();
        self.deferred.clear();
        self.scheduler.reset(self.log.revision());
        self.log.take_pending();
        self.degraded = None;
    }

    fn resync(&mut self) {
        log::warn!(
            "re-highlighting revision {} from scratch",
            self.snapshot.revision()
        );
        self.log
            .reset(self.snapshot.revision(), self.snapshot.len_bytes());
        self.clear_state();
        if let Some(parser) = &mut self.parser {
            parser.discard();
        }
        self.notify_unclassified(self.snapshot.full_range());
        self.needs_parse = true;
        if self.attached {
            self.scheduler.invalidate_all(self.snapshot.len_bytes());
            self.reconcile();
        }
    }

    /// Bring the tree up to date if needed, then hand out work.
    fn reconcile(&mut self) {
        if !self.attached {
            return;
        }
        if self.parse_pending() && !self.reparse() {
            return;
        }
        self.needs_parse = false;
        self.log.take_pending();
        self.pump();
    }

    /// Returns `false` if the tree is not usable for the current revision.
    fn reparse(&mut self) -> bool {
        let Some(parser) = self.parser.as_mut() else {
            return true;
        };
        self.scheduler.begin_reparse();
        let edits = self.log.take_pending();

        match parser.reparse(&edits, &self.snapshot) {
            Ok(outcome) => {
                let mut dirty: RangeSet = outcome.changed_ranges.iter().copied().collect();
                for span in edited_spans(&edits).iter() {
                    dirty.insert(self.snapshot.expand_to_lines(span));
                }
                self.scheduler.request(dirty.iter());
                true
            }
            Err(err) => {
                let revision = self.snapshot.revision();
                if parser.failure_count(revision) >= self.config.max_parse_failures {
                    self.degrade(&err);
                }
                false
            }
        }
    }

    /// Give up on the current revision: everything reads as unclassified until the next edit.
    fn degrade(&mut self, err: &HighlightError) {
        let revision = self.snapshot.revision();
        log::warn!("{err}; leaving revision {revision} unclassified");
        self.clear_state();
        self.degraded = Some(revision);
        self.notify_unclassified(self.snapshot.full_range());
    }

    /// Plan queued work: inline ranges are classified and merged now, jobs go to the worker.
    fn pump(&mut self) {
        if self.parse_pending() {
            return;
        }
        let plan = self.scheduler.plan(self.snapshot.len_bytes());
        if plan.is_empty() {
            return;
        }

        for range in plan.inline {
            let styles = match self.request_for(range) {
                Some(request) => request.run().styles,
                None => vec![StyleRange::unclassified(range)],
            };
            self.apply(range, &styles);
        }
        for job in plan.dispatch {
            self.dispatch(job);
        }
        self.scheduler.finish_applying();
    }

    fn request_for(&self, range: ByteRange) -> Option<ClassifyRequest> {
        let rules = self.rules.as_ref()?;
        let syntax = self.syntax_tree()?;
        Some(ClassifyRequest {
            job: QueryJob {
                id: 0,
                epoch: self.scheduler.epoch(),
                revision: syntax.revision(),
                range,
            },
            syntax: syntax.clone(),
            rules: Arc::clone(rules),
        })
    }

    fn dispatch(&mut self, job: QueryJob) {
        let Some(mut request) = self.request_for(job.range) else {
            self.complete(job, &[StyleRange::unclassified(job.range)]);
            return;
        };
        request.job = job;

        let Some(worker) = &self.worker else {
            self.deferred.push_back(request);
            return;
        };
        if let Err(request) = worker.submit(request) {
            log::warn!("highlight worker is gone, classifying inline");
            self.worker = None;
            self.deferred.push_back(request);
        }
    }

    /// Drain worker results, then run at most one deferred job.
    fn collect_results(&mut self) -> usize {
        let mut applied = 0;
        loop {
            let received = match &self.worker {
                Some(worker) => worker.try_recv(),
                None => break,
            };
            match received {
                Received::Result(result) => {
                    if self.complete(result.job, &result.styles) {
                        applied += 1;
                    }
                }
                Received::Empty => break,
                Received::Disconnected => {
                    log::error!("highlight worker exited, classifying inline");
                    self.worker = None;
                    self.scheduler.requeue_in_flight();
                    break;
                }
            }
        }

        if let Some(request) = self.deferred.pop_front() {
            let result = request.run();
            if self.complete(result.job, &result.styles) {
                applied += 1;
            }
        }
        applied
    }

    /// Returns `true` if the result was merged.
    fn complete(&mut self, job: QueryJob, styles: &[StyleRange]) -> bool {
        match self.scheduler.complete(job.id) {
            Completion::Apply(job) => {
                self.apply(job.range, styles);
                self.scheduler.finish_applying();
                true
            }
            Completion::Stale(_) | Completion::Unknown => false,
        }
    }

    fn apply(&mut self, range: ByteRange, styles: &[StyleRange]) {
        match self.index.replace(range, styles) {
            Ok(()) => self.listeners.notify(styles),
            Err(err) => {
                log::error!(
                    "dropping classification of {}..{}: {err}",
                    range.start,
                    range.end
                );
                let fallback = [StyleRange::unclassified(range)];
                if self.index.replace(range, &fallback).is_ok() {
                    self.listeners.notify(&fallback);
                }
            }
        }
    }

    fn notify_unclassified(&mut self, range: ByteRange) {
        if !range.is_empty() {
            self.listeners.notify(&[StyleRange::unclassified(range)]);
        }
    }
}

impl std::fmt::Debug for Highlighter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Highlighter")
            .field("language", &self.source.name())
            .field("revision", &self.log.revision())
            .field("attached", &self.attached)
            .field("phase", &self.phase())
            .field("in_flight", &self.scheduler.in_flight().len())
            .field("degraded", &self.degraded)
            .finish()
    }
}
