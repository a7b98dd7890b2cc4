//! The capture path: classify → translate → enqueue.
//!
//! [`Pipeline::capture`] is what the hook trampoline calls for every message
//! while the subsystem is active.  It runs on the message-pump thread and
//! must return promptly: it takes two short locks (category allow-list read,
//! queue push), never waits on the consumer and never performs I/O unless
//! verbose message tracing is switched on.

pub mod classify;
pub mod metrics;
pub mod queue;
pub mod sequence;
pub mod translate;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::catalog;
use crate::domain::message::{Category, RawMessage};

use classify::Classifier;
use metrics::PipelineMetrics;
use queue::{EventQueue, PushOutcome};
use translate::EventTranslator;

/// What the capture path did with one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// No rule matched.
    Unclassified,
    /// A rule matched but its category is disabled.
    Filtered(Category),
    Enqueued(PushOutcome),
}

/// Classifier, translator and queue wired together for the pump thread.
pub struct Pipeline {
    classifier: Classifier,
    translator: EventTranslator,
    queue: Arc<EventQueue>,
    /// `None` enables every category.
    enabled: RwLock<Option<HashSet<Category>>>,
    metrics: Arc<PipelineMetrics>,
    verbose: AtomicBool,
}

impl Pipeline {
    /// Creates a pipeline with its own queue of `queue_capacity` events.
    pub fn new(classifier: Classifier, queue_capacity: usize) -> Self {
        Self::with_queue(classifier, Arc::new(EventQueue::new(queue_capacity)))
    }

    /// Creates a pipeline feeding an existing queue.
    pub fn with_queue(classifier: Classifier, queue: Arc<EventQueue>) -> Self {
        Self {
            classifier,
            translator: EventTranslator::new(),
            queue,
            enabled: RwLock::new(None),
            metrics: Arc::new(PipelineMetrics::new()),
            verbose: AtomicBool::new(false),
        }
    }

    /// Classifies `raw` and, if its category is enabled, translates and
    /// enqueues it.
    pub fn capture(&self, raw: &RawMessage) -> CaptureOutcome {
        self.metrics.record_captured();

        if self.verbose.load(Ordering::Relaxed) {
            let info = catalog::message_info(raw.code);
            trace!(
                window = %raw.window,
                code = raw.code,
                name = %info.name,
                description = info.description,
                "intercepted message"
            );
        }

        let Some(hit) = self.classifier.classify(raw) else {
            self.metrics.record_unclassified();
            return CaptureOutcome::Unclassified;
        };

        if !self.is_category_enabled(hit.category) {
            self.metrics.record_filtered();
            return CaptureOutcome::Filtered(hit.category.clone());
        }

        let outcome = self
            .queue
            .push_with(|| self.translator.translate(raw, hit.category, hit.extractor));
        self.metrics.record_enqueued(outcome.overflowed());
        CaptureOutcome::Enqueued(outcome)
    }

    /// Replaces the category allow-list.  `None` enables everything; an empty
    /// set blocks everything.
    pub fn set_enabled_categories(&self, categories: Option<HashSet<Category>>) {
        debug!(?categories, "enabled categories replaced");
        *self.enabled.write() = categories;
    }

    /// Enables `category`.  A no-op when every category is already enabled.
    pub fn enable_category(&self, category: impl Into<Category>) {
        let category = category.into();
        if let Some(set) = self.enabled.write().as_mut() {
            debug!(%category, "category enabled");
            set.insert(category);
        }
    }

    /// Disables `category`.  When every category was enabled, the allow-list
    /// becomes all categories of the rule table except this one.
    pub fn disable_category(&self, category: &str) {
        let mut enabled = self.enabled.write();
        let set = enabled.get_or_insert_with(|| self.classifier.categories().into_iter().collect());
        set.remove(category);
        debug!(category, "category disabled");
    }

    pub fn is_category_enabled(&self, category: &Category) -> bool {
        match &*self.enabled.read() {
            None => true,
            Some(set) => set.contains(category),
        }
    }

    /// Current allow-list; `None` means every category.
    pub fn enabled_categories(&self) -> Option<HashSet<Category>> {
        self.enabled.read().clone()
    }

    /// Switches per-message trace logging on or off.
    pub fn set_verbose(&self, verbose: bool) {
        self.verbose.store(verbose, Ordering::Relaxed);
        debug!(verbose, "verbose message tracing toggled");
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose.load(Ordering::Relaxed)
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }
}
