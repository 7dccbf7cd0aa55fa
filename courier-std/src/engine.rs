//! Filter/handler evaluation engine.
//!
//! A [`HandlerEntry`] pairs a body with the filters guarding it. A
//! [`HandlerChain`] is the ordered list of entries for one category; the
//! first registered entry whose filters all pass is the only one whose body
//! runs.
//!
//! Both levels evaluate concurrently: every filter of an entry is polled at
//! once and the first `false` drops the rest, and every entry of a chain is
//! tested at once while results are consumed in registration order. Dropping
//! a `FuturesUnordered` cancels every future it still holds, so siblings are
//! cancelled as soon as the decision is known.

use courier_core::{BoxError, BoxFilter, BoxHandler, Context, Filter, Handler};
use futures::{FutureExt, StreamExt, stream::FuturesUnordered};
use std::{any::Any, fmt, panic::AssertUnwindSafe};
use tracing::{Instrument, debug, error, info_span, warn};

/// Name logged for entries registered without one.
pub const UNKNOWN_HANDLER: &str = "unknown";

/// One registered handler: guarding filters, a body and an optional name.
pub struct HandlerEntry<B, E> {
    filters: Vec<BoxFilter<B, E>>,
    body: BoxHandler<B, E>,
    name: Option<String>,
}

impl<B, E> HandlerEntry<B, E>
where
    B: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Create an unfiltered entry around `body`.
    pub fn new<H: Handler<B, E>>(body: H) -> Self {
        Self {
            filters: Vec::new(),
            body: BoxHandler::new(body),
            name: None,
        }
    }

    /// Add a guarding filter.
    pub fn with_filter<F: Filter<B, E>>(mut self, filter: F) -> Self {
        self.filters.push(BoxFilter::new(filter));
        self
    }

    /// Add several already boxed filters.
    pub fn with_filters(mut self, filters: impl IntoIterator<Item = BoxFilter<B, E>>) -> Self {
        self.filters.extend(filters);
        self
    }

    /// Name the entry for logging.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The name used in logs, `"unknown"` if none was given.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNKNOWN_HANDLER)
    }

    /// Number of guarding filters.
    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    /// Aggregate test: logical AND over all filters, failing fast.
    ///
    /// A filter that errors or panics counts as `false` and is logged.
    pub async fn test(&self, ctx: &Context<B>, event: &E) -> bool {
        let mut checks: FuturesUnordered<_> = self
            .filters
            .iter()
            .map(|filter| self.check(filter, ctx, event))
            .collect();

        while let Some(passed) = checks.next().await {
            if !passed {
                return false;
            }
        }
        true
    }

    async fn check(&self, filter: &BoxFilter<B, E>, ctx: &Context<B>, event: &E) -> bool {
        match AssertUnwindSafe(filter.test(ctx, event)).catch_unwind().await {
            Ok(Ok(passed)) => passed,
            Ok(Err(err)) => {
                warn!(
                    handler = self.name(),
                    filter = filter.name(),
                    update_id = ctx.update_id(),
                    category = %ctx.category(),
                    error = %err,
                    "filter failed, treating as false"
                );
                false
            }
            Err(panic) => {
                error!(
                    handler = self.name(),
                    filter = filter.name(),
                    update_id = ctx.update_id(),
                    category = %ctx.category(),
                    panic = panic_message(&*panic),
                    "filter panicked, treating as false"
                );
                false
            }
        }
    }

    /// Run the body. Panics are caught and reported as errors.
    pub async fn run(&self, ctx: Context<B>, event: E) -> Result<(), BoxError> {
        let span = info_span!("handler", name = self.name(), update_id = ctx.update_id());
        match AssertUnwindSafe(self.body.handle(ctx, event).instrument(span))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(format!("handler panicked: {}", panic_message(&*panic)).into()),
        }
    }
}

impl<B, E> fmt::Debug for HandlerEntry<B, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("name", &self.name)
            .field("filters", &self.filters.len())
            .finish_non_exhaustive()
    }
}

/// What happened to one event inside a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The named handler ran to completion.
    Handled {
        /// Name of the handler that ran.
        handler: String,
    },
    /// The named handler was selected and its body failed.
    Failed {
        /// Name of the handler that failed.
        handler: String,
    },
    /// No handler's filters passed.
    Unmatched,
}

/// Ordered handler entries for one category.
///
/// Written only during registration, read-only afterwards.
pub struct HandlerChain<B, E> {
    entries: Vec<HandlerEntry<B, E>>,
}

impl<B, E> Default for HandlerChain<B, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B, E> HandlerChain<B, E> {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append an entry. Registration order is priority order.
    pub fn push(&mut self, entry: HandlerEntry<B, E>) {
        self.entries.push(entry);
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the chain has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &HandlerEntry<B, E>> {
        self.entries.iter()
    }
}

impl<B, E> HandlerChain<B, E>
where
    B: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Select the earliest registered entry whose aggregate test passes.
    ///
    /// All entries are tested concurrently. Results are consumed in
    /// registration order; once the earliest passing entry is known, every
    /// test still running for a later entry is cancelled.
    pub async fn select(&self, ctx: &Context<B>, event: &E) -> Option<&HandlerEntry<B, E>> {
        let mut tests: FuturesUnordered<_> = self
            .entries
            .iter()
            .enumerate()
            .map(|(index, entry)| async move { (index, entry.test(ctx, event).await) })
            .collect();

        let mut results: Vec<Option<bool>> = vec![None; self.entries.len()];
        let mut cursor = 0;

        while let Some((index, passed)) = tests.next().await {
            results[index] = Some(passed);
            while let Some(Some(passed)) = results.get(cursor) {
                if *passed {
                    return self.entries.get(cursor);
                }
                cursor += 1;
            }
        }
        None
    }

    /// Select an entry and run its body. At most one body runs per call.
    ///
    /// Body failures are logged with the handler name and update identity and
    /// reported in the outcome; they never propagate.
    pub async fn dispatch(&self, ctx: Context<B>, event: E) -> DispatchOutcome {
        let Some(entry) = self.select(&ctx, &event).await else {
            debug!(
                update_id = ctx.update_id(),
                category = %ctx.category(),
                "no handler matched"
            );
            return DispatchOutcome::Unmatched;
        };

        let handler = entry.name().to_owned();
        let update_id = ctx.update_id();
        let category = ctx.category();
        debug!(update_id, %category, handler = handler.as_str(), "dispatching to handler");

        match entry.run(ctx, event).await {
            Ok(()) => DispatchOutcome::Handled { handler },
            Err(err) => {
                error!(
                    update_id,
                    %category,
                    handler = handler.as_str(),
                    error = %err,
                    "handler failed"
                );
                DispatchOutcome::Failed { handler }
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
