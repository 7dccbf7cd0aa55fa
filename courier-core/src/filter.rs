//! # Gatekeeping Layer (Filter)
//!
//! A Filter is an async predicate deciding whether a handler applies to an
//! event. Filters receive the dispatch [`Context`] and the event by
//! reference and may fail; the evaluation engine treats a failed filter as
//! `false`, logs the failure and never propagates it.
//!
//! # Composition
//!
//! - [`Filter::and`], [`Filter::or`], [`Filter::not`] combine filters into one
//! - [`filter_fn`] adapts a synchronous closure
//! - [`async_filter`] adapts an async closure over owned clones
//! - [`BoxFilter`] erases the type for storage in handler entries

use crate::{context::Context, error::BoxError};
use std::{future::Future, pin::Pin, sync::Arc};

/// Conversion of filter outputs into the engine's `Result<bool, BoxError>`.
pub trait IntoFilterResult {
    /// Convert into a filter result.
    fn into_filter_result(self) -> Result<bool, BoxError>;
}

impl IntoFilterResult for bool {
    fn into_filter_result(self) -> Result<bool, BoxError> {
        Ok(self)
    }
}

impl<E: Into<BoxError>> IntoFilterResult for Result<bool, E> {
    fn into_filter_result(self) -> Result<bool, BoxError> {
        self.map_err(Into::into)
    }
}

/// An async predicate over `(Context<B>, E)`.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a `Filter` for events of type `{E}`",
    label = "missing `Filter` implementation",
    note = "Filters must implement `test` for the bot type `{B}` and event type `{E}`."
)]
pub trait Filter<B, E>: Send + Sync + 'static {
    /// Decide whether the event passes.
    fn test(
        &self,
        ctx: &Context<B>,
        event: &E,
    ) -> impl Future<Output = Result<bool, BoxError>> + Send;

    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Passes when both filters pass. `other` is not evaluated if `self` fails.
    fn and<F>(self, other: F) -> And<Self, F>
    where
        Self: Sized,
        F: Filter<B, E>,
    {
        And {
            first: self,
            second: other,
        }
    }

    /// Passes when either filter passes. `other` is not evaluated if `self` passes.
    fn or<F>(self, other: F) -> Or<Self, F>
    where
        Self: Sized,
        F: Filter<B, E>,
    {
        Or {
            first: self,
            second: other,
        }
    }

    /// Inverts the filter. Errors stay errors.
    fn not(self) -> Not<Self>
    where
        Self: Sized,
    {
        Not { inner: self }
    }

    /// Boxes the filter.
    fn boxed(self) -> BoxFilter<B, E>
    where
        Self: Sized,
        B: Sync + 'static,
        E: Sync + 'static,
    {
        BoxFilter::new(self)
    }
}

/// Logical AND of two filters.
pub struct And<A, C> {
    first: A,
    second: C,
}

impl<B, E, A, C> Filter<B, E> for And<A, C>
where
    B: Sync,
    E: Sync,
    A: Filter<B, E>,
    C: Filter<B, E>,
{
    async fn test(&self, ctx: &Context<B>, event: &E) -> Result<bool, BoxError> {
        if !self.first.test(ctx, event).await? {
            return Ok(false);
        }
        self.second.test(ctx, event).await
    }
}

/// Logical OR of two filters.
pub struct Or<A, C> {
    first: A,
    second: C,
}

impl<B, E, A, C> Filter<B, E> for Or<A, C>
where
    B: Sync,
    E: Sync,
    A: Filter<B, E>,
    C: Filter<B, E>,
{
    async fn test(&self, ctx: &Context<B>, event: &E) -> Result<bool, BoxError> {
        if self.first.test(ctx, event).await? {
            return Ok(true);
        }
        self.second.test(ctx, event).await
    }
}

/// Logical NOT of a filter.
pub struct Not<A> {
    inner: A,
}

impl<B, E, A> Filter<B, E> for Not<A>
where
    B: Sync,
    E: Sync,
    A: Filter<B, E>,
{
    async fn test(&self, ctx: &Context<B>, event: &E) -> Result<bool, BoxError> {
        Ok(!self.inner.test(ctx, event).await?)
    }
}

/// A filter backed by a synchronous predicate.
pub struct FnFilter<F> {
    predicate: F,
}

/// Adapt a synchronous predicate into a [`Filter`].
pub fn filter_fn<F>(predicate: F) -> FnFilter<F> {
    FnFilter { predicate }
}

impl<B, E, F> Filter<B, E> for FnFilter<F>
where
    B: Sync,
    E: Sync,
    F: Fn(&Context<B>, &E) -> bool + Send + Sync + 'static,
{
    async fn test(&self, ctx: &Context<B>, event: &E) -> Result<bool, BoxError> {
        Ok((self.predicate)(ctx, event))
    }
}

/// A filter backed by an async closure receiving owned clones.
pub struct AsyncFnFilter<F> {
    predicate: F,
}

/// Adapt an async closure into a [`Filter`].
///
/// The closure receives clones of the context and the event, so the returned
/// future may be `'static`.
pub fn async_filter<F>(predicate: F) -> AsyncFnFilter<F> {
    AsyncFnFilter { predicate }
}

impl<B, E, F, Fut> Filter<B, E> for AsyncFnFilter<F>
where
    B: Clone + Send + Sync,
    E: Clone + Send + Sync,
    F: Fn(Context<B>, E) -> Fut + Send + Sync + 'static,
    Fut: Future + Send,
    Fut::Output: IntoFilterResult,
{
    async fn test(&self, ctx: &Context<B>, event: &E) -> Result<bool, BoxError> {
        (self.predicate)(ctx.clone(), event.clone())
            .await
            .into_filter_result()
    }
}

/// Object-safe version of [`Filter`].
pub trait DynFilter<B, E>: Send + Sync + 'static {
    /// Decide whether the event passes (dynamic dispatch version).
    fn test_dyn<'a>(
        &'a self,
        ctx: &'a Context<B>,
        event: &'a E,
    ) -> Pin<Box<dyn Future<Output = Result<bool, BoxError>> + Send + 'a>>;

    /// Name used in logs.
    fn filter_name(&self) -> &str;
}

impl<B, E, F> DynFilter<B, E> for F
where
    B: Sync,
    E: Sync,
    F: Filter<B, E>,
{
    fn test_dyn<'a>(
        &'a self,
        ctx: &'a Context<B>,
        event: &'a E,
    ) -> Pin<Box<dyn Future<Output = Result<bool, BoxError>> + Send + 'a>> {
        Box::pin(self.test(ctx, event))
    }

    fn filter_name(&self) -> &str {
        Filter::name(self)
    }
}

/// A type-erased, cheaply clonable filter.
pub struct BoxFilter<B, E> {
    inner: Arc<dyn DynFilter<B, E>>,
}

impl<B, E> BoxFilter<B, E>
where
    B: Sync + 'static,
    E: Sync + 'static,
{
    /// Erase `filter`.
    pub fn new<F: Filter<B, E>>(filter: F) -> Self {
        Self {
            inner: Arc::new(filter),
        }
    }
}

impl<B, E> Clone for BoxFilter<B, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B, E> Filter<B, E> for BoxFilter<B, E>
where
    B: Sync + 'static,
    E: Sync + 'static,
{
    fn test(
        &self,
        ctx: &Context<B>,
        event: &E,
    ) -> impl Future<Output = Result<bool, BoxError>> + Send {
        async move { self.inner.test_dyn(ctx, event).await }
    }

    fn name(&self) -> &str {
        self.inner.filter_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::UpdateMeta,
        error::StorageError,
        storage::{Record, StateTransition, Storage, StorageKey},
        update::Category,
    };
    use async_trait::async_trait;
    use serde_json::Value;

    struct NullStorage;

    #[async_trait]
    impl Storage for NullStorage {
        async fn get(&self, _key: StorageKey) -> Result<Record, StorageError> {
            Ok(Record::default())
        }
        async fn set_state(&self, _: StorageKey, _: Option<String>) -> Result<(), StorageError> {
            Ok(())
        }
        async fn set_data(
            &self,
            _: StorageKey,
            _: String,
            _: Value,
        ) -> Result<Option<Value>, StorageError> {
            Ok(None)
        }
        async fn remove_data(&self, _: StorageKey, _: &str) -> Result<Option<Value>, StorageError> {
            Ok(None)
        }
        async fn reset_data(&self, _: StorageKey) -> Result<(), StorageError> {
            Ok(())
        }
        async fn finish(&self, _: StorageKey) -> Result<(), StorageError> {
            Ok(())
        }
        async fn next(
            &self,
            _: StorageKey,
            _: StateTransition,
        ) -> Result<Option<String>, StorageError> {
            Ok(None)
        }
    }

    fn ctx() -> Context<()> {
        Context::new(
            (),
            UpdateMeta {
                update_id: 1,
                category: Category::Message,
            },
            Arc::new(NullStorage),
            None,
        )
    }

    fn is_even() -> FnFilter<impl Fn(&Context<()>, &i32) -> bool + Send + Sync + 'static> {
        filter_fn(|_: &Context<()>, n: &i32| n % 2 == 0)
    }

    fn is_positive() -> FnFilter<impl Fn(&Context<()>, &i32) -> bool + Send + Sync + 'static> {
        filter_fn(|_: &Context<()>, n: &i32| *n > 0)
    }

    #[tokio::test]
    async fn test_combinators() {
        let ctx = ctx();
        let both = Filter::<(), i32>::and(is_even(), is_positive());
        assert!(both.test(&ctx, &4i32).await.unwrap());
        assert!(!both.test(&ctx, &-4i32).await.unwrap());

        let either = Filter::<(), i32>::or(is_even(), is_positive());
        assert!(either.test(&ctx, &3i32).await.unwrap());
        assert!(!either.test(&ctx, &-3i32).await.unwrap());

        let odd = Filter::<(), i32>::not(is_even());
        assert!(odd.test(&ctx, &3i32).await.unwrap());
    }

    #[tokio::test]
    async fn test_async_filter_error_is_returned() {
        let failing = async_filter(|_: Context<()>, _: i32| async {
            Err::<bool, BoxError>("lookup failed".into())
        });
        let result = failing.test(&ctx(), &1i32).await;
        assert_eq!(result.unwrap_err().to_string(), "lookup failed");
    }

    #[tokio::test]
    async fn test_boxed_filter_keeps_behavior() {
        let boxed: BoxFilter<(), i32> = Filter::<(), i32>::boxed(is_positive());
        let cloned = boxed.clone();
        assert!(cloned.test(&ctx(), &1i32).await.unwrap());
        assert!(boxed.name().contains("FnFilter"));
    }

    async fn check<F: Filter<(), i32>>(filter: &F, ctx: &Context<()>, n: i32) -> bool {
        let event = n;
        filter.test(ctx, &event).await.unwrap()
    }

    #[tokio::test]
    async fn test_boxed_filter_borrows_context_and_event_separately() {
        let ctx = ctx();
        let boxed = BoxFilter::new(is_even());
        let nested = BoxFilter::new(Filter::<(), i32>::and(boxed.clone(), is_positive()));
        assert!(check(&boxed, &ctx, 2).await);
        assert!(check(&nested, &ctx, 6).await);
        assert!(!check(&nested, &ctx, -6).await);
    }
}
