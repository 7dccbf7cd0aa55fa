//! # Action Layer (Handler)
//!
//! The terminal body of a handler entry. Handlers receive an owned
//! [`Context`] and event and perform async business logic, typically calling
//! the outbound client carried by the context.
//!
//! # Usage Patterns
//!
//! 1. **Direct closure**: `|ctx, message| async move { ... }`
//! 2. **Struct implementation**: `impl Handler<Bot, ChatMessage> for Greeter`
//! 3. **Attribute macro**: `#[courier::handler] async fn greet(...)`

use crate::{context::Context, error::BoxError};
use std::{future::Future, pin::Pin, sync::Arc};

/// Conversion of handler outputs into `Result<(), BoxError>`.
pub trait HandlerResult: Send + 'static {
    /// Convert into the engine's result type.
    fn into_result(self) -> Result<(), BoxError>;
}

impl HandlerResult for () {
    fn into_result(self) -> Result<(), BoxError> {
        Ok(())
    }
}

impl<E: Into<BoxError> + Send + 'static> HandlerResult for Result<(), E> {
    fn into_result(self) -> Result<(), BoxError> {
        self.map_err(Into::into)
    }
}

/// The body executed when a handler entry is selected for an event.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot handle events of type `{E}`",
    label = "missing `Handler<{B}, {E}>` implementation",
    note = "Handlers must implement `handle` for the bot type `{B}` and event type `{E}`."
)]
pub trait Handler<B, E>: Send + Sync + 'static {
    /// Execute the handler body.
    fn handle(
        &self,
        ctx: Context<B>,
        event: E,
    ) -> impl Future<Output = Result<(), BoxError>> + Send;
}

// Blanket impl for closures
impl<F, B, E, Fut> Handler<B, E> for F
where
    F: Fn(Context<B>, E) -> Fut + Send + Sync + 'static,
    Fut: Future + Send,
    Fut::Output: HandlerResult,
{
    fn handle(
        &self,
        ctx: Context<B>,
        event: E,
    ) -> impl Future<Output = Result<(), BoxError>> + Send {
        let fut = (self)(ctx, event);
        async move { fut.await.into_result() }
    }
}

/// Object-safe version of [`Handler`].
pub trait DynHandler<B, E>: Send + Sync + 'static {
    /// Execute the handler body (dynamic dispatch version).
    fn handle_dyn(
        &self,
        ctx: Context<B>,
        event: E,
    ) -> Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send + '_>>;
}

impl<B, E, H> DynHandler<B, E> for H
where
    B: 'static,
    E: 'static,
    H: Handler<B, E>,
{
    fn handle_dyn(
        &self,
        ctx: Context<B>,
        event: E,
    ) -> Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send + '_>> {
        Box::pin(self.handle(ctx, event))
    }
}

/// A type-erased, cheaply clonable handler.
pub struct BoxHandler<B, E> {
    inner: Arc<dyn DynHandler<B, E>>,
}

impl<B: 'static, E: 'static> BoxHandler<B, E> {
    /// Erase `handler`.
    pub fn new<H: Handler<B, E>>(handler: H) -> Self {
        Self {
            inner: Arc::new(handler),
        }
    }
}

impl<B, E> Clone for BoxHandler<B, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: 'static, E: 'static> Handler<B, E> for BoxHandler<B, E> {
    fn handle(
        &self,
        ctx: Context<B>,
        event: E,
    ) -> impl Future<Output = Result<(), BoxError>> + Send {
        self.inner.handle_dyn(ctx, event)
    }
}
