//! # courier-core
//!
//! Core traits and data model for the Courier update-dispatch framework.
//!
//! This crate has minimal dependencies and is meant to be imported by code
//! that implements filters, handlers, storage backends or update sources
//! without pulling in the runtime machinery of `courier-std`.
//!
//! # Layers
//!
//! ## Update model ([`Update`], [`Category`])
//!
//! An [`Update`] is one event emitted by the external source. Exactly one of
//! its payload fields is populated; [`Update::classify`] names it.
//!
//! ## Gatekeeping ([`Filter`])
//!
//! Async predicates deciding whether a handler applies to an event. A filter
//! may fail; callers treat a failure as `false`.
//!
//! ## Action ([`Handler`])
//!
//! The terminal body that produces side effects through the outbound client
//! carried by the [`Context`].
//!
//! ## Conversation state ([`Storage`], [`FsmContext`])
//!
//! Per-(chat, user) state and data, behind a pluggable backend.
//!
//! ## Collaborators ([`UpdateSource`])
//!
//! The pull-mode transport contract.

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod context;
mod error;
mod filter;
mod handler;
mod message;
mod source;
mod storage;
mod update;

// Re-exports
pub use context::{Context, UpdateMeta};
pub use error::{BoxError, FetchError, LifecycleError, StorageError};
pub use filter::{
    And, AsyncFnFilter, BoxFilter, DynFilter, Filter, FnFilter, IntoFilterResult, Not, Or,
    async_filter, filter_fn,
};
pub use handler::{BoxHandler, DynHandler, Handler, HandlerResult};
pub use message::{Event, Message};
pub use source::{FetchRequest, UpdateSource};
pub use storage::{FsmContext, Record, StateTransition, Storage, StorageKey};
pub use update::{
    CallbackQuery, Category, Chat, ChatMessage, ChosenInlineResult, InlineQuery, Poll,
    PreCheckoutQuery, ShippingQuery, Update, User,
};
