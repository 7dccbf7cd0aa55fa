//! # courier - update-dispatch core for chat bots
//!
//! Updates arrive through long polling or a webhook, are classified into one
//! category, and run through that category's chain of handlers. Each handler
//! is guarded by async filters; the earliest registered handler whose
//! filters all pass is the only one that runs. Handlers and filters reach
//! per-conversation state through [`FsmContext`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier::prelude::*;
//! use courier::{filters::text_eq, kind};
//!
//! #[courier::handler]
//! async fn pong(ctx: Context<Bot>, msg: ChatMessage) -> Result<(), BoxError> {
//!     ctx.bot().send_text(msg.chat.id, "pong").await?;
//!     Ok(())
//! }
//!
//! let dispatcher = Dispatcher::builder(bot)
//!     .register::<kind::Message>(HandlerEntry::new(pong).with_filter(text_eq("ping")))
//!     .build();
//! dispatcher.run_polling(HttpSource::new(&token)).await?;
//! ```

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

pub mod config;
mod dispatcher;
pub mod logging;

pub use config::{ConfigError, DispatcherConfig};
pub use dispatcher::{Dispatcher, DispatcherBuilder};

pub use courier_core::{
    // Filters
    And,
    AsyncFnFilter,
    // Errors
    BoxError,
    BoxFilter,
    // Handlers
    BoxHandler,
    // Update model
    CallbackQuery,
    Category,
    Chat,
    ChatMessage,
    ChosenInlineResult,
    // Context
    Context,
    DynFilter,
    DynHandler,
    Event,
    FetchError,
    // Collaborators
    FetchRequest,
    Filter,
    FnFilter,
    // Conversation state
    FsmContext,
    Handler,
    HandlerResult,
    InlineQuery,
    IntoFilterResult,
    LifecycleError,
    Message,
    Not,
    Or,
    Poll,
    PreCheckoutQuery,
    Record,
    ShippingQuery,
    StateTransition,
    Storage,
    StorageError,
    StorageKey,
    Update,
    UpdateMeta,
    UpdateSource,
    User,
    async_filter,
    filter_fn,
};

pub use courier_std::{
    config::{PollingConfig, WebhookConfig},
    engine::{DispatchOutcome, HandlerChain, HandlerEntry},
    ingest::{ControllerStatus, HttpSource, JobId},
    kind,
    router::RouteOutcome,
};

/// Standard filters.
pub mod filters {
    #![allow(clippy::wildcard_imports)]
    pub use courier_std::filters::*;
}

/// Conversation state backends.
pub mod storage {
    pub use courier_std::storage::{ActorStorage, MemoryStorage, NoopStorage};
}

/// Testing utilities.
pub mod testing {
    #![allow(clippy::wildcard_imports)]
    pub use courier_std::testing::*;
}

/// Prelude module - common imports for Courier.
///
/// # Usage
///
/// ```rust,ignore
/// use courier::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        BoxError, CallbackQuery, ChatMessage, Context, Dispatcher, DispatcherConfig, Event,
        Filter, FsmContext, Handler, HandlerEntry, HttpSource, InlineQuery, LifecycleError,
        Storage, Update, kind,
    };
}

#[cfg(feature = "macros")]
pub use courier_macros::{filter, handler};
