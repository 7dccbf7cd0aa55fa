//! Payload traits.

use crate::storage::StorageKey;

/// Anything the router hands to filters and handlers: a whole [`Update`]
/// or one of its payloads.
///
/// [`Update`]: crate::Update
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot be routed",
    label = "routed payloads must be `Send + Sync + 'static`",
    note = "payloads are shared between concurrently running filters"
)]
pub trait Message: Send + Sync + 'static {}

/// An update payload that handlers can be registered for.
///
/// Every payload knows which conversation it belongs to, which is how the
/// router binds the FSM accessor of a [`Context`](crate::Context).
pub trait Event: Message + Clone + std::fmt::Debug {
    /// The conversation key for this event, or `None` if the event carries no
    /// chat or user (such events get no FSM binding).
    fn fsm_key(&self) -> Option<StorageKey>;
}
