//! Conversation state backends.
//!
//! - [`NoopStorage`]: accepts every write, always reads empty.
//! - [`MemoryStorage`]: concurrent in-process map with per-key atomic updates.
//! - [`ActorStorage`]: funnels every operation through one task, which owns an
//!   inner backend and applies requests in arrival order.

mod actor;
mod memory;
mod noop;

pub use actor::ActorStorage;
pub use memory::MemoryStorage;
pub use noop::NoopStorage;
