//! # courier-std
//!
//! Standard implementations for the Courier update-dispatch framework.
//!
//! This crate provides:
//! - **Evaluation engine**: [`engine::HandlerEntry`], [`engine::HandlerChain`]
//! - **Routing**: [`kind`] category markers, [`kind::HandlerTable`], [`router::UpdateRouter`]
//! - **Conversation state**: [`storage`] backends (no-op, concurrent map, single-task actor)
//! - **Standard filters**: [`filters`]
//! - **Ingestion**: [`ingest`] lifecycle controllers for polling and webhook
//! - **Shutdown**: [`shutdown::drain`]
//! - **Testing**: [`testing`] doubles and sample updates

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

// Re-export core traits
pub use courier_core;

// Modules
pub mod config;
pub mod engine;
pub mod filters;
pub mod ingest;
pub mod kind;
pub mod router;
pub mod shutdown;
pub mod storage;
pub mod testing;
