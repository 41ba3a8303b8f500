//! Domain building blocks for the pi digit service.
//!
//! Zero internal dependencies: the digit engine, job record types, the
//! lifecycle state machine and admission rules all live here so the API,
//! the store implementations and the worker share one definition.

pub mod admission;
pub mod error;
pub mod job;
pub mod spigot;
pub mod types;
