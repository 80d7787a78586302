//! Transport implementations.
//!
//! The engine only needs a [`Sender`](crate::Sender) and a host that pushes
//! inbound messages into a channel. This module ships the in-memory
//! reference for both halves.

mod memory;

pub use memory::{
    //
    memory_link,
    memory_loopback,
    memory_pair,
    spawn_inbound,
    MemoryPair,
    DEFAULT_CAPACITY,
};
