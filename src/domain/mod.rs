//! Domain layer public interface.
//!
//! This module defines domain-level abstractions that are independent of
//! transport implementations or infrastructure concerns.
//!
//! All domain consumers must import symbols via this module, not by
//! referencing individual files directly.

mod sender;

// --- Sender domain re-exports ---

pub use sender::{
    //
    sender_fn,
    FnSender,
    Sender,
    SenderPtr,
};
