//! Channel role enumeration.
//!
//! Defines whether a [`Channel`](crate::Channel) owns its handler registry
//! or borrows one from the channel it was derived from.

/// Position of a channel in its hierarchy.
///
/// The role determines which operations are valid:
/// - [`Root`](ChannelRole::Root): owns the registry; may register, remove and dispatch
/// - [`Sub`](ChannelRole::Sub): shares an ancestor's registry; may only dispatch
///
/// Both roles issue calls through their own sender and correlation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRole {
    /// Created directly with a sender.
    ///
    /// Allows: `set_handler()`, `set_forward()`, `remove_handler()`
    Root,

    /// Created by `derive_sub_channel()`.
    ///
    /// Forbids: `set_handler()`, `set_forward()`, `remove_handler()`
    Sub,
}
