//! Channel builder.
//!
//! Provides a fluent builder API for configuring root channel instances.

use crate::{Channel, ChannelConfig, IdPolicy, SenderPtr};
use std::time::Duration;

/// Builder for root channels.
///
/// Accepts the outbound sender and lets each behavior switch be set
/// individually; anything left unset takes the [`ChannelConfig`] default.
///
/// # Examples
///
/// ## Peer-facing channel that stays quiet about unknown methods
/// ```
/// use anyrpc::{sender_fn, ChannelBuilder};
/// use std::time::Duration;
///
/// let channel = ChannelBuilder::new(sender_fn(|_msg| async { Ok(()) }))
///     .ignore_unhandled(true)
///     .default_timeout(Duration::from_millis(500))
///     .build();
/// assert!(channel.config().ignore_unhandled);
/// ```
///
/// ## Shared id space with another sender
/// ```
/// use anyrpc::{sender_fn, ChannelBuilder, IdPolicy};
///
/// let channel = ChannelBuilder::new(sender_fn(|_msg| async { Ok(()) }))
///     .id_policy(IdPolicy::RebaseOnInbound)
///     .build();
/// ```
pub struct ChannelBuilder {
    // ---
    sender: SenderPtr,

    ignore_unhandled: Option<bool>,
    allow_handler_override: Option<bool>,
    default_timeout: Option<Duration>,
    id_policy: Option<IdPolicy>,
}

impl ChannelBuilder {
    /// Create a new channel builder around the outbound sender.
    pub fn new(sender: SenderPtr) -> Self {
        // ---
        Self {
            sender,
            ignore_unhandled: None,
            allow_handler_override: None,
            default_timeout: None,
            id_policy: None,
        }
    }

    /// Don't answer calls to unregistered methods.
    ///
    /// Default: false.
    pub fn ignore_unhandled(mut self, ignore: bool) -> Self {
        self.ignore_unhandled = Some(ignore);
        self
    }

    /// Let a later registration replace an existing handler.
    ///
    /// Default: false.
    pub fn allow_handler_override(mut self, allow: bool) -> Self {
        self.allow_handler_override = Some(allow);
        self
    }

    /// Timeout for calls that don't pass one explicitly.
    ///
    /// Default: 5s.
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Correlation id allocation strategy.
    ///
    /// Default: [`IdPolicy::Monotonic`].
    pub fn id_policy(mut self, policy: IdPolicy) -> Self {
        self.id_policy = Some(policy);
        self
    }

    /// Build the root channel (consumes self).
    pub fn build(self) -> Channel {
        // ---
        let defaults = ChannelConfig::default();

        let config = ChannelConfig {
            ignore_unhandled: self.ignore_unhandled.unwrap_or(defaults.ignore_unhandled),
            allow_handler_override: self
                .allow_handler_override
                .unwrap_or(defaults.allow_handler_override),
            default_timeout: self.default_timeout.unwrap_or(defaults.default_timeout),
            id_policy: self.id_policy.unwrap_or(defaults.id_policy),
        };

        Channel::with_config(self.sender, config)
    }
}
