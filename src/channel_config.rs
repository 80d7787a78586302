//! Public, transport-agnostic channel configuration.
//!
//! This type intentionally contains no transport-specific concepts. The
//! sender a channel is built with is the only thing that knows how messages
//! travel.

use std::time::Duration;

/// Timeout applied by [`Channel::call`](crate::Channel::call) when none is given.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_millis(5_000);

/// How a channel chooses correlation ids for its outbound calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdPolicy {
    /// Plain per-channel counter.
    ///
    /// Safe whenever each direction of a link has its own logical channel,
    /// which is the normal setup.
    #[default]
    Monotonic,

    /// Per-channel counter that also jumps past every positive id seen on
    /// inbound messages.
    ///
    /// Needed only when several independent senders push calls into one
    /// shared numeric id space and their ids would otherwise collide. The
    /// counter never moves backwards.
    RebaseOnInbound,
}

/// Per-channel behavior switches.
///
/// Sub-channels inherit the configuration of the channel they are derived
/// from.
///
/// # Example
///
/// ```
/// use anyrpc::ChannelConfig;
/// use std::time::Duration;
///
/// let config = ChannelConfig::default()
///     .with_ignore_unhandled(true)
///     .with_default_timeout(Duration::from_secs(1));
/// assert!(!config.allow_handler_override);
/// ```
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    // ---
    /// Suppress the "Method not found" response for calls to unregistered
    /// methods; dispatch reports [`DispatchOutcome::Unhandled`](crate::DispatchOutcome::Unhandled)
    /// instead of sending anything.
    ///
    /// Default: false
    pub ignore_unhandled: bool,

    /// Let a second registration for a method replace the first instead of
    /// failing with [`RpcError::DuplicateHandler`](crate::RpcError::DuplicateHandler).
    ///
    /// Default: false
    pub allow_handler_override: bool,

    /// Timeout used by calls that don't specify one.
    ///
    /// Default: 5 seconds
    pub default_timeout: Duration,

    /// Correlation id allocation strategy.
    ///
    /// Default: [`IdPolicy::Monotonic`]
    pub id_policy: IdPolicy,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            ignore_unhandled: false,
            allow_handler_override: false,
            default_timeout: DEFAULT_CALL_TIMEOUT,
            id_policy: IdPolicy::Monotonic,
        }
    }
}

impl ChannelConfig {
    pub fn with_ignore_unhandled(mut self, ignore: bool) -> Self {
        self.ignore_unhandled = ignore;
        self
    }

    pub fn with_handler_override(mut self, allow: bool) -> Self {
        self.allow_handler_override = allow;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_id_policy(mut self, policy: IdPolicy) -> Self {
        self.id_policy = policy;
        self
    }
}
