//! Event channel lifecycle state machine.
//!
//! Owns the decision of when the single bidirectional channel should be open.
//! Uses the action pattern: methods take time as input and return actions for
//! the driver to execute, so the reconnection policy is testable without a
//! clock.
//!
//! # State Machine
//!
//! ```text
//! ┌──────────────┐ connect  ┌────────────┐  opened   ┌───────────┐
//! │ Disconnected │─────────>│ Connecting │──────────>│ Connected │
//! └──────────────┘          └────────────┘           └───────────┘
//!        ↑  ↑    retry due        │  failed                │ closed
//!        │  └─────────────────────┘                        │
//!        └─────────────────────────────────────────────────┘
//! ```
//!
//! Disconnecting never clears room or message state; that is the caller's
//! responsibility.

use std::{ops::Add, time::Duration};

use roomsync_core::Identity;

use crate::error::ConnectionError;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Channel is closed.
    Disconnected,
    /// Channel open requested, not yet established.
    Connecting,
    /// Channel established.
    Connected,
}

/// Actions returned by the connection state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Open the channel with this bearer token.
    Open {
        /// Session token.
        token: String,
    },
    /// Close the channel.
    Close,
}

/// Policy applied when the channel closes without the caller asking for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconnectPolicy {
    /// Stay disconnected until `connect` is invoked again.
    #[default]
    Never,
    /// Retry with a doubling delay.
    Backoff {
        /// Delay before the first retry.
        initial: Duration,
        /// Upper bound on the delay.
        max: Duration,
        /// Retries before giving up. Reset once a connection succeeds.
        max_attempts: u32,
    },
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (0-based). `None` if the policy
    /// gives up.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        match *self {
            Self::Never => None,
            Self::Backoff { initial, max, max_attempts } => {
                if attempt >= max_attempts {
                    return None;
                }
                let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
                Some(initial.saturating_mul(factor).min(max))
            },
        }
    }
}

/// Channel lifecycle state machine.
///
/// Generic over `Instant` to support both real time and virtual time for
/// deterministic testing.
#[derive(Debug, Clone)]
pub struct ConnectionManager<I = std::time::Instant> {
    state: ConnectionState,
    policy: ReconnectPolicy,
    /// Token of the last successful `connect`, reused for retries.
    token: Option<String>,
    /// Caller wants the channel open. Cleared by `disconnect`.
    wanted: bool,
    /// Consecutive failed attempts since the last successful open.
    attempts: u32,
    /// When the next retry is due. `None` if none scheduled.
    retry_at: Option<I>,
}

impl<I> ConnectionManager<I>
where
    I: Copy + Ord + Add<Duration, Output = I>,
{
    /// Create a disconnected manager with the given reconnection policy.
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            policy,
            token: None,
            wanted: false,
            attempts: 0,
            retry_at: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Channel is established.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// When the next reconnect attempt is due. `None` if none scheduled.
    pub fn retry_at(&self) -> Option<I> {
        self.retry_at
    }

    /// Request the channel to be opened.
    ///
    /// No-op while already connecting or connected.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::NotAuthenticated` if the identity is not
    ///   authenticated or carries no token
    pub fn connect(&mut self, identity: &Identity) -> Result<Vec<ConnectionAction>, ConnectionError> {
        let token = match (&identity.token, identity.is_authenticated()) {
            (Some(token), true) => token.clone(),
            _ => return Err(ConnectionError::NotAuthenticated),
        };

        self.token = Some(token.clone());
        self.wanted = true;
        self.retry_at = None;

        if self.state != ConnectionState::Disconnected {
            return Ok(vec![]);
        }

        self.state = ConnectionState::Connecting;
        tracing::debug!("opening event channel");
        Ok(vec![ConnectionAction::Open { token }])
    }

    /// Tear the channel down. Cancels any scheduled reconnect.
    pub fn disconnect(&mut self) -> Vec<ConnectionAction> {
        self.wanted = false;
        self.retry_at = None;
        self.attempts = 0;

        if self.state == ConnectionState::Disconnected {
            return vec![];
        }

        self.state = ConnectionState::Disconnected;
        tracing::debug!("closing event channel");
        vec![ConnectionAction::Close]
    }

    /// The channel was established.
    pub fn handle_opened(&mut self) {
        if self.state != ConnectionState::Connecting {
            tracing::warn!(state = ?self.state, "channel opened in unexpected state");
        }
        self.state = ConnectionState::Connected;
        self.attempts = 0;
        self.retry_at = None;
        tracing::info!("event channel connected");
    }

    /// The channel closed or failed to open.
    ///
    /// Schedules a retry if the caller still wants a connection and the
    /// policy allows another attempt. Returns the failure to report, `None`
    /// for the close of a channel the caller already tore down.
    pub fn handle_closed(&mut self, now: I, reason: &str) -> Option<ConnectionError> {
        if self.state == ConnectionState::Disconnected && !self.wanted {
            return None;
        }

        self.state = ConnectionState::Disconnected;
        tracing::warn!(%reason, "event channel closed");
        let error = ConnectionError::Transport(reason.to_string());

        if !self.wanted {
            return Some(error);
        }

        match self.policy.delay(self.attempts) {
            Some(delay) => {
                self.attempts += 1;
                self.retry_at = Some(now + delay);
                tracing::info!(attempt = self.attempts, ?delay, "reconnect scheduled");
            },
            None => {
                self.retry_at = None;
                tracing::info!("not reconnecting, caller must connect again");
            },
        }
        Some(error)
    }

    /// Drive time forward. Returns an `Open` action when a retry is due.
    pub fn handle_tick(&mut self, now: I) -> Vec<ConnectionAction> {
        let due = self.retry_at.is_some_and(|at| now >= at);
        if !due || self.state != ConnectionState::Disconnected {
            return vec![];
        }

        self.retry_at = None;
        match &self.token {
            Some(token) => {
                self.state = ConnectionState::Connecting;
                vec![ConnectionAction::Open { token: token.clone() }]
            },
            None => vec![],
        }
    }
}
