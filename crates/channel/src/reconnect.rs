//! Exponential-backoff (re)connection for the channel.
//!
//! [`reconnect_loop`] keeps attempting [`ChannelEndpoint::connect`] with
//! growing delays until a connection succeeds or the
//! [`CancellationToken`] fires. The same loop is used for the first
//! connect, so a client started before the server is reachable simply
//! waits in it.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::connection::{ChannelConnection, ChannelEndpoint};

/// Tunable parameters for the backoff strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor applied to the delay after each failure.
    pub multiplier: f64,
}

impl ReconnectConfig {
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            ..Default::default()
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// How long a connection must stay up before the backoff starts over.
pub const STABLE_CONNECTION: Duration = Duration::from_secs(30);

/// Stateful delay sequence derived from a [`ReconnectConfig`].
#[derive(Debug, Clone)]
pub struct Backoff {
    config: ReconnectConfig,
    current: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: ReconnectConfig) -> Self {
        let current = config.initial_delay.min(config.max_delay);
        Self {
            config,
            current,
            attempt: 0,
        }
    }

    /// Number of delays handed out since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Return the delay to wait now and advance the sequence.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        let grown_ms = (self.current.as_millis() as f64 * self.config.multiplier) as u64;
        self.current = Duration::from_millis(grown_ms).min(self.config.max_delay);
        self.attempt += 1;
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.config.initial_delay.min(self.config.max_delay);
        self.attempt = 0;
    }

    /// Account for a connection that has ended after `lasted`.
    ///
    /// Only a connection that stayed up for [`STABLE_CONNECTION`] restarts
    /// the sequence, so a server that accepts and immediately drops keeps
    /// backing off.
    pub fn record_connection(&mut self, lasted: Duration) {
        if lasted >= STABLE_CONNECTION {
            self.reset();
        }
    }
}

/// Connect to the channel, retrying with backoff.
///
/// The first attempt is immediate. Later delays continue from wherever
/// `backoff` stands. Returns `None` if `cancel` fires first.
pub async fn reconnect_loop(
    endpoint: &ChannelEndpoint,
    backoff: &mut Backoff,
    cancel: &CancellationToken,
) -> Option<ChannelConnection> {
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(url = endpoint.ws_url(), "Channel connect cancelled");
                return None;
            }
            result = endpoint.connect() => {
                match result {
                    Ok(conn) => {
                        if attempt > 1 {
                            tracing::info!(attempt, "Channel reconnected");
                        }
                        return Some(conn);
                    }
                    Err(e) => {
                        tracing::warn!(
                            url = endpoint.ws_url(),
                            error = %e,
                            "Channel connect attempt {attempt} failed",
                        );
                    }
                }
            }
        }

        let delay = backoff.next_delay();
        tracing::debug!(delay_ms = delay.as_millis() as u64, "Waiting before next channel attempt");

        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_then_clamp() {
        let mut backoff = Backoff::new(ReconnectConfig::default());
        let seen: Vec<u64> = (0..8).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(seen, vec![1, 2, 4, 8, 16, 30, 30, 30]);
        assert_eq!(backoff.attempt(), 8);
    }

    #[test]
    fn reset_restarts_sequence() {
        let mut backoff = Backoff::new(ReconnectConfig::default());
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn short_lived_connection_keeps_backing_off() {
        let mut backoff = Backoff::new(ReconnectConfig::default());
        backoff.next_delay();
        backoff.next_delay();

        backoff.record_connection(Duration::from_millis(200));
        assert_eq!(backoff.attempt(), 2);
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));
    }

    #[test]
    fn stable_connection_restarts_sequence() {
        let mut backoff = Backoff::new(ReconnectConfig::default());
        backoff.next_delay();
        backoff.next_delay();
        backoff.next_delay();

        backoff.record_connection(STABLE_CONNECTION);
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn initial_delay_above_max_is_clamped() {
        let config = ReconnectConfig::new(Duration::from_secs(60), Duration::from_secs(10));
        let mut backoff = Backoff::new(config);
        assert_eq!(backoff.next_delay(), Duration::from_secs(10));
    }

    #[test]
    fn custom_multiplier() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            multiplier: 3.0,
        };
        let mut backoff = Backoff::new(config);
        backoff.next_delay();
        assert_eq!(backoff.next_delay(), Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn cancelled_token_stops_loop() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let endpoint = ChannelEndpoint::new("ws://127.0.0.1:9", None);
        let mut backoff = Backoff::new(ReconnectConfig::default());
        let result = reconnect_loop(&endpoint, &mut backoff, &cancel).await;
        assert!(result.is_none());
        assert_eq!(backoff.attempt(), 0);
    }
}
