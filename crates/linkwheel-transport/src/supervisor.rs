use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::time::{interval, sleep_until, Duration, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::{error::TransportError, transport::Transport, types::TransportEvent};

/// Minimum delay between reconnect attempts (seconds).
const BACKOFF_BASE_SECS: u64 = 5;
/// Maximum delay between reconnect attempts (seconds).
const BACKOFF_MAX_SECS: u64 = 300; // 5 minutes
/// Reconnect attempts per episode before waiting for the next probe.
const MAX_ATTEMPTS: u32 = 10;
/// Jitter fraction applied to each delay (±10 %).
const JITTER_FRACTION: f64 = 0.10;

/// Retry pacing for one reconnect episode.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(BACKOFF_BASE_SECS),
            max: Duration::from_secs(BACKOFF_MAX_SECS),
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

/// Supervisor tuning, derived from the bridge section of the config.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// How often the session is re-checked outside reconnect episodes.
    pub probe_interval: Duration,
    /// Where to export the latest QR payload, if anywhere.
    pub qr_path: Option<PathBuf>,
    pub backoff: BackoffPolicy,
}

/// Own the transport's connection lifecycle.
///
/// One connect episode at startup, then: reconnect on `Disconnected`
/// events, export QR payloads for pairing, and re-probe the session on a
/// timer so a silently dropped session is noticed. The dispatch schedule
/// is never touched from here — ticks read the session state themselves.
pub async fn run(
    transport: Arc<dyn Transport>,
    config: SupervisorConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut events = transport.events();
    let qr_path = config.qr_path.as_deref();

    if let Err(e) = connect_with_backoff(transport.as_ref(), &config.backoff, qr_path).await {
        error!(
            transport = transport.name(),
            error = %e,
            "initial connect failed, will keep probing"
        );
    }

    let mut probe = interval(config.probe_interval);
    probe.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // the first tick completes immediately; consume it so probes run on
    // the configured cadence
    probe.tick().await;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(TransportEvent::Qr { code }) => export_qr(&code, qr_path).await,
                Ok(TransportEvent::Disconnected { reason }) => {
                    warn!(transport = transport.name(), %reason, "session dropped, reconnecting");
                    if let Err(e) =
                        connect_with_backoff(transport.as_ref(), &config.backoff, qr_path).await
                    {
                        error!(
                            transport = transport.name(),
                            error = %e,
                            "reconnect failed, will retry on next probe"
                        );
                    }
                }
                Ok(TransportEvent::Ready) => {
                    info!(transport = transport.name(), "session established");
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "transport event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = probe.tick() => {
                if transport.is_connected() {
                    // refresh the snapshot; a dropped session surfaces as an event
                    if let Err(e) = transport.connect().await {
                        warn!(transport = transport.name(), error = %e, "session probe failed");
                    }
                } else if let Err(e) =
                    connect_with_backoff(transport.as_ref(), &config.backoff, qr_path).await
                {
                    error!(
                        transport = transport.name(),
                        error = %e,
                        "reconnect failed, will retry on next probe"
                    );
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("transport supervisor shutting down");
                    break;
                }
            }
        }
    }
}

/// Attempt to establish the session with exponential backoff and ±10 % jitter.
///
/// Schedule: 5 s → 10 s → 20 s → … → 300 s (cap), up to `max_attempts`
/// tries. QR payloads published while waiting are exported immediately so
/// pairing is never delayed by the retry pacing.
pub async fn connect_with_backoff(
    transport: &dyn Transport,
    policy: &BackoffPolicy,
    qr_path: Option<&Path>,
) -> Result<(), TransportError> {
    let mut events = transport.events();
    let mut delay = policy.base;
    // a zero policy still makes one try
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match transport.connect().await {
            Ok(()) => {
                info!(transport = transport.name(), attempt, "transport connected");
                return Ok(());
            }
            Err(e) if attempt == max_attempts => {
                return Err(e);
            }
            Err(e) => {
                let total = delay + jitter(delay);
                warn!(
                    transport = transport.name(),
                    attempt,
                    max = max_attempts,
                    error = %e,
                    retry_after_secs = total.as_secs(),
                    "transport connect failed, retrying with backoff"
                );

                let deadline = Instant::now() + total;
                loop {
                    tokio::select! {
                        _ = sleep_until(deadline) => break,
                        event = events.recv() => match event {
                            Ok(TransportEvent::Qr { code }) => export_qr(&code, qr_path).await,
                            Ok(_) => {}
                            Err(broadcast::error::RecvError::Lagged(_)) => {}
                            Err(broadcast::error::RecvError::Closed) => {
                                sleep_until(deadline).await;
                                break;
                            }
                        }
                    }
                }
                delay = (delay * 2).min(policy.max);
            }
        }
    }

    // Unreachable — the loop always returns inside the match arms above.
    unreachable!("backoff loop exited without returning")
}

/// Write the QR payload where the operator asked for it.
async fn export_qr(code: &str, path: Option<&Path>) {
    let Some(path) = path else { return };
    match tokio::fs::write(path, code).await {
        Ok(()) => info!(path = %path.display(), "QR payload exported for pairing"),
        Err(e) => warn!(path = %path.display(), error = %e, "failed to export QR payload"),
    }
}

/// Return a jitter offset (0 … `JITTER_FRACTION * base`).
///
/// Uses a simple deterministic pseudo-random value derived from the current
/// timestamp, avoiding a rand dependency.
fn jitter(base: Duration) -> Duration {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);

    let max_jitter = (base.as_secs_f64() * JITTER_FRACTION) as u64;
    if max_jitter == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs((nanos as u64) % max_jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chat, ChatId, TransportStatus};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    struct FlakyTransport {
        fail_first: u32,
        attempts: AtomicU32,
        connected: AtomicBool,
        events: broadcast::Sender<TransportEvent>,
    }

    impl FlakyTransport {
        fn failing(fail_first: u32) -> Self {
            let (events, _) = broadcast::channel(8);
            Self {
                fail_first,
                attempts: AtomicU32::new(0),
                connected: AtomicBool::new(false),
                events,
            }
        }

        fn attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn connect(&self) -> Result<(), TransportError> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.fail_first {
                return Err(TransportError::ConnectionFailed(format!("attempt {n}")));
            }
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            self.connected.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn status(&self) -> TransportStatus {
            if self.connected.load(Ordering::SeqCst) {
                TransportStatus::Connected
            } else {
                TransportStatus::Disconnected
            }
        }

        async fn list_chats(&self) -> Result<Vec<Chat>, TransportError> {
            Ok(Vec::new())
        }

        async fn send_message(&self, _chat: &ChatId, _text: &str) -> Result<(), TransportError> {
            Ok(())
        }

        fn events(&self) -> broadcast::Receiver<TransportEvent> {
            self.events.subscribe()
        }
    }

    fn fast_policy(max_attempts: u32) -> BackoffPolicy {
        BackoffPolicy {
            base: Duration::from_millis(1),
            max: Duration::from_millis(4),
            max_attempts,
        }
    }

    #[tokio::test]
    async fn backoff_retries_until_connected() {
        let transport = FlakyTransport::failing(3);
        connect_with_backoff(&transport, &fast_policy(5), None)
            .await
            .unwrap();
        assert_eq!(transport.attempts(), 4);
        assert!(transport.is_connected());
    }

    #[tokio::test]
    async fn backoff_gives_up_after_max_attempts() {
        let transport = FlakyTransport::failing(u32::MAX);
        let result = connect_with_backoff(&transport, &fast_policy(3), None).await;
        assert!(result.is_err());
        assert_eq!(transport.attempts(), 3);
    }

    #[tokio::test]
    async fn zero_max_attempts_still_tries_once() {
        let transport = FlakyTransport::failing(u32::MAX);
        let result = connect_with_backoff(&transport, &fast_policy(0), None).await;
        assert!(result.is_err());
        assert_eq!(transport.attempts(), 1);
    }

    #[test]
    fn jitter_stays_under_the_fraction() {
        let base = Duration::from_secs(300);
        for _ in 0..50 {
            assert!(jitter(base) < Duration::from_secs(30));
        }
    }
}
