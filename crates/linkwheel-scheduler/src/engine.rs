use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{sleep, timeout, Duration};
use tracing::{error, info, warn};

use linkwheel_core::config::DeliveryConfig;
use linkwheel_rotation::RotationStore;
use linkwheel_transport::{Transport, TransportError};

use crate::{
    error::DispatchError, schedule::Schedule, target::DispatchTarget, types::TickOutcome,
};

/// Engine tuning, lifted from the delivery section of the config.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Message template; `{link}` and `{time}` are substituted per dispatch.
    pub template: String,
    /// Hard deadline on a single send attempt.
    pub send_timeout: Duration,
    /// Run one dispatch cycle right after startup.
    pub immediate: bool,
}

impl EngineConfig {
    pub fn from_delivery(config: &DeliveryConfig) -> Self {
        Self {
            template: config.template.clone(),
            send_timeout: Duration::from_secs(config.timeout),
            immediate: config.immediate,
        }
    }
}

/// Drives the dispatch cycle: sleep until the schedule fires, then check
/// the session, resolve the target, advance the rotation, and send with a
/// deadline.
///
/// The transport is injected and shared; the engine never owns the
/// connection lifecycle and reads the session state fresh at every tick.
/// Reconnects elsewhere never register a second trigger — the loop below
/// is the only one.
pub struct DispatchEngine {
    store: Arc<RotationStore>,
    transport: Arc<dyn Transport>,
    target: DispatchTarget,
    schedule: Schedule,
    config: EngineConfig,
}

impl DispatchEngine {
    pub fn new(
        store: Arc<RotationStore>,
        transport: Arc<dyn Transport>,
        target: DispatchTarget,
        schedule: Schedule,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            transport,
            target,
            schedule,
            config,
        }
    }

    /// Main event loop. Fires per the schedule until `shutdown` broadcasts
    /// `true`. Tick outcomes are logged, never propagated.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            schedule = %self.schedule,
            target = %self.target.describe(),
            "dispatch engine started"
        );

        if self.config.immediate {
            let outcome = self.run_tick().await;
            info!(outcome = outcome.label(), "startup dispatch finished");
        }

        loop {
            let now = Utc::now();
            let next = self.schedule.next_fire(now);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            info!(next_fire = %next, "next dispatch scheduled");

            tokio::select! {
                _ = sleep(wait) => {
                    let outcome = self.run_tick().await;
                    info!(outcome = outcome.label(), "dispatch tick finished");
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("dispatch engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One dispatch cycle. Each early exit is terminal for the tick; the
    /// cursor only moves once a link is actually selected, so everything
    /// from the send onward consumes that link.
    pub async fn run_tick(&self) -> TickOutcome {
        // Session state is read here, at tick time, not inferred from
        // whatever connection events happened in between.
        if !self.transport.is_connected() {
            warn!("transport disconnected at tick time, skipping dispatch");
            return TickOutcome::SkippedDisconnected;
        }

        let chat = match self.target.resolve(self.transport.as_ref()).await {
            Ok(chat) => chat,
            Err(DispatchError::TargetNotFound { name }) => {
                error!(group = %name, "target group not visible to the session");
                return TickOutcome::TargetNotFound { name };
            }
            Err(e) => {
                error!(error = %e, "target resolution failed");
                return TickOutcome::ResolveFailed {
                    reason: e.to_string(),
                };
            }
        };

        let selection = match self.store.next_link() {
            Ok(Some(selection)) => selection,
            Ok(None) => {
                warn!("link source is empty, nothing to dispatch");
                return TickOutcome::NoLinks;
            }
            Err(e) => {
                error!(error = %e, "rotation advance failed, no send attempted");
                return TickOutcome::RotationFailed {
                    reason: e.to_string(),
                };
            }
        };

        info!(
            link = %selection.link,
            position = selection.index + 1,
            of = selection.total,
            chat = %chat,
            "dispatching link"
        );

        let text = render_message(&self.config.template, &selection.link, &self.schedule.label());
        let send = self.transport.send_message(&chat, &text);
        match timeout(self.config.send_timeout, send).await {
            Ok(Ok(())) => {
                info!(link = %selection.link, chat = %chat, "link dispatched");
                TickOutcome::Sent {
                    link: selection.link,
                    chat,
                }
            }
            // the transport may enforce its own deadline; that still
            // classifies as a timeout, not a send failure
            Ok(Err(TransportError::Timeout { ms })) => {
                error!(timeout_ms = ms, "send timed out, link skipped");
                TickOutcome::SendTimeout { ms }
            }
            Ok(Err(e)) => {
                error!(error = %e, "send failed, link skipped");
                TickOutcome::SendFailed {
                    reason: e.to_string(),
                }
            }
            Err(_) => {
                let ms = self.config.send_timeout.as_millis() as u64;
                error!(timeout_ms = ms, "send timed out, link skipped");
                TickOutcome::SendTimeout { ms }
            }
        }
    }
}

// --- private helpers ---------------------------------------------------

/// Fill the `{link}` and `{time}` placeholders. Anything else in the
/// template passes through untouched.
fn render_message(template: &str, link: &str, time_label: &str) -> String {
    template.replace("{link}", link).replace("{time}", time_label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use linkwheel_transport::{Chat, ChatId, TransportEvent, TransportStatus};
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tokio::sync::broadcast;

    #[derive(Clone, Copy)]
    enum SendMode {
        Deliver,
        Reject,
        Hang,
        Expire,
    }

    struct ScriptedTransport {
        connected: AtomicBool,
        chats: Vec<Chat>,
        mode: Mutex<SendMode>,
        attempts: AtomicU32,
        sent: Mutex<Vec<(ChatId, String)>>,
        events: broadcast::Sender<TransportEvent>,
    }

    impl ScriptedTransport {
        fn connected_with(chats: Vec<Chat>) -> Arc<Self> {
            let (events, _) = broadcast::channel(4);
            Arc::new(Self {
                connected: AtomicBool::new(true),
                chats,
                mode: Mutex::new(SendMode::Deliver),
                attempts: AtomicU32::new(0),
                sent: Mutex::new(Vec::new()),
                events,
            })
        }

        fn set_mode(&self, mode: SendMode) {
            *self.mode.lock().unwrap() = mode;
        }

        fn set_connected(&self, connected: bool) {
            self.connected.store(connected, Ordering::SeqCst);
        }

        fn sent_texts(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|(_, text)| text.clone())
                .collect()
        }

        fn attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn connect(&self) -> Result<(), TransportError> {
            self.set_connected(true);
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            self.set_connected(false);
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
            Ok(self.chats.clone())
        }

        async fn send_message(&self, chat: &ChatId, text: &str) -> Result<(), TransportError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let mode = *self.mode.lock().unwrap();
            match mode {
                SendMode::Deliver => {
                    self.sent
                        .lock()
                        .unwrap()
                        .push((chat.clone(), text.to_string()));
                    Ok(())
                }
                SendMode::Reject => Err(TransportError::SendFailed(
                    "scripted rejection".to_string(),
                )),
                SendMode::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(())
                }
                SendMode::Expire => Err(TransportError::Timeout { ms: 25 }),
            }
        }

        fn events(&self) -> broadcast::Receiver<TransportEvent> {
            self.events.subscribe()
        }
    }

    fn group_chat() -> Chat {
        Chat {
            id: ChatId::from("123@g.us"),
            name: "Daily Links".to_string(),
            is_group: true,
        }
    }

    fn write_links(dir: &TempDir, content: &str) {
        std::fs::write(dir.path().join("link.txt"), content).unwrap();
    }

    fn cursor_value(dir: &TempDir) -> u64 {
        let raw = std::fs::read_to_string(dir.path().join("linkIndex.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        value["lastIndex"].as_u64().unwrap()
    }

    fn engine_in(dir: &TempDir, transport: Arc<ScriptedTransport>) -> DispatchEngine {
        let store = Arc::new(RotationStore::new(
            dir.path().join("link.txt"),
            dir.path().join("linkIndex.json"),
        ));
        DispatchEngine::new(
            store,
            transport,
            DispatchTarget::Group {
                name: "Daily Links".to_string(),
            },
            Schedule::Interval { every_secs: 60 },
            EngineConfig {
                template: "Link of the day: {link}".to_string(),
                send_timeout: Duration::from_millis(50),
                immediate: false,
            },
        )
    }

    #[tokio::test]
    async fn four_ticks_walk_the_rotation_and_wrap() {
        let dir = TempDir::new().unwrap();
        write_links(&dir, "A\nB\nC\n");
        let transport = ScriptedTransport::connected_with(vec![group_chat()]);
        let engine = engine_in(&dir, transport.clone());

        for _ in 0..4 {
            assert!(matches!(engine.run_tick().await, TickOutcome::Sent { .. }));
        }

        assert_eq!(
            transport.sent_texts(),
            vec![
                "Link of the day: A",
                "Link of the day: B",
                "Link of the day: C",
                "Link of the day: A",
            ]
        );
        assert_eq!(cursor_value(&dir), 1);
    }

    #[tokio::test]
    async fn disconnected_tick_sends_nothing_and_keeps_the_cursor() {
        let dir = TempDir::new().unwrap();
        write_links(&dir, "A\nB\n");
        let transport = ScriptedTransport::connected_with(vec![group_chat()]);
        transport.set_connected(false);
        let engine = engine_in(&dir, transport.clone());

        assert_eq!(engine.run_tick().await, TickOutcome::SkippedDisconnected);
        assert_eq!(transport.attempts(), 0);
        assert!(!dir.path().join("linkIndex.json").exists());
    }

    #[tokio::test]
    async fn missing_group_sends_nothing_and_keeps_the_cursor() {
        let dir = TempDir::new().unwrap();
        write_links(&dir, "A\nB\n");
        let transport = ScriptedTransport::connected_with(vec![Chat {
            id: ChatId::from("999@g.us"),
            name: "Other Group".to_string(),
            is_group: true,
        }]);
        let engine = engine_in(&dir, transport.clone());

        let outcome = engine.run_tick().await;
        assert_eq!(
            outcome,
            TickOutcome::TargetNotFound {
                name: "Daily Links".to_string(),
            }
        );
        assert_eq!(transport.attempts(), 0);
        assert!(!dir.path().join("linkIndex.json").exists());
    }

    #[tokio::test]
    async fn empty_source_is_a_no_links_tick() {
        let dir = TempDir::new().unwrap();
        write_links(&dir, "\n\n");
        let transport = ScriptedTransport::connected_with(vec![group_chat()]);
        let engine = engine_in(&dir, transport.clone());

        assert_eq!(engine.run_tick().await, TickOutcome::NoLinks);
        assert_eq!(transport.attempts(), 0);
        assert!(!dir.path().join("linkIndex.json").exists());
    }

    #[tokio::test]
    async fn rejected_send_consumes_the_link() {
        let dir = TempDir::new().unwrap();
        write_links(&dir, "A\nB\n");
        let transport = ScriptedTransport::connected_with(vec![group_chat()]);
        let engine = engine_in(&dir, transport.clone());

        transport.set_mode(SendMode::Reject);
        assert!(matches!(
            engine.run_tick().await,
            TickOutcome::SendFailed { .. }
        ));
        assert_eq!(transport.attempts(), 1);
        assert_eq!(cursor_value(&dir), 1);

        transport.set_mode(SendMode::Deliver);
        assert!(matches!(engine.run_tick().await, TickOutcome::Sent { .. }));
        assert_eq!(transport.sent_texts(), vec!["Link of the day: B"]);
    }

    #[tokio::test]
    async fn timed_out_send_consumes_the_link() {
        let dir = TempDir::new().unwrap();
        write_links(&dir, "A\nB\n");
        let transport = ScriptedTransport::connected_with(vec![group_chat()]);
        let engine = engine_in(&dir, transport.clone());

        transport.set_mode(SendMode::Hang);
        assert_eq!(engine.run_tick().await, TickOutcome::SendTimeout { ms: 50 });
        // exactly one attempt, no in-tick retry
        assert_eq!(transport.attempts(), 1);
        assert_eq!(cursor_value(&dir), 1);

        transport.set_mode(SendMode::Deliver);
        assert!(matches!(engine.run_tick().await, TickOutcome::Sent { .. }));
        assert_eq!(transport.sent_texts(), vec!["Link of the day: B"]);
        assert_eq!(transport.attempts(), 2);
    }

    #[tokio::test]
    async fn transport_reported_timeout_counts_as_a_timeout() {
        let dir = TempDir::new().unwrap();
        write_links(&dir, "A\nB\n");
        let transport = ScriptedTransport::connected_with(vec![group_chat()]);
        let engine = engine_in(&dir, transport.clone());

        transport.set_mode(SendMode::Expire);
        assert_eq!(engine.run_tick().await, TickOutcome::SendTimeout { ms: 25 });
        assert_eq!(transport.attempts(), 1);
        assert_eq!(cursor_value(&dir), 1);
    }

    #[tokio::test]
    async fn immediate_dispatch_fires_once_at_startup() {
        let dir = TempDir::new().unwrap();
        write_links(&dir, "A\nB\n");
        let transport = ScriptedTransport::connected_with(vec![group_chat()]);
        let store = Arc::new(RotationStore::new(
            dir.path().join("link.txt"),
            dir.path().join("linkIndex.json"),
        ));
        let engine = DispatchEngine::new(
            store,
            transport.clone(),
            DispatchTarget::Group {
                name: "Daily Links".to_string(),
            },
            Schedule::Interval { every_secs: 3600 },
            EngineConfig {
                template: "Link of the day: {link}".to_string(),
                send_timeout: Duration::from_millis(50),
                immediate: true,
            },
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(engine.run(shutdown_rx));

        for _ in 0..100 {
            if transport.attempts() == 1 {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(transport.sent_texts(), vec!["Link of the day: A"]);
        assert_eq!(cursor_value(&dir), 1);

        shutdown_tx.send(true).unwrap();
        timeout(Duration::from_secs(2), handle)
            .await
            .expect("engine should stop on shutdown")
            .unwrap();

        // the first interval fire is an hour out; the startup dispatch
        // was the only one
        assert_eq!(transport.attempts(), 1);
    }

    #[tokio::test]
    async fn sends_go_to_the_resolved_group_chat() {
        let dir = TempDir::new().unwrap();
        write_links(&dir, "A\n");
        let transport = ScriptedTransport::connected_with(vec![group_chat()]);
        let engine = engine_in(&dir, transport.clone());

        let outcome = engine.run_tick().await;
        assert_eq!(
            outcome,
            TickOutcome::Sent {
                link: "A".to_string(),
                chat: ChatId::from("123@g.us"),
            }
        );
        let sent = transport.sent.lock().unwrap().clone();
        assert_eq!(sent[0].0.as_str(), "123@g.us");
    }

    #[test]
    fn render_fills_link_and_time() {
        assert_eq!(
            render_message("{time}: {link}", "https://x", "09:00 UTC"),
            "09:00 UTC: https://x"
        );
        assert_eq!(render_message("no placeholders", "x", "y"), "no placeholders");
        assert_eq!(render_message("{link} and {link}", "x", "y"), "x and x");
    }
}
