//! Stream-preparation state machine.
//!
//! `Created -> Polling -> {Ready | Failed | TimedOut}`.  One live session per
//! orchestrator: starting a new one cancels the previous session's token and
//! bumps the generation before the new session touches the network.  Every
//! transition is published under the orchestrator lock, and only if the
//! session is still the current generation, so a superseded loop can never
//! overwrite its successor's state.

use std::sync::Arc;

use media_proto::config::PollingConfig;
use media_proto::model::PreparationStatus;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::StreamApi;
use crate::error::SessionError;
use crate::player::PlayerAdapter;

const CREATION_FAILED: &str = "creation failed";
const DEFAULT_STREAM_ERROR: &str = "stream error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Polling,
    Ready,
    Failed,
    TimedOut,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Failed | Self::TimedOut)
    }
}

/// How a terminal session should be surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    pub media_id: String,
    pub stream_id: Option<String>,
    pub state: SessionState,
    /// Status polls issued so far.
    pub attempts: u32,
    pub error_message: Option<String>,
    /// Set when the stream was ready but the player could not take it.
    pub player_error: Option<String>,
}

impl PlaybackSession {
    fn new(media_id: &str) -> Self {
        Self {
            media_id: media_id.to_string(),
            stream_id: None,
            state: SessionState::Created,
            attempts: 0,
            error_message: None,
            player_error: None,
        }
    }

    pub fn error(&self) -> Option<SessionError> {
        match self.state {
            SessionState::Failed if self.stream_id.is_none() => Some(SessionError::CreationFailed),
            SessionState::Failed => Some(SessionError::Preparation {
                message: self
                    .error_message
                    .clone()
                    .unwrap_or_else(|| DEFAULT_STREAM_ERROR.to_string()),
            }),
            SessionState::TimedOut => Some(SessionError::PreparationTimeout),
            _ => None,
        }
    }

    pub fn severity(&self) -> Option<Severity> {
        match self.state {
            SessionState::Failed => Some(Severity::Error),
            SessionState::TimedOut => Some(Severity::Warning),
            _ => None,
        }
    }

    fn fail(&mut self, message: impl Into<String>) {
        self.state = SessionState::Failed;
        self.error_message = Some(message.into());
    }
}

/// A published transition, tagged with the session's generation.
#[derive(Debug, Clone)]
pub struct SessionUpdate {
    pub generation: u64,
    pub session: PlaybackSession,
}

pub struct SessionHandle {
    generation: u64,
    updates: watch::Receiver<PlaybackSession>,
    task: JoinHandle<Option<PlaybackSession>>,
}

impl SessionHandle {
    /// Latest published state of this session.
    pub fn current(&self) -> PlaybackSession {
        self.updates.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<PlaybackSession> {
        self.updates.clone()
    }

    /// Terminal state, or `None` if the session was superseded or stopped
    /// before reaching one.
    pub async fn wait_terminal(self) -> Option<PlaybackSession> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => {
                warn!("session: task for generation {} ended abnormally: {}", self.generation, e);
                None
            }
        }
    }
}

struct Active {
    generation: u64,
    token: CancellationToken,
    stream_id: Option<String>,
    tx: watch::Sender<PlaybackSession>,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    active: Option<Active>,
}

struct Inner {
    api: Arc<dyn StreamApi>,
    player: Option<Arc<Mutex<PlayerAdapter>>>,
    polling: PollingConfig,
    slot: Mutex<Slot>,
    updates: broadcast::Sender<SessionUpdate>,
}

#[derive(Clone)]
pub struct SessionOrchestrator {
    inner: Arc<Inner>,
}

impl SessionOrchestrator {
    pub fn new(
        api: Arc<dyn StreamApi>,
        player: Option<Arc<Mutex<PlayerAdapter>>>,
        polling: PollingConfig,
    ) -> Self {
        let (updates, _) = broadcast::channel(128);
        Self {
            inner: Arc::new(Inner {
                api,
                player,
                polling,
                slot: Mutex::new(Slot::default()),
                updates,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.inner.updates.subscribe()
    }

    /// The live session's latest state, if any.
    pub async fn current(&self) -> Option<PlaybackSession> {
        let slot = self.inner.slot.lock().await;
        slot.active.as_ref().map(|a| a.tx.borrow().clone())
    }

    /// Supersede any in-flight session and start preparing `media_id`.
    pub async fn start_playback(&self, media_id: &str) -> SessionHandle {
        let session = PlaybackSession::new(media_id);
        let token = CancellationToken::new();
        let (tx, rx) = watch::channel(session.clone());

        let generation = {
            let mut slot = self.inner.slot.lock().await;
            if let Some(previous) = slot.active.take() {
                debug!("session: generation {} superseded", previous.generation);
                previous.token.cancel();
            }
            slot.generation += 1;
            let generation = slot.generation;
            slot.active = Some(Active {
                generation,
                token: token.clone(),
                stream_id: None,
                tx,
            });
            let _ = self.inner.updates.send(SessionUpdate {
                generation,
                session: session.clone(),
            });
            generation
        };

        info!("session: starting generation {} for media {}", generation, media_id);
        let inner = self.inner.clone();
        let task = tokio::spawn(async move { inner.run(generation, token, session).await });

        SessionHandle {
            generation,
            updates: rx,
            task,
        }
    }

    /// Cancel the live session, stop the player, and ask the server to drop
    /// the stream.  Server errors are logged only.
    pub async fn stop_playback(&self) {
        let active = self.inner.slot.lock().await.active.take();
        let Some(active) = active else {
            debug!("session: stop requested with no live session");
            return;
        };
        active.token.cancel();
        info!("session: stopped generation {}", active.generation);

        if let Some(player) = &self.inner.player {
            if let Err(e) = player.lock().await.stop().await {
                warn!("session: player stop failed: {}", e);
            }
        }

        if let Some(stream_id) = active.stream_id {
            match self.inner.api.stop_stream(&stream_id).await {
                Ok(ack) if ack.success => debug!("session: server stopped {}", stream_id),
                Ok(_) => warn!("session: server refused to stop {}", stream_id),
                Err(e) => warn!("session: stop request for {} failed: {}", stream_id, e),
            }
        }
    }
}

impl Inner {
    async fn run(
        self: Arc<Self>,
        generation: u64,
        token: CancellationToken,
        mut session: PlaybackSession,
    ) -> Option<PlaybackSession> {
        let created = tokio::select! {
            _ = token.cancelled() => return None,
            r = self.api.create_stream(&session.media_id) => r,
        };
        let stream_id = match created {
            Ok(ack) if ack.success => ack.stream_id,
            Ok(ack) => {
                warn!(
                    "session: server refused stream for {}: {}",
                    session.media_id,
                    ack.error.as_deref().unwrap_or("no reason given")
                );
                None
            }
            Err(e) => {
                warn!("session: create_stream for {} failed: {}", session.media_id, e);
                None
            }
        };

        let Some(stream_id) = stream_id else {
            session.fail(CREATION_FAILED);
            return self.publish(generation, &token, &session).await.then_some(session);
        };

        session.stream_id = Some(stream_id.clone());
        session.state = SessionState::Polling;
        if !self.publish(generation, &token, &session).await {
            return None;
        }

        let interval = self.polling.poll_interval();
        while session.attempts < self.polling.max_attempts {
            tokio::select! {
                _ = token.cancelled() => return None,
                _ = tokio::time::sleep(interval) => {}
            }
            let status = tokio::select! {
                _ = token.cancelled() => return None,
                r = self.api.stream_status(&stream_id) => r,
            };
            session.attempts += 1;

            match status {
                Ok(status) => match status.status() {
                    PreparationStatus::Ready => {
                        session.state = SessionState::Ready;
                        if !self.publish(generation, &token, &session).await {
                            return None;
                        }
                        return self
                            .hand_off(generation, &token, &mut session)
                            .await
                            .then_some(session);
                    }
                    PreparationStatus::Error => {
                        let message = status
                            .error_message
                            .filter(|m| !m.trim().is_empty())
                            .unwrap_or_else(|| DEFAULT_STREAM_ERROR.to_string());
                        session.fail(message);
                        return self.publish(generation, &token, &session).await.then_some(session);
                    }
                    other => {
                        debug!(
                            "session: {} is {:?} (attempt {}/{}, {:.0}%)",
                            stream_id, other, session.attempts, self.polling.max_attempts,
                            status.progress
                        );
                        if !self.publish(generation, &token, &session).await {
                            return None;
                        }
                    }
                },
                Err(e) => {
                    session.fail(format!("status check failed: {}", e));
                    return self.publish(generation, &token, &session).await.then_some(session);
                }
            }
        }

        session.state = SessionState::TimedOut;
        if !self.publish(generation, &token, &session).await {
            return None;
        }
        if self.polling.handoff_on_timeout {
            info!("session: {} still preparing, opening player anyway", stream_id);
            return self
                .hand_off(generation, &token, &mut session)
                .await
                .then_some(session);
        }
        Some(session)
    }

    /// Publish `session` if this generation is still live.  Returns false for
    /// a superseded session, which must then stop without side effects.
    async fn publish(
        &self,
        generation: u64,
        token: &CancellationToken,
        session: &PlaybackSession,
    ) -> bool {
        let mut slot = self.slot.lock().await;
        let Some(active) = slot
            .active
            .as_mut()
            .filter(|a| a.generation == generation && !token.is_cancelled())
        else {
            debug!("session: dropping stale update from generation {}", generation);
            return false;
        };

        active.stream_id = session.stream_id.clone();
        active.tx.send_replace(session.clone());
        let _ = self.updates.send(SessionUpdate {
            generation,
            session: session.clone(),
        });

        match session.severity() {
            Some(Severity::Error) => warn!(
                "session: {} failed: {}",
                session.media_id,
                session.error_message.as_deref().unwrap_or(DEFAULT_STREAM_ERROR)
            ),
            Some(Severity::Warning) => warn!(
                "session: {} timed out after {} attempts",
                session.media_id, session.attempts
            ),
            None => debug!("session: {} -> {:?}", session.media_id, session.state),
        }
        true
    }

    /// Load the session's stream into the player.  A load failure is recorded
    /// in `player_error` and published; returns false only when the session
    /// was superseded.
    async fn hand_off(
        &self,
        generation: u64,
        token: &CancellationToken,
        session: &mut PlaybackSession,
    ) -> bool {
        let (Some(player), Some(stream_id)) = (&self.player, session.stream_id.clone()) else {
            return true;
        };
        let loaded = {
            let mut player = player.lock().await;
            if token.is_cancelled() {
                debug!("session: generation {} superseded before hand-off", generation);
                return false;
            }
            player.try_load(&stream_id).await
        };
        match loaded {
            Ok(path) => {
                info!("session: {} handed to player via {:?} path", stream_id, path);
                true
            }
            Err(e) => {
                error!("session: player could not load {}: {}", stream_id, e);
                session.player_error = Some(e.to_string());
                self.publish(generation, token, session).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::player::tests::FakeElement;
    use crate::player::PlayerOptions;
    use async_trait::async_trait;
    use media_proto::model::{CreateStreamAck, StopStreamAck, StreamStatus};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    type Responder = Box<dyn Fn(&str, u32) -> Result<StreamStatus, TransportError> + Send + Sync>;

    struct FakeStreams {
        create_ok: bool,
        respond: Responder,
        polls: AtomicU32,
        per_stream: std::sync::Mutex<HashMap<String, u32>>,
        stops: std::sync::Mutex<Vec<String>>,
        /// Media ids whose create call blocks until notified.
        gate: Option<(&'static str, Arc<Notify>)>,
        /// Delay the response to one stream's n-th poll.
        slow_poll: Option<(&'static str, u32, Duration)>,
    }

    impl FakeStreams {
        fn new(
            respond: impl Fn(&str, u32) -> Result<StreamStatus, TransportError> + Send + Sync + 'static,
        ) -> Self {
            Self {
                create_ok: true,
                respond: Box::new(respond),
                polls: AtomicU32::new(0),
                per_stream: Default::default(),
                stops: Default::default(),
                gate: None,
                slow_poll: None,
            }
        }

        fn polls(&self) -> u32 {
            self.polls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StreamApi for FakeStreams {
        async fn create_stream(&self, media_id: &str) -> Result<CreateStreamAck, TransportError> {
            if let Some((gated, notify)) = &self.gate {
                if *gated == media_id {
                    notify.notified().await;
                }
            }
            Ok(CreateStreamAck {
                success: self.create_ok,
                stream_id: self.create_ok.then(|| format!("stream_{}", media_id)),
                error: None,
            })
        }

        /// The responder sees the attempt number for `stream_id` alone.
        async fn stream_status(&self, stream_id: &str) -> Result<StreamStatus, TransportError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            let attempt = {
                let mut per_stream = self.per_stream.lock().unwrap();
                let n = per_stream.entry(stream_id.to_string()).or_insert(0);
                *n += 1;
                *n
            };
            if let Some((slow, n, delay)) = self.slow_poll {
                if slow == stream_id && n == attempt {
                    tokio::time::sleep(delay).await;
                }
            }
            (self.respond)(stream_id, attempt)
        }

        async fn stop_stream(&self, stream_id: &str) -> Result<StopStreamAck, TransportError> {
            self.stops.lock().unwrap().push(stream_id.to_string());
            Ok(StopStreamAck { success: true })
        }
    }

    fn polling(max_attempts: u32) -> PollingConfig {
        PollingConfig {
            max_attempts,
            poll_interval_ms: 2000,
            handoff_on_timeout: false,
        }
    }

    fn native_player() -> (FakeElement, Arc<Mutex<PlayerAdapter>>) {
        let element = FakeElement {
            native: true,
            ..Default::default()
        };
        let player = PlayerAdapter::new(
            Box::new(element.clone()),
            None,
            PlayerOptions {
                hls_base_url: "http://media.local".into(),
                ..Default::default()
            },
        );
        (element, Arc::new(Mutex::new(player)))
    }

    fn drain(rx: &mut broadcast::Receiver<SessionUpdate>) -> Vec<SessionUpdate> {
        let mut out = Vec::new();
        while let Ok(update) = rx.try_recv() {
            out.push(update);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_after_first_poll_hands_off_to_player() {
        let api = Arc::new(FakeStreams::new(|_, _| Ok(StreamStatus::new("ready", None))));
        let (element, player) = native_player();
        let orchestrator = SessionOrchestrator::new(api.clone(), Some(player), polling(30));
        let mut updates = orchestrator.subscribe();

        let started = tokio::time::Instant::now();
        let handle = orchestrator.start_playback("42").await;
        let session = handle.wait_terminal().await.unwrap();

        assert_eq!(session.state, SessionState::Ready);
        assert_eq!(session.stream_id.as_deref(), Some("stream_42"));
        assert_eq!(session.attempts, 1);
        assert_eq!(api.polls(), 1);
        assert!(started.elapsed() >= Duration::from_millis(2000));
        assert!(session.error().is_none());

        assert!(element
            .calls()
            .contains(&"src:http://media.local/hls/stream_42/playlist.m3u8".to_string()));

        let states: Vec<_> = drain(&mut updates)
            .into_iter()
            .map(|u| (u.session.state, u.session.attempts))
            .collect();
        assert_eq!(
            states,
            vec![
                (SessionState::Created, 0),
                (SessionState::Polling, 0),
                (SessionState::Ready, 1),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_after_exactly_max_attempts() {
        let api = Arc::new(FakeStreams::new(|_, _| Ok(StreamStatus::new("preparing", None))));
        let (element, player) = native_player();
        let orchestrator = SessionOrchestrator::new(api.clone(), Some(player), polling(30));

        let session = orchestrator
            .start_playback("7")
            .await
            .wait_terminal()
            .await
            .unwrap();

        assert_eq!(session.state, SessionState::TimedOut);
        assert_eq!(session.attempts, 30);
        assert_eq!(api.polls(), 30);
        assert_eq!(session.severity(), Some(Severity::Warning));
        assert_eq!(session.error(), Some(SessionError::PreparationTimeout));
        assert!(element.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_handoff_when_configured() {
        let api = Arc::new(FakeStreams::new(|_, _| Ok(StreamStatus::new("creating", None))));
        let (element, player) = native_player();
        let config = PollingConfig {
            handoff_on_timeout: true,
            ..polling(3)
        };
        let orchestrator = SessionOrchestrator::new(api.clone(), Some(player), config);

        let session = orchestrator
            .start_playback("7")
            .await
            .wait_terminal()
            .await
            .unwrap();

        assert_eq!(session.state, SessionState::TimedOut);
        assert_eq!(api.polls(), 3);
        assert!(!element.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_stops_polling() {
        let api = Arc::new(FakeStreams::new(|_, attempt| {
            if attempt == 5 {
                Ok(StreamStatus::new("error", Some("codec unsupported")))
            } else {
                Ok(StreamStatus::new("preparing", None))
            }
        }));
        let (element, player) = native_player();
        let orchestrator = SessionOrchestrator::new(api.clone(), Some(player), polling(30));

        let session = orchestrator
            .start_playback("9")
            .await
            .wait_terminal()
            .await
            .unwrap();

        assert_eq!(session.state, SessionState::Failed);
        assert_eq!(session.attempts, 5);
        assert_eq!(session.error_message.as_deref(), Some("codec unsupported"));
        assert_eq!(session.severity(), Some(Severity::Error));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(api.polls(), 5);
        assert!(element.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_error_message_defaults() {
        let api = Arc::new(FakeStreams::new(|_, _| Ok(StreamStatus::new("error", Some("")))));
        let orchestrator = SessionOrchestrator::new(api, None, polling(30));

        let session = orchestrator
            .start_playback("1")
            .await
            .wait_terminal()
            .await
            .unwrap();
        assert_eq!(
            session.error(),
            Some(SessionError::Preparation {
                message: "stream error".into()
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_creation_failure() {
        let mut fake = FakeStreams::new(|_, _| Ok(StreamStatus::new("ready", None)));
        fake.create_ok = false;
        let api = Arc::new(fake);
        let orchestrator = SessionOrchestrator::new(api.clone(), None, polling(30));

        let session = orchestrator
            .start_playback("1")
            .await
            .wait_terminal()
            .await
            .unwrap();
        assert_eq!(session.state, SessionState::Failed);
        assert_eq!(session.error(), Some(SessionError::CreationFailed));
        assert_eq!(session.error_message.as_deref(), Some("creation failed"));
        assert_eq!(api.polls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_transport_error_fails_session() {
        let api = Arc::new(FakeStreams::new(|_, _| {
            Err(TransportError::HttpStatus { status: 500 })
        }));
        let orchestrator = SessionOrchestrator::new(api.clone(), None, polling(30));

        let session = orchestrator
            .start_playback("1")
            .await
            .wait_terminal()
            .await
            .unwrap();
        assert_eq!(session.state, SessionState::Failed);
        assert_eq!(api.polls(), 1);
        assert!(session
            .error_message
            .unwrap()
            .starts_with("status check failed: HTTP error! status: 500"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_session_supersedes_in_flight_one() {
        let notify = Arc::new(Notify::new());
        let mut fake = FakeStreams::new(|_, _| Ok(StreamStatus::new("ready", None)));
        fake.gate = Some(("slow", notify.clone()));
        let api = Arc::new(fake);
        let (element, player) = native_player();
        let orchestrator = SessionOrchestrator::new(api.clone(), Some(player), polling(30));
        let mut updates = orchestrator.subscribe();

        let first = orchestrator.start_playback("slow").await;
        tokio::task::yield_now().await;
        let second = orchestrator.start_playback("fast").await;
        notify.notify_one();

        let fast = second.wait_terminal().await.unwrap();
        assert_eq!(fast.state, SessionState::Ready);
        assert!(first.wait_terminal().await.is_none());

        let stale: Vec<_> = drain(&mut updates)
            .into_iter()
            .filter(|u| u.generation == 1)
            .map(|u| u.session.state)
            .collect();
        assert_eq!(stale, vec![SessionState::Created]);

        let sources: Vec<_> = element
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("src:http"))
            .collect();
        assert_eq!(sources, vec!["src:http://media.local/hls/stream_fast/playlist.m3u8"]);
        assert_eq!(
            orchestrator.current().await.map(|s| s.media_id),
            Some("fast".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_playback_cancels_and_stops_stream() {
        let api = Arc::new(FakeStreams::new(|_, _| Ok(StreamStatus::new("preparing", None))));
        let (element, player) = native_player();
        let orchestrator = SessionOrchestrator::new(api.clone(), Some(player), polling(30));

        let handle = orchestrator.start_playback("5").await;
        let mut watch = handle.watch();
        while watch.borrow_and_update().attempts < 2 {
            watch.changed().await.unwrap();
        }

        orchestrator.stop_playback().await;
        assert!(handle.wait_terminal().await.is_none());

        let polls = api.polls();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(api.polls(), polls);
        assert_eq!(*api.stops.lock().unwrap(), vec!["stream_5".to_string()]);
        assert!(element.calls().contains(&"pause".to_string()));
        assert!(orchestrator.current().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_poll_response_from_superseded_session_is_ignored() {
        let mut fake = FakeStreams::new(|stream_id, attempt| match (stream_id, attempt) {
            ("stream_a", 3) => Ok(StreamStatus::new("error", Some("late failure"))),
            ("stream_b", 2) => Ok(StreamStatus::new("ready", None)),
            _ => Ok(StreamStatus::new("preparing", None)),
        });
        fake.slow_poll = Some(("stream_a", 3, Duration::from_secs(10)));
        let api = Arc::new(fake);
        let (element, player) = native_player();
        let orchestrator = SessionOrchestrator::new(api.clone(), Some(player), polling(30));
        let mut updates = orchestrator.subscribe();

        let first = orchestrator.start_playback("a").await;
        // A's third poll goes out at 6s and answers at 16s.
        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(api.polls(), 3);
        let second = orchestrator.start_playback("b").await;

        let b = second.wait_terminal().await.unwrap();
        assert!(first.wait_terminal().await.is_none());
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert_eq!(b.state, SessionState::Ready);
        assert_eq!(b.attempts, 2);
        assert_eq!(
            orchestrator.current().await.map(|s| (s.media_id, s.state)),
            Some(("b".to_string(), SessionState::Ready))
        );

        let updates = drain(&mut updates);
        let first_states: Vec<_> = updates
            .iter()
            .filter(|u| u.generation == 1)
            .map(|u| (u.session.state, u.session.attempts))
            .collect();
        assert_eq!(
            first_states,
            vec![
                (SessionState::Created, 0),
                (SessionState::Polling, 0),
                (SessionState::Polling, 1),
                (SessionState::Polling, 2),
            ]
        );
        assert!(updates
            .iter()
            .filter(|u| u.session.state.is_terminal())
            .all(|u| u.generation == 2 && u.session.media_id == "b"));
        assert_eq!(
            element
                .calls()
                .into_iter()
                .filter(|c| c.starts_with("src:http"))
                .collect::<Vec<_>>(),
            vec!["src:http://media.local/hls/stream_b/playlist.m3u8"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_player_without_backend_reports_hand_off_failure() {
        let api = Arc::new(FakeStreams::new(|_, _| Ok(StreamStatus::new("ready", None))));
        let element = FakeElement::default();
        let player = Arc::new(Mutex::new(PlayerAdapter::new(
            Box::new(element.clone()),
            None,
            PlayerOptions::default(),
        )));
        let orchestrator = SessionOrchestrator::new(api, Some(player), polling(30));
        let mut updates = orchestrator.subscribe();

        let handle = orchestrator.start_playback("3").await;
        let watch = handle.watch();
        let session = handle.wait_terminal().await.unwrap();

        assert_eq!(session.state, SessionState::Ready);
        assert_eq!(
            session.player_error.as_deref(),
            Some("HLS is not supported by any available playback backend")
        );
        assert_eq!(watch.borrow().player_error, session.player_error);
        let last = drain(&mut updates).pop().unwrap();
        assert_eq!(last.session, session);
        assert!(element.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_hand_off_has_no_player_error() {
        let api = Arc::new(FakeStreams::new(|_, _| Ok(StreamStatus::new("ready", None))));
        let (_element, player) = native_player();
        let orchestrator = SessionOrchestrator::new(api, Some(player), polling(30));

        let session = orchestrator
            .start_playback("3")
            .await
            .wait_terminal()
            .await
            .unwrap();
        assert_eq!(session.player_error, None);
    }
}
