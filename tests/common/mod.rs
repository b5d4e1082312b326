#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use loqa_rooms::engine::EngineSink;
use loqa_rooms::services::{TranscriptRecord, TranscriptStore};
use loqa_rooms::signaling::{
    Dispatch, IceCandidate, SessionDescription, SignalingEvent, SignalingSession,
};
use loqa_rooms::speech::{SpeechEngine, SpeechEvent};
use loqa_rooms::{
    DryRunEngine, IceServer, NegotiationEngine, ParticipantId, PeerConnection, RoomChannel,
    RoomId, RoomMessage, RoomSession, SessionConfig, SessionDeps, SessionHandle,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Outbox that keeps every message sent on the room channel
#[derive(Default)]
pub struct RecordingChannel(Mutex<Vec<RoomMessage>>);

impl RoomChannel for RecordingChannel {
    fn send(&self, message: RoomMessage) {
        self.0.lock().unwrap().push(message);
    }
}

impl RecordingChannel {
    pub fn take(&self) -> Vec<RoomMessage> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }

    pub fn snapshot(&self) -> Vec<RoomMessage> {
        self.0.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().iter().map(|m| m.kind()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailOn {
    CreateOffer,
    CreateAnswer,
    SetRemote,
    AddCandidate,
}

/// Negotiation engine that journals calls and fails on request
#[derive(Default)]
pub struct MockEngine {
    failures: Mutex<HashSet<(String, FailOn)>>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
    sinks: Mutex<HashMap<String, EngineSink>>,
}

impl MockEngine {
    /// Make connections opened toward `peer` from now on fail `op`
    pub fn fail(&self, peer: &str, op: FailOn) {
        self.failures.lock().unwrap().insert((peer.to_string(), op));
    }

    pub fn calls_for(&self, peer: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == peer)
            .map(|(_, call)| call.clone())
            .collect()
    }

    /// Callback endpoint of the latest connection toward `peer`
    pub fn sink(&self, peer: &str) -> EngineSink {
        self.sinks
            .lock()
            .unwrap()
            .get(peer)
            .cloned()
            .expect("no connection opened toward peer")
    }
}

impl NegotiationEngine for MockEngine {
    fn open(
        &self,
        peer: &ParticipantId,
        _ice_servers: &[IceServer],
        events: EngineSink,
    ) -> Result<Arc<dyn PeerConnection>> {
        let fail = self
            .failures
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == peer.as_str())
            .map(|(_, op)| *op)
            .collect();
        self.sinks
            .lock()
            .unwrap()
            .insert(peer.to_string(), events);

        Ok(Arc::new(MockConnection {
            peer: peer.to_string(),
            fail,
            calls: Arc::clone(&self.calls),
        }))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

struct MockConnection {
    peer: String,
    fail: HashSet<FailOn>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockConnection {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push((self.peer.clone(), call));
    }

    fn check(&self, op: FailOn) -> Result<()> {
        if self.fail.contains(&op) {
            bail!("injected {:?} failure", op);
        }
        Ok(())
    }
}

#[async_trait]
impl PeerConnection for MockConnection {
    async fn create_offer(&self) -> Result<SessionDescription> {
        self.record("create_offer".into());
        self.check(FailOn::CreateOffer)?;
        Ok(SessionDescription::offer(format!("offer-to-{}", self.peer)))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        self.record("create_answer".into());
        self.check(FailOn::CreateAnswer)?;
        Ok(SessionDescription::answer(format!("answer-to-{}", self.peer)))
    }

    async fn set_local_description(&self, description: &SessionDescription) -> Result<()> {
        self.record(format!("local:{}", description.sdp));
        Ok(())
    }

    async fn set_remote_description(&self, description: &SessionDescription) -> Result<()> {
        self.record(format!("remote:{}", description.sdp));
        self.check(FailOn::SetRemote)
    }

    async fn add_candidate(&self, candidate: &IceCandidate) -> Result<()> {
        self.record(format!("candidate:{}", candidate.candidate));
        self.check(FailOn::AddCandidate)
    }

    async fn close(&self) {
        self.record("close".into());
    }
}

/// Handle every link and engine event until the session goes quiet
pub async fn pump(session: &mut SignalingSession, events: &mut mpsc::UnboundedReceiver<SignalingEvent>) {
    while let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(25), events.recv()).await {
        session.handle_event(event);
    }
}

/// One simulated participant
pub struct Node {
    pub id: ParticipantId,
    pub session: SignalingSession,
    pub events: mpsc::UnboundedReceiver<SignalingEvent>,
    pub channel: Arc<RecordingChannel>,
}

impl Node {
    pub fn new(id: &str, engine: Arc<dyn NegotiationEngine>) -> Self {
        let id = ParticipantId::new(id);
        let channel = Arc::new(RecordingChannel::default());
        let (session, events) = SignalingSession::new(
            id.clone(),
            RoomId::new("test-room"),
            engine,
            channel.clone(),
            vec![IceServer::stun("stun:stun.l.google.com:19302")],
        );
        Self {
            id,
            session,
            events,
            channel,
        }
    }

    pub fn dry_run(id: &str) -> Self {
        let engine = Arc::new(DryRunEngine::new(ParticipantId::new(id)));
        Self::new(id, engine)
    }

    pub async fn pump(&mut self) {
        pump(&mut self.session, &mut self.events).await;
    }

    /// Deliver a message as the relay would: stamped with its sender
    pub fn deliver(&mut self, from: &ParticipantId, message: RoomMessage) -> Dispatch {
        self.session.handle_room_message(message.with_sender(from))
    }
}

/// Relay messages between two nodes until neither has anything to say
pub async fn exchange(a: &mut Node, b: &mut Node) {
    for _ in 0..20 {
        a.pump().await;
        b.pump().await;
        let from_a = a.channel.take();
        let from_b = b.channel.take();
        if from_a.is_empty() && from_b.is_empty() {
            return;
        }
        for message in from_a {
            b.deliver(&a.id, message);
        }
        for message in from_b {
            a.deliver(&b.id, message);
        }
    }
}

pub fn id(s: &str) -> ParticipantId {
    ParticipantId::new(s)
}

pub fn candidate(s: &str) -> IceCandidate {
    IceCandidate::new(s)
}

// ============================================================================
// Room session runtime fixtures
// ============================================================================

#[derive(Default)]
struct ControlState {
    tx: Option<mpsc::Sender<SpeechEvent>>,
    starts: usize,
    stops: usize,
    fail_start: bool,
}

/// Test-side view of a [`MockSpeech`] engine
#[derive(Clone, Default)]
pub struct SpeechControl(Arc<Mutex<ControlState>>);

impl SpeechControl {
    pub fn starts(&self) -> usize {
        self.0.lock().unwrap().starts
    }

    pub fn stops(&self) -> usize {
        self.0.lock().unwrap().stops
    }

    pub fn is_running(&self) -> bool {
        self.0.lock().unwrap().tx.is_some()
    }

    pub fn fail_next_start(&self) {
        self.0.lock().unwrap().fail_start = true;
    }

    pub async fn emit(&self, event: SpeechEvent) {
        let tx = self
            .0
            .lock()
            .unwrap()
            .tx
            .clone()
            .expect("speech engine is not running");
        tx.send(event).await.unwrap();
    }

    pub async fn interim(&self, text: &str) {
        self.emit(SpeechEvent::Result {
            final_text: String::new(),
            interim: text.to_string(),
        })
        .await;
    }
}

pub struct MockSpeech(SpeechControl);

impl MockSpeech {
    pub fn new() -> (Self, SpeechControl) {
        let control = SpeechControl::default();
        (Self(control.clone()), control)
    }
}

impl SpeechEngine for MockSpeech {
    fn start(&mut self, _language: &str) -> Result<mpsc::Receiver<SpeechEvent>> {
        let mut state = self.0 .0.lock().unwrap();
        if std::mem::take(&mut state.fail_start) {
            bail!("microphone unavailable");
        }
        let (tx, rx) = mpsc::channel(16);
        state.starts += 1;
        state.tx = Some(tx);
        Ok(rx)
    }

    fn stop(&mut self) {
        let mut state = self.0 .0.lock().unwrap();
        state.stops += 1;
        state.tx = None;
    }

    fn name(&self) -> &str {
        "mock-speech"
    }
}

/// Transcript store that keeps records in memory
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<TranscriptRecord>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn texts(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.text.clone())
            .collect()
    }

    pub fn records(&self) -> Vec<TranscriptRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn set_failing(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl TranscriptStore for MemoryStore {
    async fn save(&self, record: TranscriptRecord) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("backend returned 500");
        }
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}

/// A running room session wired to in-memory collaborators
pub struct Harness {
    pub id: ParticipantId,
    pub handle: SessionHandle,
    pub task: JoinHandle<()>,
    pub inbound: mpsc::UnboundedSender<RoomMessage>,
    pub channel: Arc<RecordingChannel>,
    pub speech: SpeechControl,
    pub store: Arc<MemoryStore>,
    pub engine: Arc<MockEngine>,
}

impl Harness {
    pub fn start(local_id: &str) -> Self {
        let id = ParticipantId::new(local_id);
        let config = SessionConfig {
            room: RoomId::new("test-room"),
            client_id: id.clone(),
            ..SessionConfig::default()
        };

        let (inbound, inbound_rx) = mpsc::unbounded_channel();
        let channel = Arc::new(RecordingChannel::default());
        let (speech, control) = MockSpeech::new();
        let store = Arc::new(MemoryStore::default());
        let engine = Arc::new(MockEngine::default());

        let deps = SessionDeps {
            engine: engine.clone(),
            channel: channel.clone(),
            ice_servers: Vec::new(),
            inbound: inbound_rx,
            speech: Box::new(speech),
            store: store.clone(),
        };
        let (handle, task) = RoomSession::spawn(config, deps);

        Self {
            id,
            handle,
            task,
            inbound,
            channel,
            speech: control,
            store,
            engine,
        }
    }

    /// Deliver an inbound room message stamped with its sender
    pub fn receive(&self, from: &str, message: RoomMessage) {
        self.inbound
            .send(message.with_sender(&ParticipantId::new(from)))
            .unwrap();
    }

    /// Transcript updates broadcast so far, as (committed, interim)
    pub fn transcript_updates(&self) -> Vec<(String, String)> {
        self.channel
            .snapshot()
            .into_iter()
            .filter_map(|m| match m {
                RoomMessage::TranscriptUpdate {
                    committed, interim, ..
                } => Some((committed, interim)),
                _ => None,
            })
            .collect()
    }

    /// Recording-state broadcasts so far, as `active` flags
    pub fn recording_states(&self) -> Vec<bool> {
        self.channel
            .snapshot()
            .into_iter()
            .filter_map(|m| match m {
                RoomMessage::RecordingState { active, .. } => Some(active),
                _ => None,
            })
            .collect()
    }
}

/// Yield to other tasks until `check` holds
pub async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if check() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("timed out waiting for {}", what);
}
