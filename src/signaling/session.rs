use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::candidates::CandidateQueue;
use super::channel::RoomChannel;
use super::link::LinkHandle;
use super::messages::{
    IceCandidate, ParticipantId, RoomId, RoomMessage, SessionDescription, TranscriptPayload,
};
use super::peer::{NegotiationState, PeerNegotiation};
use super::{EngineEventKind, EngineNotification, LinkOutcome, LinkResult, SignalingEvent};
use crate::engine::{EngineSink, IceServer, NegotiationEngine};
use crate::errors::SignalingError;
use crate::recorder::{CaptureDirective, RecorderArbiter};

/// One known remote participant
#[derive(Debug)]
struct PeerRecord {
    machine: PeerNegotiation,
    generation: u64,
    created_at: DateTime<Utc>,
    /// We kept our offer over theirs; their candidates belong to the
    /// connection they abandoned until their answer arrives
    stale_remote_candidates: bool,
}

/// Status view of a peer record
#[derive(Debug, Clone, Serialize)]
pub struct PeerSnapshot {
    pub peer_id: ParticipantId,
    pub state: NegotiationState,
    pub created_at: DateTime<Utc>,
}

/// What the runtime has to act on after a room message
#[derive(Debug, PartialEq)]
pub enum Dispatch {
    Handled,
    Capture(CaptureDirective),
    Transcript {
        sender: ParticipantId,
        payload: TranscriptPayload,
    },
}

/// Peer records and recorder role for one room membership
pub struct SignalingSession {
    local_id: ParticipantId,
    room: RoomId,
    members: BTreeSet<ParticipantId>,
    peers: HashMap<ParticipantId, PeerRecord>,
    candidates: CandidateQueue,
    recorder: RecorderArbiter,
    engine: Arc<dyn NegotiationEngine>,
    channel: Arc<dyn RoomChannel>,
    ice_servers: Vec<IceServer>,
    events: mpsc::UnboundedSender<SignalingEvent>,
    next_generation: u64,
    closed: bool,
}

impl SignalingSession {
    /// Create the session; the receiver yields link and engine events that
    /// must be fed back through [`SignalingSession::handle_event`].
    pub fn new(
        local_id: ParticipantId,
        room: RoomId,
        engine: Arc<dyn NegotiationEngine>,
        channel: Arc<dyn RoomChannel>,
        ice_servers: Vec<IceServer>,
    ) -> (Self, mpsc::UnboundedReceiver<SignalingEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        info!(
            "Signaling session for {} in room {} (engine: {})",
            local_id,
            room,
            engine.name()
        );

        let session = Self {
            recorder: RecorderArbiter::new(local_id.clone()),
            local_id,
            room,
            members: BTreeSet::new(),
            peers: HashMap::new(),
            candidates: CandidateQueue::new(),
            engine,
            channel,
            ice_servers,
            events,
            next_generation: 0,
            closed: false,
        };
        (session, rx)
    }

    pub fn local_id(&self) -> &ParticipantId {
        &self.local_id
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    pub fn recorder(&self) -> &RecorderArbiter {
        &self.recorder
    }

    pub fn members(&self) -> Vec<ParticipantId> {
        self.members.iter().cloned().collect()
    }

    pub fn peer_state(&self, peer: &ParticipantId) -> Option<NegotiationState> {
        self.peers.get(peer).map(|record| record.machine.state())
    }

    pub fn pending_candidates(&self, peer: &ParticipantId) -> usize {
        self.candidates.pending(peer)
    }

    pub fn peers(&self) -> Vec<PeerSnapshot> {
        let mut peers: Vec<PeerSnapshot> = self
            .peers
            .iter()
            .map(|(id, record)| PeerSnapshot {
                peer_id: id.clone(),
                state: record.machine.state(),
                created_at: record.created_at,
            })
            .collect();
        peers.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));
        peers
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Send a message to the whole room
    pub fn broadcast(&self, message: RoomMessage) {
        if self.closed {
            debug!("Session closed, not sending {}", message.kind());
            return;
        }
        self.channel.send(message);
    }

    /// Dispatch one inbound room message
    pub fn handle_room_message(&mut self, message: RoomMessage) -> Dispatch {
        if self.closed {
            debug!("Session closed, dropping {}", message.kind());
            return Dispatch::Handled;
        }

        match message {
            RoomMessage::RoomClients {
                clients,
                recorder_id,
            } => Dispatch::Capture(self.on_room_clients(clients, recorder_id)),
            RoomMessage::UserJoined { client_id, clients } => {
                self.refresh_members(clients);
                self.on_user_joined(client_id);
                Dispatch::Handled
            }
            RoomMessage::UserLeft { client_id, clients } => {
                self.on_user_left(&client_id);
                self.refresh_members(clients);
                Dispatch::Handled
            }
            RoomMessage::Offer {
                sender_id,
                target_id,
                offer,
            } => {
                if let Some(sender) = self.accept_addressed("offer", sender_id, target_id) {
                    self.on_offer(sender, offer);
                }
                Dispatch::Handled
            }
            RoomMessage::Answer {
                sender_id,
                target_id,
                answer,
            } => {
                if let Some(sender) = self.accept_addressed("answer", sender_id, target_id) {
                    self.on_answer(sender, answer);
                }
                Dispatch::Handled
            }
            RoomMessage::IceCandidate {
                sender_id,
                target_id,
                candidate,
            } => {
                if let Some(sender) = self.accept_addressed("ice-candidate", sender_id, target_id) {
                    self.on_candidate(sender, candidate);
                }
                Dispatch::Handled
            }
            RoomMessage::RecordingState {
                active,
                owner_id,
                sender_id,
            } => {
                let owner = owner_id.or(sender_id);
                Dispatch::Capture(self.recorder.on_recording_state(active, owner))
            }
            RoomMessage::RecordingDenied { owner_id } => {
                Dispatch::Capture(self.recorder.on_denied(owner_id))
            }
            RoomMessage::TranscriptUpdate {
                sender_id,
                committed,
                interim,
                language,
            } => match sender_id {
                Some(sender) if sender != self.local_id => Dispatch::Transcript {
                    sender,
                    payload: TranscriptPayload {
                        committed,
                        interim,
                        language,
                    },
                },
                Some(_) => Dispatch::Handled,
                None => {
                    warn!("Dropping transcript-update without sender");
                    Dispatch::Handled
                }
            },
        }
    }

    /// Dispatch a link completion or engine callback
    pub fn handle_event(&mut self, event: SignalingEvent) {
        match event {
            SignalingEvent::Link(outcome) => self.on_link_outcome(outcome),
            SignalingEvent::Engine(notification) => self.on_engine_notification(notification),
        }
    }

    /// Full membership snapshot received at join time
    ///
    /// The newcomer always initiates toward everyone already present.
    pub fn on_room_clients(
        &mut self,
        clients: Vec<ParticipantId>,
        recorder_id: Option<ParticipantId>,
    ) -> CaptureDirective {
        let others: BTreeSet<ParticipantId> = clients
            .into_iter()
            .filter(|id| *id != self.local_id)
            .collect();

        let departed: Vec<ParticipantId> = self
            .peers
            .keys()
            .filter(|id| !others.contains(*id))
            .cloned()
            .collect();
        for peer in departed {
            self.destroy(&peer, "absent from membership snapshot");
        }

        info!("Room {} has {} other participants", self.room, others.len());
        for peer in &others {
            if self.peers.contains_key(peer) {
                continue;
            }
            if self.create_record(peer) {
                self.with_machine(peer, |machine, _, _| machine.initiate());
            }
        }
        self.members = others;

        self.recorder.adopt_snapshot(recorder_id)
    }

    /// A single participant joined after us
    ///
    /// Exactly one side of each pair initiates: the one whose id sorts
    /// higher. The other waits for the offer.
    pub fn on_user_joined(&mut self, peer: ParticipantId) {
        if peer == self.local_id {
            return;
        }
        self.members.insert(peer.clone());
        if self.peers.contains_key(&peer) {
            debug!("Already tracking {}", peer);
            return;
        }

        info!("{} joined room {}", peer, self.room);
        if !self.create_record(&peer) {
            return;
        }
        if self.local_id > peer {
            self.with_machine(&peer, |machine, _, _| machine.initiate());
        } else {
            debug!("Waiting for offer from {}", peer);
        }
    }

    /// A participant left; idempotent
    pub fn on_user_left(&mut self, peer: &ParticipantId) {
        self.members.remove(peer);
        self.recorder.on_participant_left(peer);
        if self.peers.contains_key(peer) {
            info!("{} left room {}", peer, self.room);
            self.destroy(peer, "participant left");
        } else {
            debug!("Departure of untracked participant {}", peer);
        }
    }

    /// Local intent to become the active recorder
    pub fn request_recording(&mut self) -> Result<CaptureDirective, SignalingError> {
        if self.closed {
            return Err(SignalingError::SessionClosed);
        }
        self.recorder.propose(&*self.channel)
    }

    /// Explicit stop by the local owner
    pub fn release_recording(&mut self) -> Result<CaptureDirective, SignalingError> {
        if self.closed {
            return Err(SignalingError::SessionClosed);
        }
        self.recorder.release(&*self.channel)
    }

    /// Tear down every peer record
    pub fn leave(&mut self) {
        if self.closed {
            return;
        }
        let peers: Vec<ParticipantId> = self.peers.keys().cloned().collect();
        for peer in peers {
            self.destroy(&peer, "session leave");
        }
        self.members.clear();
        self.closed = true;
        info!("Left room {}", self.room);
    }

    fn on_offer(&mut self, sender: ParticipantId, offer: SessionDescription) {
        let collided = matches!(
            self.peer_state(&sender),
            Some(NegotiationState::OfferCreated | NegotiationState::OfferSent)
        );
        if collided {
            // Both sides offered: the higher id keeps its offer, the lower
            // id rebuilds its record as the answering side.
            if self.local_id > sender {
                warn!("Offer collision with {}, keeping ours", sender);
                if let Some(record) = self.peers.get_mut(&sender) {
                    record.stale_remote_candidates = true;
                }
                return;
            }
            warn!("Offer collision with {}, answering theirs", sender);
            self.destroy(&sender, "offer collision");
        }

        if !self.peers.contains_key(&sender) {
            // An offer is the responder-side creation path
            debug!("Offer from untracked {}, creating record", sender);
            self.members.insert(sender.clone());
            if !self.create_record(&sender) {
                return;
            }
        }
        self.with_machine(&sender, |machine, _, _| machine.on_remote_offer(offer));
    }

    fn on_answer(&mut self, sender: ParticipantId, answer: SessionDescription) {
        let Some(record) = self.peers.get_mut(&sender) else {
            warn!("Dropping answer from unknown peer {}", sender);
            return;
        };
        // The answering side holds its candidates until the answer is out,
        // so anything after this belongs to the live connection
        record.stale_remote_candidates = false;
        self.with_machine(&sender, |machine, candidates, _| {
            machine.on_remote_answer(answer, candidates)
        });
    }

    fn on_candidate(&mut self, sender: ParticipantId, candidate: IceCandidate) {
        match self.peers.get(&sender) {
            None => {
                // The queue rejects and logs candidates for unknown peers
                self.candidates.enqueue(&sender, candidate);
                return;
            }
            Some(record) if record.stale_remote_candidates => {
                debug!("Dropping candidate from {} for its abandoned offer", sender);
                return;
            }
            Some(_) => {}
        }
        self.with_machine(&sender, |machine, candidates, _| {
            machine.on_remote_candidate(candidate, candidates);
            Ok(())
        });
    }

    fn on_link_outcome(&mut self, outcome: LinkOutcome) {
        let LinkOutcome {
            peer,
            generation,
            result,
        } = outcome;
        if !self.is_current(&peer, generation) {
            debug!("Discarding link outcome for torn-down record {}", peer);
            return;
        }

        match result {
            LinkResult::OfferReady(offer) => {
                self.with_machine(&peer, |machine, _, channel| {
                    machine.on_offer_ready(offer, channel)
                });
            }
            LinkResult::AnswerReady(answer) => {
                self.with_machine(&peer, |machine, candidates, channel| {
                    machine.on_answer_ready(answer, candidates, channel)
                });
            }
            LinkResult::AnswerApplied(applied) => {
                self.with_machine(&peer, |machine, _, _| machine.on_answer_applied(applied));
            }
            LinkResult::CandidateRejected(candidate) => {
                debug!("Candidate {} for {} was skipped", candidate.candidate, peer);
            }
        }
    }

    fn on_engine_notification(&mut self, notification: EngineNotification) {
        let EngineNotification {
            peer,
            generation,
            kind,
        } = notification;
        if !self.is_current(&peer, generation) {
            debug!("Discarding engine event for torn-down record {}", peer);
            return;
        }

        match kind {
            EngineEventKind::ConnectionState(state) => {
                self.with_machine(&peer, |machine, _, _| {
                    machine.on_connection_state_changed(state);
                    Ok(())
                });
            }
            EngineEventKind::LocalCandidate(candidate) => {
                self.with_machine(&peer, |machine, _, channel| {
                    machine.on_local_candidate(candidate, channel);
                    Ok(())
                });
            }
        }
    }

    /// Only the addressed participant handles a signaling message
    fn accept_addressed(
        &self,
        kind: &str,
        sender_id: Option<ParticipantId>,
        target_id: Option<ParticipantId>,
    ) -> Option<ParticipantId> {
        if let Some(target) = &target_id {
            if *target != self.local_id {
                debug!("Ignoring {} addressed to {}", kind, target);
                return None;
            }
        }
        match sender_id {
            Some(sender) if sender == self.local_id => None,
            Some(sender) => Some(sender),
            None => {
                warn!("Dropping {} without sender", kind);
                None
            }
        }
    }

    fn refresh_members(&mut self, clients: Vec<ParticipantId>) {
        if clients.is_empty() {
            return;
        }
        self.members = clients
            .into_iter()
            .filter(|id| *id != self.local_id)
            .collect();
    }

    fn is_current(&self, peer: &ParticipantId, generation: u64) -> bool {
        self.peers
            .get(peer)
            .map(|record| record.generation == generation)
            .unwrap_or(false)
    }

    fn create_record(&mut self, peer: &ParticipantId) -> bool {
        self.next_generation += 1;
        let generation = self.next_generation;

        let sink = EngineSink::new(peer.clone(), generation, self.events.clone());
        let connection = match self.engine.open(peer, &self.ice_servers, sink) {
            Ok(connection) => connection,
            Err(e) => {
                error!("Failed to open connection to {}: {:#}", peer, e);
                return false;
            }
        };

        let link = LinkHandle::spawn(peer.clone(), generation, connection, self.events.clone());
        self.candidates.register(peer);
        self.peers.insert(
            peer.clone(),
            PeerRecord {
                machine: PeerNegotiation::new(peer.clone(), link),
                generation,
                created_at: Utc::now(),
                stale_remote_candidates: false,
            },
        );
        true
    }

    /// Run a state machine step, log its error and tear down on terminal state
    fn with_machine<F>(&mut self, peer: &ParticipantId, step: F)
    where
        F: FnOnce(
            &mut PeerNegotiation,
            &mut CandidateQueue,
            &dyn RoomChannel,
        ) -> Result<(), SignalingError>,
    {
        let Some(record) = self.peers.get_mut(peer) else {
            return;
        };
        if let Err(e) = step(&mut record.machine, &mut self.candidates, &*self.channel) {
            warn!("{}", e);
        }

        match record.machine.state() {
            NegotiationState::Failed => self.destroy(peer, "negotiation failed"),
            NegotiationState::Closed => self.destroy(peer, "connection closed"),
            _ => {}
        }
    }

    fn destroy(&mut self, peer: &ParticipantId, reason: &str) {
        if let Some(mut record) = self.peers.remove(peer) {
            record.machine.close();
            self.candidates.remove(peer);
            info!(
                "Removed peer record {} ({}, final state {:?})",
                peer,
                reason,
                record.machine.state()
            );
        }
    }
}
