// Negotiation lifecycle with one remote participant
//
// Initiator: Idle -> OfferCreated -> OfferSent -> AnswerExchanged -> Connected
// Responder: Idle -> OfferReceived -> AnswerExchanged -> Connected
// Failed and Closed are absorbing; nothing re-enters Idle.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::candidates::CandidateQueue;
use super::channel::RoomChannel;
use super::link::{LinkHandle, LinkOp};
use super::messages::{IceCandidate, ParticipantId, RoomMessage, SessionDescription};
use crate::engine::ConnectionState;
use crate::errors::SignalingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NegotiationState {
    Idle,
    OfferCreated,
    OfferSent,
    OfferReceived,
    AnswerExchanged,
    Connected,
    Failed,
    Closed,
}

impl NegotiationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, NegotiationState::Failed | NegotiationState::Closed)
    }

    /// Whether a remote description has been applied
    pub fn has_remote_description(self) -> bool {
        matches!(
            self,
            NegotiationState::AnswerExchanged | NegotiationState::Connected
        )
    }

    /// Whether our own description is already on the wire
    fn has_sent_description(self) -> bool {
        matches!(
            self,
            NegotiationState::OfferSent
                | NegotiationState::AnswerExchanged
                | NegotiationState::Connected
        )
    }
}

/// State machine for one peer
#[derive(Debug)]
pub struct PeerNegotiation {
    peer: ParticipantId,
    state: NegotiationState,
    link: Option<LinkHandle>,
    /// Local candidates gathered before our description went out
    held_candidates: Vec<IceCandidate>,
    /// Offer accepted from the remote side, kept to spot redeliveries
    remote_offer: Option<SessionDescription>,
}

impl PeerNegotiation {
    pub fn new(peer: ParticipantId, link: LinkHandle) -> Self {
        Self {
            peer,
            state: NegotiationState::Idle,
            link: Some(link),
            held_candidates: Vec::new(),
            remote_offer: None,
        }
    }

    pub fn peer(&self) -> &ParticipantId {
        &self.peer
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    /// Start negotiating as the offering side
    pub fn initiate(&mut self) -> Result<(), SignalingError> {
        if self.state != NegotiationState::Idle {
            return Err(self.illegal("initiate"));
        }
        info!("Initiating negotiation with {}", self.peer);
        self.transition(NegotiationState::OfferCreated);
        self.submit(LinkOp::CreateOffer);
        Ok(())
    }

    /// Completion of `initiate`: the local offer is installed (or failed)
    pub fn on_offer_ready(
        &mut self,
        result: anyhow::Result<SessionDescription>,
        channel: &dyn RoomChannel,
    ) -> Result<(), SignalingError> {
        if self.state != NegotiationState::OfferCreated {
            debug!("Discarding stale offer for {} in {:?}", self.peer, self.state);
            return Ok(());
        }
        match result {
            Ok(offer) => {
                channel.send(RoomMessage::Offer {
                    sender_id: None,
                    target_id: Some(self.peer.clone()),
                    offer,
                });
                self.transition(NegotiationState::OfferSent);
                self.flush_held(channel);
                Ok(())
            }
            Err(e) => Err(self.fail(format!("{:#}", e))),
        }
    }

    /// Remote side offered; only valid before we did anything ourselves
    ///
    /// The relay may deliver the same offer twice: a copy of the offer we
    /// already accepted is dropped. Any other offer outside `Idle` fails the
    /// record.
    pub fn on_remote_offer(&mut self, offer: SessionDescription) -> Result<(), SignalingError> {
        if self.state != NegotiationState::Idle {
            if self.remote_offer.as_ref() == Some(&offer) {
                warn!(
                    "Ignoring redelivered offer from {} in state {:?}",
                    self.peer, self.state
                );
                return Ok(());
            }
            let err = self.illegal("remote offer");
            if !self.state.is_terminal() {
                self.transition(NegotiationState::Failed);
            }
            return Err(err);
        }
        self.transition(NegotiationState::OfferReceived);
        self.remote_offer = Some(offer.clone());
        self.submit(LinkOp::AcceptOffer(offer));
        Ok(())
    }

    /// Completion of `on_remote_offer`: our answer is installed (or failed)
    pub fn on_answer_ready(
        &mut self,
        result: anyhow::Result<SessionDescription>,
        candidates: &mut CandidateQueue,
        channel: &dyn RoomChannel,
    ) -> Result<(), SignalingError> {
        if self.state != NegotiationState::OfferReceived {
            debug!("Discarding stale answer for {} in {:?}", self.peer, self.state);
            return Ok(());
        }
        match result {
            Ok(answer) => {
                channel.send(RoomMessage::Answer {
                    sender_id: None,
                    target_id: Some(self.peer.clone()),
                    answer,
                });
                self.transition(NegotiationState::AnswerExchanged);
                self.apply_buffered(candidates);
                self.flush_held(channel);
                Ok(())
            }
            Err(e) => Err(self.fail(format!("{:#}", e))),
        }
    }

    /// Remote side answered our offer
    ///
    /// Anything other than `OfferSent` means a late or duplicate answer and
    /// is ignored.
    pub fn on_remote_answer(
        &mut self,
        answer: SessionDescription,
        candidates: &mut CandidateQueue,
    ) -> Result<(), SignalingError> {
        if self.state != NegotiationState::OfferSent {
            warn!(
                "Ignoring answer from {} in state {:?}",
                self.peer, self.state
            );
            return Ok(());
        }
        self.submit(LinkOp::AcceptAnswer(answer));
        self.transition(NegotiationState::AnswerExchanged);
        self.apply_buffered(candidates);
        Ok(())
    }

    /// Completion of `on_remote_answer`
    pub fn on_answer_applied(&mut self, result: anyhow::Result<()>) -> Result<(), SignalingError> {
        match result {
            Ok(()) => {
                debug!("Remote answer from {} applied", self.peer);
                Ok(())
            }
            Err(_) if self.state.is_terminal() => Ok(()),
            Err(e) => Err(self.fail(format!("{:#}", e))),
        }
    }

    pub fn on_remote_candidate(&mut self, candidate: IceCandidate, candidates: &mut CandidateQueue) {
        if self.state.is_terminal() {
            debug!("Dropping candidate for {} in {:?}", self.peer, self.state);
        } else if self.state.has_remote_description() {
            self.submit(LinkOp::AddCandidates(vec![candidate]));
        } else {
            candidates.enqueue(&self.peer, candidate);
        }
    }

    /// Candidate gathered by the local engine
    pub fn on_local_candidate(&mut self, candidate: IceCandidate, channel: &dyn RoomChannel) {
        if self.state.is_terminal() {
            return;
        }
        if self.state.has_sent_description() {
            channel.send(RoomMessage::IceCandidate {
                sender_id: None,
                target_id: Some(self.peer.clone()),
                candidate,
            });
        } else {
            self.held_candidates.push(candidate);
        }
    }

    pub fn on_connection_state_changed(&mut self, state: ConnectionState) {
        if self.state.is_terminal() {
            return;
        }
        match state {
            ConnectionState::Connected => match self.state {
                NegotiationState::AnswerExchanged => self.transition(NegotiationState::Connected),
                NegotiationState::Connected => {}
                other => debug!(
                    "Ignoring premature connected for {} in {:?}",
                    self.peer, other
                ),
            },
            ConnectionState::Failed => {
                warn!("Connection to {} failed", self.peer);
                self.transition(NegotiationState::Failed);
            }
            ConnectionState::Closed => self.transition(NegotiationState::Closed),
            other => debug!("Connection to {} is {}", self.peer, other),
        }
    }

    /// Tear down: terminal `Closed` unless already terminal, link released
    pub fn close(&mut self) {
        if !self.state.is_terminal() {
            self.transition(NegotiationState::Closed);
        }
        self.held_candidates.clear();
        if let Some(link) = self.link.take() {
            link.close();
        }
    }

    fn apply_buffered(&mut self, candidates: &mut CandidateQueue) {
        let buffered = candidates.drain(&self.peer);
        if !buffered.is_empty() {
            debug!(
                "Applying {} buffered candidates for {}",
                buffered.len(),
                self.peer
            );
            self.submit(LinkOp::AddCandidates(buffered));
        }
    }

    fn flush_held(&mut self, channel: &dyn RoomChannel) {
        for candidate in self.held_candidates.drain(..) {
            channel.send(RoomMessage::IceCandidate {
                sender_id: None,
                target_id: Some(self.peer.clone()),
                candidate,
            });
        }
    }

    fn submit(&self, op: LinkOp) {
        if let Some(link) = &self.link {
            link.submit(op);
        }
    }

    fn transition(&mut self, next: NegotiationState) {
        debug!("Peer {}: {:?} -> {:?}", self.peer, self.state, next);
        self.state = next;
    }

    fn fail(&mut self, reason: String) -> SignalingError {
        self.transition(NegotiationState::Failed);
        SignalingError::Negotiation {
            peer: self.peer.clone(),
            reason,
        }
    }

    fn illegal(&self, event: &'static str) -> SignalingError {
        SignalingError::IllegalTransition {
            peer: self.peer.clone(),
            event,
            state: self.state,
        }
    }
}
