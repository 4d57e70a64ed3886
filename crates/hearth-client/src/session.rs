//! The session state machine.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use hearth_core::{
    capsule, group::GroupError, handshake, roster, EnvRng, Environment, GroupCipher, Role, Roster,
};
use hearth_crypto::{b64, sign, KeyMaterial};
use hearth_proto::{
    AnnounceFrame, CtFrame, Frame, GkFrame, GkReqFrame, HelloFrame, LeaveFrame, MsgFrame,
};

use crate::{
    config::SessionConfig,
    error::SessionError,
    event::{SessionAction, SessionEvent},
    peer::PeerRecord,
};

/// Guest-side retry while waiting for the first group key of a pair.
struct GkRetry<I> {
    /// The host being asked.
    host: String,
    /// When the current wait began.
    started_at: I,
    /// Current wait; doubles after each send.
    delay: Duration,
    /// `gk_req` frames sent so far.
    attempts_used: u32,
}

/// Role-specific state. The host mints keys; guests load them.
enum RoleState<I> {
    Host {
        /// Guests that said hello and await admission.
        pending_approval: HashSet<String>,
        /// When the debounced rekey was last requested; re-armed on every
        /// membership change.
        rekey_requested_at: Option<I>,
        /// When the last externally-triggered rekey ran (throttle).
        last_forced_rekey: Option<I>,
    },
    Guest {
        /// One buffered `gk` per sender whose pair key is still pending.
        buffered_gk: HashMap<String, GkFrame>,
        /// Active retry, if any.
        retry: Option<GkRetry<I>>,
    },
}

/// One participant's session in one room.
///
/// All state mutation happens inside [`Session::handle`], on the caller's
/// single task. See the crate docs for the event/action contract.
pub struct Session<E: Environment> {
    env: E,
    config: SessionConfig,
    room: String,
    local: KeyMaterial,
    peers: HashMap<String, PeerRecord>,
    roster: Roster,
    cipher: GroupCipher,
    role: RoleState<E::Instant>,
    wiped: bool,
}

impl<E: Environment> Session<E> {
    /// Create a hosting session for `room`.
    pub fn host(env: E, config: SessionConfig, room: &str) -> Self {
        let local = KeyMaterial::generate(&mut EnvRng::new(&env));
        tracing::debug!(room, cid = %local.cid(), "hosting room");

        Self {
            env,
            config,
            room: room.to_string(),
            local,
            peers: HashMap::new(),
            roster: Roster::new(),
            cipher: GroupCipher::new(),
            role: RoleState::Host {
                pending_approval: HashSet::new(),
                rekey_requested_at: None,
                last_forced_rekey: None,
            },
            wiped: false,
        }
    }

    /// Create a guest session from a capsule.
    ///
    /// Verifies the capsule against the current wall clock, records the
    /// host as a known peer, and returns the `hello` announcing us.
    ///
    /// # Errors
    ///
    /// [`SessionError::Capsule`] when the capsule is rejected.
    pub fn join(
        env: E,
        config: SessionConfig,
        capsule_text: &str,
    ) -> Result<(Self, Vec<SessionAction>), SessionError> {
        let invitation = capsule::parse(capsule_text, env.wall_clock_secs())?;
        let local = KeyMaterial::generate(&mut EnvRng::new(&env));
        tracing::debug!(room = %invitation.room, cid = %local.cid(), host = %invitation.cid, "joining room");

        let host_public = hearth_core::PeerPublic {
            id_pub: invitation.id_pub,
            x_pub: invitation.x_pub,
            pq_pub: invitation.pq_pub,
        };

        let mut peers = HashMap::new();
        peers.insert(invitation.cid.clone(), PeerRecord::new(host_public));

        let session = Self {
            env,
            config,
            room: invitation.room,
            local,
            peers,
            roster: Roster::new(),
            cipher: GroupCipher::new(),
            role: RoleState::Guest { buffered_gk: HashMap::new(), retry: None },
            wiped: false,
        };

        let hello = Frame::Hello(HelloFrame {
            cid: session.local.cid().to_string(),
            x: b64::encode(&session.local.x_public()),
            k: b64::encode(session.local.pq_public()),
            id: b64::encode(&session.local.id_public().to_bytes()),
        });

        Ok((session, vec![SessionAction::SendFrame(hello)]))
    }

    /// Our participant id.
    pub fn cid(&self) -> &str {
        self.local.cid()
    }

    /// The room name.
    pub fn room(&self) -> &str {
        &self.room
    }

    /// Current group epoch.
    pub fn epoch(&self) -> u64 {
        self.cipher.epoch()
    }

    /// Whether a group key is installed and chat can flow.
    pub fn is_keyed(&self) -> bool {
        self.cipher.has_key()
    }

    /// Whether this session mints group keys.
    pub fn is_initiator(&self) -> bool {
        matches!(self.role, RoleState::Host { .. })
    }

    /// State for a known peer.
    pub fn peer(&self, cid: &str) -> Option<&PeerRecord> {
        self.peers.get(cid)
    }

    /// Whether `cid` is awaiting host approval.
    pub fn is_pending_approval(&self, cid: &str) -> bool {
        match &self.role {
            RoleState::Host { pending_approval, .. } => pending_approval.contains(cid),
            RoleState::Guest { .. } => false,
        }
    }

    /// Mint a capsule inviting guests to this room.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotInitiator`] on a guest session.
    pub fn invite(&self) -> Result<String, SessionError> {
        if !self.is_initiator() {
            return Err(SessionError::NotInitiator);
        }
        Ok(capsule::create(
            &self.room,
            &self.local,
            self.env.wall_clock_secs(),
            &mut EnvRng::new(&self.env),
        ))
    }

    /// Change whether this session mints group keys.
    ///
    /// Intended for leadership handoff. Role-specific transient state
    /// (pending approvals, retry timers, buffered keys) does not survive
    /// the switch; shared state (peers, roster, cipher) does.
    pub fn set_initiator(&mut self, initiator: bool) {
        if initiator == self.is_initiator() {
            return;
        }
        self.role = if initiator {
            RoleState::Host {
                pending_approval: HashSet::new(),
                rekey_requested_at: None,
                last_forced_rekey: None,
            }
        } else {
            RoleState::Guest { buffered_gk: HashMap::new(), retry: None }
        };
    }

    /// Process an event and return the resulting actions.
    ///
    /// # Errors
    ///
    /// Only caller-initiated operations error; see [`SessionError`].
    /// Inbound frames that fail any check are dropped silently.
    pub fn handle(
        &mut self,
        event: SessionEvent<E::Instant>,
    ) -> Result<Vec<SessionAction>, SessionError> {
        if self.wiped {
            return Ok(Vec::new());
        }

        match event {
            SessionEvent::FrameReceived(text) => self.handle_relay_text(&text),
            SessionEvent::SendText(text) => Ok(self.handle_send_text(&text)),
            SessionEvent::Approve { cid } => self.handle_approve(&cid),
            SessionEvent::Rekey => Ok(self.handle_explicit_rekey()),
            SessionEvent::Tick { now } => Ok(self.handle_tick(now)),
            SessionEvent::Wipe => Ok(self.handle_wipe()),
        }
    }

    fn handle_relay_text(&mut self, text: &str) -> Result<Vec<SessionAction>, SessionError> {
        let frame = match hearth_proto::decode(text) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::debug!(%err, "dropping undecodable relay text");
                return Ok(Vec::new());
            }
        };

        // A misbehaving relay may echo our own frames back.
        if frame.sender() == Some(self.local.cid()) {
            return Ok(Vec::new());
        }

        // Addressed frames are broadcast by the relay; recipients filter.
        if let Some(to) = frame.recipient() {
            if to != self.local.cid() {
                return Ok(Vec::new());
            }
        }

        match frame {
            Frame::Hello(f) => Ok(self.handle_hello(f)),
            Frame::Announce(f) => Ok(self.handle_announce(f)),
            Frame::Ct(f) => self.handle_ct(f),
            Frame::Gk(f) => Ok(self.handle_gk(f)),
            Frame::GkReq(f) => Ok(self.handle_gk_req(&f)),
            Frame::Msg(f) => Ok(self.handle_msg(f)),
            Frame::Leave(f) => Ok(self.handle_leave(&f)),
            Frame::Chaff(_) | Frame::Ping => Ok(Vec::new()),
        }
    }

    fn handle_hello(&mut self, frame: HelloFrame) -> Vec<SessionAction> {
        let Some(record) = PeerRecord::from_wire(&frame.x, &frame.k, &frame.id) else {
            tracing::debug!(cid = %frame.cid, "dropping hello with malformed material");
            return Vec::new();
        };

        let is_new = !self.peers.contains_key(&frame.cid);
        self.peers.insert(frame.cid.clone(), record);

        let mut actions = Vec::new();

        // Introduce ourselves so the joiner learns existing members.
        if is_new {
            actions.push(SessionAction::SendFrame(Frame::Announce(AnnounceFrame {
                cid: self.local.cid().to_string(),
                x: b64::encode(&self.local.x_public()),
                k: b64::encode(self.local.pq_public()),
                id: b64::encode(&self.local.id_public().to_bytes()),
            })));
        }

        if let RoleState::Host { pending_approval, .. } = &mut self.role {
            if !self.roster.contains(&frame.cid) && pending_approval.insert(frame.cid.clone()) {
                actions.push(SessionAction::ApprovalRequested { cid: frame.cid });
            }
        }

        actions
    }

    fn handle_announce(&mut self, frame: AnnounceFrame) -> Vec<SessionAction> {
        if self.peers.contains_key(&frame.cid) {
            return Vec::new();
        }

        if let Some(record) = PeerRecord::from_wire(&frame.x, &frame.k, &frame.id) {
            self.peers.insert(frame.cid, record);
        }
        Vec::new()
    }

    fn handle_approve(&mut self, cid: &str) -> Result<Vec<SessionAction>, SessionError> {
        let RoleState::Host { pending_approval, .. } = &mut self.role else {
            return Err(SessionError::NotInitiator);
        };

        if !pending_approval.remove(cid) {
            return Err(SessionError::NotPendingApproval { cid: cid.to_string() });
        }

        let Some(peer) = self.peers.get(cid) else {
            return Err(SessionError::UnknownPeer { cid: cid.to_string() });
        };

        let outcome = handshake::handshake_with(
            &self.local,
            &peer.public,
            None,
            None,
            Role::Init,
            &self.room,
            &mut EnvRng::new(&self.env),
        )?;

        let ct = outcome.kem_ciphertext.unwrap_or_default();
        let signature = outcome.signature;

        let mut actions = vec![
            SessionAction::SendFrame(Frame::Ct(CtFrame {
                cid: self.local.cid().to_string(),
                to: cid.to_string(),
                ct: b64::encode(&ct),
                sig: signature.as_ref().map(|sig| b64::encode(&sig.to_bytes())),
            })),
            SessionAction::SasReady { cid: cid.to_string(), sas: outcome.sas.clone() },
        ];

        if let Some(peer) = self.peers.get_mut(cid) {
            peer.kem_ciphertext = Some(ct);
            peer.signature = signature;
            peer.sas = Some(outcome.sas);
        }

        self.roster.insert(cid.to_string(), outcome.pair_key);
        tracing::debug!(cid, members = self.roster.len(), "admitted guest");
        self.schedule_rekey();

        actions.extend(self.flush_pending());
        Ok(actions)
    }

    fn handle_ct(&mut self, frame: CtFrame) -> Result<Vec<SessionAction>, SessionError> {
        if self.is_initiator() {
            return Ok(Vec::new());
        }

        let Some(peer) = self.peers.get_mut(&frame.cid) else {
            tracing::debug!(cid = %frame.cid, "dropping ct from unknown peer");
            return Ok(Vec::new());
        };

        let Ok(ct) = b64::decode(&frame.ct) else {
            return Ok(Vec::new());
        };

        let signature = match &frame.sig {
            Some(text) => match b64::decode_array::<{ sign::SIGNATURE_SIZE }>(text, "signature") {
                Ok(bytes) => Some(sign::Signature::from_bytes(&bytes)),
                Err(_) => return Ok(Vec::new()),
            },
            None => None,
        };

        peer.kem_ciphertext = Some(ct.clone());
        peer.signature = signature;

        let outcome = handshake::handshake_with(
            &self.local,
            &peer.public,
            Some(&ct),
            signature.as_ref(),
            Role::Resp,
            &self.room,
            &mut EnvRng::new(&self.env),
        )?;

        peer.sig_ok = outcome.sig_ok;
        peer.sas = Some(outcome.sas.clone());

        let mut actions =
            vec![SessionAction::SasReady { cid: frame.cid.clone(), sas: outcome.sas }];

        if outcome.sig_ok == Some(false) {
            tracing::warn!(cid = %frame.cid, "peer transcript signature did not verify");
            actions.push(SessionAction::SignatureMismatch { cid: frame.cid.clone() });
        }

        self.roster.insert(frame.cid.clone(), outcome.pair_key);

        let buffered = match &mut self.role {
            RoleState::Guest { buffered_gk, .. } => buffered_gk.remove(&frame.cid),
            RoleState::Host { .. } => None,
        };

        if let Some(gk) = buffered {
            actions.extend(self.apply_gk(&gk));
        }

        // Still unkeyed: ask for a group key if none shows up in time.
        if !self.cipher.has_key() {
            let started_at = self.env.now();
            if let RoleState::Guest { retry, .. } = &mut self.role {
                *retry = Some(GkRetry {
                    host: frame.cid,
                    started_at,
                    delay: self.config.gk_retry_initial,
                    attempts_used: 0,
                });
            }
        }

        Ok(actions)
    }

    fn handle_gk(&mut self, frame: GkFrame) -> Vec<SessionAction> {
        if !matches!(self.role, RoleState::Guest { .. }) {
            return Vec::new();
        }

        if self.roster.contains(&frame.cid) {
            return self.apply_gk(&frame);
        }

        // One buffered slot per sender; a newer key replaces an older one.
        if let RoleState::Guest { buffered_gk, .. } = &mut self.role {
            buffered_gk.insert(frame.cid.clone(), frame);
        }
        Vec::new()
    }

    /// Unwrap, install, and flush. Cancels the retry on success.
    fn apply_gk(&mut self, frame: &GkFrame) -> Vec<SessionAction> {
        let Some(pair_key) = self.roster.pair_key(&frame.cid) else {
            return Vec::new();
        };

        if !roster::load(&mut self.cipher, frame, pair_key) {
            return Vec::new();
        }

        if let RoleState::Guest { retry, .. } = &mut self.role {
            *retry = None;
        }

        let mut actions = vec![SessionAction::Ready { epoch: self.cipher.epoch() }];
        actions.extend(self.flush_pending());
        actions
    }

    fn handle_gk_req(&mut self, frame: &GkReqFrame) -> Vec<SessionAction> {
        let now = self.env.now();
        let throttle = self.config.rekey_throttle;

        match &mut self.role {
            RoleState::Host { last_forced_rekey, .. } => {
                if last_forced_rekey.is_some_and(|last| now - last < throttle) {
                    tracing::debug!(cid = %frame.cid, "throttling gk_req");
                    return Vec::new();
                }
                *last_forced_rekey = Some(now);
            }
            RoleState::Guest { .. } => return Vec::new(),
        }

        self.perform_rekey()
    }

    fn handle_msg(&mut self, frame: MsgFrame) -> Vec<SessionAction> {
        let cid = frame.cid.clone();
        match self.cipher.decrypt(frame) {
            Some(plaintext) => vec![SessionAction::DeliverText {
                cid,
                text: String::from_utf8_lossy(&plaintext).into_owned(),
            }],
            None => Vec::new(),
        }
    }

    fn handle_leave(&mut self, frame: &LeaveFrame) -> Vec<SessionAction> {
        let known = self.peers.remove(&frame.cid).is_some();
        let was_member = self.roster.remove(&frame.cid);

        if let RoleState::Host { pending_approval, .. } = &mut self.role {
            pending_approval.remove(&frame.cid);
        }
        if self.is_initiator() && was_member {
            self.schedule_rekey();
        }

        if known || was_member {
            tracing::debug!(cid = %frame.cid, "peer left");
            vec![SessionAction::PeerLeft { cid: frame.cid.clone() }]
        } else {
            Vec::new()
        }
    }

    fn handle_send_text(&mut self, text: &str) -> Vec<SessionAction> {
        let cid = self.local.cid().to_string();
        match self.cipher.encrypt(&cid, text.as_bytes()) {
            Ok(frame) => vec![SessionAction::SendFrame(Frame::Msg(frame))],
            Err(GroupError::NoGroupKey) => {
                tracing::debug!("send before group key; caller buffers");
                Vec::new()
            }
            Err(GroupError::SeqExhausted { epoch }) => {
                if self.is_initiator() {
                    tracing::warn!(epoch, "send sequence exhausted; forcing rekey");
                    self.schedule_rekey();
                } else {
                    tracing::warn!(epoch, "send sequence exhausted; refusing sends until rekey");
                }
                Vec::new()
            }
        }
    }

    fn handle_explicit_rekey(&mut self) -> Vec<SessionAction> {
        if !self.is_initiator() {
            return Vec::new();
        }
        if let RoleState::Host { rekey_requested_at, .. } = &mut self.role {
            *rekey_requested_at = None;
        }
        self.perform_rekey()
    }

    fn handle_tick(&mut self, now: E::Instant) -> Vec<SessionAction> {
        let debounce = self.config.rekey_debounce;
        let max_attempts = self.config.gk_retry_max_attempts;
        let keyed = self.cipher.has_key();

        let mut fire_rekey = false;
        let mut request_from: Option<String> = None;

        match &mut self.role {
            RoleState::Host { rekey_requested_at, .. } => {
                if rekey_requested_at.is_some_and(|requested| now - requested >= debounce) {
                    *rekey_requested_at = None;
                    fire_rekey = true;
                }
            }
            RoleState::Guest { retry, .. } => {
                if keyed {
                    *retry = None;
                } else if let Some(state) = retry {
                    if now - state.started_at >= state.delay {
                        if state.attempts_used >= max_attempts {
                            tracing::debug!(host = %state.host, "group key retry exhausted");
                            *retry = None;
                        } else {
                            state.attempts_used += 1;
                            state.started_at = now;
                            state.delay *= 2;
                            tracing::debug!(host = %state.host, attempt = state.attempts_used, "requesting group key");
                            request_from = Some(state.host.clone());
                        }
                    }
                }
            }
        }

        let mut actions = Vec::new();
        if fire_rekey {
            actions.extend(self.perform_rekey());
        }
        if let Some(to) = request_from {
            actions.push(SessionAction::SendFrame(Frame::GkReq(GkReqFrame {
                cid: self.local.cid().to_string(),
                to,
            })));
        }
        actions
    }

    fn handle_wipe(&mut self) -> Vec<SessionAction> {
        let leave = Frame::Leave(LeaveFrame { cid: self.local.cid().to_string() });

        self.peers.clear();
        self.roster.clear();
        self.cipher.wipe();
        self.role = if self.is_initiator() {
            RoleState::Host {
                pending_approval: HashSet::new(),
                rekey_requested_at: None,
                last_forced_rekey: None,
            }
        } else {
            RoleState::Guest { buffered_gk: HashMap::new(), retry: None }
        };
        self.wiped = true;

        tracing::debug!(room = %self.room, "session wiped");
        vec![SessionAction::SendFrame(leave), SessionAction::Wiped]
    }

    /// (Re-)arm the debounced rekey. Only meaningful on the host.
    fn schedule_rekey(&mut self) {
        if let RoleState::Host { rekey_requested_at, .. } = &mut self.role {
            *rekey_requested_at = Some(self.env.now());
        }
    }

    /// Mint the next epoch and fan the wrapped key out to every member.
    ///
    /// Readiness is announced before the fan-out frames: the host may
    /// encrypt immediately, and any of its messages that outrun a guest's
    /// install are dropped there as wrong-epoch.
    fn perform_rekey(&mut self) -> Vec<SessionAction> {
        let frames = roster::mint(
            self.local.cid(),
            &self.roster,
            &mut self.cipher,
            &mut EnvRng::new(&self.env),
        );

        let mut actions = vec![SessionAction::Ready { epoch: self.cipher.epoch() }];
        actions.extend(frames.into_iter().map(|f| SessionAction::SendFrame(Frame::Gk(f))));
        actions.extend(self.flush_pending());
        actions
    }

    /// Drain the pending buffer into deliveries.
    fn flush_pending(&mut self) -> Vec<SessionAction> {
        self.cipher
            .flush()
            .into_iter()
            .map(|(cid, plaintext)| SessionAction::DeliverText {
                cid,
                text: String::from_utf8_lossy(&plaintext).into_owned(),
            })
            .collect()
    }
}
