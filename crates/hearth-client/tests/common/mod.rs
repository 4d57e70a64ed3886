//! Shared helpers for session integration tests.

#![allow(dead_code)]

use std::time::Duration;

use hearth_client::{Environment, Session, SessionAction, SessionConfig, SessionEvent};
use hearth_harness::SimEnv;
use hearth_proto::Frame;

/// Extract frames queued for the relay.
pub fn frames(actions: &[SessionAction]) -> Vec<Frame> {
    actions
        .iter()
        .filter_map(|a| match a {
            SessionAction::SendFrame(frame) => Some(frame.clone()),
            _ => None,
        })
        .collect()
}

/// Extract delivered plaintexts as `(sender, text)`.
pub fn delivered(actions: &[SessionAction]) -> Vec<(String, String)> {
    actions
        .iter()
        .filter_map(|a| match a {
            SessionAction::DeliverText { cid, text } => Some((cid.clone(), text.clone())),
            _ => None,
        })
        .collect()
}

/// Count `Ready` notifications (one per installed epoch).
pub fn ready_count(actions: &[SessionAction]) -> usize {
    actions.iter().filter(|a| matches!(a, SessionAction::Ready { .. })).count()
}

/// Deliver one frame to a session the way the relay would.
pub fn deliver(session: &mut Session<SimEnv>, frame: &Frame) -> Vec<SessionAction> {
    session
        .handle(SessionEvent::FrameReceived(hearth_proto::encode(frame)))
        .expect("frame handling does not error")
}

/// Tick a session at its environment's current time.
pub fn tick(session: &mut Session<SimEnv>, env: &SimEnv) -> Vec<SessionAction> {
    session.handle(SessionEvent::Tick { now: env.now() }).expect("tick does not error")
}

/// A host and one admitted, keyed guest (the two-party join flow).
pub struct TwoParty {
    pub host: Session<SimEnv>,
    pub host_env: SimEnv,
    pub guest: Session<SimEnv>,
    pub guest_env: SimEnv,
    /// The epoch-1 `gk` frame the guest installed, kept for replay tests.
    pub first_gk: Frame,
}

/// Run the full join flow: capsule, hello, approve, ct, debounced rekey,
/// group-key install. Panics if any step deviates.
pub fn two_party() -> TwoParty {
    let host_env = SimEnv::new(1);
    let guest_env = SimEnv::new(2);

    let mut host = Session::host(host_env.clone(), SessionConfig::default(), "r1");
    let capsule = host.invite().expect("host can invite");

    let (mut guest, join_actions) =
        Session::join(guest_env.clone(), SessionConfig::default(), &capsule)
            .expect("capsule is valid");

    let hello = frames(&join_actions).remove(0);
    let host_actions = deliver(&mut host, &hello);
    assert!(host.is_pending_approval(guest.cid()));
    assert!(host_actions
        .iter()
        .any(|a| matches!(a, SessionAction::ApprovalRequested { cid } if cid == guest.cid())));

    let approve_actions = host
        .handle(SessionEvent::Approve { cid: guest.cid().to_string() })
        .expect("approval succeeds");
    let ct = frames(&approve_actions).remove(0);
    assert!(matches!(ct, Frame::Ct(_)));

    let guest_actions = deliver(&mut guest, &ct);
    assert!(guest_actions.iter().any(|a| matches!(a, SessionAction::SasReady { .. })));

    host_env.advance(Duration::from_millis(50));
    let rekey_actions = tick(&mut host, &host_env);
    assert_eq!(ready_count(&rekey_actions), 1);
    assert_eq!(host.epoch(), 1);

    let gk = frames(&rekey_actions).remove(0);
    assert!(matches!(gk, Frame::Gk(_)));

    let install_actions = deliver(&mut guest, &gk);
    assert_eq!(ready_count(&install_actions), 1);
    assert!(guest.is_keyed());
    assert_eq!(guest.epoch(), 1);

    TwoParty { host, host_env, guest, guest_env, first_gk: gk }
}
