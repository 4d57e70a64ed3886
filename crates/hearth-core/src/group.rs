//! Per-epoch group message cipher.
//!
//! One symmetric key per epoch encrypts all chat in the room. Nonces are
//! derived deterministically from (sender, sequence, epoch) so senders
//! never coordinate, and the same triple is bound into the AAD so a frame
//! cannot be replayed under different metadata. A per-sender high-water
//! mark rejects replays and reordering within an epoch; messages that
//! arrive before any key is installed wait in a bounded buffer.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;
use thiserror::Error;

use hearth_crypto::{aead, b64, hash, SymmetricKey};
use hearth_proto::MsgFrame;

/// Domain prefix for deterministic message nonces.
const NONCE_CONTEXT: &str = "NT-v1|nonce|";

/// Most `m` frames held while waiting for a group key.
const PENDING_CAP: usize = 64;

/// Errors from the send path. The receive path never errors; it drops.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GroupError {
    /// No group key installed yet; the caller buffers its plaintext.
    #[error("no group key installed")]
    NoGroupKey,

    /// The send sequence exhausted this epoch; a rekey is required before
    /// any further sends.
    #[error("send sequence exhausted for epoch {epoch}")]
    SeqExhausted {
        /// Epoch whose sequence space ran out.
        epoch: u64,
    },
}

/// Deterministic 24-byte nonce for an `m` frame.
///
/// Pure in its inputs; both sides recompute it from frame metadata rather
/// than trusting bytes on the wire.
pub fn message_nonce(cid: &str, seq: u64, epoch: u64) -> [u8; aead::NONCE_SIZE] {
    hash::digest(format!("{NONCE_CONTEXT}{cid}|{seq}|{epoch}").as_bytes())
}

#[derive(Serialize)]
struct MsgAad<'a> {
    t: &'static str,
    cid: &'a str,
    s: u64,
    e: u64,
}

/// Canonical AAD for an `m` frame: JSON with fixed field order
/// `t, cid, s, e`.
pub fn message_aad(cid: &str, seq: u64, epoch: u64) -> Vec<u8> {
    let Ok(bytes) = serde_json::to_vec(&MsgAad { t: "m", cid, s: seq, e: epoch }) else {
        unreachable!("aad struct serializes to JSON without error");
    };
    bytes
}

/// Group cipher state for one session.
///
/// # Invariants
///
/// - `epoch` strictly increases across installs
/// - an accepted inbound frame from `cid` satisfies
///   `s > recv_seq[cid]` and `e == epoch`
/// - `send_seq` strictly increases between rekeys and resets to 0 on every
///   install
pub struct GroupCipher {
    key: Option<SymmetricKey>,
    epoch: u64,
    send_seq: u64,
    recv_seq: HashMap<String, u64>,
    pending: VecDeque<MsgFrame>,
}

impl GroupCipher {
    /// Fresh state: epoch 0, no key, nothing buffered.
    pub fn new() -> Self {
        Self {
            key: None,
            epoch: 0,
            send_seq: 0,
            recv_seq: HashMap::new(),
            pending: VecDeque::new(),
        }
    }

    /// Current epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether a group key is installed.
    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }

    /// Own next send sequence.
    pub fn send_seq(&self) -> u64 {
        self.send_seq
    }

    /// Number of frames waiting for a key.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Install a key for `epoch`, resetting both sequence spaces.
    ///
    /// Callers guarantee `epoch` is greater than the current epoch except
    /// for the very first install at epoch ≥ 1.
    pub fn install(&mut self, key: SymmetricKey, epoch: u64) {
        debug_assert!(epoch > self.epoch || (self.epoch == 0 && !self.has_key()));

        self.key = Some(key);
        self.epoch = epoch;
        self.send_seq = 0;
        self.recv_seq.clear();
    }

    /// Drop the key and all buffered state. Part of session teardown.
    pub fn wipe(&mut self) {
        self.key = None;
        self.epoch = 0;
        self.send_seq = 0;
        self.recv_seq.clear();
        self.pending.clear();
    }

    /// Encrypt a plaintext as the next `m` frame from `self_cid`.
    ///
    /// # Errors
    ///
    /// [`GroupError::NoGroupKey`] before the first install;
    /// [`GroupError::SeqExhausted`] if the sequence space for this epoch is
    /// spent (the caller forces a rekey or refuses the send).
    pub fn encrypt(&mut self, self_cid: &str, plaintext: &[u8]) -> Result<MsgFrame, GroupError> {
        let Some(key) = &self.key else {
            return Err(GroupError::NoGroupKey);
        };

        if self.send_seq == u64::MAX {
            return Err(GroupError::SeqExhausted { epoch: self.epoch });
        }

        let seq = self.send_seq;
        let nonce = message_nonce(self_cid, seq, self.epoch);
        let aad = message_aad(self_cid, seq, self.epoch);
        let ciphertext = aead::seal(key.as_bytes(), &nonce, plaintext, &aad);

        self.send_seq += 1;

        Ok(MsgFrame {
            cid: self_cid.to_string(),
            s: seq,
            e: self.epoch,
            n: b64::encode(&nonce),
            c: b64::encode(&ciphertext),
        })
    }

    /// Decrypt an inbound `m` frame.
    ///
    /// Returns the plaintext on success. Returns `None` and buffers the
    /// frame when no key is installed yet; returns `None` and drops it on
    /// wrong epoch, replay, or authentication failure.
    pub fn decrypt(&mut self, frame: MsgFrame) -> Option<Vec<u8>> {
        if self.key.is_none() {
            if self.pending.len() == PENDING_CAP {
                self.pending.pop_front();
            }
            self.pending.push_back(frame);
            return None;
        }

        self.decrypt_at_current_epoch(&frame)
    }

    /// Retry buffered frames against the current key and epoch.
    ///
    /// Frames from older epochs are discarded; frames from future epochs
    /// stay buffered for the next install. Returns `(sender, plaintext)`
    /// pairs in arrival order.
    pub fn flush(&mut self) -> Vec<(String, Vec<u8>)> {
        if self.key.is_none() {
            return Vec::new();
        }

        let mut delivered = Vec::new();
        let mut retained = VecDeque::new();

        while let Some(frame) = self.pending.pop_front() {
            if frame.e > self.epoch {
                retained.push_back(frame);
                continue;
            }
            if frame.e < self.epoch {
                tracing::debug!(sender = %frame.cid, epoch = frame.e, "discarding stale buffered frame");
                continue;
            }
            if let Some(plaintext) = self.decrypt_at_current_epoch(&frame) {
                delivered.push((frame.cid, plaintext));
            }
        }

        self.pending = retained;
        delivered
    }

    fn decrypt_at_current_epoch(&mut self, frame: &MsgFrame) -> Option<Vec<u8>> {
        let key = self.key.as_ref()?;

        if frame.e != self.epoch {
            tracing::debug!(
                sender = %frame.cid,
                frame_epoch = frame.e,
                epoch = self.epoch,
                "dropping wrong-epoch message"
            );
            return None;
        }

        if let Some(&last) = self.recv_seq.get(&frame.cid) {
            if frame.s <= last {
                tracing::debug!(sender = %frame.cid, seq = frame.s, last, "dropping replayed message");
                return None;
            }
        }

        // Nonce and AAD are recomputed from the frame's own metadata; the
        // wire nonce is advisory.
        let nonce = message_nonce(&frame.cid, frame.s, frame.e);
        let aad = message_aad(&frame.cid, frame.s, frame.e);
        let ciphertext = b64::decode(&frame.c).ok()?;

        let plaintext = aead::open(key.as_bytes(), &nonce, &ciphertext, &aad).ok()?;

        self.recv_seq.insert(frame.cid.clone(), frame.s);
        Some(plaintext)
    }
}

impl Default for GroupCipher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed(epoch: u64) -> GroupCipher {
        let mut cipher = GroupCipher::new();
        cipher.install(SymmetricKey::from([0x11; 32]), epoch);
        cipher
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let mut alice = keyed(1);
        let mut bob = keyed(1);

        let frame = alice.encrypt("alice", b"hi").unwrap();
        assert_eq!(frame.s, 0);
        assert_eq!(frame.e, 1);

        assert_eq!(bob.decrypt(frame).unwrap(), b"hi");
    }

    #[test]
    fn encrypt_without_key_refuses() {
        let mut cipher = GroupCipher::new();
        assert_eq!(cipher.encrypt("alice", b"hi"), Err(GroupError::NoGroupKey));
    }

    #[test]
    fn send_seq_increments_per_message() {
        let mut cipher = keyed(1);

        for expected in 0..5 {
            let frame = cipher.encrypt("alice", b"x").unwrap();
            assert_eq!(frame.s, expected);
        }
        assert_eq!(cipher.send_seq(), 5);
    }

    #[test]
    fn replayed_frame_is_dropped() {
        let mut alice = keyed(1);
        let mut bob = keyed(1);

        let frame = alice.encrypt("alice", b"once").unwrap();
        assert!(bob.decrypt(frame.clone()).is_some());
        assert!(bob.decrypt(frame).is_none());
    }

    #[test]
    fn out_of_order_frame_is_dropped() {
        let mut alice = keyed(1);
        let mut bob = keyed(1);

        let first = alice.encrypt("alice", b"one").unwrap();
        let second = alice.encrypt("alice", b"two").unwrap();

        assert!(bob.decrypt(second).is_some());
        assert!(bob.decrypt(first).is_none());
    }

    #[test]
    fn replay_windows_are_per_sender() {
        let mut alice = keyed(1);
        let mut carol = keyed(1);
        let mut bob = keyed(1);

        let from_alice = alice.encrypt("alice", b"a0").unwrap();
        let from_carol = carol.encrypt("carol", b"c0").unwrap();

        // Same sequence number, different senders: both accepted
        assert!(bob.decrypt(from_alice).is_some());
        assert!(bob.decrypt(from_carol).is_some());
    }

    #[test]
    fn wrong_epoch_frame_is_dropped_when_keyed() {
        let mut alice = keyed(1);
        let mut bob = keyed(2);

        let stale = alice.encrypt("alice", b"old").unwrap();
        assert!(bob.decrypt(stale).is_none());
        assert_eq!(bob.pending_len(), 0);
    }

    #[test]
    fn tampered_metadata_fails_authentication() {
        let mut alice = keyed(1);

        let frame = alice.encrypt("alice", b"hi").unwrap();

        // Flip each AAD-bound field in turn; all must fail
        let mut bob = keyed(1);
        let mut wrong_sender = frame.clone();
        wrong_sender.cid = "mallory".into();
        assert!(bob.decrypt(wrong_sender).is_none());

        let mut bob = keyed(1);
        let mut wrong_seq = frame.clone();
        wrong_seq.s = 7;
        assert!(bob.decrypt(wrong_seq).is_none());

        // And the untouched original still decrypts
        let mut bob = keyed(1);
        assert!(bob.decrypt(frame).is_some());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let mut alice = keyed(1);
        let mut bob = keyed(1);

        let mut frame = alice.encrypt("alice", b"hi").unwrap();
        let mut raw = b64::decode(&frame.c).unwrap();
        raw[0] ^= 0xFF;
        frame.c = b64::encode(&raw);

        assert!(bob.decrypt(frame).is_none());
    }

    #[test]
    fn early_frames_buffer_then_flush() {
        let mut alice = keyed(3);
        let mut bob = GroupCipher::new();

        let f0 = alice.encrypt("alice", b"first").unwrap();
        let f1 = alice.encrypt("alice", b"second").unwrap();

        assert!(bob.decrypt(f0).is_none());
        assert!(bob.decrypt(f1).is_none());
        assert_eq!(bob.pending_len(), 2);

        bob.install(SymmetricKey::from([0x11; 32]), 3);
        let delivered = bob.flush();

        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0], ("alice".to_string(), b"first".to_vec()));
        assert_eq!(delivered[1], ("alice".to_string(), b"second".to_vec()));
        assert_eq!(bob.pending_len(), 0);
    }

    #[test]
    fn flush_keeps_future_epochs_and_discards_stale() {
        let mut old_epoch = keyed(1);
        let mut next_epoch = keyed(3);

        let stale = old_epoch.encrypt("alice", b"stale").unwrap();
        let future = next_epoch.encrypt("alice", b"future").unwrap();

        let mut bob = GroupCipher::new();
        assert!(bob.decrypt(stale).is_none());
        assert!(bob.decrypt(future).is_none());

        bob.install(SymmetricKey::from([0x22; 32]), 2);
        assert!(bob.flush().is_empty());

        // Stale (e=1) gone, future (e=3) retained
        assert_eq!(bob.pending_len(), 1);

        bob.install(SymmetricKey::from([0x11; 32]), 3);
        let delivered = bob.flush();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].1, b"future");
    }

    #[test]
    fn pending_buffer_is_bounded() {
        let mut alice = keyed(1);
        let mut bob = GroupCipher::new();

        for _ in 0..(PENDING_CAP + 10) {
            let frame = alice.encrypt("alice", b"x").unwrap();
            bob.decrypt(frame);
        }

        assert_eq!(bob.pending_len(), PENDING_CAP);
    }

    #[test]
    fn install_resets_sequences() {
        let mut alice = keyed(1);
        let mut bob = keyed(1);

        let frame = alice.encrypt("alice", b"hi").unwrap();
        assert!(bob.decrypt(frame).is_some());
        assert_eq!(alice.send_seq(), 1);

        alice.install(SymmetricKey::from([0x33; 32]), 2);
        bob.install(SymmetricKey::from([0x33; 32]), 2);

        assert_eq!(alice.send_seq(), 0);

        // Sequence 0 is valid again in the new epoch
        let frame = alice.encrypt("alice", b"again").unwrap();
        assert_eq!(frame.s, 0);
        assert!(bob.decrypt(frame).is_some());
    }

    #[test]
    fn nonce_is_pure_in_its_inputs() {
        assert_eq!(message_nonce("alice", 4, 2), message_nonce("alice", 4, 2));
        assert_ne!(message_nonce("alice", 4, 2), message_nonce("alice", 5, 2));
        assert_ne!(message_nonce("alice", 4, 2), message_nonce("alice", 4, 3));
        assert_ne!(message_nonce("alice", 4, 2), message_nonce("bob", 4, 2));
    }

    #[test]
    fn aad_is_canonical_json() {
        assert_eq!(message_aad("abc", 3, 9), br#"{"t":"m","cid":"abc","s":3,"e":9}"#);
    }

    #[test]
    fn wipe_clears_everything() {
        let mut cipher = keyed(5);
        cipher.encrypt("alice", b"x").unwrap();

        cipher.wipe();

        assert!(!cipher.has_key());
        assert_eq!(cipher.epoch(), 0);
        assert_eq!(cipher.send_seq(), 0);
        assert_eq!(cipher.pending_len(), 0);
    }
}
