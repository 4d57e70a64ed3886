//! Membership set, roster hash, and group-key distribution.
//!
//! The initiator keeps one pairwise key per admitted member. Each rekey
//! draws a fresh group key, advances the epoch, and wraps the key to every
//! member under their pairwise key. The wrap's AAD includes a 16-byte
//! digest of the initiator's sorted roster, so a member whose view of the
//! roster has diverged cannot silently install the key.
//!
//! Loading is the responder half: epoch downgrades are refused, and a
//! legacy AAD shape (without the roster hash) is tried once for peers that
//! predate roster binding.

use std::collections::HashMap;

use rand_core::{CryptoRng, RngCore};
use serde::Serialize;

use hearth_crypto::{aead, b64, hash, SymmetricKey, SYMMETRIC_KEY_SIZE};
use hearth_proto::GkFrame;

use crate::group::GroupCipher;

/// The members a group key is wrapped for: `cid → pairwise key`.
#[derive(Default)]
pub struct Roster {
    members: HashMap<String, SymmetricKey>,
}

impl Roster {
    /// Empty roster.
    pub fn new() -> Self {
        Self { members: HashMap::new() }
    }

    /// Insert or replace a member's pairwise key.
    pub fn insert(&mut self, cid: String, pair_key: SymmetricKey) {
        self.members.insert(cid, pair_key);
    }

    /// Remove a member. Returns whether it was present.
    pub fn remove(&mut self, cid: &str) -> bool {
        self.members.remove(cid).is_some()
    }

    /// Whether `cid` has a pairwise key.
    pub fn contains(&self, cid: &str) -> bool {
        self.members.contains_key(cid)
    }

    /// Pairwise key for `cid`, if admitted.
    pub fn pair_key(&self, cid: &str) -> Option<&SymmetricKey> {
        self.members.get(cid)
    }

    /// Number of admitted members (excluding self).
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether no members are admitted.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Drop all members and their keys.
    pub fn clear(&mut self) {
        self.members.clear();
    }

    /// Member ids in sorted order.
    fn sorted_cids(&self) -> Vec<&str> {
        let mut cids: Vec<&str> = self.members.keys().map(String::as_str).collect();
        cids.sort_unstable();
        cids
    }
}

/// Canonical roster digest: base64 of a 16-byte hash over the sorted set
/// of participant ids (self included), serialized as a compact JSON array.
pub fn roster_hash(self_cid: &str, roster: &Roster) -> String {
    let mut cids: Vec<&str> = roster.members.keys().map(String::as_str).collect();
    cids.push(self_cid);
    cids.sort_unstable();
    cids.dedup();

    let Ok(json) = serde_json::to_vec(&cids) else {
        unreachable!("a vec of strings serializes to JSON without error");
    };
    b64::encode(&hash::digest::<16>(&json))
}

#[derive(Serialize)]
struct GkAad<'a> {
    t: &'static str,
    cid: &'a str,
    s: u64,
    e: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    rh: Option<&'a str>,
}

/// Canonical AAD for a `gk` wrap: JSON with fixed field order
/// `t, cid, s, e, rh`, the `rh` field present only when bound.
fn gk_aad(sender: &str, epoch: u64, rh: Option<&str>) -> Vec<u8> {
    let Ok(bytes) = serde_json::to_vec(&GkAad { t: "gk", cid: sender, s: 0, e: epoch, rh }) else {
        unreachable!("aad struct serializes to JSON without error");
    };
    bytes
}

/// Mint the next epoch's group key and wrap it to every roster member.
///
/// Installs the new key into `cipher` (epoch `+1`, sequences reset) and
/// returns one `gk` frame per member. The caller transmits the frames; the
/// initiator can encrypt immediately after this returns.
pub fn mint(
    self_cid: &str,
    roster: &Roster,
    cipher: &mut GroupCipher,
    rng: &mut (impl RngCore + CryptoRng),
) -> Vec<GkFrame> {
    let group_key = SymmetricKey::generate(rng);
    let epoch = cipher.epoch() + 1;
    let rh = roster_hash(self_cid, roster);
    let aad = gk_aad(self_cid, epoch, Some(&rh));

    let mut frames = Vec::with_capacity(roster.len());
    for cid in roster.sorted_cids() {
        let Some(pair_key) = roster.pair_key(cid) else {
            continue;
        };

        let mut nonce = [0u8; aead::NONCE_SIZE];
        rng.fill_bytes(&mut nonce);

        let wrapped = aead::seal(pair_key.as_bytes(), &nonce, group_key.as_bytes(), &aad);

        frames.push(GkFrame {
            cid: self_cid.to_string(),
            to: cid.to_string(),
            e: epoch,
            rh: Some(rh.clone()),
            n: b64::encode(&nonce),
            ek: b64::encode(&wrapped),
        });
    }

    tracing::debug!(epoch, members = frames.len(), "minted group key");
    cipher.install(group_key, epoch);

    frames
}

/// Unwrap and install a received group key.
///
/// Refuses epoch downgrades and replays (`e ≤ current`). The AAD includes
/// the frame's roster hash when one is present; if that fails to open, the
/// legacy shape without `rh` is tried once. Returns whether a key was
/// installed; callers flush the pending buffer on `true`.
pub fn load(cipher: &mut GroupCipher, frame: &GkFrame, pair_key: &SymmetricKey) -> bool {
    if frame.e <= cipher.epoch() {
        tracing::debug!(sender = %frame.cid, epoch = frame.e, current = cipher.epoch(), "ignoring stale group key");
        return false;
    }

    let Ok(nonce) = b64::decode_array::<{ aead::NONCE_SIZE }>(&frame.n, "gk nonce") else {
        return false;
    };
    let Ok(wrapped) = b64::decode(&frame.ek) else {
        return false;
    };

    let primary = gk_aad(&frame.cid, frame.e, frame.rh.as_deref());
    let opened = aead::open(pair_key.as_bytes(), &nonce, &wrapped, &primary).ok().or_else(|| {
        // Fallback for senders that never bound a roster hash: only taken
        // when the frame carried one and the bound shape failed.
        frame.rh.as_ref()?;
        let legacy = gk_aad(&frame.cid, frame.e, None);
        aead::open(pair_key.as_bytes(), &nonce, &wrapped, &legacy).ok()
    });

    let Some(key_bytes) = opened else {
        tracing::warn!(sender = %frame.cid, epoch = frame.e, "group key failed to unwrap");
        return false;
    };

    let Ok(key) = <[u8; SYMMETRIC_KEY_SIZE]>::try_from(key_bytes) else {
        return false;
    };

    cipher.install(SymmetricKey::from(key), frame.e);
    tracing::debug!(sender = %frame.cid, epoch = frame.e, "installed group key");
    true
}
