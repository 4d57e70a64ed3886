//! Property tests for the group cipher and group-key wrap.

use hearth_core::{group, roster, GroupCipher, Roster};
use hearth_crypto::{b64, SymmetricKey};
use proptest::prelude::*;
use rand::rngs::OsRng;

fn cid() -> impl Strategy<Value = String> {
    "[A-Za-z0-9+/]{4,16}"
}

proptest! {
    /// nonce(cid, s, e) is a pure function of its inputs.
    #[test]
    fn nonce_determinism(cid in cid(), s in any::<u64>(), e in any::<u64>()) {
        prop_assert_eq!(group::message_nonce(&cid, s, e), group::message_nonce(&cid, s, e));
    }

    /// Distinct (cid, s, e) triples give distinct nonces.
    #[test]
    fn nonce_separation(cid in cid(), s in any::<u64>(), e in any::<u64>()) {
        let base = group::message_nonce(&cid, s, e);
        prop_assert_ne!(base, group::message_nonce(&cid, s.wrapping_add(1), e));
        prop_assert_ne!(base, group::message_nonce(&cid, s, e.wrapping_add(1)));
    }

    /// Flipping any AAD-bound field after encryption breaks authentication.
    #[test]
    fn aad_binding(
        sender in cid(),
        other in cid(),
        plaintext in proptest::collection::vec(any::<u8>(), 0..128),
    ) {
        prop_assume!(sender != other);

        let key = SymmetricKey::from([0x42; 32]);

        let mut alice = GroupCipher::new();
        alice.install(key.clone(), 1);
        let frame = alice.encrypt(&sender, &plaintext).unwrap();

        // Untouched frame decrypts
        let mut bob = GroupCipher::new();
        bob.install(key.clone(), 1);
        prop_assert_eq!(bob.decrypt(frame.clone()).unwrap(), plaintext);

        // Sender swap fails
        let mut bob = GroupCipher::new();
        bob.install(key.clone(), 1);
        let mut tampered = frame.clone();
        tampered.cid = other;
        prop_assert!(bob.decrypt(tampered).is_none());

        // Sequence bump fails
        let mut bob = GroupCipher::new();
        bob.install(key.clone(), 1);
        let mut tampered = frame.clone();
        tampered.s += 1;
        prop_assert!(bob.decrypt(tampered).is_none());

        // Epoch bump is dropped before the AEAD even runs
        let mut bob = GroupCipher::new();
        bob.install(key, 1);
        let mut tampered = frame;
        tampered.e += 1;
        prop_assert!(bob.decrypt(tampered).is_none());
    }

    /// Once a sequence is accepted, nothing at or below it is accepted
    /// again within the epoch.
    #[test]
    fn replay_rejection(count in 2usize..12) {
        let key = SymmetricKey::from([0x42; 32]);

        let mut alice = GroupCipher::new();
        alice.install(key.clone(), 1);
        let mut bob = GroupCipher::new();
        bob.install(key, 1);

        let frames: Vec<_> = (0..count).map(|_| alice.encrypt("alice", b"x").unwrap()).collect();

        // Deliver the last frame first; everything earlier is now stale
        prop_assert!(bob.decrypt(frames[count - 1].clone()).is_some());
        for frame in &frames[..count - 1] {
            prop_assert!(bob.decrypt(frame.clone()).is_none());
        }
    }

    /// A wrapped group key opens only for the pairwise key it was wrapped
    /// under, and only at a higher epoch than the receiver holds.
    #[test]
    fn key_wrap_round_trip(pair_byte in any::<u8>(), wrong_byte in any::<u8>()) {
        prop_assume!(pair_byte != wrong_byte);

        let mut members = Roster::new();
        members.insert("guest".to_string(), SymmetricKey::from([pair_byte; 32]));

        let mut host = GroupCipher::new();
        let frames = roster::mint("host", &members, &mut host, &mut OsRng);

        let mut guest = GroupCipher::new();
        prop_assert!(!roster::load(&mut guest, &frames[0], &SymmetricKey::from([wrong_byte; 32])));
        prop_assert!(roster::load(&mut guest, &frames[0], &SymmetricKey::from([pair_byte; 32])));
        prop_assert_eq!(guest.epoch(), host.epoch());
    }
}

/// Corrupting the wrapped key bytes themselves is always caught.
#[test]
fn corrupted_wrap_never_installs() {
    let mut members = Roster::new();
    members.insert("guest".to_string(), SymmetricKey::from([7; 32]));

    let mut host = GroupCipher::new();
    let mut frames = roster::mint("host", &members, &mut host, &mut OsRng);

    let mut raw = b64::decode(&frames[0].ek).unwrap();
    for i in 0..raw.len() {
        raw[i] ^= 0x01;
        frames[0].ek = b64::encode(&raw);

        let mut guest = GroupCipher::new();
        assert!(!roster::load(&mut guest, &frames[0], &SymmetricKey::from([7; 32])));

        raw[i] ^= 0x01;
    }
}
