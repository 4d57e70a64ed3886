//! Property tests for frame encoding.

use hearth_proto::{decode, encode, Frame, GkFrame, MsgFrame};
use proptest::prelude::*;

/// Strategy for base64-ish field content (we only need valid JSON strings).
fn field() -> impl Strategy<Value = String> {
    "[A-Za-z0-9+/=]{0,64}"
}

proptest! {
    #[test]
    fn msg_round_trip(cid in field(), s in any::<u64>(), e in any::<u64>(), n in field(), c in field()) {
        let frame = Frame::Msg(MsgFrame { cid, s, e, n, c });
        let text = encode(&frame);
        prop_assert_eq!(decode(&text).unwrap(), frame);
    }

    #[test]
    fn gk_round_trip(
        cid in field(),
        to in field(),
        e in any::<u64>(),
        rh in proptest::option::of(field()),
        n in field(),
        ek in field(),
    ) {
        let frame = Frame::Gk(GkFrame { cid, to, e, rh, n, ek });
        let text = encode(&frame);
        prop_assert_eq!(decode(&text).unwrap(), frame);
    }

    #[test]
    fn arbitrary_text_never_panics(text in ".{0,256}") {
        let _ = decode(&text);
    }
}
