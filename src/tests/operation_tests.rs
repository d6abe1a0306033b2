use super::fixtures::*;
use crate::{
    cid_for, codec, did_for, CycleMeter, Error, Limits, SignedOperation, UnsignedOperation,
};
use serde_cbor::Value;

fn decode(bytes: &[u8]) -> Result<SignedOperation, Error> {
    SignedOperation::decode(bytes, &Limits::default(), &mut CycleMeter::unbounded())
}

#[test]
fn genesis_identity_test() {
    let k0 = TestKey::secp256k1();
    let bytes = genesis(&[&k0], &k0, "alice.test");
    let op = decode(&bytes).unwrap();
    assert!(op.is_genesis());
    assert_eq!(op.type_name(), "plc_operation");
    assert_eq!(op.cid(), cid_for(&bytes));
    assert!(op.cid().starts_with("bafyrei"));
    assert_eq!(op.did(), did_for(&bytes));
    assert_eq!(op.did().len(), "did:plc:".len() + 24);
    assert_eq!(op.encoded(), &bytes[..]);
    assert_eq!(op.rotation_keys(), &[k0.public_key()]);
    assert_eq!(op.verify_genesis(None, &mut CycleMeter::unbounded()), Ok(0));
}

#[test]
fn signing_bytes_exclude_sig_test() {
    let k0 = TestKey::secp256k1();
    let bytes = genesis(&[&k0], &k0, "alice.test");
    let op = decode(&bytes).unwrap();
    assert_eq!(op.signing_bytes(), &remove_field(&bytes, "sig")[..]);
    assert_eq!(op.signature().len(), 64);
}

#[test]
fn genesis_signed_by_any_listed_key_test() {
    let k0 = TestKey::secp256k1();
    let k1 = TestKey::p256();
    let op = decode(&genesis(&[&k0, &k1], &k1, "alice.test")).unwrap();
    let mut meter = CycleMeter::unbounded();
    assert_eq!(op.verify_genesis(None, &mut meter), Ok(1));
    assert_eq!(op.verify_genesis(Some(1), &mut meter), Ok(1));
    assert_eq!(
        op.verify_genesis(Some(0), &mut meter),
        Err(Error::UnauthorizedSigner)
    );
    assert_eq!(
        op.verify_genesis(Some(2), &mut meter),
        Err(Error::KeyIndexOutOfRange { index: 2, len: 2 })
    );
}

#[test]
fn genesis_signed_by_stranger_test() {
    let k0 = TestKey::secp256k1();
    let stranger = TestKey::secp256k1();
    let op = decode(&genesis(&[&k0], &stranger, "alice.test")).unwrap();
    assert_eq!(
        op.verify_genesis(None, &mut CycleMeter::unbounded()),
        Err(Error::UnauthorizedSigner)
    );
}

#[test]
fn flipped_signature_bit_test() {
    let k0 = TestKey::secp256k1();
    let bytes = flip_sig(&genesis(&[&k0], &k0, "alice.test"));
    let op = decode(&bytes).unwrap();
    assert_eq!(
        op.verify_genesis(None, &mut CycleMeter::unbounded()),
        Err(Error::UnauthorizedSigner)
    );
}

#[test]
fn unknown_type_test() {
    let k0 = TestKey::secp256k1();
    let bytes = genesis(&[&k0], &k0, "alice.test");
    let bytes = replace_field(&bytes, "type", Value::Text("plc_frobnicate".into()));
    assert_eq!(
        decode(&bytes),
        Err(Error::UnknownOperationType("plc_frobnicate".into()))
    );
}

#[test]
fn missing_required_field_test() {
    let k0 = TestKey::secp256k1();
    let bytes = genesis(&[&k0], &k0, "alice.test");
    for field in ["type", "rotationKeys", "services", "prev", "sig"] {
        assert!(
            matches!(
                decode(&remove_field(&bytes, field)),
                Err(Error::MalformedEncoding(_))
            ),
            "{field}"
        );
    }
}

#[test]
fn signature_encoding_test() {
    let k0 = TestKey::secp256k1();
    let bytes = genesis(&[&k0], &k0, "alice.test");
    for sig in [
        Value::Text("not base64url!".into()),
        Value::Text(base64_url(&[7u8; 63])),
        Value::Text(base64_url(&[7u8; 65])),
        Value::Bytes(vec![7u8; 64]),
    ] {
        assert_eq!(
            decode(&replace_field(&bytes, "sig", sig)),
            Err(Error::InvalidSignatureBytes)
        );
    }
}

#[test]
fn rotation_keys_bounds_test() {
    let keys: Vec<TestKey> = (0..6).map(|_| TestKey::secp256k1()).collect();
    let six: Vec<&TestKey> = keys.iter().collect();
    let bytes = genesis(&six, &keys[0], "alice.test");
    assert!(matches!(decode(&bytes), Err(Error::MalformedEncoding(_))));
    assert!(decode(&genesis(&six[..5], &keys[0], "alice.test")).is_ok());

    let bytes = genesis(&[&keys[0], &keys[0]], &keys[0], "alice.test");
    assert!(matches!(decode(&bytes), Err(Error::MalformedEncoding(_))));

    let empty = replace_field(&bytes, "rotationKeys", Value::Array(vec![]));
    assert!(matches!(decode(&empty), Err(Error::MalformedEncoding(_))));

    let limits = Limits {
        max_rotation_keys: 2,
        ..Limits::default()
    };
    let bytes = genesis(&six[..3], &keys[0], "alice.test");
    assert!(matches!(
        SignedOperation::decode(&bytes, &limits, &mut CycleMeter::unbounded()),
        Err(Error::MalformedEncoding(_))
    ));
}

#[test]
fn verification_methods_are_did_keys_test() {
    let k0 = TestKey::secp256k1();
    let bytes = UnsignedOperation::genesis(did_keys(&[&k0]), "zQ3notadidkey", "alice.test", PDS)
        .sign_with(|msg| k0.sign(msg))
        .unwrap();
    assert!(matches!(decode(&bytes), Err(Error::MalformedEncoding(_))));
}

#[test]
fn non_canonical_encoding_test() {
    let k0 = TestKey::secp256k1();
    let bytes = genesis(&[&k0], &k0, "alice.test");
    let mut trailing = bytes.clone();
    trailing.push(0xf6);
    assert!(matches!(decode(&trailing), Err(Error::MalformedEncoding(_))));
    assert!(matches!(
        decode(&bytes[..bytes.len() - 1]),
        Err(Error::MalformedEncoding(_))
    ));
    let array = codec::encode(&Value::Array(vec![Value::Null])).unwrap();
    assert!(matches!(decode(&array), Err(Error::MalformedEncoding(_))));
}

#[test]
fn oversized_operation_test() {
    let k0 = TestKey::secp256k1();
    let bytes = genesis(&[&k0], &k0, &"a".repeat(8000));
    assert!(matches!(decode(&bytes), Err(Error::MalformedEncoding(_))));
}

#[test]
fn successor_link_test() {
    let k0 = TestKey::secp256k1();
    let k1 = TestKey::p256();
    let g = genesis(&[&k0, &k1], &k0, "alice.test");
    let next = update(&g, &k1, |op| op.with_handle("alice2.test"));
    let (g, next) = (decode(&g).unwrap(), decode(&next).unwrap());
    assert!(!next.is_genesis());
    assert_eq!(next.prev(), Some(g.cid()));
    let mut meter = CycleMeter::unbounded();
    assert_eq!(g.verify_successor(&next, None, &mut meter), Ok(1));
    // the successor is not its own predecessor
    assert_eq!(
        next.verify_successor(&next, None, &mut meter),
        Err(Error::BrokenChain)
    );
}

#[test]
fn legacy_create_test() {
    let signing = TestKey::secp256k1();
    let recovery = TestKey::secp256k1();
    let bytes = UnsignedOperation::legacy_create(
        signing.did_key(),
        recovery.did_key(),
        "alice.test",
        PDS,
    )
    .sign_with(|msg| signing.sign(msg))
    .unwrap();
    let op = decode(&bytes).unwrap();
    assert!(op.is_legacy());
    assert!(op.is_genesis());
    assert_eq!(op.type_name(), "create");
    assert_eq!(
        op.rotation_keys(),
        &[signing.public_key(), recovery.public_key()]
    );
    let mut meter = CycleMeter::unbounded();
    assert_eq!(op.verify_genesis(None, &mut meter), Ok(0));

    // only the signing key may self-sign a legacy create
    let by_recovery = UnsignedOperation::legacy_create(
        signing.did_key(),
        recovery.did_key(),
        "alice.test",
        PDS,
    )
    .sign_with(|msg| recovery.sign(msg))
    .unwrap();
    assert_eq!(
        decode(&by_recovery).unwrap().verify_genesis(None, &mut meter),
        Err(Error::UnauthorizedSigner)
    );

    // both keys may sign its successor
    let next = decode(&update(&bytes, &recovery, |op| op)).unwrap();
    assert_eq!(op.verify_successor(&next, None, &mut meter), Ok(1));
}

#[test]
fn tombstone_test() {
    let k0 = TestKey::secp256k1();
    let g = genesis(&[&k0], &k0, "alice.test");
    let t = tombstone(&g, &k0);
    let (g, t) = (decode(&g).unwrap(), decode(&t).unwrap());
    assert!(t.is_tombstone());
    assert!(!t.is_genesis());
    assert!(t.rotation_keys().is_empty());
    let mut meter = CycleMeter::unbounded();
    assert_eq!(g.verify_successor(&t, None, &mut meter), Ok(0));
    assert_eq!(
        t.verify_successor(&g, None, &mut meter),
        Err(Error::TombstoneExtended)
    );
    assert_eq!(t.verify_genesis(None, &mut meter), Err(Error::NotGenesis));
}

#[test]
fn decode_is_metered_test() {
    let k0 = TestKey::secp256k1();
    let bytes = genesis(&[&k0], &k0, "alice.test");
    let mut meter = CycleMeter::new(1000);
    assert_eq!(
        SignedOperation::decode(&bytes, &Limits::default(), &mut meter),
        Err(Error::CycleBudgetExceeded { limit: 1000 })
    );
}
