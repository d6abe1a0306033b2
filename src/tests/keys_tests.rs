use super::fixtures::TestKey;
use crate::{
    keys::DID_KEY_PREFIX, operation::authorized_rank, CycleMeter, Error, KeyType, PublicKey,
};

#[test]
fn did_key_round_trip_test() {
    for key in [TestKey::secp256k1(), TestKey::p256()] {
        let did_key = key.did_key();
        assert!(did_key.starts_with("did:key:z"));
        let parsed: PublicKey = did_key.parse().unwrap();
        assert_eq!(parsed, key.public_key());
        assert_eq!(parsed.to_string(), did_key);
    }
}

#[test]
fn did_key_multicodec_test() {
    // well known prefixes of compressed secp256k1 and P-256 did:keys
    assert!(TestKey::secp256k1().did_key().starts_with("did:key:zQ3s"));
    assert!(TestKey::p256().did_key().starts_with("did:key:zDn"));
    assert_eq!(TestKey::p256().public_key().key_type(), KeyType::P256);
}

#[test]
fn malformed_did_keys_test() {
    let key = TestKey::secp256k1().public_key();
    let encoded = key.to_did_key();
    let multibase = &encoded[DID_KEY_PREFIX.len()..];
    for bad in [
        "did:web:example.com".to_string(),
        format!("did:key:{}", &multibase[1..]),
        "did:key:z".to_string(),
        "did:key:z0OIl".to_string(),
        // ed25519 multicodec
        format!(
            "did:key:z{}",
            bs58::encode([&[0xed, 0x01][..], &[0x02; 33]].concat()).into_string()
        ),
        // uncompressed point
        format!(
            "did:key:z{}",
            bs58::encode([&[0xe7, 0x01][..], &[0x04; 65]].concat()).into_string()
        ),
    ] {
        assert!(
            matches!(PublicKey::from_did_key(&bad), Err(Error::MalformedEncoding(_))),
            "{bad} accepted"
        );
    }
}

#[test]
fn signature_verification_test() {
    let alice = TestKey::secp256k1();
    let bob = TestKey::p256();
    let sig = alice.sign(b"0x1234");
    assert_eq!(alice.public_key().verify(b"0x1234", &sig), Ok(true));
    assert_eq!(alice.public_key().verify(b"0x1235", &sig), Ok(false));
    let sig = bob.sign(b"0x1234");
    assert_eq!(bob.public_key().verify(b"0x1234", &sig), Ok(true));
    assert_eq!(alice.public_key().verify(b"0x1234", &sig), Ok(false));
}

#[test]
fn signature_shape_test() {
    let alice = TestKey::secp256k1();
    assert_eq!(
        alice.public_key().verify(b"msg", &[1u8; 63]),
        Err(Error::InvalidSignatureBytes)
    );
    // r = 0 is not a signature, but it's only a mismatch
    assert_eq!(alice.public_key().verify(b"msg", &[0u8; 64]), Ok(false));
}

#[test]
fn scalar_outside_curve_order_test() {
    // r above the P-256 order and below the secp256k1 order
    let mut sig = [0u8; 64];
    sig[..5].copy_from_slice(&[0xff; 5]);
    sig[63] = 1;
    let p256 = TestKey::p256().public_key();
    let k256 = TestKey::secp256k1().public_key();
    assert_eq!(p256.verify(b"msg", &sig), Ok(false));
    assert_eq!(k256.verify(b"msg", &sig), Ok(false));

    // the P-256 key doesn't stop the search for a lower ranked signer
    let mut meter = CycleMeter::unbounded();
    assert_eq!(
        authorized_rank(&[p256, k256], None, b"msg", &sig, &mut meter),
        Err(Error::UnauthorizedSigner)
    );
}

#[test]
fn high_s_rejected_test() {
    use k256::ecdsa::Signature;
    let alice = TestKey::secp256k1();
    let sig = alice.sign(b"msg");
    let low = Signature::from_slice(&sig).unwrap();
    let (r, s) = low.split_scalars();
    let (r, s) = (*r, -*s);
    let high = Signature::from_scalars(r.to_bytes(), s.to_bytes()).unwrap();
    assert!(high.normalize_s().is_some());
    assert_eq!(alice.public_key().verify(b"msg", &high.to_bytes()), Ok(false));
}

#[test]
fn off_curve_key_fails_closed_test() {
    // x above the field modulus
    let mut bytes = [0xffu8; 33];
    bytes[0] = 0x02;
    let key = PublicKey::from_compressed(KeyType::Secp256k1, &bytes).unwrap();
    let sig = TestKey::secp256k1().sign(b"msg");
    assert_eq!(key.verify(b"msg", &sig), Ok(false));
}
