//! tests/codec_tests.rs
//! Content entry layout: header, digest, MAC, padding and the unverified
//! decode path.

mod common;
use common::{sample_payload, TEST_IV, TEST_KEY, TEST_MAC_KEY};

use hmac::{Hmac, Mac};
use intunewin_rs::{
    decode, encode, read_content_header, verify_mac, CodecKeys, EncodeSummary, IntuneWinError,
    StreamConfig,
};
use proptest::prelude::*;
use sha2::{Digest, Sha256};
use std::io::Cursor;

fn keys() -> CodecKeys<'static> {
    CodecKeys {
        encryption_key: &TEST_KEY,
        iv: &TEST_IV,
        mac_key: &TEST_MAC_KEY,
    }
}

fn encode_bytes(payload: &[u8], config: &StreamConfig) -> (Vec<u8>, EncodeSummary) {
    let mut out = Cursor::new(Vec::<u8>::new());
    let summary = encode(&mut Cursor::new(payload.to_vec()), &mut out, &keys(), config).unwrap();
    (out.into_inner(), summary)
}

fn decode_bytes(entry: &[u8]) -> Result<Vec<u8>, IntuneWinError> {
    let mut plain = Vec::new();
    decode(
        &mut Cursor::new(entry),
        &mut plain,
        &TEST_KEY,
        &TEST_IV,
        &StreamConfig::default(),
    )?;
    Ok(plain)
}

#[test]
fn header_carries_iv_and_mac_over_the_tail() {
    let payload = sample_payload(3078);
    let (entry, summary) = encode_bytes(&payload, &StreamConfig::default());

    assert_eq!(&entry[32..48], &TEST_IV);

    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(&TEST_MAC_KEY).unwrap();
    mac.update(&entry[32..]);
    let expected: [u8; 32] = mac.finalize().into_bytes().into();
    assert_eq!(&entry[..32], &expected);
    assert_eq!(summary.mac, expected);

    let header = read_content_header(Cursor::new(&entry)).unwrap();
    assert_eq!(header.iv, TEST_IV);
    assert_eq!(header.mac, expected);
}

#[test]
fn digest_is_sha256_of_plaintext() {
    let payload = sample_payload(5000);
    let (_, summary) = encode_bytes(&payload, &StreamConfig::default());
    let expected: [u8; 32] = Sha256::digest(&payload).into();
    assert_eq!(summary.content_digest, expected);
    assert_eq!(summary.plaintext_len, 5000);
}

#[test]
fn output_does_not_depend_on_chunk_size() {
    let payload = sample_payload(10_000);
    let (reference, reference_summary) = encode_bytes(&payload, &StreamConfig::default());
    for chunk_size in [16, 17, 64, 1000, 4096] {
        let (entry, summary) =
            encode_bytes(&payload, &StreamConfig::default().with_chunk_size(chunk_size));
        assert_eq!(entry, reference, "chunk size {chunk_size}");
        assert_eq!(summary, reference_summary);
    }
}

#[test]
fn encoded_length_is_header_plus_padded_blocks() {
    for (len, expected) in [(0usize, 64u64), (1, 64), (15, 64), (16, 80), (3078, 48 + 3088)] {
        let (entry, summary) = encode_bytes(&sample_payload(len), &StreamConfig::default());
        assert_eq!(summary.encoded_len, expected, "payload length {len}");
        assert_eq!(entry.len() as u64, expected);
    }
}

#[test]
fn empty_payload_round_trips() {
    let (entry, summary) = encode_bytes(&[], &StreamConfig::default());
    assert_eq!(summary.plaintext_len, 0);
    let expected: [u8; 32] = Sha256::digest(b"").into();
    assert_eq!(summary.content_digest, expected);
    assert!(decode_bytes(&entry).unwrap().is_empty());
}

#[test]
fn plaintext_is_read_from_current_position() {
    let payload = sample_payload(200);
    let mut source = Cursor::new(payload.clone());
    source.set_position(50);

    let mut out = Cursor::new(Vec::<u8>::new());
    let summary = encode(&mut source, &mut out, &keys(), &StreamConfig::default()).unwrap();
    assert_eq!(summary.plaintext_len, 150);
    assert_eq!(decode_bytes(out.get_ref()).unwrap(), &payload[50..]);
}

#[test]
fn truncated_header_is_corrupt_ciphertext() {
    let (entry, _) = encode_bytes(b"hello", &StreamConfig::default());
    for len in [0, 1, 31, 47] {
        let err = decode_bytes(&entry[..len]).unwrap_err();
        assert!(
            matches!(err, IntuneWinError::CorruptCiphertext(_)),
            "length {len}: {err:?}"
        );
    }
}

#[test]
fn truncated_ciphertext_is_corrupt_ciphertext() {
    let (entry, _) = encode_bytes(&sample_payload(100), &StreamConfig::default());
    let err = decode_bytes(&entry[..entry.len() - 5]).unwrap_err();
    assert!(matches!(err, IntuneWinError::CorruptCiphertext(_)));

    // Header only: no final block to unpad
    let err = decode_bytes(&entry[..48]).unwrap_err();
    assert!(matches!(err, IntuneWinError::CorruptCiphertext(_)));
}

#[test]
fn flipped_ciphertext_byte_decodes_to_wrong_plaintext() {
    let payload = sample_payload(100);
    let (mut entry, _) = encode_bytes(&payload, &StreamConfig::default());
    entry[48] ^= 0x01;

    let plain = decode_bytes(&entry).unwrap();
    assert_eq!(plain.len(), payload.len());
    assert_ne!(plain, payload);
    // Only the first two blocks are affected in CBC
    assert_eq!(&plain[32..], &payload[32..]);
}

#[test]
fn verify_mac_catches_what_decode_does_not() {
    let payload = sample_payload(100);
    let (mut entry, summary) = encode_bytes(&payload, &StreamConfig::default());

    let header = verify_mac(
        &mut Cursor::new(&entry),
        &TEST_MAC_KEY,
        Some(&summary.mac),
        &StreamConfig::default(),
    )
    .unwrap();
    assert_eq!(header.mac, summary.mac);

    entry[60] ^= 0x80;
    let err = verify_mac(
        &mut Cursor::new(&entry),
        &TEST_MAC_KEY,
        None,
        &StreamConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, IntuneWinError::CorruptCiphertext(_)));
}

#[test]
fn verify_mac_rejects_foreign_metadata_mac() {
    let (entry, _) = encode_bytes(b"payload", &StreamConfig::default());
    let err = verify_mac(
        &mut Cursor::new(&entry),
        &TEST_MAC_KEY,
        Some(&[0u8; 32]),
        &StreamConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, IntuneWinError::CorruptCiphertext(ref m) if m.contains("metadata")));
}

#[test]
fn bad_key_lengths_fail_before_writing() {
    let short_key = [0u8; 16];
    let bad = CodecKeys {
        encryption_key: &short_key,
        iv: &TEST_IV,
        mac_key: &TEST_MAC_KEY,
    };
    let mut out = Cursor::new(Vec::<u8>::new());
    let err = encode(
        &mut Cursor::new(b"data".to_vec()),
        &mut out,
        &bad,
        &StreamConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, IntuneWinError::InvalidKeyMaterial(_)));
    assert!(out.get_ref().is_empty());

    let mut plain = Vec::new();
    let err = decode(
        &mut Cursor::new(vec![0u8; 64]),
        &mut plain,
        &TEST_KEY,
        &TEST_IV[..8],
        &StreamConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, IntuneWinError::InvalidKeyMaterial(_)));
}

#[test]
fn wrong_key_fails_padding_or_garbles() {
    let payload = sample_payload(64);
    let (entry, _) = encode_bytes(&payload, &StreamConfig::default());
    let mut plain = Vec::new();
    let result = decode(
        &mut Cursor::new(&entry),
        &mut plain,
        &[0x99; 32],
        &TEST_IV,
        &StreamConfig::default(),
    );
    match result {
        Err(IntuneWinError::CorruptCiphertext(_)) => {}
        Ok(_) => assert_ne!(plain, payload),
        Err(other) => panic!("unexpected error: {other:?}"),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn round_trip_any_payload(
        payload in proptest::collection::vec(any::<u8>(), 0..2048),
        chunk_size in 16usize..512,
    ) {
        let config = StreamConfig::default().with_chunk_size(chunk_size);
        let (entry, summary) = encode_bytes(&payload, &config);
        prop_assert_eq!(summary.plaintext_len, payload.len() as u64);
        prop_assert_eq!(decode_bytes(&entry).unwrap(), payload);
    }
}
