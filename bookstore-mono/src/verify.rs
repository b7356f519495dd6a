//! ECDSA verification of Monobank callback signatures.
//!
//! The provider signs the raw callback body with the key served from
//! `GET /api/merchant/pubkey`: base64 over a PEM-encoded SPKI, P-256 curve,
//! SHA-256 digest, DER-encoded signature in the `X-Sign` header.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ring::signature;
use x509_parser::prelude::*;

const EC_PUBLIC_KEY_OID: &str = "1.2.840.10045.2.1";

/// Check an `X-Sign` value against the exact raw callback body.
///
/// `pub_key_b64` is the base64 string returned by the pubkey endpoint.
/// Any decoding, parsing or crypto failure yields `false`; nothing past
/// this boundary learns why a signature was rejected.
pub fn verify_callback(pub_key_b64: &str, x_sign_b64: &str, body: &[u8]) -> bool {
    let Some(der) = decode_spki(pub_key_b64) else {
        return false;
    };
    let Ok((_, spki)) = SubjectPublicKeyInfo::from_der(&der) else {
        return false;
    };
    if spki.algorithm.algorithm.to_id_string() != EC_PUBLIC_KEY_OID {
        return false;
    }
    let Ok(sig) = BASE64.decode(x_sign_b64.trim()) else {
        return false;
    };
    signature::UnparsedPublicKey::new(
        &signature::ECDSA_P256_SHA256_ASN1,
        spki.subject_public_key.data.as_ref(),
    )
    .verify(body, &sig)
    .is_ok()
}

/// Base64 → PEM text → DER contents of the `PUBLIC KEY` block.
fn decode_spki(pub_key_b64: &str) -> Option<Vec<u8>> {
    // Keys pasted through configs tend to pick up stray whitespace; the
    // strict base64 alphabet rejects it, so strip first.
    let cleaned: String = pub_key_b64
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let pem_text = BASE64.decode(cleaned).ok()?;
    let pems = ::pem::parse_many(&pem_text).ok()?;
    pems.into_iter()
        .find(|p| p.tag() == "PUBLIC KEY")
        .map(::pem::Pem::into_contents)
}
