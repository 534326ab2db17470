//! Signed, self-describing hostname labels.
//!
//! A token binds an IPv4 address to an expiry instant. It is issued out of band with
//! [`create_hostname`] and verified by any resolver instance holding one of the shared
//! [`Secrets`], without any server-side state.
//!
//! # Wire format
//!
//! All integers are big-endian.
//!
//! | offset | length | field                                       |
//! |--------|--------|---------------------------------------------|
//! | 0      | 4      | IPv4 octets                                 |
//! | 4      | 8      | expiry, signed milliseconds since the epoch |
//! | 12     | 2      | random salt                                 |
//! | 14     | 16     | `HMAC-SHA256(secret, bytes[0..14])[0..16]`  |
//!
//! The 30 bytes are encoded as unpadded [RFC-4648][RFC-4648] base32, lower-case on
//! emission and case-insensitive on decoding, giving a single 48 character DNS label.
//!
//! [RFC-4648]: https://www.rfc-editor.org/rfc/rfc4648#section-6

use crate::error::Error;
use data_encoding::{Encoding, Specification};
use hmac::{Hmac, Mac};
use lazy_static::lazy_static;
use rand::RngCore;
use serde::Deserialize;
use sha2::Sha256;
use std::fmt;
use std::net::Ipv4Addr;
use subtle::{Choice, ConstantTimeEq};
use time::OffsetDateTime;

type HmacSha256 = Hmac<Sha256>;

/// Length of the signed prefix: IP, expiry and salt.
pub const PAYLOAD_LEN: usize = 4 + 8 + SALT_LEN;
/// Length of the random salt.
pub const SALT_LEN: usize = 2;
/// Length of the truncated HMAC-SHA256 signature.
pub const SIGNATURE_LEN: usize = 16;
/// Length of a decoded token.
pub const TOKEN_LEN: usize = PAYLOAD_LEN + SIGNATURE_LEN;

const NANOS_PER_MILLI: i128 = 1_000_000;

lazy_static! {
    static ref LABEL_ENCODING: Encoding = {
        let mut spec = Specification::new();
        spec.symbols.push_str("abcdefghijklmnopqrstuvwxyz234567");
        spec.translate.from.push_str("ABCDEFGHIJKLMNOPQRSTUVWXYZ");
        spec.translate.to.push_str("abcdefghijklmnopqrstuvwxyz");
        // NB: unwrap is safe: a fixed, valid base32 specification.
        spec.encoding().unwrap()
    };
}

/// An ordered, non-empty set of signing secrets.
///
/// The first secret signs newly issued tokens. Every secret is accepted when verifying,
/// so a new secret can be prepended while tokens signed with an older one stay valid
/// until they expire.
#[derive(Clone, Deserialize)]
#[allow(clippy::len_without_is_empty)]
#[serde(try_from = "Vec<String>")]
pub struct Secrets(Vec<Vec<u8>>);

impl Secrets {
    /// Build a secret set, or return an Error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSecrets`] if `secrets` is empty, and [`Error::EmptySecret`] if
    /// any of them is zero-length.
    pub fn new<I, S>(secrets: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let secrets: Vec<Vec<u8>> = secrets.into_iter().map(|s| s.as_ref().to_vec()).collect();
        if secrets.is_empty() {
            return Err(Error::NoSecrets);
        }
        if secrets.iter().any(Vec::is_empty) {
            return Err(Error::EmptySecret);
        }
        Ok(Self(secrets))
    }

    /// The secret used to sign new tokens.
    pub fn signing_secret(&self) -> &[u8] {
        &self.0[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.0.iter().map(Vec::as_slice)
    }

    /// Number of secrets, at least one.
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl TryFrom<Vec<String>> for Secrets {
    type Error = Error;

    fn try_from(secrets: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(secrets)
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secrets({} redacted)", self.0.len())
    }
}

/// Encode a signed label for `ip`, valid until `expires`, with a fresh random salt.
pub fn encode(ip: Ipv4Addr, expires: OffsetDateTime, secret: &[u8]) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    encode_with_salt(ip, expires, secret, salt)
}

/// Encode a signed label for `ip`, valid until `expires`, using the given salt.
pub fn encode_with_salt(
    ip: Ipv4Addr,
    expires: OffsetDateTime,
    secret: &[u8],
    salt: [u8; SALT_LEN],
) -> String {
    let mut token = [0u8; TOKEN_LEN];
    token[0..4].copy_from_slice(&ip.octets());
    token[4..12].copy_from_slice(&unix_millis(expires).to_be_bytes());
    token[12..PAYLOAD_LEN].copy_from_slice(&salt);
    let signature = sign(secret, &token[..PAYLOAD_LEN]);
    token[PAYLOAD_LEN..].copy_from_slice(&signature);
    LABEL_ENCODING.encode(&token)
}

/// Issue a hostname of the form `label.domain` for `ip`, valid until `expires`.
pub fn create_hostname(ip: Ipv4Addr, expires: OffsetDateTime, secret: &[u8], domain: &str) -> String {
    format!("{}.{}", encode(ip, expires, secret), domain)
}

/// Verify `label` against every secret in `secrets` and return the IP it carries.
///
/// Returns `None` for undecodable labels, labels of the wrong length, expired or
/// unrepresentable expiry times, and signature mismatches alike. The signature is
/// compared in constant time against every configured secret, even after a match.
pub fn verify(label: &str, secrets: &Secrets, now: OffsetDateTime) -> Option<Ipv4Addr> {
    let token: [u8; TOKEN_LEN] = LABEL_ENCODING
        .decode(label.as_bytes())
        .ok()?
        .try_into()
        .ok()?;

    let ip = Ipv4Addr::new(token[0], token[1], token[2], token[3]);
    let expires_ms = i64::from_be_bytes(token[4..12].try_into().ok()?);
    let expires =
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(expires_ms) * NANOS_PER_MILLI).ok()?;
    if expires <= now {
        return None;
    }

    // The salt (bytes 12..14) is only covered by the signature.
    let (payload, claimed) = token.split_at(PAYLOAD_LEN);
    let matched = secrets.iter().fold(Choice::from(0), |matched, secret| {
        matched | sign(secret, payload)[..].ct_eq(claimed)
    });
    bool::from(matched).then_some(ip)
}

fn sign(secret: &[u8], payload: &[u8]) -> [u8; SIGNATURE_LEN] {
    // NB: expect is safe: HMAC accepts keys of any length.
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(payload);
    let digest = mac.finalize().into_bytes();
    let mut signature = [0u8; SIGNATURE_LEN];
    signature.copy_from_slice(&digest[..SIGNATURE_LEN]);
    signature
}

fn unix_millis(t: OffsetDateTime) -> i64 {
    t.unix_timestamp() * 1000 + i64::from(t.millisecond())
}
