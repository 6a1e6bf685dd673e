//! The `idpub`/`idsec` key encoding used by Factom identities.
//!
//! Both kinds of keys are ed25519 keys, rendered as base58 (bitcoin alphabet)
//! over `prefix || key || checksum`. The checksum is the first four bytes of
//! a double SHA-256 over `prefix || key`. The prefixes are chosen so that every
//! encoded public key starts with `idpub` and every secret key with `idsec`.
//!
//! Strings are validated in full before any of their bytes are used. Only the
//! encoding is checked at that point, not whether the key is a usable curve
//! point.

use std::{fmt::Display, str::FromStr};

use ed25519_dalek::{Signer as _, SigningKey, VerifyingKey};
use sha2::{Digest as _, Sha256};

const KEY_LEN: usize = 32;
const PREFIX_LEN: usize = 5;
const CHECKSUM_LEN: usize = 4;
const DECODED_LEN: usize = PREFIX_LEN + KEY_LEN + CHECKSUM_LEN;

/// Length of a signature, in bytes.
pub const SIGNATURE_LEN: usize = ed25519_dalek::SIGNATURE_LENGTH;

const PUB_PREFIX: [u8; PREFIX_LEN] = [0x03, 0x45, 0xef, 0x9d, 0xe0];
const SEC_PREFIX: [u8; PREFIX_LEN] = [0x03, 0x45, 0xf3, 0xd0, 0xd6];

/// An ed25519 public key in its `idpub` string form.
///
/// Only the encoding is validated. Whether the bytes are a usable curve point
/// is decided when a signature is checked, so a key that is well formed but
/// unusable can still be listed by an identity. It just never verifies.
#[derive(Debug, Eq, PartialEq, Hash, Clone)]
pub struct IdPubKey {
	s: String,
	key: [u8; KEY_LEN],
}

impl IdPubKey {
	pub fn as_str(&self) -> &str {
		&self.s
	}

	/// The raw ed25519 key material.
	pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
		&self.key
	}

	pub fn to_hex(&self) -> String {
		hex::encode(self.key)
	}

	/// Checks `signature` over the exact bytes of `msg`.
	///
	/// Signatures that are not [`SIGNATURE_LEN`] bytes long never verify, and
	/// neither does anything checked against a key that is off the curve or of
	/// low order.
	pub fn verify(&self, signature: &[u8], msg: &[u8]) -> bool {
		let Ok(signature) = ed25519_dalek::Signature::from_slice(signature) else {
			return false;
		};
		let Ok(key) = VerifyingKey::from_bytes(&self.key) else {
			return false;
		};
		key.verify_strict(msg, &signature).is_ok()
	}

	pub fn from_bytes(key: [u8; KEY_LEN]) -> Self {
		Self {
			s: encode(&PUB_PREFIX, &key),
			key,
		}
	}
}

impl FromStr for IdPubKey {
	type Err = InvalidKeyFormat;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let key = decode(s, &PUB_PREFIX)?;
		Ok(Self {
			s: s.to_owned(),
			key,
		})
	}
}

impl TryFrom<&[u8]> for IdPubKey {
	type Error = InvalidKeyFormat;

	/// Parses a key string that arrived as raw bytes, such as an entry's
	/// external id.
	fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
		let s = std::str::from_utf8(value).map_err(|_| InvalidKeyFormat::NotUtf8)?;
		s.parse()
	}
}

impl Display for IdPubKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.as_str().fmt(f)
	}
}

/// An ed25519 signing key in its `idsec` string form.
///
/// Intentionally does not implement `Debug` or `Display`, so the secret does not
/// end up in logs by accident. Use [`IdSecKey::to_idsec_string`] to export it.
#[derive(Clone)]
pub struct IdSecKey(SigningKey);

impl IdSecKey {
	/// Creates a key from a 32 byte ed25519 seed.
	pub fn from_seed(seed: &[u8; KEY_LEN]) -> Self {
		Self(SigningKey::from_bytes(seed))
	}

	pub fn to_idsec_string(&self) -> String {
		encode(&SEC_PREFIX, self.0.as_bytes())
	}

	pub fn public(&self) -> IdPubKey {
		IdPubKey::from_bytes(self.0.verifying_key().to_bytes())
	}

	pub fn sign(&self, msg: &[u8]) -> [u8; SIGNATURE_LEN] {
		self.0.sign(msg).to_bytes()
	}
}

impl FromStr for IdSecKey {
	type Err = InvalidKeyFormat;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		decode(s, &SEC_PREFIX).map(|seed| Self::from_seed(&seed))
	}
}

/// Decodes an `idpub` string into its raw key bytes.
pub fn decode_idpub(s: &str) -> Result<[u8; KEY_LEN], InvalidKeyFormat> {
	IdPubKey::from_str(s).map(|k| *k.as_bytes())
}

/// Verifies `signature` over `msg` with the key encoded by `signer`. Malformed
/// signer strings fail verification.
pub fn verify(signer: &str, signature: &[u8], msg: &[u8]) -> bool {
	IdPubKey::from_str(signer).is_ok_and(|k| k.verify(signature, msg))
}

fn checksum(body: &[u8]) -> [u8; CHECKSUM_LEN] {
	let digest = Sha256::digest(Sha256::digest(body));
	let mut out = [0; CHECKSUM_LEN];
	out.copy_from_slice(&digest[..CHECKSUM_LEN]);
	out
}

fn encode(prefix: &[u8; PREFIX_LEN], key: &[u8; KEY_LEN]) -> String {
	let mut buf = Vec::with_capacity(DECODED_LEN);
	buf.extend_from_slice(prefix);
	buf.extend_from_slice(key);
	let check = checksum(&buf);
	buf.extend_from_slice(&check);
	bs58::encode(buf)
		.with_alphabet(bs58::Alphabet::BITCOIN)
		.into_string()
}

fn decode(
	s: &str,
	prefix: &[u8; PREFIX_LEN],
) -> Result<[u8; KEY_LEN], InvalidKeyFormat> {
	let mut buf = [0; DECODED_LEN];
	let len = bs58::decode(s)
		.with_alphabet(bs58::Alphabet::BITCOIN)
		.onto(&mut buf[..])
		.map_err(|err| match err {
			bs58::decode::Error::BufferTooSmall => InvalidKeyFormat::WrongLength,
			other => InvalidKeyFormat::Base58(other),
		})?;
	if len != DECODED_LEN {
		return Err(InvalidKeyFormat::WrongLength);
	}
	let (body, check) = buf.split_at(PREFIX_LEN + KEY_LEN);
	if body[..PREFIX_LEN] != prefix[..] {
		return Err(InvalidKeyFormat::WrongPrefix);
	}
	if checksum(body) != check {
		return Err(InvalidKeyFormat::BadChecksum);
	}
	let mut key = [0; KEY_LEN];
	key.copy_from_slice(&body[PREFIX_LEN..]);
	Ok(key)
}

#[derive(thiserror::Error, Debug, Eq, PartialEq)]
pub enum InvalidKeyFormat {
	#[error("key string is not valid UTF-8")]
	NotUtf8,
	#[error(transparent)]
	Base58(bs58::decode::Error),
	#[error("expected {} decoded bytes", DECODED_LEN)]
	WrongLength,
	#[error("key string has the wrong type prefix")]
	WrongPrefix,
	#[error("key string checksum does not match")]
	BadChecksum,
}

#[cfg(test)]
mod test {
	use super::*;

	use hex_literal::hex;

	// From: https://datatracker.ietf.org/doc/html/rfc8032#section-7.1, TEST 1
	const RFC_SEED: [u8; 32] =
		hex!("9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60");
	const RFC_PUB: [u8; 32] =
		hex!("d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a");
	const RFC_SIG: [u8; 64] = hex!(
		"e5564300c360ac729086e2cc806e828a84877f1eb8e5d974d873e065224901555fb8821590a33bacc61e39701cf9b46bd25bf5f0595bbe24655141438e7a100b"
	);
	const RFC_IDSEC: &str = "idsec2MJHL4Vg1U8dgkHYdcHHZt1EGGqUT7j6vhRRWqZrkHbXsbfK6L";
	const RFC_IDPUB: &str = "idpub3PeP4V7zeEejzcdEXMNqxznEX5SjobiHfbNtkYS4B8DtuZpvqL";
	const OFF_CURVE_IDPUB: &str = "idpub1mgk3Whn3aNo2bDbK6hxg3oDn75pcsvNBFChUCWprJX49bcsEo";

	#[test]
	fn test_known_vectors() -> eyre::Result<()> {
		let sec = IdSecKey::from_seed(&RFC_SEED);
		assert_eq!(sec.to_idsec_string(), RFC_IDSEC);
		assert_eq!(sec.public().as_str(), RFC_IDPUB);
		assert_eq!(sec.public().as_bytes(), &RFC_PUB);
		assert_eq!(sec.sign(b""), RFC_SIG);

		let parsed: IdPubKey = RFC_IDPUB.parse()?;
		assert_eq!(parsed, sec.public());
		assert_eq!(decode_idpub(RFC_IDPUB)?, RFC_PUB);
		assert_eq!(parsed.to_hex(), hex::encode(RFC_PUB));

		let sec_parsed: IdSecKey = RFC_IDSEC.parse()?;
		assert_eq!(sec_parsed.public(), parsed);
		Ok(())
	}

	#[test]
	fn test_verify() {
		assert!(verify(RFC_IDPUB, &RFC_SIG, b""));
		assert!(!verify(RFC_IDPUB, &RFC_SIG, b"not the message"));
		assert!(!verify(RFC_IDPUB, &RFC_SIG[..63], b""));
		assert!(!verify("idpubBAD", &RFC_SIG, b""));

		let mut tampered = RFC_SIG;
		tampered[10] ^= 0x01;
		assert!(!verify(RFC_IDPUB, &tampered, b""));
	}

	#[test]
	fn test_rejects_malformed() {
		assert_eq!(IdPubKey::from_str(""), Err(InvalidKeyFormat::WrongLength));
		assert!(matches!(
			IdPubKey::from_str("idpub0OIl"),
			Err(InvalidKeyFormat::Base58(_))
		));
		// An idsec is well formed, but not a public key.
		assert_eq!(
			IdPubKey::from_str(RFC_IDSEC),
			Err(InvalidKeyFormat::WrongPrefix)
		);
		assert_eq!(
			IdPubKey::try_from(&[0xff, 0xfe][..]),
			Err(InvalidKeyFormat::NotUtf8)
		);
		// Too long
		let long = format!("{RFC_IDPUB}1111");
		assert_eq!(IdPubKey::from_str(&long), Err(InvalidKeyFormat::WrongLength));
	}

	#[test]
	fn test_rejects_bad_checksum() {
		let mut raw = bs58::decode(RFC_IDPUB).into_vec().unwrap();
		let last = raw.len() - 1;
		raw[last] ^= 0x01;
		let s = bs58::encode(raw).into_string();
		assert_eq!(IdPubKey::from_str(&s), Err(InvalidKeyFormat::BadChecksum));
	}

	#[test]
	fn test_unusable_points_parse_but_never_verify() -> eyre::Result<()> {
		// 0x0202..02 is not the y coordinate of any curve point.
		let off_curve: IdPubKey = OFF_CURVE_IDPUB.parse()?;
		assert_eq!(off_curve.as_bytes(), &[2; 32]);
		assert_eq!(off_curve, IdPubKey::from_bytes([2; 32]));
		assert!(!off_curve.verify(&RFC_SIG, b""));

		// The identity point is low order. With R = identity and s = 0, a
		// lenient check would accept this signature for any message.
		let mut identity = [0; 32];
		identity[0] = 1;
		let weak: IdPubKey = IdPubKey::from_bytes(identity).as_str().parse()?;
		let mut forged = [0; SIGNATURE_LEN];
		forged[0] = 1;
		assert!(!weak.verify(&forged, b"anything"));
		assert!(!weak.verify(&forged, b""));
		Ok(())
	}

	#[test]
	fn test_generated_strings_have_readable_prefix() {
		for seed in 0..8u8 {
			let sec = IdSecKey::from_seed(&[seed; 32]);
			let idsec = sec.to_idsec_string();
			let idpub = sec.public().to_string();
			assert!(idsec.starts_with("idsec"), "{idsec}");
			assert!(idpub.starts_with("idpub"), "{idpub}");
			assert_eq!(idpub.len(), 55);
			assert_eq!(IdPubKey::try_from(idpub.as_bytes()).unwrap(), sec.public());
		}
	}
}
