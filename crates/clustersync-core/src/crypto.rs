//! Cryptographic primitives: Blake3 hashing and Ed25519 seals.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// A 32-byte Blake3 hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Blake3Hash(pub [u8; 32]);

impl Blake3Hash {
    /// Compute the Blake3 hash of the given data.
    pub fn hash(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub const ZERO: Self = Self([0u8; 32]);
}

impl fmt::Debug for Blake3Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blake3({})", &self.to_hex()[..16])
    }
}

/// A 32-byte Ed25519 public key identifying a block sealer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ed25519PublicKey(pub [u8; 32]);

impl Ed25519PublicKey {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Verify a signature over a message.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<(), CoreError> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;
        let sig = Signature::from_bytes(&signature.0);
        verifying_key
            .verify(message, &sig)
            .map_err(|_| CoreError::InvalidSignature)
    }
}

impl fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Pub({})", &self.to_hex()[..16])
    }
}

/// A 64-byte Ed25519 signature: the seal carried by every header.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ed25519Signature(pub [u8; 64]);

impl Ed25519Signature {
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Placeholder seal for headers that have not been sealed yet.
    pub const ZERO: Self = Self([0u8; 64]);
}

impl fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Sig({}...)", &self.to_hex()[..16])
    }
}

// serde only derives arrays up to 32 elements, so signatures go through bytes.
impl Serialize for Ed25519Signature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Ed25519Signature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes: serde_bytes_compat::ByteBuf = Deserialize::deserialize(deserializer)?;
        let arr: [u8; 64] = bytes
            .0
            .try_into()
            .map_err(|_| serde::de::Error::invalid_length(64, &"64 signature bytes"))?;
        Ok(Self(arr))
    }
}

mod serde_bytes_compat {
    use serde::de::{Deserializer, SeqAccess, Visitor};
    use std::fmt;

    /// Accepts either a CBOR/JSON byte string or a sequence of u8.
    pub struct ByteBuf(pub Vec<u8>);

    impl<'de> serde::Deserialize<'de> for ByteBuf {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            struct ByteBufVisitor;

            impl<'de> Visitor<'de> for ByteBufVisitor {
                type Value = ByteBuf;

                fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str("a byte string")
                }

                fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> Result<ByteBuf, E> {
                    Ok(ByteBuf(v.to_vec()))
                }

                fn visit_byte_buf<E: serde::de::Error>(self, v: Vec<u8>) -> Result<ByteBuf, E> {
                    Ok(ByteBuf(v))
                }

                fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<ByteBuf, A::Error> {
                    let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(64));
                    while let Some(b) = seq.next_element::<u8>()? {
                        out.push(b);
                    }
                    Ok(ByteBuf(out))
                }
            }

            deserializer.deserialize_byte_buf(ByteBufVisitor)
        }
    }
}

/// A keypair for sealing headers.
///
/// This wraps ed25519-dalek's SigningKey.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            signing_key: SigningKey::generate(&mut rng),
        }
    }

    /// Create from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        Ed25519Signature(self.signing_key.sign(message).to_bytes())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({:?})", self.public_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_sign_verify() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let signature = keypair.sign(b"header bytes");

        keypair
            .public_key()
            .verify(b"header bytes", &signature)
            .expect("valid signature should verify");
        assert!(keypair.public_key().verify(b"header bytez", &signature).is_err());
    }

    #[test]
    fn test_signature_serde_roundtrip() {
        let keypair = Keypair::from_seed(&[0x07; 32]);
        let signature = keypair.sign(b"seal");

        let mut buf = Vec::new();
        ciborium::into_writer(&signature, &mut buf).unwrap();
        let decoded: Ed25519Signature = ciborium::from_reader(&buf[..]).unwrap();
        assert_eq!(decoded, signature);

        let json = serde_json::to_string(&signature).unwrap();
        let decoded: Ed25519Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, signature);
    }

    #[test]
    fn test_blake3_hash() {
        assert_eq!(Blake3Hash::hash(b"a"), Blake3Hash::hash(b"a"));
        assert_ne!(Blake3Hash::hash(b"a"), Blake3Hash::hash(b"b"));
    }
}
