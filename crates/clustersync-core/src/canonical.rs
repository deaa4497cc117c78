//! Canonical CBOR encoding for header content.
//!
//! Header hashes and seals are computed over these bytes, so every node must
//! produce the identical encoding:
//! - Map keys are small integers, written in ascending encoded order
//! - Integers use the smallest valid encoding
//! - Definite lengths only

use ciborium::value::Value;

use crate::crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature};
use crate::error::CoreError;
use crate::header::Header;
use crate::types::{BlockHash, ChainId};

/// Domain tag prepended to the bytes a sealer signs.
pub const SEAL_DOMAIN: &[u8] = b"clustersync-seal-v0:";

/// Domain tag prepended when computing a block hash.
pub const HASH_DOMAIN: &[u8] = b"clustersync-header-v0:";

mod keys {
    pub const CHAIN: u64 = 0;
    pub const NUMBER: u64 = 1;
    pub const PARENT_HASH: u64 = 2;
    pub const TIMESTAMP: u64 = 3;
    pub const BODY_HASH: u64 = 4;
    pub const SEALER: u64 = 5;
}

/// Canonical bytes of every header field except the seal.
pub fn canonical_content_bytes(header: &Header) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, &content_to_cbor_value(header));
    buf
}

/// The message a sealer signs: `SEAL_DOMAIN || content`.
pub fn seal_message(header: &Header) -> Vec<u8> {
    let mut buf = SEAL_DOMAIN.to_vec();
    buf.extend_from_slice(&canonical_content_bytes(header));
    buf
}

/// Block hash: `Blake3(HASH_DOMAIN || content || seal)`.
pub fn header_hash(header: &Header) -> BlockHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(HASH_DOMAIN);
    hasher.update(&canonical_content_bytes(header));
    hasher.update(&header.seal.0);
    BlockHash(*hasher.finalize().as_bytes())
}

/// Full header encoding: `content || seal`.
pub fn encode_header(header: &Header) -> Vec<u8> {
    let mut buf = canonical_content_bytes(header);
    buf.extend_from_slice(&header.seal.0);
    buf
}

/// Decode a header produced by [`encode_header`].
pub fn decode_header(bytes: &[u8]) -> Result<Header, CoreError> {
    if bytes.len() < 64 {
        return Err(CoreError::MalformedHeader("too short".into()));
    }
    let (content, seal) = bytes.split_at(bytes.len() - 64);
    let value: Value =
        ciborium::from_reader(content).map_err(|e| CoreError::DecodingError(e.to_string()))?;

    let mut header = cbor_value_to_content(&value)?;
    // Content must re-encode to exactly the bytes we were given.
    if canonical_content_bytes(&header) != content {
        return Err(CoreError::MalformedHeader("non-canonical encoding".into()));
    }
    let seal: [u8; 64] = seal
        .try_into()
        .map_err(|_| CoreError::MalformedHeader("invalid seal length".into()))?;
    header.seal = Ed25519Signature(seal);
    Ok(header)
}

fn content_to_cbor_value(header: &Header) -> Value {
    Value::Map(vec![
        (int(keys::CHAIN), int(header.chain.to_tag())),
        (int(keys::NUMBER), int(header.number)),
        (int(keys::PARENT_HASH), Value::Bytes(header.parent_hash.0.to_vec())),
        (int(keys::TIMESTAMP), Value::Integer(header.timestamp.into())),
        (int(keys::BODY_HASH), Value::Bytes(header.body_hash.0.to_vec())),
        (int(keys::SEALER), Value::Bytes(header.sealer.0.to_vec())),
    ])
}

fn int(n: u64) -> Value {
    Value::Integer(n.into())
}

fn cbor_value_to_content(value: &Value) -> Result<Header, CoreError> {
    let map = match value {
        Value::Map(m) => m,
        _ => return Err(CoreError::MalformedHeader("expected map".into())),
    };

    let get = |key: u64| -> Option<&Value> {
        map.iter()
            .find(|(k, _)| match k {
                Value::Integer(i) => i128::from(*i) == i128::from(key),
                _ => false,
            })
            .map(|(_, v)| v)
    };

    let uint = |key: u64, name: &str| -> Result<u64, CoreError> {
        match get(key) {
            Some(Value::Integer(i)) => u64::try_from(i128::from(*i))
                .map_err(|_| CoreError::MalformedHeader(format!("{} out of range", name))),
            _ => Err(CoreError::MalformedHeader(format!("missing {}", name))),
        }
    };

    let bytes32 = |key: u64, name: &str| -> Result<[u8; 32], CoreError> {
        match get(key) {
            Some(Value::Bytes(b)) => b
                .as_slice()
                .try_into()
                .map_err(|_| CoreError::MalformedHeader(format!("invalid {}", name))),
            _ => Err(CoreError::MalformedHeader(format!("missing {}", name))),
        }
    };

    let chain = ChainId::from_tag(uint(keys::CHAIN, "chain")?)
        .ok_or_else(|| CoreError::MalformedHeader("invalid chain".into()))?;

    let timestamp = match get(keys::TIMESTAMP) {
        Some(Value::Integer(i)) => i64::try_from(i128::from(*i))
            .map_err(|_| CoreError::MalformedHeader("timestamp out of range".into()))?,
        _ => return Err(CoreError::MalformedHeader("missing timestamp".into())),
    };

    Ok(Header {
        chain,
        number: uint(keys::NUMBER, "number")?,
        parent_hash: BlockHash(bytes32(keys::PARENT_HASH, "parent_hash")?),
        timestamp,
        body_hash: Blake3Hash(bytes32(keys::BODY_HASH, "body_hash")?),
        sealer: Ed25519PublicKey(bytes32(keys::SEALER, "sealer")?),
        seal: Ed25519Signature::ZERO,
    })
}

/// Recursively encode a CBOR value.
///
/// Only the value shapes produced by this module are supported.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(i) => {
            let n = i128::from(*i);
            if n >= 0 {
                encode_uint(buf, 0, n as u64);
            } else {
                // CBOR encodes -1 as 0, -2 as 1, etc.
                encode_uint(buf, 1, (-1 - n) as u64);
            }
        }
        Value::Bytes(b) => {
            encode_uint(buf, 2, b.len() as u64);
            buf.extend_from_slice(b);
        }
        Value::Map(entries) => encode_map_canonical(buf, entries),
        _ => unreachable!("header content only contains integers, bytes and maps"),
    }
}

fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Keys are sorted by their encoded bytes.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) {
    let mut pairs: Vec<(Vec<u8>, &Value)> = entries
        .iter()
        .map(|(k, v)| {
            let mut key_buf = Vec::new();
            encode_value_to(&mut key_buf, k);
            (key_buf, v)
        })
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;

    fn sample_header() -> Header {
        let keypair = Keypair::from_seed(&[0x11; 32]);
        Header::new(ChainId::Shard(3), 1_000_000, BlockHash([0xaa; 32]), Blake3Hash::hash(b"body"))
            .timestamp(-5)
            .seal(&keypair)
    }

    #[test]
    fn test_uint_smallest_encoding() {
        let mut buf = Vec::new();
        encode_uint(&mut buf, 0, 23);
        assert_eq!(buf, vec![0x17]);

        buf.clear();
        encode_uint(&mut buf, 0, 24);
        assert_eq!(buf, vec![0x18, 24]);

        buf.clear();
        encode_uint(&mut buf, 0, 500);
        assert_eq!(buf, vec![0x19, 0x01, 0xf4]);
    }

    #[test]
    fn test_header_decode_roundtrip() {
        let header = sample_header();
        let decoded = decode_header(&encode_header(&header)).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(header_hash(&decoded), header.hash());
    }

    #[test]
    fn test_content_is_deterministic() {
        let header = sample_header();
        assert_eq!(canonical_content_bytes(&header), canonical_content_bytes(&header.clone()));
    }

    #[test]
    fn test_decode_rejects_truncated() {
        assert!(decode_header(&[0u8; 10]).is_err());
    }

    proptest::proptest! {
        #[test]
        fn test_decode_arbitrary_bytes_never_panics(bytes in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..256)) {
            let _ = decode_header(&bytes);
        }
    }

    #[test]
    fn test_seal_changes_hash() {
        let header = sample_header();
        let mut other = header.clone();
        other.seal = Ed25519Signature::ZERO;
        assert_ne!(header_hash(&header), header_hash(&other));
    }
}
