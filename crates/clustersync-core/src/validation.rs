//! Header and block validation: seal verification and structural checks.

use std::collections::HashSet;

use crate::block::Block;
use crate::canonical::seal_message;
use crate::crypto::Ed25519PublicKey;
use crate::error::ValidationError;
use crate::header::Header;

/// Consensus rule deciding whether a header's seal is acceptable.
///
/// Implementations must be cheap to call repeatedly: a sync task checks the
/// seal of every header it downloads.
pub trait SealValidator: Send + Sync {
    fn validate_seal(&self, header: &Header) -> Result<(), ValidationError>;
}

/// Proof-of-authority seal rule.
///
/// A header is valid when its seal is a correct Ed25519 signature by its
/// `sealer`, and the sealer belongs to the authority set. An empty set
/// accepts any correctly signed header.
#[derive(Debug, Clone, Default)]
pub struct AuthoritySeal {
    authorities: HashSet<Ed25519PublicKey>,
}

impl AuthoritySeal {
    /// Accept any correctly signed header.
    pub fn open() -> Self {
        Self::default()
    }

    /// Accept only headers sealed by one of `authorities`.
    pub fn with_authorities(authorities: impl IntoIterator<Item = Ed25519PublicKey>) -> Self {
        Self {
            authorities: authorities.into_iter().collect(),
        }
    }
}

impl SealValidator for AuthoritySeal {
    fn validate_seal(&self, header: &Header) -> Result<(), ValidationError> {
        if !self.authorities.is_empty() && !self.authorities.contains(&header.sealer) {
            return Err(ValidationError::UnauthorizedSealer {
                hash: header.hash(),
                sealer: header.sealer.to_hex(),
            });
        }

        header
            .sealer
            .verify(&seal_message(header), &header.seal)
            .map_err(|_| ValidationError::SealFailed {
                number: header.number,
                hash: header.hash(),
            })
    }
}

/// Check that a block's body matches what its header commits to.
///
/// Does not check the seal; stores call [`SealValidator`] separately.
pub fn validate_block_body(block: &Block) -> Result<(), ValidationError> {
    if !block.body.matches_chain(block.header.chain) {
        return Err(ValidationError::BodyKindMismatch(block.hash()));
    }
    if block.body.hash() != block.header.body_hash {
        return Err(ValidationError::BodyHashMismatch(block.hash()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockBody;
    use crate::crypto::{Blake3Hash, Ed25519Signature, Keypair};
    use crate::types::{BlockHash, ChainId};
    use bytes::Bytes;

    fn header(kp: &Keypair) -> Header {
        Header::new(ChainId::Root, 7, BlockHash([1; 32]), Blake3Hash::ZERO).seal(kp)
    }

    #[test]
    fn test_open_accepts_signed_header() {
        let kp = Keypair::from_seed(&[0x42; 32]);
        assert!(AuthoritySeal::open().validate_seal(&header(&kp)).is_ok());
    }

    #[test]
    fn test_tampered_header_fails() {
        let kp = Keypair::from_seed(&[0x42; 32]);
        let mut h = header(&kp);
        h.number = 8;
        assert!(matches!(
            AuthoritySeal::open().validate_seal(&h),
            Err(ValidationError::SealFailed { number: 8, .. })
        ));
    }

    #[test]
    fn test_zero_seal_fails() {
        let kp = Keypair::from_seed(&[0x42; 32]);
        let mut h = header(&kp);
        h.seal = Ed25519Signature::ZERO;
        assert!(AuthoritySeal::open().validate_seal(&h).is_err());
    }

    #[test]
    fn test_unauthorized_sealer() {
        let authority = Keypair::from_seed(&[1; 32]);
        let outsider = Keypair::from_seed(&[2; 32]);
        let rule = AuthoritySeal::with_authorities([authority.public_key()]);

        assert!(rule.validate_seal(&header(&authority)).is_ok());
        assert!(matches!(
            rule.validate_seal(&header(&outsider)),
            Err(ValidationError::UnauthorizedSealer { .. })
        ));
    }

    #[test]
    fn test_body_validation() {
        let kp = Keypair::from_seed(&[5; 32]);
        let body = BlockBody::Minor {
            transactions: vec![Bytes::from_static(b"tx")],
        };
        let mut block = Block::sealed(ChainId::Shard(0), 1, BlockHash::ZERO, 0, body, &kp);
        assert!(validate_block_body(&block).is_ok());

        block.body = BlockBody::Minor {
            transactions: vec![Bytes::from_static(b"other")],
        };
        assert!(matches!(
            validate_block_body(&block),
            Err(ValidationError::BodyHashMismatch(_))
        ));

        block.body = BlockBody::empty_for(ChainId::Root);
        assert!(matches!(
            validate_block_body(&block),
            Err(ValidationError::BodyKindMismatch(_))
        ));
    }
}
