//! Proptest generators for property-based testing.

use proptest::prelude::*;

use clustersync_core::{BlockHash, ChainId, Keypair};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random BlockHash.
pub fn block_hash() -> impl Strategy<Value = BlockHash> {
    any::<[u8; 32]>().prop_map(BlockHash::from_bytes)
}

/// Generate a chain id, root or one of a few shards.
pub fn chain_id() -> impl Strategy<Value = ChainId> {
    prop_oneof![Just(ChainId::Root), (0u32..8).prop_map(ChainId::Shard)]
}

/// Shape of a two-node sync scenario.
///
/// Both nodes share `shared` blocks from genesis. The local node then has
/// `local_fork` blocks of its own, the remote `remote_fork` blocks that the
/// local node must sync.
#[derive(Debug, Clone)]
pub struct SyncScenario {
    pub seed: [u8; 32],
    pub shared: usize,
    pub local_fork: usize,
    pub remote_fork: usize,
    pub header_batch: usize,
    pub block_batch: usize,
}

impl Arbitrary for SyncScenario {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            any::<[u8; 32]>(),
            1usize..12,
            0usize..6,
            1usize..40,
            1usize..8,
            1usize..8,
        )
            .prop_map(
                |(seed, shared, local_fork, remote_fork, header_batch, block_batch)| SyncScenario {
                    seed,
                    shared,
                    local_fork,
                    remote_fork,
                    header_batch,
                    block_batch,
                },
            )
            .boxed()
    }
}
