//! The sync node: wires a chain store, the cluster RPC client and sync tasks.

use std::sync::Arc;

use clustersync_core::{ChainId, Header};
use clustersync_rpc::{Connector, RpcClient, ServerRole};
use clustersync_store::ChainStore;
use clustersync_sync::{
    BlockServer, MinorBlockListSync, RpcPeer, SyncOutcome, SyncTask, Synchronizer,
};

use crate::config::NodeConfig;
use crate::error::Result;

/// One node's view of cluster sync.
///
/// Provides a unified API for:
/// - Syncing a chain from a peer endpoint
/// - Queueing sync tasks on a background synchronizer
/// - Serving the local chain to peers
pub struct SyncNode<S: ChainStore> {
    store: Arc<S>,
    client: Arc<RpcClient>,
    /// Client for slave-side operations, present when slaves are configured.
    slaves: Option<Arc<RpcClient>>,
    config: NodeConfig,
}

impl<S: ChainStore + 'static> SyncNode<S> {
    /// Create a node. Connections are dialed lazily through `connector`.
    pub fn new(store: Arc<S>, connector: Arc<dyn Connector>, config: NodeConfig) -> Result<Self> {
        config.validate()?;

        let client = Arc::new(RpcClient::new(
            config.role,
            Arc::clone(&connector),
            config.client.clone(),
        ));
        let slaves = if config.slave_endpoints.is_empty() {
            None
        } else {
            Some(Arc::new(RpcClient::new(
                ServerRole::Slave,
                connector,
                config.client.clone(),
            )))
        };

        Ok(Self {
            store,
            client,
            slaves,
            config,
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn client(&self) -> &Arc<RpcClient> {
        &self.client
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// A fetcher for `chain` from `endpoint`.
    ///
    /// Root-chain peers get the minor-block-list pre-commit when slaves are
    /// configured.
    pub fn peer(&self, endpoint: &str, chain: ChainId) -> RpcPeer {
        let peer = RpcPeer::new(Arc::clone(&self.client), endpoint, chain);
        match (&self.slaves, chain) {
            (Some(slaves), ChainId::Root) => peer.with_pre_commit(Arc::new(
                MinorBlockListSync::new(Arc::clone(slaves), self.config.slave_endpoints.clone()),
            )),
            _ => peer,
        }
    }

    /// A sync task for `header`, fetching from `endpoint`.
    pub fn task(&self, header: Header, endpoint: &str) -> SyncTask {
        let peer = self.peer(endpoint, header.chain);
        SyncTask::new(header, Arc::new(peer), self.config.sync.clone()).with_peer_id(endpoint)
    }

    /// Sync up to `header` from `endpoint` and wait for the result.
    pub async fn sync(&self, header: Header, endpoint: &str) -> Result<SyncOutcome> {
        let task = self.task(header, endpoint);
        tracing::debug!(task = task.name(), endpoint, "starting sync");
        Ok(task.run(self.store.as_ref()).await?)
    }

    /// A handler serving this node's `chain` to peers.
    pub fn server(&self, chain: ChainId) -> BlockServer<S> {
        BlockServer::new(Arc::clone(&self.store), chain)
    }

    /// Start a background synchronizer over this node's store.
    pub fn synchronizer(&self) -> Synchronizer {
        Synchronizer::spawn(Arc::clone(&self.store))
    }

    /// Close every RPC connection.
    pub async fn close(&self) {
        self.client.close().await;
        if let Some(slaves) = &self.slaves {
            slaves.close().await;
        }
    }
}
