//! Serving side of sync: answers header and block requests from a store.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use clustersync_core::ChainId;
use clustersync_rpc::{
    decode_payload, encode_payload, status_code, Op, OpHandler, Reply, Request, Response, Status,
};
use clustersync_store::{ChainStore, ChainStoreExt};

use crate::messages::{
    error_code, GetBlocksRequest, GetBlocksResponse, GetHeadersRequest, GetHeadersResponse,
};
use crate::task::SizeLimits;

/// Answers sync requests for one chain from a local store.
pub struct BlockServer<S> {
    store: Arc<S>,
    chain: ChainId,
    limits: SizeLimits,
}

impl<S: ChainStore> BlockServer<S> {
    pub fn new(store: Arc<S>, chain: ChainId) -> Self {
        Self {
            store,
            chain,
            limits: SizeLimits::for_chain(chain),
        }
    }

    /// Cap header responses at `limits.header_batch`.
    pub fn with_size_limits(mut self, limits: SizeLimits) -> Self {
        self.limits = limits;
        self
    }

    async fn headers(&self, rpc_id: u64, data: &[u8]) -> Response {
        let request: GetHeadersRequest = match decode_payload(data) {
            Ok(request) => request,
            Err(_) => return Response::error(rpc_id, error_code::BAD_REQUEST),
        };
        if request.chain != self.chain {
            return Response::error(rpc_id, error_code::WRONG_CHAIN);
        }

        let limit = (request.limit as usize).min(self.limits.header_batch);
        match self.store.headers_descending(request.parent, limit).await {
            Ok(headers) => encode(rpc_id, &GetHeadersResponse { headers }),
            Err(err) => {
                tracing::warn!(error = %err, "failed to read headers");
                Response::error(rpc_id, error_code::STORE_FAILURE)
            }
        }
    }

    async fn blocks(&self, rpc_id: u64, data: &[u8]) -> Response {
        let request: GetBlocksRequest = match decode_payload(data) {
            Ok(request) => request,
            Err(_) => return Response::error(rpc_id, error_code::BAD_REQUEST),
        };
        if request.chain != self.chain {
            return Response::error(rpc_id, error_code::WRONG_CHAIN);
        }

        match self.store.blocks_by_hash(&request.hashes).await {
            Ok(blocks) => encode(rpc_id, &GetBlocksResponse { blocks }),
            Err(err) => {
                tracing::warn!(error = %err, "failed to read blocks");
                Response::error(rpc_id, error_code::STORE_FAILURE)
            }
        }
    }
}

fn encode<T: serde::Serialize>(rpc_id: u64, payload: &T) -> Response {
    match encode_payload(payload) {
        Ok(data) => Response::ok(rpc_id, data),
        Err(_) => Response::error(rpc_id, error_code::STORE_FAILURE),
    }
}

#[async_trait]
impl<S: ChainStore + 'static> OpHandler for BlockServer<S> {
    async fn handle(&self, op: Op, request: Request) -> Reply {
        let response = match op {
            Op::Ping | Op::HeartBeat => Response::ok(request.rpc_id, Bytes::new()),
            Op::GetMinorBlockHeaders => self.headers(request.rpc_id, &request.data).await,
            Op::GetMinorBlocks => self.blocks(request.rpc_id, &request.data).await,
            other => {
                return Reply::status(Status::new(
                    status_code::UNIMPLEMENTED,
                    format!("{} is not served here", other.name()),
                ))
            }
        };
        Reply::response(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clustersync_core::{AuthoritySeal, Block, BlockBody, BlockHash, Keypair};
    use clustersync_store::MemoryChainStore;

    fn server_with(len: u64) -> (Vec<Block>, BlockServer<MemoryChainStore>) {
        let keypair = Keypair::from_seed(&[4; 32]);
        let store = MemoryChainStore::new(Arc::new(AuthoritySeal::open()));
        let mut blocks = Vec::new();
        let mut parent = BlockHash::ZERO;
        for number in 0..len {
            let block = Block::sealed(
                ChainId::Shard(0),
                number,
                parent,
                0,
                BlockBody::empty_for(ChainId::Shard(0)),
                &keypair,
            );
            parent = block.hash();
            store.insert_trusted(block.clone()).unwrap();
            blocks.push(block);
        }
        (blocks, BlockServer::new(Arc::new(store), ChainId::Shard(0)))
    }

    fn request(op: Op, payload: &impl serde::Serialize) -> Request {
        let mut request = Request::new(op, encode_payload(payload).unwrap());
        request.rpc_id = 9;
        request
    }

    #[tokio::test]
    async fn test_serves_headers_capped() {
        let (blocks, server) = server_with(10);
        let server = server.with_size_limits(SizeLimits::new(4, 4));

        let reply = server
            .handle(
                Op::GetMinorBlockHeaders,
                request(
                    Op::GetMinorBlockHeaders,
                    &GetHeadersRequest {
                        chain: ChainId::Shard(0),
                        parent: blocks[8].hash(),
                        limit: 100,
                    },
                ),
            )
            .await;

        let response = reply.response.unwrap();
        assert_eq!(response.rpc_id, 9);
        let payload: GetHeadersResponse = decode_payload(&response.data).unwrap();
        let numbers: Vec<u64> = payload.headers.iter().map(|h| h.number).collect();
        assert_eq!(numbers, vec![8, 7, 6, 5]);
    }

    #[tokio::test]
    async fn test_serves_known_blocks_only() {
        let (blocks, server) = server_with(3);

        let reply = server
            .handle(
                Op::GetMinorBlocks,
                request(
                    Op::GetMinorBlocks,
                    &GetBlocksRequest {
                        chain: ChainId::Shard(0),
                        hashes: vec![blocks[2].hash(), BlockHash([1; 32]), blocks[0].hash()],
                    },
                ),
            )
            .await;

        let payload: GetBlocksResponse = decode_payload(&reply.response.unwrap().data).unwrap();
        assert_eq!(payload.blocks, vec![blocks[2].clone(), blocks[0].clone()]);
    }

    #[tokio::test]
    async fn test_wrong_chain_and_bad_payload() {
        let (blocks, server) = server_with(2);

        let reply = server
            .handle(
                Op::GetMinorBlocks,
                request(
                    Op::GetMinorBlocks,
                    &GetBlocksRequest {
                        chain: ChainId::Root,
                        hashes: vec![blocks[1].hash()],
                    },
                ),
            )
            .await;
        assert_eq!(reply.response.unwrap().error_code, error_code::WRONG_CHAIN);

        let reply = server
            .handle(Op::GetMinorBlockHeaders, Request::new(Op::GetMinorBlockHeaders, vec![0xff]))
            .await;
        assert_eq!(reply.response.unwrap().error_code, error_code::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unserved_op_is_status() {
        let (_, server) = server_with(1);
        let reply = server
            .handle(Op::GetWork, Request::new(Op::GetWork, Bytes::new()))
            .await;
        assert_eq!(reply.status.unwrap().code, status_code::UNIMPLEMENTED);

        let reply = server.handle(Op::Ping, Request::new(Op::Ping, Bytes::new())).await;
        assert!(reply.response.unwrap().is_ok());
    }
}
