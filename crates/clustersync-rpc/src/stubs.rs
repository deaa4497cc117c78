//! Typed per-role client stubs.
//!
//! Each stub is generated from one operation list. The same list backs the
//! role's [`OpRegistry`](crate::ops::OpRegistry), so the registry and the
//! stub cannot disagree about which operations a role accepts.

use std::sync::Arc;

use crate::channel::Channel;
use crate::message::{Reply, Request};
use crate::ops::{Op, ServerRole};

macro_rules! op_client {
    (
        $(#[$meta:meta])*
        $client:ident {
            $($op:ident => $method:ident,)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $client {
            channel: Arc<dyn Channel>,
        }

        impl $client {
            /// Operations this stub can invoke.
            pub const OPS: &'static [Op] = &[$(Op::$op,)*];

            pub fn new(channel: Arc<dyn Channel>) -> Self {
                Self { channel }
            }

            $(
                pub async fn $method(&self, request: Request) -> Reply {
                    self.channel.invoke(Op::$op.name(), request).await
                }
            )*

            /// Route `op` to its method. Returns `None` for operations this
            /// stub does not carry.
            pub async fn dispatch(&self, op: Op, request: Request) -> Option<Reply> {
                match op {
                    $(Op::$op => Some(self.$method(request).await),)*
                    #[allow(unreachable_patterns)]
                    _ => None,
                }
            }
        }
    };
}

op_client! {
    /// Client for operations served by a master.
    MasterServerSideOpClient {
        AddMinorBlockHeader => add_minor_block_header,
        BroadcastNewTip => broadcast_new_tip,
        BroadcastTransactions => broadcast_transactions,
        BroadcastMinorBlock => broadcast_minor_block,
        GetMinorBlocks => get_minor_blocks,
        GetMinorBlockHeaders => get_minor_block_headers,
    }
}

op_client! {
    /// Client for operations served by a slave.
    SlaveServerSideOpClient {
        HeartBeat => heart_beat,
        MasterInfo => master_info,
        Ping => ping,
        AddRootBlock => add_root_block,
        GetEcoInfoList => get_eco_info_list,
        GetNextBlockToMine => get_next_block_to_mine,
        GetUnconfirmedHeaders => get_unconfirmed_headers,
        GetAccountData => get_account_data,
        AddTransaction => add_transaction,
        AddXshardTxList => add_xshard_tx_list,
        SyncMinorBlockList => sync_minor_block_list,
        AddMinorBlock => add_minor_block,
        CreateClusterPeerConnection => create_cluster_peer_connection,
        GetMinorBlock => get_minor_block,
        GetTransaction => get_transaction,
        BatchAddXshardTxList => batch_add_xshard_tx_list,
        ExecuteTransaction => execute_transaction,
        GetTransactionReceipt => get_transaction_receipt,
        GetMine => get_mine,
        GenTx => gen_tx,
        GetTransactionListByAddress => get_transaction_list_by_address,
        GetLogs => get_logs,
        EstimateGas => estimate_gas,
        GetStorageAt => get_storage_at,
        GetCode => get_code,
        GasPrice => gas_price,
        GetWork => get_work,
        SubmitWork => submit_work,
        GetMinorBlocks => get_minor_blocks,
        GetMinorBlockHeaders => get_minor_block_headers,
        HandleNewTip => handle_new_tip,
        AddTransactions => add_transactions,
    }
}

/// A role-bound stub over one channel.
#[derive(Clone)]
pub enum OpClient {
    Master(MasterServerSideOpClient),
    Slave(SlaveServerSideOpClient),
}

impl OpClient {
    /// Build the stub shape for `role`.
    pub fn for_role(role: ServerRole, channel: Arc<dyn Channel>) -> Self {
        match role {
            ServerRole::Master => OpClient::Master(MasterServerSideOpClient::new(channel)),
            ServerRole::Slave => OpClient::Slave(SlaveServerSideOpClient::new(channel)),
        }
    }

    pub fn role(&self) -> ServerRole {
        match self {
            OpClient::Master(_) => ServerRole::Master,
            OpClient::Slave(_) => ServerRole::Slave,
        }
    }

    /// Invoke `op` through the typed stub.
    pub async fn dispatch(&self, op: Op, request: Request) -> Option<Reply> {
        match self {
            OpClient::Master(client) => client.dispatch(op, request).await,
            OpClient::Slave(client) => client.dispatch(op, request).await,
        }
    }
}
