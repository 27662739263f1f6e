//! Chain-facing types and the read interfaces the forecaster consumes.
//!
//! The forecaster only ever sees these traits; `rpc::EthRpcClient` is the
//! production implementation and tests plug in in-memory readers.

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_rpc_types_eth::{BlockNumberOrTag, Filter, Log};
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;

use crate::error::RpcError;

sol! {
    /// Leaf counters and registration queues of the trees contract.
    interface ITreesContract {
        function lastProcessedDepositLeaf() external view returns (uint256);
        function lastProcessedWithdrawalLeaf() external view returns (uint256);
        function getRegisteredDeposits() external view returns (bytes32[] memory _deposits);
        function getRegisteredWithdrawals() external view returns (bytes32[] memory _withdrawals);
    }

    /// Events emitted by every pool instance.
    interface IInstance {
        event Deposit(bytes32 indexed commitment, uint32 leafIndex, uint256 timestamp);
        event Withdrawal(address to, bytes32 nullifierHash, address indexed relayer, uint256 fee);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub number: u64,
    /// Unix seconds.
    pub timestamp: u64,
}

/// `eth_getLogs` filter for one event on one contract over `[from_block, to_block]`.
pub fn event_filter(address: Address, topic: B256, from_block: u64, to_block: u64) -> Filter {
    Filter::new()
        .address(address)
        .event_signature(topic)
        .from_block(from_block)
        .to_block(to_block)
}

#[async_trait]
pub trait BlockLogReader: Send + Sync {
    async fn block(&self, tag: BlockNumberOrTag) -> Result<BlockHeader, RpcError>;

    async fn logs(&self, filter: &Filter) -> Result<Vec<Log>, RpcError>;
}

/// Read-only `eth_call` against the current head.
#[async_trait]
pub trait ContractCaller: Send + Sync {
    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes, RpcError>;
}

/// Point-in-time reads of the trees contract's leaf counters and queues.
#[async_trait]
pub trait TreesStateReader: Send + Sync {
    async fn last_processed_deposit_leaf(&self) -> Result<u64, RpcError>;
    async fn last_processed_withdrawal_leaf(&self) -> Result<u64, RpcError>;
    async fn registered_deposits_len(&self) -> Result<u64, RpcError>;
    async fn registered_withdrawals_len(&self) -> Result<u64, RpcError>;
}

/// Typed view over a deployed trees contract.
pub struct TreesContract<'a, C: ?Sized> {
    caller: &'a C,
    address: Address,
}

impl<'a, C: ContractCaller + ?Sized> TreesContract<'a, C> {
    pub fn new(caller: &'a C, address: Address) -> Self {
        Self { caller, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    async fn read<T: SolCall>(&self, call: T) -> Result<T::Return, RpcError> {
        tracing::debug!(contract = %self.address, method = T::SIGNATURE, "eth_call");
        let data = self.caller.call(self.address, call.abi_encode().into()).await?;
        T::abi_decode_returns(&data)
            .map_err(|e| RpcError::Malformed(format!("{} returned {}: {}", T::SIGNATURE, data, e)))
    }
}

fn uint_to_u64(value: U256, method: &str) -> Result<u64, RpcError> {
    u64::try_from(value)
        .map_err(|_| RpcError::Malformed(format!("{} returned {} which does not fit in u64", method, value)))
}

#[async_trait]
impl<'a, C: ContractCaller + ?Sized> TreesStateReader for TreesContract<'a, C> {
    async fn last_processed_deposit_leaf(&self) -> Result<u64, RpcError> {
        let leaf = self.read(ITreesContract::lastProcessedDepositLeafCall {}).await?;
        uint_to_u64(leaf, ITreesContract::lastProcessedDepositLeafCall::SIGNATURE)
    }

    async fn last_processed_withdrawal_leaf(&self) -> Result<u64, RpcError> {
        let leaf = self.read(ITreesContract::lastProcessedWithdrawalLeafCall {}).await?;
        uint_to_u64(leaf, ITreesContract::lastProcessedWithdrawalLeafCall::SIGNATURE)
    }

    async fn registered_deposits_len(&self) -> Result<u64, RpcError> {
        let queue = self.read(ITreesContract::getRegisteredDepositsCall {}).await?;
        Ok(queue.len() as u64)
    }

    async fn registered_withdrawals_len(&self) -> Result<u64, RpcError> {
        let queue = self.read(ITreesContract::getRegisteredWithdrawalsCall {}).await?;
        Ok(queue.len() as u64)
    }
}
