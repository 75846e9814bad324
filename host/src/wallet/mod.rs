//! Wallet access: an EIP-1193 style provider abstraction, a JSON-RPC
//! implementation of it, and the connector that binds a session to a chain
//! and submits verification payloads.

mod connector;
mod provider;

pub use connector::{
    add_input_call_data, ConnectionState, SubmissionReceipt, WalletConnector, WalletSession,
};
pub use provider::{JsonRpcProvider, RpcError, WalletProvider, WalletEvent};

use rives_arcade_core::AbiError;

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("MetaMask or another web3 wallet is not installed. Please install one to proceed.")]
    WalletNotFound,
    #[error("Chain not found: {chain_id}")]
    ChainNotFound { chain_id: String },
    #[error("Wallet on wrong chain")]
    WrongChain { expected: u64, actual: Option<u64> },
    #[error("No connected wallet")]
    NoConnectedWallet,
    #[error("Wallet session is stale. Reconnect before submitting.")]
    StaleSession,
    #[error("Wallet returned no accounts. Unlock the wallet and connect again.")]
    NoAccounts,
    #[error("Contract call simulation failed: {0}")]
    SimulationFailed(RpcError),
    #[error("Transaction {tx_hash} reverted")]
    TransactionReverted { tx_hash: String },
    #[error("Timed out waiting for the receipt of transaction {tx_hash}")]
    ReceiptTimeout { tx_hash: String },
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("invalid submission call data: {0}")]
    CallData(#[from] AbiError),
}
