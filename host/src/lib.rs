pub mod arcade;
pub mod chains;
pub mod config;
pub mod rules;
pub mod wallet;

#[cfg(test)]
mod testing;

pub use arcade::{concise_message, Arcade, ArcadeError, SubmissionOutcome, SubmitSetup};
pub use chains::{get_chain, parse_chain_id, Chain, SUPPORTED_CHAINS};
pub use config::{ContractTarget, HostConfig, ReceiptPolicy};
pub use rules::{FetchError, RuleFetcher};
pub use wallet::{
    ConnectionState, JsonRpcProvider, SubmissionReceipt, WalletConnector, WalletError,
    WalletEvent, WalletProvider, WalletSession,
};
