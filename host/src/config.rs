use std::{env, time::Duration};

use rives_arcade_core::EmulatorUrls;

use crate::chains::BASE_SEPOLIA;

pub const DEFAULT_NODE_URL: &str = "https://app.rives.io";
pub const DEFAULT_EMULATOR_URL: &str = "https://emulator.rives.io";
pub const DEFAULT_WORLD_ADDRESS: &str = "0x04969e1d36d43515cc6493a286021b44b0fce6f2";
pub const DEFAULT_APP_ADDRESS: &str = "0xECB28678045a94F8b96EdE1c8203aDEa81F8AAe3";
pub const DEFAULT_RECEIPT_POLL_MS: u64 = 4_000;
pub const DEFAULT_RECEIPT_TIMEOUT_SECS: u64 = 180;
pub const DEFAULT_WALLET_WATCH_MS: u64 = 2_000;

/// Contract the verification payload is routed through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractTarget {
    pub world_address: String,
    pub app_address: String,
}

impl Default for ContractTarget {
    fn default() -> Self {
        Self {
            world_address: DEFAULT_WORLD_ADDRESS.to_string(),
            app_address: DEFAULT_APP_ADDRESS.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReceiptPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for ReceiptPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_RECEIPT_POLL_MS),
            timeout: Duration::from_secs(DEFAULT_RECEIPT_TIMEOUT_SECS),
        }
    }
}

#[derive(Clone, Debug)]
pub struct HostConfig {
    pub node_url: String,
    pub urls: EmulatorUrls,
    pub cartridge_id: String,
    pub tape_id: Option<String>,
    pub contest_id: Option<String>,
    pub chain_id: u64,
    /// Wallet JSON-RPC endpoint. Unset means no wallet is available.
    pub wallet_rpc_url: Option<String>,
    /// Overrides the chain's default public RPC for simulation and receipts.
    pub public_rpc_url: Option<String>,
    pub target: ContractTarget,
    pub receipt: ReceiptPolicy,
    pub wallet_watch: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            node_url: DEFAULT_NODE_URL.to_string(),
            urls: EmulatorUrls {
                emulator: DEFAULT_EMULATOR_URL.to_string(),
                cartridges: format!("{DEFAULT_NODE_URL}/cartridges"),
                tapes: format!("{DEFAULT_NODE_URL}/tapes"),
            },
            cartridge_id: String::new(),
            tape_id: None,
            contest_id: None,
            chain_id: BASE_SEPOLIA.id,
            wallet_rpc_url: None,
            public_rpc_url: None,
            target: ContractTarget::default(),
            receipt: ReceiptPolicy::default(),
            wallet_watch: Duration::from_millis(DEFAULT_WALLET_WATCH_MS),
        }
    }
}

impl HostConfig {
    pub fn from_env() -> Self {
        let node_url = read_env_string("RIVES_NODE_URL", DEFAULT_NODE_URL);
        let node_base = node_url.trim_end_matches('/').to_string();
        let urls = EmulatorUrls {
            emulator: read_env_string("EMULATOR_URL", DEFAULT_EMULATOR_URL),
            cartridges: read_env_string("CARTRIDGES_URL", &format!("{node_base}/cartridges")),
            tapes: read_env_string("TAPES_URL", &format!("{node_base}/tapes")),
        };

        let chain_id = match read_env_optional_string("CHAIN_ID") {
            Some(value) => crate::chains::parse_chain_id(&value).unwrap_or_else(|| {
                tracing::warn!(
                    "CHAIN_ID ({}) is not a decimal or 0x-hex chain id. Falling back to {}.",
                    value,
                    BASE_SEPOLIA.id
                );
                BASE_SEPOLIA.id
            }),
            None => BASE_SEPOLIA.id,
        };

        Self {
            node_url,
            urls,
            cartridge_id: read_env_string("CARTRIDGE_ID", ""),
            tape_id: read_env_optional_string("TAPE_ID"),
            contest_id: read_env_optional_string("CONTEST_ID"),
            chain_id,
            wallet_rpc_url: read_env_optional_string("WALLET_RPC_URL"),
            public_rpc_url: read_env_optional_string("PUBLIC_RPC_URL"),
            target: ContractTarget {
                world_address: read_env_string("WORLD_ADDRESS", DEFAULT_WORLD_ADDRESS),
                app_address: read_env_string("APP_ADDRESS", DEFAULT_APP_ADDRESS),
            },
            receipt: ReceiptPolicy {
                poll_interval: Duration::from_millis(read_env_u64(
                    "RECEIPT_POLL_MS",
                    DEFAULT_RECEIPT_POLL_MS,
                )),
                timeout: Duration::from_secs(read_env_u64(
                    "RECEIPT_TIMEOUT_SECS",
                    DEFAULT_RECEIPT_TIMEOUT_SECS,
                )),
            },
            wallet_watch: Duration::from_millis(read_env_u64(
                "WALLET_WATCH_MS",
                DEFAULT_WALLET_WATCH_MS,
            )),
        }
    }
}

pub fn read_env_string(name: &str, default: &str) -> String {
    read_env_optional_string(name).unwrap_or_else(|| default.to_string())
}

pub fn read_env_optional_string(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn read_env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

pub fn read_env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}
