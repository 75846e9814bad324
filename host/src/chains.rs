use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Chain {
    pub id: u64,
    pub name: &'static str,
    pub rpc_url: &'static str,
}

pub const BASE_SEPOLIA: Chain = Chain {
    id: 84_532,
    name: "Base Sepolia",
    rpc_url: "https://sepolia.base.org",
};

pub const BASE: Chain = Chain {
    id: 8_453,
    name: "Base",
    rpc_url: "https://mainnet.base.org",
};

pub const ANVIL: Chain = Chain {
    id: 31_337,
    name: "Anvil",
    rpc_url: "http://127.0.0.1:8545",
};

pub const SUPPORTED_CHAINS: [Chain; 3] = [BASE_SEPOLIA, BASE, ANVIL];

pub fn get_chain(chain_id: u64) -> Option<Chain> {
    SUPPORTED_CHAINS
        .iter()
        .copied()
        .find(|chain| chain.id == chain_id)
}

/// Accepts `0x`-prefixed hex (as wallets report it) or plain decimal.
pub fn parse_chain_id(value: &str) -> Option<u64> {
    let value = value.trim();
    match value.strip_prefix("0x") {
        Some(digits) => u64::from_str_radix(digits, 16).ok(),
        None => value.parse::<u64>().ok(),
    }
}
