//! In-memory wallet used by the host unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{broadcast, Notify};

use crate::wallet::{RpcError, WalletEvent, WalletProvider};

pub const USER: &str = "0x1234567890abcdef1234567890abcdef1234abcd";
pub const TX_HASH: &str = "0x5ea1ed0000000000000000000000000000000000000000000000000000000001";

/// Holds every call to `method` until released.
pub struct RequestGate {
    pub method: &'static str,
    pub entered: Notify,
    pub release: Notify,
}

impl RequestGate {
    pub fn on(method: &'static str) -> Arc<Self> {
        Arc::new(Self {
            method,
            entered: Notify::new(),
            release: Notify::new(),
        })
    }
}

pub struct MockWallet {
    chain_id: Mutex<String>,
    pub accounts: Vec<String>,
    pub receipt: Value,
    pub reject_simulation: bool,
    pub gate: Option<Arc<RequestGate>>,
    calls: Mutex<Vec<(String, Value)>>,
    events: broadcast::Sender<WalletEvent>,
}

impl MockWallet {
    pub fn on_chain(chain_id: u64) -> Self {
        let (events, _) = broadcast::channel(4);
        Self {
            chain_id: Mutex::new(format!("0x{chain_id:x}")),
            accounts: vec![USER.to_string()],
            receipt: json!({ "status": "0x1", "blockNumber": "0x1b4" }),
            reject_simulation: false,
            gate: None,
            calls: Mutex::new(Vec::new()),
            events,
        }
    }

    pub fn switch_chain(&self, chain_id: u64) {
        *self.chain_id.lock().unwrap() = format!("0x{chain_id:x}");
    }

    pub fn emit(&self, event: WalletEvent) {
        let _ = self.events.send(event);
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(method, _)| method.clone())
            .collect()
    }

    pub fn params_of(&self, method: &str) -> Option<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(name, _)| name == method)
            .map(|(_, params)| params.clone())
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params));
        if let Some(gate) = self.gate.as_ref().filter(|gate| gate.method == method) {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        match method {
            "eth_chainId" => Ok(json!(*self.chain_id.lock().unwrap())),
            "eth_accounts" | "eth_requestAccounts" => Ok(json!(self.accounts)),
            "eth_call" if self.reject_simulation => Err(RpcError::Rpc {
                code: 3,
                message: "execution reverted".to_string(),
            }),
            "eth_call" => Ok(json!("0x")),
            "eth_sendTransaction" => Ok(json!(TX_HASH)),
            "eth_getTransactionReceipt" => Ok(self.receipt.clone()),
            other => Err(RpcError::Rpc {
                code: -32601,
                message: format!("method {other} not found"),
            }),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}
