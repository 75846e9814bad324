use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::{sync::broadcast, task::JoinHandle};

use crate::chains::parse_chain_id;

const EVENT_CAPACITY: usize = 16;

/// Wallet-side changes that invalidate a bound session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalletEvent {
    ChainChanged(u64),
    AccountsChanged(Vec<String>),
}

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("rpc transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{message}")]
    Rpc { code: i64, message: String },
    #[error("invalid rpc response: {0}")]
    InvalidResponse(String),
}

/// EIP-1193 style request interface.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError>;

    /// Chain and account changes. Providers without push events return a
    /// receiver that never fires.
    fn subscribe(&self) -> broadcast::Receiver<WalletEvent>;

    /// Starts a background task that turns polled state into events, for
    /// transports that cannot push them.
    fn watch(&self, _interval: Duration) -> Option<JoinHandle<()>> {
        None
    }
}

/// JSON-RPC 2.0 over HTTP. Used both for the wallet endpoint (a signer proxy
/// or a dev node with unlocked accounts) and for public chain RPC.
#[derive(Clone)]
pub struct JsonRpcProvider {
    http: reqwest::Client,
    url: String,
    next_id: Arc<AtomicU64>,
    events: broadcast::Sender<WalletEvent>,
}

impl JsonRpcProvider {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(http: reqwest::Client, url: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            http,
            url: url.into(),
            next_id: Arc::new(AtomicU64::new(1)),
            events,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn poll_state(&self) -> Result<(Option<u64>, Vec<String>), RpcError> {
        let chain = self.request("eth_chainId", json!([])).await?;
        let accounts = self.request("eth_accounts", json!([])).await?;
        Ok((
            chain.as_str().and_then(parse_chain_id),
            parse_accounts(&accounts)?,
        ))
    }
}

#[async_trait]
impl WalletProvider for JsonRpcProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response: Value = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = response.get("error") {
            return Err(RpcError::Rpc {
                code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown rpc error")
                    .to_string(),
            });
        }

        response
            .get("result")
            .cloned()
            .ok_or_else(|| RpcError::InvalidResponse(format!("no result for {method}")))
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }

    fn watch(&self, interval: Duration) -> Option<JoinHandle<()>> {
        let provider = self.clone();
        Some(tokio::spawn(async move {
            let mut last: Option<(Option<u64>, Vec<String>)> = None;
            loop {
                tokio::time::sleep(interval).await;
                let current = match provider.poll_state().await {
                    Ok(state) => state,
                    Err(err) => {
                        tracing::debug!(url = %provider.url, "wallet poll failed: {err}");
                        continue;
                    }
                };

                if let Some((last_chain, last_accounts)) = &last {
                    if *last_chain != current.0 {
                        if let Some(chain_id) = current.0 {
                            let _ = provider.events.send(WalletEvent::ChainChanged(chain_id));
                        }
                    }
                    if *last_accounts != current.1 {
                        let _ = provider
                            .events
                            .send(WalletEvent::AccountsChanged(current.1.clone()));
                    }
                }
                last = Some(current);
            }
        }))
    }
}

pub(crate) fn parse_accounts(value: &Value) -> Result<Vec<String>, RpcError> {
    let accounts = value
        .as_array()
        .ok_or_else(|| RpcError::InvalidResponse(format!("expected account list, got {value}")))?;
    accounts
        .iter()
        .map(|account| {
            account
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| RpcError::InvalidResponse(format!("invalid account: {account}")))
        })
        .collect()
}
