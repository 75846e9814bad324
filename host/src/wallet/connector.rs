use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use rives_arcade_core::{
    abi::{self, Token},
    constants::ADD_INPUT_SIGNATURE,
    ids::to_hex_prefixed,
    AbiError, VerificationPayload,
};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{broadcast, Mutex};

use super::{
    provider::parse_accounts, JsonRpcProvider, RpcError, WalletError, WalletEvent, WalletProvider,
};
use crate::{
    chains::{get_chain, parse_chain_id, Chain},
    config::{ContractTarget, HostConfig, ReceiptPolicy},
};

/// A wallet bound to a chain. Only valid for the epoch it was created in;
/// any wallet event moves the connector to a new epoch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WalletSession {
    pub chain: Chain,
    pub addresses: Vec<String>,
    pub epoch: u64,
}

impl WalletSession {
    pub fn address(&self) -> Option<&str> {
        self.addresses.first().map(String::as_str)
    }

    /// `0x1234...abcd` form of the primary address.
    pub fn short_address(&self) -> String {
        let Some(address) = self.address() else {
            return String::new();
        };
        if address.len() <= 10 {
            return address.to_string();
        }
        match (address.get(..6), address.get(address.len() - 4..)) {
            (Some(head), Some(tail)) => format!("{head}...{tail}"),
            _ => address.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected(WalletSession),
    ChainMismatch { expected: u64, actual: Option<u64> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SubmissionReceipt {
    pub tx_hash: String,
    pub block_number: Option<u64>,
    pub from: String,
}

/// `addInput(app, payload)` call data for the world input box.
pub fn add_input_call_data(
    target: &ContractTarget,
    payload: &VerificationPayload,
) -> Result<String, AbiError> {
    let tokens = [
        Token::address_from_hex(&target.app_address)?,
        Token::Bytes(payload.as_bytes().to_vec()),
    ];
    Ok(to_hex_prefixed(&abi::encode_call(ADD_INPUT_SIGNATURE, &tokens)))
}

pub struct WalletConnector {
    wallet: Option<Arc<dyn WalletProvider>>,
    public: Option<Arc<dyn WalletProvider>>,
    http: reqwest::Client,
    target: ContractTarget,
    receipt: ReceiptPolicy,
    state: Mutex<ConnectionState>,
    epoch: AtomicU64,
    // 0 until the first connect attempt
    requested_chain: AtomicU64,
}

impl WalletConnector {
    pub fn new(
        wallet: Option<Arc<dyn WalletProvider>>,
        target: ContractTarget,
        receipt: ReceiptPolicy,
    ) -> Self {
        Self {
            wallet,
            public: None,
            http: reqwest::Client::new(),
            target,
            receipt,
            state: Mutex::new(ConnectionState::Disconnected),
            epoch: AtomicU64::new(0),
            requested_chain: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &HostConfig, http: reqwest::Client) -> Self {
        let wallet = config.wallet_rpc_url.as_ref().map(|url| {
            Arc::new(JsonRpcProvider::with_client(http.clone(), url.clone()))
                as Arc<dyn WalletProvider>
        });
        let public = config.public_rpc_url.as_ref().map(|url| {
            Arc::new(JsonRpcProvider::with_client(http.clone(), url.clone()))
                as Arc<dyn WalletProvider>
        });

        Self {
            public,
            http,
            ..Self::new(wallet, config.target.clone(), config.receipt)
        }
    }

    /// Routes simulation and receipt polling through `provider` instead of
    /// the chain's default public RPC.
    pub fn with_public_provider(mut self, provider: Arc<dyn WalletProvider>) -> Self {
        self.public = Some(provider);
        self
    }

    pub fn wallet(&self) -> Option<&Arc<dyn WalletProvider>> {
        self.wallet.as_ref()
    }

    pub fn target(&self) -> &ContractTarget {
        &self.target
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub async fn state(&self) -> ConnectionState {
        self.state.lock().await.clone()
    }

    pub async fn current_session(&self) -> Option<WalletSession> {
        match &*self.state.lock().await {
            ConnectionState::Connected(session) if session.epoch == self.epoch() => {
                Some(session.clone())
            }
            _ => None,
        }
    }

    pub fn subscribe(&self) -> Option<broadcast::Receiver<WalletEvent>> {
        self.wallet.as_ref().map(|wallet| wallet.subscribe())
    }

    /// Accepts a decimal or `0x`-hex chain id.
    pub async fn connect_str(&self, chain_id: &str) -> Result<WalletSession, WalletError> {
        if self.wallet.is_none() {
            return Err(WalletError::WalletNotFound);
        }
        let chain_id = parse_chain_id(chain_id).ok_or_else(|| WalletError::ChainNotFound {
            chain_id: chain_id.to_string(),
        })?;
        self.connect(chain_id).await
    }

    pub async fn connect(&self, chain_id: u64) -> Result<WalletSession, WalletError> {
        let Some(wallet) = self.wallet.as_ref() else {
            self.set_state(ConnectionState::Disconnected).await;
            return Err(WalletError::WalletNotFound);
        };
        let chain = get_chain(chain_id).ok_or_else(|| WalletError::ChainNotFound {
            chain_id: chain_id.to_string(),
        })?;

        self.requested_chain.store(chain.id, Ordering::SeqCst);
        self.set_state(ConnectionState::Connecting).await;
        let epoch = self.epoch();

        let result = self.bind(wallet.as_ref(), chain, epoch).await;

        // A wallet event during the bind owns the state from here on.
        let mut state = self.state.lock().await;
        if self.epoch() != epoch {
            tracing::info!(chain = chain.name, epoch, "discarding superseded wallet connect");
            return Err(WalletError::StaleSession);
        }
        match &result {
            Ok(session) => {
                tracing::info!(
                    chain = chain.name,
                    address = session.address().unwrap_or_default(),
                    epoch,
                    "wallet connected"
                );
                *state = ConnectionState::Connected(session.clone());
            }
            Err(WalletError::WrongChain { expected, actual }) => {
                tracing::warn!(expected, ?actual, "wallet on wrong chain");
                *state = ConnectionState::ChainMismatch {
                    expected: *expected,
                    actual: *actual,
                };
            }
            Err(err) => {
                tracing::warn!(chain = chain.name, "wallet connect failed: {err}");
                *state = ConnectionState::Disconnected;
            }
        }
        result
    }

    async fn bind(
        &self,
        wallet: &dyn WalletProvider,
        chain: Chain,
        epoch: u64,
    ) -> Result<WalletSession, WalletError> {
        ensure_chain(wallet, chain.id).await?;
        let addresses = request_accounts(wallet).await?;
        Ok(WalletSession {
            chain,
            addresses,
            epoch,
        })
    }

    /// Invalidates the current session and re-binds to the chain requested
    /// by the last `connect`.
    pub async fn handle_event(
        &self,
        event: &WalletEvent,
    ) -> Result<Option<WalletSession>, WalletError> {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(?event, epoch, "wallet event");

        match self.requested_chain.load(Ordering::SeqCst) {
            0 => Ok(None),
            chain_id => self.connect(chain_id).await.map(Some),
        }
    }

    pub async fn submit(
        &self,
        session: Option<&WalletSession>,
        payload: &VerificationPayload,
    ) -> Result<SubmissionReceipt, WalletError> {
        let session = session.ok_or(WalletError::NoConnectedWallet)?;
        let wallet = self.wallet.as_ref().ok_or(WalletError::NoConnectedWallet)?;
        if session.epoch != self.epoch() {
            return Err(WalletError::StaleSession);
        }
        ensure_chain(wallet.as_ref(), session.chain.id).await?;

        let from = request_accounts(wallet.as_ref())
            .await?
            .into_iter()
            .next()
            .ok_or(WalletError::NoAccounts)?;
        let transaction = json!({
            "from": from,
            "to": self.target.world_address,
            "data": add_input_call_data(&self.target, payload)?,
            "value": "0x0",
        });

        let public = self.public_provider(session.chain);
        public
            .request("eth_call", json!([transaction, "latest"]))
            .await
            .map_err(WalletError::SimulationFailed)?;

        let tx_hash = wallet
            .request("eth_sendTransaction", json!([transaction]))
            .await?;
        let tx_hash = tx_hash
            .as_str()
            .ok_or_else(|| RpcError::InvalidResponse(format!("invalid tx hash: {tx_hash}")))?
            .to_string();
        tracing::info!(%tx_hash, %from, chain = session.chain.name, "submitted gameplay");

        let receipt = self.wait_for_receipt(public.as_ref(), &tx_hash).await?;
        if receipt.get("status").and_then(Value::as_str) == Some("0x0") {
            return Err(WalletError::TransactionReverted { tx_hash });
        }

        Ok(SubmissionReceipt {
            block_number: receipt
                .get("blockNumber")
                .and_then(Value::as_str)
                .and_then(parse_quantity),
            tx_hash,
            from,
        })
    }

    fn public_provider(&self, chain: Chain) -> Arc<dyn WalletProvider> {
        match &self.public {
            Some(provider) => provider.clone(),
            None => Arc::new(JsonRpcProvider::with_client(
                self.http.clone(),
                chain.rpc_url,
            )),
        }
    }

    async fn wait_for_receipt(
        &self,
        public: &dyn WalletProvider,
        tx_hash: &str,
    ) -> Result<Value, WalletError> {
        let deadline = tokio::time::Instant::now() + self.receipt.timeout;
        loop {
            let receipt = public
                .request("eth_getTransactionReceipt", json!([tx_hash]))
                .await?;
            if !receipt.is_null() {
                return Ok(receipt);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(WalletError::ReceiptTimeout {
                    tx_hash: tx_hash.to_string(),
                });
            }
            tokio::time::sleep(self.receipt.poll_interval).await;
        }
    }

    async fn set_state(&self, state: ConnectionState) {
        *self.state.lock().await = state;
    }
}

async fn ensure_chain(wallet: &dyn WalletProvider, expected: u64) -> Result<(), WalletError> {
    let reported = wallet.request("eth_chainId", json!([])).await?;
    let actual = match &reported {
        Value::String(value) => parse_chain_id(value),
        Value::Number(value) => value.as_u64(),
        _ => None,
    };
    if actual != Some(expected) {
        return Err(WalletError::WrongChain { expected, actual });
    }
    Ok(())
}

fn parse_quantity(value: &str) -> Option<u64> {
    u64::from_str_radix(value.strip_prefix("0x")?, 16).ok()
}

async fn request_accounts(wallet: &dyn WalletProvider) -> Result<Vec<String>, WalletError> {
    let accounts = parse_accounts(&wallet.request("eth_requestAccounts", json!([])).await?)?;
    if accounts.is_empty() {
        return Err(WalletError::NoAccounts);
    }
    Ok(accounts)
}
