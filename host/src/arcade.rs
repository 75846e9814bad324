//! Page-level orchestration: which emulator URL to show, what to do when a
//! contest is opened, and what to do when the emulator reports a finished
//! gameplay.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{SystemTime, UNIX_EPOCH},
};

use rives_arcade_core::{
    build_emulator_url, derive_entropy, process_gameplay, EmulatorParams, GameplayResult,
    PayloadError, Rule,
};
use serde::Serialize;
use tokio::{
    sync::{
        broadcast::{self, error::RecvError},
        mpsc, RwLock,
    },
    task::JoinHandle,
};

use crate::{
    config::HostConfig,
    rules::{FetchError, RuleFetcher},
    wallet::{SubmissionReceipt, WalletConnector, WalletError, WalletEvent, WalletSession},
};

pub const SUBMITTED_MESSAGE: &str = "Gameplay submitted";

#[derive(Debug, thiserror::Error)]
pub enum ArcadeError {
    #[error("A gameplay submission is already in progress")]
    SubmissionInFlight,
    #[error("Error loading contest: {0}")]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
}

impl ArcadeError {
    /// Text shown to the player.
    pub fn user_message(&self) -> String {
        concise_message(&self.to_string())
    }
}

/// Result of opening the contest page.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitSetup {
    RuleUnavailable,
    /// The rule is deactivated or outside its start/end window.
    RuleInactive {
        message: String,
    },
    WalletUnavailable {
        message: String,
    },
    Ready {
        rule: Box<Rule>,
        address: String,
        connect_message: String,
        entropy: String,
        emulator_url: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    /// The message was not a finish notification.
    Ignored,
    /// No contest rule is loaded, so there is no payload.
    NothingToSubmit,
    Submitted {
        receipt: SubmissionReceipt,
        message: String,
    },
}

pub struct Arcade {
    config: HostConfig,
    rules: RuleFetcher,
    wallet: WalletConnector,
    contest: RwLock<Option<Rule>>,
    submitting: AtomicBool,
}

impl Arcade {
    pub fn new(config: HostConfig, rules: RuleFetcher, wallet: WalletConnector) -> Self {
        Self {
            config,
            rules,
            wallet,
            contest: RwLock::new(None),
            submitting: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: HostConfig) -> Self {
        let http = reqwest::Client::new();
        let rules = RuleFetcher::with_client(http.clone(), config.node_url.clone());
        let wallet = WalletConnector::from_config(&config, http);
        Self::new(config, rules, wallet)
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleFetcher {
        &self.rules
    }

    pub fn wallet(&self) -> &WalletConnector {
        &self.wallet
    }

    pub async fn contest(&self) -> Option<Rule> {
        self.contest.read().await.clone()
    }

    pub async fn set_contest(&self, rule: Option<Rule>) {
        *self.contest.write().await = rule;
    }

    pub fn play_url(&self) -> String {
        build_emulator_url(
            &self.config.urls,
            &EmulatorParams {
                cartridge_id: Some(self.config.cartridge_id.clone()),
                simple: true,
                ..EmulatorParams::default()
            },
        )
    }

    pub fn replay_url(&self) -> String {
        self.replay_url_for(self.config.tape_id.as_deref())
    }

    pub fn replay_url_for(&self, tape_id: Option<&str>) -> String {
        build_emulator_url(
            &self.config.urls,
            &EmulatorParams {
                cartridge_id: Some(self.config.cartridge_id.clone()),
                tape_id: tape_id.map(str::to_string),
                autoplay: true,
                ..EmulatorParams::default()
            },
        )
    }

    /// Loads the contest rule, binds the wallet and builds the emulator URL
    /// with the player's entropy. Finished gameplays are only scored once
    /// this returned `Ready`.
    pub async fn setup_submit(&self) -> Result<SubmitSetup, ArcadeError> {
        let Some(contest_id) = self.config.contest_id.as_deref() else {
            tracing::error!("Error loading contest: no contest id configured");
            return Ok(SubmitSetup::RuleUnavailable);
        };
        let rule = self.rules.fetch_rule(contest_id).await?;
        if rule.is_none() {
            tracing::error!(contest_id, "Error loading contest");
        }
        Ok(self.setup_with_rule(rule).await)
    }

    /// Second half of [`Arcade::setup_submit`], for a rule that is already
    /// at hand.
    pub async fn setup_with_rule(&self, rule: Option<Rule>) -> SubmitSetup {
        let Some(rule) = rule else {
            return SubmitSetup::RuleUnavailable;
        };
        if let Some(message) = inactive_reason(&rule, unix_now()) {
            tracing::warn!(rule_id = %rule.id, "{message}");
            return SubmitSetup::RuleInactive { message };
        }

        let session = match self.wallet.connect(self.config.chain_id).await {
            Ok(session) => session,
            Err(err) => {
                let message = concise_message(&err.to_string());
                tracing::warn!(chain_id = self.config.chain_id, "{message}");
                return SubmitSetup::WalletUnavailable { message };
            }
        };
        let address = session.address().unwrap_or_default().to_string();
        let connect_message = format!(
            "Connected with {} on {}",
            session.short_address(),
            session.chain.name
        );
        let entropy = derive_entropy(&address, &rule.id);

        let emulator_url = build_emulator_url(
            &self.config.urls,
            &EmulatorParams {
                cartridge_id: Some(self.config.cartridge_id.clone()),
                simple: true,
                args: Some(rule.args.clone()),
                entropy: Some(entropy.clone()),
                ..EmulatorParams::default()
            },
        );
        self.set_contest(Some(rule.clone())).await;
        tracing::info!(rule_id = %rule.id, %address, "{connect_message}");

        SubmitSetup::Ready {
            rule: Box::new(rule),
            address,
            connect_message,
            entropy,
            emulator_url,
        }
    }

    /// Scores and submits a finished gameplay against the loaded contest.
    /// A second call while one is still running is rejected.
    pub async fn on_gameplay_finished(
        &self,
        gameplay: &GameplayResult,
    ) -> Result<SubmissionOutcome, ArcadeError> {
        if !gameplay.rivemu_on_finish {
            return Ok(SubmissionOutcome::Ignored);
        }
        let _guard = InFlight::acquire(&self.submitting)?;

        let rule = self.contest().await;
        let payload = process_gameplay(rule.as_ref(), gameplay)?;
        if payload.is_empty() {
            tracing::info!("no contest loaded; nothing to submit");
            return Ok(SubmissionOutcome::NothingToSubmit);
        }

        let session = self.wallet.current_session().await;
        let receipt = self.wallet.submit(session.as_ref(), &payload).await?;
        tracing::info!(tx_hash = %receipt.tx_hash, "{SUBMITTED_MESSAGE}");
        Ok(SubmissionOutcome::Submitted {
            receipt,
            message: SUBMITTED_MESSAGE.to_string(),
        })
    }

    pub async fn on_wallet_event(
        &self,
        event: &WalletEvent,
    ) -> Result<Option<WalletSession>, WalletError> {
        self.wallet.handle_event(event).await
    }

    /// Starts the wallet's change watcher, when the provider needs one.
    pub fn spawn_wallet_watch(&self) -> Option<JoinHandle<()>> {
        self.wallet
            .wallet()
            .and_then(|wallet| wallet.watch(self.config.wallet_watch))
    }

    /// Keeps the wallet session in sync with wallet events, for surfaces
    /// that do not drive [`Arcade::run`].
    pub fn spawn_wallet_listener(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let mut events = Some(self.wallet.subscribe()?);
        let arcade = self.clone();
        Some(tokio::spawn(async move {
            while let Some(event) = next_wallet_event(&mut events).await {
                if let Err(err) = arcade.on_wallet_event(&event).await {
                    tracing::warn!("wallet session lost: {err}");
                }
            }
        }))
    }

    /// Drives the arcade until `gameplay_rx` closes. Every finished gameplay
    /// is handled on its own task and its user-facing message is sent on
    /// `status_tx`.
    pub async fn run(
        self: Arc<Self>,
        mut gameplay_rx: mpsc::Receiver<GameplayResult>,
        status_tx: mpsc::UnboundedSender<String>,
    ) {
        let mut events = self.wallet.subscribe();
        loop {
            tokio::select! {
                message = gameplay_rx.recv() => {
                    let Some(gameplay) = message else {
                        break;
                    };
                    let arcade = self.clone();
                    let status_tx = status_tx.clone();
                    tokio::spawn(async move {
                        let message = match arcade.on_gameplay_finished(&gameplay).await {
                            Ok(SubmissionOutcome::Ignored) => return,
                            Ok(SubmissionOutcome::NothingToSubmit) => {
                                "Nothing to submit".to_string()
                            }
                            Ok(SubmissionOutcome::Submitted { message, .. }) => message,
                            Err(err) => {
                                tracing::error!("gameplay submission failed: {err}");
                                err.user_message()
                            }
                        };
                        let _ = status_tx.send(message);
                    });
                }
                Some(event) = next_wallet_event(&mut events), if events.is_some() => {
                    if let Err(err) = self.on_wallet_event(&event).await {
                        let _ = status_tx.send(concise_message(&err.to_string()));
                    }
                }
            }
        }
    }
}

async fn next_wallet_event(
    events: &mut Option<broadcast::Receiver<WalletEvent>>,
) -> Option<WalletEvent> {
    loop {
        let receiver = events.as_mut()?;
        match receiver.recv().await {
            Ok(event) => return Some(event),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "wallet events dropped");
            }
            Err(RecvError::Closed) => *events = None,
        }
    }
}

struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, ArcadeError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ArcadeError::SubmissionInFlight)?;
        Ok(Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn inactive_reason(rule: &Rule, now: u64) -> Option<String> {
    if rule.is_active_at(now) {
        return None;
    }
    let reason = if rule.is_deactivated() {
        "Contest is deactivated"
    } else if rule.start.is_some_and(|start| now < start) {
        "Contest has not started yet"
    } else {
        "Contest has ended"
    };
    Some(reason.to_string())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}

/// First sentence of `message`: cut after the first `.`, `!` or `?` that
/// ends the text or is followed by whitespace, or at the first line break.
pub fn concise_message(message: &str) -> String {
    let message = message.trim();
    let line = message.lines().next().unwrap_or_default();
    let mut chars = line.char_indices().peekable();
    while let Some((index, ch)) = chars.next() {
        if matches!(ch, '.' | '!' | '?') {
            let at_boundary = chars
                .peek()
                .map_or(true, |(_, next)| next.is_whitespace());
            if at_boundary {
                return line[..index + ch.len_utf8()].to_string();
            }
        }
    }
    line.to_string()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rives_arcade_core::{abi, constants::ADD_INPUT_SIGNATURE};

    use super::*;
    use crate::{
        chains::{BASE, BASE_SEPOLIA},
        config::{ContractTarget, ReceiptPolicy},
        testing::{MockWallet, RequestGate, USER},
        wallet::WalletProvider,
    };

    const RULE_ID: &str = "0123456789abcdef0123456789abcdef01234567";
    const OUTHASH: &str = "11aa11aa11aa11aa11aa11aa11aa11aa11aa11aa11aa11aa11aa11aa11aa11aa";

    fn config() -> HostConfig {
        HostConfig {
            cartridge_id: "cafe".to_string(),
            tape_id: Some("beef".to_string()),
            contest_id: Some(RULE_ID.to_string()),
            ..HostConfig::default()
        }
    }

    fn arcade_with(wallet: Option<Arc<MockWallet>>) -> Arcade {
        let config = config();
        let mut connector = WalletConnector::new(
            wallet
                .clone()
                .map(|wallet| wallet as Arc<dyn WalletProvider>),
            ContractTarget::default(),
            ReceiptPolicy {
                poll_interval: Duration::from_millis(1),
                timeout: Duration::from_secs(5),
            },
        );
        if let Some(wallet) = wallet {
            connector = connector.with_public_provider(wallet);
        }
        Arcade::new(config, RuleFetcher::new("http://127.0.0.1:9"), connector)
    }

    fn rule() -> Rule {
        Rule {
            id: RULE_ID.to_string(),
            name: "High score".to_string(),
            args: "-level 2".to_string(),
            score_function: "score + lives * 10".to_string(),
            ..Rule::default()
        }
    }

    fn finished() -> GameplayResult {
        GameplayResult {
            outcard: br#"JSON{"score":40,"lives":3}"#.to_vec(),
            outhash: OUTHASH.to_string(),
            tape: vec![1, 2, 3],
            rivemu_on_finish: true,
        }
    }

    #[test]
    fn play_and_replay_urls() {
        let arcade = arcade_with(None);
        assert_eq!(
            arcade.play_url(),
            "https://emulator.rives.io/#light=100&cartridge=https://app.rives.io/cartridges/cafe&simple=true"
        );
        assert_eq!(
            arcade.replay_url(),
            "https://emulator.rives.io/#light=100&cartridge=https://app.rives.io/cartridges/cafe&autoplay=true&fullTape=https://app.rives.io/tapes/beef"
        );
    }

    #[tokio::test]
    async fn setup_without_contest_id_has_no_rule() {
        let arcade = Arcade::new(
            HostConfig::default(),
            RuleFetcher::new("http://127.0.0.1:9"),
            WalletConnector::new(None, ContractTarget::default(), ReceiptPolicy::default()),
        );
        assert_eq!(
            arcade.setup_submit().await.unwrap(),
            SubmitSetup::RuleUnavailable
        );
        assert_eq!(arcade.setup_with_rule(None).await, SubmitSetup::RuleUnavailable);
    }

    #[tokio::test]
    async fn setup_without_wallet_reports_first_sentence() {
        let arcade = arcade_with(None);
        assert_eq!(
            arcade.setup_with_rule(Some(rule())).await,
            SubmitSetup::WalletUnavailable {
                message: "MetaMask or another web3 wallet is not installed.".to_string()
            }
        );
        assert_eq!(arcade.contest().await, None);
    }

    #[tokio::test]
    async fn setup_refuses_inactive_rules() {
        let wallet = Arc::new(MockWallet::on_chain(BASE_SEPOLIA.id));
        let arcade = arcade_with(Some(wallet.clone()));

        let deactivated = Rule {
            deactivated: Some(true),
            ..rule()
        };
        assert_eq!(
            arcade.setup_with_rule(Some(deactivated)).await,
            SubmitSetup::RuleInactive {
                message: "Contest is deactivated".to_string()
            }
        );

        let ended = Rule {
            start: Some(1),
            end: Some(2),
            ..rule()
        };
        assert_eq!(
            arcade.setup_with_rule(Some(ended)).await,
            SubmitSetup::RuleInactive {
                message: "Contest has ended".to_string()
            }
        );

        let upcoming = Rule {
            start: Some(u64::MAX),
            ..rule()
        };
        assert_eq!(
            arcade.setup_with_rule(Some(upcoming)).await,
            SubmitSetup::RuleInactive {
                message: "Contest has not started yet".to_string()
            }
        );

        assert!(wallet.methods().is_empty());
        assert_eq!(arcade.contest().await, None);

        let open = Rule {
            start: Some(1),
            end: Some(u64::MAX),
            ..rule()
        };
        assert!(matches!(
            arcade.setup_with_rule(Some(open)).await,
            SubmitSetup::Ready { .. }
        ));
    }

    #[test]
    fn inactive_reason_uses_inclusive_window() {
        let window = Rule {
            start: Some(10),
            end: Some(20),
            ..rule()
        };
        assert_eq!(inactive_reason(&window, 10), None);
        assert_eq!(inactive_reason(&window, 20), None);
        assert_eq!(inactive_reason(&window, 9).as_deref(), Some("Contest has not started yet"));
        assert_eq!(inactive_reason(&window, 21).as_deref(), Some("Contest has ended"));
    }

    #[tokio::test]
    async fn setup_on_wrong_chain() {
        let arcade = arcade_with(Some(Arc::new(MockWallet::on_chain(BASE.id))));
        assert_eq!(
            arcade.setup_with_rule(Some(rule())).await,
            SubmitSetup::WalletUnavailable {
                message: "Wallet on wrong chain".to_string()
            }
        );
    }

    #[tokio::test]
    async fn setup_binds_wallet_and_builds_submit_url() {
        let arcade = arcade_with(Some(Arc::new(MockWallet::on_chain(BASE_SEPOLIA.id))));

        let SubmitSetup::Ready {
            rule: loaded,
            address,
            connect_message,
            entropy,
            emulator_url,
        } = arcade.setup_with_rule(Some(rule())).await
        else {
            panic!("expected a ready setup");
        };

        assert_eq!(*loaded, rule());
        assert_eq!(address, USER);
        assert_eq!(connect_message, "Connected with 0x1234...abcd on Base Sepolia");
        assert_eq!(entropy, derive_entropy(USER, RULE_ID));
        assert_eq!(entropy.len(), 64);
        assert_eq!(
            emulator_url,
            format!(
                "https://emulator.rives.io/#light=100&cartridge=https://app.rives.io/cartridges/cafe&simple=true&args=-level%202&entropy={entropy}"
            )
        );
        assert_eq!(arcade.contest().await, Some(rule()));
    }

    #[tokio::test]
    async fn unfinished_messages_are_ignored() {
        let arcade = arcade_with(None);
        let gameplay = GameplayResult {
            rivemu_on_finish: false,
            ..finished()
        };
        assert_eq!(
            arcade.on_gameplay_finished(&gameplay).await.unwrap(),
            SubmissionOutcome::Ignored
        );
    }

    #[tokio::test]
    async fn nothing_to_submit_without_contest() {
        let wallet = Arc::new(MockWallet::on_chain(BASE_SEPOLIA.id));
        let arcade = arcade_with(Some(wallet.clone()));
        assert_eq!(
            arcade.on_gameplay_finished(&finished()).await.unwrap(),
            SubmissionOutcome::NothingToSubmit
        );
        assert!(wallet.methods().is_empty());
    }

    #[tokio::test]
    async fn finished_gameplay_is_scored_and_submitted() {
        let wallet = Arc::new(MockWallet::on_chain(BASE_SEPOLIA.id));
        let arcade = arcade_with(Some(wallet.clone()));
        arcade.setup_with_rule(Some(rule())).await;

        let outcome = arcade.on_gameplay_finished(&finished()).await.unwrap();
        let SubmissionOutcome::Submitted { message, receipt } = outcome else {
            panic!("expected a submission");
        };
        assert_eq!(message, "Gameplay submitted");
        assert_eq!(receipt.from, USER);

        let payload = process_gameplay(Some(&rule()), &finished()).unwrap();
        let sent = wallet.params_of("eth_sendTransaction").unwrap();
        let data = sent[0]["data"].as_str().unwrap();
        let expected = abi::encode_call(
            ADD_INPUT_SIGNATURE,
            &[
                abi::Token::address_from_hex(&ContractTarget::default().app_address).unwrap(),
                abi::Token::Bytes(payload.into_bytes()),
            ],
        );
        assert_eq!(data, format!("0x{}", hex::encode(expected)));
    }

    #[tokio::test]
    async fn malformed_score_function_is_fatal() {
        let arcade = arcade_with(Some(Arc::new(MockWallet::on_chain(BASE_SEPOLIA.id))));
        arcade
            .set_contest(Some(Rule {
                score_function: "score +".to_string(),
                ..rule()
            }))
            .await;

        let err = arcade.on_gameplay_finished(&finished()).await.unwrap_err();
        assert!(matches!(err, ArcadeError::Payload(PayloadError::Score(_))));
    }

    #[tokio::test]
    async fn submission_after_chain_change_needs_reconnect() {
        let wallet = Arc::new(MockWallet::on_chain(BASE_SEPOLIA.id));
        let arcade = arcade_with(Some(wallet.clone()));
        arcade.setup_with_rule(Some(rule())).await;

        wallet.switch_chain(BASE.id);
        assert!(arcade
            .on_wallet_event(&WalletEvent::ChainChanged(BASE.id))
            .await
            .is_err());

        let err = arcade.on_gameplay_finished(&finished()).await.unwrap_err();
        assert_eq!(err.user_message(), "No connected wallet");
    }

    #[tokio::test]
    async fn overlapping_submissions_are_rejected() {
        let gate = RequestGate::on("eth_getTransactionReceipt");
        let mut wallet = MockWallet::on_chain(BASE_SEPOLIA.id);
        wallet.gate = Some(gate.clone());
        let arcade = Arc::new(arcade_with(Some(Arc::new(wallet))));
        arcade.setup_with_rule(Some(rule())).await;

        let first = {
            let arcade = arcade.clone();
            tokio::spawn(async move { arcade.on_gameplay_finished(&finished()).await })
        };
        gate.entered.notified().await;

        let err = arcade.on_gameplay_finished(&finished()).await.unwrap_err();
        assert!(matches!(err, ArcadeError::SubmissionInFlight));

        gate.release.notify_one();
        assert!(matches!(
            first.await.unwrap().unwrap(),
            SubmissionOutcome::Submitted { .. }
        ));

        // released once the first submission completes
        assert!(!arcade.submitting.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn run_reports_status_for_each_gameplay() {
        let wallet = Arc::new(MockWallet::on_chain(BASE_SEPOLIA.id));
        let arcade = Arc::new(arcade_with(Some(wallet.clone())));
        arcade.setup_with_rule(Some(rule())).await;

        let (gameplay_tx, gameplay_rx) = mpsc::channel(4);
        let (status_tx, mut status_rx) = mpsc::unbounded_channel();
        let runner = tokio::spawn(arcade.clone().run(gameplay_rx, status_tx));

        gameplay_tx.send(finished()).await.unwrap();
        assert_eq!(status_rx.recv().await.unwrap(), "Gameplay submitted");

        wallet.emit(WalletEvent::AccountsChanged(vec![USER.to_string()]));
        while arcade.wallet().current_session().await.map(|s| s.epoch) != Some(1) {
            tokio::task::yield_now().await;
        }
        gameplay_tx.send(finished()).await.unwrap();
        assert_eq!(status_rx.recv().await.unwrap(), "Gameplay submitted");

        drop(gameplay_tx);
        runner.await.unwrap();
    }

    #[test]
    fn concise_message_keeps_first_sentence() {
        assert_eq!(
            concise_message("User rejected the request.\n\nDetails: denied"),
            "User rejected the request."
        );
        assert_eq!(concise_message("Failed! Try again"), "Failed!");
        assert_eq!(concise_message("Wallet on wrong chain"), "Wallet on wrong chain");
        assert_eq!(concise_message("version 1.2 failed\nstack"), "version 1.2 failed");
        assert_eq!(concise_message(""), "");
    }
}
