use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use host::{parse_chain_id, Arcade, HostConfig, RuleFetcher, SubmitSetup};
use rives_arcade_core::{
    calculate_score, derive_entropy, derive_tape_id, process_gameplay, GameplayResult, Rule,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};

#[derive(Parser)]
#[command(name = "rives-host")]
#[command(about = "Play, replay and submit RIVES contest gameplays")]
struct Cli {
    /// Rives node base URL
    #[arg(long, global = true)]
    node_url: Option<String>,

    /// Emulator base URL
    #[arg(long, global = true)]
    emulator_url: Option<String>,

    /// Cartridge loaded by play, replay and submit
    #[arg(long, global = true)]
    cartridge_id: Option<String>,

    /// Chain id, decimal or 0x-hex
    #[arg(long, global = true)]
    chain_id: Option<String>,

    /// Wallet JSON-RPC endpoint
    #[arg(long, global = true)]
    wallet_rpc_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the free-play emulator URL
    Play,
    /// Print the replay emulator URL for a tape
    Replay {
        #[arg(long)]
        tape_id: Option<String>,
    },
    /// Fetch a rule from the node and print it as JSON
    Rule { rule_id: String },
    /// Compute the tape id of a tape file under a rule
    TapeId {
        rule_id: String,
        #[arg(long)]
        tape: PathBuf,
    },
    /// Compute the emulator entropy for a player and rule
    Entropy { address: String, rule_id: String },
    /// Score an outcard with a score function
    Score {
        #[arg(long)]
        function: String,
        #[arg(long)]
        outcard: PathBuf,
    },
    /// Build the verification payload for a finished gameplay
    Payload {
        /// Fetch the rule from the node
        #[arg(long, conflicts_with = "rule_file")]
        rule_id: Option<String>,
        /// Read the rule from a JSON file
        #[arg(long)]
        rule_file: Option<PathBuf>,
        #[arg(long)]
        outcard: PathBuf,
        #[arg(long)]
        outhash: String,
        #[arg(long)]
        tape: PathBuf,
    },
    /// Open a contest, then submit every gameplay read from stdin
    /// (one JSON message per line)
    Submit {
        #[arg(long)]
        contest_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = HostConfig::from_env();
    apply_overrides(&mut config, &cli)?;

    match cli.command {
        Command::Play => println!("{}", Arcade::from_config(config).play_url()),
        Command::Replay { tape_id } => {
            if tape_id.is_some() {
                config.tape_id = tape_id;
            }
            if config.tape_id.is_none() {
                bail!("a tape id is required: pass --tape-id or set TAPE_ID");
            }
            println!("{}", Arcade::from_config(config).replay_url());
        }
        Command::Rule { rule_id } => {
            let rule = RuleFetcher::new(config.node_url)
                .fetch_rule(&rule_id)
                .await?
                .ok_or_else(|| anyhow!("rule {rule_id} not found"))?;
            println!("{}", serde_json::to_string_pretty(&rule)?);
        }
        Command::TapeId { rule_id, tape } => {
            let tape = read_file(&tape, "tape")?;
            println!("{}", derive_tape_id(&rule_id, &tape));
        }
        Command::Entropy { address, rule_id } => {
            let entropy = derive_entropy(&address, &rule_id);
            if entropy.is_empty() {
                bail!("entropy needs a 0x-prefixed 20 byte address and a 40 hex digit rule id");
            }
            println!("{entropy}");
        }
        Command::Score { function, outcard } => {
            let outcard = read_file(&outcard, "outcard")?;
            println!("{}", calculate_score(&function, &outcard)?);
        }
        Command::Payload {
            rule_id,
            rule_file,
            outcard,
            outhash,
            tape,
        } => {
            let rule = load_rule(&config, rule_id, rule_file).await?;
            let gameplay = GameplayResult {
                outcard: read_file(&outcard, "outcard")?,
                outhash,
                tape: read_file(&tape, "tape")?,
                rivemu_on_finish: true,
            };
            let payload = process_gameplay(rule.as_ref(), &gameplay)?;
            println!("{}", payload.to_hex());
        }
        Command::Submit { contest_id } => {
            if contest_id.is_some() {
                config.contest_id = contest_id;
            }
            submit(config).await?;
        }
    }

    Ok(())
}

fn apply_overrides(config: &mut HostConfig, cli: &Cli) -> Result<()> {
    if let Some(node_url) = &cli.node_url {
        config.node_url = node_url.clone();
    }
    if let Some(emulator_url) = &cli.emulator_url {
        config.urls.emulator = emulator_url.clone();
    }
    if let Some(cartridge_id) = &cli.cartridge_id {
        config.cartridge_id = cartridge_id.clone();
    }
    if let Some(chain_id) = &cli.chain_id {
        config.chain_id =
            parse_chain_id(chain_id).ok_or_else(|| anyhow!("invalid --chain-id: {chain_id}"))?;
    }
    if let Some(url) = &cli.wallet_rpc_url {
        config.wallet_rpc_url = Some(url.clone());
    }
    Ok(())
}

async fn load_rule(
    config: &HostConfig,
    rule_id: Option<String>,
    rule_file: Option<PathBuf>,
) -> Result<Option<Rule>> {
    match (rule_id, rule_file) {
        (Some(rule_id), _) => Ok(RuleFetcher::new(config.node_url.clone())
            .fetch_rule(&rule_id)
            .await?),
        (None, Some(path)) => {
            let raw = read_file(&path, "rule")?;
            let rule = serde_json::from_slice(&raw)
                .with_context(|| format!("invalid rule json: {}", path.display()))?;
            Ok(Some(rule))
        }
        (None, None) => Ok(None),
    }
}

async fn submit(config: HostConfig) -> Result<()> {
    let arcade = Arc::new(Arcade::from_config(config));
    match arcade.setup_submit().await? {
        SubmitSetup::RuleUnavailable => bail!("Error loading contest"),
        SubmitSetup::RuleInactive { message } => bail!(message),
        SubmitSetup::WalletUnavailable { message } => bail!(message),
        SubmitSetup::Ready {
            connect_message,
            emulator_url,
            ..
        } => {
            println!("{connect_message}");
            println!("{emulator_url}");
        }
    }

    let _watch = arcade.spawn_wallet_watch();
    let (gameplay_tx, gameplay_rx) = mpsc::channel(8);
    let (status_tx, mut status_rx) = mpsc::unbounded_channel();
    let runner = tokio::spawn(arcade.clone().run(gameplay_rx, status_tx));
    let printer = tokio::spawn(async move {
        while let Some(message) = status_rx.recv().await {
            println!("{message}");
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<GameplayResult>(&line) {
            Ok(gameplay) => gameplay_tx
                .send(gameplay)
                .await
                .context("arcade stopped")?,
            Err(err) => tracing::warn!("skipping malformed gameplay message: {err}"),
        }
    }

    drop(gameplay_tx);
    runner.await?;
    printer.await?;
    Ok(())
}

fn read_file(path: &Path, what: &str) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {what}: {}", path.display()))
}
