use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Args, Parser, ValueEnum};
use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::{
  Governance, LedgerInterface, LedgerSnapshot, MemoryLedger, RpcLedger,
  util::{Caches, Clock},
};

#[derive(Clone, Args)]
pub struct GovernanceConfig {
  /// The network the governance contract is deployed on.
  #[clap(long, env, default_value = "devnet")]
  pub network: Network,
  /// Chain id sent with transactions. Defaults to the network's chain id.
  #[clap(long, env)]
  pub chain_id: Option<String>,
  /// Query proxy returning ABI-decoded JSON. Required unless a ledger snapshot
  /// is served.
  #[clap(long, env, required_unless_present = "ledger_snapshot")]
  pub provider_url: Option<String>,
  /// Service that signs and relays transactions. Defaults to the provider URL.
  #[clap(long, env)]
  pub wallet_relay_url: Option<String>,
  /// Address of the governance contract.
  #[clap(long, env)]
  pub contract_address: String,
  /// The only account allowed to create proposals.
  #[clap(long, env)]
  pub admin_address: Option<String>,
  /// Where proposal statuses come from.
  #[clap(long, env, default_value = "local")]
  pub status_source: StatusSource,
  /// Serve from an in-memory ledger seeded with this snapshot (path or URL).
  /// An empty value loads the bundled demo snapshot.
  #[clap(long, env)]
  pub ledger_snapshot: Option<String>,
}

impl GovernanceConfig {
  pub async fn to_governance(&self) -> Result<Governance> {
    let clock = Clock::system();
    let chain_id = self.chain_id.clone().unwrap_or_else(|| self.network.chain_id().to_string());

    let (ledger, admin_address): (Arc<dyn LedgerInterface>, Option<String>) = match &self.ledger_snapshot {
      Some(source) => {
        let snapshot = LedgerSnapshot::from_slice(&load_snapshot(source).await?)?;
        let admin_address = self.admin_address.clone().or_else(|| Some(snapshot.admin.clone()));
        tracing::info!("serving {} proposals from a ledger snapshot", snapshot.proposals.len());
        (Arc::new(MemoryLedger::new(snapshot, clock.clone())), admin_address)
      }
      None => {
        let provider_url =
          self.provider_url.clone().context("a provider URL is required when no ledger snapshot is served")?;
        let wallet_relay_url = self.wallet_relay_url.clone().unwrap_or_else(|| provider_url.clone());
        tracing::info!("querying contract {} through {provider_url}", self.contract_address);
        let ledger = RpcLedger::new(provider_url, wallet_relay_url, &self.contract_address, &chain_id);
        (Arc::new(ledger), self.admin_address.clone())
      }
    };

    Ok(Governance {
      caches: Caches::build(),
      ledger,
      network: self.network,
      chain_id,
      contract_address: self.contract_address.clone(),
      admin_address,
      status_source: self.status_source,
      clock,
    })
  }
}

async fn load_snapshot(source: &str) -> Result<Bytes> {
  if source.is_empty() {
    return Ok(Bytes::from_static(include_bytes!("../snapshot/ledger.json")));
  }
  if source.starts_with("http://") || source.starts_with("https://") {
    let response = reqwest::Client::new().get(source).send().await?.error_for_status()?;
    return Ok(response.bytes().await?);
  }
  let bytes = tokio::fs::read(source).await.with_context(|| format!("failed to read ledger snapshot {source}"))?;
  Ok(Bytes::from(bytes))
}

#[derive(Clone, Copy, Parser, ValueEnum, Debug, Display, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Network {
  #[display("mainnet")]
  Mainnet,
  #[display("devnet")]
  Devnet,
  #[display("testnet")]
  Testnet,
}

impl Network {
  pub fn chain_id(&self) -> &'static str {
    match self {
      Network::Mainnet => "1",
      Network::Devnet => "D",
      Network::Testnet => "T",
    }
  }
}

#[derive(Clone, Copy, Parser, ValueEnum, Debug, Display, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StatusSource {
  /// Classify proposals from their schedule and tallies.
  #[default]
  #[display("local")]
  Local,
  /// Ask the ledger for its own status.
  #[display("remote")]
  Remote,
}
