use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};

use crate::{
  CreateProposalArgs, GovernanceError, Proposal, ProposalId, ProposalStatus, TokenRatio, VoteContext, VoteDecision,
  amount::{RawAmount, base_units_or_zero},
};

/// Gas limit attached to every governance transaction.
pub const DEFAULT_GAS_LIMIT: u64 = 25_000_000;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
  pub tx_hash: String,
  pub status: String,
}

/// Read and write operations of the governance contract. All amounts are
/// converted to base units before they leave an implementation.
#[async_trait]
pub trait LedgerInterface: Send + Sync {
  async fn get_proposal(&self, id: ProposalId) -> Result<Proposal>;
  async fn get_proposal_votes(&self, id: ProposalId, decision: VoteDecision) -> Result<BigDecimal>;
  async fn get_user_vote(&self, voter: &str, id: ProposalId) -> Result<Option<VoteContext>>;
  async fn get_voting_power(&self, voter: &str, id: ProposalId) -> Result<BigDecimal>;
  async fn get_active_proposal_ids(&self) -> Result<Vec<ProposalId>>;
  async fn get_last_proposal_id(&self) -> Result<ProposalId>;
  async fn get_proposal_status(&self, id: ProposalId) -> Result<ProposalStatus>;
  async fn get_total_voting_power(&self) -> Result<BigDecimal>;
  async fn get_base_token_identifier(&self) -> Result<String>;
  async fn get_token_ratio(&self, id: ProposalId, token: &str) -> Result<TokenRatio>;
  async fn create_proposal(&self, sender: &str, args: &CreateProposalArgs) -> Result<TransactionReceipt>;
  async fn vote(&self, sender: &str, id: ProposalId, decision: VoteDecision) -> Result<TransactionReceipt>;
}

/// Talks to the contract through a query proxy that returns ABI-decoded JSON,
/// and submits transactions through a wallet relay that signs them. A raw
/// MultiversX gateway answers with base64 values and is refused as malformed.
///
/// A successful query must carry `data.returnData`. An explicit `null` means
/// the contract returned nothing, an absent field is malformed.
#[derive(Clone)]
pub struct RpcLedger {
  client: reqwest::Client,
  provider_url: String,
  wallet_relay_url: String,
  contract_address: String,
  chain_id: String,
}

impl RpcLedger {
  pub fn new(
    provider_url: impl Into<String>,
    wallet_relay_url: impl Into<String>,
    contract_address: impl Into<String>,
    chain_id: impl Into<String>,
  ) -> Self {
    Self {
      client: reqwest::Client::new(),
      provider_url: provider_url.into().trim_end_matches('/').to_string(),
      wallet_relay_url: wallet_relay_url.into().trim_end_matches('/').to_string(),
      contract_address: contract_address.into(),
      chain_id: chain_id.into(),
    }
  }

  async fn query_optional<T: DeserializeOwned>(
    &self,
    function: &str,
    args: Vec<Value>,
    caller: Option<&str>,
  ) -> Result<Option<T>> {
    let request = QueryRequest { sc_address: &self.contract_address, func_name: function, args, caller };
    let envelope: QueryEnvelope = self
      .client
      .post(format!("{}/vm-values/query", self.provider_url))
      .json(&request)
      .send()
      .await
      .with_context(|| format!("failed to query {function}"))?
      .error_for_status()
      .with_context(|| format!("query {function} was refused"))?
      .json()
      .await
      .with_context(|| format!("failed to read {function} response"))?;

    if envelope.code != QUERY_SUCCESS_CODE {
      return Err(anyhow!("query {function} failed with code {}: {}", envelope.code, envelope.error));
    }
    let data =
      envelope.data.ok_or_else(|| GovernanceError::MalformedData(format!("{function}: response carries no data")))?;
    if let Some(code) = data.return_code.as_deref().filter(|code| *code != RETURN_CODE_OK) {
      return Err(anyhow!("query {function} returned {code}: {}", data.return_message.unwrap_or_default()));
    }
    match data.return_data {
      None => Err(GovernanceError::MalformedData(format!("{function}: response carries no returnData")).into()),
      Some(Value::Null) => Ok(None),
      Some(value) => Ok(Some(
        serde_json::from_value(value)
          .map_err(|e| GovernanceError::MalformedData(format!("{function}: {e}")))?,
      )),
    }
  }

  async fn query<T: DeserializeOwned>(&self, function: &str, args: Vec<Value>) -> Result<T> {
    self.query_optional(function, args, None).await?.ok_or_else(|| anyhow!("query {function} returned no data"))
  }

  async fn send_transaction(&self, sender: &str, function: &str, args: Vec<Value>) -> Result<TransactionReceipt> {
    let request = TransactionRequest {
      sender,
      receiver: &self.contract_address,
      chain_id: &self.chain_id,
      gas_limit: DEFAULT_GAS_LIMIT,
      function,
      args,
    };
    let response: TransactionResponse = self
      .client
      .post(format!("{}/transactions", self.wallet_relay_url))
      .json(&request)
      .send()
      .await
      .with_context(|| format!("failed to submit {function}"))?
      .error_for_status()
      .with_context(|| format!("{function} submission was refused"))?
      .json()
      .await
      .with_context(|| format!("failed to read {function} receipt"))?;

    response.into_receipt()
  }
}

#[async_trait]
impl LedgerInterface for RpcLedger {
  async fn get_proposal(&self, id: ProposalId) -> Result<Proposal> {
    let raw: Option<RawProposal> = self.query_optional("getProposal", vec![json!(id)], None).await?;
    raw.ok_or(GovernanceError::ProposalNotFound(id))?.try_into()
  }

  async fn get_proposal_votes(&self, id: ProposalId, decision: VoteDecision) -> Result<BigDecimal> {
    let raw: Option<RawAmount> =
      self.query_optional("getProposalVotes", vec![json!(id), json!(decision.to_string())], None).await?;
    Ok(base_units_or_zero(raw.as_ref()))
  }

  async fn get_user_vote(&self, voter: &str, id: ProposalId) -> Result<Option<VoteContext>> {
    let raw: Option<RawVoteContext> =
      self.query_optional("getUserVote", vec![json!(voter), json!(id)], Some(voter)).await?;
    raw.map(VoteContext::try_from).transpose()
  }

  async fn get_voting_power(&self, voter: &str, id: ProposalId) -> Result<BigDecimal> {
    let raw: Option<RawAmount> =
      self.query_optional("getVotingPower", vec![json!(voter), json!(id)], Some(voter)).await?;
    Ok(base_units_or_zero(raw.as_ref()))
  }

  async fn get_active_proposal_ids(&self) -> Result<Vec<ProposalId>> {
    Ok(self.query_optional("getActiveProposalIds", vec![], None).await?.unwrap_or_default())
  }

  async fn get_last_proposal_id(&self) -> Result<ProposalId> {
    Ok(self.query_optional("getLastProposalId", vec![], None).await?.unwrap_or(0))
  }

  async fn get_proposal_status(&self, id: ProposalId) -> Result<ProposalStatus> {
    let raw: RawTag = self.query("getProposalStatus", vec![json!(id)]).await?;
    match raw {
      RawTag::Index(index) => index.try_into(),
      RawTag::Name(name) => name.parse(),
    }
  }

  async fn get_total_voting_power(&self) -> Result<BigDecimal> {
    let raw: RawAmount = self.query("getTotalVotingPower", vec![]).await?;
    raw.to_base_units()
  }

  async fn get_base_token_identifier(&self) -> Result<String> {
    self.query("getTroTokenIdentifier", vec![]).await
  }

  async fn get_token_ratio(&self, id: ProposalId, token: &str) -> Result<TokenRatio> {
    let raw: RawTokenRatio = self.query("getLpToTroRatio", vec![json!(id), json!(token)]).await?;
    Ok(TokenRatio {
      token: token.to_string(),
      numerator: raw.numerator.to_base_units()?,
      denominator: raw.denominator.to_base_units()?,
    })
  }

  async fn create_proposal(&self, sender: &str, args: &CreateProposalArgs) -> Result<TransactionReceipt> {
    let ratios: Vec<Value> = args
      .token_ratios
      .iter()
      .map(|ratio| {
        json!({
          "token": ratio.token,
          "numerator": ratio.numerator.to_string(),
          "denominator": ratio.denominator.to_string(),
        })
      })
      .collect();
    let call_args = vec![
      json!(args.title),
      json!(args.description),
      json!(args.min_voting_power.to_string()),
      json!(args.start_time),
      json!(args.end_time),
      Value::Array(ratios),
    ];
    self.send_transaction(sender, "createProposal", call_args).await
  }

  async fn vote(&self, sender: &str, id: ProposalId, decision: VoteDecision) -> Result<TransactionReceipt> {
    self.send_transaction(sender, "vote", vec![json!(id), json!(decision.to_string())]).await
  }
}

const QUERY_SUCCESS_CODE: &str = "successful";
const RETURN_CODE_OK: &str = "ok";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
  sc_address: &'a str,
  func_name: &'a str,
  args: Vec<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  caller: Option<&'a str>,
}

#[derive(Deserialize, Debug)]
struct QueryEnvelope {
  #[serde(default)]
  code: String,
  #[serde(default)]
  error: String,
  data: Option<QueryData>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct QueryData {
  #[serde(default, deserialize_with = "deserialize_present")]
  return_data: Option<Value>,
  #[serde(default)]
  return_code: Option<String>,
  #[serde(default)]
  return_message: Option<String>,
}

/// `Some(Value::Null)` for an explicit `null`, `None` only when the field is
/// absent.
fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
  D: Deserializer<'de>,
{
  Value::deserialize(deserializer).map(Some)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TransactionRequest<'a> {
  sender: &'a str,
  receiver: &'a str,
  #[serde(rename = "chainID")]
  chain_id: &'a str,
  gas_limit: u64,
  function: &'a str,
  args: Vec<Value>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct TransactionResponse {
  tx_hash: String,
  status: String,
  #[serde(default)]
  error: Option<String>,
}

impl TransactionResponse {
  fn into_receipt(self) -> Result<TransactionReceipt> {
    if matches!(self.status.as_str(), "fail" | "invalid") {
      let reason = self.error.unwrap_or_else(|| format!("transaction {} ended with {}", self.tx_hash, self.status));
      return Err(GovernanceError::TransactionRejected(reason).into());
    }
    Ok(TransactionReceipt { tx_hash: self.tx_hash, status: self.status })
  }
}

/// Enum values are reported either by discriminant or by name.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
enum RawTag {
  Index(u8),
  Name(String),
}

#[derive(Deserialize, Debug)]
struct RawProposal {
  id: ProposalId,
  title: String,
  #[serde(default)]
  description: String,
  creator: String,
  created_at: i64,
  start_time: i64,
  end_time: i64,
  min_voting_power_to_validate_vote: RawAmount,
}

impl TryFrom<RawProposal> for Proposal {
  type Error = anyhow::Error;

  fn try_from(raw: RawProposal) -> Result<Self> {
    let min_voting_power_to_validate_vote = raw
      .min_voting_power_to_validate_vote
      .to_base_units()
      .map_err(|e| GovernanceError::MalformedData(format!("proposal {}: {e}", raw.id)))?;
    Ok(Proposal {
      id: raw.id,
      title: raw.title,
      description: raw.description,
      creator: raw.creator,
      created_at: raw.created_at,
      start_time: raw.start_time,
      end_time: raw.end_time,
      min_voting_power_to_validate_vote,
    })
  }
}

#[derive(Deserialize, Debug)]
struct RawVoteContext {
  decision: RawTag,
  voting_power: Option<RawAmount>,
  timestamp: i64,
  #[serde(default)]
  block: u64,
  #[serde(default)]
  epoch: u64,
}

impl TryFrom<RawVoteContext> for VoteContext {
  type Error = anyhow::Error;

  fn try_from(raw: RawVoteContext) -> Result<Self> {
    let decision = match raw.decision {
      RawTag::Index(index) => VoteDecision::try_from(index)?,
      RawTag::Name(name) => name.parse()?,
    };
    Ok(VoteContext::new(decision, base_units_or_zero(raw.voting_power.as_ref()), raw.timestamp, raw.block, raw.epoch))
  }
}

#[derive(Deserialize, Debug)]
struct RawTokenRatio {
  numerator: RawAmount,
  denominator: RawAmount,
}
