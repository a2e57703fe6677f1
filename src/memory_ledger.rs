use std::collections::{BTreeMap, HashMap, hash_map::Entry};

use anyhow::{Context, Result};
use async_trait::async_trait;
use bigdecimal::{BigDecimal, Zero};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::{
  CreateProposalArgs, GovernanceError, LedgerInterface, Proposal, ProposalId, ProposalStatus, ProposalVoteCount,
  TokenRatio, TransactionReceipt, VoteContext, VoteDecision, classify, util::Clock,
};

pub const ROUNDS_PER_EPOCH: u64 = 14_400;

/// Seed data of a [`MemoryLedger`].
#[derive(Deserialize, Debug, Clone)]
pub struct LedgerSnapshot {
  pub admin: String,
  pub base_token: String,
  pub total_voting_power: BigDecimal,
  #[serde(default)]
  pub voting_power: HashMap<String, BigDecimal>,
  #[serde(default)]
  pub proposals: Vec<SnapshotProposal>,
  #[serde(default)]
  pub block: u64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SnapshotProposal {
  #[serde(flatten)]
  pub proposal: Proposal,
  #[serde(default)]
  pub token_ratios: Vec<TokenRatio>,
  #[serde(default)]
  pub votes: Vec<SnapshotVote>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SnapshotVote {
  pub voter: String,
  pub decision: VoteDecision,
  pub voting_power: BigDecimal,
  pub timestamp: i64,
}

impl LedgerSnapshot {
  pub fn from_slice(bytes: &[u8]) -> Result<Self> {
    serde_json::from_slice(bytes).context("failed to parse ledger snapshot")
  }
}

struct StoredProposal {
  proposal: Proposal,
  votes: ProposalVoteCount,
  voters: HashMap<String, VoteContext>,
  token_ratios: Vec<TokenRatio>,
}

struct LedgerState {
  admin: String,
  base_token: String,
  total_voting_power: BigDecimal,
  voting_power: HashMap<String, BigDecimal>,
  proposals: BTreeMap<ProposalId, StoredProposal>,
  block: u64,
}

impl LedgerState {
  fn stored(&self, id: ProposalId) -> Result<&StoredProposal, GovernanceError> {
    self.proposals.get(&id).ok_or(GovernanceError::ProposalNotFound(id))
  }

  fn next_receipt(&mut self) -> TransactionReceipt {
    self.block += 1;
    TransactionReceipt { tx_hash: format!("{:064x}", self.block), status: "success".to_string() }
  }
}

/// A ledger held in memory. It applies the governance contract's rules so the
/// service can run without a network: voting only while a proposal is active,
/// one vote per account and proposal, creation by the admin only.
pub struct MemoryLedger {
  state: RwLock<LedgerState>,
  clock: Clock,
}

impl MemoryLedger {
  pub fn new(snapshot: LedgerSnapshot, clock: Clock) -> Self {
    let mut proposals = BTreeMap::new();
    for seeded in snapshot.proposals {
      let mut votes = ProposalVoteCount::default();
      let mut voters = HashMap::new();
      for vote in seeded.votes {
        if let Entry::Vacant(e) = voters.entry(vote.voter) {
          votes.add(vote.decision, &vote.voting_power);
          e.insert(VoteContext::new(vote.decision, vote.voting_power, vote.timestamp, snapshot.block, 0));
        }
      }
      proposals.insert(
        seeded.proposal.id,
        StoredProposal { proposal: seeded.proposal, votes, voters, token_ratios: seeded.token_ratios },
      );
    }

    Self {
      state: RwLock::new(LedgerState {
        admin: snapshot.admin,
        base_token: snapshot.base_token,
        total_voting_power: snapshot.total_voting_power,
        voting_power: snapshot.voting_power,
        proposals,
        block: snapshot.block,
      }),
      clock,
    }
  }
}

#[async_trait]
impl LedgerInterface for MemoryLedger {
  async fn get_proposal(&self, id: ProposalId) -> Result<Proposal> {
    Ok(self.state.read().await.stored(id)?.proposal.clone())
  }

  async fn get_proposal_votes(&self, id: ProposalId, decision: VoteDecision) -> Result<BigDecimal> {
    Ok(self.state.read().await.stored(id)?.votes.get(decision).clone())
  }

  async fn get_user_vote(&self, voter: &str, id: ProposalId) -> Result<Option<VoteContext>> {
    Ok(self.state.read().await.stored(id)?.voters.get(voter).cloned())
  }

  async fn get_voting_power(&self, voter: &str, id: ProposalId) -> Result<BigDecimal> {
    let state = self.state.read().await;
    state.stored(id)?;
    Ok(state.voting_power.get(voter).cloned().unwrap_or_else(BigDecimal::zero))
  }

  async fn get_active_proposal_ids(&self) -> Result<Vec<ProposalId>> {
    let now = self.clock.now();
    let state = self.state.read().await;
    Ok(
      state
        .proposals
        .values()
        .filter(|stored| classify(&stored.proposal, &stored.votes, now) == ProposalStatus::Active)
        .map(|stored| stored.proposal.id)
        .collect(),
    )
  }

  async fn get_last_proposal_id(&self) -> Result<ProposalId> {
    Ok(self.state.read().await.proposals.keys().next_back().copied().unwrap_or(0))
  }

  async fn get_proposal_status(&self, id: ProposalId) -> Result<ProposalStatus> {
    let state = self.state.read().await;
    let stored = state.stored(id)?;
    Ok(classify(&stored.proposal, &stored.votes, self.clock.now()))
  }

  async fn get_total_voting_power(&self) -> Result<BigDecimal> {
    Ok(self.state.read().await.total_voting_power.clone())
  }

  async fn get_base_token_identifier(&self) -> Result<String> {
    Ok(self.state.read().await.base_token.clone())
  }

  async fn get_token_ratio(&self, id: ProposalId, token: &str) -> Result<TokenRatio> {
    let state = self.state.read().await;
    let stored = state.stored(id)?;
    if token == state.base_token {
      return Ok(TokenRatio::new(token, 1, 1));
    }
    stored
      .token_ratios
      .iter()
      .find(|ratio| ratio.token == token)
      .cloned()
      .with_context(|| format!("token {token} is not eligible for proposal {id}"))
  }

  async fn create_proposal(&self, sender: &str, args: &CreateProposalArgs) -> Result<TransactionReceipt> {
    let now = self.clock.now();
    let mut state = self.state.write().await;
    if sender != state.admin {
      return Err(GovernanceError::Unauthorized(sender.to_string()).into());
    }
    if args.start_time < now {
      return Err(GovernanceError::TransactionRejected("proposal cannot start in the past".to_string()).into());
    }
    if args.end_time <= args.start_time {
      return Err(GovernanceError::TransactionRejected("proposal must end after it starts".to_string()).into());
    }

    let id = state.proposals.keys().next_back().copied().unwrap_or(0) + 1;
    let proposal = Proposal {
      id,
      title: args.title.clone(),
      description: args.description.clone(),
      creator: sender.to_string(),
      created_at: now,
      start_time: args.start_time,
      end_time: args.end_time,
      min_voting_power_to_validate_vote: args.min_voting_power.clone(),
    };
    state.proposals.insert(
      id,
      StoredProposal {
        proposal,
        votes: ProposalVoteCount::default(),
        voters: HashMap::new(),
        token_ratios: args.token_ratios.clone(),
      },
    );
    tracing::info!("created proposal {id}");
    Ok(state.next_receipt())
  }

  async fn vote(&self, sender: &str, id: ProposalId, decision: VoteDecision) -> Result<TransactionReceipt> {
    let now = self.clock.now();
    let mut state = self.state.write().await;
    let block = state.block + 1;
    let power = state.voting_power.get(sender).cloned().unwrap_or_else(BigDecimal::zero);

    let stored = state.proposals.get_mut(&id).ok_or(GovernanceError::ProposalNotFound(id))?;
    let status = classify(&stored.proposal, &stored.votes, now);
    if status != ProposalStatus::Active {
      return Err(GovernanceError::VotingClosed { id, status }.into());
    }
    if !decision.is_castable() {
      return Err(GovernanceError::InvalidDecision.into());
    }
    if power.is_zero() {
      return Err(GovernanceError::TransactionRejected(format!("account {sender} has no voting power")).into());
    }
    match stored.voters.entry(sender.to_string()) {
      Entry::Occupied(_) => return Err(GovernanceError::AlreadyVoted { voter: sender.to_string(), id }.into()),
      Entry::Vacant(e) => {
        stored.votes.add(decision, &power);
        e.insert(VoteContext::new(decision, power, now, block, block / ROUNDS_PER_EPOCH));
      }
    }
    Ok(state.next_receipt())
  }
}
