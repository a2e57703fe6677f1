use std::sync::Arc;

use anyhow::{Context, Result};
use bigdecimal::{BigDecimal, Zero};
use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::{
  CreateProposalArgs, GovernanceError, LedgerInterface, Network, Proposal, ProposalForm, ProposalId, ProposalStatus,
  ProposalVoteCount, StatusSource, TokenRatio, TransactionReceipt, VoteContext, VoteDecision, VoteTally, classify,
  util::{Caches, Clock},
};

/// Proposal contexts built at once by [`Governance::proposal_contexts`]. Each
/// one issues about seven ledger reads.
pub const MAX_CONCURRENT_CONTEXTS: usize = 8;

/// The identity of whoever is looking at proposals. Anonymous viewers can read
/// but never vote or create.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
  address: Option<String>,
}

impl Session {
  pub fn anonymous() -> Self {
    Self { address: None }
  }

  pub fn connected(address: impl Into<String>) -> Self {
    let address = address.into();
    let address = address.trim();
    if address.is_empty() { Self::anonymous() } else { Self { address: Some(address.to_string()) } }
  }

  pub fn address(&self) -> Option<&str> {
    self.address.as_deref()
  }

  pub fn require_address(&self) -> Result<&str, GovernanceError> {
    self.address().ok_or(GovernanceError::NotAuthenticated)
  }
}

#[derive(Clone)]
pub struct Governance {
  pub caches: Caches,
  pub ledger: Arc<dyn LedgerInterface>,
  pub network: Network,
  pub chain_id: String,
  pub contract_address: String,
  pub admin_address: Option<String>,
  pub status_source: StatusSource,
  pub clock: Clock,
}

impl Governance {
  pub async fn info(&self) -> Result<GetInfoResponse> {
    let last_proposal_id = self.ledger.get_last_proposal_id().await?;
    Ok(GetInfoResponse {
      network: self.network,
      chain_id: self.chain_id.clone(),
      contract_address: self.contract_address.clone(),
      now: self.clock.now(),
      last_proposal_id,
    })
  }

  pub async fn proposal(&self, id: ProposalId) -> Result<Arc<Proposal>> {
    if let Some(cached) = self.caches.proposals.get(&id).await {
      return Ok(cached);
    }
    let proposal = Arc::new(self.ledger.get_proposal(id).await?);
    self.caches.proposals.insert(id, proposal.clone()).await;
    Ok(proposal)
  }

  /// Reads the four tallies concurrently. A tally that cannot be read counts as
  /// zero.
  pub async fn vote_count(&self, id: ProposalId) -> ProposalVoteCount {
    let (invalid, approve, abstain, reject) = futures::join!(
      self.tally_or_zero(id, VoteDecision::Invalid),
      self.tally_or_zero(id, VoteDecision::Approve),
      self.tally_or_zero(id, VoteDecision::Abstain),
      self.tally_or_zero(id, VoteDecision::Reject),
    );
    ProposalVoteCount { approve, abstain, reject, invalid }
  }

  async fn tally_or_zero(&self, id: ProposalId, decision: VoteDecision) -> BigDecimal {
    match self.ledger.get_proposal_votes(id, decision).await {
      Ok(power) => power,
      Err(e) => {
        tracing::warn!("failed to read {decision} votes of proposal {id}: {e:#}");
        BigDecimal::zero()
      }
    }
  }

  pub async fn tally(&self, id: ProposalId) -> Result<VoteTally> {
    self.proposal(id).await?;
    Ok(VoteTally::aggregate(&self.vote_count(id).await))
  }

  async fn status_of(&self, proposal: &Proposal, votes: &ProposalVoteCount) -> ProposalStatus {
    let local = classify(proposal, votes, self.clock.now());
    match self.status_source {
      StatusSource::Local => local,
      StatusSource::Remote => match self.ledger.get_proposal_status(proposal.id).await {
        Ok(remote) => remote,
        Err(e) => {
          tracing::warn!("falling back to local status of proposal {}: {e:#}", proposal.id);
          local
        }
      },
    }
  }

  pub async fn proposal_status(&self, id: ProposalId) -> Result<ProposalStatus> {
    let proposal = self.proposal(id).await?;
    let votes = self.vote_count(id).await;
    Ok(self.status_of(&proposal, &votes).await)
  }

  pub async fn active_proposal_ids(&self) -> Result<Vec<ProposalId>> {
    self.ledger.get_active_proposal_ids().await
  }

  /// Resolves the vote `viewer` cast on proposal `id`.
  ///
  /// Returns `None` for an anonymous viewer, a viewer who has not voted, an
  /// unknown proposal, and whenever the ledger cannot be read.
  pub async fn user_vote(&self, viewer: Option<&str>, id: ProposalId) -> Option<VoteContext> {
    match self.lookup_user_vote(viewer, id).await {
      Ok(vote) => vote,
      Err(e) => {
        tracing::warn!("failed to read vote on proposal {id}: {e:#}");
        None
      }
    }
  }

  async fn lookup_user_vote(&self, viewer: Option<&str>, id: ProposalId) -> Result<Option<VoteContext>> {
    let Some(viewer) = viewer else {
      return Ok(None);
    };
    self.ledger.get_user_vote(viewer, id).await.with_context(|| format!("vote of {viewer}"))
  }

  pub async fn voting_power(&self, viewer: Option<&str>, id: ProposalId) -> BigDecimal {
    let Some(viewer) = viewer else {
      return BigDecimal::zero();
    };
    match self.ledger.get_voting_power(viewer, id).await {
      Ok(power) => power,
      Err(e) => {
        tracing::warn!("failed to read voting power of {viewer} on proposal {id}: {e:#}");
        BigDecimal::zero()
      }
    }
  }

  pub async fn proposal_context(&self, session: &Session, id: ProposalId) -> Result<ProposalContext> {
    let proposal = self.proposal(id).await?;
    let viewer = session.address();

    let (votes, users_voting_power, users_vote) =
      futures::join!(self.vote_count(id), self.voting_power(viewer, id), self.lookup_user_vote(viewer, id));
    let proposal_status = self.status_of(&proposal, &votes).await;

    let (users_vote, vote_known) = match users_vote {
      Ok(vote) => (vote, true),
      Err(e) => {
        tracing::warn!("failed to read vote on proposal {id}: {e:#}");
        (None, false)
      }
    };
    let can_vote = proposal_status == ProposalStatus::Active
      && viewer.is_some()
      && vote_known
      && users_vote.is_none()
      && users_voting_power > BigDecimal::zero();

    Ok(ProposalContext {
      proposal: proposal.as_ref().clone(),
      users_voting_power,
      users_vote,
      proposal_status,
      tally: VoteTally::aggregate(&votes),
      proposal_vote_count: votes,
      can_vote,
    })
  }

  /// Builds the contexts of `ids`, at most [`MAX_CONCURRENT_CONTEXTS`] at a
  /// time, newest first. Proposals that cannot be loaded are left out.
  pub async fn proposal_contexts(&self, session: &Session, ids: &[ProposalId]) -> Vec<ProposalContext> {
    let results: Vec<(ProposalId, Result<ProposalContext>)> = stream::iter(ids.iter().copied())
      .map(move |id| async move { (id, self.proposal_context(session, id).await) })
      .buffered(MAX_CONCURRENT_CONTEXTS)
      .collect()
      .await;
    let mut contexts: Vec<ProposalContext> = results
      .into_iter()
      .filter_map(|(id, result)| match result {
        Ok(context) => Some(context),
        Err(e) => {
          tracing::warn!("skipping proposal {id}: {e:#}");
          None
        }
      })
      .collect();
    contexts.sort_by(|a, b| b.proposal.id.cmp(&a.proposal.id));
    contexts
  }

  pub async fn overview(&self, session: &Session) -> Result<GovernanceOverview> {
    let last_proposal_id = self.ledger.get_last_proposal_id().await?;
    let ids: Vec<ProposalId> = (1..=last_proposal_id).collect();
    let (active, past) = self
      .proposal_contexts(session, &ids)
      .await
      .into_iter()
      .partition(|context| context.proposal_status == ProposalStatus::Active);
    Ok(GovernanceOverview { active, past })
  }

  /// Governance weight of `token` in proposal `id`.
  pub async fn token_ratio(&self, id: ProposalId, token: &str) -> Result<TokenRatio> {
    self.proposal(id).await?;
    self.ledger.get_token_ratio(id, token).await
  }

  pub async fn base_token(&self) -> Result<Arc<String>> {
    if let Some(cached) = self.caches.base_token.get(&()).await {
      return Ok(cached);
    }
    let token = Arc::new(self.ledger.get_base_token_identifier().await?);
    self.caches.base_token.insert((), token.clone()).await;
    Ok(token)
  }

  pub async fn create_proposal(&self, session: &Session, form: &ProposalForm) -> Result<TransactionReceipt> {
    let sender = session.require_address()?;
    if let Some(admin) = &self.admin_address {
      if admin != sender {
        return Err(GovernanceError::Unauthorized(sender.to_string()).into());
      }
    }

    let base_token = self.base_token().await?;
    let total_voting_power = self.ledger.get_total_voting_power().await;
    let args = CreateProposalArgs::build(form, &base_token, total_voting_power)?;

    tracing::info!("submitting proposal {:?} from {sender}", args.title);
    self.ledger.create_proposal(sender, &args).await
  }

  /// Casts a vote. The submission is attempted exactly once.
  pub async fn vote(&self, session: &Session, id: ProposalId, decision: VoteDecision) -> Result<TransactionReceipt> {
    let sender = session.require_address()?;
    if !decision.is_castable() {
      return Err(GovernanceError::InvalidDecision.into());
    }

    let status = self.proposal_status(id).await?;
    if status != ProposalStatus::Active {
      return Err(GovernanceError::VotingClosed { id, status }.into());
    }
    if self.ledger.get_user_vote(sender, id).await?.is_some() {
      return Err(GovernanceError::AlreadyVoted { voter: sender.to_string(), id }.into());
    }

    tracing::info!("submitting {decision} vote on proposal {id} from {sender}");
    self.ledger.vote(sender, id, decision).await
  }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ProposalContext {
  pub proposal: Proposal,
  pub users_voting_power: BigDecimal,
  pub users_vote: Option<VoteContext>,
  pub proposal_status: ProposalStatus,
  pub proposal_vote_count: ProposalVoteCount,
  pub tally: VoteTally,
  pub can_vote: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GovernanceOverview {
  pub active: Vec<ProposalContext>,
  pub past: Vec<ProposalContext>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GetInfoResponse {
  pub network: Network,
  pub chain_id: String,
  pub contract_address: String,
  pub now: i64,
  pub last_proposal_id: ProposalId,
}
