use thiserror::Error;

use crate::{ProposalId, ProposalStatus};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GovernanceError {
  #[error("Proposal title must not be empty")]
  EmptyTitle,
  #[error("Proposal must end after it starts (start {start}, end {end})")]
  InvalidTimeRange { start: i64, end: i64 },
  #[error("Minimum voting power must be between 0% and 100%, got {0}%")]
  MinVotingPowerOutOfRange(u8),
  #[error("Token {0} has a zero ratio denominator")]
  ZeroRatioDenominator(String),
  #[error("Total voting power is unavailable: {0}")]
  TotalVotingPowerUnavailable(String),
  #[error("Vote decision must be one of Approve, Abstain or Reject")]
  InvalidDecision,
  #[error("A connected wallet is required")]
  NotAuthenticated,
  #[error("Account {0} is not allowed to create proposals")]
  Unauthorized(String),
  #[error("Proposal {0} dne.")]
  ProposalNotFound(ProposalId),
  #[error("Proposal {id} is not open for voting ({status})")]
  VotingClosed { id: ProposalId, status: ProposalStatus },
  #[error("Account {voter} has already voted on proposal {id}")]
  AlreadyVoted { voter: String, id: ProposalId },
  #[error("Transaction rejected by the ledger: {0}")]
  TransactionRejected(String),
  #[error("Malformed ledger data: {0}")]
  MalformedData(String),
}

/// Broad failure classes, used to decide how a failure is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
  Validation,
  Authentication,
  Authorization,
  NotFound,
  Transaction,
  Remote,
}

impl GovernanceError {
  pub fn category(&self) -> ErrorCategory {
    match self {
      GovernanceError::EmptyTitle
      | GovernanceError::InvalidTimeRange { .. }
      | GovernanceError::MinVotingPowerOutOfRange(_)
      | GovernanceError::ZeroRatioDenominator(_)
      | GovernanceError::TotalVotingPowerUnavailable(_)
      | GovernanceError::InvalidDecision
      | GovernanceError::VotingClosed { .. } => ErrorCategory::Validation,
      GovernanceError::NotAuthenticated => ErrorCategory::Authentication,
      GovernanceError::Unauthorized(_) => ErrorCategory::Authorization,
      GovernanceError::ProposalNotFound(_) => ErrorCategory::NotFound,
      GovernanceError::AlreadyVoted { .. } | GovernanceError::TransactionRejected(_) => ErrorCategory::Transaction,
      GovernanceError::MalformedData(_) => ErrorCategory::Remote,
    }
  }
}
