use std::str::FromStr;

use anyhow::{Result, anyhow};
use bigdecimal::BigDecimal;
use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::VoteDecision;

pub type ProposalId = u64;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
  pub id: ProposalId,
  pub title: String,
  pub description: String,
  pub creator: String,
  pub created_at: i64,
  pub start_time: i64,
  pub end_time: i64,
  pub min_voting_power_to_validate_vote: BigDecimal,
}

impl Proposal {
  /// A voting window must end after it starts. `created_at` is the block time
  /// and plays no part.
  pub fn has_valid_schedule(&self) -> bool {
    self.start_time < self.end_time
  }
}

#[derive(Serialize, Deserialize, Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
  #[display("invalid")]
  Invalid,
  #[display("pending")]
  Pending,
  #[display("active")]
  Active,
  #[display("approved")]
  Approved,
  #[display("rejected")]
  Rejected,
  #[display("failed")]
  Failed,
}

impl TryFrom<u8> for ProposalStatus {
  type Error = anyhow::Error;

  fn try_from(value: u8) -> Result<Self> {
    match value {
      0 => Ok(ProposalStatus::Invalid),
      1 => Ok(ProposalStatus::Pending),
      2 => Ok(ProposalStatus::Active),
      3 => Ok(ProposalStatus::Approved),
      4 => Ok(ProposalStatus::Rejected),
      5 => Ok(ProposalStatus::Failed),
      other => Err(anyhow!("unknown proposal status discriminant {other}")),
    }
  }
}

impl FromStr for ProposalStatus {
  type Err = anyhow::Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.to_lowercase().as_str() {
      "invalid" => Ok(ProposalStatus::Invalid),
      "pending" => Ok(ProposalStatus::Pending),
      "active" => Ok(ProposalStatus::Active),
      "approved" => Ok(ProposalStatus::Approved),
      "rejected" => Ok(ProposalStatus::Rejected),
      "failed" => Ok(ProposalStatus::Failed),
      other => Err(anyhow!("unknown proposal status {other}")),
    }
  }
}

/// Accumulated voting power per decision, in base units.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ProposalVoteCount {
  pub approve: BigDecimal,
  pub abstain: BigDecimal,
  pub reject: BigDecimal,
  pub invalid: BigDecimal,
}

impl ProposalVoteCount {
  pub fn get(&self, decision: VoteDecision) -> &BigDecimal {
    match decision {
      VoteDecision::Invalid => &self.invalid,
      VoteDecision::Approve => &self.approve,
      VoteDecision::Abstain => &self.abstain,
      VoteDecision::Reject => &self.reject,
    }
  }

  pub fn add(&mut self, decision: VoteDecision, power: &BigDecimal) {
    let slot = match decision {
      VoteDecision::Invalid => &mut self.invalid,
      VoteDecision::Approve => &mut self.approve,
      VoteDecision::Abstain => &mut self.abstain,
      VoteDecision::Reject => &mut self.reject,
    };
    *slot += power;
  }

  pub fn total(&self) -> BigDecimal {
    &self.approve + &self.abstain + &self.reject + &self.invalid
  }

  /// Power that counts toward the minimum: invalid votes never qualify.
  pub fn qualifying_power(&self) -> BigDecimal {
    &self.approve + &self.abstain + &self.reject
  }
}

#[cfg(test)]
mod tests {
  use bigdecimal::Zero;

  use super::*;

  #[test]
  fn test_vote_count_accumulates_per_decision() {
    let mut count = ProposalVoteCount::default();
    assert!(count.total().is_zero());

    count.add(VoteDecision::Approve, &BigDecimal::from(700));
    count.add(VoteDecision::Reject, &BigDecimal::from(300));
    count.add(VoteDecision::Invalid, &BigDecimal::from(50));
    count.add(VoteDecision::Approve, &BigDecimal::from(1));

    assert_eq!(count.get(VoteDecision::Approve), &BigDecimal::from(701));
    assert_eq!(count.get(VoteDecision::Abstain), &BigDecimal::zero());
    assert_eq!(count.total(), BigDecimal::from(1051));
    assert_eq!(count.qualifying_power(), BigDecimal::from(1001));
  }

  #[test]
  fn test_status_from_wire() {
    assert_eq!(ProposalStatus::try_from(5u8).unwrap(), ProposalStatus::Failed);
    assert_eq!("Approved".parse::<ProposalStatus>().unwrap(), ProposalStatus::Approved);
    assert!(ProposalStatus::try_from(6u8).is_err());
  }

  #[test]
  fn test_schedule_invariant() {
    let mut proposal = Proposal {
      id: 1,
      title: "t".to_string(),
      description: String::new(),
      creator: "erd1admin".to_string(),
      created_at: 10,
      start_time: 10,
      end_time: 20,
      min_voting_power_to_validate_vote: BigDecimal::zero(),
    };
    assert!(proposal.has_valid_schedule());

    proposal.end_time = 10;
    assert!(!proposal.has_valid_schedule());

    proposal.end_time = 20;
    proposal.created_at = 15;
    assert!(proposal.has_valid_schedule());
  }
}
