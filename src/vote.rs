use std::str::FromStr;

use anyhow::{Result, anyhow};
use bigdecimal::BigDecimal;
use derive_more::Display;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteDecision {
  #[display("Invalid")]
  Invalid,
  #[display("Approve")]
  Approve,
  #[display("Abstain")]
  Abstain,
  #[display("Reject")]
  Reject,
}

impl VoteDecision {
  /// Whether a voter may cast this decision.
  pub fn is_castable(&self) -> bool {
    !matches!(self, VoteDecision::Invalid)
  }
}

impl TryFrom<u8> for VoteDecision {
  type Error = anyhow::Error;

  fn try_from(value: u8) -> Result<Self> {
    match value {
      0 => Ok(VoteDecision::Invalid),
      1 => Ok(VoteDecision::Approve),
      2 => Ok(VoteDecision::Abstain),
      3 => Ok(VoteDecision::Reject),
      other => Err(anyhow!("unknown vote decision discriminant {other}")),
    }
  }
}

impl FromStr for VoteDecision {
  type Err = anyhow::Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.to_lowercase().as_str() {
      "invalid" => Ok(VoteDecision::Invalid),
      "approve" => Ok(VoteDecision::Approve),
      "abstain" => Ok(VoteDecision::Abstain),
      "reject" => Ok(VoteDecision::Reject),
      other => Err(anyhow!("unknown vote decision {other}")),
    }
  }
}

/// A voter's recorded participation in one proposal.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct VoteContext {
  pub decision: VoteDecision,
  pub voting_power: BigDecimal,
  pub timestamp: i64,
  pub block: u64,
  pub epoch: u64,
}

impl VoteContext {
  pub fn new(decision: VoteDecision, voting_power: BigDecimal, timestamp: i64, block: u64, epoch: u64) -> Self {
    Self { decision, voting_power, timestamp, block, epoch }
  }
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
  pub decision: VoteDecision,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_decision_from_discriminant() {
    assert_eq!(VoteDecision::try_from(1u8).unwrap(), VoteDecision::Approve);
    assert_eq!(VoteDecision::try_from(3u8).unwrap(), VoteDecision::Reject);
    assert!(VoteDecision::try_from(4u8).is_err());
  }

  #[test]
  fn test_decision_from_name() {
    assert_eq!("approve".parse::<VoteDecision>().unwrap(), VoteDecision::Approve);
    assert_eq!("Abstain".parse::<VoteDecision>().unwrap(), VoteDecision::Abstain);
    assert!("maybe".parse::<VoteDecision>().is_err());
  }

  #[test]
  fn test_castable_decisions() {
    assert!(!VoteDecision::Invalid.is_castable());
    assert!(VoteDecision::Approve.is_castable());
    assert!(VoteDecision::Abstain.is_castable());
    assert!(VoteDecision::Reject.is_castable());
  }

  #[test]
  fn test_vote_request_body() {
    let request: VoteRequest = serde_json::from_str(r#"{"decision":"Reject"}"#).unwrap();
    assert_eq!(request.decision, VoteDecision::Reject);
  }
}
