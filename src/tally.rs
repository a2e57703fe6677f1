use bigdecimal::{BigDecimal, ToPrimitive, Zero};
use serde::Serialize;

use crate::ProposalVoteCount;

/// Display-ready totals for one proposal. Accumulation stays in arbitrary
/// precision; only the percentages are floats.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct VoteTally {
  pub approve: BigDecimal,
  pub abstain: BigDecimal,
  pub reject: BigDecimal,
  pub invalid: BigDecimal,
  pub total: BigDecimal,
  pub approve_percentage: f64,
  pub abstain_percentage: f64,
  pub reject_percentage: f64,
  pub invalid_percentage: f64,
}

impl VoteTally {
  pub fn aggregate(count: &ProposalVoteCount) -> Self {
    let total = count.total();
    VoteTally {
      approve_percentage: percentage(&count.approve, &total),
      abstain_percentage: percentage(&count.abstain, &total),
      reject_percentage: percentage(&count.reject, &total),
      invalid_percentage: percentage(&count.invalid, &total),
      approve: count.approve.clone(),
      abstain: count.abstain.clone(),
      reject: count.reject.clone(),
      invalid: count.invalid.clone(),
      total,
    }
  }
}

fn percentage(part: &BigDecimal, total: &BigDecimal) -> f64 {
  if total.is_zero() {
    return 0.0;
  }
  (part.clone() * BigDecimal::from(100) / total.clone()).to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use super::*;

  #[test]
  fn test_approved_scenario() {
    let tally = VoteTally::aggregate(&count("700", "0", "300", "0"));
    assert_eq!(tally.total, BigDecimal::from(1000));
    assert_eq!(tally.approve_percentage, 70.0);
    assert_eq!(tally.reject_percentage, 30.0);
  }

  #[test]
  fn test_rejected_scenario() {
    let tally = VoteTally::aggregate(&count("200", "0", "800", "0"));
    assert_eq!(tally.approve_percentage, 20.0);
    assert_eq!(tally.reject_percentage, 80.0);
  }

  #[test]
  fn test_empty_tally_has_zero_percentages() {
    let tally = VoteTally::aggregate(&ProposalVoteCount::default());
    assert!(tally.total.is_zero());
    assert_eq!(tally.approve_percentage, 0.0);
    assert_eq!(tally.abstain_percentage, 0.0);
    assert_eq!(tally.reject_percentage, 0.0);
    assert_eq!(tally.invalid_percentage, 0.0);
  }

  #[test]
  fn test_percentages_add_up() {
    let tally = VoteTally::aggregate(&count("1", "1", "1", "0"));
    let sum = tally.approve_percentage + tally.abstain_percentage + tally.reject_percentage + tally.invalid_percentage;
    assert!((sum - 100.0).abs() < 1e-9);
    assert!((tally.approve_percentage - 100.0 / 3.0).abs() < 1e-9);
  }

  #[test]
  fn test_accumulation_keeps_precision() {
    // Each value is beyond the exact range of an f64.
    let tally = VoteTally::aggregate(&count(
      "1000000000000000000000000001",
      "0",
      "1000000000000000000000000001",
      "1",
    ));
    assert_eq!(tally.total, BigDecimal::from_str("2000000000000000000000000003").unwrap());
    assert!((tally.approve_percentage - 50.0).abs() < 1e-9);
  }

  fn count(approve: &str, abstain: &str, reject: &str, invalid: &str) -> ProposalVoteCount {
    ProposalVoteCount {
      approve: BigDecimal::from_str(approve).unwrap(),
      abstain: BigDecimal::from_str(abstain).unwrap(),
      reject: BigDecimal::from_str(reject).unwrap(),
      invalid: BigDecimal::from_str(invalid).unwrap(),
    }
  }
}
