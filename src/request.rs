use anyhow::{Result, anyhow};
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

use crate::GovernanceError;

/// What a proposal author fills in.
#[derive(Deserialize, Debug, Clone)]
pub struct ProposalForm {
  pub title: String,
  #[serde(default)]
  pub description: String,
  /// Wall-clock time as displayed to the author.
  #[serde(deserialize_with = "deserialize_wall_clock")]
  pub start_time: NaiveDateTime,
  #[serde(deserialize_with = "deserialize_wall_clock")]
  pub end_time: NaiveDateTime,
  pub min_voting_power_percent: u8,
  #[serde(default)]
  pub eligible_tokens: Vec<EligibleToken>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct EligibleToken {
  pub token: String,
  #[serde(default = "unit_ratio")]
  pub numerator: u64,
  #[serde(default = "unit_ratio")]
  pub denominator: u64,
}

fn unit_ratio() -> u64 {
  1
}

/// Governance weight of one eligible token relative to the base token.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TokenRatio {
  pub token: String,
  pub numerator: BigDecimal,
  pub denominator: BigDecimal,
}

impl TokenRatio {
  pub fn new(token: impl Into<String>, numerator: u64, denominator: u64) -> Self {
    Self { token: token.into(), numerator: BigDecimal::from(numerator), denominator: BigDecimal::from(denominator) }
  }
}

/// Arguments of the ledger's proposal creation entry point.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CreateProposalArgs {
  pub title: String,
  pub description: String,
  pub min_voting_power: BigDecimal,
  pub start_time: i64,
  pub end_time: i64,
  pub token_ratios: Vec<TokenRatio>,
}

impl CreateProposalArgs {
  /// Validates `form` and turns it into ledger arguments.
  ///
  /// `total_voting_power` is the outcome of the supply query; when it failed
  /// the proposal is not built.
  pub fn build(
    form: &ProposalForm,
    base_token: &str,
    total_voting_power: Result<BigDecimal>,
  ) -> Result<CreateProposalArgs, GovernanceError> {
    let title = form.title.trim();
    if title.is_empty() {
      return Err(GovernanceError::EmptyTitle);
    }

    let start_time = wall_clock_as_utc(&form.start_time);
    let end_time = wall_clock_as_utc(&form.end_time);
    if end_time <= start_time {
      return Err(GovernanceError::InvalidTimeRange { start: start_time, end: end_time });
    }

    if form.min_voting_power_percent > 100 {
      return Err(GovernanceError::MinVotingPowerOutOfRange(form.min_voting_power_percent));
    }
    let total_voting_power =
      total_voting_power.map_err(|e| GovernanceError::TotalVotingPowerUnavailable(format!("{e:#}")))?;
    let min_voting_power =
      (total_voting_power * BigDecimal::from(form.min_voting_power_percent) / BigDecimal::from(100)).with_scale(0);

    let mut token_ratios = vec![TokenRatio::new(base_token, 1, 1)];
    for eligible in &form.eligible_tokens {
      let token = eligible.token.trim();
      if token.is_empty() || token_ratios.iter().any(|ratio| ratio.token == token) {
        continue;
      }
      if eligible.denominator == 0 {
        return Err(GovernanceError::ZeroRatioDenominator(token.to_string()));
      }
      token_ratios.push(TokenRatio::new(token, eligible.numerator, eligible.denominator));
    }

    Ok(CreateProposalArgs {
      title: title.to_string(),
      description: form.description.clone(),
      min_voting_power,
      start_time,
      end_time,
      token_ratios,
    })
  }
}

/// Reads the digits of a wall-clock time as if they were UTC.
pub fn wall_clock_as_utc(wall_clock: &NaiveDateTime) -> i64 {
  wall_clock.and_utc().timestamp()
}

/// Accepts `YYYY-MM-DDTHH:MM[:SS]` or an RFC 3339 time. The offset of an RFC
/// 3339 time is dropped: only its wall-clock digits are kept.
pub fn parse_wall_clock(value: &str) -> Result<NaiveDateTime> {
  let value = value.trim();
  if let Ok(with_offset) = DateTime::parse_from_rfc3339(value) {
    return Ok(with_offset.naive_local());
  }
  ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
    .iter()
    .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
    .ok_or_else(|| anyhow!("invalid date and time {value:?}"))
}

fn deserialize_wall_clock<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
  D: Deserializer<'de>,
{
  let value = String::deserialize(deserializer)?;
  parse_wall_clock(&value).map_err(serde::de::Error::custom)
}
