use std::str::FromStr;

use anyhow::{Result, anyhow};
use bigdecimal::{BigDecimal, Zero};
use serde::{Deserialize, Serialize};

/// A numeric quantity as the ledger gateway reports it. Big integers arrive as
/// strings, small ones may arrive as plain JSON numbers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum RawAmount {
  Text(String),
  Number(u64),
}

impl RawAmount {
  pub fn to_base_units(&self) -> Result<BigDecimal> {
    match self {
      RawAmount::Text(text) => parse_base_units(text),
      RawAmount::Number(n) => Ok(BigDecimal::from(*n)),
    }
  }
}

/// Parses a non-negative integer amount expressed in base units.
pub fn parse_base_units(value: &str) -> Result<BigDecimal> {
  let value = value.trim();
  if value.is_empty() {
    return Ok(BigDecimal::zero());
  }
  if !value.bytes().all(|b| b.is_ascii_digit()) {
    return Err(anyhow!("invalid base unit amount {value:?}"));
  }
  Ok(BigDecimal::from_str(value)?)
}

/// Converts a remote amount, treating an absent or malformed value as zero.
pub fn base_units_or_zero(value: Option<&RawAmount>) -> BigDecimal {
  match value.map(RawAmount::to_base_units) {
    Some(Ok(amount)) => amount,
    Some(Err(e)) => {
      tracing::warn!("treating malformed amount as zero: {e}");
      BigDecimal::zero()
    }
    None => BigDecimal::zero(),
  }
}
