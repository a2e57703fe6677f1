use std::{sync::Arc, time::Duration};

use moka::future::Cache as MokaCache;

use crate::{Proposal, ProposalId};

type ProposalCache = MokaCache<ProposalId, Arc<Proposal>>;
type BaseTokenCache = MokaCache<(), Arc<String>>;

/// Proposals never change once created, so they can be kept for long. Tallies,
/// votes and statuses are never cached.
#[derive(Clone)]
pub struct Caches {
  pub proposals: ProposalCache,
  pub base_token: BaseTokenCache,
}

impl Caches {
  pub fn build() -> Self {
    Self {
      proposals: ProposalCache::builder().max_capacity(10_000).time_to_live(Duration::from_secs(60 * 60 * 12)).build(),
      base_token: BaseTokenCache::builder().time_to_live(Duration::from_secs(60 * 60)).build(),
    }
  }
}
