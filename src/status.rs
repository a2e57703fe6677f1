use crate::{Proposal, ProposalStatus, ProposalVoteCount};

/// Classifies a proposal at time `now` (seconds since epoch).
///
/// # Arguments
///
/// * `proposal` - The proposal whose schedule and minimum voting power are
///   used.
/// * `votes` - The accumulated power per decision.
/// * `now` - The current time in seconds since epoch.
///
/// # Description
///
/// - A proposal whose window does not end after it starts is `Invalid`.
/// - Before `start_time` it is `Pending`, during `[start_time, end_time)` it is
///   `Active`, whatever the tallies say.
/// - Once closed, it is `Failed` when the qualifying power (approve, abstain
///   and reject) stays below `min_voting_power_to_validate_vote`, `Approved`
///   when approve outweighs reject, and `Rejected` otherwise.
pub fn classify(proposal: &Proposal, votes: &ProposalVoteCount, now: i64) -> ProposalStatus {
  if !proposal.has_valid_schedule() {
    return ProposalStatus::Invalid;
  }
  if now < proposal.start_time {
    return ProposalStatus::Pending;
  }
  if now < proposal.end_time {
    return ProposalStatus::Active;
  }
  if votes.qualifying_power() < proposal.min_voting_power_to_validate_vote {
    return ProposalStatus::Failed;
  }
  if votes.approve > votes.reject { ProposalStatus::Approved } else { ProposalStatus::Rejected }
}
