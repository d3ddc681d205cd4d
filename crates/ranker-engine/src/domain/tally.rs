//! Positional ranked-choice tally.
//!
//! A generalized Borda count: the nomination placed at position `i`
//! (0-indexed) of a ranking contributes `max(votes_per_voter - i, 0)` to its
//! total. Nominations omitted from a ranking contribute nothing from that
//! participant. Results are ordered by descending total score, ties broken
//! by ascending nomination id so identical input always yields identical
//! output regardless of map iteration order.

use std::collections::BTreeMap;

use crate::domain::entities::{Nomination, NominationId, ParticipantId, RankedResult};

/// Compute the ordered tally for a poll.
///
/// Pure and re-entrant: no side effects, no dependence on insertion order.
/// Nominations with zero rankings still appear in the result with score 0.
/// Ranking entries that reference an unknown nomination are ignored; the
/// store rejects such rankings at submission time, so this only matters for
/// callers feeding the function directly.
pub fn compute_results(
    nominations: &BTreeMap<NominationId, Nomination>,
    rankings: &BTreeMap<ParticipantId, Vec<NominationId>>,
    votes_per_voter: usize,
) -> Vec<RankedResult> {
    let mut scores: BTreeMap<&NominationId, u64> =
        nominations.keys().map(|id| (id, 0u64)).collect();

    for ranking in rankings.values() {
        for (position, nomination_id) in ranking.iter().enumerate() {
            let contribution = votes_per_voter.saturating_sub(position) as u64;
            if contribution == 0 {
                // Every later position contributes zero as well.
                break;
            }
            if let Some(total) = scores.get_mut(nomination_id) {
                *total += contribution;
            }
        }
    }

    let mut results: Vec<RankedResult> = scores
        .into_iter()
        .map(|(id, score)| RankedResult {
            nomination_id: id.clone(),
            nomination_text: nominations[id].text.clone(),
            score,
        })
        .collect();

    results.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.nomination_id.cmp(&b.nomination_id))
    });
    results
}
