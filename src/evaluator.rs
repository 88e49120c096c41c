//! Pure match decision.
//!
//! Given one item's vote map and the session's existing match records,
//! decides whether the latest committed vote completed a match. Keeping the
//! decision free of store and clock access is what lets `record_vote`
//! evaluate it on the exact snapshot its write committed.

use std::collections::HashMap;

use crate::session::{ItemId, MatchRecord, ParticipantId};

/// Whether the current votes on `item_id` complete a match.
///
/// Holds iff exactly two distinct participants have voted on the item, both
/// voted `true`, and no match record for the item exists yet. A `false` vote
/// from either participant forecloses the match under the current votes; an
/// already-recorded match is left to stand regardless of later votes.
pub fn completes_match(
    votes: Option<&HashMap<ParticipantId, bool>>,
    matches: &[MatchRecord],
    item_id: ItemId,
) -> bool {
    if matches.iter().any(|m| m.item_id == item_id) {
        return false;
    }
    match votes {
        Some(votes) => votes.len() == 2 && votes.values().all(|&liked| liked),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn votes(entries: &[(&str, bool)]) -> HashMap<ParticipantId, bool> {
        entries
            .iter()
            .map(|(user, liked)| ((*user).to_owned(), *liked))
            .collect()
    }

    #[test]
    fn test_two_likes_match() {
        let votes = votes(&[("user_a", true), ("user_b", true)]);
        assert!(completes_match(Some(&votes), &[], 550));
    }

    #[test]
    fn test_single_like_is_not_enough() {
        let votes = votes(&[("user_a", true)]);
        assert!(!completes_match(Some(&votes), &[], 550));
    }

    #[test]
    fn test_dislike_forecloses() {
        let votes = votes(&[("user_a", true), ("user_b", false)]);
        assert!(!completes_match(Some(&votes), &[], 550));

        let votes = self::votes(&[("user_a", false), ("user_b", true)]);
        assert!(!completes_match(Some(&votes), &[], 550));
    }

    #[test]
    fn test_no_votes_no_match() {
        assert!(!completes_match(None, &[], 550));
    }

    #[test]
    fn test_existing_record_suppresses_re_match() {
        let votes = votes(&[("user_a", true), ("user_b", true)]);
        let matches = vec![MatchRecord::placeholder(550)];
        assert!(!completes_match(Some(&votes), &matches, 550));
    }

    #[test]
    fn test_record_for_other_item_is_ignored() {
        let votes = votes(&[("user_a", true), ("user_b", true)]);
        let matches = vec![MatchRecord::placeholder(603)];
        assert!(completes_match(Some(&votes), &matches, 550));
    }
}
