use fpl_api::DetailEntry;

/// Whether a refetched detail list changes a player's score contribution,
/// as opposed to a cosmetic rewrite of category or description text.
///
/// Different lengths always count. Otherwise entries are paired by position
/// and the first pair whose points value differs decides it; an entry too
/// short to carry a value counts as a difference.
pub fn is_significant_change(stored: &[DetailEntry], fetched: &[DetailEntry]) -> bool {
    if stored.len() != fetched.len() {
        return true;
    }

    stored.iter().zip(fetched).any(|(old, new)| match (old.value(), new.value()) {
        (Some(a), Some(b)) => a != b,
        _ => true,
    })
}
