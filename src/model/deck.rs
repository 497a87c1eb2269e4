use rand::seq::SliceRandom;
use rand::thread_rng;

/// Board size of the reference game: 6 pairs, 12 cards.
pub const DEFAULT_PAIRS: usize = 6;

/// Produces the card layout for one session: every face index in
/// `0..pairs` appears exactly twice, positions shuffled. The layout is
/// fixed at session creation and shared verbatim with both players.
pub fn shuffled_deck(pairs: usize) -> Vec<usize> {
    let mut cards: Vec<usize> = (0..pairs).flat_map(|face| [face, face]).collect();
    cards.shuffle(&mut thread_rng());
    cards
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deck_has_two_of_each_face() {
        let deck = shuffled_deck(DEFAULT_PAIRS);
        assert_eq!(deck.len(), DEFAULT_PAIRS * 2);

        for face in 0..DEFAULT_PAIRS {
            let count = deck.iter().filter(|&&c| c == face).count();
            assert_eq!(count, 2, "face {face} should appear exactly twice");
        }
    }

    #[test]
    fn empty_board_is_allowed() {
        assert!(shuffled_deck(0).is_empty());
    }
}
