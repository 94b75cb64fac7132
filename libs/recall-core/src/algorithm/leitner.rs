//! Seven-box Leitner classification.

use crate::types::{Difficulty, LeitnerBox};

/// Box after a review: a lapse goes back to box 1, anything else moves up one.
pub fn classify(current: LeitnerBox, difficulty: Difficulty) -> LeitnerBox {
    if difficulty.is_lapse() {
        return LeitnerBox::Box1;
    }
    LeitnerBox::from_number(current.number() + 1).unwrap_or(LeitnerBox::Box7)
}

/// Whether `from -> to` is a legal single-review move.
pub fn is_valid_transition(from: LeitnerBox, to: LeitnerBox, difficulty: Difficulty) -> bool {
    to == classify(from, difficulty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn success_promotes_one_box() {
        assert_eq!(classify(LeitnerBox::Box1, Difficulty::Good), LeitnerBox::Box2);
        assert_eq!(classify(LeitnerBox::Box3, Difficulty::Easy), LeitnerBox::Box4);
        assert_eq!(classify(LeitnerBox::Box5, Difficulty::Hard), LeitnerBox::Box6);
    }

    #[test]
    fn top_box_is_capped() {
        assert_eq!(classify(LeitnerBox::Box7, Difficulty::Easy), LeitnerBox::Box7);
    }

    #[test]
    fn lapse_resets_to_first_box() {
        for b in LeitnerBox::ALL {
            assert_eq!(classify(b, Difficulty::Again), LeitnerBox::Box1);
        }
    }

    #[test]
    fn never_skips_boxes() {
        for b in LeitnerBox::ALL {
            for d in Difficulty::ALL {
                let next = classify(b, d);
                assert!(next == LeitnerBox::Box1 || next.number() <= b.number() + 1);
                assert!(is_valid_transition(b, next, d));
            }
        }
        assert!(!is_valid_transition(LeitnerBox::Box1, LeitnerBox::Box3, Difficulty::Easy));
    }
}
