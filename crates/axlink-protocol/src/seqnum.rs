//! Modular sequence-number arithmetic.
//!
//! All comparisons of "ahead of" / "behind" use modular distance relative to
//! a reference point, never raw integer comparison, so they behave correctly
//! across wraparound at the modulus (8 or 128).

/// The sequence number following `seq`.
#[must_use]
pub fn next(seq: u8, modulus: u8) -> u8 {
    (seq + 1) % modulus
}

/// Modular distance from `b` forward to `a`: how many increments take `b`
/// to `a`.
#[must_use]
pub fn distance(a: u8, b: u8, modulus: u8) -> u8 {
    ((a as u16 + modulus as u16 - b as u16) % modulus as u16) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_wraps_mod8() {
        assert_eq!(next(6, 8), 7);
        assert_eq!(next(7, 8), 0);
    }

    #[test]
    fn next_wraps_mod128() {
        assert_eq!(next(127, 128), 0);
    }

    #[test]
    fn distance_simple() {
        assert_eq!(distance(5, 2, 8), 3);
        assert_eq!(distance(2, 2, 8), 0);
    }

    #[test]
    fn distance_across_wrap() {
        // 7 -> 0 is one step forward, not seven back.
        assert_eq!(distance(0, 7, 8), 1);
        assert_eq!(distance(1, 5, 8), 4);
        assert_eq!(distance(2, 120, 128), 10);
    }

    #[test]
    fn sequence_5_6_7_0_1_is_strictly_increasing() {
        let seqs = [5u8, 6, 7, 0, 1];
        for w in seqs.windows(2) {
            assert_eq!(distance(w[1], w[0], 8), 1, "{} -> {}", w[0], w[1]);
        }
    }

    #[test]
    fn distance_is_window_occupancy() {
        // With V(A)=6 and V(S)=2 the outstanding set 6,7,0,1 has size 4.
        assert_eq!(distance(2, 6, 8), 4);
    }
}
