//! Hash mixing for the unique table and the operation cache.
//!
//! Every key hashed in this crate is a short, fixed tuple of 64-bit words:
//! a node triple `(variable, low, high)` or a cache quadruple
//! `(opcode, a, b, c)`. Rather than a streaming hasher, the tables run one
//! finalizing mixer per word and fold the words together, which keeps the
//! hash a pure function of the packed edge values (tags included).

/// Finalizing mixer of the splitmix64 generator. Flips on average half of
/// the output bits for any single-bit change of the input.
pub fn mix64(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

/// Folds one more word into a running hash. The rotation keeps the fold
/// order-sensitive, so transposed operands land in different buckets.
pub fn fold(h: u64, word: u64) -> u64 {
    mix64(h.rotate_left(27) ^ word)
}

pub trait MyHash {
    fn hash(&self) -> u64;
}

impl MyHash for u64 {
    fn hash(&self) -> u64 {
        mix64(*self)
    }
}

/// Operation-cache keys: an opcode slot followed by up to three operands.
impl MyHash for (u64, u64, u64, u64) {
    fn hash(&self) -> u64 {
        fold(fold(fold(mix64(self.0), self.1), self.2), self.3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mix64_separates_neighbors() {
        let a = mix64(1);
        let b = mix64(2);
        assert_ne!(a, b);
        // Nearby inputs should disagree in many bits, not just the low ones.
        assert!((a ^ b).count_ones() > 16);
    }

    #[test]
    fn test_fold_is_order_sensitive() {
        assert_ne!(fold(mix64(1), 2), fold(mix64(2), 1));
    }

    #[test]
    fn test_tuple_hash_uses_every_slot() {
        let base = (1u64, 2u64, 3u64, 4u64).hash();
        assert_ne!(base, (9u64, 2u64, 3u64, 4u64).hash());
        assert_ne!(base, (1u64, 9u64, 3u64, 4u64).hash());
        assert_ne!(base, (1u64, 2u64, 9u64, 4u64).hash());
        assert_ne!(base, (1u64, 2u64, 3u64, 9u64).hash());
        assert_ne!(base, (4u64, 3u64, 2u64, 1u64).hash());
    }
}
