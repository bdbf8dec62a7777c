//! Per-segment bloom filter
//!
//! Built from every key observed while a segment is written or scanned.
//! A negative answer lets point lookups skip the segment without touching
//! disk; a positive answer may be false.

/// A bloom filter backed by a bit vector with `k` hash functions
///
/// Uses double hashing: `h(i) = h1 + i * h2`, both halves derived from FNV-1a
/// with two seeds.
#[derive(Debug, Clone)]
pub struct BloomFilter {
    bits: Vec<u8>,
    num_bits: u64,
    num_hashes: u32,
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
const SECOND_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

impl BloomFilter {
    /// Size the filter for `expected_items` at `false_positive_rate`.
    /// Zero items still yields a minimal (8 bit) filter.
    pub fn new(expected_items: usize, false_positive_rate: f64) -> Self {
        let n = expected_items.max(1) as f64;
        let p = false_positive_rate.clamp(1e-9, 0.5);

        // m = -n * ln(p) / ln(2)^2
        let m = (-n * p.ln() / std::f64::consts::LN_2.powi(2)).ceil() as u64;
        let m = m.max(8);

        // k = (m / n) * ln(2)
        let k = ((m as f64 / n) * std::f64::consts::LN_2).ceil() as u32;

        Self {
            bits: vec![0u8; m.div_ceil(8) as usize],
            num_bits: m,
            num_hashes: k.max(1),
        }
    }

    pub fn insert(&mut self, key: &[u8]) {
        let (h1, h2) = hash_pair(key);
        for i in 0..self.num_hashes as u64 {
            let bit = h1.wrapping_add(i.wrapping_mul(h2)) % self.num_bits;
            self.bits[(bit / 8) as usize] |= 1 << (bit % 8);
        }
    }

    pub fn may_contain(&self, key: &[u8]) -> bool {
        let (h1, h2) = hash_pair(key);
        (0..self.num_hashes as u64).all(|i| {
            let bit = h1.wrapping_add(i.wrapping_mul(h2)) % self.num_bits;
            self.bits[(bit / 8) as usize] & (1 << (bit % 8)) != 0
        })
    }
}

fn fnv1a(seed: u64, data: &[u8]) -> u64 {
    data.iter().fold(seed, |hash, &byte| {
        (hash ^ byte as u64).wrapping_mul(FNV_PRIME)
    })
}

fn hash_pair(key: &[u8]) -> (u64, u64) {
    let h1 = fnv1a(FNV_OFFSET, key);
    // h2 must be odd so successive probes cycle through distinct bits
    let h2 = fnv1a(FNV_OFFSET ^ SECOND_SEED, key) | 1;
    (h1, h2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_false_negatives() {
        let mut bloom = BloomFilter::new(1000, 0.01);
        for i in 0..1000 {
            bloom.insert(format!("key{}", i).as_bytes());
        }
        for i in 0..1000 {
            assert!(bloom.may_contain(format!("key{}", i).as_bytes()));
        }
    }

    #[test]
    fn test_false_positive_rate_is_bounded() {
        let mut bloom = BloomFilter::new(1000, 0.01);
        for i in 0..1000 {
            bloom.insert(format!("present{}", i).as_bytes());
        }
        let false_positives = (0..10_000)
            .filter(|i| bloom.may_contain(format!("absent{}", i).as_bytes()))
            .count();
        assert!(false_positives < 500, "too many false positives: {}", false_positives);
    }

    #[test]
    fn test_empty_filter_rejects() {
        let bloom = BloomFilter::new(0, 0.01);
        assert!(!bloom.may_contain(b"anything"));
    }
}
