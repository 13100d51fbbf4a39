//! Z-order (Morton) keys for bulk loading.
//!
//! The key of a point interleaves the raw IEEE-754 bit patterns of its
//! coordinates: bit `i` of dimension `j` lands on output bit `i * D + j`.
//! All `64 * D` bits are kept, so no coordinate bit is lost for any
//! dimensionality. Keys compare most significant bit first.
//!
//! Raw bit patterns order non-negative finite coordinates the same way the
//! values order. Negative coordinates sort after positive ones and among
//! themselves in reverse, which only affects the packing quality of a bulk
//! load, never its correctness.

/// A `64 * D` bit Morton key stored as big-endian words.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ZOrderKey(Vec<u64>);

impl ZOrderKey {
    /// Interleaves the bits of every coordinate of `point`.
    pub fn from_point(point: &[f64]) -> Self {
        let dims = point.len();
        let mut words = vec![0u64; dims];
        for (j, coordinate) in point.iter().enumerate() {
            let bits = coordinate.to_bits();
            for i in 0..64 {
                if (bits >> i) & 1 == 1 {
                    let out = i * dims + j;
                    let word = dims - 1 - out / 64;
                    words[word] |= 1u64 << (out % 64);
                }
            }
        }
        ZOrderKey(words)
    }

    /// Key words, most significant first.
    pub fn words(&self) -> &[u64] {
        &self.0
    }
}
