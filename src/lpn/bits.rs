use std::fmt;

use rand::Rng;

const WORD_BITS: usize = 64;

/// Dense bit vector over GF(2), packed into `u64` words.
/// Bits past `len` in the last word are always zero.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BitVector {
    len: usize,
    words: Vec<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum BitsError {
    #[error("length mismatch: {left} bits vs {right} bits")]
    LengthMismatch { left: usize, right: usize },
    #[error("row {row} has {found} columns, expected {expected}")]
    RowLength {
        row: usize,
        found: usize,
        expected: usize,
    },
}

impl BitVector {
    pub fn zeros(len: usize) -> Self {
        Self {
            len,
            words: vec![0; len.div_ceil(WORD_BITS)],
        }
    }

    /// Build from a slice of 0/1 values; any nonzero byte is read as 1.
    pub fn from_bits(bits: &[u8]) -> Self {
        let mut v = Self::zeros(bits.len());
        for (i, &b) in bits.iter().enumerate() {
            if b != 0 {
                v.set(i, true);
            }
        }
        v
    }

    /// Build from the positions of the 1-bits.
    pub fn from_support(len: usize, support: &[usize]) -> Self {
        let mut v = Self::zeros(len);
        for &i in support {
            debug_assert!(i < len, "support index {i} out of range for length {len}");
            v.set(i, true);
        }
        v
    }

    /// Uniformly random vector.
    pub fn random<R: Rng>(len: usize, rng: &mut R) -> Self {
        let mut v = Self::zeros(len);
        for w in v.words.iter_mut() {
            *w = rng.gen();
        }
        v.clear_tail();
        v
    }

    /// Each bit set independently with probability `p`.
    pub fn bernoulli<R: Rng>(len: usize, p: f64, rng: &mut R) -> Self {
        let mut v = Self::zeros(len);
        for i in 0..len {
            if rng.gen_bool(p) {
                v.set(i, true);
            }
        }
        v
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, i: usize) -> bool {
        assert!(i < self.len, "bit index {i} out of range for length {}", self.len);
        (self.words[i / WORD_BITS] >> (i % WORD_BITS)) & 1 == 1
    }

    pub fn set(&mut self, i: usize, bit: bool) {
        assert!(i < self.len, "bit index {i} out of range for length {}", self.len);
        let mask = 1u64 << (i % WORD_BITS);
        if bit {
            self.words[i / WORD_BITS] |= mask;
        } else {
            self.words[i / WORD_BITS] &= !mask;
        }
    }

    pub fn flip(&mut self, i: usize) {
        assert!(i < self.len, "bit index {i} out of range for length {}", self.len);
        self.words[i / WORD_BITS] ^= 1u64 << (i % WORD_BITS);
    }

    /// Hamming weight.
    pub fn weight(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Inner product mod 2.
    pub fn dot(&self, other: &Self) -> Result<bool, BitsError> {
        self.check_len(other)?;
        let ones: u32 = self
            .words
            .iter()
            .zip(other.words.iter())
            .map(|(a, b)| (a & b).count_ones())
            .sum();
        Ok(ones & 1 == 1)
    }

    pub fn xor_assign(&mut self, other: &Self) -> Result<(), BitsError> {
        self.check_len(other)?;
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a ^= b;
        }
        Ok(())
    }

    /// Number of positions where the two vectors differ.
    pub fn distance(&self, other: &Self) -> Result<usize, BitsError> {
        self.check_len(other)?;
        Ok(self
            .words
            .iter()
            .zip(other.words.iter())
            .map(|(a, b)| (a ^ b).count_ones() as usize)
            .sum())
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(move |i| self.get(i))
    }

    /// Positions of the 1-bits, ascending.
    pub fn support(&self) -> Vec<usize> {
        self.iter()
            .enumerate()
            .filter_map(|(i, b)| b.then_some(i))
            .collect()
    }

    pub fn to_bits(&self) -> Vec<u8> {
        self.iter().map(u8::from).collect()
    }

    fn check_len(&self, other: &Self) -> Result<(), BitsError> {
        if self.len != other.len {
            return Err(BitsError::LengthMismatch {
                left: self.len,
                right: other.len,
            });
        }
        Ok(())
    }

    fn clear_tail(&mut self) {
        let tail = self.len % WORD_BITS;
        if tail != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << tail) - 1;
            }
        }
    }
}

impl fmt::Display for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.iter() {
            f.write_str(if b { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl fmt::Debug for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitVector({self})")
    }
}

/// Row-major bit matrix: every row is a `BitVector` of length `cols`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitMatrix {
    cols: usize,
    rows: Vec<BitVector>,
}

impl BitMatrix {
    pub fn random<R: Rng>(rows: usize, cols: usize, rng: &mut R) -> Self {
        let rows = (0..rows).map(|_| BitVector::random(cols, rng)).collect();
        Self { cols, rows }
    }

    pub fn from_rows(cols: usize, rows: Vec<BitVector>) -> Result<Self, BitsError> {
        if let Some((row, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != cols) {
            return Err(BitsError::RowLength {
                row,
                found: r.len(),
                expected: cols,
            });
        }
        Ok(Self { cols, rows })
    }

    pub fn rows(&self) -> usize {
        self.rows.len()
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn row(&self, j: usize) -> &BitVector {
        &self.rows[j]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &BitVector> {
        self.rows.iter()
    }

    /// A·x mod 2.
    pub fn mul_vec(&self, x: &BitVector) -> Result<BitVector, BitsError> {
        if x.len() != self.cols {
            return Err(BitsError::LengthMismatch {
                left: self.cols,
                right: x.len(),
            });
        }
        let mut out = BitVector::zeros(self.rows.len());
        for (j, row) in self.rows.iter().enumerate() {
            if row.dot(x)? {
                out.set(j, true);
            }
        }
        Ok(out)
    }
}
