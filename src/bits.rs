//! Unbounded dataflow bit-vectors.
//!
//! Reaching-definitions analysis assigns every tracked definition a unique
//! bit; the total width is the number of definitions in the function, so the
//! vector is not limited to a machine word. Trailing zero words are trimmed
//! after every mutation so that derived equality is exact.

/// Growable bit set backed by 64-bit words.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct BitSet {
    words: Vec<u64>,
}

impl BitSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, bit: usize) {
        let word = bit / 64;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1 << (bit % 64);
    }

    pub fn remove(&mut self, bit: usize) {
        let word = bit / 64;
        if word < self.words.len() {
            self.words[word] &= !(1 << (bit % 64));
            self.trim();
        }
    }

    pub fn contains(&self, bit: usize) -> bool {
        let word = bit / 64;
        word < self.words.len() && self.words[word] & (1 << (bit % 64)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn clear(&mut self) {
        self.words.clear();
    }

    /// `self |= other`
    pub fn union_with(&mut self, other: &BitSet) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (w, o) in self.words.iter_mut().zip(&other.words) {
            *w |= o;
        }
    }

    /// `self &= !other`
    pub fn subtract(&mut self, other: &BitSet) {
        for (w, o) in self.words.iter_mut().zip(&other.words) {
            *w &= !o;
        }
        self.trim();
    }

    fn trim(&mut self) {
        while self.words.last() == Some(&0) {
            self.words.pop();
        }
    }
}

impl std::fmt::Debug for BitSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut set = f.debug_set();
        for (i, word) in self.words.iter().enumerate() {
            for b in 0..64 {
                if word & (1 << b) != 0 {
                    set.entry(&(i * 64 + b));
                }
            }
        }
        set.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_test_beyond_word_size() {
        let mut bits = BitSet::new();
        bits.insert(3);
        bits.insert(64);
        bits.insert(200);
        assert!(bits.contains(3));
        assert!(bits.contains(64));
        assert!(bits.contains(200));
        assert!(!bits.contains(199));
    }

    #[test]
    fn dataflow_transfer_shape() {
        // out = (input & !kill) | gen
        let mut input = BitSet::new();
        input.insert(0);
        input.insert(70);

        let mut kill = BitSet::new();
        kill.insert(70);

        let mut gen = BitSet::new();
        gen.insert(130);

        let mut out = input.clone();
        out.subtract(&kill);
        out.union_with(&gen);

        assert!(out.contains(0));
        assert!(!out.contains(70));
        assert!(out.contains(130));
    }

    #[test]
    fn equality_ignores_trailing_zero_words() {
        let mut a = BitSet::new();
        a.insert(1);
        a.insert(300);
        a.remove(300);

        let mut b = BitSet::new();
        b.insert(1);
        assert_eq!(a, b);
    }
}
