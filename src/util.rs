/// Fixed-size bit set recording which final slots are already claimed.
#[derive(Debug)]
pub struct BitSet {
    bits: Vec<u64>,
    n: usize,
}

impl BitSet {
    pub fn new(n: usize) -> Self {
        let words = n.div_ceil(64);
        Self { bits: vec![0; words], n }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn test(&self, idx: usize) -> bool {
        debug_assert!(idx < self.n, "slot {idx} out of range {}", self.n);
        let (w, b) = (idx / 64, idx % 64);
        (self.bits[w] >> b) & 1 == 1
    }

    #[inline]
    pub fn set(&mut self, idx: usize) {
        debug_assert!(idx < self.n, "slot {idx} out of range {}", self.n);
        let (w, b) = (idx / 64, idx % 64);
        self.bits[w] |= 1u64 << b;
    }

    pub fn count_ones(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }
}
