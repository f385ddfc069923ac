//! Seeded jitter for separating coincident nodes.

/// xorshift64* generator, reseeded at the start of every `process` call.
#[derive(Debug, Clone)]
pub(crate) struct XorShift64Star {
    state: u64,
}

impl XorShift64Star {
    pub(crate) fn new(seed: u64) -> Self {
        Self { state: seed.max(1) }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D_u64)
    }

    /// Integer offset in `[-5, 4]`: the top 53 bits scaled to `[0, 10)` and floored.
    pub(crate) fn next_jitter(&mut self) -> f64 {
        let unit = (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64;
        (unit * 10.0).floor() - 5.0
    }
}
