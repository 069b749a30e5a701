// Minimal PRNG (no external crates).
//
// This is NOT cryptographically secure.
// It only drives pulse timing and jitter, and is seedable so tests are reproducible.

#[derive(Debug, Clone)]
pub struct Prng {
    state: u64,
}

const GOLDEN: u64 = 0x9E3779B97F4A7C15;

impl Prng {
    pub fn new(seed: u64) -> Self {
        // Avoid a zero state.
        let seed = if seed == 0 { GOLDEN } else { seed };
        Self { state: seed }
    }

    /// Seed from the wall clock; used when no explicit seed is configured.
    pub fn from_entropy() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(GOLDEN);
        Self::new(nanos)
    }

    /// Derive an independent stream, e.g. one per pulse chain.
    pub fn fork(&mut self, stream: u64) -> Prng {
        let mixed = self.next_u64() ^ stream.wrapping_add(1).wrapping_mul(GOLDEN);
        Prng::new(mixed)
    }

    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        // xorshift64*
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    #[inline]
    pub fn next_f64_01(&mut self) -> f64 {
        // 53 bits -> [0,1)
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    #[inline]
    pub fn gen_range_f64(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.next_f64_01()
    }

    #[inline]
    pub fn gen_range_u64(&mut self, low: u64, high: u64) -> u64 {
        if high <= low {
            return low;
        }
        low + self.next_u64() % (high - low)
    }

    #[inline]
    pub fn gen_range_usize(&mut self, low: usize, high: usize) -> usize {
        self.gen_range_u64(low as u64, high as u64) as usize
    }
}
