//! Seeded randomness for junction jitter.
//!
//! The engine never touches a global RNG: the one [`SimRng`] lives in the
//! [`FlowEngine`](crate::engine::FlowEngine), so a seed plus a reading
//! sequence always animates the same way.

/// SplitMix64 generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimRng {
    state: u64,
}

impl SimRng {
    const GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(Self::GAMMA);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform in `[0, 1)`, from the top 53 bits.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform in `[0, bound)`; zero for a non-positive or non-finite bound.
    pub fn jitter(&mut self, bound: f64) -> f64 {
        if bound.is_finite() && bound > 0.0 {
            self.next_f64() * bound
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = SimRng::new(0x6772_6964);
        let mut b = a.clone();
        for _ in 0..64 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
        assert_ne!(SimRng::new(1).next_u64(), SimRng::new(2).next_u64());
    }

    #[test]
    fn unit_interval() {
        let mut rng = SimRng::new(7);
        let mut sum = 0.0;
        for _ in 0..10_000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v), "{v} out of range");
            sum += v;
        }
        let mean = sum / 10_000.0;
        assert!((0.45..0.55).contains(&mean), "mean {mean}");
    }

    #[test]
    fn jitter_bounds() {
        let mut rng = SimRng::new(99);
        for _ in 0..1_000 {
            assert!((0.0..0.05).contains(&rng.jitter(0.05)));
        }
        assert_eq!(rng.jitter(0.0), 0.0);
        assert_eq!(rng.jitter(-1.0), 0.0);
        assert_eq!(rng.jitter(f64::NAN), 0.0);
        assert_eq!(rng.jitter(f64::INFINITY), 0.0);
    }
}
