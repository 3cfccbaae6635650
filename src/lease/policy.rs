use rand::Rng;

/// Which eligible unit the allocator should try next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// The eligible unit with the smallest `range_start`.
    Earliest,
    /// A uniformly random eligible unit, chosen by `pick % eligible_count`.
    Random(u64),
}

/// Mixes in-order sweeping with random spreading.
#[derive(Debug, Clone, Copy)]
pub struct SelectionPolicy {
    /// Probability of `Selection::Earliest`, in `[0, 1]`.
    pub sequential_probability: f64,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            sequential_probability: 0.75,
        }
    }
}

impl SelectionPolicy {
    /// Clamps into `[0, 1]`; NaN falls back to the default.
    pub fn new(sequential_probability: f64) -> Self {
        if sequential_probability.is_nan() {
            tracing::warn!("Sequential probability is NaN, using the default");
            return Self::default();
        }
        Self {
            sequential_probability: sequential_probability.clamp(0.0, 1.0),
        }
    }

    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Selection {
        if rng.gen::<f64>() < self.sequential_probability {
            Selection::Earliest
        } else {
            Selection::Random(rng.gen())
        }
    }
}
