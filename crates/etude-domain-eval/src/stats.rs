use serde::{Deserialize, Serialize};

/// Running totals for one attempt at a score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PracticeStats {
    pub hit: u32,
    pub missed: u32,
    pub mismatched: u32,
}

impl PracticeStats {
    pub fn record_hit(&mut self) {
        self.hit = self.hit.saturating_add(1);
    }

    pub fn record_miss(&mut self) {
        self.missed = self.missed.saturating_add(1);
    }

    pub fn record_mismatch(&mut self) {
        self.mismatched = self.mismatched.saturating_add(1);
    }

    /// Share of judged positions that were hit, in `[0, 1]`. Zero before any
    /// position is judged.
    pub fn accuracy(&self) -> f32 {
        let judged = self.hit + self.missed;
        if judged == 0 {
            0.0
        } else {
            self.hit as f32 / judged as f32
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
