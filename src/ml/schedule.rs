// ============================================================
// Layer 5 — Warm-up + Cosine Learning Rate
// ============================================================
// For optimizer step s (0-based) of T total steps with W
// warm-up steps:
//
//   s < W : lr = base * s / W
//   s ≥ W : lr = base * 0.5 * (1 + cos(π * (s - W) / (T - W)))
//
// W = ceil(warmup_ratio * T). Steps past T stay at 0, which
// can happen when the no-duplicates sampler emits a few more
// batches than the estimate T was computed from.

use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarmupCosineSchedule {
    base_lr:      f64,
    warmup_steps: usize,
    total_steps:  usize,
}

impl WarmupCosineSchedule {
    pub fn new(base_lr: f64, total_steps: usize, warmup_ratio: f64) -> Self {
        let warmup_steps = ((total_steps as f64) * warmup_ratio).ceil() as usize;
        Self { base_lr, warmup_steps: warmup_steps.min(total_steps), total_steps }
    }

    pub fn warmup_steps(&self) -> usize {
        self.warmup_steps
    }

    pub fn lr_at(&self, step: usize) -> f64 {
        if step < self.warmup_steps {
            return self.base_lr * step as f64 / self.warmup_steps as f64;
        }
        let decay_steps = self.total_steps.saturating_sub(self.warmup_steps).max(1);
        let progress    = ((step - self.warmup_steps) as f64 / decay_steps as f64).min(1.0);
        self.base_lr * 0.5 * (1.0 + (PI * progress).cos())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warmup_is_linear() {
        let s = WarmupCosineSchedule::new(1.0, 100, 0.1);
        assert_eq!(s.warmup_steps(), 10);
        assert_eq!(s.lr_at(0), 0.0);
        assert!((s.lr_at(5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_peak_then_decay_to_zero() {
        let s = WarmupCosineSchedule::new(2e-4, 100, 0.1);
        assert!((s.lr_at(10) - 2e-4).abs() < 1e-12);
        assert!((s.lr_at(55) - 1e-4).abs() < 1e-12);
        assert!(s.lr_at(100).abs() < 1e-12);
        assert!(s.lr_at(150).abs() < 1e-12);
    }

    #[test]
    fn test_no_warmup() {
        let s = WarmupCosineSchedule::new(1.0, 4, 0.0);
        assert_eq!(s.lr_at(0), 1.0);
    }
}
