// ============================================================
// Layer 5 - Learning-Rate Schedule
// ============================================================
// Staged decay, recomputed from scratch every epoch:
//
//   epoch <  reduce_lr_epoch_1            → initial
//   reduce_lr_epoch_1 ≤ epoch < reduce_2  → initial / 10
//   epoch ≥ reduce_lr_epoch_2             → initial / 100
//
// Because the rate is a pure function of the epoch, resuming at
// any epoch yields the same rate an uninterrupted run would use.

use crate::domain::config::TrainParams;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StagedSchedule {
    pub initial_learning_rate: f64,
    pub reduce_lr_epoch_1:     usize,
    pub reduce_lr_epoch_2:     usize,
}

impl StagedSchedule {
    pub fn from_params(params: &TrainParams) -> Self {
        Self {
            initial_learning_rate: params.initial_learning_rate,
            reduce_lr_epoch_1:     params.reduce_lr_epoch_1,
            reduce_lr_epoch_2:     params.reduce_lr_epoch_2,
        }
    }

    pub fn learning_rate(&self, epoch: usize) -> f64 {
        if epoch >= self.reduce_lr_epoch_2 {
            self.initial_learning_rate / 100.0
        } else if epoch >= self.reduce_lr_epoch_1 {
            self.initial_learning_rate / 10.0
        } else {
            self.initial_learning_rate
        }
    }

    /// True from the first threshold on, whenever the rate is below initial
    pub fn is_reduced(&self, epoch: usize) -> bool {
        epoch >= self.reduce_lr_epoch_1.min(self.reduce_lr_epoch_2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule() -> StagedSchedule {
        StagedSchedule {
            initial_learning_rate: 0.1,
            reduce_lr_epoch_1:     50,
            reduce_lr_epoch_2:     75,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_stages() {
        let s = schedule();
        assert!(close(s.learning_rate(10), 0.1));
        assert!(close(s.learning_rate(49), 0.1));
        assert!(close(s.learning_rate(50), 0.01));
        assert!(close(s.learning_rate(74), 0.01));
        assert!(close(s.learning_rate(75), 0.001));
        assert!(close(s.learning_rate(300), 0.001));
    }

    #[test]
    fn test_reduced_on_every_epoch_past_a_threshold() {
        let s = schedule();
        assert!(!s.is_reduced(1));
        assert!(!s.is_reduced(49));
        for epoch in [50, 51, 74, 75, 76, 300] {
            assert!(s.is_reduced(epoch), "epoch {epoch}");
        }
    }

    #[test]
    fn test_equal_thresholds_jump_straight_to_second_stage() {
        let s = StagedSchedule { reduce_lr_epoch_1: 5, reduce_lr_epoch_2: 5, ..schedule() };
        assert!(close(s.learning_rate(4), 0.1));
        assert!(close(s.learning_rate(5), 0.001));
    }
}
