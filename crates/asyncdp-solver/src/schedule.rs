//! Learning-rate schedules

/// Trait for schedules indexed by the global iteration counter
pub trait Schedule: Send + Sync {
    /// Value at iteration `t` (the counter starts at 1)
    fn value(&self, t: u64) -> f64;
}

/// `scale · t^(-exponent)`.
///
/// With an exponent in `(0.5, 1]` the rates satisfy the Robbins–Monro
/// conditions `Σα_t = ∞`, `Σα_t² < ∞`.
#[derive(Debug, Clone, PartialEq)]
pub struct PolynomialDecay {
    /// Multiplier
    pub scale: f64,
    /// Decay exponent
    pub exponent: f64,
}

impl PolynomialDecay {
    /// Exponent used by asynchronous Q-learning
    pub const Q_LEARNING_EXPONENT: f64 = 0.51;

    /// Create a new polynomial decay schedule
    #[must_use]
    pub fn new(scale: f64, exponent: f64) -> Self {
        Self { scale, exponent }
    }

    /// `scale · t^-0.51`
    #[must_use]
    pub fn q_learning(scale: f64) -> Self {
        Self::new(scale, Self::Q_LEARNING_EXPONENT)
    }
}

impl Default for PolynomialDecay {
    fn default() -> Self {
        Self::q_learning(1.0)
    }
}

impl Schedule for PolynomialDecay {
    fn value(&self, t: u64) -> f64 {
        self.scale * (t as f64).powf(-self.exponent)
    }
}

/// Constant schedule
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantSchedule {
    /// Constant value
    pub value: f64,
}

impl ConstantSchedule {
    /// Create a constant schedule
    #[must_use]
    pub fn new(value: f64) -> Self {
        Self { value }
    }
}

impl Schedule for ConstantSchedule {
    fn value(&self, _t: u64) -> f64 {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_q_learning_rate() {
        let schedule = PolynomialDecay::default();
        assert_eq!(schedule.value(1), 1.0);
        for t in [2_u64, 10, 1_000, 123_456] {
            assert_eq!(schedule.value(t), (t as f64).powf(-0.51));
        }
        let mut previous = schedule.value(1);
        for t in 2..10_000 {
            let current = schedule.value(t);
            assert!(current < previous, "not decreasing at t = {t}");
            previous = current;
        }
    }

    #[test]
    fn test_constant() {
        let schedule = ConstantSchedule { value: 0.3 };
        assert_eq!(schedule.value(1), schedule.value(99));
    }
}
