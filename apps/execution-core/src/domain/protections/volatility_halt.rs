//! Halt entries when the rolling standard deviation of recent returns gets
//! too high.

use std::sync::Mutex;

use super::decision::{ProtectionContext, ProtectionDecision};
use super::stack::Protection;

fn std_dev(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (returns.len() - 1) as f64;
    variance.sqrt()
}

pub struct VolatilityHalt {
    max_std: f64,
    window: usize,
    enabled: bool,
    returns: Mutex<Vec<f64>>,
}

impl VolatilityHalt {
    #[must_use]
    pub fn new(max_std: f64, window: usize, enabled: bool) -> Self {
        Self {
            max_std,
            window,
            enabled,
            returns: Mutex::new(Vec::new()),
        }
    }

    /// Feed a new observed return (e.g. bar-to-bar percentage change). Not a
    /// `Protection` trait method because returns come from market data, not
    /// trade outcomes.
    pub fn observe_return(&self, r: f64) {
        let mut returns = self.returns.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        returns.push(r);
        if returns.len() > self.window {
            let excess = returns.len() - self.window;
            returns.drain(0..excess);
        }
    }
}

impl Protection for VolatilityHalt {
    fn name(&self) -> &str {
        "volatility_halt"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn check(&self, _ctx: &ProtectionContext) -> ProtectionDecision {
        let returns = self.returns.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let sigma = std_dev(&returns);
        if sigma > self.max_std {
            return ProtectionDecision::reject(
                self.name(),
                format!("rolling volatility {sigma:.4} exceeds ceiling {:.4}", self.max_std),
            );
        }
        ProtectionDecision::allow(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shared::{Symbol, Timestamp};

    fn ctx() -> ProtectionContext {
        ProtectionContext {
            symbol: Symbol::new("AAPL"),
            strategy: "momentum".to_string(),
            now: Timestamp::now(),
        }
    }

    #[test]
    fn halts_once_volatility_exceeds_ceiling() {
        let halt = VolatilityHalt::new(0.01, 10, true);
        for r in [0.0, 0.0, 0.0, 0.0] {
            halt.observe_return(r);
        }
        assert!(halt.check(&ctx()).allowed);
        for r in [0.2, -0.2, 0.3, -0.3] {
            halt.observe_return(r);
        }
        assert!(!halt.check(&ctx()).allowed);
    }
}
