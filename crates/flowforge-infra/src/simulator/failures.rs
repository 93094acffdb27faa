//! Configured failure injection for simulator sessions.

use std::collections::BTreeMap;

use flowforge_types::catalog::Capability;
use flowforge_types::config::FailureRule;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::services::ServiceError;

/// Rolls configured failure rules keyed by `service.action`.
///
/// With a seed the sequence of rolls is reproducible, so a run that injected
/// a failure once injects it again.
#[derive(Debug)]
pub struct FailureInjector {
    rules: BTreeMap<String, FailureRule>,
    rng: StdRng,
}

impl FailureInjector {
    pub fn new(rules: BTreeMap<String, FailureRule>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rules, rng }
    }

    /// Decide whether this call fails before reaching the service.
    pub fn roll(&mut self, capability: Capability) -> Option<ServiceError> {
        let rule = self.rules.get(&capability.to_string())?;
        if rule.probability <= 0.0 {
            return None;
        }
        let hit = rule.probability >= 1.0 || self.rng.random::<f64>() < rule.probability;
        hit.then(|| ServiceError::new(rule.error_type.clone(), rule.message.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(probability: f64) -> FailureRule {
        FailureRule {
            error_type: "rate_limited".into(),
            message: "Slack API rate limit exceeded".into(),
            probability,
        }
    }

    fn injector(probability: f64, seed: Option<u64>) -> FailureInjector {
        let mut rules = BTreeMap::new();
        rules.insert("slack.invite_user".to_string(), rule(probability));
        FailureInjector::new(rules, seed)
    }

    #[test]
    fn test_certain_failure_hits_only_its_capability() {
        let mut inj = injector(1.0, None);
        let err = inj.roll(Capability::SlackInviteUser).unwrap();
        assert_eq!(err.to_string(), "[rate_limited] Slack API rate limit exceeded");
        assert!(inj.roll(Capability::SlackCreateChannel).is_none());
    }

    #[test]
    fn test_zero_probability_never_fails() {
        let mut inj = injector(0.0, Some(1));
        for _ in 0..100 {
            assert!(inj.roll(Capability::SlackInviteUser).is_none());
        }
    }

    #[test]
    fn test_seeded_rolls_are_reproducible() {
        let mut a = injector(0.5, Some(42));
        let mut b = injector(0.5, Some(42));
        let rolls_a: Vec<bool> = (0..32)
            .map(|_| a.roll(Capability::SlackInviteUser).is_some())
            .collect();
        let rolls_b: Vec<bool> = (0..32)
            .map(|_| b.roll(Capability::SlackInviteUser).is_some())
            .collect();
        assert_eq!(rolls_a, rolls_b);
    }
}
