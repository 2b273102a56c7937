//! Property-based tests for rule evaluation.

#[cfg(test)]
mod property_tests {
    use crate::condition::{ApplyConditionTo, Condition};
    use crate::context::{PropertyContext, ValidationContext};
    use crate::error::{Result, ValidationFailure};
    use crate::options::{CascadeMode, ValidatorOptions};
    use crate::rule::{PropertyRule, ValidationRule};
    use crate::validator::PropertyValidator;
    use proptest::prelude::*;
    use std::sync::{Arc, Mutex};
    use tokio_util::sync::CancellationToken;

    /// Validator with a fixed outcome that records when it runs.
    struct Scripted {
        index: usize,
        fails: bool,
        log: Arc<Mutex<Vec<usize>>>,
    }

    impl PropertyValidator<(), usize> for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn validate(&self, ctx: &PropertyContext<'_, (), usize>) -> Result<Vec<ValidationFailure>> {
            self.log.lock().unwrap().push(self.index);
            if self.fails {
                Ok(vec![ctx.failure(format!("v{}", self.index))])
            } else {
                Ok(Vec::new())
            }
        }
    }

    fn build_rule(
        outcomes: &[bool],
        cascade: CascadeMode,
        log: &Arc<Mutex<Vec<usize>>>,
    ) -> PropertyRule<(), usize> {
        let mut rule = PropertyRule::new(ValidatorOptions::new().shared(), "Value", |_: &()| 0);
        rule.set_cascade_mode(cascade);
        for (index, &fails) in outcomes.iter().enumerate() {
            rule.add_validator(Scripted {
                index,
                fails,
                log: Arc::clone(log),
            });
        }
        rule
    }

    fn messages(failures: &[ValidationFailure]) -> Vec<String> {
        failures.iter().map(|f| f.message().to_string()).collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        // With StopOnFirstFailure nothing after the first failing validator runs.
        #[test]
        fn stop_on_first_failure_stops(outcomes in prop::collection::vec(any::<bool>(), 0..8)) {
            let log = Arc::new(Mutex::new(Vec::new()));
            let rule = build_rule(&outcomes, CascadeMode::StopOnFirstFailure, &log);
            let failures = rule.validate(&ValidationContext::new(())).unwrap();

            let expected_runs = match outcomes.iter().position(|&f| f) {
                Some(first) => first + 1,
                None => outcomes.len(),
            };
            prop_assert_eq!(log.lock().unwrap().clone(), (0..expected_runs).collect::<Vec<_>>());
            prop_assert_eq!(failures.len(), usize::from(outcomes.contains(&true)));
        }

        // With ContinueAlways every validator runs and failures keep declaration order.
        #[test]
        fn continue_always_runs_everything(outcomes in prop::collection::vec(any::<bool>(), 0..8)) {
            let log = Arc::new(Mutex::new(Vec::new()));
            let rule = build_rule(&outcomes, CascadeMode::ContinueAlways, &log);
            let failures = rule.validate(&ValidationContext::new(())).unwrap();

            let expected: Vec<String> = outcomes
                .iter()
                .enumerate()
                .filter(|(_, fails)| **fails)
                .map(|(i, _)| format!("v{i}"))
                .collect();
            prop_assert_eq!(log.lock().unwrap().len(), outcomes.len());
            prop_assert_eq!(messages(&failures), expected);
        }

        // Sync and async evaluation agree on failures and on which validators ran.
        #[test]
        fn sync_and_async_agree(
            outcomes in prop::collection::vec(any::<bool>(), 0..8),
            stop in any::<bool>(),
        ) {
            let cascade = if stop { CascadeMode::StopOnFirstFailure } else { CascadeMode::ContinueAlways };
            let sync_log = Arc::new(Mutex::new(Vec::new()));
            let async_log = Arc::new(Mutex::new(Vec::new()));
            let sync_rule = build_rule(&outcomes, cascade, &sync_log);
            let async_rule = build_rule(&outcomes, cascade, &async_log);

            let sync_failures = sync_rule.validate(&ValidationContext::new(())).unwrap();

            let rt = tokio::runtime::Runtime::new().unwrap();
            let async_failures = rt.block_on(async {
                async_rule
                    .validate_async(&ValidationContext::new(()), &CancellationToken::new())
                    .await
                    .unwrap()
            });

            prop_assert_eq!(sync_failures, async_failures);
            prop_assert_eq!(sync_log.lock().unwrap().clone(), async_log.lock().unwrap().clone());
        }

        // A validator skipped by its own condition never triggers the cascade.
        #[test]
        fn gated_validators_do_not_cascade(
            outcomes in prop::collection::vec((any::<bool>(), any::<bool>()), 1..8),
        ) {
            let log = Arc::new(Mutex::new(Vec::new()));
            let fails: Vec<bool> = outcomes.iter().map(|(f, _)| *f).collect();
            let mut rule: PropertyRule<(), usize> =
                PropertyRule::new(ValidatorOptions::new().shared(), "Value", |_: &()| 0);
            rule.set_cascade_mode(CascadeMode::StopOnFirstFailure);
            for (index, &(fails, gated)) in outcomes.iter().enumerate() {
                rule.add_validator(Scripted { index, fails, log: Arc::clone(&log) });
                if gated {
                    rule.apply_condition(Condition::new(|_| false), ApplyConditionTo::CurrentValidator);
                }
            }

            let failures = rule.validate(&ValidationContext::new(())).unwrap();

            let first_real_failure = outcomes.iter().position(|&(f, gated)| f && !gated);
            let last = first_real_failure.unwrap_or(fails.len() - 1);
            let expected_runs: Vec<usize> = (0..=last).filter(|&i| !outcomes[i].1).collect();
            prop_assert_eq!(log.lock().unwrap().clone(), expected_runs);
            prop_assert_eq!(failures.len(), usize::from(first_real_failure.is_some()));
        }
    }
}
