//! Property validators and the per-validator slot a rule keeps for them.

use crate::condition::{AsyncCondition, Condition};
use crate::context::{PropertyContext, ValidationContext};
use crate::error::{Result, RuleError, Severity, ValidationFailure};
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A single check over a property value.
///
/// Synchronous validators implement [`validate`](Self::validate). Validators
/// that need to await something implement
/// [`validate_async`](Self::validate_async) and return `true` from
/// [`should_validate_async`](Self::should_validate_async); the rule then
/// routes both execution paths through the async operation.
///
/// ## Example
///
/// ```rust,ignore
/// use rustapi_rules::prelude::*;
///
/// struct NotEmpty;
///
/// impl PropertyValidator<User, String> for NotEmpty {
///     fn name(&self) -> &str {
///         "not_empty"
///     }
///
///     fn validate(&self, ctx: &PropertyContext<'_, User, String>) -> Result<Vec<ValidationFailure>> {
///         if ctx.value().is_empty() {
///             Ok(vec![ctx.failure(format!("'{}' must not be empty", ctx.display_name()))])
///         } else {
///             Ok(Vec::new())
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait PropertyValidator<T, P>: Send + Sync
where
    T: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    /// Name used in diagnostics and fault reports.
    fn name(&self) -> &str;

    /// Whether this validator must run through its async operation.
    fn should_validate_async(&self, _ctx: &ValidationContext<T>) -> bool {
        false
    }

    fn validate(&self, _ctx: &PropertyContext<'_, T, P>) -> Result<Vec<ValidationFailure>> {
        Err(RuleError::SyncUnsupported(self.name().to_string()))
    }

    async fn validate_async(
        &self,
        ctx: &PropertyContext<'_, T, P>,
        _cancel: &CancellationToken,
    ) -> Result<Vec<ValidationFailure>> {
        self.validate(ctx)
    }
}

/// A validator attached to a rule, with its own conditions and failure
/// overrides.
pub struct RuleComponent<T, P>
where
    T: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    validator: Arc<dyn PropertyValidator<T, P>>,
    condition: Option<Condition<T>>,
    async_condition: Option<AsyncCondition<T>>,
    error_code: Option<String>,
    severity: Option<Severity>,
}

impl<T, P> RuleComponent<T, P>
where
    T: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    pub fn new(validator: Arc<dyn PropertyValidator<T, P>>) -> Self {
        Self {
            validator,
            condition: None,
            async_condition: None,
            error_code: None,
            severity: None,
        }
    }

    pub fn validator(&self) -> &Arc<dyn PropertyValidator<T, P>> {
        &self.validator
    }

    pub(crate) fn set_validator(&mut self, validator: Arc<dyn PropertyValidator<T, P>>) {
        self.validator = validator;
    }

    pub(crate) fn holds(&self, validator: &Arc<dyn PropertyValidator<T, P>>) -> bool {
        same_validator(&self.validator, validator)
    }

    pub fn condition(&self) -> Option<&Condition<T>> {
        self.condition.as_ref()
    }

    pub fn async_condition(&self) -> Option<&AsyncCondition<T>> {
        self.async_condition.as_ref()
    }

    /// AND `condition` in front of the existing condition.
    pub fn apply_condition(&mut self, condition: Condition<T>) {
        self.condition = Some(match self.condition.take() {
            Some(existing) => condition.and(existing),
            None => condition,
        });
    }

    /// AND `condition` in front of the existing async condition.
    pub fn apply_async_condition(&mut self, condition: AsyncCondition<T>) {
        self.async_condition = Some(match self.async_condition.take() {
            Some(existing) => condition.and(existing),
            None => condition,
        });
    }

    /// Stamp an error code onto every failure this validator produces.
    pub fn with_error_code(&mut self, code: impl Into<String>) -> &mut Self {
        self.error_code = Some(code.into());
        self
    }

    /// Stamp a severity onto every failure this validator produces.
    pub fn with_severity(&mut self, severity: Severity) -> &mut Self {
        self.severity = Some(severity);
        self
    }

    pub(crate) fn decorate(&self, failures: Vec<ValidationFailure>) -> Vec<ValidationFailure> {
        if self.error_code.is_none() && self.severity.is_none() {
            return failures;
        }
        failures
            .into_iter()
            .map(|failure| {
                let failure = match &self.error_code {
                    Some(code) => failure.with_error_code(code.clone()),
                    None => failure,
                };
                match self.severity {
                    Some(severity) => failure.with_severity(severity),
                    None => failure,
                }
            })
            .collect()
    }
}

impl<T, P> fmt::Debug for RuleComponent<T, P>
where
    T: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleComponent")
            .field("validator", &self.validator.name())
            .field("has_condition", &self.condition.is_some())
            .field("has_async_condition", &self.async_condition.is_some())
            .field("error_code", &self.error_code)
            .field("severity", &self.severity)
            .finish()
    }
}

/// Identity comparison on the data pointer, ignoring vtables.
pub(crate) fn same_validator<T, P>(
    a: &Arc<dyn PropertyValidator<T, P>>,
    b: &Arc<dyn PropertyValidator<T, P>>,
) -> bool
where
    T: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

type PredicateFn<T, P> = dyn Fn(&T, &P) -> bool + Send + Sync;

/// Fails with a fixed message when the predicate returns `false`.
pub struct PredicateValidator<T, P> {
    predicate: Box<PredicateFn<T, P>>,
    message: String,
}

impl<T, P> PredicateValidator<T, P> {
    pub fn new<F>(predicate: F, message: impl Into<String>) -> Self
    where
        F: Fn(&T, &P) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Box::new(predicate),
            message: message.into(),
        }
    }
}

impl<T, P> PropertyValidator<T, P> for PredicateValidator<T, P>
where
    T: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    fn name(&self) -> &str {
        "predicate"
    }

    fn validate(&self, ctx: &PropertyContext<'_, T, P>) -> Result<Vec<ValidationFailure>> {
        if (self.predicate)(ctx.instance(), ctx.value()) {
            Ok(Vec::new())
        } else {
            Ok(vec![ctx.failure(self.message.clone())])
        }
    }
}

type AsyncPredicateFn<T, P> = dyn for<'a> Fn(&'a T, &'a P, &'a CancellationToken) -> BoxFuture<'a, bool>
    + Send
    + Sync;

/// Async counterpart of [`PredicateValidator`].
pub struct AsyncPredicateValidator<T, P> {
    predicate: Box<AsyncPredicateFn<T, P>>,
    message: String,
}

impl<T, P> AsyncPredicateValidator<T, P> {
    pub fn new<F>(predicate: F, message: impl Into<String>) -> Self
    where
        F: for<'a> Fn(&'a T, &'a P, &'a CancellationToken) -> BoxFuture<'a, bool>
            + Send
            + Sync
            + 'static,
    {
        Self {
            predicate: Box::new(predicate),
            message: message.into(),
        }
    }
}

#[async_trait]
impl<T, P> PropertyValidator<T, P> for AsyncPredicateValidator<T, P>
where
    T: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    fn name(&self) -> &str {
        "async_predicate"
    }

    fn should_validate_async(&self, _ctx: &ValidationContext<T>) -> bool {
        true
    }

    async fn validate_async(
        &self,
        ctx: &PropertyContext<'_, T, P>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ValidationFailure>> {
        if (self.predicate)(ctx.instance(), ctx.value(), cancel).await {
            Ok(Vec::new())
        } else {
            Ok(vec![ctx.failure(self.message.clone())])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lazy::LazyValue;
    use futures_util::FutureExt;

    fn run_sync(
        validator: &dyn PropertyValidator<String, usize>,
        instance: &str,
    ) -> Result<Vec<ValidationFailure>> {
        let ctx = ValidationContext::new(instance.to_string());
        let read = |s: &String| s.len();
        let value: LazyValue<'_, String, usize> = LazyValue::new(ctx.instance(), &read);
        let pctx = PropertyContext::new(&ctx, "len", "Len", &value);
        validator.validate(&pctx)
    }

    #[test]
    fn predicate_validator() {
        let validator = PredicateValidator::new(|_: &String, len: &usize| *len > 2, "Too short");

        assert!(run_sync(&validator, "hello").unwrap().is_empty());
        let failures = run_sync(&validator, "hi").unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].property_path(), "len");
        assert_eq!(failures[0].message(), "Too short");
    }

    #[test]
    fn async_only_validator_rejects_sync_call() {
        let validator = AsyncPredicateValidator::new(
            |_: &String, _: &usize, _: &CancellationToken| async { true }.boxed(),
            "never",
        );
        let err = run_sync(&validator, "x").unwrap_err();
        assert!(matches!(err, RuleError::SyncUnsupported(name) if name == "async_predicate"));
    }

    #[tokio::test]
    async fn async_predicate_validator() {
        let validator = AsyncPredicateValidator::new(
            |s: &String, _: &usize, _: &CancellationToken| {
                async move { s.contains('@') }.boxed()
            },
            "Not an email",
        );
        let ctx = ValidationContext::new("nope".to_string());
        let read = |s: &String| s.len();
        let value: LazyValue<'_, String, usize> = LazyValue::new(ctx.instance(), &read);
        let pctx = PropertyContext::new(&ctx, "email", "Email", &value);

        assert!(validator.should_validate_async(&ctx));
        let failures = validator
            .validate_async(&pctx, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(failures[0].message(), "Not an email");
    }

    #[test]
    fn component_decorates_failures() {
        let validator: Arc<dyn PropertyValidator<String, usize>> =
            Arc::new(PredicateValidator::new(|_: &String, _: &usize| false, "bad"));
        let mut component = RuleComponent::new(Arc::clone(&validator));
        component.with_error_code("len").with_severity(Severity::Warning);

        let failures = component.decorate(vec![ValidationFailure::new("x", "bad")]);
        assert_eq!(failures[0].error_code(), Some("len"));
        assert_eq!(failures[0].severity(), Severity::Warning);
        assert!(component.holds(&validator));
    }

    #[test]
    fn component_conditions_compose() {
        let validator: Arc<dyn PropertyValidator<String, usize>> =
            Arc::new(PredicateValidator::new(|_: &String, _: &usize| true, "ok"));
        let mut component = RuleComponent::new(validator);
        let ctx = ValidationContext::new("abc".to_string());

        component.apply_condition(Condition::new(|ctx: &ValidationContext<String>| {
            ctx.instance().len() > 1
        }));
        assert!(component.condition().unwrap().check(&ctx));

        component.apply_condition(Condition::new(|ctx: &ValidationContext<String>| {
            ctx.instance().len() > 5
        }));
        assert!(!component.condition().unwrap().check(&ctx));
        assert!(component.async_condition().is_none());
    }
}
