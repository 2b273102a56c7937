//! Property rules: the unit that owns validators, conditions, cascade policy
//! and dependent rules for one property.

mod execution;

use crate::condition::{ApplyConditionTo, AsyncCondition, Condition};
use crate::context::ValidationContext;
use crate::error::{Result, ValidationFailure};
use crate::lazy::ValueAccessor;
use crate::options::{split_property_name, CascadeMode, ValidatorOptions};
use crate::selector::RuleDescriptor;
use crate::validator::{PropertyValidator, RuleComponent};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use execution::ExecutionMode;

/// Notified with the instance and the failures of a failing evaluation.
pub type FailureCallback<T> = Arc<dyn Fn(&T, &[ValidationFailure]) + Send + Sync>;

/// Computes a display name from the validation context.
pub type DisplayNameFn<T> = Arc<dyn Fn(&ValidationContext<T>) -> String + Send + Sync>;

/// Object-safe interface over rules of any property type.
///
/// Dependent rules are stored as `Box<dyn ValidationRule<T>>`, so a rule for
/// one property can own rules for properties of other types.
#[async_trait]
pub trait ValidationRule<T>: RuleDescriptor + Send + Sync
where
    T: Send + Sync + 'static,
{
    /// Evaluate the rule on the calling thread.
    ///
    /// Async conditions and validators are blocked on, or rejected, according
    /// to the rule's [`AsyncBridge`](crate::AsyncBridge) policy.
    fn validate(&self, ctx: &ValidationContext<T>) -> Result<Vec<ValidationFailure>>;

    /// Evaluate the rule, awaiting async conditions and validators.
    ///
    /// Cancellation is checked before each validator and before each
    /// dependent rule; a cancelled evaluation returns
    /// [`RuleError::Cancelled`](crate::RuleError::Cancelled) and no failures.
    async fn validate_async(
        &self,
        ctx: &ValidationContext<T>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ValidationFailure>>;

    /// Gate validators with `condition`, see [`ApplyConditionTo`].
    fn apply_condition(&mut self, condition: Condition<T>, to: ApplyConditionTo);

    /// Gate validators with an async `condition`, see [`ApplyConditionTo`].
    fn apply_async_condition(&mut self, condition: AsyncCondition<T>, to: ApplyConditionTo);

    /// Narrow the rule-level condition with `condition`.
    fn apply_shared_condition(&mut self, condition: Condition<T>);

    /// Narrow the rule-level async condition with `condition`.
    fn apply_shared_async_condition(&mut self, condition: AsyncCondition<T>);
}

enum DisplayName<T> {
    Literal(String),
    Resolver(DisplayNameFn<T>),
}

/// Rule for one property of `T` with value type `P`.
///
/// Rules are built once and then evaluated many times, possibly from several
/// tasks at once. Mutating a rule while an evaluation of it is in flight is
/// not supported; the borrow checker enforces this for owned rules.
///
/// ## Example
///
/// ```rust,ignore
/// use rustapi_rules::prelude::*;
///
/// let options = ValidatorOptions::new().shared();
/// let mut rule = PropertyRule::new(options, "name", |u: &User| u.name.clone());
/// rule.add_validator(PredicateValidator::new(|_, name: &String| !name.is_empty(), "Required"));
/// rule.set_cascade_mode(CascadeMode::StopOnFirstFailure);
///
/// let failures = rule.validate(&ValidationContext::new(user))?;
/// ```
pub struct PropertyRule<T, P>
where
    T: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    options: Arc<ValidatorOptions>,
    accessor: ValueAccessor<T, P>,
    property_name: Option<String>,
    /// Split form of the property name, computed when the name is set.
    derived_display_name: Option<String>,
    display_name: Option<DisplayName<T>>,
    components: Vec<RuleComponent<T, P>>,
    condition: Option<Condition<T>>,
    async_condition: Option<AsyncCondition<T>>,
    /// `None` defers to the options on every evaluation.
    cascade: Option<CascadeMode>,
    on_failure: Option<FailureCallback<T>>,
    dependent_rules: Vec<Box<dyn ValidationRule<T>>>,
}

impl<T, P> PropertyRule<T, P>
where
    T: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    /// Create a rule for `member`, read with `accessor`.
    ///
    /// The member name goes through the options' property-name resolver and
    /// the result through the display-name resolver.
    pub fn new<F>(options: Arc<ValidatorOptions>, member: &str, accessor: F) -> Self
    where
        F: Fn(&T) -> P + Send + Sync + 'static,
    {
        let property_name = options.resolve_property_name(member);
        let display_override = options.resolve_display_name(&property_name);
        let mut rule = Self::for_model(options, accessor);
        rule.set_property_name(property_name);
        if let Some(name) = display_override {
            rule.set_display_name(name);
        }
        rule
    }

    /// Create a model-level rule with no property name.
    pub fn for_model<F>(options: Arc<ValidatorOptions>, accessor: F) -> Self
    where
        F: Fn(&T) -> P + Send + Sync + 'static,
    {
        Self {
            options,
            accessor: Arc::new(accessor),
            property_name: None,
            derived_display_name: None,
            display_name: None,
            components: Vec::new(),
            condition: None,
            async_condition: None,
            cascade: None,
            on_failure: None,
            dependent_rules: Vec::new(),
        }
    }

    pub fn options(&self) -> &Arc<ValidatorOptions> {
        &self.options
    }

    /// Add a validator at the end of the evaluation order.
    pub fn add_validator<V>(&mut self, validator: V) -> &mut RuleComponent<T, P>
    where
        V: PropertyValidator<T, P> + 'static,
    {
        self.add_shared_validator(Arc::new(validator))
    }

    /// Add a validator that may also be referenced elsewhere.
    pub fn add_shared_validator(
        &mut self,
        validator: Arc<dyn PropertyValidator<T, P>>,
    ) -> &mut RuleComponent<T, P> {
        self.components.push(RuleComponent::new(validator));
        let last = self.components.len() - 1;
        &mut self.components[last]
    }

    /// Swap `original` for `replacement` in place, keeping its conditions.
    ///
    /// Returns `false` and leaves the rule untouched when `original` is not
    /// attached to this rule.
    pub fn replace_validator(
        &mut self,
        original: &Arc<dyn PropertyValidator<T, P>>,
        replacement: Arc<dyn PropertyValidator<T, P>>,
    ) -> bool {
        match self.components.iter_mut().find(|c| c.holds(original)) {
            Some(component) => {
                component.set_validator(replacement);
                true
            }
            None => false,
        }
    }

    pub fn remove_validator(&mut self, validator: &Arc<dyn PropertyValidator<T, P>>) -> bool {
        match self.components.iter().position(|c| c.holds(validator)) {
            Some(index) => {
                self.components.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn clear_validators(&mut self) {
        self.components.clear();
    }

    pub fn components(&self) -> &[RuleComponent<T, P>] {
        &self.components
    }

    pub fn validators(&self) -> impl Iterator<Item = &Arc<dyn PropertyValidator<T, P>>> + '_ {
        self.components.iter().map(RuleComponent::validator)
    }

    /// The most recently added validator slot.
    pub fn current_component(&self) -> Option<&RuleComponent<T, P>> {
        self.components.last()
    }

    pub fn current_component_mut(&mut self) -> Option<&mut RuleComponent<T, P>> {
        self.components.last_mut()
    }

    pub fn current_validator(&self) -> Option<&Arc<dyn PropertyValidator<T, P>>> {
        self.current_component().map(RuleComponent::validator)
    }

    pub fn property_name(&self) -> Option<&str> {
        self.property_name.as_deref()
    }

    /// Set the property name and derive the fallback display name from it.
    pub fn set_property_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.derived_display_name = Some(split_property_name(&name));
        self.property_name = Some(name);
    }

    /// Use a fixed display name. Replaces any display-name resolver.
    pub fn set_display_name(&mut self, name: impl Into<String>) {
        self.display_name = Some(DisplayName::Literal(name.into()));
    }

    /// Compute the display name per evaluation. Replaces any fixed display
    /// name.
    pub fn set_display_name_resolver<F>(&mut self, resolver: F)
    where
        F: Fn(&ValidationContext<T>) -> String + Send + Sync + 'static,
    {
        self.display_name = Some(DisplayName::Resolver(Arc::new(resolver)));
    }

    pub fn has_display_name_resolver(&self) -> bool {
        matches!(self.display_name, Some(DisplayName::Resolver(_)))
    }

    /// Resolve the display name: resolver, then fixed name, then the name
    /// derived from the property name, then the empty string.
    pub fn display_name(&self, ctx: &ValidationContext<T>) -> String {
        match &self.display_name {
            Some(DisplayName::Resolver(resolver)) => resolver(ctx),
            Some(DisplayName::Literal(name)) => name.clone(),
            None => self.derived_display_name.clone().unwrap_or_default(),
        }
    }

    /// Cascade mode for the next evaluation.
    pub fn cascade_mode(&self) -> CascadeMode {
        self.cascade.unwrap_or_else(|| self.options.cascade_mode())
    }

    /// Override the options' cascade mode for this rule.
    pub fn set_cascade_mode(&mut self, mode: CascadeMode) {
        self.cascade = Some(mode);
    }

    /// Go back to reading the cascade mode from the options.
    pub fn inherit_cascade_mode(&mut self) {
        self.cascade = None;
    }

    pub fn condition(&self) -> Option<&Condition<T>> {
        self.condition.as_ref()
    }

    pub fn async_condition(&self) -> Option<&AsyncCondition<T>> {
        self.async_condition.as_ref()
    }

    /// Set the callback invoked with the failures of a failing evaluation.
    pub fn on_failure<F>(&mut self, callback: F)
    where
        F: Fn(&T, &[ValidationFailure]) + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(callback));
    }

    /// Add a rule that runs only when this rule produced no failures.
    pub fn add_dependent_rule(&mut self, rule: impl ValidationRule<T> + 'static) {
        self.dependent_rules.push(Box::new(rule));
    }

    pub fn add_boxed_dependent_rule(&mut self, rule: Box<dyn ValidationRule<T>>) {
        self.dependent_rules.push(rule);
    }

    pub fn dependent_rules(&self) -> &[Box<dyn ValidationRule<T>>] {
        &self.dependent_rules
    }
}

impl<T, P> RuleDescriptor for PropertyRule<T, P>
where
    T: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    fn property_name(&self) -> Option<&str> {
        self.property_name.as_deref()
    }

    fn validator_count(&self) -> usize {
        self.components.len()
    }

    fn dependent_rule_count(&self) -> usize {
        self.dependent_rules.len()
    }
}

#[async_trait]
impl<T, P> ValidationRule<T> for PropertyRule<T, P>
where
    T: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    fn validate(&self, ctx: &ValidationContext<T>) -> Result<Vec<ValidationFailure>> {
        self.run_blocking(ctx)
    }

    async fn validate_async(
        &self,
        ctx: &ValidationContext<T>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ValidationFailure>> {
        self.execute(ctx, ExecutionMode::Cooperative(cancel)).await
    }

    fn apply_condition(&mut self, condition: Condition<T>, to: ApplyConditionTo) {
        match to {
            ApplyConditionTo::AllValidators => {
                for component in &mut self.components {
                    component.apply_condition(condition.clone());
                }
                for rule in &mut self.dependent_rules {
                    rule.apply_condition(condition.clone(), ApplyConditionTo::AllValidators);
                }
            }
            ApplyConditionTo::CurrentValidator => {
                if let Some(component) = self.components.last_mut() {
                    component.apply_condition(condition);
                }
            }
        }
    }

    fn apply_async_condition(&mut self, condition: AsyncCondition<T>, to: ApplyConditionTo) {
        match to {
            ApplyConditionTo::AllValidators => {
                for component in &mut self.components {
                    component.apply_async_condition(condition.clone());
                }
                for rule in &mut self.dependent_rules {
                    rule.apply_async_condition(condition.clone(), ApplyConditionTo::AllValidators);
                }
            }
            ApplyConditionTo::CurrentValidator => {
                if let Some(component) = self.components.last_mut() {
                    component.apply_async_condition(condition);
                }
            }
        }
    }

    fn apply_shared_condition(&mut self, condition: Condition<T>) {
        self.condition = Some(match self.condition.take() {
            Some(existing) => condition.and(existing),
            None => condition,
        });
    }

    fn apply_shared_async_condition(&mut self, condition: AsyncCondition<T>) {
        self.async_condition = Some(match self.async_condition.take() {
            Some(existing) => condition.and(existing),
            None => condition,
        });
    }
}

impl<T, P> fmt::Debug for PropertyRule<T, P>
where
    T: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyRule")
            .field("property_name", &self.property_name)
            .field("components", &self.components)
            .field("has_condition", &self.condition.is_some())
            .field("has_async_condition", &self.async_condition.is_some())
            .field("cascade", &self.cascade_mode())
            .field("dependent_rules", &self.dependent_rules.len())
            .finish()
    }
}
