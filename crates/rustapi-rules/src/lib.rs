//! # RustAPI Rules
//!
//! Property rule engine for RustAPI. A [`PropertyRule`] owns an ordered list
//! of validators for one property, together with conditions, a cascade policy,
//! a failure callback and dependent rules. The same rule can be evaluated
//! synchronously or asynchronously with identical semantics.
//!
//! ## Features
//!
//! - Sync and async validators and conditions, mixed freely in one rule
//! - Cascade control (`ContinueAlways` / `StopOnFirstFailure`)
//! - Rule-level and per-validator conditions composed with AND
//! - Dependent rules that run only when their parent passed
//! - Lazy, read-once property access shared by all validators of a rule
//! - Cancellation of async evaluations between validators
//!
//! ## Example
//!
//! ```rust,ignore
//! use rustapi_rules::prelude::*;
//!
//! struct User {
//!     name: String,
//! }
//!
//! let options = ValidatorOptions::new()
//!     .default_cascade_mode(CascadeMode::StopOnFirstFailure)
//!     .shared();
//!
//! let mut rule = PropertyRule::new(options, "Name", |u: &User| u.name.clone());
//! rule.add_validator(PredicateValidator::new(|_, name: &String| !name.is_empty(), "Required"));
//! rule.add_validator(PredicateValidator::new(|_, name: &String| name.len() <= 50, "Too long"));
//!
//! let ctx = ValidationContext::new(User { name: String::new() });
//! let failures = rule.validate(&ctx)?;
//! assert_eq!(failures[0].message(), "Required");
//!
//! let failures = rule.validate_async(&ctx, &CancellationToken::new()).await?;
//! ```
//!
//! ## Sync and async execution
//!
//! The synchronous path blocks the calling thread on async conditions and
//! validators when the options use [`AsyncBridge::Block`] (the default), or
//! fails with [`RuleError::AsyncInSyncPath`] under [`AsyncBridge::Reject`].
//! The asynchronous path never blocks and stamps the shared root data with
//! [`IS_ASYNC_KEY`] so nested validators can tell which path they are on.

mod condition;
mod context;
mod error;
mod lazy;
mod options;
mod rule;
mod selector;
mod validator;

#[cfg(test)]
mod tests;

pub use condition::{ApplyConditionTo, AsyncCondition, Condition};
pub use context::{
    PropertyChain, PropertyContext, RootContextData, ValidationContext, ValidationContextBuilder,
    ValidationScope, IS_ASYNC_KEY,
};
pub use error::{BoxError, Result, RuleError, Severity, ValidationFailure};
pub use lazy::{LazyValue, ValueAccessor};
pub use options::{
    split_property_name, AsyncBridge, CascadeMode, DisplayNameResolver, PropertyNameResolver,
    ValidatorOptions, ValidatorSettings,
};
pub use rule::{DisplayNameFn, FailureCallback, PropertyRule, ValidationRule};
pub use selector::{DefaultSelector, MemberNameSelector, RuleDescriptor, RuleSelector};
pub use validator::{AsyncPredicateValidator, PredicateValidator, PropertyValidator, RuleComponent};

pub use tokio_util::sync::CancellationToken;

/// Prelude module for rules
pub mod prelude {
    pub use crate::condition::{ApplyConditionTo, AsyncCondition, Condition};
    pub use crate::context::{
        PropertyChain, PropertyContext, RootContextData, ValidationContext,
        ValidationContextBuilder,
    };
    pub use crate::error::{Result, RuleError, Severity, ValidationFailure};
    pub use crate::options::{AsyncBridge, CascadeMode, ValidatorOptions, ValidatorSettings};
    pub use crate::rule::{PropertyRule, ValidationRule};
    pub use crate::selector::{DefaultSelector, MemberNameSelector, RuleDescriptor, RuleSelector};
    pub use crate::validator::{
        AsyncPredicateValidator, PredicateValidator, PropertyValidator, RuleComponent,
    };
    pub use tokio_util::sync::CancellationToken;
}
