//! Validation context passed through rule evaluation.

use crate::error::ValidationFailure;
use crate::lazy::LazyValue;
use crate::selector::{DefaultSelector, RuleSelector};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Root data key set once a validation runs through the async path.
pub const IS_ASYNC_KEY: &str = "__rustapi_rules.is_async";

/// Names of the enclosing properties of a nested object.
///
/// ```rust,ignore
/// let mut chain = PropertyChain::new();
/// chain.add("orders");
/// chain.add_indexer(2);
/// assert_eq!(chain.build_property_path("amount"), "orders[2].amount");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyChain {
    segments: Vec<String>,
}

impl PropertyChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a chain from a dotted path such as `customer.address`.
    pub fn from_path(path: &str) -> Self {
        Self {
            segments: path
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Append a member segment.
    pub fn add(&mut self, member: impl Into<String>) {
        self.segments.push(member.into());
    }

    /// Append an indexer to the last segment.
    pub fn add_indexer(&mut self, index: impl fmt::Display) {
        match self.segments.last_mut() {
            Some(last) => last.push_str(&format!("[{index}]")),
            None => self.segments.push(format!("[{index}]")),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Prefix `name` with the chain.
    pub fn build_property_path(&self, name: &str) -> String {
        if self.segments.is_empty() {
            return name.to_string();
        }
        let prefix = self.segments.join(".");
        if name.is_empty() {
            prefix
        } else {
            format!("{prefix}.{name}")
        }
    }
}

impl fmt::Display for PropertyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// Metadata shared by every context derived from one top-level validation.
///
/// Cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct RootContextData {
    inner: Arc<RwLock<HashMap<String, serde_json::Value>>>,
}

impl RootContextData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, value: serde_json::Value) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    pub fn remove(&self, key: &str) -> Option<serde_json::Value> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    /// Record that the validation is running asynchronously. Idempotent.
    pub fn mark_async(&self) {
        if !self.is_async() {
            self.insert(IS_ASYNC_KEY, serde_json::Value::Bool(true));
        }
    }

    pub fn is_async(&self) -> bool {
        matches!(self.get(IS_ASYNC_KEY), Some(serde_json::Value::Bool(true)))
    }

    /// Whether both handles point at the same map.
    pub fn shares_storage_with(&self, other: &RootContextData) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for RootContextData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        f.debug_struct("RootContextData").field("keys", &keys).finish()
    }
}

/// The instance-independent part of a context: property chain, rule
/// selector and root data.
#[derive(Clone)]
pub struct ValidationScope {
    chain: PropertyChain,
    selector: Arc<dyn RuleSelector>,
    root_data: RootContextData,
}

impl ValidationScope {
    pub fn property_chain(&self) -> &PropertyChain {
        &self.chain
    }

    pub fn selector(&self) -> &dyn RuleSelector {
        self.selector.as_ref()
    }

    pub fn root_data(&self) -> &RootContextData {
        &self.root_data
    }

    pub fn is_async(&self) -> bool {
        self.root_data.is_async()
    }
}

impl Default for ValidationScope {
    fn default() -> Self {
        Self {
            chain: PropertyChain::new(),
            selector: Arc::new(DefaultSelector),
            root_data: RootContextData::new(),
        }
    }
}

impl fmt::Debug for ValidationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationScope")
            .field("chain", &self.chain)
            .field("root_data", &self.root_data)
            .finish_non_exhaustive()
    }
}

/// Context for one validation of an instance.
///
/// ## Example
///
/// ```rust,ignore
/// use rustapi_rules::prelude::*;
///
/// let ctx = ValidationContext::builder(user)
///     .selector(MemberNameSelector::new(["email"]))
///     .build();
///
/// let failures = rule.validate(&ctx)?;
/// ```
pub struct ValidationContext<T> {
    instance: Arc<T>,
    scope: ValidationScope,
}

impl<T> ValidationContext<T> {
    /// Create a top-level context with the default selector.
    pub fn new(instance: T) -> Self {
        Self::from_arc(Arc::new(instance))
    }

    pub fn from_arc(instance: Arc<T>) -> Self {
        Self {
            instance,
            scope: ValidationScope::default(),
        }
    }

    pub fn builder(instance: T) -> ValidationContextBuilder<T> {
        ValidationContextBuilder::new(instance)
    }

    pub fn instance(&self) -> &T {
        &self.instance
    }

    pub fn instance_arc(&self) -> &Arc<T> {
        &self.instance
    }

    pub fn scope(&self) -> &ValidationScope {
        &self.scope
    }

    pub fn property_chain(&self) -> &PropertyChain {
        &self.scope.chain
    }

    pub fn selector(&self) -> &dyn RuleSelector {
        self.scope.selector()
    }

    pub fn root_data(&self) -> &RootContextData {
        &self.scope.root_data
    }

    /// Whether the enclosing top-level validation runs asynchronously.
    pub fn is_async(&self) -> bool {
        self.scope.is_async()
    }

    pub fn is_child_context(&self) -> bool {
        !self.scope.chain.is_empty()
    }

    /// Derive a context for a nested object held in `member`.
    ///
    /// The selector and root data are shared with this context.
    pub fn child<U>(&self, member: &str, instance: U) -> ValidationContext<U> {
        self.child_arc(member, Arc::new(instance))
    }

    pub fn child_arc<U>(&self, member: &str, instance: Arc<U>) -> ValidationContext<U> {
        let mut chain = self.scope.chain.clone();
        chain.add(member);
        ValidationContext {
            instance,
            scope: ValidationScope {
                chain,
                selector: Arc::clone(&self.scope.selector),
                root_data: self.scope.root_data.clone(),
            },
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ValidationContext<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationContext")
            .field("instance", &self.instance)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Builder for constructing a [`ValidationContext`].
pub struct ValidationContextBuilder<T> {
    instance: Arc<T>,
    scope: ValidationScope,
}

impl<T> ValidationContextBuilder<T> {
    pub fn new(instance: T) -> Self {
        Self {
            instance: Arc::new(instance),
            scope: ValidationScope::default(),
        }
    }

    /// Set the rule selector.
    pub fn selector(mut self, selector: impl RuleSelector + 'static) -> Self {
        self.scope.selector = Arc::new(selector);
        self
    }

    /// Set the rule selector from an Arc.
    pub fn selector_arc(mut self, selector: Arc<dyn RuleSelector>) -> Self {
        self.scope.selector = selector;
        self
    }

    /// Set the property chain prefix.
    pub fn property_chain(mut self, chain: PropertyChain) -> Self {
        self.scope.chain = chain;
        self
    }

    /// Share root data with another validation.
    pub fn root_data(mut self, root_data: RootContextData) -> Self {
        self.scope.root_data = root_data;
        self
    }

    pub fn build(self) -> ValidationContext<T> {
        ValidationContext {
            instance: self.instance,
            scope: self.scope,
        }
    }
}

/// What a validator sees while checking one property.
pub struct PropertyContext<'a, T, P> {
    parent: &'a ValidationContext<T>,
    property_path: &'a str,
    display_name: &'a str,
    value: &'a LazyValue<'a, T, P>,
}

impl<'a, T, P> PropertyContext<'a, T, P> {
    pub(crate) fn new(
        parent: &'a ValidationContext<T>,
        property_path: &'a str,
        display_name: &'a str,
        value: &'a LazyValue<'a, T, P>,
    ) -> Self {
        Self {
            parent,
            property_path,
            display_name,
            value,
        }
    }

    pub fn parent(&self) -> &'a ValidationContext<T> {
        self.parent
    }

    pub fn instance(&self) -> &'a T {
        self.parent.instance()
    }

    /// The property value, read on first access.
    pub fn value(&self) -> &'a P {
        self.value.get()
    }

    pub fn property_path(&self) -> &'a str {
        self.property_path
    }

    pub fn display_name(&self) -> &'a str {
        self.display_name
    }

    pub fn is_async(&self) -> bool {
        self.parent.is_async()
    }

    /// Create a failure for this property.
    pub fn failure(&self, message: impl Into<String>) -> ValidationFailure {
        ValidationFailure::new(self.property_path, message)
    }
}

impl<T, P: Serialize> PropertyContext<'_, T, P> {
    /// Create a failure that records the attempted value.
    pub fn failure_with_attempted_value(&self, message: impl Into<String>) -> ValidationFailure {
        let failure = self.failure(message);
        match serde_json::to_value(self.value()) {
            Ok(value) => failure.with_attempted_value(value),
            Err(_) => failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_builds_paths() {
        let mut chain = PropertyChain::new();
        assert_eq!(chain.build_property_path("name"), "name");

        chain.add("customer");
        chain.add("orders");
        chain.add_indexer(2);
        assert_eq!(chain.build_property_path("amount"), "customer.orders[2].amount");
        assert_eq!(chain.build_property_path(""), "customer.orders[2]");
        assert_eq!(chain.to_string(), "customer.orders[2]");
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn chain_from_path() {
        let chain = PropertyChain::from_path("customer.address");
        assert_eq!(chain.build_property_path("city"), "customer.address.city");
        assert!(PropertyChain::from_path("").is_empty());
    }

    #[test]
    fn mark_async_is_idempotent() {
        let data = RootContextData::new();
        assert!(!data.is_async());

        data.mark_async();
        data.mark_async();
        assert!(data.is_async());
        assert_eq!(data.get(IS_ASYNC_KEY), Some(serde_json::Value::Bool(true)));
    }

    #[test]
    fn child_context_shares_root_data() {
        let ctx = ValidationContext::new("parent".to_string());
        let child = ctx.child("address", 42u32);

        assert!(!ctx.is_child_context());
        assert!(child.is_child_context());
        assert_eq!(*child.instance(), 42);
        assert_eq!(child.property_chain().build_property_path("zip"), "address.zip");
        assert!(child.root_data().shares_storage_with(ctx.root_data()));

        child.root_data().mark_async();
        assert!(ctx.is_async());
    }

    #[test]
    fn builder_sets_chain_and_root_data() {
        let shared = RootContextData::new();
        shared.insert("tenant", serde_json::json!("acme"));

        let ctx = ValidationContext::builder(1u8)
            .property_chain(PropertyChain::from_path("order"))
            .root_data(shared.clone())
            .build();

        assert_eq!(ctx.property_chain().build_property_path("id"), "order.id");
        assert_eq!(ctx.root_data().get("tenant"), Some(serde_json::json!("acme")));
        assert!(ctx.root_data().shares_storage_with(&shared));
        assert!(ctx.root_data().remove("tenant").is_some());
        assert!(!shared.contains_key("tenant"));
    }
}
