//! Rule selection: decides whether a rule runs at all in a validation pass.

use crate::context::ValidationScope;

/// Read-only view of a rule handed to selectors.
pub trait RuleDescriptor {
    /// Property name, or `None` for a model-level rule.
    fn property_name(&self) -> Option<&str>;

    /// Number of validators attached to the rule.
    fn validator_count(&self) -> usize;

    /// Number of dependent rules attached to the rule.
    fn dependent_rule_count(&self) -> usize;
}

/// Gate consulted once per rule evaluation, before any condition or
/// validator runs.
pub trait RuleSelector: Send + Sync {
    fn can_execute(
        &self,
        rule: &dyn RuleDescriptor,
        property_path: &str,
        scope: &ValidationScope,
    ) -> bool;
}

impl<F> RuleSelector for F
where
    F: Fn(&dyn RuleDescriptor, &str, &ValidationScope) -> bool + Send + Sync,
{
    fn can_execute(
        &self,
        rule: &dyn RuleDescriptor,
        property_path: &str,
        scope: &ValidationScope,
    ) -> bool {
        self(rule, property_path, scope)
    }
}

/// Executes every rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSelector;

impl RuleSelector for DefaultSelector {
    fn can_execute(&self, _: &dyn RuleDescriptor, _: &str, _: &ValidationScope) -> bool {
        true
    }
}

/// Executes only rules for the listed member paths.
///
/// A rule runs when its path equals a member, is nested under a member
/// (`address.city` for `address`), or is an ancestor of a member (`address`
/// for `address.city`, so that nested validation can reach it). Top-level
/// model rules (empty path) always run.
#[derive(Debug, Clone, Default)]
pub struct MemberNameSelector {
    members: Vec<String>,
}

impl MemberNameSelector {
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    fn is_nested_under(path: &str, parent: &str) -> bool {
        path.len() > parent.len()
            && path.starts_with(parent)
            && matches!(path.as_bytes()[parent.len()], b'.' | b'[')
    }
}

impl RuleSelector for MemberNameSelector {
    fn can_execute(
        &self,
        _rule: &dyn RuleDescriptor,
        property_path: &str,
        _scope: &ValidationScope,
    ) -> bool {
        if property_path.is_empty() {
            return true;
        }
        self.members.iter().any(|member| {
            member == property_path
                || Self::is_nested_under(property_path, member)
                || Self::is_nested_under(member, property_path)
        })
    }
}
