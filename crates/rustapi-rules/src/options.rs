//! Defaults shared by every rule built against the same options.
//!
//! Options are injected into rules at construction time as an
//! `Arc<ValidatorOptions>` instead of living in global state, so tests can run
//! side by side with different configurations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Whether the remaining validators of a rule run after the first failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeMode {
    /// Run every validator regardless of earlier failures.
    #[default]
    ContinueAlways,
    /// Stop after the first validator that produces a failure.
    StopOnFirstFailure,
}

impl CascadeMode {
    fn to_u8(self) -> u8 {
        match self {
            CascadeMode::ContinueAlways => 0,
            CascadeMode::StopOnFirstFailure => 1,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => CascadeMode::StopOnFirstFailure,
            _ => CascadeMode::ContinueAlways,
        }
    }
}

/// What the synchronous path does when it meets an async condition or
/// validator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AsyncBridge {
    /// Block the calling thread until the async operation completes.
    #[default]
    Block,
    /// Fail with [`RuleError::AsyncInSyncPath`](crate::RuleError::AsyncInSyncPath).
    Reject,
}

/// Maps a member name to the property name stored on a rule.
pub type PropertyNameResolver = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Maps a property name to a display name override, if any.
pub type DisplayNameResolver = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Plain-data subset of [`ValidatorOptions`] that can be loaded from config.
///
/// ```rust,ignore
/// let settings: ValidatorSettings = serde_json::from_str(r#"{"cascade_mode": "stop_on_first_failure"}"#)?;
/// let options = ValidatorOptions::from_settings(settings).shared();
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorSettings {
    pub cascade_mode: CascadeMode,
    pub async_bridge: AsyncBridge,
}

/// Defaults consulted by rules.
///
/// ```rust,ignore
/// use rustapi_rules::prelude::*;
///
/// let options = ValidatorOptions::new()
///     .default_cascade_mode(CascadeMode::StopOnFirstFailure)
///     .async_bridge(AsyncBridge::Reject)
///     .display_name_resolver(|name| (name == "dob").then(|| "Date of Birth".to_string()))
///     .shared();
/// ```
pub struct ValidatorOptions {
    /// Read on every evaluation of a rule without an explicit cascade mode.
    default_cascade: AtomicU8,
    async_bridge: AsyncBridge,
    property_name_resolver: PropertyNameResolver,
    display_name_resolver: DisplayNameResolver,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidatorOptions {
    /// Create options with the default values.
    ///
    /// Defaults:
    /// - Cascade: `ContinueAlways`
    /// - Async bridge: `Block`
    /// - Property names used as given
    /// - No display name overrides
    pub fn new() -> Self {
        Self {
            default_cascade: AtomicU8::new(CascadeMode::default().to_u8()),
            async_bridge: AsyncBridge::default(),
            property_name_resolver: Arc::new(|member| member.to_string()),
            display_name_resolver: Arc::new(|_| None),
        }
    }

    /// Create options from loaded settings.
    pub fn from_settings(settings: ValidatorSettings) -> Self {
        Self::new()
            .default_cascade_mode(settings.cascade_mode)
            .async_bridge(settings.async_bridge)
    }

    /// Set the cascade mode used by rules that do not set their own.
    pub fn default_cascade_mode(self, mode: CascadeMode) -> Self {
        self.default_cascade.store(mode.to_u8(), Ordering::Relaxed);
        self
    }

    /// Set the sync-path policy for async conditions and validators.
    pub fn async_bridge(mut self, bridge: AsyncBridge) -> Self {
        self.async_bridge = bridge;
        self
    }

    /// Set the resolver that turns a member name into a property name.
    pub fn property_name_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.property_name_resolver = Arc::new(resolver);
        self
    }

    /// Set the resolver that supplies display name overrides.
    pub fn display_name_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.display_name_resolver = Arc::new(resolver);
        self
    }

    /// Wrap the options for sharing between rules.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Current default cascade mode.
    pub fn cascade_mode(&self) -> CascadeMode {
        CascadeMode::from_u8(self.default_cascade.load(Ordering::Relaxed))
    }

    /// Change the default cascade mode on shared options.
    ///
    /// Rules without an explicit mode observe the change on their next
    /// evaluation.
    pub fn set_default_cascade(&self, mode: CascadeMode) {
        self.default_cascade.store(mode.to_u8(), Ordering::Relaxed);
    }

    pub fn bridge(&self) -> AsyncBridge {
        self.async_bridge
    }

    pub fn settings(&self) -> ValidatorSettings {
        ValidatorSettings {
            cascade_mode: self.cascade_mode(),
            async_bridge: self.async_bridge,
        }
    }

    pub fn resolve_property_name(&self, member: &str) -> String {
        (self.property_name_resolver)(member)
    }

    pub fn resolve_display_name(&self, property_name: &str) -> Option<String> {
        (self.display_name_resolver)(property_name)
    }
}

impl fmt::Debug for ValidatorOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorOptions")
            .field("cascade_mode", &self.cascade_mode())
            .field("async_bridge", &self.async_bridge)
            .finish_non_exhaustive()
    }
}

/// Split a member name into a human readable name.
///
/// Both `snake_case` and `PascalCase` are understood: `first_name` and
/// `FirstName` become `First Name`. Runs of capitals stay together
/// (`HTTPStatus` becomes `HTTP Status`).
pub fn split_property_name(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' || c.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .iter()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_snake_and_pascal_case() {
        assert_eq!(split_property_name("first_name"), "First Name");
        assert_eq!(split_property_name("FirstName"), "First Name");
        assert_eq!(split_property_name("firstName"), "First Name");
        assert_eq!(split_property_name("HTTPStatus"), "HTTP Status");
        assert_eq!(split_property_name("address_line2"), "Address Line2");
        assert_eq!(split_property_name("name"), "Name");
        assert_eq!(split_property_name(""), "");
    }

    #[test]
    fn default_options() {
        let options = ValidatorOptions::new();
        assert_eq!(options.cascade_mode(), CascadeMode::ContinueAlways);
        assert_eq!(options.bridge(), AsyncBridge::Block);
        assert_eq!(options.resolve_property_name("email"), "email");
        assert_eq!(options.resolve_display_name("email"), None);
    }

    #[test]
    fn shared_cascade_change_is_visible() {
        let options = ValidatorOptions::new().shared();
        let other = Arc::clone(&options);

        options.set_default_cascade(CascadeMode::StopOnFirstFailure);
        assert_eq!(other.cascade_mode(), CascadeMode::StopOnFirstFailure);
    }

    #[test]
    fn resolvers() {
        let options = ValidatorOptions::new()
            .property_name_resolver(|member| member.to_uppercase())
            .display_name_resolver(|name| (name == "DOB").then(|| "Date of Birth".to_string()));

        assert_eq!(options.resolve_property_name("dob"), "DOB");
        assert_eq!(
            options.resolve_display_name("DOB"),
            Some("Date of Birth".to_string())
        );
        assert_eq!(options.resolve_display_name("NAME"), None);
    }

    #[test]
    fn settings_deserialization() {
        let settings: ValidatorSettings =
            serde_json::from_str(r#"{"cascade_mode": "stop_on_first_failure"}"#).unwrap();
        assert_eq!(settings.cascade_mode, CascadeMode::StopOnFirstFailure);
        assert_eq!(settings.async_bridge, AsyncBridge::Block);

        let options = ValidatorOptions::from_settings(ValidatorSettings {
            cascade_mode: CascadeMode::StopOnFirstFailure,
            async_bridge: AsyncBridge::Reject,
        });
        assert_eq!(options.settings().async_bridge, AsyncBridge::Reject);
        assert_eq!(options.cascade_mode(), CascadeMode::StopOnFirstFailure);
    }
}
