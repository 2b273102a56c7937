//! Memoized property read for a single rule evaluation.

use std::fmt;
use std::sync::{Arc, OnceLock};

/// Reads a property value from an instance.
pub type ValueAccessor<T, P> = Arc<dyn Fn(&T) -> P + Send + Sync>;

/// Reads the property on first access and keeps the result for the rest of
/// the evaluation.
///
/// The first read is authoritative: later changes to the instance are not
/// observed by validators of the same evaluation.
pub struct LazyValue<'a, T, P> {
    instance: &'a T,
    read: &'a (dyn Fn(&T) -> P + Send + Sync),
    value: OnceLock<P>,
}

impl<'a, T, P> LazyValue<'a, T, P> {
    pub fn new(instance: &'a T, read: &'a (dyn Fn(&T) -> P + Send + Sync)) -> Self {
        Self {
            instance,
            read,
            value: OnceLock::new(),
        }
    }

    pub fn get(&self) -> &P {
        self.value.get_or_init(|| (self.read)(self.instance))
    }

    pub fn is_loaded(&self) -> bool {
        self.value.get().is_some()
    }
}

impl<T, P: fmt::Debug> fmt::Debug for LazyValue<'_, T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyValue")
            .field("value", &self.value.get())
            .finish()
    }
}
