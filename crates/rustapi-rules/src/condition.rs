//! Composable gates for rules and validators.
//!
//! A condition that evaluates to `false` silently skips the unit it guards;
//! it never produces a failure.

use crate::context::ValidationContext;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

type ConditionFn<T> = dyn Fn(&ValidationContext<T>) -> bool + Send + Sync;

type AsyncConditionFn<T> = dyn for<'a> Fn(&'a ValidationContext<T>, &'a CancellationToken) -> BoxFuture<'a, bool>
    + Send
    + Sync;

/// Which validators of a rule a condition is applied to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ApplyConditionTo {
    /// Every validator of the rule and every dependent rule.
    #[default]
    AllValidators,
    /// Only the most recently added validator.
    CurrentValidator,
}

/// Synchronous predicate over the validation context.
///
/// ```rust,ignore
/// let adult = Condition::new(|ctx: &ValidationContext<User>| ctx.instance().age >= 18);
/// let has_email = Condition::new(|ctx: &ValidationContext<User>| ctx.instance().email.is_some());
/// let both = adult.and(has_email);
/// ```
pub struct Condition<T> {
    predicate: Arc<ConditionFn<T>>,
}

impl<T> Clone for Condition<T> {
    fn clone(&self) -> Self {
        Self {
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl<T: 'static> Condition<T> {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&ValidationContext<T>) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
        }
    }

    pub fn check(&self, ctx: &ValidationContext<T>) -> bool {
        (self.predicate)(ctx)
    }

    /// Short-circuit AND: `other` is only checked when `self` passes.
    pub fn and(self, other: Condition<T>) -> Self {
        Self::new(move |ctx| self.check(ctx) && other.check(ctx))
    }

    pub fn negate(self) -> Self {
        Self::new(move |ctx| !self.check(ctx))
    }
}

impl<T> fmt::Debug for Condition<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Condition")
    }
}

/// Asynchronous predicate over the validation context.
///
/// ```rust,ignore
/// let not_banned = AsyncCondition::new(|ctx: &ValidationContext<User>, _cancel| {
///     async move { !ban_list.contains(&ctx.instance().id).await }.boxed()
/// });
/// ```
pub struct AsyncCondition<T> {
    predicate: Arc<AsyncConditionFn<T>>,
}

impl<T> Clone for AsyncCondition<T> {
    fn clone(&self) -> Self {
        Self {
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl<T: Send + Sync + 'static> AsyncCondition<T> {
    pub fn new<F>(predicate: F) -> Self
    where
        F: for<'a> Fn(&'a ValidationContext<T>, &'a CancellationToken) -> BoxFuture<'a, bool>
            + Send
            + Sync
            + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
        }
    }

    /// Lift a synchronous condition.
    pub fn from_sync(condition: Condition<T>) -> Self {
        Self::new(move |ctx, _cancel| {
            let passed = condition.check(ctx);
            async move { passed }.boxed()
        })
    }

    pub fn check<'a>(
        &'a self,
        ctx: &'a ValidationContext<T>,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, bool> {
        (self.predicate)(ctx, cancel)
    }

    /// Short-circuit AND: `other` is only awaited when `self` passes.
    pub fn and(self, other: AsyncCondition<T>) -> Self {
        Self::new(move |ctx, cancel| {
            let first = self.clone();
            let second = other.clone();
            async move { first.check(ctx, cancel).await && second.check(ctx, cancel).await }
                .boxed()
        })
    }

    pub fn negate(self) -> Self {
        Self::new(move |ctx, cancel| {
            let inner = self.clone();
            async move { !inner.check(ctx, cancel).await }.boxed()
        })
    }
}

impl<T> fmt::Debug for AsyncCondition<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AsyncCondition")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(result: bool, calls: &Arc<AtomicUsize>) -> Condition<i32> {
        let calls = Arc::clone(calls);
        Condition::new(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            result
        })
    }

    #[test]
    fn and_narrows() {
        let ctx = ValidationContext::new(20);
        let positive = Condition::new(|ctx: &ValidationContext<i32>| *ctx.instance() > 0);
        let small = Condition::new(|ctx: &ValidationContext<i32>| *ctx.instance() < 10);

        assert!(positive.check(&ctx));
        assert!(!positive.clone().and(small.clone()).check(&ctx));
        assert!(positive.and(small.negate()).check(&ctx));
    }

    #[test]
    fn and_short_circuits() {
        let ctx = ValidationContext::new(1);
        let calls = Arc::new(AtomicUsize::new(0));
        let combined = Condition::new(|_: &ValidationContext<i32>| false).and(counting(true, &calls));

        assert!(!combined.check(&ctx));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn async_and_short_circuits() {
        let ctx = ValidationContext::new(5);
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let rejecting = AsyncCondition::new(|_: &ValidationContext<i32>, _: &CancellationToken| {
            async { false }.boxed()
        });
        let combined = rejecting.and(AsyncCondition::from_sync(counting(true, &calls)));

        assert!(!combined.check(&ctx, &cancel).await);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn async_condition_reads_context() {
        let ctx = ValidationContext::new(5);
        let cancel = CancellationToken::new();
        let odd = AsyncCondition::new(|ctx: &ValidationContext<i32>, _: &CancellationToken| {
            async move { *ctx.instance() % 2 == 1 }.boxed()
        });

        assert!(odd.check(&ctx, &cancel).await);
        assert!(!odd.negate().check(&ctx, &cancel).await);
    }
}
