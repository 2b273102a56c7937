//! Rule evaluation.
//!
//! Both execution paths share one routine, [`PropertyRule::execute`]. The
//! [`ExecutionMode`] decides how suspend-capable steps are resolved: the
//! blocking mode completes every step inline (blocking on async conditions and
//! validators when the bridge allows it), the cooperative mode awaits them and
//! honours cancellation. Because nothing suspends in blocking mode, the
//! synchronous driver polls the routine exactly once.

use super::PropertyRule;
use crate::condition::AsyncCondition;
use crate::context::{PropertyContext, ValidationContext};
use crate::error::{Result, RuleError, ValidationFailure};
use crate::lazy::LazyValue;
use crate::options::{AsyncBridge, CascadeMode};
use crate::validator::RuleComponent;
use futures::task::ArcWake;
use futures_util::FutureExt;
use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread::Thread;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy)]
pub(crate) enum ExecutionMode<'c> {
    /// Synchronous evaluation on the calling thread.
    Blocking,
    /// Asynchronous evaluation with a cancellation signal.
    Cooperative(&'c CancellationToken),
}

impl ExecutionMode<'_> {
    fn is_cooperative(self) -> bool {
        matches!(self, ExecutionMode::Cooperative(_))
    }

    fn ensure_active(self, property_path: &str) -> Result<()> {
        match self {
            ExecutionMode::Cooperative(cancel) if cancel.is_cancelled() => {
                tracing::debug!(property = %property_path, "Rule evaluation cancelled");
                Err(RuleError::Cancelled)
            }
            _ => Ok(()),
        }
    }
}

impl<T, P> PropertyRule<T, P>
where
    T: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    pub(super) fn run_blocking(&self, ctx: &ValidationContext<T>) -> Result<Vec<ValidationFailure>> {
        self.execute(ctx, ExecutionMode::Blocking)
            .now_or_never()
            .unwrap_or_else(|| {
                Err(RuleError::InvalidUsage(
                    "synchronous rule evaluation suspended".to_string(),
                ))
            })
    }

    pub(super) async fn execute(
        &self,
        ctx: &ValidationContext<T>,
        mode: ExecutionMode<'_>,
    ) -> Result<Vec<ValidationFailure>> {
        if mode.is_cooperative() {
            ctx.root_data().mark_async();
        }

        let display_name = self.display_name(ctx);
        let property_path = ctx
            .property_chain()
            .build_property_path(self.property_name.as_deref().unwrap_or(&display_name));

        if !ctx.selector().can_execute(self, &property_path, ctx.scope()) {
            tracing::trace!(property = %property_path, "Rule skipped by selector");
            return Ok(Vec::new());
        }

        if let Some(condition) = &self.condition {
            if !condition.check(ctx) {
                tracing::trace!(property = %property_path, "Rule skipped by condition");
                return Ok(Vec::new());
            }
        }

        if let Some(condition) = &self.async_condition {
            if !self
                .check_async_condition(condition, ctx, mode, &property_path)
                .await?
            {
                tracing::trace!(property = %property_path, "Rule skipped by async condition");
                return Ok(Vec::new());
            }
        }

        let value = LazyValue::new(ctx.instance(), self.accessor.as_ref());
        let cascade = self.cascade_mode();
        let mut failures = Vec::new();

        for component in &self.components {
            mode.ensure_active(&property_path)?;

            let property_ctx = PropertyContext::new(ctx, &property_path, &display_name, &value);
            let produced = self
                .invoke_component(component, &property_ctx, mode)
                .await?;
            let failed = !produced.is_empty();
            failures.extend(produced);

            if failed && cascade == CascadeMode::StopOnFirstFailure {
                tracing::trace!(
                    property = %property_path,
                    validator = component.validator().name(),
                    "Cascade stopped after failure"
                );
                break;
            }
        }

        if !failures.is_empty() {
            if let Some(callback) = &self.on_failure {
                callback(ctx.instance(), &failures);
            }
            return Ok(failures);
        }

        for rule in &self.dependent_rules {
            let produced = match mode {
                ExecutionMode::Blocking => rule.validate(ctx)?,
                ExecutionMode::Cooperative(cancel) => {
                    mode.ensure_active(&property_path)?;
                    rule.validate_async(ctx, cancel).await?
                }
            };
            failures.extend(produced);
        }

        Ok(failures)
    }

    async fn invoke_component(
        &self,
        component: &RuleComponent<T, P>,
        property_ctx: &PropertyContext<'_, T, P>,
        mode: ExecutionMode<'_>,
    ) -> Result<Vec<ValidationFailure>> {
        let ctx = property_ctx.parent();
        let property_path = property_ctx.property_path();
        let validator = component.validator();

        if let Some(condition) = component.condition() {
            if !condition.check(ctx) {
                tracing::trace!(
                    property = %property_path,
                    validator = validator.name(),
                    "Validator skipped by condition"
                );
                return Ok(Vec::new());
            }
        }

        if let Some(condition) = component.async_condition() {
            if !self
                .check_async_condition(condition, ctx, mode, property_path)
                .await?
            {
                tracing::trace!(
                    property = %property_path,
                    validator = validator.name(),
                    "Validator skipped by async condition"
                );
                return Ok(Vec::new());
            }
        }

        let produced = match mode {
            ExecutionMode::Blocking if validator.should_validate_async(ctx) => {
                let never = CancellationToken::new();
                self.block_on(
                    "validator",
                    property_path,
                    validator.validate_async(property_ctx, &never),
                )??
            }
            ExecutionMode::Blocking => validator.validate(property_ctx)?,
            ExecutionMode::Cooperative(cancel) => {
                if validator.should_validate_async(ctx) {
                    validator.validate_async(property_ctx, cancel).await?
                } else {
                    validator.validate(property_ctx)?
                }
            }
        };

        Ok(component.decorate(produced))
    }

    async fn check_async_condition(
        &self,
        condition: &AsyncCondition<T>,
        ctx: &ValidationContext<T>,
        mode: ExecutionMode<'_>,
        property_path: &str,
    ) -> Result<bool> {
        match mode {
            ExecutionMode::Blocking => {
                let never = CancellationToken::new();
                self.block_on("condition", property_path, condition.check(ctx, &never))
            }
            ExecutionMode::Cooperative(cancel) => Ok(condition.check(ctx, cancel).await),
        }
    }

    /// Resolve an async step from the synchronous path.
    fn block_on<F: Future>(
        &self,
        kind: &'static str,
        property_path: &str,
        future: F,
    ) -> Result<F::Output> {
        match self.options.bridge() {
            AsyncBridge::Block => {
                tracing::debug!(
                    property = %property_path,
                    kind,
                    "Blocking on async step in synchronous validation"
                );
                Ok(block_in_place(future))
            }
            AsyncBridge::Reject => Err(RuleError::AsyncInSyncPath {
                property: property_path.to_string(),
                kind,
            }),
        }
    }
}

/// Block the current thread on `future`.
///
/// A nested synchronous evaluation (an async validator that calls `validate`
/// on another rule) already runs inside an executor, where
/// `futures::executor::block_on` refuses to start. Such futures are polled
/// in place instead, parking the thread between wake-ups.
fn block_in_place<F: Future>(future: F) -> F::Output {
    match futures::executor::enter() {
        Ok(guard) => {
            drop(guard);
            futures::executor::block_on(future)
        }
        Err(_) => {
            tracing::trace!("Executor already entered, polling in place");
            park_on(future)
        }
    }
}

struct ThreadWaker(Thread);

impl ArcWake for ThreadWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.0.unpark();
    }
}

fn park_on<F: Future>(future: F) -> F::Output {
    let mut future = std::pin::pin!(future);
    let waker = futures::task::waker(Arc::new(ThreadWaker(std::thread::current())));
    let mut cx = Context::from_waker(&waker);
    loop {
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(output) => return output,
            Poll::Pending => std::thread::park(),
        }
    }
}
