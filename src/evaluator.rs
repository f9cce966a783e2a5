use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use serde_json::Value as JsonValue;
use tokio::sync::oneshot;

use crate::config::EvaluateOptions;
use crate::evaluate::{eval_expr, panic_message, Scope};
use crate::operators::OperatorRegistry;
use crate::{Context, EvalError, Expr, Outcome, Value};

/// An evaluation session: an operator registry plus the guarded entry points.
///
/// Cloning is cheap and clones share the registry, so an `Evaluator` can be
/// handed to as many tasks or threads as needed.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    registry: Arc<OperatorRegistry>,
}

impl Evaluator {
    #[must_use]
    pub fn new(registry: OperatorRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// A session holding the built-in domain operators on the system clock.
    #[must_use]
    pub fn with_builtins() -> Self {
        Self::new(OperatorRegistry::with_builtins())
    }

    #[must_use]
    pub fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }

    /// Evaluate on the calling thread, without a deadline.
    ///
    /// The depth guard and the per-call operator overlay still apply.
    ///
    /// # Errors
    ///
    /// Only in strict mode; otherwise failures are folded into the [`Outcome`].
    pub fn evaluate_sync(
        &self,
        expr: &Expr,
        ctx: &Context,
        options: &EvaluateOptions,
    ) -> Result<Outcome, EvalError> {
        let started = Instant::now();
        let result = check_depth(expr, options).and_then(|()| {
            let scope = Scope::new(&self.registry, options.operators.as_ref());
            eval_expr(expr, ctx, scope)
        });
        finish(result, started, options)
    }

    /// Evaluate on a detached worker thread, racing the walk against
    /// `options.timeout`.
    ///
    /// A walk that misses the deadline keeps its thread until it returns;
    /// its result is dropped. Nothing joins that thread, so shutting the
    /// runtime down never waits on it. Must be called from within a Tokio
    /// runtime.
    ///
    /// # Errors
    ///
    /// Only in strict mode; otherwise failures are folded into the [`Outcome`].
    pub async fn evaluate(
        &self,
        expr: &Expr,
        ctx: &Context,
        options: &EvaluateOptions,
    ) -> Result<Outcome, EvalError> {
        let started = Instant::now();
        if let Err(err) = check_depth(expr, options) {
            return finish(Err(err), started, options);
        }

        let result = match self.spawn_walk(expr, ctx, options) {
            Ok(reply) => match tokio::time::timeout(options.timeout, reply).await {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => Err(EvalError::Unknown {
                    message: "evaluation thread exited without a result".to_owned(),
                }),
                Err(_) => Err(EvalError::Timeout {
                    timeout: options.timeout,
                }),
            },
            Err(err) => Err(EvalError::Unknown {
                message: format!("failed to start evaluation thread: {err}"),
            }),
        };
        finish(result, started, options)
    }

    fn spawn_walk(
        &self,
        expr: &Expr,
        ctx: &Context,
        options: &EvaluateOptions,
    ) -> std::io::Result<oneshot::Receiver<Result<Value, EvalError>>> {
        let (reply, receiver) = oneshot::channel();
        let registry = Arc::clone(&self.registry);
        let overlay = options.operators.clone();
        let expr = expr.clone();
        let ctx = ctx.clone();

        thread::Builder::new()
            .name("qualify-eval".to_owned())
            .spawn(move || {
                let walk = panic::catch_unwind(AssertUnwindSafe(|| {
                    eval_expr(&expr, &ctx, Scope::new(&registry, overlay.as_ref()))
                }));
                let result = walk.unwrap_or_else(|payload| {
                    Err(EvalError::operator(
                        "evaluate",
                        panic_message(payload.as_ref()),
                    ))
                });
                // The caller has gone when the deadline already fired.
                let _ = reply.send(result);
            })?;
        Ok(receiver)
    }

    /// Evaluate a raw JSON rule against raw JSON data, synchronously.
    ///
    /// # Errors
    ///
    /// Only in strict mode. A `null` or malformed rule is
    /// [`EvalError::InvalidRule`]; data that is not an object is
    /// [`EvalError::InvalidData`].
    pub fn evaluate_json_sync(
        &self,
        rule: &JsonValue,
        data: &JsonValue,
        options: &EvaluateOptions,
    ) -> Result<Outcome, EvalError> {
        match prepare(rule, data) {
            Ok((expr, ctx)) => self.evaluate_sync(&expr, &ctx, options),
            Err(err) => finish(Err(err), Instant::now(), options),
        }
    }

    /// Guarded variant of [`evaluate_json_sync`](Self::evaluate_json_sync).
    ///
    /// # Errors
    ///
    /// Only in strict mode.
    pub async fn evaluate_json(
        &self,
        rule: &JsonValue,
        data: &JsonValue,
        options: &EvaluateOptions,
    ) -> Result<Outcome, EvalError> {
        match prepare(rule, data) {
            Ok((expr, ctx)) => self.evaluate(&expr, &ctx, options).await,
            Err(err) => finish(Err(err), Instant::now(), options),
        }
    }

    /// Evaluate independent pairs concurrently. Results come back in input
    /// order regardless of completion order.
    pub async fn evaluate_many(
        &self,
        pairs: Vec<(Expr, Context)>,
        options: &EvaluateOptions,
    ) -> Vec<Result<Outcome, EvalError>> {
        let handles: Vec<_> = pairs
            .into_iter()
            .map(|(expr, ctx)| {
                let evaluator = self.clone();
                let options = options.clone();
                tokio::spawn(async move { evaluator.evaluate(&expr, &ctx, &options).await })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join) => finish(
                    Err(EvalError::Unknown {
                        message: join.to_string(),
                    }),
                    Instant::now(),
                    options,
                ),
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}

/// Reject expressions deeper than the configured maximum before any operator runs.
fn check_depth(expr: &Expr, options: &EvaluateOptions) -> Result<(), EvalError> {
    let depth = expr.depth();
    if depth > options.max_depth {
        return Err(EvalError::MaxDepthExceeded {
            depth,
            max: options.max_depth,
        });
    }
    Ok(())
}

fn prepare(rule: &JsonValue, data: &JsonValue) -> Result<(Expr, Context), EvalError> {
    let expr = Expr::from_json(rule)?;
    let ctx = Context::from_json(data)?;
    Ok((expr, ctx))
}

fn finish(
    result: Result<Value, EvalError>,
    started: Instant,
    options: &EvaluateOptions,
) -> Result<Outcome, EvalError> {
    let elapsed = options.measure_time.then(|| started.elapsed());
    match result {
        Ok(value) => Ok(Outcome::success(value, elapsed)),
        Err(err) if options.strict => Err(err),
        Err(err) => {
            tracing::debug!(code = %err.code(), error = %err, "evaluation failed");
            Ok(Outcome::failure(err, elapsed))
        }
    }
}
