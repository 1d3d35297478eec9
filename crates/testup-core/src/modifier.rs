//! Modifiers and continuation chains
//!
//! A modifier receives the incoming [`Context`] and a [`Next`] continuation.
//! It may do work before and after calling the continuation, hand it a
//! refined context, or drop it to skip everything it wraps.

use crate::context::{Context, Refinement};
use crate::fault::ContextTypeError;
use futures_util::future::{self, FutureExt, LocalBoxFuture};
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

type Step = LocalBoxFuture<'static, anyhow::Result<()>>;
type Continuation = Box<dyn FnOnce(Context) -> Step>;

/// Slot recording the first context rejected by any continuation of a chain.
pub(crate) type Rejection = Rc<RefCell<Option<ContextTypeError>>>;

#[derive(Clone)]
pub struct Modifier(Rc<dyn Fn(Context, Next) -> Step>);

impl Modifier {
    pub(crate) fn call(&self, ctx: Context, next: Next) -> Step {
        (self.0)(ctx, next)
    }
}

impl fmt::Debug for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Modifier(..)")
    }
}

/// Wrap an async function as a [`Modifier`].
///
/// ```ignore
/// let answer = modifier(|_, next| next.run(json!({ "n": 42 })));
/// ```
pub fn modifier<F, Fut>(f: F) -> Modifier
where
    F: Fn(Context, Next) -> Fut + 'static,
    Fut: Future<Output = anyhow::Result<()>> + 'static,
{
    Modifier(Rc::new(move |ctx, next| f(ctx, next).boxed_local()))
}

/// Continuation handed to a modifier. Consumed on use, so it runs at most
/// once; dropping it skips the wrapped units.
pub struct Next {
    inner: Continuation,
    incoming: Context,
    rejected: Rejection,
}

impl Next {
    /// Run the wrapped units with a refined context.
    ///
    /// Accepts `()` (keep the incoming context), a JSON object, or a
    /// [`Context`]. Anything else fails with a [`ContextTypeError`].
    pub fn run(self, refinement: impl Into<Refinement>) -> Step {
        match refinement.into().apply(&self.incoming) {
            Ok(ctx) => (self.inner)(ctx),
            Err(err) => {
                self.rejected.borrow_mut().get_or_insert_with(|| err.clone());
                future::ready(Err(err.into())).boxed_local()
            }
        }
    }

    /// Run the wrapped units with the incoming context.
    pub fn keep(self) -> Step {
        self.run(Refinement::Inherit)
    }

    /// The context this continuation was created with.
    pub fn context(&self) -> &Context {
        &self.incoming
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("incoming", &self.incoming)
            .finish_non_exhaustive()
    }
}

/// Fold `modifiers` right-to-left around `body`. The first modifier ends up
/// outermost. Nothing runs until the returned future is polled.
pub(crate) fn compose<B>(
    modifiers: Vec<Modifier>,
    incoming: Context,
    body: B,
    rejected: Rejection,
) -> Step
where
    B: FnOnce(Context) -> Step + 'static,
{
    tracing::trace!(steps = modifiers.len(), "composing modifier chain");

    let mut chain: Continuation = Box::new(body);
    for modifier in modifiers.into_iter().rev() {
        let inner = chain;
        let rejected = Rc::clone(&rejected);
        chain = Box::new(move |ctx: Context| {
            let next = Next {
                inner,
                incoming: ctx.clone(),
                rejected,
            };
            modifier.call(ctx, next)
        });
    }

    async move { chain(incoming).await }.boxed_local()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn tracer(log: &Rc<RefCell<Vec<String>>>, name: &'static str) -> Modifier {
        let log = Rc::clone(log);
        modifier(move |_, next| {
            let log = Rc::clone(&log);
            async move {
                log.borrow_mut().push(format!("{name}:before"));
                let result = next.keep().await;
                log.borrow_mut().push(format!("{name}:after"));
                result
            }
        })
    }

    fn recording_body(
        log: &Rc<RefCell<Vec<String>>>,
    ) -> impl FnOnce(Context) -> Step + 'static {
        let log = Rc::clone(log);
        move |ctx: Context| {
            log.borrow_mut()
                .push(format!("body:{}", ctx.value::<i64>("n").unwrap_or(-1)));
            future::ready(Ok(())).boxed_local()
        }
    }

    #[tokio::test]
    async fn test_first_modifier_is_outermost() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let chain = compose(
            vec![tracer(&log, "a"), tracer(&log, "b")],
            Context::new(),
            recording_body(&log),
            Rejection::default(),
        );
        chain.await.unwrap();
        assert_eq!(
            *log.borrow(),
            vec!["a:before", "b:before", "body:-1", "b:after", "a:after"]
        );
    }

    #[tokio::test]
    async fn test_refined_context_reaches_body() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let answer = modifier(|_, next| next.run(json!({ "n": 42 })));
        compose(
            vec![answer],
            Context::new(),
            recording_body(&log),
            Rejection::default(),
        )
        .await
        .unwrap();
        assert_eq!(*log.borrow(), vec!["body:42"]);
    }

    #[tokio::test]
    async fn test_dropped_continuation_skips_body() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let skip = modifier(|_, _next| async { Ok(()) });
        compose(
            vec![skip],
            Context::new(),
            recording_body(&log),
            Rejection::default(),
        )
        .await
        .unwrap();
        assert!(log.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_rejection_is_recorded_even_when_swallowed() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let rejected = Rejection::default();
        let swallow = modifier(|_, next| async move {
            let _ = next.run(json!(true)).await;
            Ok(())
        });
        compose(
            vec![swallow],
            Context::new(),
            recording_body(&log),
            Rc::clone(&rejected),
        )
        .await
        .unwrap();
        assert!(log.borrow().is_empty());
        assert_eq!(
            *rejected.borrow(),
            Some(ContextTypeError { found: "boolean" })
        );
    }

    #[tokio::test]
    async fn test_modifier_error_propagates() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let broken = modifier(|_, _next| async { Err(anyhow!("broken modifier")) });
        let err = compose(
            vec![broken],
            Context::new(),
            recording_body(&log),
            Rejection::default(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "broken modifier");
    }
}
