//! Ready-made modifiers

use crate::context::{Context, Refinement};
use crate::modifier::{modifier, Modifier};
use serde_json::Value;
use std::rc::Rc;
use std::time::Duration;

/// Merge a JSON object into the context.
///
/// Anything other than an object is handed to the continuation as is, which
/// rejects it with a `ContextTypeError`.
pub fn define(values: Value) -> Modifier {
    let values = Rc::new(values);
    modifier(move |ctx: Context, next| {
        let refinement = match &*values {
            Value::Object(map) => Refinement::Context(ctx.merged(map)),
            other => Refinement::Record(other.clone()),
        };
        next.run(refinement)
    })
}

/// Set a single context key.
pub fn set(key: impl Into<String>, value: impl Into<Value>) -> Modifier {
    let key: String = key.into();
    let value: Value = value.into();
    modifier(move |ctx: Context, next| next.run(ctx.with(key.clone(), value.clone())))
}

/// Put a deadline on every case below.
pub fn timeout(limit: Duration) -> Modifier {
    modifier(move |ctx: Context, next| next.run(ctx.with_timeout(limit)))
}
