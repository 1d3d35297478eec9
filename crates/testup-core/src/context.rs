//! Execution context handed down the tree
//!
//! A [`Context`] is an immutable JSON record plus an optional deadline. Every
//! "mutation" returns a new context; passing one down the tree clones a
//! pointer.

use crate::fault::ContextTypeError;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    values: Rc<Map<String, Value>>,
    timeout: Option<Duration>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Deserialize the value stored under `key`.
    ///
    /// Returns `None` when the key is absent or has an incompatible shape.
    pub fn value<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// A copy of this context with `key` set to `value`.
    pub fn with(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut values = (*self.values).clone();
        values.insert(key.into(), value.into());
        Self {
            values: Rc::new(values),
            timeout: self.timeout,
        }
    }

    /// A copy of this context with every entry of `extra` merged on top.
    pub fn merged(&self, extra: &Map<String, Value>) -> Self {
        let mut values = (*self.values).clone();
        for (key, value) in extra {
            values.insert(key.clone(), value.clone());
        }
        Self {
            values: Rc::new(values),
            timeout: self.timeout,
        }
    }

    /// A copy of this context carrying a deadline for the cases below it.
    pub fn with_timeout(&self, limit: Duration) -> Self {
        Self {
            values: Rc::clone(&self.values),
            timeout: Some(limit),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl From<Map<String, Value>> for Context {
    fn from(values: Map<String, Value>) -> Self {
        Self {
            values: Rc::new(values),
            timeout: None,
        }
    }
}

/// What a modifier hands to its continuation.
#[derive(Debug, Clone, Default)]
pub enum Refinement {
    /// Reuse the incoming context
    #[default]
    Inherit,
    /// Replace the record; must be a JSON object
    Record(Value),
    /// A fully formed context
    Context(Context),
}

impl Refinement {
    /// Resolve against the context the modifier received.
    ///
    /// A record replaces the incoming values but keeps its deadline.
    pub fn apply(self, incoming: &Context) -> Result<Context, ContextTypeError> {
        match self {
            Refinement::Inherit => Ok(incoming.clone()),
            Refinement::Context(ctx) => Ok(ctx),
            Refinement::Record(Value::Object(values)) => Ok(Context {
                values: Rc::new(values),
                timeout: incoming.timeout,
            }),
            Refinement::Record(other) => Err(ContextTypeError {
                found: type_name(&other),
            }),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl From<()> for Refinement {
    fn from(_: ()) -> Self {
        Refinement::Inherit
    }
}

impl From<Value> for Refinement {
    fn from(value: Value) -> Self {
        Refinement::Record(value)
    }
}

impl From<Map<String, Value>> for Refinement {
    fn from(values: Map<String, Value>) -> Self {
        Refinement::Record(Value::Object(values))
    }
}

impl From<Context> for Refinement {
    fn from(ctx: Context) -> Self {
        Refinement::Context(ctx)
    }
}

impl From<Option<Value>> for Refinement {
    fn from(value: Option<Value>) -> Self {
        value.map_or(Refinement::Inherit, Refinement::Record)
    }
}
