use crate::commands::error::{CommandResult, InternalError};
use crate::commands::value::Value;
use crate::services::SubjectRef;
use indexmap::IndexMap;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

/// Values bound while parsing, in binding order.
#[derive(Debug, Clone, Default)]
pub struct ArgumentSet {
    args: IndexMap<String, Value>,
}

impl ArgumentSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(super) fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.args.insert(name.into(), value);
    }

    /// Drops everything bound after `len` entries. Used to roll back a
    /// failed parse attempt.
    pub(super) fn truncate(&mut self, len: usize) {
        self.args.truncate(len);
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn has(&self, name: &str) -> bool {
        self.args.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.args.keys().map(String::as_str)
    }

    pub fn get_optional(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }

    fn get(&self, name: &str) -> CommandResult<&Value> {
        self.args.get(name).ok_or_else(|| {
            InternalError::MissingArgument {
                name: name.to_string(),
            }
            .into()
        })
    }

    pub fn get_string(&self, name: &str) -> CommandResult<String> {
        Ok(self.get(name)?.as_string()?.clone())
    }

    pub fn get_integer(&self, name: &str) -> CommandResult<i32> {
        self.get(name)?.as_integer()
    }

    pub fn get_float(&self, name: &str) -> CommandResult<f64> {
        self.get(name)?.as_float()
    }

    pub fn get_boolean(&self, name: &str) -> CommandResult<bool> {
        self.get(name)?.as_boolean()
    }

    pub fn get_timespan(&self, name: &str) -> CommandResult<Duration> {
        self.get(name)?.as_timespan()
    }

    pub fn get_subject(&self, name: &str) -> CommandResult<SubjectRef> {
        Ok(Arc::clone(self.get(name)?.as_subject()?))
    }

    pub fn get_custom<T: Any + Send + Sync>(&self, name: &str) -> CommandResult<Arc<T>> {
        self.get(name)?.as_custom()
    }

    pub fn get_optional_string(&self, name: &str) -> Option<String> {
        self.args
            .get(name)
            .and_then(|value| value.as_string().ok())
            .cloned()
    }

    pub fn get_optional_subject(&self, name: &str) -> Option<SubjectRef> {
        self.args
            .get(name)
            .and_then(|value| value.as_subject().ok())
            .cloned()
    }

    /// Whether a boolean flag was given. Value flags count as present
    /// whenever they are bound.
    pub fn has_flag(&self, name: &str) -> bool {
        match self.args.get(name) {
            Some(Value::Boolean(set)) => *set,
            Some(_) => true,
            None => false,
        }
    }
}
