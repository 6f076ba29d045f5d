use crate::commands::error::{CommandResult, InternalError};
use crate::services::SubjectRef;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub enum Value {
    String(String),
    Integer(i32),
    Float(f64),
    Boolean(bool),
    Choice(String),
    GreedyString(String),
    Timespan(Duration),
    Subject(SubjectRef),
    /// Produced by parameter types defined outside this crate.
    Custom(Arc<dyn Any + Send + Sync>),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.debug_tuple("String").field(s).finish(),
            Value::Integer(i) => f.debug_tuple("Integer").field(i).finish(),
            Value::Float(v) => f.debug_tuple("Float").field(v).finish(),
            Value::Boolean(b) => f.debug_tuple("Boolean").field(b).finish(),
            Value::Choice(s) => f.debug_tuple("Choice").field(s).finish(),
            Value::GreedyString(s) => f.debug_tuple("GreedyString").field(s).finish(),
            Value::Timespan(d) => f.debug_tuple("Timespan").field(d).finish(),
            Value::Subject(subject) => f.debug_tuple("Subject").field(&subject.name()).finish(),
            Value::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl Value {
    fn wrong_type(&self, expected: &str) -> InternalError {
        InternalError::WrongArgumentType {
            name: format!("{:?}", self),
            expected: expected.to_string(),
        }
    }

    pub fn as_string(&self) -> CommandResult<&String> {
        match self {
            Value::String(s) | Value::GreedyString(s) | Value::Choice(s) => Ok(s),
            _ => Err(self.wrong_type("string").into()),
        }
    }

    pub fn as_integer(&self) -> CommandResult<i32> {
        match self {
            Value::Integer(i) => Ok(*i),
            _ => Err(self.wrong_type("integer").into()),
        }
    }

    pub fn as_float(&self) -> CommandResult<f64> {
        match self {
            Value::Float(f) => Ok(*f),
            Value::Integer(i) => Ok(*i as f64),
            _ => Err(self.wrong_type("float").into()),
        }
    }

    pub fn as_boolean(&self) -> CommandResult<bool> {
        match self {
            Value::Boolean(b) => Ok(*b),
            _ => Err(self.wrong_type("boolean").into()),
        }
    }

    pub fn as_timespan(&self) -> CommandResult<Duration> {
        match self {
            Value::Timespan(d) => Ok(*d),
            _ => Err(self.wrong_type("timespan").into()),
        }
    }

    pub fn as_subject(&self) -> CommandResult<&SubjectRef> {
        match self {
            Value::Subject(subject) => Ok(subject),
            _ => Err(self.wrong_type("subject").into()),
        }
    }

    pub fn as_custom<T: Any + Send + Sync>(&self) -> CommandResult<Arc<T>> {
        match self {
            Value::Custom(value) => Arc::clone(value)
                .downcast::<T>()
                .map_err(|_| self.wrong_type(std::any::type_name::<T>()).into()),
            _ => Err(self.wrong_type(std::any::type_name::<T>()).into()),
        }
    }
}
