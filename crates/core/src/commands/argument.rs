use super::argument_parser::TokenStream;
use super::argument_set::ArgumentSet;
use super::value::Value;
use crate::services::{Services, SubjectRef};
use nucleus_utils::parse_timespan;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    #[error("not enough arguments")]
    Missing,
    #[error("{key}")]
    Invalid { key: String, args: Vec<String> },
}

impl ArgumentError {
    pub fn invalid<S: Into<String>>(key: &str, args: impl IntoIterator<Item = S>) -> Self {
        ArgumentError::Invalid {
            key: key.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

pub type ArgumentParseResult = Result<Value, ArgumentError>;

/// Completion candidates, produced on demand so callers can stop early.
pub type Completions<'a> = Box<dyn Iterator<Item = String> + 'a>;

/// What a parameter type or requirement can see while a command line is
/// being parsed.
pub struct ParseScope<'a> {
    pub source: &'a SubjectRef,
    pub services: &'a Services,
    pub arguments: &'a ArgumentSet,
}

impl ParseScope<'_> {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.services.has_permission(self.source.as_ref(), permission)
    }
}

/// A parsing strategy for one argument.
pub trait ParameterType: Send + Sync {
    fn parse(&self, tokens: &mut TokenStream, scope: &ParseScope<'_>) -> ArgumentParseResult;

    /// Candidates for a partially typed argument. The caller filters by
    /// prefix and stops pulling once it has enough.
    fn complete<'a>(&'a self, _partial: &'a str, _scope: &ParseScope<'_>) -> Completions<'a> {
        Box::new(std::iter::empty())
    }

    fn usage(&self, key: &str) -> String {
        format!("<{key}>")
    }
}

#[derive(Clone)]
pub enum ArgumentType {
    String,
    Integer { min: i32, max: i32 },
    Float { min: f64, max: f64 },
    Boolean,
    Choice { choices: Vec<String> },
    GreedyString,
    Timespan,
}

fn next_token(tokens: &mut TokenStream) -> Result<String, ArgumentError> {
    tokens
        .next()
        .map(|token| token.text.clone())
        .ok_or(ArgumentError::Missing)
}

fn parse_boolean(token: &str) -> Option<bool> {
    match token.to_lowercase().as_str() {
        "true" | "yes" | "on" => Some(true),
        "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl ParameterType for ArgumentType {
    fn parse(&self, tokens: &mut TokenStream, _scope: &ParseScope<'_>) -> ArgumentParseResult {
        match self {
            ArgumentType::String => Ok(Value::String(next_token(tokens)?)),
            ArgumentType::Integer { min, max } => {
                let token = next_token(tokens)?;
                let value = token
                    .parse::<i32>()
                    .map_err(|_| ArgumentError::invalid("args.integer.invalid", [token.as_str()]))?;
                if !(*min..=*max).contains(&value) {
                    return Err(ArgumentError::invalid(
                        "args.integer.range",
                        [value.to_string(), min.to_string(), max.to_string()],
                    ));
                }
                Ok(Value::Integer(value))
            }
            ArgumentType::Float { min, max } => {
                let token = next_token(tokens)?;
                let value = token
                    .parse::<f64>()
                    .ok()
                    .filter(|value| value.is_finite())
                    .ok_or_else(|| ArgumentError::invalid("args.float.invalid", [token.as_str()]))?;
                if !(*min..=*max).contains(&value) {
                    return Err(ArgumentError::invalid(
                        "args.float.range",
                        [value.to_string(), min.to_string(), max.to_string()],
                    ));
                }
                Ok(Value::Float(value))
            }
            ArgumentType::Boolean => {
                let token = next_token(tokens)?;
                parse_boolean(&token)
                    .map(Value::Boolean)
                    .ok_or_else(|| ArgumentError::invalid("args.boolean.invalid", [token]))
            }
            ArgumentType::Choice { choices } => {
                let token = next_token(tokens)?;
                choices
                    .iter()
                    .find(|choice| choice.eq_ignore_ascii_case(&token))
                    .map(|choice| Value::Choice(choice.clone()))
                    .ok_or_else(|| {
                        ArgumentError::invalid("args.choice.invalid", [token, choices.join(", ")])
                    })
            }
            ArgumentType::GreedyString => {
                if !tokens.has_next() {
                    return Err(ArgumentError::Missing);
                }
                Ok(Value::GreedyString(tokens.consume_rest()))
            }
            ArgumentType::Timespan => {
                let token = next_token(tokens)?;
                parse_timespan(&token)
                    .map(Value::Timespan)
                    .ok_or_else(|| ArgumentError::invalid("args.timespan.invalid", [token]))
            }
        }
    }

    fn complete<'a>(&'a self, _partial: &'a str, _scope: &ParseScope<'_>) -> Completions<'a> {
        match self {
            ArgumentType::Boolean => Box::new(["true", "false"].into_iter().map(str::to_string)),
            ArgumentType::Choice { choices } => Box::new(choices.iter().cloned()),
            _ => Box::new(std::iter::empty()),
        }
    }

    fn usage(&self, key: &str) -> String {
        match self {
            ArgumentType::GreedyString => format!("<{key}...>"),
            ArgumentType::Choice { choices } if choices.len() <= 4 => {
                format!("<{}>", choices.join("|"))
            }
            _ => format!("<{key}>"),
        }
    }
}

impl ArgumentType {
    pub fn string() -> Self {
        ArgumentType::String
    }

    pub fn integer(min: i32, max: i32) -> Self {
        ArgumentType::Integer { min, max }
    }

    pub fn float(min: f64, max: f64) -> Self {
        ArgumentType::Float { min, max }
    }

    pub fn boolean() -> Self {
        ArgumentType::Boolean
    }

    pub fn choice<S: Into<String>>(choices: impl IntoIterator<Item = S>) -> Self {
        ArgumentType::Choice {
            choices: choices.into_iter().map(Into::into).collect(),
        }
    }

    pub fn greedy_string() -> Self {
        ArgumentType::GreedyString
    }

    pub fn timespan() -> Self {
        ArgumentType::Timespan
    }
}

/// Resolves player names for [`SubjectArgument`].
pub trait SubjectLookup: Send + Sync {
    fn find(&self, name: &str) -> Option<SubjectRef>;

    /// Names of online players, in a stable order.
    fn online_names(&self) -> Completions<'_>;
}

#[derive(Clone)]
pub struct SubjectArgument {
    lookup: Arc<dyn SubjectLookup>,
}

impl SubjectArgument {
    pub fn new(lookup: Arc<dyn SubjectLookup>) -> Self {
        Self { lookup }
    }
}

impl ParameterType for SubjectArgument {
    fn parse(&self, tokens: &mut TokenStream, _scope: &ParseScope<'_>) -> ArgumentParseResult {
        let name = next_token(tokens)?;
        self.lookup
            .find(&name)
            .map(Value::Subject)
            .ok_or_else(|| ArgumentError::invalid("args.subject.notfound", [name]))
    }

    fn complete<'a>(&'a self, _partial: &'a str, _scope: &ParseScope<'_>) -> Completions<'a> {
        self.lookup.online_names()
    }
}

/// A `-f`/`--force` style switch, optionally carrying a value.
#[derive(Clone)]
pub struct FlagSpec {
    pub(super) short: Option<char>,
    pub(super) long: String,
    pub(super) description: Option<String>,
    pub(super) permission: Option<String>,
    pub(super) value: Option<Arc<dyn ParameterType>>,
}

impl FlagSpec {
    pub fn new(short: impl Into<OptionChar>, long: &str) -> Self {
        Self {
            short: short.into().0,
            long: long.to_string(),
            description: None,
            permission: None,
            value: None,
        }
    }

    pub fn describe(mut self, description: impl Into<OptionString>) -> Self {
        self.description = description.into().0;
        self
    }

    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    pub fn value(mut self, parser: impl ParameterType + 'static) -> Self {
        self.value = Some(Arc::new(parser));
        self
    }

    pub(super) fn matches_long(&self, name: &str) -> bool {
        self.long.eq_ignore_ascii_case(name)
    }
}

pub struct OptionChar(Option<char>);

pub struct OptionString(Option<String>);

impl From<char> for OptionChar {
    fn from(c: char) -> Self {
        OptionChar(Some(c))
    }
}

impl From<Option<char>> for OptionChar {
    fn from(o: Option<char>) -> Self {
        OptionChar(o)
    }
}

impl From<&str> for OptionString {
    fn from(s: &str) -> Self {
        OptionString(Some(s.to_string()))
    }
}

impl From<Option<&str>> for OptionString {
    fn from(o: Option<&str>) -> Self {
        OptionString(o.map(|s| s.to_string()))
    }
}
