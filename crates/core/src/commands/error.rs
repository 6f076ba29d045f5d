use crate::services::Services;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Permission denied: {permission}")]
    PermissionDenied { permission: String },
    #[error("This command can only be executed by players")]
    PlayerOnly,
    #[error("{key}")]
    Localized { key: String, args: Vec<String> },
    #[error("{0}")]
    Message(String),
}

#[derive(Debug, Error)]
pub enum InternalError {
    #[error(
        "Internal error: Argument '{name}' not found in ArgumentSet (command registration bug)"
    )]
    MissingArgument { name: String },
    #[error("Internal error: Argument '{name}' has wrong type, expected {expected} (command registration bug)")]
    WrongArgumentType { name: String, expected: String },
    #[error("Internal error (bug): {message}")]
    Message { message: String },
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl CommandError {
    pub fn runtime(message: impl Into<String>) -> Self {
        CommandError::Runtime(RuntimeError::Message(message.into()))
    }

    pub fn localized(key: impl Into<String>, args: impl IntoIterator<Item = String>) -> Self {
        CommandError::Runtime(RuntimeError::Localized {
            key: key.into(),
            args: args.into_iter().collect(),
        })
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CommandError::Internal(InternalError::Message {
            message: message.into(),
        })
    }
}

impl RuntimeError {
    /// Renders the error for the subject that ran the command.
    pub fn describe(&self, services: &Services) -> String {
        match self {
            RuntimeError::PermissionDenied { .. } => services.message("command.nopermission", &[]),
            RuntimeError::PlayerOnly => services.message("command.playeronly", &[]),
            RuntimeError::Localized { key, args } => services.message(key, args),
            RuntimeError::Message(message) => message.clone(),
        }
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

/// The three ways a command invocation can end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Success,
    Fail(String),
    /// The command was accepted and finishes later, e.g. after a warmup or on
    /// a worker thread.
    WillContinue,
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandOutcome::Success)
    }
}

/// Raised while the command table is being built. Fatal to startup.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Command '{command}' declares no aliases")]
    NoAliases { command: String },
    #[error("Command '{command}' is registered twice")]
    DuplicateCommand { command: String },
    #[error("Root alias '{alias}' is claimed by both '{first}' and '{second}'")]
    DuplicateAlias {
        alias: String,
        first: String,
        second: String,
    },
    #[error("Sub-command alias '{alias}' of '{parent}' is claimed by both '{first}' and '{second}'")]
    DuplicateSubAlias {
        alias: String,
        parent: String,
        first: String,
        second: String,
    },
    #[error("Command '{command}' names unknown parent '{parent}'")]
    UnknownParent { command: String, parent: String },
    #[error("Command '{command}' uses unknown modifier '{modifier}'")]
    UnknownModifier { command: String, modifier: String },
    #[error("Modifier '{modifier}' on command '{command}' is invalid: {reason}")]
    InvalidModifier {
        command: String,
        modifier: String,
        reason: String,
    },
    #[error("Modifier '{0}' is already registered")]
    DuplicateModifier(String),
    #[error("Command config entry '{key}' is not a table")]
    ConfigNotATable { key: String },
}
