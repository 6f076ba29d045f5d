mod argument;
mod argument_parser;
mod argument_set;
mod autocomplete;
mod context;
mod control;
mod docgen;
mod error;
mod executor;
mod interceptor;
mod metadata;
pub mod modifier;
mod node;
mod parser;
mod registry;
mod usage;
mod value;

pub use argument::{
    ArgumentError, ArgumentParseResult, ArgumentType, Completions, FlagSpec, OptionChar,
    OptionString, ParameterType, ParseScope, SubjectArgument, SubjectLookup,
};
pub use argument_parser::{mark_position, tokenize, Token, TokenStream};
pub use argument_set::ArgumentSet;
pub use autocomplete::MAX_COMPLETIONS;
pub use context::ExecutionContext;
pub use control::CommandControl;
pub use docgen::CommandDoc;
pub use error::{
    CommandError, CommandOutcome, CommandResult, InternalError, RegistrationError, RuntimeError,
};
pub use interceptor::{AfkNotifyInterceptor, AfkTracker, CommandInterceptor, CommandLogInterceptor};
pub use metadata::{CommandDescriptor, CommandExecutor, CommandMetadata, EssentialsEquivalent};
pub use modifier::{CommandModifier, ModifierDeclaration, ModifierSettings, PreCheck};
pub use node::{NodeType, ParameterNode, ParameterTree, Requirement};
pub use parser::ParseError;
pub use registry::{CommandRegistry, Dispatcher};
pub use usage::{generate_flag_details, generate_usage};
pub use value::Value;
