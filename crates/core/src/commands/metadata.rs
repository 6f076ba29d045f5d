use super::context::ExecutionContext;
use super::error::{CommandOutcome, CommandResult};
use super::modifier::ModifierDeclaration;
use super::node::ParameterTree;
use serde::Serialize;
use std::sync::Arc;

/// The body of a command.
pub trait CommandExecutor: Send + Sync {
    fn parameters(&self) -> ParameterTree {
        ParameterTree::new()
    }

    fn execute(&self, ctx: &mut ExecutionContext) -> CommandResult<CommandOutcome>;
}

struct FnExecutor<F>(F);

impl<F> CommandExecutor for FnExecutor<F>
where
    F: Fn(&mut ExecutionContext) -> CommandResult<CommandOutcome> + Send + Sync,
{
    fn execute(&self, ctx: &mut ExecutionContext) -> CommandResult<CommandOutcome> {
        (self.0)(ctx)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EssentialsEquivalent {
    pub commands: Vec<String>,
    pub is_exact: bool,
    pub notes: Option<String>,
}

/// Everything a module declares about one command.
pub struct CommandDescriptor {
    pub(crate) module: String,
    pub(crate) aliases: Vec<String>,
    pub(crate) parent: Option<String>,
    pub(crate) permission: Option<String>,
    pub(crate) modifiers: Vec<ModifierDeclaration>,
    pub(crate) is_async: bool,
    pub(crate) prefix_aliases: bool,
    pub(crate) modifier_key: Option<String>,
    pub(crate) essentials_equivalent: Option<EssentialsEquivalent>,
    pub(crate) notify_if_afk: Vec<String>,
    pub(crate) description: Option<String>,
    pub(crate) player_only: bool,
    pub(crate) parameters: Option<ParameterTree>,
    pub(crate) executor: Option<Arc<dyn CommandExecutor>>,
}

impl CommandDescriptor {
    /// `aliases` may carry a sigil: `#alias` is always registered at the
    /// root level, `$alias` too but disabled until enabled in config.
    pub fn new<S: Into<String>>(module: &str, aliases: impl IntoIterator<Item = S>) -> Self {
        Self {
            module: module.to_string(),
            aliases: aliases.into_iter().map(Into::into).collect(),
            parent: None,
            permission: None,
            modifiers: Vec::new(),
            is_async: false,
            prefix_aliases: true,
            modifier_key: None,
            essentials_equivalent: None,
            notify_if_afk: Vec::new(),
            description: None,
            player_only: false,
            parameters: None,
            executor: None,
        }
    }

    /// Makes this a sub-command of the command with key `parent`.
    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    pub fn modifier(mut self, modifier: ModifierDeclaration) -> Self {
        self.modifiers.push(modifier);
        self
    }

    /// Runs the executor on a worker thread.
    pub fn run_async(mut self) -> Self {
        self.is_async = true;
        self
    }

    /// Do not add prefixed copies (e.g. `nhome`) of root aliases.
    pub fn no_prefix_aliases(mut self) -> Self {
        self.prefix_aliases = false;
        self
    }

    /// Read modifier settings from, and share cooldowns with, another
    /// command key.
    pub fn modifier_key(mut self, key: impl Into<String>) -> Self {
        self.modifier_key = Some(key.into());
        self
    }

    pub fn essentials_equivalent<S: Into<String>>(
        mut self,
        commands: impl IntoIterator<Item = S>,
        is_exact: bool,
        notes: Option<&str>,
    ) -> Self {
        self.essentials_equivalent = Some(EssentialsEquivalent {
            commands: commands.into_iter().map(Into::into).collect(),
            is_exact,
            notes: notes.map(str::to_string),
        });
        self
    }

    /// After a successful run, tell the source if the subject bound to
    /// `argument` is away.
    pub fn notify_if_afk(mut self, argument: impl Into<String>) -> Self {
        self.notify_if_afk.push(argument.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn player_only(mut self) -> Self {
        self.player_only = true;
        self
    }

    pub fn parameters(mut self, parameters: ParameterTree) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn executes<F>(self, executor: F) -> Self
    where
        F: Fn(&mut ExecutionContext) -> CommandResult<CommandOutcome> + Send + Sync + 'static,
    {
        self.executor(FnExecutor(executor))
    }

    pub fn executor(mut self, executor: impl CommandExecutor + 'static) -> Self {
        self.executor = Some(Arc::new(executor));
        self
    }

    pub(crate) fn primary_alias(&self) -> Option<String> {
        self.aliases
            .iter()
            .map(|alias| strip_sigil(alias).1.trim().to_lowercase())
            .find(|alias| !alias.is_empty())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandMetadata {
    pub module: String,
    /// Parent keys and the primary alias joined by `.`, e.g. `home.clear`.
    pub command_key: String,
    /// Where modifier settings and cooldowns are kept. Usually the command key.
    pub modifier_key: String,
    pub parent: Option<String>,
    pub primary_alias: String,
    pub root_aliases: Vec<String>,
    pub sub_aliases: Vec<String>,
    pub disabled_by_default: Vec<String>,
    pub permission: Option<String>,
    pub is_async: bool,
    pub player_only: bool,
    pub essentials_equivalent: Option<EssentialsEquivalent>,
    pub notify_if_afk: Vec<String>,
    pub description: Option<String>,
}

impl CommandMetadata {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub(crate) fn from_descriptor(
        descriptor: &CommandDescriptor,
        primary_alias: String,
        prefix: &str,
    ) -> Self {
        let command_key = match &descriptor.parent {
            Some(parent) => format!("{}.{}", parent, primary_alias),
            None => primary_alias.clone(),
        };
        let prefix = (descriptor.prefix_aliases && !prefix.is_empty()).then_some(prefix);
        let aliases = resolve_aliases(&descriptor.aliases, descriptor.parent.is_none(), prefix);

        Self {
            module: descriptor.module.clone(),
            modifier_key: descriptor
                .modifier_key
                .clone()
                .unwrap_or_else(|| command_key.clone()),
            command_key,
            parent: descriptor.parent.clone(),
            primary_alias,
            root_aliases: aliases.root,
            sub_aliases: aliases.sub,
            disabled_by_default: aliases.disabled_by_default,
            permission: descriptor.permission.clone(),
            is_async: descriptor.is_async,
            player_only: descriptor.player_only,
            essentials_equivalent: descriptor.essentials_equivalent.clone(),
            notify_if_afk: descriptor.notify_if_afk.clone(),
            description: descriptor.description.clone(),
        }
    }

    /// All root-level aliases with whether each is enabled by default.
    pub fn root_alias_defaults(&self) -> Vec<(String, bool)> {
        self.root_aliases
            .iter()
            .map(|alias| (alias.clone(), true))
            .chain(
                self.disabled_by_default
                    .iter()
                    .map(|alias| (alias.clone(), false)),
            )
            .collect()
    }
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct ResolvedAliases {
    pub root: Vec<String>,
    pub sub: Vec<String>,
    pub disabled_by_default: Vec<String>,
}

fn strip_sigil(alias: &str) -> (Option<char>, &str) {
    match alias.chars().next() {
        Some(sigil @ ('#' | '$')) => (Some(sigil), &alias[1..]),
        _ => (None, alias),
    }
}

fn push_unique(aliases: &mut Vec<String>, alias: String) {
    if !aliases.contains(&alias) {
        aliases.push(alias);
    }
}

/// Sorts declared aliases into root, sub-command and disabled lists,
/// lowercasing them and adding prefixed copies of root-level ones.
pub(crate) fn resolve_aliases(
    aliases: &[String],
    is_root: bool,
    prefix: Option<&str>,
) -> ResolvedAliases {
    let mut resolved = ResolvedAliases::default();

    for alias in aliases {
        let (sigil, name) = strip_sigil(alias);
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            continue;
        }

        let target = match sigil {
            Some('$') => &mut resolved.disabled_by_default,
            Some(_) => &mut resolved.root,
            None if is_root => &mut resolved.root,
            None => {
                push_unique(&mut resolved.sub, name);
                continue;
            }
        };
        if let Some(prefix) = prefix {
            let prefixed = format!("{}{}", prefix, name);
            push_unique(target, name);
            push_unique(target, prefixed);
        } else {
            push_unique(target, name);
        }
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn root_aliases_get_prefixed_copies() {
        let resolved = resolve_aliases(&strings(&["Home", "$homes"]), true, Some("n"));
        assert_eq!(resolved.root, ["home", "nhome"]);
        assert_eq!(resolved.disabled_by_default, ["homes", "nhomes"]);
        assert!(resolved.sub.is_empty());
    }

    #[test]
    fn sub_command_aliases_stay_local_unless_promoted() {
        let resolved = resolve_aliases(&strings(&["clear", "#clearhomes"]), false, Some("n"));
        assert_eq!(resolved.sub, ["clear"]);
        assert_eq!(resolved.root, ["clearhomes", "nclearhomes"]);
    }

    #[test]
    fn command_keys_follow_parents() {
        let descriptor = CommandDescriptor::new("home", ["clear", "reset"]).parent("home");
        let metadata = CommandMetadata::from_descriptor(&descriptor, "clear".to_string(), "n");
        assert_eq!(metadata.command_key, "home.clear");
        assert_eq!(metadata.modifier_key, "home.clear");
        assert_eq!(metadata.sub_aliases, ["clear", "reset"]);

        let descriptor = CommandDescriptor::new("home", ["homeother"]).modifier_key("home");
        let metadata = CommandMetadata::from_descriptor(&descriptor, "homeother".to_string(), "n");
        assert_eq!(metadata.command_key, "homeother");
        assert_eq!(metadata.modifier_key, "home");
    }
}
