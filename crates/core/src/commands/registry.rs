use super::control::{BoundModifier, CommandControl};
use super::error::RegistrationError;
use super::interceptor::{CommandInterceptor, CommandLogInterceptor, InterceptorChain};
use super::metadata::{CommandDescriptor, CommandMetadata};
use super::modifier::{builtin_factories, CommandModifier, ModifierDeclaration, ModifierFactory, ModifierSettings};
use crate::config::CommandsConfig;
use crate::services::Services;
use indexmap::IndexMap;
use itertools::Itertools;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Collects command declarations, modifiers and interceptors, then builds
/// the immutable [`Dispatcher`].
pub struct CommandRegistry {
    services: Services,
    descriptors: Vec<CommandDescriptor>,
    modifier_factories: FxHashMap<String, ModifierFactory>,
    interceptors: Vec<Arc<dyn CommandInterceptor>>,
    custom_aliases: Vec<(String, String)>,
}

impl CommandRegistry {
    pub fn new(services: Services) -> Self {
        let modifier_factories = builtin_factories(services.config())
            .into_iter()
            .map(|(id, factory)| (id.to_string(), factory))
            .collect();
        let custom_aliases = services
            .config()
            .command_aliases
            .iter()
            .map(|(alias, replacement)| (alias.trim().to_string(), replacement.trim().to_string()))
            .collect();
        let mut interceptors: Vec<Arc<dyn CommandInterceptor>> = Vec::new();
        if services.config().log_commands {
            interceptors.push(Arc::new(CommandLogInterceptor));
        }

        Self {
            services,
            descriptors: Vec::new(),
            modifier_factories,
            interceptors,
            custom_aliases,
        }
    }

    pub fn register(&mut self, descriptor: CommandDescriptor) {
        self.descriptors.push(descriptor);
    }

    pub fn register_modifier<F>(&mut self, id: &str, factory: F) -> Result<(), RegistrationError>
    where
        F: Fn(&ModifierDeclaration) -> Result<Box<dyn CommandModifier>, String> + Send + Sync + 'static,
    {
        if self.modifier_factories.contains_key(id) {
            return Err(RegistrationError::DuplicateModifier(id.to_string()));
        }
        self.modifier_factories
            .insert(id.to_string(), Arc::new(factory));
        Ok(())
    }

    pub fn register_interceptor(&mut self, interceptor: impl CommandInterceptor + 'static) {
        self.interceptors.push(Arc::new(interceptor));
    }

    /// `prefix` is replaced by `replacement` at the start of a command line.
    /// A `{}` in the replacement marks where the rest of the line goes.
    pub fn add_custom_alias(&mut self, prefix: impl Into<String>, replacement: impl Into<String>) {
        self.custom_aliases
            .push((prefix.into(), replacement.into()));
    }

    /// Resolves every declaration into a command table. Defaults for each
    /// command are merged into `config` without overwriting existing values.
    pub fn build(self, config: &mut CommandsConfig) -> Result<Dispatcher, RegistrationError> {
        let prefix = self.services.config().command_prefix.clone();

        let mut entries: IndexMap<String, (CommandDescriptor, Arc<CommandMetadata>)> = IndexMap::new();
        for descriptor in self.descriptors {
            let Some(primary) = descriptor.primary_alias() else {
                return Err(RegistrationError::NoAliases {
                    command: format!("{}:{:?}", descriptor.module, descriptor.aliases),
                });
            };
            let metadata = CommandMetadata::from_descriptor(&descriptor, primary, &prefix);
            let key = metadata.command_key.clone();
            if entries.contains_key(&key) {
                return Err(RegistrationError::DuplicateCommand { command: key });
            }
            config.merge_command_defaults(&key, &metadata.root_alias_defaults())?;
            entries.insert(key, (descriptor, Arc::new(metadata)));
        }

        for (key, (_, metadata)) in &entries {
            if let Some(parent) = &metadata.parent {
                if !entries.contains_key(parent) {
                    return Err(RegistrationError::UnknownParent {
                        command: key.clone(),
                        parent: parent.clone(),
                    });
                }
            }
        }

        let enabled = |key: &str| {
            let mut current = Some(key.to_string());
            while let Some(key) = current {
                if !config.is_enabled(&key) {
                    return false;
                }
                current = entries
                    .get(&key)
                    .and_then(|(_, metadata)| metadata.parent.clone());
            }
            true
        };
        let enabled_keys = entries
            .keys()
            .filter(|key| enabled(key))
            .cloned()
            .collect::<Vec<_>>();

        let interceptors = InterceptorChain::new(self.interceptors);
        let mut built: FxHashMap<String, Arc<CommandControl>> = FxHashMap::default();
        let mut children: FxHashMap<String, FxHashMap<String, Arc<CommandControl>>> = FxHashMap::default();

        // Deepest first, so every parent sees its finished children.
        let by_depth = enabled_keys
            .iter()
            .sorted_by_key(|key| std::cmp::Reverse(key.matches('.').count()));
        for key in by_depth {
            let (descriptor, metadata) = &entries[key];

            let mut modifiers = Vec::new();
            let mut settings = ModifierSettings::default();
            for declaration in &descriptor.modifiers {
                let factory = self.modifier_factories.get(&declaration.id).ok_or_else(|| {
                    RegistrationError::UnknownModifier {
                        command: key.clone(),
                        modifier: declaration.id.clone(),
                    }
                })?;
                let mut modifier = factory(declaration).map_err(|reason| RegistrationError::InvalidModifier {
                    command: key.clone(),
                    modifier: declaration.id.clone(),
                    reason,
                })?;

                modifier.default_config(config.section_mut(&metadata.modifier_key)?);
                if let Some(section) = config.section(&metadata.modifier_key) {
                    modifier.configure(section, &mut settings);
                }

                let exempt_permission = declaration.exempt_permission.clone().or_else(|| {
                    metadata
                        .permission
                        .as_ref()
                        .map(|permission| format!("{}.exempt.{}", permission, declaration.id))
                });
                modifiers.push(BoundModifier {
                    modifier,
                    exempt_permission,
                });
            }
            modifiers.sort_by_key(|bound| bound.modifier.priority());

            let parameters = descriptor
                .parameters
                .clone()
                .or_else(|| descriptor.executor.as_ref().map(|executor| executor.parameters()))
                .unwrap_or_default();

            let control = Arc::new(CommandControl {
                metadata: Arc::clone(metadata),
                command: key.replace('.', " "),
                executor: descriptor.executor.clone(),
                parameters,
                modifiers,
                settings,
                children: children.remove(key).unwrap_or_default(),
                services: self.services.clone(),
                interceptors: interceptors.clone(),
            });

            if let Some(parent) = &metadata.parent {
                let siblings = children.entry(parent.clone()).or_default();
                for alias in &metadata.sub_aliases {
                    if let Some(existing) = siblings.get(alias) {
                        return Err(RegistrationError::DuplicateSubAlias {
                            alias: alias.clone(),
                            parent: parent.clone(),
                            first: existing.command_key().to_string(),
                            second: key.clone(),
                        });
                    }
                    siblings.insert(alias.clone(), Arc::clone(&control));
                }
            }
            built.insert(key.clone(), control);
        }

        let mut roots: FxHashMap<String, Arc<CommandControl>> = FxHashMap::default();
        let mut registered_aliases: FxHashMap<String, Vec<String>> = FxHashMap::default();
        let mut controls = IndexMap::new();
        for key in &enabled_keys {
            let control = Arc::clone(&built[key]);
            let metadata = control.metadata();
            for (alias, default) in metadata.root_alias_defaults() {
                if !config.root_alias_enabled(key, &alias, default) {
                    continue;
                }
                if let Some(existing) = roots.get(&alias) {
                    return Err(RegistrationError::DuplicateAlias {
                        alias,
                        first: existing.command_key().to_string(),
                        second: key.clone(),
                    });
                }
                roots.insert(alias.clone(), Arc::clone(&control));
                registered_aliases
                    .entry(key.clone())
                    .or_default()
                    .push(alias);
            }
            controls.insert(key.clone(), control);
        }

        for key in entries.keys().filter(|key| !enabled_keys.contains(key)) {
            debug!("Command '{}' is disabled", key);
        }
        for key in config.section_keys() {
            let known = entries.contains_key(&key)
                || entries
                    .values()
                    .any(|(_, metadata)| metadata.modifier_key == key);
            if !known {
                warn!("commands config has a section for unknown command '{}'", key);
            }
        }
        info!(
            "Registered {} commands under {} root aliases",
            controls.len(),
            roots.len()
        );

        Ok(Dispatcher {
            services: self.services,
            roots,
            controls,
            registered_aliases,
            custom_aliases: self.custom_aliases,
        })
    }
}

/// The finished, read-only command table.
pub struct Dispatcher {
    pub(super) services: Services,
    pub(super) roots: FxHashMap<String, Arc<CommandControl>>,
    pub(super) controls: IndexMap<String, Arc<CommandControl>>,
    pub(super) registered_aliases: FxHashMap<String, Vec<String>>,
    pub(super) custom_aliases: Vec<(String, String)>,
}

impl Dispatcher {
    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn control(&self, command_key: &str) -> Option<&Arc<CommandControl>> {
        self.controls.get(command_key)
    }

    pub fn controls(&self) -> impl Iterator<Item = &Arc<CommandControl>> {
        self.controls.values()
    }

    pub fn metadata(&self, command_key: &str) -> Option<&CommandMetadata> {
        self.controls.get(command_key).map(|control| control.metadata())
    }

    pub fn metadata_for_alias(&self, alias: &str) -> Option<&CommandMetadata> {
        self.roots
            .get(&alias.to_lowercase())
            .map(|control| control.metadata())
    }

    /// Root aliases actually registered for a command, in declaration order.
    pub fn registered_aliases(&self, command_key: &str) -> &[String] {
        self.registered_aliases
            .get(command_key)
            .map_or(&[], Vec::as_slice)
    }

    pub fn root_aliases(&self) -> Vec<&str> {
        self.roots.keys().map(String::as_str).sorted().collect()
    }

    pub fn get_custom_aliases(&self) -> &[(String, String)] {
        &self.custom_aliases
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::error::CommandOutcome;
    use crate::testing::TestServices;

    fn command(aliases: &[&str]) -> CommandDescriptor {
        CommandDescriptor::new("test", aliases.iter().copied())
            .executes(|_| Ok(CommandOutcome::Success))
    }

    #[test]
    fn aliases_are_registered_with_prefix() {
        let harness = TestServices::new();
        let mut registry = CommandRegistry::new(harness.services.clone());
        registry.register(command(&["home", "$homes"]));
        registry.register(command(&["clear"]).parent("home"));

        let mut config = CommandsConfig::in_memory();
        let dispatcher = registry.build(&mut config).unwrap();

        assert_eq!(dispatcher.registered_aliases("home"), ["home", "nhome"]);
        assert_eq!(dispatcher.metadata_for_alias("NHOME").unwrap().command_key, "home");
        assert!(dispatcher.metadata_for_alias("homes").is_none());
        assert!(dispatcher.metadata_for_alias("clear").is_none());
        assert_eq!(dispatcher.metadata("home.clear").unwrap().sub_aliases, ["clear"]);
        assert!(!config.root_alias_enabled("home", "homes", true));
    }

    #[test]
    fn duplicate_root_alias_is_fatal() {
        let harness = TestServices::new();
        let mut registry = CommandRegistry::new(harness.services.clone());
        registry.register(command(&["warp"]));
        registry.register(command(&["warps", "#warp"]).parent("warp").no_prefix_aliases());

        let result = registry.build(&mut CommandsConfig::in_memory());
        assert!(matches!(
            result,
            Err(RegistrationError::DuplicateAlias { alias, .. }) if alias == "warp"
        ));
    }

    #[test]
    fn unknown_modifier_and_parent_are_fatal() {
        let harness = TestServices::new();
        let mut registry = CommandRegistry::new(harness.services.clone());
        registry.register(command(&["spawn"]).modifier(ModifierDeclaration::new("teleport")));
        assert!(matches!(
            registry.build(&mut CommandsConfig::in_memory()),
            Err(RegistrationError::UnknownModifier { .. })
        ));

        let mut registry = CommandRegistry::new(harness.services.clone());
        registry.register(command(&["clear"]).parent("nothing"));
        assert!(matches!(
            registry.build(&mut CommandsConfig::in_memory()),
            Err(RegistrationError::UnknownParent { .. })
        ));
    }

    #[test]
    fn disabled_commands_are_not_registered() {
        let harness = TestServices::new();
        let mut registry = CommandRegistry::new(harness.services.clone());
        registry.register(command(&["fly"]));
        registry.register(command(&["speed"]));

        let mut config = CommandsConfig::parse("[fly]\nenabled = false\n").unwrap();
        let dispatcher = registry.build(&mut config).unwrap();
        assert!(dispatcher.control("fly").is_none());
        assert!(dispatcher.control("speed").is_some());
    }

    #[test]
    fn modifier_defaults_are_written_to_config() {
        let harness = TestServices::new();
        let mut registry = CommandRegistry::new(harness.services.clone());
        registry.register(
            command(&["kick"])
                .modifier(ModifierDeclaration::cooldown())
                .modifier(ModifierDeclaration::warmup()),
        );

        let mut config = CommandsConfig::parse("[kick]\ncooldown = 10\n").unwrap();
        let dispatcher = registry.build(&mut config).unwrap();

        let section = config.section("kick").unwrap();
        assert_eq!(section.get("cooldown").and_then(|item| item.as_integer()), Some(10));
        assert_eq!(section.get("warmup").and_then(|item| item.as_integer()), Some(0));
        assert_eq!(
            dispatcher.control("kick").unwrap().settings().cooldown,
            std::time::Duration::from_secs(10)
        );
    }
}
