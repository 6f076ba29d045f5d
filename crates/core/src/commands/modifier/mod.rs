mod cooldown;
mod cost;
mod level;
mod warmup;

pub use cooldown::CooldownModifier;
pub use cost::CostModifier;
pub use level::PermissionLevelModifier;
pub use warmup::WarmupModifier;

use crate::commands::context::ExecutionContext;
use crate::commands::control::CommandControl;
use crate::config::CoreConfig;
use crate::services::{Services, Subject};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use toml_edit::Table;

pub mod ids {
    pub const PERMISSION_LEVEL: &str = "permission_level";
    pub const COOLDOWN: &str = "cooldown";
    pub const WARMUP: &str = "warmup";
    pub const COST: &str = "cost";
}

pub mod priority {
    pub const PERMISSION_LEVEL: i32 = 10;
    pub const COOLDOWN: i32 = 20;
    pub const WARMUP: i32 = 30;
    /// Used by modifiers that do not pick a priority.
    pub const DEFAULT: i32 = 50;
    pub const COST: i32 = 100;
}

/// Result of a modifier's pre-execution check.
#[derive(Debug, Clone, PartialEq)]
pub enum PreCheck {
    Continue,
    /// Stop with this message.
    Deny(String),
    /// Resume the pipeline after the delay, at the next modifier.
    Delay(Duration),
}

/// Values seeded into every [`ExecutionContext`] of a command, read from
/// its config section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModifierSettings {
    pub cooldown: Duration,
    pub warmup: Duration,
    pub cost: f64,
}

/// A pluggable pre/post-execution step.
///
/// Modifiers run in ascending [`CommandModifier::priority`]. Every
/// modifier whose `pre_check` returned `Continue` later receives exactly
/// one of `on_completion` (the command succeeded) or `on_failure` (it
/// failed, was denied further down the chain, or its warmup was cancelled).
pub trait CommandModifier: Send + Sync {
    fn id(&self) -> &str;

    fn priority(&self) -> i32 {
        priority::DEFAULT
    }

    /// Adds this modifier's default keys to a command's config section.
    /// Existing values must be left alone.
    fn default_config(&self, _section: &mut Table) {}

    fn configure(&mut self, _section: &Table, _settings: &mut ModifierSettings) {}

    fn applies_to(&self, _services: &Services, _source: &dyn Subject) -> bool {
        true
    }

    fn pre_check(&self, ctx: &mut ExecutionContext, control: &CommandControl) -> PreCheck;

    fn on_completion(&self, _ctx: &mut ExecutionContext, _control: &CommandControl) {}

    fn on_failure(&self, _ctx: &mut ExecutionContext, _control: &CommandControl) {}
}

/// Builds a fresh modifier instance for one command.
pub type ModifierFactory =
    Arc<dyn Fn(&ModifierDeclaration) -> Result<Box<dyn CommandModifier>, String> + Send + Sync>;

/// A command's request for a modifier, with per-command options.
#[derive(Debug, Clone, PartialEq)]
pub struct ModifierDeclaration {
    pub id: String,
    pub exempt_permission: Option<String>,
    pub options: BTreeMap<String, String>,
}

impl ModifierDeclaration {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            exempt_permission: None,
            options: BTreeMap::new(),
        }
    }

    pub fn cooldown() -> Self {
        Self::new(ids::COOLDOWN)
    }

    pub fn warmup() -> Self {
        Self::new(ids::WARMUP)
    }

    pub fn cost() -> Self {
        Self::new(ids::COST)
    }

    /// Checks the subject bound to argument `target` against the source.
    pub fn permission_level(target: &str) -> Self {
        Self::new(ids::PERMISSION_LEVEL).with_option("target", target)
    }

    pub fn exempt(mut self, permission: impl Into<String>) -> Self {
        self.exempt_permission = Some(permission.into());
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    pub fn bool_option(&self, key: &str, default: bool) -> Result<bool, String> {
        match self.option(key) {
            None => Ok(default),
            Some(value) => value
                .parse()
                .map_err(|_| format!("option '{}' must be true or false, got '{}'", key, value)),
        }
    }
}

type FactoryResult = Result<Box<dyn CommandModifier>, String>;

fn permission_level(declaration: &ModifierDeclaration) -> FactoryResult {
    Ok(Box::new(PermissionLevelModifier::from_declaration(declaration)?))
}

fn cooldown(_: &ModifierDeclaration) -> FactoryResult {
    Ok(Box::new(CooldownModifier))
}

fn cost(declaration: &ModifierDeclaration) -> FactoryResult {
    Ok(Box::new(CostModifier::from_declaration(declaration)?))
}

pub(crate) fn builtin_factories(config: &CoreConfig) -> Vec<(&'static str, ModifierFactory)> {
    let cancel_on_move = config.warmup_cancel_on_move;
    let cancel_on_command = config.warmup_cancel_on_command;
    let warmup = move |_: &ModifierDeclaration| -> FactoryResult {
        Ok(Box::new(WarmupModifier::new(cancel_on_move, cancel_on_command)))
    };

    vec![
        (ids::PERMISSION_LEVEL, Arc::new(permission_level) as ModifierFactory),
        (ids::COOLDOWN, Arc::new(cooldown) as ModifierFactory),
        (ids::WARMUP, Arc::new(warmup) as ModifierFactory),
        (ids::COST, Arc::new(cost) as ModifierFactory),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_priorities_are_ordered() {
        let config = CoreConfig::default();
        let priorities = builtin_factories(&config)
            .into_iter()
            .map(|(id, factory)| {
                let modifier = factory(&ModifierDeclaration::new(id)).unwrap();
                (modifier.id().to_string(), modifier.priority())
            })
            .collect::<Vec<_>>();

        assert_eq!(
            priorities,
            [
                ("permission_level".to_string(), 10),
                ("cooldown".to_string(), 20),
                ("warmup".to_string(), 30),
                ("cost".to_string(), 100),
            ]
        );
    }

    #[test]
    fn malformed_options_are_rejected() {
        let declaration = ModifierDeclaration::cost().with_option("refund_on_deny", "sometimes");
        assert!(CostModifier::from_declaration(&declaration).is_err());
        assert!(declaration.bool_option("missing", true).unwrap());
    }
}
