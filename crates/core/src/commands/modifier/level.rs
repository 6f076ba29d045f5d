use super::{ids, priority, CommandModifier, ModifierDeclaration, ModifierSettings, PreCheck};
use crate::commands::context::ExecutionContext;
use crate::commands::control::CommandControl;
use toml_edit::{value, Item, Table};

/// Stops a subject from targeting someone of an equal or higher
/// permission level.
pub struct PermissionLevelModifier {
    target: String,
    same_level: bool,
}

impl PermissionLevelModifier {
    pub fn from_declaration(declaration: &ModifierDeclaration) -> Result<Self, String> {
        Ok(Self {
            target: declaration.option("target").unwrap_or("player").to_string(),
            same_level: declaration.bool_option("same_level", false)?,
        })
    }
}

impl CommandModifier for PermissionLevelModifier {
    fn id(&self) -> &str {
        ids::PERMISSION_LEVEL
    }

    fn priority(&self) -> i32 {
        priority::PERMISSION_LEVEL
    }

    fn default_config(&self, section: &mut Table) {
        section
            .entry("can_affect_same_level")
            .or_insert(value(self.same_level));
    }

    fn configure(&mut self, section: &Table, _settings: &mut ModifierSettings) {
        if let Some(same_level) = section.get("can_affect_same_level").and_then(Item::as_bool) {
            self.same_level = same_level;
        }
    }

    fn pre_check(&self, ctx: &mut ExecutionContext, _control: &CommandControl) -> PreCheck {
        let Some(target) = ctx.args().get_optional_subject(&self.target) else {
            return PreCheck::Continue;
        };
        if ctx.is_permission_level_okay(target.as_ref(), self.same_level) {
            PreCheck::Continue
        } else {
            PreCheck::Deny(ctx.message(
                "command.modifiers.level.insufficient",
                &[target.name().to_string()],
            ))
        }
    }
}
