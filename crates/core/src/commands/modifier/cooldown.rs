use super::{ids, priority, CommandModifier, ModifierSettings, PreCheck};
use crate::commands::context::ExecutionContext;
use crate::commands::control::CommandControl;
use crate::services::{clamp_delay, Services, Subject};
use nucleus_utils::time_string;
use std::time::Duration;
use toml_edit::{value, Item, Table};

/// Refuses to run a command again until its cooldown has passed. The
/// cooldown starts only when the command succeeds.
pub struct CooldownModifier;

impl CommandModifier for CooldownModifier {
    fn id(&self) -> &str {
        ids::COOLDOWN
    }

    fn priority(&self) -> i32 {
        priority::COOLDOWN
    }

    fn default_config(&self, section: &mut Table) {
        section.entry("cooldown").or_insert(value(0));
    }

    fn configure(&mut self, section: &Table, settings: &mut ModifierSettings) {
        if let Some(seconds) = section.get("cooldown").and_then(Item::as_integer) {
            settings.cooldown = clamp_delay(Duration::from_secs(seconds.max(0) as u64));
        }
    }

    fn applies_to(&self, _services: &Services, source: &dyn Subject) -> bool {
        source.is_player()
    }

    fn pre_check(&self, ctx: &mut ExecutionContext, control: &CommandControl) -> PreCheck {
        let cooldowns = ctx.services().cooldowns();
        match cooldowns.get_cooldown(control.modifier_key(), ctx.source().id()) {
            Some(remaining) => PreCheck::Deny(ctx.message("cooldown.message", &[time_string(remaining)])),
            None => PreCheck::Continue,
        }
    }

    fn on_completion(&self, ctx: &mut ExecutionContext, control: &CommandControl) {
        if ctx.cooldown().is_zero() {
            return;
        }
        ctx.services()
            .cooldowns()
            .set_cooldown(control.modifier_key(), ctx.source().id(), ctx.cooldown());
    }
}
