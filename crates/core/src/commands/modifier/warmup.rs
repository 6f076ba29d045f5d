use super::{ids, priority, CommandModifier, ModifierSettings, PreCheck};
use crate::commands::context::ExecutionContext;
use crate::commands::control::CommandControl;
use crate::services::{clamp_delay, Services, Subject};
use nucleus_utils::time_string;
use std::time::Duration;
use toml_edit::{value, Item, Table};

/// Delays the rest of the pipeline. The delayed continuation itself is
/// owned by the [`CommandControl`].
pub struct WarmupModifier {
    cancel_on_move: bool,
    cancel_on_command: bool,
}

impl WarmupModifier {
    pub fn new(cancel_on_move: bool, cancel_on_command: bool) -> Self {
        Self {
            cancel_on_move,
            cancel_on_command,
        }
    }
}

impl CommandModifier for WarmupModifier {
    fn id(&self) -> &str {
        ids::WARMUP
    }

    fn priority(&self) -> i32 {
        priority::WARMUP
    }

    fn default_config(&self, section: &mut Table) {
        section.entry("warmup").or_insert(value(0));
    }

    fn configure(&mut self, section: &Table, settings: &mut ModifierSettings) {
        if let Some(seconds) = section.get("warmup").and_then(Item::as_integer) {
            settings.warmup = clamp_delay(Duration::from_secs(seconds.max(0) as u64));
        }
    }

    fn applies_to(&self, _services: &Services, source: &dyn Subject) -> bool {
        source.is_player()
    }

    fn pre_check(&self, ctx: &mut ExecutionContext, _control: &CommandControl) -> PreCheck {
        let warmup = ctx.warmup();
        if warmup.is_zero() {
            return PreCheck::Continue;
        }

        let mut message = ctx.message("warmup.start", &[time_string(warmup)]);
        let hint = match (self.cancel_on_move, self.cancel_on_command) {
            (true, true) => Some("warmup.both"),
            (true, false) => Some("warmup.onMove"),
            (false, true) => Some("warmup.onCommand"),
            (false, false) => None,
        };
        if let Some(hint) = hint {
            message.push(' ');
            message.push_str(&ctx.message(hint, &[]));
        }
        ctx.reply(&message);

        PreCheck::Delay(warmup)
    }
}
