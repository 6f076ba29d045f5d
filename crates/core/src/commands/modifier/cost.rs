use super::{ids, priority, CommandModifier, ModifierDeclaration, ModifierSettings, PreCheck};
use crate::commands::context::ExecutionContext;
use crate::commands::control::CommandControl;
use crate::services::{Services, Subject};
use toml_edit::{value, Table};
use tracing::{error, warn};

/// Charges the command's cost up front and refunds it if the command does
/// not succeed.
pub struct CostModifier {
    refund_on_failure: bool,
}

impl CostModifier {
    pub fn from_declaration(declaration: &ModifierDeclaration) -> Result<Self, String> {
        Ok(Self {
            refund_on_failure: declaration.bool_option("refund_on_deny", true)?,
        })
    }

    fn refund(&self, ctx: &mut ExecutionContext) {
        let Some(amount) = ctx.take_charge() else {
            return;
        };
        let Some(economy) = ctx.services().economy() else {
            error!(
                "Could not return {} to {}: no economy is available",
                amount,
                ctx.source().name()
            );
            return;
        };
        match economy.refund(ctx.source().as_ref(), amount) {
            Ok(()) => ctx.reply_key("cost.refunded", &[economy.format_amount(amount)]),
            Err(err) => error!(
                "Could not return {} to {}: {:#}",
                amount,
                ctx.source().name(),
                err
            ),
        }
    }
}

impl CommandModifier for CostModifier {
    fn id(&self) -> &str {
        ids::COST
    }

    fn priority(&self) -> i32 {
        priority::COST
    }

    fn default_config(&self, section: &mut Table) {
        section.entry("cost").or_insert(value(0.0));
    }

    fn configure(&mut self, section: &Table, settings: &mut ModifierSettings) {
        let cost = section.get("cost").and_then(|item| {
            item.as_float()
                .or_else(|| item.as_integer().map(|cost| cost as f64))
        });
        if let Some(cost) = cost {
            settings.cost = cost.max(0.0);
        }
    }

    fn applies_to(&self, services: &Services, source: &dyn Subject) -> bool {
        source.is_player() && services.economy().is_some()
    }

    fn pre_check(&self, ctx: &mut ExecutionContext, _control: &CommandControl) -> PreCheck {
        let cost = ctx.cost();
        if cost <= 0.0 {
            return PreCheck::Continue;
        }
        // The economy can go away after the modifier was selected.
        let Some(economy) = ctx.services().economy() else {
            warn!(
                "Denying /{} to {}: no economy is available to charge {}",
                ctx.command(),
                ctx.source().name(),
                cost
            );
            return PreCheck::Deny(ctx.message("cost.nofunds", &[format!("{cost:.2}")]));
        };

        let charged = match economy.charge(ctx.source().as_ref(), cost) {
            Ok(charged) => charged,
            Err(err) => {
                warn!("Could not charge {} to {}: {:#}", cost, ctx.source().name(), err);
                false
            }
        };
        if !charged {
            return PreCheck::Deny(ctx.message("cost.nofunds", &[economy.format_amount(cost)]));
        }

        ctx.record_charge(cost);
        PreCheck::Continue
    }

    fn on_failure(&self, ctx: &mut ExecutionContext, _control: &CommandControl) {
        if self.refund_on_failure {
            self.refund(ctx);
        }
    }
}
