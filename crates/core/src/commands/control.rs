use super::argument_parser::TokenStream;
use super::autocomplete::{self, matches_prefix, MAX_COMPLETIONS};
use super::context::ExecutionContext;
use super::error::{CommandError, CommandOutcome};
use super::interceptor::InterceptorChain;
use super::metadata::{CommandExecutor, CommandMetadata};
use super::modifier::{CommandModifier, ModifierSettings, PreCheck};
use super::node::ParameterTree;
use super::{parser, usage};
use crate::services::scheduler::TaskMode;
use crate::services::warmup::WarmupTask;
use crate::services::{clamp_delay, Services, Subject, SubjectRef};
use itertools::Itertools;
use nucleus_utils::parse_timespan;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

pub(super) struct BoundModifier {
    pub(super) modifier: Box<dyn CommandModifier>,
    pub(super) exempt_permission: Option<String>,
}

/// Indices into [`CommandControl::modifiers`] that apply to one invocation.
type ActiveModifiers = Arc<[usize]>;

/// One registered command: its metadata, parameters, configured modifiers
/// and sub-commands. Runs the execution pipeline.
pub struct CommandControl {
    pub(super) metadata: Arc<CommandMetadata>,
    pub(super) command: String,
    pub(super) executor: Option<Arc<dyn CommandExecutor>>,
    pub(super) parameters: ParameterTree,
    pub(super) modifiers: Vec<BoundModifier>,
    pub(super) settings: ModifierSettings,
    pub(super) children: FxHashMap<String, Arc<CommandControl>>,
    pub(super) services: Services,
    pub(super) interceptors: InterceptorChain,
}

impl CommandControl {
    pub fn metadata(&self) -> &CommandMetadata {
        &self.metadata
    }

    /// The full command path, e.g. `home clear`.
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn command_key(&self) -> &str {
        &self.metadata.command_key
    }

    pub fn modifier_key(&self) -> &str {
        &self.metadata.modifier_key
    }

    pub fn settings(&self) -> &ModifierSettings {
        &self.settings
    }

    pub fn parameters(&self) -> &ParameterTree {
        &self.parameters
    }

    pub fn modifier_ids(&self) -> Vec<&str> {
        self.modifiers
            .iter()
            .map(|bound| bound.modifier.id())
            .collect()
    }

    pub fn usage(&self) -> String {
        let parameters = usage::generate_usage(&self.parameters);
        if parameters.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, parameters)
        }
    }

    pub fn test_permission(&self, source: &dyn Subject) -> bool {
        match &self.metadata.permission {
            Some(permission) => self.services.has_permission(source, permission),
            None => true,
        }
    }

    fn permitted_children(&self, source: &dyn Subject) -> Vec<&str> {
        self.children
            .iter()
            .filter(|(_, child)| child.test_permission(source))
            .map(|(alias, _)| alias.as_str())
            .sorted()
            .collect()
    }

    pub(super) fn process(self: &Arc<Self>, source: SubjectRef, mut tokens: TokenStream) -> CommandOutcome {
        let next = tokens.peek().map(|token| token.text.to_lowercase());
        if let Some(child) = next.as_ref().and_then(|alias| self.children.get(alias)) {
            let child = Arc::clone(child);
            tokens.next();
            return child.process(source, tokens);
        }

        if !self.test_permission(source.as_ref()) {
            return CommandOutcome::Fail(self.services.message("command.nopermission", &[]));
        }
        if self.metadata.player_only && !source.is_player() {
            return CommandOutcome::Fail(self.services.message("command.playeronly", &[]));
        }
        if self.executor.is_none()
            || (tokens.remaining() == 1 && matches!(next.as_deref(), Some("help" | "?")))
        {
            return self.help(source.as_ref());
        }

        let active = self.select_modifiers(source.as_ref());
        let mut ctx = self.create_context(source);
        let raw = tokens.raw().to_string();
        let (source, services, arguments) = ctx.parse_parts();
        if let Err(err) = parser::parse(&self.parameters, source, services, arguments, tokens) {
            debug!("Could not parse /{}: {}", raw, err);
            return CommandOutcome::Fail(format!(
                "{}\n{}",
                err.describe(&self.services, &raw),
                self.services.message("command.usage", &[self.usage()])
            ));
        }

        self.run_modifiers(ctx, active, 0, false)
    }

    fn help(&self, source: &dyn Subject) -> CommandOutcome {
        let mut lines = vec![self.services.message("command.usage", &[self.usage()])];
        let children = self.permitted_children(source);
        if !children.is_empty() {
            lines.push(
                self.services
                    .message("command.subcommands", &[self.command.clone(), children.join(", ")]),
            );
        }
        lines.extend(
            usage::generate_flag_details(&self.parameters)
                .into_iter()
                .map(|detail| format!("  {}", detail)),
        );
        source.send_message(&lines.join("\n"));
        CommandOutcome::Success
    }

    fn select_modifiers(&self, source: &dyn Subject) -> ActiveModifiers {
        self.modifiers
            .iter()
            .enumerate()
            .filter(|(_, bound)| bound.modifier.applies_to(&self.services, source))
            .filter(|(_, bound)| {
                !bound
                    .exempt_permission
                    .as_deref()
                    .is_some_and(|permission| self.services.has_permission(source, permission))
            })
            .map(|(index, _)| index)
            .collect()
    }

    /// Seeds the context from config, then from per-subject permission
    /// options such as `nucleus.home.cooldown`.
    fn create_context(&self, source: SubjectRef) -> ExecutionContext {
        let base = format!("nucleus.{}", self.metadata.modifier_key);
        let option = |name: &str| {
            self.services
                .permission_option(source.as_ref(), &format!("{}.{}", base, name))
        };
        let cooldown = option("cooldown")
            .and_then(|value| parse_timespan(&value))
            .map(clamp_delay);
        let warmup = option("warmup")
            .and_then(|value| parse_timespan(&value))
            .map(clamp_delay);
        let cost = option("cost").and_then(|value| value.trim().parse::<f64>().ok());

        let mut ctx = ExecutionContext::new(
            source,
            self.services.clone(),
            self.command.clone(),
            &self.settings,
        );
        if let Some(cooldown) = cooldown {
            ctx.set_cooldown(cooldown);
        }
        if let Some(warmup) = warmup {
            ctx.set_warmup(warmup);
        }
        if let Some(cost) = cost.filter(|cost| *cost >= 0.0) {
            ctx.set_cost(cost);
        }
        ctx
    }

    /// Runs pre-checks from `start` onwards, then the executor. With
    /// `in_place`, the executor runs on the current thread even for async
    /// commands.
    fn run_modifiers(
        self: &Arc<Self>,
        mut ctx: ExecutionContext,
        active: ActiveModifiers,
        start: usize,
        in_place: bool,
    ) -> CommandOutcome {
        for position in start..active.len() {
            let bound = &self.modifiers[active[position]];
            match bound.modifier.pre_check(&mut ctx, self) {
                PreCheck::Continue => {}
                PreCheck::Deny(message) => {
                    debug!(
                        "Modifier '{}' denied /{} for {}",
                        bound.modifier.id(),
                        self.command,
                        ctx.source().name()
                    );
                    self.roll_back(&mut ctx, &active[..position]);
                    return CommandOutcome::Fail(message);
                }
                PreCheck::Delay(delay) => {
                    let source = Arc::clone(ctx.source());
                    let mode = if self.metadata.is_async {
                        TaskMode::Async
                    } else {
                        TaskMode::Sync
                    };
                    let continuation = Continuation {
                        control: Arc::clone(self),
                        ctx,
                        active,
                        next: position + 1,
                    };
                    self.services
                        .warmups()
                        .schedule_after(&source, delay, Box::new(continuation), mode);
                    return CommandOutcome::WillContinue;
                }
            }
        }

        if self.metadata.is_async && !in_place {
            let control = Arc::clone(self);
            self.services.scheduler().schedule(
                Duration::ZERO,
                TaskMode::Async,
                Box::new(move || {
                    let source = Arc::clone(ctx.source());
                    let outcome = control.execute(ctx, &active);
                    control.report(source.as_ref(), &outcome);
                }),
            );
            return CommandOutcome::WillContinue;
        }

        self.execute(ctx, &active)
    }

    fn execute(&self, mut ctx: ExecutionContext, active: &[usize]) -> CommandOutcome {
        self.interceptors.run_pre(self, &ctx);
        let outcome = self.invoke(&mut ctx);
        self.interceptors.run_post(self, &ctx, &outcome);

        match &outcome {
            CommandOutcome::Success => {
                for &index in active {
                    self.modifiers[index].modifier.on_completion(&mut ctx, self);
                }
            }
            CommandOutcome::Fail(_) => self.roll_back(&mut ctx, active),
            CommandOutcome::WillContinue => {}
        }
        outcome
    }

    fn invoke(&self, ctx: &mut ExecutionContext) -> CommandOutcome {
        let Some(executor) = &self.executor else {
            return CommandOutcome::Success;
        };
        match executor.execute(ctx) {
            Ok(outcome) => outcome,
            Err(CommandError::Runtime(err)) => CommandOutcome::Fail(err.describe(&self.services)),
            Err(CommandError::Internal(err)) => {
                error!("/{} failed for {}: {}", self.command, ctx.source().name(), err);
                CommandOutcome::Fail(self.services.message("command.exception.unexpected", &[]))
            }
        }
    }

    /// Failure hooks for every modifier that passed its pre-check, in
    /// reverse order.
    fn roll_back(&self, ctx: &mut ExecutionContext, started: &[usize]) {
        for &index in started.iter().rev() {
            self.modifiers[index].modifier.on_failure(ctx, self);
        }
    }

    /// Delivers the result of work that finished after dispatch returned.
    fn report(&self, source: &dyn Subject, outcome: &CommandOutcome) {
        if let CommandOutcome::Fail(message) = outcome {
            source.send_message(message);
        }
    }

    pub(super) fn complete(
        &self,
        source: &SubjectRef,
        mut tokens: TokenStream,
        partial: &str,
    ) -> Vec<String> {
        if let Some(child) = tokens
            .peek()
            .and_then(|token| self.children.get(&token.text.to_lowercase()))
        {
            let child = Arc::clone(child);
            tokens.next();
            return child.complete(source, tokens, partial);
        }
        if !self.test_permission(source.as_ref()) {
            return Vec::new();
        }

        let mut candidates = Vec::new();
        if !tokens.has_next() {
            candidates.extend(
                self.permitted_children(source.as_ref())
                    .into_iter()
                    .filter(|alias| matches_prefix(alias, partial))
                    .map(str::to_string),
            );
        }
        if self.executor.is_some() {
            candidates.extend(autocomplete::complete(
                &self.parameters,
                source,
                &self.services,
                tokens,
                partial,
            ));
        }
        candidates
            .into_iter()
            .unique()
            .take(MAX_COMPLETIONS)
            .collect()
    }
}

/// The rest of a pipeline, parked behind a warmup.
struct Continuation {
    control: Arc<CommandControl>,
    ctx: ExecutionContext,
    active: ActiveModifiers,
    next: usize,
}

impl WarmupTask for Continuation {
    fn run(self: Box<Self>) {
        let Continuation {
            control,
            ctx,
            active,
            next,
        } = *self;
        ctx.reply_key("warmup.end", &[]);
        let source = Arc::clone(ctx.source());
        let outcome = control.run_modifiers(ctx, active, next, true);
        control.report(source.as_ref(), &outcome);
    }

    fn on_cancel(self: Box<Self>) {
        let Continuation {
            control,
            mut ctx,
            active,
            next,
        } = *self;
        debug!("Warmup for /{} of {} cancelled", control.command, ctx.source().name());
        control.roll_back(&mut ctx, &active[..next]);
        ctx.reply_key("warmup.cancel", &[]);
    }
}
