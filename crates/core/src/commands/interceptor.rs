use super::context::ExecutionContext;
use super::control::CommandControl;
use super::error::CommandOutcome;
use crate::services::SubjectId;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Observes every command around its executor. Interceptors cannot stop a
/// command; errors and panics are logged and ignored.
pub trait CommandInterceptor: Send + Sync {
    fn name(&self) -> &str;

    fn on_pre_command(&self, _control: &CommandControl, _ctx: &ExecutionContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_post_command(
        &self,
        _control: &CommandControl,
        _ctx: &ExecutionContext,
        _outcome: &CommandOutcome,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Arc<[Arc<dyn CommandInterceptor>]>,
}

impl InterceptorChain {
    pub(super) fn new(interceptors: Vec<Arc<dyn CommandInterceptor>>) -> Self {
        Self {
            interceptors: interceptors.into(),
        }
    }

    fn run_each(&self, stage: &str, mut hook: impl FnMut(&dyn CommandInterceptor) -> anyhow::Result<()>) {
        for interceptor in self.interceptors.iter() {
            match catch_unwind(AssertUnwindSafe(|| hook(interceptor.as_ref()))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!("Interceptor '{}' failed in {}: {:#}", interceptor.name(), stage, err),
                Err(_) => warn!("Interceptor '{}' panicked in {}", interceptor.name(), stage),
            }
        }
    }

    pub(super) fn run_pre(&self, control: &CommandControl, ctx: &ExecutionContext) {
        self.run_each("pre-command", |interceptor| interceptor.on_pre_command(control, ctx));
    }

    pub(super) fn run_post(&self, control: &CommandControl, ctx: &ExecutionContext, outcome: &CommandOutcome) {
        self.run_each("post-command", |interceptor| {
            interceptor.on_post_command(control, ctx, outcome)
        });
    }
}

/// Writes every command run to the log.
pub struct CommandLogInterceptor;

impl CommandInterceptor for CommandLogInterceptor {
    fn name(&self) -> &str {
        "command-log"
    }

    fn on_pre_command(&self, control: &CommandControl, ctx: &ExecutionContext) -> anyhow::Result<()> {
        info!(
            "{} ({}) ran /{}",
            ctx.source().name(),
            ctx.source().id(),
            control.command()
        );
        Ok(())
    }

    fn on_post_command(
        &self,
        control: &CommandControl,
        ctx: &ExecutionContext,
        outcome: &CommandOutcome,
    ) -> anyhow::Result<()> {
        match outcome {
            CommandOutcome::Fail(message) => {
                debug!("/{} failed for {}: {}", control.command(), ctx.source().name(), message)
            }
            outcome => debug!("/{} for {} ended with {:?}", control.command(), ctx.source().name(), outcome),
        }
        Ok(())
    }
}

/// Knows which subjects are away from their keyboard.
pub trait AfkTracker: Send + Sync {
    fn is_afk(&self, subject: SubjectId) -> bool;
}

/// Tells the source when a command succeeded against someone who is away.
pub struct AfkNotifyInterceptor {
    tracker: Arc<dyn AfkTracker>,
}

impl AfkNotifyInterceptor {
    pub fn new(tracker: Arc<dyn AfkTracker>) -> Self {
        Self { tracker }
    }
}

impl CommandInterceptor for AfkNotifyInterceptor {
    fn name(&self) -> &str {
        "afk-notify"
    }

    fn on_post_command(
        &self,
        control: &CommandControl,
        ctx: &ExecutionContext,
        outcome: &CommandOutcome,
    ) -> anyhow::Result<()> {
        if !outcome.is_success() {
            return Ok(());
        }
        for argument in &control.metadata().notify_if_afk {
            let Some(target) = ctx.args().get_optional_subject(argument) else {
                continue;
            };
            if target.id() != ctx.source().id() && self.tracker.is_afk(target.id()) {
                ctx.reply_key("afk.notify", &[target.name().to_string()]);
            }
        }
        Ok(())
    }
}
