#![allow(dead_code)]

use nucleus_core::commands::{
    CommandDescriptor, CommandOutcome, CommandRegistry, Dispatcher, ExecutionContext,
};
use nucleus_core::config::{CommandsConfig, CoreConfig};
use nucleus_core::services::SubjectRef;
use nucleus_core::testing::TestServices;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts executor runs.
#[derive(Clone, Default)]
pub struct Runs(Arc<AtomicUsize>);

impl Runs {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// A command whose executor counts its runs and succeeds.
pub fn counting(aliases: &[&str]) -> (CommandDescriptor, Runs) {
    counting_with(aliases, |_| Ok(CommandOutcome::Success))
}

pub fn counting_with<F>(aliases: &[&str], body: F) -> (CommandDescriptor, Runs)
where
    F: Fn(&mut ExecutionContext) -> nucleus_core::commands::CommandResult<CommandOutcome>
        + Send
        + Sync
        + 'static,
{
    let runs = Runs::default();
    let counter = runs.clone();
    let descriptor = CommandDescriptor::new("test", aliases.iter().copied()).executes(move |ctx| {
        counter.hit();
        body(ctx)
    });
    (descriptor, runs)
}

pub struct Fixture {
    pub harness: TestServices,
    pub dispatcher: Dispatcher,
    pub config: CommandsConfig,
}

impl Fixture {
    pub fn new(commands_toml: &str, commands: Vec<CommandDescriptor>) -> Fixture {
        Self::with_harness(TestServices::new(), commands_toml, commands, |_| {})
    }

    pub fn with_config(config: CoreConfig, commands_toml: &str, commands: Vec<CommandDescriptor>) -> Fixture {
        Self::with_harness(TestServices::with_config(config), commands_toml, commands, |_| {})
    }

    pub fn with_harness(
        harness: TestServices,
        commands_toml: &str,
        commands: Vec<CommandDescriptor>,
        setup: impl FnOnce(&mut CommandRegistry),
    ) -> Fixture {
        let mut registry = CommandRegistry::new(harness.services.clone());
        for command in commands {
            registry.register(command);
        }
        setup(&mut registry);
        let mut config = CommandsConfig::parse(commands_toml).expect("valid commands config");
        let dispatcher = registry.build(&mut config).expect("commands register");
        Fixture {
            harness,
            dispatcher,
            config,
        }
    }

    pub fn player(&self, name: &str) -> SubjectRef {
        self.harness.player(name)
    }

    pub fn run(&self, source: &SubjectRef, line: &str) -> CommandOutcome {
        self.dispatcher.dispatch(source, line)
    }

    pub fn messages(&self, source: &SubjectRef) -> Vec<String> {
        self.harness.messages(source)
    }
}

pub fn is_fail(outcome: &CommandOutcome) -> bool {
    matches!(outcome, CommandOutcome::Fail(_))
}

pub fn fail_message(outcome: CommandOutcome) -> String {
    match outcome {
        CommandOutcome::Fail(message) => message,
        other => panic!("expected a failure, got {:?}", other),
    }
}
