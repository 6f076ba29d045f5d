use super::argument_parser::TokenStream;
use super::autocomplete::{matches_prefix, split_partial, MAX_COMPLETIONS};
use super::error::CommandOutcome;
use super::registry::Dispatcher;
use crate::services::SubjectRef;
use std::sync::Arc;
use tracing::debug;

impl Dispatcher {
    /// Runs one command line for `source`. Failure messages are sent to the
    /// source before returning.
    pub fn dispatch(&self, source: &SubjectRef, command_line: &str) -> CommandOutcome {
        let command_line = command_line.trim();
        let command_line = command_line.strip_prefix('/').unwrap_or(command_line);
        if command_line.is_empty() {
            return CommandOutcome::Success;
        }

        if self.services.config().warmup_cancel_on_command && self.services.warmups().cancel(source.id()) {
            debug!("{} started a new command, pending warmup cancelled", source.name());
        }

        let command_line = self.expand_custom_aliases(command_line);
        let mut tokens = TokenStream::new(&command_line);
        let alias = tokens
            .next()
            .map(|token| token.text.to_lowercase())
            .unwrap_or_default();

        let outcome = match self.roots.get(&alias) {
            Some(control) => Arc::clone(control).process(Arc::clone(source), tokens),
            None => {
                debug!("{} tried unknown command /{}", source.name(), alias);
                CommandOutcome::Fail(self.services.message("command.notfound", &[alias]))
            }
        };

        if let CommandOutcome::Fail(message) = &outcome {
            source.send_message(message);
        }
        outcome
    }

    /// Suggestions for the last, possibly partial, token of `command_line`.
    pub fn complete(&self, source: &SubjectRef, command_line: &str) -> Vec<String> {
        let command_line = command_line.trim_start();
        let command_line = command_line.strip_prefix('/').unwrap_or(command_line);
        let (mut tokens, partial) = split_partial(command_line);

        let Some(alias) = tokens.next().map(|token| token.text.to_lowercase()) else {
            let mut aliases = self
                .roots
                .iter()
                .filter(|(alias, control)| {
                    matches_prefix(alias, &partial) && control.test_permission(source.as_ref())
                })
                .map(|(alias, _)| alias.clone())
                .collect::<Vec<_>>();
            aliases.sort();
            aliases.truncate(MAX_COMPLETIONS);
            return aliases;
        };

        match self.roots.get(&alias) {
            Some(control) => control.complete(source, tokens, &partial),
            None => Vec::new(),
        }
    }

    /// Called by the host when `source` moves. Cancels its pending warmup
    /// if the config asks for that.
    pub fn on_subject_moved(&self, source: &SubjectRef) -> bool {
        self.services.config().warmup_cancel_on_move && self.services.warmups().cancel(source.id())
    }

    fn expand_custom_aliases(&self, command_line: &str) -> String {
        for (alias, expansion) in &self.custom_aliases {
            if let Some(rest) = command_line.strip_prefix(alias.as_str()) {
                if !(rest.is_empty() || rest.starts_with(' ')) {
                    continue;
                }
                if expansion.contains("{}") {
                    return expansion.replace("{}", rest);
                } else {
                    return format!("{}{}", expansion, rest);
                }
            }
        }

        command_line.to_string()
    }
}
