use crate::services::Messages;
use rustc_hash::FxHashMap;

const DEFAULT_MESSAGES: &[(&str, &str)] = &[
    ("command.notfound", "Unknown command: {0}"),
    ("command.nopermission", "You do not have permission to use this command."),
    ("command.playeronly", "Only players can use this command."),
    ("command.usage", "Usage: /{0}"),
    ("command.subcommands", "Sub-commands of /{0}: {1}"),
    ("command.exception.unexpected", "An unexpected error occurred while running this command."),
    (
        "command.modifiers.level.insufficient",
        "You cannot target {0} as they have the same or a higher permission level than you.",
    ),
    ("cooldown.message", "You must wait {0} before using this command again."),
    ("cost.nofunds", "You need {0} to use this command."),
    ("cost.refunded", "You have been refunded {0}."),
    ("warmup.start", "The command will run in {0}."),
    ("warmup.both", "Moving or running another command will cancel it."),
    ("warmup.onCommand", "Running another command will cancel it."),
    ("warmup.onMove", "Moving will cancel it."),
    ("warmup.end", "Warmup complete."),
    ("warmup.cancel", "Your pending command has been cancelled."),
    ("args.toomany", "Too many arguments."),
    ("args.missing", "Not enough arguments, expected <{0}>."),
    ("args.integer.invalid", "'{0}' is not a whole number."),
    ("args.integer.range", "{0} is not between {1} and {2}."),
    ("args.float.invalid", "'{0}' is not a number."),
    ("args.float.range", "{0} is not between {1} and {2}."),
    ("args.boolean.invalid", "'{0}' is not true or false."),
    ("args.choice.invalid", "'{0}' is not one of: {1}."),
    ("args.timespan.invalid", "'{0}' is not a valid amount of time."),
    ("args.subject.notfound", "Could not find a player called '{0}'."),
    ("args.flag.nopermission", "You do not have permission to use the flag {0}."),
    ("args.flag.novalue", "The flag {0} needs a value."),
    ("args.error.marker", "{0}\n{1}"),
    ("afk.notify", "{0} is away from their keyboard and may not respond."),
];

/// English defaults with `{0}`-style placeholders. Unknown keys render as
/// the key itself.
pub struct MessageBundle {
    templates: FxHashMap<String, String>,
}

impl Default for MessageBundle {
    fn default() -> Self {
        Self {
            templates: DEFAULT_MESSAGES
                .iter()
                .map(|(key, template)| (key.to_string(), template.to_string()))
                .collect(),
        }
    }
}

impl MessageBundle {
    pub fn with_override(mut self, key: impl Into<String>, template: impl Into<String>) -> Self {
        self.templates.insert(key.into(), template.into());
        self
    }
}

impl Messages for MessageBundle {
    fn format(&self, key: &str, args: &[String]) -> String {
        let Some(template) = self.templates.get(key) else {
            return key.to_string();
        };
        args.iter()
            .enumerate()
            .fold(template.clone(), |message, (index, arg)| {
                message.replace(&format!("{{{index}}}"), arg)
            })
    }
}
