use nucleus_core::commands::{
    ArgumentType, CommandDescriptor, CommandOutcome, CommandRegistry, ModifierDeclaration,
    ParameterNode, ParameterTree,
};
use nucleus_utils::time_string;
use std::thread;

const MODULE: &str = "console";

pub fn register_commands(registry: &mut CommandRegistry) {
    registry.register(
        CommandDescriptor::new(MODULE, ["echo", "say"])
            .description("Prints a message back to the sender")
            .parameters(
                ParameterTree::new()
                    .flag('u', "upper")
                    .then(ParameterNode::argument("message", ArgumentType::greedy_string())),
            )
            .executes(|ctx| {
                let message = ctx.args().get_string("message")?;
                if ctx.args().has_flag("upper") {
                    ctx.reply(&message.to_uppercase());
                } else {
                    ctx.reply(&message);
                }
                Ok(CommandOutcome::Success)
            }),
    );

    registry.register(
        CommandDescriptor::new(MODULE, ["sum"])
            .description("Adds two whole numbers")
            .parameters(
                ParameterTree::new()
                    .then(ParameterNode::argument("a", ArgumentType::integer(i32::MIN, i32::MAX)))
                    .then(ParameterNode::argument("b", ArgumentType::integer(i32::MIN, i32::MAX))),
            )
            .executes(|ctx| {
                let a = ctx.args().get_integer("a")? as i64;
                let b = ctx.args().get_integer("b")? as i64;
                ctx.reply(&format!("{} + {} = {}", a, b, a + b));
                Ok(CommandOutcome::Success)
            }),
    );

    registry.register(
        CommandDescriptor::new(MODULE, ["sleep"])
            .description("Blocks a worker thread for a while, then reports back")
            .run_async()
            .modifier(ModifierDeclaration::cooldown())
            .parameters(ParameterTree::new().then(ParameterNode::argument("time", ArgumentType::timespan())))
            .executes(|ctx| {
                let time = ctx.args().get_timespan("time")?;
                thread::sleep(time);
                ctx.reply(&format!("Slept for {}", time_string(time)));
                Ok(CommandOutcome::Success)
            }),
    );

    registry.register(CommandDescriptor::new(MODULE, ["config", "$cfg"]).description("Config tools"));
    registry.register(
        CommandDescriptor::new(MODULE, ["prefix"])
            .parent("config")
            .description("Shows the command prefix")
            .executes(|ctx| {
                ctx.reply(&ctx.services().config().command_prefix);
                Ok(CommandOutcome::Success)
            }),
    );
    registry.register(
        CommandDescriptor::new(MODULE, ["mode", "#consolemode"])
            .parent("config")
            .description("Switches between two made-up modes")
            .parameters(ParameterTree::new().branch([
                ParameterNode::argument("seconds", ArgumentType::integer(0, 3600)),
                ParameterNode::argument("mode", ArgumentType::choice(["fast", "slow"])),
            ]))
            .executes(|ctx| {
                match ctx.args().get_optional_string("mode") {
                    Some(mode) => ctx.reply(&format!("Mode set to {}", mode)),
                    None => ctx.reply(&format!("Interval set to {}s", ctx.args().get_integer("seconds")?)),
                }
                Ok(CommandOutcome::Success)
            }),
    );
}
