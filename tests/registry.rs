mod common;

use common::{counting, fail_message, Fixture};
use nucleus_core::commands::{
    CommandDescriptor, CommandOutcome, CommandRegistry, ModifierDeclaration, RegistrationError,
};
use nucleus_core::config::CommandsConfig;
use nucleus_core::testing::TestServices;
use std::time::Duration;

#[test]
fn prefixed_root_aliases_share_metadata() {
    let (home, home_runs) = counting(&["home"]);
    let (clear, clear_runs) = counting(&["clear"]);
    let fixture = Fixture::new("", vec![home, clear.parent("home")]);
    let alice = fixture.player("alice");

    let home = fixture.dispatcher.metadata_for_alias("home").unwrap();
    let nhome = fixture.dispatcher.metadata_for_alias("nhome").unwrap();
    assert_eq!(home.command_key, nhome.command_key);
    assert!(fixture.dispatcher.metadata_for_alias("clear").is_none());

    assert_eq!(fixture.run(&alice, "nhome"), CommandOutcome::Success);
    assert_eq!(fixture.run(&alice, "home clear"), CommandOutcome::Success);
    assert_eq!(fixture.run(&alice, "nhome CLEAR"), CommandOutcome::Success);
    assert_eq!(home_runs.count(), 1);
    assert_eq!(clear_runs.count(), 2);

    let message = fail_message(fixture.run(&alice, "clear"));
    assert_eq!(message, "Unknown command: clear");
}

#[test]
fn defaults_are_merged_into_the_commands_config() {
    let (home, _) = counting(&["home", "$homes"]);
    let (clear, _) = counting(&["clear", "#clearhomes"]);
    let fixture = Fixture::new(
        "# user settings\n[home]\nwarmup = 3\n",
        vec![
            home.modifier(ModifierDeclaration::warmup())
                .modifier(ModifierDeclaration::cooldown()),
            clear.parent("home"),
        ],
    );

    let written = fixture.config.to_string();
    assert!(written.starts_with("# user settings\n[home]\nwarmup = 3\n"));
    assert!(written.contains("cooldown = 0"));
    assert!(fixture.config.root_alias_enabled("home", "nhome", false));
    assert!(!fixture.config.root_alias_enabled("home", "homes", true));
    assert!(written.contains("[\"home.clear\"]"));
    assert!(fixture.config.is_modified());

    assert_eq!(fixture.dispatcher.registered_aliases("home"), ["home", "nhome"]);
    assert_eq!(
        fixture.dispatcher.registered_aliases("home.clear"),
        ["clearhomes", "nclearhomes"]
    );
}

#[test]
fn root_aliases_can_be_toggled_in_config() {
    let (home, _) = counting(&["home", "$homes"]);
    let fixture = Fixture::new(
        "[home]\nroot_aliases = { nhome = false, homes = true }\n",
        vec![home],
    );

    assert_eq!(fixture.dispatcher.registered_aliases("home"), ["home", "homes"]);
    assert!(fixture.dispatcher.metadata_for_alias("nhome").is_none());
}

#[test]
fn disabled_parents_hide_their_children() {
    let (warp, _) = counting(&["warp"]);
    let (list, _) = counting(&["list", "#warps"]);
    let fixture = Fixture::new("[warp]\nenabled = false\n", vec![warp, list.parent("warp")]);

    assert!(fixture.dispatcher.control("warp").is_none());
    assert!(fixture.dispatcher.control("warp.list").is_none());
    assert!(fixture.dispatcher.metadata_for_alias("warps").is_none());
}

#[test]
fn sub_commands_named_like_settings_keep_parent_values() {
    let (warp, _) = counting(&["warp"]);
    let (cooldown, _) = counting(&["cooldown"]);
    let (cost, cost_runs) = counting(&["cost"]);
    let fixture = Fixture::new(
        "[warp]\ncooldown = 30\n",
        vec![
            warp.modifier(ModifierDeclaration::cooldown()),
            cooldown.parent("warp"),
            cost.parent("warp"),
        ],
    );
    let alice = fixture.player("alice");

    let settings = fixture.dispatcher.control("warp").unwrap().settings();
    assert_eq!(settings.cooldown, Duration::from_secs(30));
    let section = fixture.config.section("warp").unwrap();
    assert_eq!(section.get("cooldown").and_then(|item| item.as_integer()), Some(30));
    assert!(fixture.config.is_enabled("warp.cooldown"));
    assert!(fixture.config.section("warp.cost").is_some());

    assert_eq!(fixture.run(&alice, "warp"), CommandOutcome::Success);
    assert_eq!(
        fixture.harness.services.cooldowns().get_cooldown("warp", alice.id()),
        Some(Duration::from_secs(30))
    );
    assert_eq!(fixture.run(&alice, "warp cost"), CommandOutcome::Success);
    assert_eq!(cost_runs.count(), 1);
}

#[test]
fn commands_without_executors_list_their_children() {
    let (reload, _) = counting(&["reload"]);
    let (info, _) = counting(&["info"]);
    let secret = counting(&["secret"]).0.permission("nucleus.admin.secret");
    let fixture = Fixture::new(
        "",
        vec![
            CommandDescriptor::new("admin", ["admin"]),
            reload.parent("admin"),
            info.parent("admin"),
            secret.parent("admin"),
        ],
    );
    let alice = fixture.player("alice");

    assert_eq!(fixture.run(&alice, "admin"), CommandOutcome::Success);
    assert_eq!(
        fixture.messages(&alice),
        ["Usage: /admin\nSub-commands of /admin: info, reload"]
    );
    assert_eq!(fixture.dispatcher.complete(&alice, "admin "), ["info", "reload"]);
}

#[test]
fn registration_errors_abort_the_build() {
    let harness = TestServices::new();

    let mut registry = CommandRegistry::new(harness.services.clone());
    registry.register(counting(&["spawn"]).0);
    registry.register(counting(&["spawn"]).0);
    assert!(matches!(
        registry.build(&mut CommandsConfig::in_memory()),
        Err(RegistrationError::DuplicateCommand { command }) if command == "spawn"
    ));

    let mut registry = CommandRegistry::new(harness.services.clone());
    registry.register(counting(&["warp"]).0);
    registry.register(counting(&["delete", "remove"]).0.parent("warp"));
    registry.register(counting(&["remove"]).0.parent("warp"));
    assert!(matches!(
        registry.build(&mut CommandsConfig::in_memory()),
        Err(RegistrationError::DuplicateSubAlias { alias, .. }) if alias == "remove"
    ));

    let mut registry = CommandRegistry::new(harness.services.clone());
    registry.register(CommandDescriptor::new("empty", ["  "]));
    assert!(matches!(
        registry.build(&mut CommandsConfig::in_memory()),
        Err(RegistrationError::NoAliases { .. })
    ));

    let mut registry = CommandRegistry::new(harness.services.clone());
    registry.register(
        counting(&["sell"])
            .0
            .modifier(ModifierDeclaration::cost().with_option("refund_on_deny", "maybe")),
    );
    assert!(matches!(
        registry.build(&mut CommandsConfig::in_memory()),
        Err(RegistrationError::InvalidModifier { .. })
    ));

    let mut registry = CommandRegistry::new(harness.services.clone());
    registry.register(counting(&["warp"]).0);
    let mut config = CommandsConfig::parse("warp = 5\n").unwrap();
    assert!(matches!(
        registry.build(&mut config),
        Err(RegistrationError::ConfigNotATable { key }) if key == "warp"
    ));
    assert_eq!(config.to_string(), "warp = 5\n");

    let mut registry = CommandRegistry::new(harness.services.clone());
    assert!(matches!(
        registry.register_modifier("cooldown", |_| Err("unused".to_string())),
        Err(RegistrationError::DuplicateModifier(id)) if id == "cooldown"
    ));
}

#[test]
fn custom_aliases_expand_before_lookup() {
    let (gamemode, runs) = counting(&["gamemode"]);
    let fixture = Fixture::with_harness(TestServices::new(), "", vec![gamemode], |registry| {
        registry.add_custom_alias("gmc", "gamemode creative {}");
    });
    let alice = fixture.player("alice");

    // `gamemode` takes no parameters, so the expansion's extra token is rejected.
    let message = fail_message(fixture.run(&alice, "gmc"));
    assert!(message.starts_with("Too many arguments."));
    assert_eq!(runs.count(), 0);
}

#[test]
fn documentation_lists_every_enabled_command() {
    let (home, _) = counting(&["home"]);
    let (clear, _) = counting(&["clear"]);
    let fixture = Fixture::new(
        "",
        vec![
            home.permission("nucleus.home.base")
                .essentials_equivalent(["home", "homes"], true, None),
            clear.parent("home"),
        ],
    );

    let json: serde_json::Value =
        serde_json::from_str(&fixture.dispatcher.documentation_json().unwrap()).unwrap();
    let commands = json.as_array().unwrap();
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[0]["command"], "home");
    assert_eq!(commands[1]["command"], "home clear");
    assert_eq!(commands[1]["aliases"][0], "clear");
}
