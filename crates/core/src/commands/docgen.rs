use super::metadata::EssentialsEquivalent;
use super::registry::Dispatcher;
use serde::Serialize;

/// One command as it appears in generated documentation.
#[derive(Debug, Serialize)]
pub struct CommandDoc {
    pub command: String,
    pub command_key: String,
    pub module: String,
    pub aliases: Vec<String>,
    pub usage: String,
    pub flags: Vec<String>,
    pub permission: Option<String>,
    pub modifiers: Vec<String>,
    pub player_only: bool,
    pub is_async: bool,
    pub description: Option<String>,
    pub essentials_equivalent: Option<EssentialsEquivalent>,
}

impl Dispatcher {
    pub fn documentation(&self) -> Vec<CommandDoc> {
        self.controls()
            .map(|control| {
                let metadata = control.metadata();
                CommandDoc {
                    command: control.command().to_string(),
                    command_key: metadata.command_key.clone(),
                    module: metadata.module.clone(),
                    aliases: if metadata.is_root() {
                        self.registered_aliases(&metadata.command_key).to_vec()
                    } else {
                        metadata.sub_aliases.clone()
                    },
                    usage: control.usage(),
                    flags: super::usage::generate_flag_details(control.parameters()),
                    permission: metadata.permission.clone(),
                    modifiers: control
                        .modifier_ids()
                        .into_iter()
                        .map(str::to_string)
                        .collect(),
                    player_only: metadata.player_only,
                    is_async: metadata.is_async,
                    description: metadata.description.clone(),
                    essentials_equivalent: metadata.essentials_equivalent.clone(),
                }
            })
            .collect()
    }

    pub fn documentation_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.documentation())
    }
}
