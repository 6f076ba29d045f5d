use crate::commands::RegistrationError;
use anyhow::Context;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use toml_edit::{value, DocumentMut, InlineTable, Item, Table};

trait ConfigSerializeDefault {
    fn fix_config(self, name: &str, doc: &mut DocumentMut);
}

macro_rules! impl_simple_default {
    ( $( $type:ty ),* ) => {
        $(
            impl ConfigSerializeDefault for $type {
                fn fix_config(self, name: &str, doc: &mut DocumentMut) {
                    doc.entry(name).or_insert_with(|| value(self));
                }
            }
        )*
    }
}

impl_simple_default!(String, i64, bool);

impl ConfigSerializeDefault for IndexMap<String, String> {
    fn fix_config(self, name: &str, doc: &mut DocumentMut) {
        doc.entry(name).or_insert_with(|| {
            let mut table = Table::new();
            for (key, replacement) in self {
                table.insert(&key, value(replacement));
            }
            Item::Table(table)
        });
    }
}

macro_rules! gen_config {
    (
        $( $name:ident: $type:ty = $default:expr),*
    ) => {
        #[derive(Debug, Clone, Serialize, Deserialize)]
        pub struct CoreConfig {
            $(
                pub $name: $type,
            )*
        }

        impl Default for CoreConfig {
            fn default() -> Self {
                CoreConfig {
                    $(
                        $name: $default,
                    )*
                }
            }
        }

        impl CoreConfig {
            /// Loads the config, writing back any keys that were missing.
            pub fn load(config_file: &Path) -> anyhow::Result<CoreConfig> {
                let str = fs::read_to_string(config_file).unwrap_or_default();
                let mut doc = str
                    .parse::<DocumentMut>()
                    .with_context(|| format!("Malformed config {}", config_file.display()))?;

                $(
                    <$type as ConfigSerializeDefault>::fix_config($default, stringify!($name), &mut doc);
                )*

                let patched = doc.to_string();
                if str != patched {
                    let mut file = fs::OpenOptions::new()
                        .create(true)
                        .write(true)
                        .truncate(true)
                        .open(config_file)?;
                    write!(file, "{}", patched)?;
                }

                Ok(toml::from_str(&patched)?)
            }
        }
    };
}

gen_config! {
    command_prefix: String = "n".to_string(),
    commands_file: String = "commands.toml".to_string(),
    warmup_cancel_on_move: bool = true,
    warmup_cancel_on_command: bool = true,
    log_commands: bool = true,
    command_aliases: IndexMap<String, String> = IndexMap::new()
}

/// Per-command settings, stored as one top-level table per command key.
/// Sub-command keys are quoted so they never nest inside their parent's
/// settings.
///
/// ```toml
/// [home]
/// enabled = true
/// root_aliases = { home = true, nhome = true }
/// cooldown = 0
/// warmup = 5
///
/// ["home.clear"]
/// enabled = true
/// ```
pub struct CommandsConfig {
    path: Option<PathBuf>,
    doc: DocumentMut,
    original: String,
}

impl CommandsConfig {
    pub fn load(path: impl Into<PathBuf>) -> anyhow::Result<CommandsConfig> {
        let path = path.into();
        let original = fs::read_to_string(&path).unwrap_or_default();
        let doc = original
            .parse::<DocumentMut>()
            .with_context(|| format!("Malformed command config {}", path.display()))?;
        Ok(CommandsConfig {
            path: Some(path),
            doc,
            original,
        })
    }

    /// A config that is never written to disk.
    pub fn parse(contents: &str) -> anyhow::Result<CommandsConfig> {
        Ok(CommandsConfig {
            path: None,
            doc: contents.parse()?,
            original: contents.to_string(),
        })
    }

    pub fn in_memory() -> CommandsConfig {
        CommandsConfig {
            path: None,
            doc: DocumentMut::new(),
            original: String::new(),
        }
    }

    pub fn section(&self, key: &str) -> Option<&Table> {
        self.doc.get(key)?.as_table()
    }

    /// The section for `key`, created if missing. A user value that is not a
    /// table is left alone and reported.
    pub(crate) fn section_mut(&mut self, key: &str) -> Result<&mut Table, RegistrationError> {
        self.doc
            .entry(key)
            .or_insert_with(|| Item::Table(Table::new()))
            .as_table_mut()
            .ok_or_else(|| RegistrationError::ConfigNotATable {
                key: key.to_string(),
            })
    }

    /// Adds the framework's defaults for a command without touching values
    /// that are already present.
    pub(crate) fn merge_command_defaults(
        &mut self,
        key: &str,
        root_aliases: &[(String, bool)],
    ) -> Result<(), RegistrationError> {
        let section = self.section_mut(key)?;
        section.entry("enabled").or_insert(value(true));
        if root_aliases.is_empty() {
            return Ok(());
        }

        let aliases = section
            .entry("root_aliases")
            .or_insert_with(|| value(InlineTable::new()));
        if let Some(table) = aliases.as_table_like_mut() {
            for (alias, enabled) in root_aliases {
                if table.get(alias).is_none() {
                    table.insert(alias, value(*enabled));
                }
            }
        }
        Ok(())
    }

    /// Command keys that have a section, e.g. `home` and `home.clear`.
    pub fn section_keys(&self) -> Vec<String> {
        self.doc
            .as_table()
            .iter()
            .filter(|(_, item)| item.is_table())
            .map(|(key, _)| key.to_string())
            .collect()
    }

    pub fn is_enabled(&self, key: &str) -> bool {
        self.section(key)
            .and_then(|section| section.get("enabled"))
            .and_then(Item::as_bool)
            .unwrap_or(true)
    }

    pub fn root_alias_enabled(&self, key: &str, alias: &str, default: bool) -> bool {
        self.section(key)
            .and_then(|section| section.get("root_aliases"))
            .and_then(Item::as_table_like)
            .and_then(|aliases| aliases.get(alias))
            .and_then(Item::as_bool)
            .unwrap_or(default)
    }

    pub fn is_modified(&self) -> bool {
        self.doc.to_string() != self.original
    }

    /// Writes the document back if defaults were merged into it.
    /// Returns whether anything was written.
    pub fn save(&mut self) -> anyhow::Result<bool> {
        let Some(path) = &self.path else {
            return Ok(false);
        };
        if !self.is_modified() {
            return Ok(false);
        }

        let patched = self.doc.to_string();
        fs::write(path, &patched)
            .with_context(|| format!("Could not write {}", path.display()))?;
        self.original = patched;
        Ok(true)
    }
}

impl std::fmt::Display for CommandsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.doc)
    }
}
