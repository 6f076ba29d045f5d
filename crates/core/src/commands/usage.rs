use super::argument::FlagSpec;
use super::node::{NodeType, ParameterNode, ParameterTree};
use itertools::Itertools;

/// Renders the parameters of a command, e.g.
/// `[-f|--force] [--reason <reason>] <player> [<duration>]`.
pub fn generate_usage(tree: &ParameterTree) -> String {
    tree.flags
        .iter()
        .map(format_flag)
        .chain(tree.elements.iter().map(format_node))
        .filter(|part| !part.is_empty())
        .join(" ")
}

fn format_flag(flag: &FlagSpec) -> String {
    let name = match flag.short {
        Some(short) => format!("-{}|--{}", short, flag.long),
        None => format!("--{}", flag.long),
    };
    match &flag.value {
        Some(parser) => format!("[{} {}]", name, parser.usage(&flag.long)),
        None => format!("[{}]", name),
    }
}

fn format_node(node: &ParameterNode) -> String {
    let content = match &node.node_type {
        NodeType::Element { key, parser } => parser.usage(key),
        NodeType::Sequence(children) => children.iter().map(format_node).join(" "),
        NodeType::Branch(alternatives) => {
            let inner = alternatives.iter().map(format_node).join(" | ");
            if node.optional || alternatives.len() < 2 {
                inner
            } else {
                format!("({})", inner)
            }
        }
    };

    if node.optional {
        format!("[{}]", content)
    } else {
        content
    }
}

/// A bulleted list of flag details for help output.
pub fn generate_flag_details(tree: &ParameterTree) -> Vec<String> {
    tree.flags
        .iter()
        .map(|flag| {
            let name = match flag.short {
                Some(short) => format!("-{}, --{}", short, flag.long),
                None => format!("--{}", flag.long),
            };
            match &flag.description {
                Some(description) => format!("{}: {}", name, description),
                None => name,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::argument::{ArgumentType, FlagSpec};

    #[test]
    fn usage_shows_optionals_and_branches() {
        let tree = ParameterTree::new()
            .flag('f', "force")
            .value_flag(None, "reason", ArgumentType::greedy_string())
            .then(ParameterNode::argument("player", ArgumentType::string()))
            .branch([
                ParameterNode::argument("seconds", ArgumentType::integer(0, 60)),
                ParameterNode::argument("duration", ArgumentType::timespan()),
            ])
            .then(ParameterNode::argument("note", ArgumentType::string()).optional());

        assert_eq!(
            generate_usage(&tree),
            "[-f|--force] [--reason <reason...>] <player> (<seconds> | <duration>) [<note>]"
        );
    }

    #[test]
    fn flag_details_include_descriptions() {
        let tree = ParameterTree::new()
            .with_flag(FlagSpec::new('s', "silent").describe("Do not broadcast"))
            .flag(None, "all");

        assert_eq!(
            generate_flag_details(&tree),
            ["-s, --silent: Do not broadcast", "--all"]
        );
    }
}
