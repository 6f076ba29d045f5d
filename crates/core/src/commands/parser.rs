use crate::commands::{
    argument::{ArgumentError, FlagSpec, ParameterType, ParseScope},
    argument_parser::{mark_position, Token, TokenStream},
    argument_set::ArgumentSet,
    node::{NodeType, ParameterNode, ParameterTree},
    value::Value,
};
use crate::services::{Services, SubjectRef};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{key} at offset {position}")]
pub struct ParseError {
    /// Byte offset of the offending token in the command line.
    pub position: usize,
    pub key: String,
    pub args: Vec<String>,
}

impl ParseError {
    fn new(position: usize, key: &str, args: Vec<String>) -> Self {
        Self {
            position,
            key: key.to_string(),
            args,
        }
    }

    fn from_argument(err: ArgumentError, element: &str, position: usize) -> Self {
        match err {
            ArgumentError::Missing => Self::new(position, "args.missing", vec![element.to_string()]),
            ArgumentError::Invalid { key, args } => Self {
                position,
                key,
                args,
            },
        }
    }

    /// The localized error followed by the command line with a marker at
    /// the failing position.
    pub fn describe(&self, services: &Services, input: &str) -> String {
        let detail = services.message(&self.key, &self.args);
        services.message(
            "args.error.marker",
            &[detail, mark_position(input, self.position)],
        )
    }
}

type Snapshot = (usize, usize);

pub(super) struct Parser<'a> {
    pub(super) source: &'a SubjectRef,
    pub(super) services: &'a Services,
    pub(super) arguments: &'a mut ArgumentSet,
    pub(super) tokens: TokenStream,
}

/// Parses `tokens` against `tree`, binding values into `arguments`.
///
/// On failure nothing from this call stays bound.
pub(super) fn parse(
    tree: &ParameterTree,
    source: &SubjectRef,
    services: &Services,
    arguments: &mut ArgumentSet,
    tokens: TokenStream,
) -> Result<(), ParseError> {
    let checkpoint = arguments.len();
    let mut parser = Parser {
        source,
        services,
        arguments,
        tokens,
    };

    let result = parser.run(tree);
    if result.is_err() {
        parser.arguments.truncate(checkpoint);
    }
    result
}

fn short_flags(text: &str) -> Option<&str> {
    let rest = text.strip_prefix('-')?;
    if rest.is_empty() || !rest.chars().all(char::is_alphabetic) {
        return None;
    }
    Some(rest)
}

pub(super) fn split_head(node: &ParameterNode) -> (&ParameterNode, &[ParameterNode]) {
    match &node.node_type {
        NodeType::Sequence(children) if !children.is_empty() => (&children[0], &children[1..]),
        _ => (node, &[]),
    }
}

impl Parser<'_> {
    fn run(&mut self, tree: &ParameterTree) -> Result<(), ParseError> {
        self.extract_flags(&tree.flags)?;

        for node in &tree.elements {
            self.parse_node(node)?;
        }

        if self.tokens.has_next() {
            return Err(ParseError::new(self.tokens.offset(), "args.toomany", Vec::new()));
        }
        Ok(())
    }

    pub(super) fn snapshot(&self) -> Snapshot {
        (self.tokens.snapshot(), self.arguments.len())
    }

    pub(super) fn restore(&mut self, (tokens, arguments): Snapshot) {
        self.tokens.restore(tokens);
        self.arguments.truncate(arguments);
    }

    pub(super) fn requirement_met(&self, node: &ParameterNode) -> bool {
        let scope = ParseScope {
            source: self.source,
            services: self.services,
            arguments: &*self.arguments,
        };
        node.requirement_met(&scope)
    }

    /// Pulls flags out of the token stream, leaving only positional tokens.
    /// Everything after a bare `--` is positional.
    pub(super) fn extract_flags(&mut self, flags: &[FlagSpec]) -> Result<(), ParseError> {
        if flags.is_empty() {
            return Ok(());
        }

        let stream = std::mem::replace(&mut self.tokens, TokenStream::from_tokens("", Vec::new()));
        let (raw, tokens) = stream.into_remaining();
        let mut kept = Vec::with_capacity(tokens.len());

        let mut index = 0;
        while index < tokens.len() {
            let token = &tokens[index];
            index += 1;

            if token.text == "--" {
                kept.extend_from_slice(&tokens[index..]);
                break;
            }

            if let Some(long) = token.text.strip_prefix("--") {
                let (name, inline) = match long.split_once('=') {
                    Some((name, value)) => (name, Some(value)),
                    None => (long, None),
                };
                let Some(flag) = flags.iter().find(|flag| flag.matches_long(name)) else {
                    kept.push(token.clone());
                    continue;
                };
                index += self.bind_flag(flag, token, inline, &raw, &tokens[index..])?;
            } else if let Some(shorts) = short_flags(&token.text) {
                let specs: Option<Vec<&FlagSpec>> = shorts
                    .chars()
                    .map(|c| flags.iter().find(|flag| flag.short == Some(c)))
                    .collect();
                let Some(specs) = specs else {
                    kept.push(token.clone());
                    continue;
                };

                let last = specs.len() - 1;
                for (position, flag) in specs.into_iter().enumerate() {
                    // Only the final flag of a cluster like `-fr` may take a value.
                    if flag.value.is_some() && position != last {
                        return Err(ParseError::new(
                            token.start,
                            "args.flag.novalue",
                            vec![format!("-{}", flag.short.unwrap_or_default())],
                        ));
                    }
                    index += self.bind_flag(flag, token, None, &raw, &tokens[index..])?;
                }
            } else {
                kept.push(token.clone());
            }
        }

        self.tokens = TokenStream::from_tokens(&raw, kept);
        Ok(())
    }

    /// Binds one flag, returning how many following tokens its value used.
    fn bind_flag(
        &mut self,
        flag: &FlagSpec,
        token: &Token,
        inline: Option<&str>,
        raw: &str,
        following: &[Token],
    ) -> Result<usize, ParseError> {
        if let Some(permission) = &flag.permission {
            if !self.services.has_permission(self.source.as_ref(), permission) {
                return Err(ParseError::new(
                    token.start,
                    "args.flag.nopermission",
                    vec![token.text.clone()],
                ));
            }
        }

        let Some(parser) = &flag.value else {
            self.arguments.insert(&flag.long, Value::Boolean(true));
            return Ok(0);
        };

        let mut stream = match inline {
            Some(value) => TokenStream::from_tokens(
                raw,
                vec![Token {
                    text: value.to_string(),
                    start: token.start,
                    end: token.end,
                }],
            ),
            None => TokenStream::from_tokens(raw, following.to_vec()),
        };
        let position = stream.offset();
        let scope = ParseScope {
            source: self.source,
            services: self.services,
            arguments: &*self.arguments,
        };
        let value = parser.parse(&mut stream, &scope).map_err(|err| match err {
            ArgumentError::Missing => {
                ParseError::new(token.end, "args.flag.novalue", vec![token.text.clone()])
            }
            err => ParseError::from_argument(err, &flag.long, position),
        })?;

        self.arguments.insert(&flag.long, value);
        Ok(if inline.is_some() { 0 } else { stream.snapshot() })
    }

    pub(super) fn parse_node(&mut self, node: &ParameterNode) -> Result<(), ParseError> {
        if !self.requirement_met(node) {
            return Ok(());
        }
        if node.optional && !self.tokens.has_next() {
            return Ok(());
        }

        let snapshot = self.snapshot();
        match self.parse_node_type(node) {
            Err(_) if node.optional => {
                self.restore(snapshot);
                Ok(())
            }
            result => result,
        }
    }

    fn parse_node_type(&mut self, node: &ParameterNode) -> Result<(), ParseError> {
        match &node.node_type {
            NodeType::Element { key, parser } => self.parse_element(key, parser.as_ref()),
            NodeType::Sequence(children) => {
                for child in children {
                    self.parse_node(child)?;
                }
                Ok(())
            }
            NodeType::Branch(alternatives) => self.parse_branch(alternatives),
        }
    }

    /// Parses the leading element of a branch alternative. The optional
    /// fallback of [`Parser::parse_node`] does not apply here, so an optional
    /// head that parses nothing does not select its alternative.
    pub(super) fn parse_head(&mut self, head: &ParameterNode) -> Result<(), ParseError> {
        self.parse_node_type(head)
    }

    pub(super) fn parse_element(
        &mut self,
        key: &str,
        parser: &dyn ParameterType,
    ) -> Result<(), ParseError> {
        let position = self.tokens.offset();
        let scope = ParseScope {
            source: self.source,
            services: self.services,
            arguments: &*self.arguments,
        };
        let value = parser
            .parse(&mut self.tokens, &scope)
            .map_err(|err| ParseError::from_argument(err, key, position))?;
        self.arguments.insert(key, value);
        Ok(())
    }

    /// Commits to the first alternative whose leading element parses. A
    /// failure later in that alternative is final. If no alternative
    /// matches, the error of the first one tried is reported.
    fn parse_branch(&mut self, alternatives: &[ParameterNode]) -> Result<(), ParseError> {
        let mut first_error = None;

        for alternative in alternatives {
            let (head, tail) = split_head(alternative);
            if !self.requirement_met(alternative) || !self.requirement_met(head) {
                continue;
            }

            let snapshot = self.snapshot();
            match self.parse_head(head) {
                Ok(()) => {
                    for node in tail {
                        if let Err(err) = self.parse_node(node) {
                            if alternative.optional {
                                self.restore(snapshot);
                                return Ok(());
                            }
                            return Err(err);
                        }
                    }
                    return Ok(());
                }
                Err(err) => {
                    self.restore(snapshot);
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            // Every alternative was hidden by its requirement.
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::argument::ArgumentType;
    use crate::testing::TestServices;

    fn run(tree: &ParameterTree, input: &str) -> (Result<(), ParseError>, ArgumentSet) {
        let harness = TestServices::new();
        let source = harness.player("alice");
        let mut arguments = ArgumentSet::empty();
        let result = parse(
            tree,
            &source,
            &harness.services,
            &mut arguments,
            TokenStream::new(input),
        );
        (result, arguments)
    }

    #[test]
    fn sequence_binds_in_order() {
        let tree = ParameterTree::new()
            .then(ParameterNode::argument("name", ArgumentType::string()))
            .then(ParameterNode::argument("count", ArgumentType::integer(0, 64)));

        let (result, args) = run(&tree, "stone 32");
        assert!(result.is_ok());
        assert_eq!(args.get_string("name").unwrap(), "stone");
        assert_eq!(args.get_integer("count").unwrap(), 32);
        assert_eq!(args.keys().collect::<Vec<_>>(), ["name", "count"]);
    }

    #[test]
    fn too_many_and_too_few_arguments() {
        let tree = ParameterTree::new()
            .then(ParameterNode::argument("a", ArgumentType::string()))
            .then(ParameterNode::argument("b", ArgumentType::string()));

        let (result, args) = run(&tree, "x y z");
        let err = result.unwrap_err();
        assert_eq!(err.key, "args.toomany");
        assert_eq!(err.position, 4);
        assert!(args.is_empty());

        let (result, args) = run(&tree, "x");
        let err = result.unwrap_err();
        assert_eq!(err.key, "args.missing");
        assert_eq!(err.args, ["b"]);
        assert!(args.is_empty());
    }

    #[test]
    fn optional_element_may_be_absent() {
        let tree = ParameterTree::new()
            .then(ParameterNode::argument("home", ArgumentType::string()).optional());

        let (result, args) = run(&tree, "");
        assert!(result.is_ok());
        assert!(!args.has("home"));
    }

    #[test]
    fn optional_failure_backtracks_to_next_element() {
        let tree = ParameterTree::new()
            .then(ParameterNode::argument("page", ArgumentType::integer(1, 100)).optional())
            .then(ParameterNode::argument("name", ArgumentType::string()));

        let (result, args) = run(&tree, "alice");
        assert!(result.is_ok());
        assert!(!args.has("page"));
        assert_eq!(args.get_string("name").unwrap(), "alice");
    }

    #[test]
    fn branch_commits_to_first_matching_head() {
        let tree = ParameterTree::new().branch([
            ParameterNode::argument("amount", ArgumentType::integer(0, 10))
                .then(ParameterNode::argument("unit", ArgumentType::choice(["s", "m"]))),
            ParameterNode::argument("name", ArgumentType::string())
                .then(ParameterNode::argument("extra", ArgumentType::string())),
        ]);

        // "5" parses as an integer, so the first alternative is committed to
        // even though "5 x" would satisfy the second one.
        let (result, args) = run(&tree, "5 x");
        assert_eq!(result.unwrap_err().key, "args.choice.invalid");
        assert!(args.is_empty());

        let (result, args) = run(&tree, "five x");
        assert!(result.is_ok());
        assert_eq!(args.get_string("name").unwrap(), "five");
        assert!(!args.has("amount"));
    }

    #[test]
    fn optional_head_must_parse_to_select_its_branch() {
        let tree = ParameterTree::new().branch([
            ParameterNode::argument("count", ArgumentType::integer(0, 10)).optional(),
            ParameterNode::argument("name", ArgumentType::string()),
        ]);

        let (result, args) = run(&tree, "abc");
        assert!(result.is_ok());
        assert!(!args.has("count"));
        assert_eq!(args.get_string("name").unwrap(), "abc");

        let (result, args) = run(&tree, "3");
        assert!(result.is_ok());
        assert_eq!(args.get_integer("count").unwrap(), 3);
        assert!(!args.has("name"));
    }

    #[test]
    fn branch_without_match_reports_first_alternative() {
        let tree = ParameterTree::new().branch([
            ParameterNode::argument("count", ArgumentType::integer(0, 10)),
            ParameterNode::argument("enabled", ArgumentType::boolean()),
        ]);

        let (result, _) = run(&tree, "maybe");
        let err = result.unwrap_err();
        assert_eq!(err.key, "args.integer.invalid");
        assert_eq!(err.args, ["maybe"]);
    }

    #[test]
    fn flags_are_extracted_anywhere() {
        let tree = ParameterTree::new()
            .flag('f', "force")
            .flag('s', "silent")
            .value_flag('r', "reason", ArgumentType::string())
            .then(ParameterNode::argument("target", ArgumentType::string()));

        let (result, args) = run(&tree, "-fs alice --reason=spam");
        assert!(result.is_ok());
        assert!(args.has_flag("force"));
        assert!(args.has_flag("silent"));
        assert_eq!(args.get_string("reason").unwrap(), "spam");
        assert_eq!(args.get_string("target").unwrap(), "alice");

        let (result, args) = run(&tree, "alice -r spam");
        assert!(result.is_ok());
        assert_eq!(args.get_string("reason").unwrap(), "spam");
    }

    #[test]
    fn terminator_and_negative_numbers_stay_positional() {
        let tree = ParameterTree::new()
            .flag('f', "force")
            .then(ParameterNode::argument("offset", ArgumentType::integer(-10, 10)))
            .then(ParameterNode::argument("text", ArgumentType::greedy_string()));

        let (result, args) = run(&tree, "-5 -- -f");
        assert!(result.is_ok());
        assert_eq!(args.get_integer("offset").unwrap(), -5);
        assert_eq!(args.get_string("text").unwrap(), "-f");
        assert!(!args.has_flag("force"));
    }

    #[test]
    fn value_flag_without_value_fails() {
        let tree = ParameterTree::new().value_flag('r', "reason", ArgumentType::string());

        let (result, _) = run(&tree, "--reason");
        assert_eq!(result.unwrap_err().key, "args.flag.novalue");
    }

    #[test]
    fn permission_flag_requires_permission() {
        let tree = ParameterTree::new().permission_flag('s', "silent", "nucleus.kick.silent");

        let (result, _) = run(&tree, "-s");
        assert_eq!(result.unwrap_err().key, "args.flag.nopermission");
    }

    #[test]
    fn requirement_hides_node() {
        let tree = ParameterTree::new().then(
            ParameterNode::argument("other", ArgumentType::string())
                .requires_permission("nucleus.home.others"),
        );

        let (result, args) = run(&tree, "");
        assert!(result.is_ok());
        assert!(!args.has("other"));

        let (result, _) = run(&tree, "bob");
        assert_eq!(result.unwrap_err().key, "args.toomany");
    }
}
