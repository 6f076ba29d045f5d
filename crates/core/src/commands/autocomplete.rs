use crate::commands::{
    argument::{Completions, FlagSpec, ParseScope},
    argument_parser::{tokenize, TokenStream},
    argument_set::ArgumentSet,
    node::{NodeType, ParameterNode, ParameterTree},
    parser::{split_head, Parser},
};
use crate::services::{Services, SubjectRef};
use itertools::Itertools;

pub const MAX_COMPLETIONS: usize = 20;

/// Splits a partial command line into the finished tokens and the word
/// still being typed.
pub(super) fn split_partial(input: &str) -> (TokenStream, String) {
    let mut tokens = tokenize(input);
    let partial = if input.is_empty() || input.ends_with(char::is_whitespace) {
        String::new()
    } else {
        tokens.pop().map(|token| token.text).unwrap_or_default()
    };
    (TokenStream::from_tokens(input, tokens), partial)
}

pub(super) fn matches_prefix(candidate: &str, partial: &str) -> bool {
    candidate.to_lowercase().starts_with(&partial.to_lowercase())
}

/// Completion candidates for the word being typed at the end of `input`.
///
/// Candidate sources are chained lazily, so a parameter type with many
/// candidates is only read until [`MAX_COMPLETIONS`] matches are found.
pub(super) fn complete(
    tree: &ParameterTree,
    source: &SubjectRef,
    services: &Services,
    tokens: TokenStream,
    partial: &str,
) -> Vec<String> {
    let mut arguments = ArgumentSet::empty();
    let mut parser = Parser {
        source,
        services,
        arguments: &mut arguments,
        tokens,
    };

    let mut sources: Vec<Completions<'_>> = Vec::new();
    if partial.starts_with('-') && !tree.flags.is_empty() {
        sources.push(Box::new(parser.flag_candidates(&tree.flags).into_iter()));
    } else {
        if parser.extract_flags(&tree.flags).is_err() {
            return Vec::new();
        }
        parser.complete_nodes(&tree.elements, partial, &mut sources);
    }

    sources
        .into_iter()
        .flatten()
        .filter(|candidate| matches_prefix(candidate, partial))
        .unique()
        .take(MAX_COMPLETIONS)
        .collect()
}

impl Parser<'_> {
    fn flag_candidates(&self, flags: &[FlagSpec]) -> Vec<String> {
        let mut candidates = Vec::new();
        for flag in flags {
            if let Some(permission) = &flag.permission {
                if !self.services.has_permission(self.source.as_ref(), permission) {
                    continue;
                }
            }
            candidates.push(format!("--{}", flag.long));
            if let Some(short) = flag.short {
                candidates.push(format!("-{short}"));
            }
        }
        candidates
    }

    /// Walks `nodes` with the finished tokens. Returns true once the walk
    /// has reached the node the partial word belongs to, or a dead end.
    fn complete_nodes<'t>(
        &mut self,
        nodes: &'t [ParameterNode],
        partial: &'t str,
        out: &mut Vec<Completions<'t>>,
    ) -> bool {
        for node in nodes {
            if !self.requirement_met(node) {
                continue;
            }

            if !self.tokens.has_next() {
                self.first_candidates(node, partial, out);
                if node.optional {
                    continue;
                }
                return true;
            }

            let snapshot = self.snapshot();
            let stop = match &node.node_type {
                NodeType::Element { key, parser } => {
                    if self.parse_element(key, parser.as_ref()).is_err() {
                        self.restore(snapshot);
                        if node.optional {
                            continue;
                        }
                        return true;
                    }
                    false
                }
                NodeType::Sequence(children) => self.complete_nodes(children, partial, out),
                NodeType::Branch(alternatives) => {
                    self.complete_branch(alternatives, partial, out)
                }
            };
            if stop {
                return true;
            }
        }
        false
    }

    fn complete_branch<'t>(
        &mut self,
        alternatives: &'t [ParameterNode],
        partial: &'t str,
        out: &mut Vec<Completions<'t>>,
    ) -> bool {
        for alternative in alternatives {
            let (head, tail) = split_head(alternative);
            if !self.requirement_met(alternative) || !self.requirement_met(head) {
                continue;
            }
            let snapshot = self.snapshot();
            if self.parse_head(head).is_ok() {
                return self.complete_nodes(tail, partial, out);
            }
            self.restore(snapshot);
        }
        true
    }

    fn first_candidates<'t>(
        &self,
        node: &'t ParameterNode,
        partial: &'t str,
        out: &mut Vec<Completions<'t>>,
    ) {
        if !self.requirement_met(node) {
            return;
        }
        match &node.node_type {
            NodeType::Element { parser, .. } => {
                let scope = ParseScope {
                    source: self.source,
                    services: self.services,
                    arguments: &*self.arguments,
                };
                out.push(parser.complete(partial, &scope));
            }
            NodeType::Sequence(children) => {
                for child in children {
                    self.first_candidates(child, partial, out);
                    if !child.optional {
                        break;
                    }
                }
            }
            NodeType::Branch(alternatives) => {
                for alternative in alternatives {
                    self.first_candidates(alternative, partial, out);
                }
            }
        }
    }
}
