use crate::commands::argument::{FlagSpec, OptionChar, ParameterType, ParseScope};
use std::sync::Arc;

pub type Requirement = Arc<dyn Fn(&ParseScope<'_>) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct ParameterNode {
    pub(super) node_type: NodeType,
    pub(super) optional: bool,
    pub(super) requirement: Option<Requirement>,
}

#[derive(Clone)]
pub enum NodeType {
    Element {
        key: String,
        parser: Arc<dyn ParameterType>,
    },
    Sequence(Vec<ParameterNode>),
    /// Alternatives tried in declaration order. The first whose leading
    /// element parses is committed to.
    Branch(Vec<ParameterNode>),
}

impl ParameterNode {
    fn new(node_type: NodeType) -> Self {
        Self {
            node_type,
            optional: false,
            requirement: None,
        }
    }

    pub fn argument(key: impl Into<String>, parser: impl ParameterType + 'static) -> Self {
        Self::new(NodeType::Element {
            key: key.into(),
            parser: Arc::new(parser),
        })
    }

    pub fn sequence(children: impl IntoIterator<Item = ParameterNode>) -> Self {
        Self::new(NodeType::Sequence(children.into_iter().collect()))
    }

    pub fn branch(alternatives: impl IntoIterator<Item = ParameterNode>) -> Self {
        Self::new(NodeType::Branch(alternatives.into_iter().collect()))
    }

    /// Appends `next` after this node.
    pub fn then(mut self, next: ParameterNode) -> Self {
        if !self.optional && self.requirement.is_none() {
            if let NodeType::Sequence(children) = &mut self.node_type {
                children.push(next);
                return self;
            }
        }
        Self::sequence([self, next])
    }

    pub fn or(mut self, alternative: ParameterNode) -> Self {
        let NodeType::Branch(alternatives) = &mut self.node_type else {
            panic!("Can not add alternatives to a non-branch parameter node")
        };
        alternatives.push(alternative);
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// The node is skipped, as if absent, unless `requirement` holds.
    pub fn requires(
        mut self,
        requirement: impl Fn(&ParseScope<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.requirement = Some(Arc::new(requirement));
        self
    }

    pub fn requires_permission(self, permission: impl Into<String>) -> Self {
        let permission = permission.into();
        self.requires(move |scope| scope.has_permission(&permission))
    }

    /// Replaces the parsing strategy of an argument node.
    pub fn parsed_by(mut self, parser: impl ParameterType + 'static) -> Self {
        let NodeType::Element { parser: current, .. } = &mut self.node_type else {
            panic!("Can not set a parser on a non-argument parameter node")
        };
        *current = Arc::new(parser);
        self
    }

    pub(super) fn requirement_met(&self, scope: &ParseScope<'_>) -> bool {
        self.requirement
            .as_ref()
            .is_none_or(|requirement| requirement(scope))
    }
}

/// The parameters of one command: an ordered list of nodes plus the flags
/// that may appear anywhere before a `--` terminator.
#[derive(Clone, Default)]
pub struct ParameterTree {
    pub(super) elements: Vec<ParameterNode>,
    pub(super) flags: Vec<FlagSpec>,
}

impl ParameterTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, node: ParameterNode) -> Self {
        self.elements.push(node);
        self
    }

    pub fn branch(self, alternatives: impl IntoIterator<Item = ParameterNode>) -> Self {
        self.then(ParameterNode::branch(alternatives))
    }

    pub fn flag(self, short: impl Into<OptionChar>, long: &str) -> Self {
        self.with_flag(FlagSpec::new(short, long))
    }

    pub fn permission_flag(
        self,
        short: impl Into<OptionChar>,
        long: &str,
        permission: impl Into<String>,
    ) -> Self {
        self.with_flag(FlagSpec::new(short, long).permission(permission))
    }

    pub fn value_flag(
        self,
        short: impl Into<OptionChar>,
        long: &str,
        parser: impl ParameterType + 'static,
    ) -> Self {
        self.with_flag(FlagSpec::new(short, long).value(parser))
    }

    pub fn with_flag(mut self, flag: FlagSpec) -> Self {
        self.flags.push(flag);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.flags.is_empty()
    }
}
