//! Arena-backed syntax tree for wire-format specifications
//!
//! Nodes live in a single `Vec` and refer to their children by [`NodeId`].
//! Every node has exactly one parent, so the tree never shares or cycles.

/// Index of a node within an [`Ast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Type a field refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    /// A primitive or a previously declared structure/union
    Named(String),
    /// Fixed-length array of a named element type
    Array { element: String, size: usize },
    /// Anonymous structure declared inline inside a union
    Inline(NodeId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Spec,
    Structure { name: Option<String> },
    Union { name: String },
    Field { name: String, ty: TypeRef },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    /// Children in declaration order
    pub children: Vec<NodeId>,
    /// Line the node was declared on
    pub line: usize,
}

/// Syntax tree produced by the parser. The root is always a `Spec` node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Default for Ast {
    fn default() -> Self {
        Self::new()
    }
}

impl Ast {
    pub fn new() -> Self {
        Self { nodes: vec![Node { kind: NodeKind::Spec, children: Vec::new(), line: 1 }] }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Allocate a detached node.
    pub fn alloc(&mut self, kind: NodeKind, line: usize) -> NodeId {
        self.nodes.push(Node { kind, children: Vec::new(), line });
        NodeId(self.nodes.len() - 1)
    }

    /// Attach `child` as the last child of `parent`.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.0].children.push(child);
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes[id.0].children.iter().map(|&child| (child, &self.nodes[child.0]))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }
}
