// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Arena-backed syntax tree.
//!
//! Nodes are allocated once and addressed by [`NodeId`]. The parent link of a
//! node is written exactly once, when the node is attached under the node that
//! owns it. All structural queries are read-only walks over the arena.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AstError, Result};
use crate::syntax::{NodeKind, Syntax, SyntaxKind, SyntaxTree, SyntaxVariant};

/// Stable identifier of a node inside its [`Ast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Order in which [`Ast::contains`] visits descendants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Traversal {
    #[default]
    DepthFirst,
    BreadthFirst,
}

#[derive(Debug, Clone)]
struct NodeData {
    syntax: Syntax,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// The syntax tree arena.
#[derive(Debug, Clone, Default)]
pub struct Ast {
    nodes: Vec<NodeData>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an upstream tree and return the arena together with the root.
    pub fn from_tree(tree: &SyntaxTree) -> Result<(Ast, NodeId)> {
        let mut ast = Ast::new();
        let root = ast.insert_tree(tree)?;
        Ok((ast, root))
    }

    /// Allocate an upstream tree into this arena, children first.
    pub fn insert_tree(&mut self, tree: &SyntaxTree) -> Result<NodeId> {
        let syntax = tree.0.try_map(&mut |child: &SyntaxTree| self.insert_tree(child))?;
        self.add(syntax)
    }

    /// Rebuild the nested form of the subtree rooted at `id`.
    pub fn to_tree(&self, id: NodeId) -> SyntaxTree {
        let syntax = self
            .syntax(id)
            .try_map(&mut |child: &NodeId| Ok::<_, std::convert::Infallible>(self.to_tree(*child)));
        match syntax {
            Ok(syntax) => SyntaxTree::new(syntax),
            Err(never) => match never {},
        }
    }

    /// Allocate a node and attach each of its children to it.
    ///
    /// Fails with [`AstError::AlreadyAttached`] when a child already has a
    /// parent; in that case nothing is allocated.
    pub fn add(&mut self, syntax: Syntax) -> Result<NodeId> {
        let id = NodeId(self.nodes.len() as u32);
        let children: Vec<NodeId> = syntax.children().into_iter().copied().collect();
        for (i, child) in children.iter().enumerate() {
            if let Some(parent) = self.node(*child)?.parent {
                return Err(AstError::AlreadyAttached {
                    node: *child,
                    parent,
                });
            }
            if children[..i].contains(child) {
                return Err(AstError::AlreadyAttached {
                    node: *child,
                    parent: id,
                });
            }
        }
        self.nodes.push(NodeData {
            syntax,
            parent: None,
            children: Vec::with_capacity(children.len()),
        });
        for child in children {
            self.set_parent(child, id)?;
        }
        Ok(id)
    }

    /// Attach `child` under `parent`, appending it to the parent's children.
    ///
    /// [`Ast::add`] calls this for every child field of a new node; a node can
    /// be attached at most once.
    pub fn set_parent(&mut self, child: NodeId, parent: NodeId) -> Result<()> {
        self.node(parent)?;
        if let Some(existing) = self.node(child)?.parent {
            return Err(AstError::AlreadyAttached {
                node: child,
                parent: existing,
            });
        }
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
        Ok(())
    }

    fn node(&self, id: NodeId) -> Result<&NodeData> {
        self.nodes.get(id.index()).ok_or(AstError::UnknownNode { node: id })
    }

    /// Every allocated node, in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + use<> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn syntax(&self, id: NodeId) -> &Syntax {
        &self.nodes[id.index()].syntax
    }

    pub fn kind(&self, id: NodeId) -> SyntaxKind {
        self.syntax(id).kind()
    }

    pub fn node_kind(&self, id: NodeId) -> NodeKind {
        self.kind(id).node_kind()
    }

    pub fn is_statement(&self, id: NodeId) -> bool {
        self.node_kind(id) == NodeKind::Statement
    }

    pub fn is_expression(&self, id: NodeId) -> bool {
        self.node_kind(id) == NodeKind::Expression
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    /// Narrow `id` to the variant `T`, failing with
    /// [`AstError::TypeMismatch`] when the node is of another kind.
    pub fn cast<T: SyntaxVariant>(&self, id: NodeId) -> Result<&T> {
        T::from_syntax(self.syntax(id)).ok_or(AstError::TypeMismatch {
            node: id,
            expected: T::KIND,
            actual: self.kind(id),
        })
    }

    /// Narrow `id` to the variant `T` without raising.
    pub fn try_cast<T: SyntaxVariant>(&self, id: NodeId) -> Option<&T> {
        T::from_syntax(self.syntax(id))
    }

    /// Fail with [`AstError::TypeMismatch`] unless `id` is of `kind`.
    pub fn expect_kind(&self, id: NodeId, kind: SyntaxKind) -> Result<&Syntax> {
        let actual = self.kind(id);
        if actual == kind {
            Ok(self.syntax(id))
        } else {
            Err(AstError::TypeMismatch {
                node: id,
                expected: kind,
                actual,
            })
        }
    }

    /// Test `id` against a type guard.
    pub fn is(&self, id: NodeId, guard: impl Fn(&Syntax) -> bool) -> bool {
        guard(self.syntax(id))
    }

    /// Direct children for which `predicate` holds.
    pub fn find_children(&self, id: NodeId, predicate: impl Fn(&Ast, NodeId) -> bool) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|child| predicate(self, *child))
            .collect()
    }

    /// Map every descendant of `id` (pre-order) and flatten the results.
    pub fn collect_children<T, I>(&self, id: NodeId, mut mapper: impl FnMut(&Ast, NodeId) -> I) -> Vec<T>
    where
        I: IntoIterator<Item = T>,
    {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.extend(mapper(self, node));
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            ast: self,
            next: self.parent(id),
        }
    }

    /// The nearest ancestor for which `predicate` holds.
    pub fn find_parent(&self, id: NodeId, predicate: impl Fn(&Ast, NodeId) -> bool) -> Option<NodeId> {
        self.ancestors(id).find(|a| predicate(self, *a))
    }

    /// The nearest ancestor of the given kind.
    pub fn find_parent_kind(&self, id: NodeId, kind: SyntaxKind) -> Option<NodeId> {
        self.find_parent(id, |ast, a| ast.kind(a) == kind)
    }

    /// True when `node` is a strict descendant of `ancestor`.
    pub fn contains(&self, ancestor: NodeId, node: NodeId, traversal: Traversal) -> bool {
        match traversal {
            Traversal::DepthFirst => {
                let mut stack: Vec<NodeId> = self.children(ancestor).to_vec();
                while let Some(current) = stack.pop() {
                    if current == node {
                        return true;
                    }
                    stack.extend_from_slice(self.children(current));
                }
                false
            }
            Traversal::BreadthFirst => {
                let mut queue: VecDeque<NodeId> = self.children(ancestor).iter().copied().collect();
                while let Some(current) = queue.pop_front() {
                    if current == node {
                        return true;
                    }
                    queue.extend(self.children(current).iter().copied());
                }
                false
            }
        }
    }

    /// Deep-copy the subtree rooted at `id` into fresh, unattached nodes.
    pub fn clone_subtree(&mut self, id: NodeId) -> Result<NodeId> {
        let syntax = self.syntax(id).clone();
        let copied = syntax.try_map(&mut |child: &NodeId| self.clone_subtree(*child))?;
        self.add(copied)
    }

    /// Structural equality of two subtrees, ignoring node identity.
    pub fn structurally_eq(&self, a: NodeId, b: NodeId) -> bool {
        let shape = |id: NodeId| {
            self.syntax(id)
                .try_map(&mut |_| Ok::<_, std::convert::Infallible>(()))
                .ok()
        };
        if shape(a) != shape(b) {
            return false;
        }
        let (left, right) = (self.children(a), self.children(b));
        left.len() == right.len()
            && left
                .iter()
                .zip(right)
                .all(|(l, r)| self.structurally_eq(*l, *r))
    }
}

/// Iterator returned by [`Ast::ancestors`].
pub struct Ancestors<'a> {
    ast: &'a Ast,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.ast.parent(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{
        Block, CallExpr, ExprStmt, Identifier, NumberLiteral, ReturnStmt, StringLiteral,
    };
    use serde_json::json;

    fn sample() -> (Ast, NodeId) {
        let tree: SyntaxTree = serde_json::from_value(json!({
            "kind": "Block",
            "statements": [
                { "kind": "ExprStmt", "expression": {
                    "kind": "CallExpr",
                    "callee": { "kind": "Identifier", "name": "f" },
                    "arguments": [{ "kind": "NumberLiteral", "value": 1 }]
                }},
                { "kind": "ReturnStmt", "expression": { "kind": "StringLiteral", "value": "done" } }
            ]
        }))
        .unwrap();
        Ast::from_tree(&tree).unwrap()
    }

    #[test]
    fn test_from_tree_links_parents() {
        let (ast, root) = sample();
        let statements = ast.children(root).to_vec();
        assert_eq!(statements.len(), 2);
        for stmt in &statements {
            assert_eq!(ast.parent(*stmt), Some(root));
        }
        assert_eq!(ast.parent(root), None);
        assert_eq!(ast.kind(statements[1]), SyntaxKind::ReturnStmt);
    }

    #[test]
    fn test_cast_reports_type_mismatch() {
        let (ast, root) = sample();
        assert!(ast.cast::<Block>(root).is_ok());
        let err = ast.cast::<ReturnStmt>(root).unwrap_err();
        assert_eq!(
            err,
            AstError::TypeMismatch {
                node: root,
                expected: SyntaxKind::ReturnStmt,
                actual: SyntaxKind::Block,
            }
        );
        assert!(ast.try_cast::<ExprStmt>(root).is_none());
    }

    #[test]
    fn test_add_rejects_second_parent() {
        let mut ast = Ast::new();
        let name = ast.add(Syntax::Identifier(Identifier { name: "x".into() })).unwrap();
        let stmt = ast.add(Syntax::ExprStmt(ExprStmt { expression: name })).unwrap();
        let err = ast.add(Syntax::ExprStmt(ExprStmt { expression: name })).unwrap_err();
        assert_eq!(
            err,
            AstError::AlreadyAttached {
                node: name,
                parent: stmt
            }
        );
    }

    #[test]
    fn test_foreign_ids_are_rejected() {
        let (other, _) = sample();
        let foreign = NodeId(other.len() as u32 + 10);

        let mut ast = Ast::new();
        let err = ast.add(Syntax::ExprStmt(ExprStmt { expression: foreign })).unwrap_err();
        assert_eq!(err, AstError::UnknownNode { node: foreign });
        assert!(ast.is_empty());

        let name = ast.add(Syntax::Identifier(Identifier { name: "x".into() })).unwrap();
        assert_eq!(
            ast.set_parent(name, foreign).unwrap_err(),
            AstError::UnknownNode { node: foreign }
        );
        assert_eq!(
            ast.set_parent(foreign, name).unwrap_err(),
            AstError::UnknownNode { node: foreign }
        );
        assert_eq!(ast.parent(name), None);
    }

    #[test]
    fn test_contains_both_traversals() {
        let (ast, root) = sample();
        let call = ast
            .collect_children(root, |ast, id| ast.try_cast::<CallExpr>(id).map(|_| id))
            .pop()
            .unwrap();
        let literal = *ast.children(call).last().unwrap();
        assert!(ast.contains(root, literal, Traversal::DepthFirst));
        assert!(ast.contains(root, literal, Traversal::BreadthFirst));
        assert!(!ast.contains(literal, root, Traversal::DepthFirst));
        assert!(!ast.contains(root, root, Traversal::BreadthFirst));
    }

    #[test]
    fn test_find_parent_and_children() {
        let (ast, root) = sample();
        let literals = ast.collect_children(root, |ast, id| {
            ast.try_cast::<NumberLiteral>(id).map(|lit| lit.value)
        });
        assert_eq!(literals, vec![1.0]);

        let returns = ast.find_children(root, |ast, id| ast.kind(id) == SyntaxKind::ReturnStmt);
        assert_eq!(returns.len(), 1);
        let text = ast.children(returns[0])[0];
        assert!(ast.try_cast::<StringLiteral>(text).is_some());
        assert_eq!(ast.find_parent_kind(text, SyntaxKind::Block), Some(root));
    }

    #[test]
    fn test_clone_subtree_is_structurally_equal_and_detached() {
        let (mut ast, root) = sample();
        let copy = ast.clone_subtree(root).unwrap();
        assert_ne!(copy, root);
        assert_eq!(ast.parent(copy), None);
        assert!(ast.structurally_eq(root, copy));

        let first = ast.children(root)[0];
        assert!(!ast.structurally_eq(first, ast.children(root)[1]));
    }

    #[test]
    fn test_to_tree_round_trips() {
        let (ast, root) = sample();
        let tree = ast.to_tree(root);
        let (again, again_root) = Ast::from_tree(&tree).unwrap();
        assert_eq!(again.len(), ast.len());
        assert_eq!(again.to_tree(again_root), tree);
    }
}
