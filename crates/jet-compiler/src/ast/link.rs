//! Child traversal and the parent-linking pass.

use super::{ExprKind, Expression, NodeId};

impl Expression {
    /// Direct children in syntactic order.
    pub fn children(&self) -> Vec<&Expression> {
        let mut out = Vec::new();
        match &self.kind {
            ExprKind::Integer(_)
            | ExprKind::Real(_)
            | ExprKind::String(_)
            | ExprKind::Null
            | ExprKind::Name(_)
            | ExprKind::Break
            | ExprKind::Continue => {}
            ExprKind::Array(items) | ExprKind::Block(items) | ExprKind::Scope(items) => {
                out.extend(items.iter());
            }
            ExprKind::Object(entries) => out.extend(entries.iter().map(|e| &e.value)),
            ExprKind::Index(index) => {
                out.push(&*index.base);
                out.push(&*index.index);
            }
            ExprKind::Assign { target, value } | ExprKind::CompoundAssign { target, value, .. } => {
                out.push(&**target);
                out.push(&**value);
            }
            ExprKind::Swap { left, right } | ExprKind::Binary { left, right, .. } => {
                out.push(&**left);
                out.push(&**right);
            }
            ExprKind::Prefix { operand, .. }
            | ExprKind::Postfix { operand, .. }
            | ExprKind::Unary { operand, .. } => out.push(&**operand),
            ExprKind::While { condition, body } => {
                out.push(&**condition);
                out.push(&**body);
            }
            ExprKind::For {
                initial,
                condition,
                increment,
                body,
            } => {
                out.push(&**initial);
                out.push(&**condition);
                out.push(&**increment);
                out.push(&**body);
            }
            ExprKind::ForEach {
                container, body, ..
            } => {
                out.push(&**container);
                out.push(&**body);
            }
            ExprKind::If {
                branches,
                otherwise,
            } => {
                for branch in branches {
                    out.push(&branch.condition);
                    out.push(&branch.block);
                }
                if let Some(block) = otherwise {
                    out.push(&**block);
                }
            }
            ExprKind::Call { callee, arguments } => {
                out.push(&**callee);
                out.extend(arguments.iter());
            }
            ExprKind::Function(function) => {
                if let Some(name) = &function.name {
                    out.push(&**name);
                }
                out.push(&*function.body);
            }
            ExprKind::Class(class) => {
                out.extend(class.fields.iter().filter_map(|f| f.initializer.as_ref()));
                out.extend(class.methods.values());
            }
            ExprKind::Local(defines) | ExprKind::Global(defines) => {
                out.extend(defines.iter().filter_map(|d| d.initializer.as_ref()));
            }
            ExprKind::Return(value) | ExprKind::Yield(value) => {
                if let Some(value) = value {
                    out.push(&**value);
                }
            }
            ExprKind::Resume(target) => out.push(&**target),
        }
        out
    }

    /// Direct children, mutably, in the same order as [`Expression::children`].
    fn children_mut(&mut self) -> Vec<&mut Expression> {
        let mut out = Vec::new();
        match &mut self.kind {
            ExprKind::Integer(_)
            | ExprKind::Real(_)
            | ExprKind::String(_)
            | ExprKind::Null
            | ExprKind::Name(_)
            | ExprKind::Break
            | ExprKind::Continue => {}
            ExprKind::Array(items) | ExprKind::Block(items) | ExprKind::Scope(items) => {
                out.extend(items.iter_mut());
            }
            ExprKind::Object(entries) => out.extend(entries.iter_mut().map(|e| &mut e.value)),
            ExprKind::Index(index) => {
                out.push(&mut *index.base);
                out.push(&mut *index.index);
            }
            ExprKind::Assign { target, value } | ExprKind::CompoundAssign { target, value, .. } => {
                out.push(&mut **target);
                out.push(&mut **value);
            }
            ExprKind::Swap { left, right } | ExprKind::Binary { left, right, .. } => {
                out.push(&mut **left);
                out.push(&mut **right);
            }
            ExprKind::Prefix { operand, .. }
            | ExprKind::Postfix { operand, .. }
            | ExprKind::Unary { operand, .. } => out.push(&mut **operand),
            ExprKind::While { condition, body } => {
                out.push(&mut **condition);
                out.push(&mut **body);
            }
            ExprKind::For {
                initial,
                condition,
                increment,
                body,
            } => {
                out.push(&mut **initial);
                out.push(&mut **condition);
                out.push(&mut **increment);
                out.push(&mut **body);
            }
            ExprKind::ForEach {
                container, body, ..
            } => {
                out.push(&mut **container);
                out.push(&mut **body);
            }
            ExprKind::If {
                branches,
                otherwise,
            } => {
                for branch in branches.iter_mut() {
                    out.push(&mut branch.condition);
                    out.push(&mut branch.block);
                }
                if let Some(block) = otherwise {
                    out.push(&mut **block);
                }
            }
            ExprKind::Call { callee, arguments } => {
                out.push(&mut **callee);
                out.extend(arguments.iter_mut());
            }
            ExprKind::Function(function) => {
                if let Some(name) = &mut function.name {
                    out.push(&mut **name);
                }
                out.push(&mut *function.body);
            }
            ExprKind::Class(class) => {
                out.extend(class.fields.iter_mut().filter_map(|f| f.initializer.as_mut()));
                out.extend(class.methods.values_mut());
            }
            ExprKind::Local(defines) | ExprKind::Global(defines) => {
                out.extend(defines.iter_mut().filter_map(|d| d.initializer.as_mut()));
            }
            ExprKind::Return(value) | ExprKind::Yield(value) => {
                if let Some(value) = value {
                    out.push(&mut **value);
                }
            }
            ExprKind::Resume(target) => out.push(&mut **target),
        }
        out
    }

    /// Numbers every node in pre-order and records each node's parent.
    ///
    /// `self` becomes the root: its parent is cleared. Returns the number of
    /// nodes in the tree. Linking again renumbers from scratch.
    pub fn link_parents(&mut self) -> u32 {
        let mut next = 0;
        self.link(None, &mut next);
        next
    }

    fn link(&mut self, parent: Option<NodeId>, next: &mut u32) {
        self.id = NodeId(*next);
        self.parent = parent;
        *next += 1;

        let id = self.id;
        for child in self.children_mut() {
            child.link(Some(id), next);
        }
    }

    /// Checks that every child's parent is the node that owns it and that
    /// `self` has no parent.
    pub fn verify_links(&self) -> bool {
        self.parent.is_none() && self.children_linked()
    }

    fn children_linked(&self) -> bool {
        self.children()
            .into_iter()
            .all(|child| child.parent == Some(self.id) && child.children_linked())
    }

    /// Finds the node with the given id in this subtree.
    pub fn find(&self, id: NodeId) -> Option<&Expression> {
        if self.id == id {
            return Some(self);
        }
        self.children().into_iter().find_map(|child| child.find(id))
    }

    /// Looks up the parent of `node`, where `self` is the linked root.
    pub fn parent_of(&self, node: &Expression) -> Option<&Expression> {
        node.parent.and_then(|id| self.find(id))
    }

    /// Number of nodes in this subtree.
    pub fn node_count(&self) -> usize {
        1 + self
            .children()
            .into_iter()
            .map(Expression::node_count)
            .sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;

    fn sample() -> Expression {
        // { x = [1, 2]; while (x) { yield x[0]; } }
        Expression::block(
            1,
            vec![
                Expression::assign(
                    1,
                    Expression::name(1, "x"),
                    Expression::new(
                        1,
                        ExprKind::Array(vec![Expression::integer(1, 1), Expression::integer(1, 2)]),
                    ),
                ),
                Expression::new(
                    2,
                    ExprKind::While {
                        condition: Box::new(Expression::name(2, "x")),
                        body: Box::new(Expression::scope(
                            2,
                            vec![Expression::new(
                                3,
                                ExprKind::Yield(Some(Box::new(Expression::index(
                                    3,
                                    Expression::name(3, "x"),
                                    Expression::integer(3, 0),
                                )))),
                            )],
                        )),
                    },
                ),
            ],
        )
    }

    #[test]
    fn test_link_counts_every_node() {
        let mut root = sample();
        let count = root.link_parents();
        assert_eq!(count as usize, root.node_count());
        assert_eq!(count, 13);
    }

    #[test]
    fn test_link_root_has_no_parent() {
        let mut root = sample();
        root.link_parents();
        assert_eq!(root.parent, None);
        assert_eq!(root.id, NodeId(0));
    }

    #[test]
    fn test_link_parents_match_owners() {
        let mut root = sample();
        assert!(!root.verify_links());
        root.link_parents();
        assert!(root.verify_links());
    }

    #[test]
    fn test_parent_lookup() {
        let mut root = sample();
        root.link_parents();

        let while_loop = root.children()[1];
        let body = while_loop.children()[1];
        let yield_node = body.children()[0];
        let parent = root.parent_of(yield_node).unwrap();
        assert!(matches!(parent.kind, ExprKind::Scope(_)));
        assert_eq!(parent.id, body.id);
    }

    #[test]
    fn test_relinking_a_subtree_clears_its_parent() {
        let mut root = sample();
        root.link_parents();
        let ExprKind::Block(statements) = &mut root.kind else {
            unreachable!()
        };
        let mut detached = statements.remove(1);
        assert!(detached.parent.is_some());
        detached.link_parents();
        assert!(detached.verify_links());
    }

    #[test]
    fn test_class_children_include_fields_and_methods() {
        let mut methods = std::collections::BTreeMap::new();
        methods.insert(
            "get".to_string(),
            Expression::new(
                4,
                ExprKind::Function(FunctionExpression {
                    name: None,
                    params: vec![],
                    body: Box::new(Expression::scope(4, vec![])),
                    varargs: None,
                    is_method: true,
                }),
            ),
        );
        let mut class = Expression::new(
            3,
            ExprKind::Class(ClassExpression {
                name: Token::new("Point", 3),
                base: None,
                methods,
                fields: vec![
                    VarDefine::new(Token::new("x", 3), Some(Expression::integer(3, 0))),
                    VarDefine::new(Token::new("y", 3), None),
                ],
            }),
        );
        // class, field initializer, method, method body
        assert_eq!(class.link_parents(), 4);
        assert!(class.verify_links());
    }
}
