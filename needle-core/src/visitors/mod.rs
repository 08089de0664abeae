//! AST visitors.
//!
//! All visitors share one walking contract: depth-first traversal with
//! pre-order `enter` and post-order `leave`, an ancestor stack and a
//! depth counter maintained by the walker. `enter` returns a
//! skip-children flag, `leave` a continue-siblings flag. Visitors
//! accumulate errors instead of aborting; a visitor failed if its error
//! vector is non-empty once the walk finishes.

mod name_resolve;
mod output_extract;
mod param_extract;
mod star_elim;
mod type_inference;

pub use name_resolve::NameResolveVisitor;
pub use output_extract::{GoVar, OutputExtractVisitor};
pub use param_extract::{GoParam, ParamExtractVisitor, LIMIT_COUNT, LIMIT_OFFSET};
pub use star_elim::StarElimVisitor;
pub use type_inference::{TableCatalog, TypeInferenceVisitor};

use tracing::debug;

use crate::ast::{NodeId, NodeKind, SyntaxTree};
use crate::error::NeedleError;

/// The enter/leave contract every visitor implements.
pub trait Visitor {
    fn name(&self) -> &'static str;

    /// Pre-order hook; return true to skip the node's children.
    fn enter(&mut self, _tree: &mut SyntaxTree, _id: NodeId, _ctx: &WalkContext) -> bool {
        false
    }

    /// Post-order hook; return false to stop visiting the node's
    /// remaining siblings.
    fn leave(&mut self, _tree: &mut SyntaxTree, _id: NodeId, _ctx: &WalkContext) -> bool {
        true
    }
}

/// Walker state: the stack of ancestor nodes (innermost last, including
/// the current node during `enter`) and the traversal depth.
pub struct WalkContext {
    ancestors: Vec<NodeId>,
    depth: usize,
}

impl WalkContext {
    fn new() -> Self {
        WalkContext {
            ancestors: Vec::new(),
            depth: 0,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// True while entering the root node.
    pub fn is_entering_root(&self) -> bool {
        self.depth == 1
    }

    /// True while leaving the root node.
    pub fn is_leaving_root(&self) -> bool {
        self.depth == 0
    }

    /// The closest enclosing node whose kind matches `pred`.
    pub fn find_enclosing<F>(&self, tree: &SyntaxTree, pred: F) -> Option<NodeId>
    where
        F: Fn(&NodeKind) -> bool,
    {
        self.ancestors
            .iter()
            .rev()
            .copied()
            .find(|id| pred(tree.kind(*id)))
    }
}

/// Walk the whole tree.
pub fn walk(tree: &mut SyntaxTree, visitor: &mut dyn Visitor) {
    walk_from(tree, tree.root(), visitor);
}

/// Walk the subtree rooted at `start`.
pub fn walk_from(tree: &mut SyntaxTree, start: NodeId, visitor: &mut dyn Visitor) {
    let mut ctx = WalkContext::new();
    walk_node(tree, start, visitor, &mut ctx);
}

fn walk_node(
    tree: &mut SyntaxTree,
    id: NodeId,
    visitor: &mut dyn Visitor,
    ctx: &mut WalkContext,
) -> bool {
    ctx.ancestors.push(id);
    ctx.depth += 1;
    let skip_children = visitor.enter(tree, id, ctx);
    if !skip_children {
        // Children are enumerated after enter so that replacements made
        // by the visitor (star-elim) are walked instead of the originals.
        let children = tree.children(id);
        for child in children {
            if !walk_node(tree, child, visitor, ctx) {
                break;
            }
        }
    }
    ctx.ancestors.pop();
    ctx.depth -= 1;
    visitor.leave(tree, id, ctx)
}

/// Shared visitor state: name and accumulated errors.
pub struct VisitorCore {
    name: &'static str,
    errors: Vec<NeedleError>,
}

impl VisitorCore {
    pub fn new(name: &'static str) -> Self {
        VisitorCore {
            name,
            errors: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn append_err(&mut self, err: NeedleError) {
        debug!("[{}]: {}", self.name, err);
        self.errors.push(err);
    }

    pub fn extend(&mut self, errs: Vec<NeedleError>) {
        self.errors.extend(errs);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[NeedleError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<NeedleError> {
        self.errors
    }
}
