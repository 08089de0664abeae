//! Name resolution: fully qualify every bare column reference against
//! the innermost enclosing statement's table references, reporting
//! ambiguity.

use super::{Visitor, VisitorCore, WalkContext};
use crate::ast::{NodeId, NodeKind, SyntaxTree};
use crate::error::{NeedleError, NeedleResult};
use crate::schema::TableInfo;

pub struct NameResolveVisitor {
    core: VisitorCore,
    // (table name, column names) in declaration order.
    db: Vec<(String, Vec<String>)>,
}

impl NameResolveVisitor {
    pub fn new(tables: &[TableInfo]) -> NameResolveVisitor {
        NameResolveVisitor {
            core: VisitorCore::new("NameResolve"),
            db: tables
                .iter()
                .map(|t| {
                    (
                        t.name(),
                        t.columns().into_iter().map(|c| c.name).collect(),
                    )
                })
                .collect(),
        }
    }

    pub fn errors(&self) -> &[NeedleError] {
        self.core.errors()
    }

    pub fn finish(self) -> NeedleResult<()> {
        if self.core.has_errors() {
            return Err(NeedleError::merge(self.core.into_errors()));
        }
        Ok(())
    }

    fn lookup(&self, col: &str, table: &str) -> bool {
        self.db
            .iter()
            .find(|(name, _)| name == table)
            .is_some_and(|(_, cols)| cols.iter().any(|c| c == col))
    }

    /// Collect the tables in the reference tree that own `col`.
    fn collect_owners(&mut self, tree: &SyntaxTree, id: NodeId, col: &str, out: &mut Vec<String>) {
        match tree.kind(id) {
            NodeKind::Join { left, right, .. } => {
                let (left, right) = (*left, *right);
                self.collect_owners(tree, left, col, out);
                self.collect_owners(tree, right, col, out);
            }
            NodeKind::TableSource { source, .. } => match tree.kind(*source) {
                NodeKind::TableName { name } => {
                    if self.lookup(col, name) {
                        out.push(name.clone());
                    }
                }
                NodeKind::Select { .. } => {
                    self.core
                        .append_err(NeedleError::NotSupported("subquery".into()));
                }
                _ => {}
            },
            _ => {}
        }
    }

    fn resolve(&mut self, tree: &SyntaxTree, col: &str, from: Option<NodeId>) -> Option<String> {
        let from = from?;
        let mut owners = Vec::new();
        self.collect_owners(tree, from, col, &mut owners);
        if owners.len() == 1 {
            return Some(owners.remove(0));
        }
        self.core.append_err(NeedleError::InvalidExpr(format!(
            "ambiguous expression: {}, multiple defs: [{}]",
            col,
            owners.join(" ")
        )));
        None
    }

    /// Resolve `col` against the closest enclosing statement.
    fn find_closest_def(
        &mut self,
        tree: &SyntaxTree,
        ctx: &WalkContext,
        col: &str,
    ) -> Option<String> {
        let stmt = ctx.find_enclosing(tree, |k| {
            matches!(
                k,
                NodeKind::Select { .. }
                    | NodeKind::Update { .. }
                    | NodeKind::Delete { .. }
                    | NodeKind::Insert { .. }
            )
        })?;
        let from = match tree.kind(stmt) {
            NodeKind::Select { from, .. } => *from,
            NodeKind::Update { table, .. } => Some(*table),
            NodeKind::Delete { table, .. } => Some(*table),
            NodeKind::Insert { table, .. } => Some(*table),
            _ => {
                self.core.append_err(NeedleError::Compiler(
                    "unexpected enclosing statement kind".into(),
                ));
                return None;
            }
        };
        match self.resolve(tree, col, from) {
            Some(name) => Some(name),
            None => {
                self.core.append_err(NeedleError::InvalidExpr(format!(
                    "cannot find the column of ({})",
                    col
                )));
                None
            }
        }
    }
}

impl Visitor for NameResolveVisitor {
    fn name(&self) -> &'static str {
        self.core.name()
    }

    fn enter(&mut self, tree: &mut SyntaxTree, id: NodeId, ctx: &WalkContext) -> bool {
        let NodeKind::ColumnName {
            schema,
            table,
            name,
        } = tree.kind(id)
        else {
            return false;
        };
        if !schema.is_empty() {
            self.core.append_err(NeedleError::Compiler(format!(
                "schema not supported: {}",
                tree.restore(id)
            )));
            return false;
        }
        if !table.is_empty() {
            return false;
        }
        let col = name.clone();
        if let Some(owner) = self.find_closest_def(tree, ctx, &col) {
            if let NodeKind::ColumnName { table, .. } = &mut tree.node_mut(id).kind {
                *table = owner;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_one;
    use crate::visitors::walk;

    fn tables() -> Vec<TableInfo> {
        let u = parse_one(
            "CREATE TABLE u (userid BIGINT NOT NULL, username VARCHAR(64) NOT NULL)",
        )
        .unwrap();
        let h = parse_one("CREATE TABLE h (id BIGINT NOT NULL, username VARCHAR(64) NOT NULL)")
            .unwrap();
        vec![
            TableInfo::new(u, vec![]).unwrap(),
            TableInfo::new(h, vec![]).unwrap(),
        ]
    }

    #[test]
    fn test_bare_columns_become_qualified() {
        let db = tables();
        let mut tree = parse_one("SELECT userid FROM u WHERE username = ?").unwrap();
        let mut v = NameResolveVisitor::new(&db);
        walk(&mut tree, &mut v);
        v.finish().unwrap();
        assert_eq!(
            tree.sql(),
            "SELECT u.userid FROM u WHERE u.username = ?"
        );
    }

    #[test]
    fn test_ambiguous_column_reports_both_errors() {
        let db = tables();
        let mut tree =
            parse_one("SELECT username FROM u JOIN h ON u.userid = h.id").unwrap();
        let mut v = NameResolveVisitor::new(&db);
        walk(&mut tree, &mut v);
        let errs = v.errors();
        assert_eq!(errs.len(), 2, "{:?}", errs);
        assert_eq!(
            errs[0].to_string(),
            "[InvalidExpr] ambiguous expression: username, multiple defs: [u h]"
        );
        assert_eq!(
            errs[1].to_string(),
            "[InvalidExpr] cannot find the column of (username)"
        );
    }

    #[test]
    fn test_unknown_column_cannot_be_found() {
        let db = tables();
        let mut tree = parse_one("SELECT nosuch FROM u").unwrap();
        let mut v = NameResolveVisitor::new(&db);
        walk(&mut tree, &mut v);
        assert!(v
            .errors()
            .iter()
            .any(|e| e.to_string().contains("cannot find the column of (nosuch)")));
    }

    #[test]
    fn test_insert_columns_are_resolved() {
        let db = tables();
        let mut tree = parse_one("INSERT INTO u (userid, username) VALUES (?, ?)").unwrap();
        let mut v = NameResolveVisitor::new(&db);
        walk(&mut tree, &mut v);
        v.finish().unwrap();
        // Restored text keeps bare insert columns, but the nodes are
        // qualified for the extraction passes.
        assert_eq!(tree.sql(), "INSERT INTO u (userid, username) VALUES (?, ?)");
        let NodeKind::Insert { columns, .. } = tree.kind(tree.root()) else {
            panic!("not an insert");
        };
        let NodeKind::ColumnName { table, .. } = tree.kind(columns[0]) else {
            panic!("not a column name");
        };
        assert_eq!(table, "u");
    }

    #[test]
    fn test_qualified_names_untouched_and_idempotent() {
        let db = tables();
        let mut tree = parse_one("SELECT u.username FROM u").unwrap();
        let mut v = NameResolveVisitor::new(&db);
        walk(&mut tree, &mut v);
        v.finish().unwrap();
        let first = tree.sql();
        let mut again = NameResolveVisitor::new(&db);
        walk(&mut tree, &mut again);
        again.finish().unwrap();
        assert_eq!(tree.sql(), first);
    }
}
