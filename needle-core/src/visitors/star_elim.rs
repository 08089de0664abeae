//! Star elimination: replace `SELECT *` with the main table's star
//! columns, one explicit field per column.

use super::{Visitor, VisitorCore, WalkContext};
use crate::ast::{NodeId, NodeKind, SyntaxTree};
use crate::error::{NeedleError, NeedleResult};
use crate::schema::TableInfo;

pub struct StarElimVisitor {
    core: VisitorCore,
    star_columns: Vec<String>,
}

impl StarElimVisitor {
    pub fn new(table: &TableInfo) -> StarElimVisitor {
        StarElimVisitor {
            core: VisitorCore::new("StarElim"),
            star_columns: table.star_columns().into_iter().map(|c| c.name).collect(),
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

    fn make_table_fields(&self, tree: &mut SyntaxTree) -> Vec<NodeId> {
        let mut fields = Vec::new();
        for col in &self.star_columns {
            let name = tree.add(NodeKind::ColumnName {
                schema: String::new(),
                table: String::new(),
                name: col.clone(),
            });
            let expr = tree.add(NodeKind::ColumnExpr { name });
            fields.push(tree.add(NodeKind::SelectField {
                expr: Some(expr),
                wildcard: false,
                alias: String::new(),
            }));
        }
        fields
    }
}

impl Visitor for StarElimVisitor {
    fn name(&self) -> &'static str {
        self.core.name()
    }

    fn enter(&mut self, tree: &mut SyntaxTree, id: NodeId, _ctx: &WalkContext) -> bool {
        let NodeKind::Select { fields, .. } = tree.kind(id) else {
            return false;
        };
        let has_wildcard = fields
            .iter()
            .any(|f| matches!(tree.kind(*f), NodeKind::SelectField { wildcard: true, .. }));
        if !has_wildcard {
            return false;
        }
        if fields.len() != 1 {
            self.core.append_err(NeedleError::InvalidExpr(format!(
                "* with extra fields are not allowed: {}",
                tree.restore(id)
            )));
            return false;
        }
        let new_fields = self.make_table_fields(tree);
        if let NodeKind::Select { fields, .. } = &mut tree.node_mut(id).kind {
            *fields = new_fields;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_one;
    use crate::visitors::walk;

    fn musics_table() -> TableInfo {
        let tree = parse_one(
            "CREATE TABLE musics (author VARCHAR(255) NOT NULL, \
             name VARCHAR(255) NOT NULL, spotify_id BIGINT NOT NULL, secret TEXT)",
        )
        .unwrap();
        TableInfo::new(tree, vec!["secret".into()]).unwrap()
    }

    #[test]
    fn test_star_expands_to_star_columns() {
        let table = musics_table();
        let mut tree = parse_one("SELECT * FROM musics WHERE name LIKE ?").unwrap();
        let mut v = StarElimVisitor::new(&table);
        walk(&mut tree, &mut v);
        v.finish().unwrap();
        assert_eq!(
            tree.sql(),
            "SELECT author, name, spotify_id FROM musics WHERE name LIKE ?"
        );
        assert!(!tree.sql().contains('*'));
    }

    #[test]
    fn test_star_with_extra_fields_rejected() {
        let table = musics_table();
        let mut tree = parse_one("SELECT *, name FROM musics").unwrap();
        let mut v = StarElimVisitor::new(&table);
        walk(&mut tree, &mut v);
        let err = v.finish().unwrap_err();
        assert!(
            err.to_string().contains("* with extra fields are not allowed"),
            "{}",
            err
        );
    }

    #[test]
    fn test_second_run_is_noop() {
        let table = musics_table();
        let mut tree = parse_one("SELECT * FROM musics").unwrap();
        let mut v = StarElimVisitor::new(&table);
        walk(&mut tree, &mut v);
        v.finish().unwrap();
        let first = tree.sql();
        let mut again = StarElimVisitor::new(&table);
        walk(&mut tree, &mut again);
        again.finish().unwrap();
        assert_eq!(tree.sql(), first);
    }
}
