//! Parameter extraction: derive a name, an owning table and an in-list
//! flag for every `?` marker, then order them by source offset.

use super::{Visitor, VisitorCore, WalkContext};
use crate::ast::{NodeId, NodeKind, SrcPos, SyntaxTree};
use crate::error::{NeedleError, NeedleResult};
use crate::schema::{go_type, GoType};

/// Name of the first `?` of `LIMIT ?, ?`.
pub const LIMIT_OFFSET: &str = "Offset";
/// Name of the second `?` of `LIMIT ?, ?`.
pub const LIMIT_COUNT: &str = "Count";

/// An extracted parameter.
#[derive(Debug, Clone)]
pub struct GoParam {
    pub name: String,
    pub table_name: String,
    pub in_pattern: bool,
    pub order: usize,
    pub go_type: GoType,
    pos: SrcPos,
}

pub struct ParamExtractVisitor {
    core: VisitorCore,
    pub params: Vec<GoParam>,
}

impl ParamExtractVisitor {
    pub fn new() -> ParamExtractVisitor {
        ParamExtractVisitor {
            core: VisitorCore::new("ParamExtract"),
            params: Vec::new(),
        }
    }

    pub fn errors(&self) -> &[NeedleError] {
        self.core.errors()
    }

    pub fn finish(self) -> NeedleResult<Vec<GoParam>> {
        if self.core.has_errors() {
            return Err(NeedleError::merge(self.core.into_errors()));
        }
        Ok(self.params)
    }

    /// Returns (name, owning table) for a marker, derived from the
    /// closest anchoring ancestor.
    fn find_name_in_context(
        &mut self,
        tree: &SyntaxTree,
        id: NodeId,
        ctx: &WalkContext,
    ) -> Option<(String, String)> {
        let anchor = ctx.find_enclosing(tree, |k| {
            matches!(
                k,
                NodeKind::Limit { .. }
                    | NodeKind::BinaryOp { .. }
                    | NodeKind::PatternIn { .. }
                    | NodeKind::PatternLike { .. }
                    | NodeKind::Between { .. }
                    | NodeKind::Insert { .. }
                    | NodeKind::Assignment { .. }
            )
        })?;
        match tree.kind(anchor) {
            NodeKind::Limit { offset, count } => {
                if *count == Some(id) {
                    Some((LIMIT_COUNT.to_string(), String::new()))
                } else if *offset == Some(id) {
                    Some((LIMIT_OFFSET.to_string(), String::new()))
                } else {
                    None
                }
            }
            NodeKind::PatternIn { expr, .. }
            | NodeKind::PatternLike { expr, .. }
            | NodeKind::Between { expr, .. } => match self.column_of(tree, *expr) {
                Some(parts) => Some(parts),
                None => {
                    self.core.append_err(NeedleError::NotSupported(format!(
                        "pattern with noncolumn expr: {}",
                        tree.restore(anchor)
                    )));
                    None
                }
            },
            NodeKind::BinaryOp { left, .. } => match self.column_of(tree, *left) {
                Some(parts) => Some(parts),
                None => {
                    self.core.append_err(NeedleError::NotSupported(format!(
                        "b-op with non column expr on left side(not recommended): {}",
                        tree.restore(anchor)
                    )));
                    None
                }
            },
            NodeKind::Insert { columns, lists, .. } => {
                let values = lists.first()?;
                let i = values.iter().position(|v| *v == id)?;
                let col = *columns.get(i)?;
                match tree.kind(col) {
                    NodeKind::ColumnName { table, name, .. } => {
                        Some((name.clone(), table.clone()))
                    }
                    _ => None,
                }
            }
            NodeKind::Assignment { column, .. } => match tree.kind(*column) {
                NodeKind::ColumnName { table, name, .. } => Some((name.clone(), table.clone())),
                _ => None,
            },
            _ => None,
        }
    }

    fn column_of(&self, tree: &SyntaxTree, expr: NodeId) -> Option<(String, String)> {
        let NodeKind::ColumnExpr { name } = tree.kind(expr) else {
            return None;
        };
        match tree.kind(*name) {
            NodeKind::ColumnName { table, name, .. } => Some((name.clone(), table.clone())),
            _ => None,
        }
    }
}

impl Default for ParamExtractVisitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Visitor for ParamExtractVisitor {
    fn name(&self) -> &'static str {
        self.core.name()
    }

    fn enter(&mut self, tree: &mut SyntaxTree, id: NodeId, ctx: &WalkContext) -> bool {
        if !matches!(tree.kind(id), NodeKind::ParamMarker) {
            return false;
        }
        let Some((name, table_name)) = self.find_name_in_context(tree, id, ctx) else {
            self.core.append_err(NeedleError::Compiler(format!(
                "failed to infer name of {}",
                tree.restore(id)
            )));
            return false;
        };
        let in_pattern = ctx
            .find_enclosing(tree, |k| matches!(k, NodeKind::PatternIn { .. }))
            .is_some();
        let Some(go_type) = go_type(tree.ty(id)) else {
            self.core.append_err(NeedleError::TypeCheck(format!(
                "parameter {} has no generated-code mapping: {}",
                name,
                tree.ty(id)
            )));
            return false;
        };
        self.params.push(GoParam {
            name,
            table_name,
            in_pattern,
            order: 0, // assigned when leaving the root
            go_type,
            pos: tree.pos(id).unwrap_or(SrcPos { line: 0, column: 0 }),
        });
        false
    }

    fn leave(&mut self, _tree: &mut SyntaxTree, _id: NodeId, ctx: &WalkContext) -> bool {
        if ctx.is_leaving_root() {
            self.params.sort_by_key(|p| p.pos);
            for (i, p) in self.params.iter_mut().enumerate() {
                p.order = i;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_one;
    use crate::schema::{GoTypeName, TableInfo};
    use crate::visitors::{walk, NameResolveVisitor, TypeInferenceVisitor};

    fn extract(sql: &str) -> Vec<GoParam> {
        let t = parse_one(
            "CREATE TABLE t (id BIGINT NOT NULL, name VARCHAR(64) NOT NULL, score DOUBLE)",
        )
        .unwrap();
        let db = vec![TableInfo::new(t, vec![]).unwrap()];
        let mut tree = parse_one(sql).unwrap();
        let mut nr = NameResolveVisitor::new(&db);
        walk(&mut tree, &mut nr);
        nr.finish().unwrap();
        let mut ti = TypeInferenceVisitor::new(&db);
        walk(&mut tree, &mut ti);
        ti.finish().unwrap();
        let mut pe = ParamExtractVisitor::new();
        walk(&mut tree, &mut pe);
        pe.finish().unwrap()
    }

    #[test]
    fn test_limit_params_in_source_order() {
        let params = extract("SELECT id FROM t WHERE id > ? LIMIT ?, ?");
        let view: Vec<(&str, &str, bool)> = params
            .iter()
            .map(|p| (p.name.as_str(), p.table_name.as_str(), p.in_pattern))
            .collect();
        assert_eq!(
            view,
            [("id", "t", false), ("Offset", "", false), ("Count", "", false)]
        );
        assert_eq!(
            params.iter().map(|p| p.order).collect::<Vec<_>>(),
            [0, 1, 2]
        );
        for p in &params {
            assert_eq!(p.go_type.name, GoTypeName::Int64);
            assert!(p.go_type.not_null);
        }
    }

    #[test]
    fn test_in_list_param_sets_flag() {
        let params = extract("SELECT id FROM t WHERE id IN (?)");
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].name, "id");
        assert_eq!(params[0].table_name, "t");
        assert!(params[0].in_pattern);
        assert_eq!(params[0].go_type.name, GoTypeName::Int64);
    }

    #[test]
    fn test_like_param_takes_column_name() {
        let params = extract("SELECT id FROM t WHERE name LIKE ?");
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].name, "name");
        assert_eq!(params[0].table_name, "t");
        assert!(!params[0].in_pattern);
        assert_eq!(params[0].go_type.name, GoTypeName::Str);
    }

    #[test]
    fn test_insert_params_take_insert_columns() {
        let params = extract("INSERT INTO t (id, name) VALUES (?, ?)");
        let view: Vec<(&str, &str)> = params
            .iter()
            .map(|p| (p.name.as_str(), p.table_name.as_str()))
            .collect();
        assert_eq!(view, [("id", "t"), ("name", "t")]);
    }

    #[test]
    fn test_assignment_params_take_lhs_column() {
        let params = extract("UPDATE t SET name = ?, score = ? WHERE id = ?");
        let view: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(view, ["name", "score", "id"]);
        assert!(!params[1].go_type.not_null);
    }

    #[test]
    fn test_between_params() {
        let params = extract("SELECT name FROM t WHERE id BETWEEN ? AND ?");
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name, "id");
        assert_eq!(params[1].name, "id");
    }
}
