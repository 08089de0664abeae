//! Output extraction: one (table, name, type) triple per projection
//! field of the root SELECT. Aliased fields drop their table of origin.

use super::{Visitor, VisitorCore, WalkContext};
use crate::ast::{NodeId, NodeKind, SyntaxTree};
use crate::error::{NeedleError, NeedleResult};
use crate::schema::{go_type, GoType};

/// An extracted output variable.
#[derive(Debug, Clone)]
pub struct GoVar {
    pub table_name: String,
    pub name: String,
    pub go_type: GoType,
}

pub struct OutputExtractVisitor {
    core: VisitorCore,
    pub output: Vec<GoVar>,
}

impl OutputExtractVisitor {
    pub fn new() -> OutputExtractVisitor {
        OutputExtractVisitor {
            core: VisitorCore::new("OutputExtract"),
            output: Vec::new(),
        }
    }

    pub fn errors(&self) -> &[NeedleError] {
        self.core.errors()
    }

    pub fn finish(self) -> NeedleResult<Vec<GoVar>> {
        if self.core.has_errors() {
            return Err(NeedleError::merge(self.core.into_errors()));
        }
        Ok(self.output)
    }

    fn extract_field(&mut self, tree: &SyntaxTree, field: NodeId) -> Option<GoVar> {
        let NodeKind::SelectField {
            expr,
            wildcard,
            alias,
        } = tree.kind(field)
        else {
            return None;
        };
        if *wildcard {
            self.core.append_err(NeedleError::Compiler(
                "wildcard is not eliminated, midend skipped?".into(),
            ));
            return None;
        }
        let Some(expr) = *expr else {
            return self.fail_field(tree, field);
        };
        let (table_name, name) = if !alias.is_empty() {
            (String::new(), alias.clone())
        } else if let NodeKind::ColumnExpr { name } = tree.kind(expr) {
            match tree.kind(*name) {
                NodeKind::ColumnName { table, name, .. } => (table.clone(), name.clone()),
                _ => return self.fail_field(tree, field),
            }
        } else {
            return self.fail_field(tree, field);
        };
        let Some(go_type) = go_type(tree.ty(expr)) else {
            self.core.append_err(NeedleError::TypeCheck(format!(
                "output {} has no generated-code mapping: {}",
                name,
                tree.ty(expr)
            )));
            return None;
        };
        Some(GoVar {
            table_name,
            name,
            go_type,
        })
    }

    fn fail_field(&mut self, tree: &SyntaxTree, field: NodeId) -> Option<GoVar> {
        self.core.append_err(NeedleError::InvalidExpr(format!(
            "failed to construct output name: {}",
            tree.restore(field)
        )));
        None
    }
}

impl Default for OutputExtractVisitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Visitor for OutputExtractVisitor {
    fn name(&self) -> &'static str {
        self.core.name()
    }

    fn enter(&mut self, tree: &mut SyntaxTree, id: NodeId, ctx: &WalkContext) -> bool {
        if !ctx.is_entering_root() {
            return true;
        }
        let NodeKind::Select { fields, .. } = tree.kind(id) else {
            self.core.append_err(NeedleError::Compiler(format!(
                "computing output of statement that is not allowed: {}",
                tree.restore(id)
            )));
            return true;
        };
        for field in fields.clone() {
            if let Some(var) = self.extract_field(tree, field) {
                self.output.push(var);
            }
        }
        // The projection is all we need; do not visit children.
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_one;
    use crate::schema::{GoTypeName, TableInfo};
    use crate::visitors::{walk, NameResolveVisitor, TypeInferenceVisitor};

    fn extract(sql: &str) -> NeedleResult<Vec<GoVar>> {
        let t = parse_one(
            "CREATE TABLE t (id BIGINT NOT NULL, name VARCHAR(64) NOT NULL, note TEXT)",
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
        let mut oe = OutputExtractVisitor::new();
        walk(&mut tree, &mut oe);
        oe.finish()
    }

    #[test]
    fn test_plain_columns_keep_table_of_origin() {
        let vars = extract("SELECT id, name, note FROM t").unwrap();
        let view: Vec<(&str, &str)> = vars
            .iter()
            .map(|v| (v.table_name.as_str(), v.name.as_str()))
            .collect();
        assert_eq!(view, [("t", "id"), ("t", "name"), ("t", "note")]);
        assert_eq!(vars[0].go_type.name, GoTypeName::Int64);
        assert!(vars[0].go_type.not_null);
        assert!(!vars[2].go_type.not_null);
    }

    #[test]
    fn test_alias_drops_table_of_origin() {
        let vars = extract("SELECT COUNT(*) AS total, name AS title FROM t").unwrap();
        assert_eq!(vars[0].table_name, "");
        assert_eq!(vars[0].name, "total");
        assert_eq!(vars[0].go_type.name, GoTypeName::Int64);
        assert_eq!(vars[1].table_name, "");
        assert_eq!(vars[1].name, "title");
    }

    #[test]
    fn test_unaliased_computed_column_rejected() {
        let err = extract("SELECT id + 1 FROM t").unwrap_err();
        assert!(
            err.to_string().contains("failed to construct output name"),
            "{}",
            err
        );
    }

    #[test]
    fn test_non_select_root_is_compiler_error() {
        let t = parse_one("CREATE TABLE t (id BIGINT NOT NULL)").unwrap();
        let db = vec![TableInfo::new(t, vec![]).unwrap()];
        let mut tree = parse_one("DELETE FROM t WHERE id = ?").unwrap();
        let mut nr = NameResolveVisitor::new(&db);
        walk(&mut tree, &mut nr);
        nr.finish().unwrap();
        let mut ti = TypeInferenceVisitor::new(&db);
        walk(&mut tree, &mut ti);
        ti.finish().unwrap();
        let mut oe = OutputExtractVisitor::new();
        walk(&mut tree, &mut oe);
        assert!(oe.finish().is_err());
    }
}
