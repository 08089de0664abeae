//! Type inference: attach a concrete, nullability-aware type to every
//! expression and every `?` parameter marker.
//!
//! A scoped reference stack maps fully-qualified column names to their
//! types. Frames are pushed when a statement is entered and popped when
//! it is left; outer-join nullability is carried as a separate bit on
//! each reference, orthogonal to the type's own not-null flag. A
//! `TableSource` wrapping an aliased subquery is inferred to completion
//! by a nested inferencer before its projection is bound as virtual
//! columns.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::warn;

use super::{walk_from, Visitor, VisitorCore, WalkContext};
use crate::ast::{JoinKind, Lit, NodeId, NodeKind, SyntaxTree};
use crate::error::{NeedleError, NeedleResult};
use crate::schema::{ColumnInfo, TableInfo};
use crate::types::{bool_type, float_type, not_null_datetime, not_null_int, FieldType};

/// The set of declared tables, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct TableCatalog {
    tables: HashMap<String, Vec<ColumnInfo>>,
}

impl TableCatalog {
    pub fn from_tables(tables: &[TableInfo]) -> TableCatalog {
        TableCatalog {
            tables: tables
                .iter()
                .map(|t| (t.name(), t.columns()))
                .collect(),
        }
    }

    fn get(&self, name: &str) -> Option<&Vec<ColumnInfo>> {
        self.tables.get(name)
    }
}

/// One column binding: the (possibly aliased) qualified name, the
/// join-induced nullability bit, and the underlying type.
#[derive(Debug, Clone)]
struct ColumnRef {
    name: String,
    nullable: bool,
    ty: FieldType,
}

impl ColumnRef {
    /// The effective type: the underlying type with the not-null flag
    /// cleared when the join made the column nullable.
    fn effective(&self) -> FieldType {
        if self.nullable {
            self.ty.null_clone()
        } else {
            self.ty.clone()
        }
    }
}

#[derive(Debug, Default)]
struct RefStack {
    stack: Vec<Vec<ColumnRef>>,
    dict: HashMap<String, Vec<ColumnRef>>,
}

impl RefStack {
    fn push_frame(&mut self, refs: Vec<ColumnRef>) {
        for r in &refs {
            self.dict.entry(r.name.clone()).or_default().push(r.clone());
        }
        self.stack.push(refs);
    }

    fn pop_frame(&mut self) {
        let Some(top) = self.stack.pop() else {
            return;
        };
        for r in &top {
            if let Some(v) = self.dict.get_mut(&r.name) {
                v.pop();
            }
        }
    }

    fn lookup(&self, name: &str) -> Option<FieldType> {
        self.dict
            .get(name)
            .and_then(|v| v.last())
            .map(|r| r.effective())
    }
}

fn fq_col_name(table: &str, col: &str) -> String {
    format!("{}.{}", table, col)
}

pub struct TypeInferenceVisitor {
    core: VisitorCore,
    catalog: Rc<TableCatalog>,
    ref_stack: RefStack,
}

impl TypeInferenceVisitor {
    pub fn new(tables: &[TableInfo]) -> TypeInferenceVisitor {
        Self::with_catalog(Rc::new(TableCatalog::from_tables(tables)))
    }

    fn with_catalog(catalog: Rc<TableCatalog>) -> TypeInferenceVisitor {
        TypeInferenceVisitor {
            core: VisitorCore::new("TypeInference"),
            catalog,
            ref_stack: RefStack::default(),
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

    fn type_lookup(&self, tree: &SyntaxTree, colname: NodeId) -> Option<FieldType> {
        self.ref_stack.lookup(&tree.column_full_name(colname))
    }

    /// Push the references induced by a statement's table clause. Always
    /// pushes exactly one frame so enter/leave stay paired; returns true
    /// when an error was recorded.
    fn push_stmt_refs(&mut self, tree: &mut SyntaxTree, from: Option<NodeId>) -> bool {
        let Some(from) = from else {
            self.ref_stack.push_frame(Vec::new());
            return false;
        };
        let mut refs = Vec::new();
        if self.collect_refs(tree, from, false, &mut refs) {
            self.ref_stack.push_frame(refs);
            false
        } else {
            self.ref_stack.push_frame(Vec::new());
            true
        }
    }

    fn collect_refs(
        &mut self,
        tree: &mut SyntaxTree,
        id: NodeId,
        nullable: bool,
        out: &mut Vec<ColumnRef>,
    ) -> bool {
        match tree.kind(id).clone() {
            NodeKind::Join {
                kind, left, right, ..
            } => {
                // LEFT makes the right side nullable, RIGHT the left
                // side; nullability accumulated from outer joins is kept.
                let (left_null, right_null) = match kind {
                    JoinKind::Plain | JoinKind::Cross => (false, false),
                    JoinKind::Left => (false, true),
                    JoinKind::Right => (true, false),
                };
                self.collect_refs(tree, left, nullable || left_null, out)
                    && self.collect_refs(tree, right, nullable || right_null, out)
            }
            NodeKind::TableSource { source, alias } => match tree.kind(source) {
                NodeKind::TableName { name } => {
                    let name = name.clone();
                    let Some(columns) = self.catalog.get(&name) else {
                        self.core.append_err(NeedleError::InvalidExpr(format!(
                            "table definition not found: {}",
                            name
                        )));
                        return false;
                    };
                    let asname = if alias.is_empty() { name } else { alias };
                    for col in columns {
                        out.push(ColumnRef {
                            name: fq_col_name(&asname, &col.name),
                            nullable,
                            ty: col.ty.clone(),
                        });
                    }
                    true
                }
                NodeKind::Select { .. } => self.bind_derived(tree, source, &alias, nullable, out),
                _ => {
                    self.core.append_err(NeedleError::NotSupported(
                        tree.restore(id),
                    ));
                    false
                }
            },
            _ => {
                self.core
                    .append_err(NeedleError::NotSupported(tree.restore(id)));
                false
            }
        }
    }

    /// Run a nested inferencer over an aliased subquery, then bind its
    /// projection as virtual columns. The nested run must complete
    /// before binding so every field already has its type.
    fn bind_derived(
        &mut self,
        tree: &mut SyntaxTree,
        select: NodeId,
        alias: &str,
        nullable: bool,
        out: &mut Vec<ColumnRef>,
    ) -> bool {
        if alias.is_empty() {
            self.core.append_err(NeedleError::NotSupported(format!(
                "derived table requires an alias: {}",
                tree.restore(select)
            )));
            return false;
        }
        let mut nested = TypeInferenceVisitor::with_catalog(Rc::clone(&self.catalog));
        walk_from(tree, select, &mut nested);
        if nested.core.has_errors() {
            self.core.extend(nested.core.into_errors());
            return false;
        }

        let NodeKind::Select { fields, .. } = tree.kind(select) else {
            self.core.append_err(NeedleError::Compiler(
                "derived table source is not a select".into(),
            ));
            return false;
        };
        for field in fields.clone() {
            let NodeKind::SelectField {
                expr,
                wildcard,
                alias: field_alias,
            } = tree.kind(field)
            else {
                continue;
            };
            if *wildcard {
                self.core.append_err(NeedleError::Compiler(
                    "wildcard is not eliminated, midend skipped?".into(),
                ));
                return false;
            }
            let Some(expr) = *expr else {
                continue;
            };
            let name = if !field_alias.is_empty() {
                field_alias.clone()
            } else if let NodeKind::ColumnExpr { name } = tree.kind(expr) {
                match tree.kind(*name) {
                    NodeKind::ColumnName { name, .. } => name.clone(),
                    _ => String::new(),
                }
            } else {
                self.core.append_err(NeedleError::InvalidExpr(format!(
                    "derived column needs an alias: {}",
                    tree.restore(field)
                )));
                return false;
            };
            out.push(ColumnRef {
                name: fq_col_name(alias, &name),
                nullable,
                ty: tree.ty(expr).clone(),
            });
        }
        true
    }

    /// Bind the insert column types to the expressions of the single
    /// values list.
    fn bind_insert_values(
        &mut self,
        tree: &mut SyntaxTree,
        id: NodeId,
        columns: &[NodeId],
        lists: &[Vec<NodeId>],
    ) -> bool {
        if lists.len() != 1 {
            self.core.append_err(NeedleError::NotSupported(format!(
                "insert not supported, multiple values: {}",
                tree.restore(id)
            )));
            return true;
        }
        if columns.is_empty() {
            self.core.append_err(NeedleError::NotSupported(format!(
                "insert requires an explicit column list: {}",
                tree.restore(id)
            )));
            return true;
        }
        let values = &lists[0];
        if values.len() != columns.len() {
            self.core.append_err(NeedleError::InvalidExpr(format!(
                "insert column count mismatch: {}",
                tree.restore(id)
            )));
            return true;
        }
        for (col, value) in columns.iter().zip(values.iter()) {
            let Some(coltype) = self.type_lookup(tree, *col) else {
                self.core.append_err(NeedleError::InvalidExpr(format!(
                    "column not defined: {}",
                    tree.column_full_name(*col)
                )));
                return true;
            };
            // Nullable input parameter: the marker takes the column's
            // schema type as-is.
            tree.set_ty(*value, coltype);
        }
        false
    }

    fn infer_marker(&mut self, tree: &mut SyntaxTree, id: NodeId, ctx: &WalkContext) {
        if !tree.ty(id).is_unspecified() {
            return;
        }
        let anchor = ctx.find_enclosing(tree, |k| {
            matches!(
                k,
                NodeKind::Limit { .. }
                    | NodeKind::PatternIn { .. }
                    | NodeKind::PatternLike { .. }
                    | NodeKind::Between { .. }
                    | NodeKind::BinaryOp { .. }
                    | NodeKind::Assignment { .. }
            )
        });
        let Some(anchor) = anchor else {
            self.core.append_err(NeedleError::InvalidExpr(format!(
                "ParamMarker type cannot be inferred: {}",
                tree.restore(id)
            )));
            return;
        };
        match tree.kind(anchor).clone() {
            NodeKind::BinaryOp { left, .. } => {
                tree.set_ty(id, tree.ty(left).not_null_clone());
            }
            NodeKind::PatternIn { expr, .. }
            | NodeKind::PatternLike { expr, .. }
            | NodeKind::Between { expr, .. } => {
                tree.set_ty(id, tree.ty(expr).not_null_clone());
            }
            NodeKind::Limit { .. } => {
                tree.set_ty(id, not_null_int());
            }
            NodeKind::Assignment { column, .. } => {
                if let Some(coltype) = self.type_lookup(tree, column) {
                    if tree.ty(id).is_unspecified() {
                        tree.set_ty(id, coltype);
                    } else if !tree.ty(id).same_as(&coltype) {
                        self.core.append_err(NeedleError::TypeCheck(format!(
                            "SET type check failed, lhs = {}, rhs = {}: {}",
                            coltype,
                            tree.ty(id),
                            tree.restore(id)
                        )));
                        return;
                    }
                }
            }
            _ => {}
        }
        if tree.ty(id).is_unspecified() {
            self.core.append_err(NeedleError::InvalidExpr(format!(
                "ParamMarker type cannot be inferred: {}",
                tree.restore(id)
            )));
        }
    }

    fn infer_binary_op(&mut self, tree: &mut SyntaxTree, id: NodeId) {
        let NodeKind::BinaryOp { op, left, right } = tree.kind(id).clone() else {
            return;
        };
        let lt = tree.ty(left).clone();
        let mut rt = tree.ty(right).clone();
        rt.binary = false;
        if !lt.same_as(&rt) && lt.eval_type() != rt.eval_type() {
            self.core.append_err(NeedleError::TypeCheck(format!(
                "BinOp subterm type not equal: ({}, {}): {}",
                lt,
                rt,
                tree.restore(id)
            )));
            return;
        }
        if op.is_arithmetic() {
            // Implicit conversions resolve to the left operand's type.
            let et = lt.eval_type();
            if !matches!(
                et,
                crate::types::EvalType::Int
                    | crate::types::EvalType::Real
                    | crate::types::EvalType::Decimal
            ) {
                self.core.append_err(NeedleError::TypeCheck(format!(
                    "BinOp algorithmatic b-op on non-numbers: {}",
                    tree.restore(id)
                )));
                return;
            }
            tree.set_ty(id, lt);
        } else {
            tree.set_ty(id, bool_type());
        }
    }

    fn infer_aggregate(&mut self, tree: &mut SyntaxTree, id: NodeId) {
        let NodeKind::AggregateFunc {
            name, args, star, ..
        } = tree.kind(id).clone()
        else {
            return;
        };
        match name.as_str() {
            // COUNT never returns null.
            "count" => tree.set_ty(id, not_null_int()),
            "sum" | "max" | "min" => {
                let Some(arg) = args.first() else {
                    self.core.append_err(NeedleError::InvalidExpr(format!(
                        "arguments missing in: {}",
                        tree.restore(id)
                    )));
                    return;
                };
                // Null on empty groups.
                tree.set_ty(id, tree.ty(*arg).null_clone());
            }
            "avg" | "var_pop" | "var_samp" | "stddev_pop" | "stddev_samp" => {
                if args.is_empty() && !star {
                    self.core.append_err(NeedleError::InvalidExpr(format!(
                        "arguments missing in: {}",
                        tree.restore(id)
                    )));
                    return;
                }
                tree.set_ty(id, float_type());
            }
            _ => {
                self.core.append_err(NeedleError::Compiler(format!(
                    "unsupported aggregate func: {}",
                    tree.restore(id)
                )));
            }
        }
    }

    fn infer_func_call(&mut self, tree: &mut SyntaxTree, id: NodeId) {
        let NodeKind::FuncCall { name, args } = tree.kind(id).clone() else {
            return;
        };
        match name.as_str() {
            "coalesce" => {
                let Some(last) = args.last() else {
                    self.core.append_err(NeedleError::InvalidExpr(format!(
                        "arguments missing in: {}",
                        tree.restore(id)
                    )));
                    return;
                };
                let last_ty = tree.ty(*last).clone();
                // Convention: the non-nullable fallback goes last.
                warn!(
                    "partial support of coalesce function {}, type resolves to the last parameter: {}",
                    tree.restore(id),
                    last_ty
                );
                tree.set_ty(id, last_ty);
            }
            "adddate" | "date_add" | "date" => match args.first() {
                Some(first) => tree.set_ty(id, tree.ty(*first).clone()),
                None => self.core.append_err(NeedleError::InvalidExpr(format!(
                    "arguments missing in: {}",
                    tree.restore(id)
                ))),
            },
            "utc_timestamp" | "now" | "curdate" | "current_timestamp" => {
                tree.set_ty(id, not_null_datetime());
            }
            "last_insert_id" => tree.set_ty(id, not_null_int()),
            other => match args.first() {
                Some(first) => {
                    tree.set_ty(id, tree.ty(*first).clone());
                    warn!("unsupported function: {}", other);
                }
                None => self.core.append_err(NeedleError::InvalidExpr(format!(
                    "arguments missing in: {}",
                    tree.restore(id)
                ))),
            },
        }
    }
}

impl Visitor for TypeInferenceVisitor {
    fn name(&self) -> &'static str {
        self.core.name()
    }

    fn enter(&mut self, tree: &mut SyntaxTree, id: NodeId, _ctx: &WalkContext) -> bool {
        match tree.kind(id).clone() {
            NodeKind::Select { from, .. } => self.push_stmt_refs(tree, from),
            NodeKind::Update { table, .. } | NodeKind::Delete { table, .. } => {
                self.push_stmt_refs(tree, Some(table))
            }
            NodeKind::Insert {
                table,
                columns,
                lists,
                ..
            } => {
                if self.push_stmt_refs(tree, Some(table)) {
                    return true;
                }
                self.bind_insert_values(tree, id, &columns, &lists)
            }
            // Subquery tables were inferred by the nested run; do not
            // descend into them again.
            NodeKind::TableSource { source, .. }
                if matches!(tree.kind(source), NodeKind::Select { .. }) =>
            {
                true
            }
            _ => false,
        }
    }

    fn leave(&mut self, tree: &mut SyntaxTree, id: NodeId, ctx: &WalkContext) -> bool {
        match tree.kind(id).clone() {
            NodeKind::Select { .. }
            | NodeKind::Update { .. }
            | NodeKind::Delete { .. }
            | NodeKind::Insert { .. } => {
                self.ref_stack.pop_frame();
            }
            NodeKind::ColumnExpr { name } => match self.type_lookup(tree, name) {
                Some(ty) => tree.set_ty(id, ty),
                None => self.core.append_err(NeedleError::InvalidExpr(format!(
                    "column not defined: {}",
                    tree.column_full_name(name)
                ))),
            },
            NodeKind::ParamMarker => self.infer_marker(tree, id, ctx),
            NodeKind::PatternIn { expr, list, .. } => {
                if let Some(first) = list.first() {
                    if !tree.ty(expr).same_as(tree.ty(*first)) {
                        self.core.append_err(NeedleError::TypeCheck(format!(
                            "In type mismatch({}, {}): {}",
                            tree.ty(expr),
                            tree.ty(*first),
                            tree.restore(id)
                        )));
                    }
                }
                tree.set_ty(id, bool_type());
            }
            NodeKind::AggregateFunc { .. } => self.infer_aggregate(tree, id),
            NodeKind::BinaryOp { .. } => self.infer_binary_op(tree, id),
            NodeKind::UnaryOp { op, expr } => match op {
                crate::ast::UnOp::Not => tree.set_ty(id, bool_type()),
                crate::ast::UnOp::Neg | crate::ast::UnOp::BitNeg => {
                    tree.set_ty(id, tree.ty(expr).clone())
                }
            },
            NodeKind::PatternLike { .. } | NodeKind::Between { .. } | NodeKind::IsNull { .. } => {
                tree.set_ty(id, bool_type());
            }
            NodeKind::FuncCall { .. } => self.infer_func_call(tree, id),
            NodeKind::FuncCast { kind, expr, target } => {
                let ty = match kind {
                    crate::ast::CastKind::Cast => target,
                    crate::ast::CastKind::Convert | crate::ast::CastKind::Binary => {
                        tree.ty(expr).clone()
                    }
                };
                tree.set_ty(id, ty);
            }
            NodeKind::Paren { expr } => tree.set_ty(id, tree.ty(expr).clone()),
            NodeKind::Literal(lit) => {
                // The parser does not mark literals not-null; do it here,
                // NULL excepted.
                if !matches!(lit, Lit::Null) {
                    let ty = tree.ty(id).not_null_clone();
                    tree.set_ty(id, ty);
                }
            }
            _ => {}
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_one;
    use crate::schema::go_type;
    use crate::types::TypeKind;
    use crate::visitors::{walk, NameResolveVisitor};

    fn tables() -> Vec<TableInfo> {
        let musics = parse_one(
            "CREATE TABLE musics (author VARCHAR(255) NOT NULL, \
             name VARCHAR(255) NOT NULL, spotify_id BIGINT NOT NULL)",
        )
        .unwrap();
        let u = parse_one(
            "CREATE TABLE u (id BIGINT NOT NULL, name VARCHAR(64) NOT NULL)",
        )
        .unwrap();
        let p = parse_one(
            "CREATE TABLE p (uid BIGINT NOT NULL, title VARCHAR(64) NOT NULL)",
        )
        .unwrap();
        vec![
            TableInfo::new(musics, vec![]).unwrap(),
            TableInfo::new(u, vec![]).unwrap(),
            TableInfo::new(p, vec![]).unwrap(),
        ]
    }

    fn normalize(sql: &str) -> SyntaxTree {
        let db = tables();
        let mut tree = parse_one(sql).unwrap();
        let mut nr = NameResolveVisitor::new(&db);
        walk(&mut tree, &mut nr);
        nr.finish().unwrap();
        let mut ti = TypeInferenceVisitor::new(&db);
        walk(&mut tree, &mut ti);
        ti.finish().unwrap();
        tree
    }

    fn marker_types(tree: &SyntaxTree) -> Vec<FieldType> {
        let mut out = Vec::new();
        let mut stack = vec![tree.root()];
        while let Some(id) = stack.pop() {
            if matches!(tree.kind(id), NodeKind::ParamMarker) {
                out.push(tree.ty(id).clone());
            }
            let mut kids = tree.children(id);
            kids.reverse();
            stack.extend(kids);
        }
        out
    }

    #[test]
    fn test_like_marker_is_not_null_string() {
        let tree = normalize("SELECT name FROM musics WHERE name LIKE ?");
        let types = marker_types(&tree);
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].kind, TypeKind::VarChar);
        assert!(types[0].not_null);
    }

    #[test]
    fn test_limit_markers_are_not_null_ints() {
        let tree = normalize("SELECT spotify_id FROM musics WHERE spotify_id > ? LIMIT ?, ?");
        let types = marker_types(&tree);
        assert_eq!(types.len(), 3);
        for t in &types {
            assert!(t.not_null);
            assert_eq!(t.eval_type(), crate::types::EvalType::Int);
        }
    }

    #[test]
    fn test_left_join_makes_right_side_nullable() {
        let tree = normalize("SELECT u.name, p.title FROM u LEFT JOIN p ON u.id = p.uid");
        let NodeKind::Select { fields, .. } = tree.kind(tree.root()) else {
            panic!("not a select");
        };
        let field_ty = |i: usize| {
            let NodeKind::SelectField { expr, .. } = tree.kind(fields[i]) else {
                panic!("not a field");
            };
            tree.ty(expr.unwrap()).clone()
        };
        // u.name keeps its schema nullability, p.title loses NOT NULL.
        assert!(field_ty(0).not_null);
        assert!(!field_ty(1).not_null);
        assert!(!go_type(&field_ty(1)).unwrap().not_null);
    }

    #[test]
    fn test_insert_markers_take_column_types() {
        let tree = normalize("INSERT INTO musics (author, name, spotify_id) VALUES (?, ?, ?)");
        let types = marker_types(&tree);
        assert_eq!(types.len(), 3);
        assert_eq!(types[0].kind, TypeKind::VarChar);
        assert_eq!(types[2].kind, TypeKind::LongLong);
        assert!(types[2].not_null);
    }

    #[test]
    fn test_multi_row_insert_rejected() {
        let db = tables();
        let mut tree =
            parse_one("INSERT INTO musics (author, name, spotify_id) VALUES (?, ?, ?), (?, ?, ?)")
                .unwrap();
        let mut nr = NameResolveVisitor::new(&db);
        walk(&mut tree, &mut nr);
        nr.finish().unwrap();
        let mut ti = TypeInferenceVisitor::new(&db);
        walk(&mut tree, &mut ti);
        let err = ti.finish().unwrap_err();
        assert!(err.to_string().contains("multiple values"), "{}", err);
    }

    #[test]
    fn test_in_list_type_mismatch() {
        let db = tables();
        let mut tree = parse_one("SELECT name FROM musics WHERE spotify_id IN ('a')").unwrap();
        let mut nr = NameResolveVisitor::new(&db);
        walk(&mut tree, &mut nr);
        nr.finish().unwrap();
        let mut ti = TypeInferenceVisitor::new(&db);
        walk(&mut tree, &mut ti);
        let err = ti.finish().unwrap_err();
        assert!(err.to_string().contains("In type mismatch"), "{}", err);
    }

    #[test]
    fn test_aggregates() {
        let tree = normalize("SELECT COUNT(*) AS c, MAX(spotify_id) AS m FROM musics");
        let NodeKind::Select { fields, .. } = tree.kind(tree.root()) else {
            panic!("not a select");
        };
        let ty_of = |i: usize| {
            let NodeKind::SelectField { expr, .. } = tree.kind(fields[i]) else {
                panic!("not a field");
            };
            tree.ty(expr.unwrap()).clone()
        };
        assert!(ty_of(0).not_null);
        assert_eq!(ty_of(0).eval_type(), crate::types::EvalType::Int);
        // MAX is null on empty groups even over a NOT NULL column.
        assert!(!ty_of(1).not_null);
    }

    #[test]
    fn test_aliased_subquery_binds_projection() {
        let tree = normalize(
            "SELECT d.author FROM (SELECT author FROM musics WHERE spotify_id > ?) AS d \
             WHERE d.author = ?",
        );
        let types = marker_types(&tree);
        assert_eq!(types.len(), 2);
        assert_eq!(types[1].kind, TypeKind::VarChar);
        // Every expression node reachable by the visitor carries a type.
        let NodeKind::Select { fields, .. } = tree.kind(tree.root()) else {
            panic!("not a select");
        };
        let NodeKind::SelectField { expr, .. } = tree.kind(fields[0]) else {
            panic!("not a field");
        };
        assert!(!tree.ty(expr.unwrap()).is_unspecified());
    }

    #[test]
    fn test_derived_table_without_alias_rejected() {
        let db = tables();
        let mut tree = parse_one("SELECT author FROM (SELECT author FROM musics) AS d").unwrap();
        // Strip the alias from the derived table to hit the error path.
        let source = tree
            .ids()
            .find(|id| match tree.kind(*id) {
                NodeKind::TableSource { source, alias } => {
                    matches!(tree.kind(*source), NodeKind::Select { .. }) && !alias.is_empty()
                }
                _ => false,
            })
            .expect("derived table not found");
        if let NodeKind::TableSource { alias, .. } = &mut tree.node_mut(source).kind {
            *alias = String::new();
        }
        let mut ti = TypeInferenceVisitor::new(&db);
        walk(&mut tree, &mut ti);
        let err = ti.finish().unwrap_err();
        assert!(err.to_string().contains("requires an alias"), "{}", err);
    }

    #[test]
    fn test_update_assignment_types() {
        let tree = normalize("UPDATE musics SET name = ? WHERE spotify_id = ?");
        let types = marker_types(&tree);
        assert_eq!(types.len(), 2);
        assert_eq!(types[0].kind, TypeKind::VarChar);
        assert_eq!(types[1].kind, TypeKind::LongLong);
    }

    #[test]
    fn test_set_arithmetic_keeps_lhs_type() {
        let tree = normalize("UPDATE musics SET spotify_id = spotify_id + 1 WHERE name = ?");
        // The b-op takes the left operand's type.
        let mut found = false;
        let mut stack = vec![tree.root()];
        while let Some(id) = stack.pop() {
            if matches!(tree.kind(id), NodeKind::BinaryOp { .. }) {
                assert_eq!(tree.ty(id).kind, TypeKind::LongLong);
                found = true;
            }
            stack.extend(tree.children(id));
        }
        assert!(found);
    }

    #[test]
    fn test_bop_mismatch_rejected() {
        let db = tables();
        let mut tree = parse_one("SELECT name FROM musics WHERE name > spotify_id").unwrap();
        let mut nr = NameResolveVisitor::new(&db);
        walk(&mut tree, &mut nr);
        nr.finish().unwrap();
        let mut ti = TypeInferenceVisitor::new(&db);
        walk(&mut tree, &mut ti);
        let err = ti.finish().unwrap_err();
        assert!(err.to_string().contains("subterm type not equal"), "{}", err);
    }
}
