//! SQL parser adapter.
//!
//! Wraps the `sqlparser` crate so the rest of the compiler sees one
//! stable AST shape. `parse_one` accepts exactly one statement and
//! lowers it into a [`SyntaxTree`]; for `CREATE TABLE` the adapter also
//! folds the not-null / primary-key / auto-increment column options into
//! each column's field type, which is the only in-place mutation it
//! performs.

use sqlparser::ast as sp;
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

use crate::ast::{
    BinOp, CastKind, ColumnOpt, ConstraintKind, JoinKind, Lit, NodeId, NodeKind, SrcPos,
    SyntaxTree, UnOp,
};
use crate::error::{NeedleError, NeedleResult};
use crate::types::{FieldType, TypeKind};

/// Parse one statement into a syntax tree.
pub fn parse_one(sql: &str) -> NeedleResult<SyntaxTree> {
    let stmts = Parser::parse_sql(&MySqlDialect {}, sql)?;
    if stmts.len() != 1 {
        return Err(NeedleError::Parse(format!(
            "expected exactly one statement, got {}",
            stmts.len()
        )));
    }
    let mut tree = SyntaxTree::new();
    let root = lower_statement(&mut tree, &stmts[0])?;
    tree.set_root(root);
    Ok(tree)
}

fn not_supported<T>(what: impl std::fmt::Display) -> NeedleResult<T> {
    Err(NeedleError::NotSupported(what.to_string()))
}

fn lower_statement(tree: &mut SyntaxTree, stmt: &sp::Statement) -> NeedleResult<NodeId> {
    match stmt {
        sp::Statement::Query(q) => lower_query(tree, q),
        sp::Statement::Insert(ins) => lower_insert(tree, ins),
        sp::Statement::Update {
            table,
            assignments,
            from,
            selection,
            returning,
            ..
        } => {
            if from.is_some() || returning.is_some() {
                return not_supported("UPDATE with FROM or RETURNING");
            }
            lower_update(tree, table, assignments, selection.as_ref())
        }
        sp::Statement::Delete(del) => lower_delete(tree, del),
        sp::Statement::CreateTable(ct) => lower_create_table(tree, ct),
        other => not_supported(format!("statement: {}", other)),
    }
}

fn lower_query(tree: &mut SyntaxTree, q: &sp::Query) -> NeedleResult<NodeId> {
    if q.with.is_some() {
        return not_supported("WITH clause");
    }
    let select = match q.body.as_ref() {
        sp::SetExpr::Select(s) => s,
        other => return not_supported(format!("query body: {}", other)),
    };
    lower_select(tree, select, q.order_by.as_ref(), q.limit_clause.as_ref())
}

fn lower_select(
    tree: &mut SyntaxTree,
    sel: &sp::Select,
    order_by: Option<&sp::OrderBy>,
    limit_clause: Option<&sp::LimitClause>,
) -> NeedleResult<NodeId> {
    let distinct = match &sel.distinct {
        None => false,
        Some(sp::Distinct::Distinct) => true,
        Some(other) => return not_supported(format!("distinct form: {}", other)),
    };

    let from = lower_from(tree, &sel.from)?;

    let mut fields = Vec::new();
    for item in &sel.projection {
        let id = match item {
            sp::SelectItem::Wildcard(_) => tree.add(NodeKind::SelectField {
                expr: None,
                wildcard: true,
                alias: String::new(),
            }),
            sp::SelectItem::QualifiedWildcard(..) => {
                return not_supported("qualified wildcard");
            }
            sp::SelectItem::UnnamedExpr(e) => {
                let expr = lower_expr(tree, e)?;
                tree.add(NodeKind::SelectField {
                    expr: Some(expr),
                    wildcard: false,
                    alias: String::new(),
                })
            }
            sp::SelectItem::ExprWithAlias { expr, alias } => {
                let expr = lower_expr(tree, expr)?;
                tree.add(NodeKind::SelectField {
                    expr: Some(expr),
                    wildcard: false,
                    alias: alias.value.clone(),
                })
            }
        };
        fields.push(id);
    }

    let selection = match &sel.selection {
        Some(e) => Some(lower_expr(tree, e)?),
        None => None,
    };

    let group_by = match &sel.group_by {
        sp::GroupByExpr::Expressions(exprs, mods) => {
            if !mods.is_empty() {
                return not_supported("GROUP BY modifiers");
            }
            let mut ids = Vec::new();
            for e in exprs {
                ids.push(lower_expr(tree, e)?);
            }
            ids
        }
        sp::GroupByExpr::All(_) => return not_supported("GROUP BY ALL"),
    };

    let having = match &sel.having {
        Some(e) => Some(lower_expr(tree, e)?),
        None => None,
    };

    let order_by = lower_order_by(tree, order_by)?;
    let limit = lower_limit_clause(tree, limit_clause)?;

    Ok(tree.add(NodeKind::Select {
        distinct,
        fields,
        from,
        selection,
        group_by,
        having,
        order_by,
        limit,
    }))
}

fn lower_order_by(tree: &mut SyntaxTree, ob: Option<&sp::OrderBy>) -> NeedleResult<Vec<NodeId>> {
    let Some(ob) = ob else {
        return Ok(Vec::new());
    };
    if ob.interpolate.is_some() {
        return not_supported("ORDER BY INTERPOLATE");
    }
    match &ob.kind {
        sp::OrderByKind::Expressions(exprs) => {
            let mut out = Vec::new();
            for item in exprs {
                let expr = lower_expr(tree, &item.expr)?;
                let desc = item.options.asc == Some(false);
                out.push(tree.add(NodeKind::OrderItem { expr, desc }));
            }
            Ok(out)
        }
        sp::OrderByKind::All(_) => not_supported("ORDER BY ALL"),
    }
}

fn lower_limit_clause(
    tree: &mut SyntaxTree,
    lc: Option<&sp::LimitClause>,
) -> NeedleResult<Option<NodeId>> {
    let Some(lc) = lc else {
        return Ok(None);
    };
    match lc {
        sp::LimitClause::LimitOffset {
            limit,
            offset,
            limit_by,
        } => {
            if !limit_by.is_empty() {
                return not_supported("LIMIT BY");
            }
            let count = match limit {
                Some(e) => Some(lower_expr(tree, e)?),
                None => None,
            };
            let offset = match offset {
                Some(o) => Some(lower_expr(tree, &o.value)?),
                None => None,
            };
            if count.is_none() && offset.is_none() {
                return Ok(None);
            }
            Ok(Some(tree.add(NodeKind::Limit { offset, count })))
        }
        sp::LimitClause::OffsetCommaLimit { offset, limit } => {
            let offset = lower_expr(tree, offset)?;
            let count = lower_expr(tree, limit)?;
            Ok(Some(tree.add(NodeKind::Limit {
                offset: Some(offset),
                count: Some(count),
            })))
        }
    }
}

fn lower_from(tree: &mut SyntaxTree, from: &[sp::TableWithJoins]) -> NeedleResult<Option<NodeId>> {
    let mut acc: Option<NodeId> = None;
    for twj in from {
        let mut side = lower_table_factor(tree, &twj.relation)?;
        for join in &twj.joins {
            let right = lower_table_factor(tree, &join.relation)?;
            let (kind, constraint) = lower_join_operator(&join.join_operator)?;
            let on = match constraint {
                Some(sp::JoinConstraint::On(e)) => Some(lower_expr(tree, e)?),
                Some(sp::JoinConstraint::None) | None => None,
                Some(other) => {
                    return not_supported(format!("join constraint: {:?}", other));
                }
            };
            side = tree.add(NodeKind::Join {
                kind,
                left: side,
                right,
                on,
            });
        }
        acc = Some(match acc {
            // `FROM a, b` is a cross join.
            Some(left) => tree.add(NodeKind::Join {
                kind: JoinKind::Cross,
                left,
                right: side,
                on: None,
            }),
            None => side,
        });
    }
    Ok(acc)
}

fn lower_join_operator(
    op: &sp::JoinOperator,
) -> NeedleResult<(JoinKind, Option<&sp::JoinConstraint>)> {
    match op {
        sp::JoinOperator::Join(c) => Ok((JoinKind::Plain, Some(c))),
        sp::JoinOperator::Inner(c) => Ok((JoinKind::Plain, Some(c))),
        sp::JoinOperator::Left(c) | sp::JoinOperator::LeftOuter(c) => Ok((JoinKind::Left, Some(c))),
        sp::JoinOperator::Right(c) | sp::JoinOperator::RightOuter(c) => {
            Ok((JoinKind::Right, Some(c)))
        }
        sp::JoinOperator::CrossJoin => Ok((JoinKind::Cross, None)),
        other => not_supported(format!("join kind: {:?}", other)),
    }
}

fn lower_table_factor(tree: &mut SyntaxTree, tf: &sp::TableFactor) -> NeedleResult<NodeId> {
    match tf {
        sp::TableFactor::Table { name, alias, .. } => {
            let name = single_name_part(name)?;
            let alias = lower_table_alias(alias)?;
            let table = tree.add(NodeKind::TableName { name });
            Ok(tree.add(NodeKind::TableSource {
                source: table,
                alias,
            }))
        }
        sp::TableFactor::Derived {
            subquery, alias, ..
        } => {
            let alias = lower_table_alias(alias)?;
            let select = lower_query(tree, subquery)?;
            Ok(tree.add(NodeKind::TableSource {
                source: select,
                alias,
            }))
        }
        other => not_supported(format!("table source: {}", other)),
    }
}

fn lower_table_alias(alias: &Option<sp::TableAlias>) -> NeedleResult<String> {
    match alias {
        None => Ok(String::new()),
        Some(a) => {
            if !a.columns.is_empty() {
                return not_supported("table alias with column list");
            }
            Ok(a.name.value.clone())
        }
    }
}

fn lower_insert(tree: &mut SyntaxTree, ins: &sp::Insert) -> NeedleResult<NodeId> {
    let table_name = match &ins.table {
        sp::TableObject::TableName(name) => single_name_part(name)?,
        other => return not_supported(format!("insert target: {}", other)),
    };
    let table = tree.add(NodeKind::TableName { name: table_name });
    let table = tree.add(NodeKind::TableSource {
        source: table,
        alias: String::new(),
    });

    let mut columns = Vec::new();
    for ident in &ins.columns {
        columns.push(tree.add(NodeKind::ColumnName {
            schema: String::new(),
            table: String::new(),
            name: ident.value.clone(),
        }));
    }

    let mut lists = Vec::new();
    match ins.source.as_deref() {
        Some(q) => match q.body.as_ref() {
            sp::SetExpr::Values(values) => {
                for row in &values.rows {
                    let mut ids = Vec::new();
                    for e in row {
                        ids.push(lower_expr(tree, e)?);
                    }
                    lists.push(ids);
                }
            }
            other => return not_supported(format!("insert source: {}", other)),
        },
        None => return not_supported("INSERT without VALUES"),
    }

    let mut on_dup = Vec::new();
    match &ins.on {
        None => {}
        Some(sp::OnInsert::DuplicateKeyUpdate(assignments)) => {
            for a in assignments {
                on_dup.push(lower_assignment(tree, a)?);
            }
        }
        Some(other) => return not_supported(format!("insert conflict clause: {:?}", other)),
    }

    Ok(tree.add(NodeKind::Insert {
        table,
        columns,
        lists,
        on_dup,
    }))
}

fn lower_update(
    tree: &mut SyntaxTree,
    table: &sp::TableWithJoins,
    assignments: &[sp::Assignment],
    selection: Option<&sp::Expr>,
) -> NeedleResult<NodeId> {
    let table = lower_from(tree, std::slice::from_ref(table))?
        .ok_or_else(|| NeedleError::Parse("UPDATE without a table".into()))?;
    let mut assigns = Vec::new();
    for a in assignments {
        assigns.push(lower_assignment(tree, a)?);
    }
    let selection = match selection {
        Some(e) => Some(lower_expr(tree, e)?),
        None => None,
    };
    Ok(tree.add(NodeKind::Update {
        table,
        assignments: assigns,
        selection,
    }))
}

fn lower_assignment(tree: &mut SyntaxTree, a: &sp::Assignment) -> NeedleResult<NodeId> {
    let column = match &a.target {
        sp::AssignmentTarget::ColumnName(name) => lower_column_name(tree, name)?,
        sp::AssignmentTarget::Tuple(_) => return not_supported("tuple assignment"),
    };
    let value = lower_expr(tree, &a.value)?;
    Ok(tree.add(NodeKind::Assignment { column, value }))
}

fn lower_delete(tree: &mut SyntaxTree, del: &sp::Delete) -> NeedleResult<NodeId> {
    if !del.tables.is_empty() || del.using.is_some() || del.returning.is_some() {
        return not_supported("multi-table DELETE");
    }
    let from = match &del.from {
        sp::FromTable::WithFromKeyword(twj) | sp::FromTable::WithoutKeyword(twj) => twj,
    };
    let table = lower_from(tree, from)?
        .ok_or_else(|| NeedleError::Parse("DELETE without a table".into()))?;
    let selection = match &del.selection {
        Some(e) => Some(lower_expr(tree, e)?),
        None => None,
    };
    let mut order_by = Vec::new();
    for item in &del.order_by {
        let expr = lower_expr(tree, &item.expr)?;
        let desc = item.options.asc == Some(false);
        order_by.push(tree.add(NodeKind::OrderItem { expr, desc }));
    }
    let limit = match &del.limit {
        Some(e) => {
            let count = lower_expr(tree, e)?;
            Some(tree.add(NodeKind::Limit {
                offset: None,
                count: Some(count),
            }))
        }
        None => None,
    };
    Ok(tree.add(NodeKind::Delete {
        table,
        selection,
        order_by,
        limit,
    }))
}

// Aggregates the type-inference visitor knows how to type.
const AGGREGATE_FUNCS: &[&str] = &[
    "count",
    "sum",
    "avg",
    "min",
    "max",
    "var_pop",
    "var_samp",
    "stddev_pop",
    "stddev_samp",
];

fn lower_expr(tree: &mut SyntaxTree, e: &sp::Expr) -> NeedleResult<NodeId> {
    match e {
        sp::Expr::Identifier(ident) => {
            let name = tree.add(NodeKind::ColumnName {
                schema: String::new(),
                table: String::new(),
                name: ident.value.clone(),
            });
            Ok(tree.add(NodeKind::ColumnExpr { name }))
        }
        sp::Expr::CompoundIdentifier(idents) => {
            let (schema, table, name) = match idents.as_slice() {
                [t, n] => (String::new(), t.value.clone(), n.value.clone()),
                [s, t, n] => (s.value.clone(), t.value.clone(), n.value.clone()),
                _ => return not_supported(format!("identifier: {}", e)),
            };
            let name = tree.add(NodeKind::ColumnName {
                schema,
                table,
                name,
            });
            Ok(tree.add(NodeKind::ColumnExpr { name }))
        }
        sp::Expr::Value(v) => lower_value(tree, v),
        sp::Expr::BinaryOp { left, op, right } => {
            let op = lower_bin_op(op)?;
            let left = lower_expr(tree, left)?;
            let right = lower_expr(tree, right)?;
            Ok(tree.add(NodeKind::BinaryOp { op, left, right }))
        }
        sp::Expr::UnaryOp { op, expr } => {
            let op = match op {
                sp::UnaryOperator::Plus => return lower_expr(tree, expr),
                sp::UnaryOperator::Minus => UnOp::Neg,
                sp::UnaryOperator::Not => UnOp::Not,
                sp::UnaryOperator::PGBitwiseNot => UnOp::BitNeg,
                other => return not_supported(format!("unary operator: {}", other)),
            };
            let expr = lower_expr(tree, expr)?;
            Ok(tree.add(NodeKind::UnaryOp { op, expr }))
        }
        sp::Expr::Like {
            negated,
            expr,
            pattern,
            ..
        } => {
            let expr = lower_expr(tree, expr)?;
            let pattern = lower_expr(tree, pattern)?;
            Ok(tree.add(NodeKind::PatternLike {
                expr,
                pattern,
                negated: *negated,
            }))
        }
        sp::Expr::InList {
            expr,
            list,
            negated,
        } => {
            let expr = lower_expr(tree, expr)?;
            let mut ids = Vec::new();
            for item in list {
                ids.push(lower_expr(tree, item)?);
            }
            Ok(tree.add(NodeKind::PatternIn {
                expr,
                list: ids,
                negated: *negated,
            }))
        }
        sp::Expr::InSubquery { .. } => not_supported("subquery in predicate"),
        sp::Expr::Between {
            expr,
            negated,
            low,
            high,
        } => {
            let expr = lower_expr(tree, expr)?;
            let low = lower_expr(tree, low)?;
            let high = lower_expr(tree, high)?;
            Ok(tree.add(NodeKind::Between {
                expr,
                low,
                high,
                negated: *negated,
            }))
        }
        sp::Expr::IsNull(inner) => {
            let expr = lower_expr(tree, inner)?;
            Ok(tree.add(NodeKind::IsNull {
                expr,
                negated: false,
            }))
        }
        sp::Expr::IsNotNull(inner) => {
            let expr = lower_expr(tree, inner)?;
            Ok(tree.add(NodeKind::IsNull {
                expr,
                negated: true,
            }))
        }
        sp::Expr::Nested(inner) => {
            let expr = lower_expr(tree, inner)?;
            Ok(tree.add(NodeKind::Paren { expr }))
        }
        sp::Expr::Function(f) => lower_function(tree, f),
        sp::Expr::Cast {
            kind,
            expr,
            data_type,
            ..
        } => {
            let cast_kind = match kind {
                sp::CastKind::Cast => CastKind::Cast,
                other => return not_supported(format!("cast form: {:?}", other)),
            };
            let target = lower_data_type(data_type)?;
            let expr = lower_expr(tree, expr)?;
            Ok(tree.add(NodeKind::FuncCast {
                kind: cast_kind,
                expr,
                target,
            }))
        }
        sp::Expr::Convert {
            expr, data_type, ..
        } => {
            let target = match data_type {
                Some(dt) => lower_data_type(dt)?,
                None => FieldType::default(),
            };
            let expr = lower_expr(tree, expr)?;
            Ok(tree.add(NodeKind::FuncCast {
                kind: CastKind::Convert,
                expr,
                target,
            }))
        }
        sp::Expr::Subquery(_) | sp::Expr::Exists { .. } => not_supported("subquery in predicate"),
        other => not_supported(format!("expression: {}", other)),
    }
}

fn lower_value(tree: &mut SyntaxTree, v: &sp::ValueWithSpan) -> NeedleResult<NodeId> {
    let pos = SrcPos {
        line: v.span.start.line,
        column: v.span.start.column,
    };
    match &v.value {
        sp::Value::Placeholder(p) if p == "?" => Ok(tree.add_at(NodeKind::ParamMarker, pos)),
        sp::Value::Placeholder(p) => not_supported(format!("placeholder: {}", p)),
        sp::Value::Number(n, _) => {
            let kind = if n.contains('.') || n.contains('e') || n.contains('E') {
                TypeKind::Double
            } else {
                TypeKind::LongLong
            };
            Ok(tree.add_typed(
                NodeKind::Literal(Lit::Number(n.clone())),
                FieldType::new(kind),
            ))
        }
        sp::Value::SingleQuotedString(s) | sp::Value::DoubleQuotedString(s) => Ok(tree.add_typed(
            NodeKind::Literal(Lit::Str(s.clone())),
            FieldType::new(TypeKind::VarChar),
        )),
        sp::Value::Boolean(b) => Ok(tree.add_typed(
            NodeKind::Literal(Lit::Bool(*b)),
            crate::types::bool_type(),
        )),
        sp::Value::Null => Ok(tree.add_typed(
            NodeKind::Literal(Lit::Null),
            FieldType::new(TypeKind::Null),
        )),
        other => not_supported(format!("literal: {}", other)),
    }
}

fn lower_bin_op(op: &sp::BinaryOperator) -> NeedleResult<BinOp> {
    Ok(match op {
        sp::BinaryOperator::Eq => BinOp::Eq,
        sp::BinaryOperator::NotEq => BinOp::NotEq,
        sp::BinaryOperator::Lt => BinOp::Lt,
        sp::BinaryOperator::LtEq => BinOp::LtEq,
        sp::BinaryOperator::Gt => BinOp::Gt,
        sp::BinaryOperator::GtEq => BinOp::GtEq,
        sp::BinaryOperator::And => BinOp::And,
        sp::BinaryOperator::Or => BinOp::Or,
        sp::BinaryOperator::Xor => BinOp::Xor,
        sp::BinaryOperator::Plus => BinOp::Plus,
        sp::BinaryOperator::Minus => BinOp::Minus,
        sp::BinaryOperator::Multiply => BinOp::Mul,
        sp::BinaryOperator::Divide => BinOp::Div,
        sp::BinaryOperator::MyIntegerDivide => BinOp::IntDiv,
        sp::BinaryOperator::Modulo => BinOp::Mod,
        sp::BinaryOperator::BitwiseAnd => BinOp::BitAnd,
        sp::BinaryOperator::BitwiseOr => BinOp::BitOr,
        sp::BinaryOperator::BitwiseXor => BinOp::BitXor,
        sp::BinaryOperator::PGBitwiseShiftLeft => BinOp::Shl,
        sp::BinaryOperator::PGBitwiseShiftRight => BinOp::Shr,
        other => return not_supported(format!("binary operator: {}", other)),
    })
}

fn lower_function(tree: &mut SyntaxTree, f: &sp::Function) -> NeedleResult<NodeId> {
    if f.over.is_some() {
        return not_supported("window function");
    }
    let name = single_name_part(&f.name)?.to_lowercase();

    let mut args = Vec::new();
    let mut distinct = false;
    let mut star = false;
    match &f.args {
        sp::FunctionArguments::None => {}
        sp::FunctionArguments::List(list) => {
            distinct = matches!(
                list.duplicate_treatment,
                Some(sp::DuplicateTreatment::Distinct)
            );
            for arg in &list.args {
                match arg {
                    sp::FunctionArg::Unnamed(sp::FunctionArgExpr::Expr(e)) => {
                        args.push(lower_expr(tree, e)?);
                    }
                    sp::FunctionArg::Unnamed(sp::FunctionArgExpr::Wildcard) => star = true,
                    other => return not_supported(format!("function argument: {}", other)),
                }
            }
        }
        sp::FunctionArguments::Subquery(_) => return not_supported("subquery argument"),
    }

    if AGGREGATE_FUNCS.contains(&name.as_str()) {
        if star && name != "count" {
            return Err(NeedleError::InvalidExpr(format!(
                "wildcard argument only valid in COUNT: {}",
                f
            )));
        }
        Ok(tree.add(NodeKind::AggregateFunc {
            name,
            args,
            distinct,
            star,
        }))
    } else {
        if star || distinct {
            return not_supported(format!("function: {}", f));
        }
        Ok(tree.add(NodeKind::FuncCall { name, args }))
    }
}

fn lower_column_name(tree: &mut SyntaxTree, name: &sp::ObjectName) -> NeedleResult<NodeId> {
    let parts = name_parts(name)?;
    let (schema, table, col) = match parts.as_slice() {
        [n] => (String::new(), String::new(), n.clone()),
        [t, n] => (String::new(), t.clone(), n.clone()),
        [s, t, n] => (s.clone(), t.clone(), n.clone()),
        _ => return not_supported(format!("column name: {}", name)),
    };
    Ok(tree.add(NodeKind::ColumnName {
        schema,
        table,
        name: col,
    }))
}

fn name_parts(name: &sp::ObjectName) -> NeedleResult<Vec<String>> {
    let mut parts = Vec::new();
    for part in &name.0 {
        match part {
            sp::ObjectNamePart::Identifier(ident) => parts.push(ident.value.clone()),
            other => return not_supported(format!("name part: {}", other)),
        }
    }
    Ok(parts)
}

fn single_name_part(name: &sp::ObjectName) -> NeedleResult<String> {
    let parts = name_parts(name)?;
    match parts.as_slice() {
        [n] => Ok(n.clone()),
        _ => not_supported(format!("qualified name: {}", name)),
    }
}

fn lower_create_table(tree: &mut SyntaxTree, ct: &sp::CreateTable) -> NeedleResult<NodeId> {
    let name = single_name_part(&ct.name)?;

    let mut columns = Vec::new();
    for col in &ct.columns {
        columns.push(lower_column_def(tree, col)?);
    }

    let mut constraints = Vec::new();
    for c in &ct.constraints {
        constraints.push(lower_table_constraint(tree, c)?);
    }

    Ok(tree.add(NodeKind::CreateTable {
        name,
        if_not_exists: ct.if_not_exists,
        columns,
        constraints,
    }))
}

fn lower_column_def(tree: &mut SyntaxTree, col: &sp::ColumnDef) -> NeedleResult<NodeId> {
    let mut ty = lower_data_type(&col.data_type)?;
    let mut options = Vec::new();
    for opt in &col.options {
        match &opt.option {
            sp::ColumnOption::NotNull => options.push(ColumnOpt::NotNull),
            sp::ColumnOption::Null => options.push(ColumnOpt::Null),
            sp::ColumnOption::Unique { is_primary, .. } => {
                if *is_primary {
                    options.push(ColumnOpt::PrimaryKey);
                } else {
                    options.push(ColumnOpt::Unique);
                }
            }
            sp::ColumnOption::Default(e) => options.push(ColumnOpt::Default(e.to_string())),
            sp::ColumnOption::OnUpdate(e) => options.push(ColumnOpt::OnUpdate(e.to_string())),
            sp::ColumnOption::Comment(c) => options.push(ColumnOpt::Comment(c.clone())),
            sp::ColumnOption::DialectSpecific(toks) if is_auto_increment(toks) => {
                options.push(ColumnOpt::AutoIncrement);
            }
            other => {
                return not_supported(format!(
                    "column option on {}: {}",
                    col.name.value, other
                ))
            }
        }
    }

    // Fold the options into the column's type flags.
    for opt in &options {
        match opt {
            ColumnOpt::NotNull => ty.not_null = true,
            ColumnOpt::PrimaryKey => ty.primary_key = true,
            ColumnOpt::AutoIncrement => ty.auto_increment = true,
            _ => {}
        }
    }

    Ok(tree.add_typed(
        NodeKind::ColumnDef {
            name: col.name.value.clone(),
            options,
        },
        ty,
    ))
}

fn is_auto_increment(toks: &[sqlparser::tokenizer::Token]) -> bool {
    let joined = toks
        .iter()
        .map(|t| t.to_string())
        .collect::<String>()
        .to_uppercase();
    joined.contains("AUTO_INCREMENT")
}

fn lower_table_constraint(
    tree: &mut SyntaxTree,
    c: &sp::TableConstraint,
) -> NeedleResult<NodeId> {
    let (kind, name, columns) = match c {
        sp::TableConstraint::PrimaryKey { name, columns, .. } => (
            ConstraintKind::PrimaryKey,
            ident_or_empty(name),
            index_column_names(columns)?,
        ),
        sp::TableConstraint::Unique { name, columns, .. } => (
            ConstraintKind::Unique,
            ident_or_empty(name),
            index_column_names(columns)?,
        ),
        sp::TableConstraint::Index { name, columns, .. } => (
            ConstraintKind::Index,
            ident_or_empty(name),
            index_column_names(columns)?,
        ),
        other => return not_supported(format!("table constraint: {}", other)),
    };
    Ok(tree.add(NodeKind::Constraint {
        kind,
        name,
        columns,
    }))
}

fn ident_or_empty(name: &Option<sp::Ident>) -> String {
    name.as_ref().map(|i| i.value.clone()).unwrap_or_default()
}

fn index_column_names(columns: &[sp::Ident]) -> NeedleResult<Vec<String>> {
    Ok(columns.iter().map(|ident| ident.value.clone()).collect())
}

fn lower_data_type(dt: &sp::DataType) -> NeedleResult<FieldType> {
    use sp::DataType as D;
    let ft = match dt {
        D::TinyInt(n) => int_type(TypeKind::Tiny, n, false),
        D::TinyIntUnsigned(n) => int_type(TypeKind::Tiny, n, true),
        D::SmallInt(n) => int_type(TypeKind::Short, n, false),
        D::SmallIntUnsigned(n) => int_type(TypeKind::Short, n, true),
        D::MediumInt(n) => int_type(TypeKind::Int24, n, false),
        D::MediumIntUnsigned(n) => int_type(TypeKind::Int24, n, true),
        D::Int(n) | D::Integer(n) => int_type(TypeKind::Long, n, false),
        D::IntUnsigned(n) | D::IntegerUnsigned(n) => int_type(TypeKind::Long, n, true),
        D::BigInt(n) => int_type(TypeKind::LongLong, n, false),
        D::BigIntUnsigned(n) => int_type(TypeKind::LongLong, n, true),
        D::Float(n) => int_type(TypeKind::Float, n, false),
        D::Double(info) => exact_type(TypeKind::Double, info),
        D::Real => FieldType::new(TypeKind::Double),
        D::Decimal(info) | D::Numeric(info) | D::Dec(info) => exact_type(TypeKind::Decimal, info),
        D::Char(len) | D::Character(len) => char_type(TypeKind::Char, len)?,
        D::Varchar(len) | D::CharVarying(len) | D::CharacterVarying(len) => {
            char_type(TypeKind::VarChar, len)?
        }
        D::Text | D::TinyText | D::MediumText | D::LongText => FieldType::new(TypeKind::Text),
        D::Blob(_) | D::TinyBlob | D::MediumBlob | D::LongBlob => FieldType::new(TypeKind::Blob),
        D::Binary(_) | D::Varbinary(_) => {
            let mut t = FieldType::new(TypeKind::Blob);
            t.binary = true;
            t
        }
        D::Date => FieldType::new(TypeKind::Date),
        D::Datetime(fsp) => {
            let mut t = FieldType::new(TypeKind::Datetime);
            t.flen = fsp.map(|v| v as u32);
            t
        }
        D::Timestamp(fsp, _) => {
            let mut t = FieldType::new(TypeKind::Timestamp);
            t.flen = fsp.map(|v| v as u32);
            t
        }
        D::JSON => FieldType::new(TypeKind::Json),
        D::Boolean => {
            let mut t = FieldType::new(TypeKind::Tiny).with_flen(1);
            t.is_boolean = true;
            t
        }
        other => return not_supported(format!("column type: {}", other)),
    };
    Ok(ft)
}

fn int_type(kind: TypeKind, n: &Option<u64>, unsigned: bool) -> FieldType {
    let mut t = FieldType::new(kind);
    t.flen = n.map(|v| v as u32);
    t.unsigned = unsigned;
    // TINYINT(1) is the MySQL boolean idiom.
    if kind == TypeKind::Tiny && t.flen == Some(1) {
        t.is_boolean = true;
    }
    t
}

fn exact_type(kind: TypeKind, info: &sp::ExactNumberInfo) -> FieldType {
    let mut t = FieldType::new(kind);
    match info {
        sp::ExactNumberInfo::None => {}
        sp::ExactNumberInfo::Precision(p) => t.flen = Some(*p as u32),
        sp::ExactNumberInfo::PrecisionAndScale(p, s) => {
            t.flen = Some(*p as u32);
            t.decimal = Some(*s as u32);
        }
    }
    t
}

fn char_type(kind: TypeKind, len: &Option<sp::CharacterLength>) -> NeedleResult<FieldType> {
    let mut t = FieldType::new(kind);
    match len {
        None => {}
        Some(sp::CharacterLength::IntegerLength { length, .. }) => {
            t.flen = Some(*length as u32);
        }
        Some(sp::CharacterLength::Max) => return not_supported("CHAR(MAX)"),
    }
    Ok(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeKind;

    #[test]
    fn test_parse_one_rejects_garbage() {
        assert!(matches!(
            parse_one("SELECT FROM FROM"),
            Err(NeedleError::Parse(_))
        ));
        assert!(matches!(
            parse_one("SELECT 1; SELECT 2"),
            Err(NeedleError::Parse(_))
        ));
    }

    #[test]
    fn test_create_table_sets_flags() {
        let tree = parse_one(
            "CREATE TABLE musics (id BIGINT NOT NULL PRIMARY KEY AUTO_INCREMENT, \
             name VARCHAR(255) NOT NULL, note TEXT)",
        )
        .unwrap();
        let NodeKind::CreateTable { columns, .. } = tree.kind(tree.root()) else {
            panic!("not a create table");
        };
        let id_ty = tree.ty(columns[0]);
        assert!(id_ty.not_null);
        assert!(id_ty.primary_key);
        assert!(id_ty.auto_increment);
        assert_eq!(id_ty.kind, TypeKind::LongLong);
        let name_ty = tree.ty(columns[1]);
        assert!(name_ty.not_null);
        assert_eq!(name_ty.flen, Some(255));
        let note_ty = tree.ty(columns[2]);
        assert!(!note_ty.not_null);
    }

    #[test]
    fn test_restore_uppercases_and_single_quotes() {
        let tree = parse_one("select name from musics where author = 'a''b'").unwrap();
        assert_eq!(
            tree.sql(),
            "SELECT name FROM musics WHERE author = 'a''b'"
        );
    }

    #[test]
    fn test_restore_round_trips() {
        let sqls = [
            "SELECT a, b FROM t WHERE a = ? LIMIT ?,?",
            "SELECT u.name FROM u LEFT JOIN p ON u.id = p.uid",
            "INSERT INTO t (a, b) VALUES (?, ?)",
            "UPDATE t SET a = ? WHERE b = ?",
            "DELETE FROM t WHERE a IN (?)",
        ];
        for sql in sqls {
            let once = parse_one(sql).unwrap().sql();
            let twice = parse_one(&once).unwrap().sql();
            assert_eq!(once, twice, "restore not stable for {}", sql);
        }
    }

    #[test]
    fn test_param_markers_carry_positions() {
        let tree = parse_one("SELECT id FROM t WHERE id > ? LIMIT ?, ?").unwrap();
        let mut markers = Vec::new();
        for id in walk_ids(&tree) {
            if matches!(tree.kind(id), NodeKind::ParamMarker) {
                markers.push(tree.pos(id).expect("marker without position"));
            }
        }
        assert_eq!(markers.len(), 3);
        for pair in markers.windows(2) {
            assert!(pair[0] < pair[1], "marker positions not increasing");
        }
    }

    #[test]
    fn test_subquery_in_where_rejected() {
        assert!(matches!(
            parse_one("SELECT id FROM t WHERE id IN (SELECT id FROM s)"),
            Err(NeedleError::NotSupported(_))
        ));
    }

    fn walk_ids(tree: &SyntaxTree) -> Vec<crate::ast::NodeId> {
        let mut out = vec![tree.root()];
        let mut i = 0;
        while i < out.len() {
            out.extend(tree.children(out[i]));
            i += 1;
        }
        out
    }
}
