//! Canonical SQL restoration: uppercase keywords, single-quoted strings,
//! bare identifiers. Restored text parses back to an equivalent tree.

use super::{ColumnOpt, ConstraintKind, JoinKind, Lit, NodeId, NodeKind, SyntaxTree, UnOp};

impl SyntaxTree {
    /// Render the subtree rooted at `id` as canonical SQL text.
    pub fn restore(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(&mut out, id);
        out
    }

    fn write_node(&self, out: &mut String, id: NodeId) {
        match self.kind(id) {
            NodeKind::Select {
                distinct,
                fields,
                from,
                selection,
                group_by,
                having,
                order_by,
                limit,
            } => {
                out.push_str("SELECT ");
                if *distinct {
                    out.push_str("DISTINCT ");
                }
                self.write_list(out, fields, ", ");
                if let Some(f) = from {
                    out.push_str(" FROM ");
                    self.write_node(out, *f);
                }
                if let Some(w) = selection {
                    out.push_str(" WHERE ");
                    self.write_node(out, *w);
                }
                if !group_by.is_empty() {
                    out.push_str(" GROUP BY ");
                    self.write_list(out, group_by, ", ");
                }
                if let Some(h) = having {
                    out.push_str(" HAVING ");
                    self.write_node(out, *h);
                }
                if !order_by.is_empty() {
                    out.push_str(" ORDER BY ");
                    self.write_list(out, order_by, ", ");
                }
                if let Some(l) = limit {
                    self.write_node(out, *l);
                }
            }
            NodeKind::Insert {
                table,
                columns,
                lists,
                on_dup,
            } => {
                out.push_str("INSERT INTO ");
                self.write_node(out, *table);
                if !columns.is_empty() {
                    out.push_str(" (");
                    // Insert column lists print bare names; the nodes keep
                    // their qualifiers for the extraction passes.
                    for (i, c) in columns.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        if let NodeKind::ColumnName { name, .. } = self.kind(*c) {
                            out.push_str(name);
                        }
                    }
                    out.push(')');
                }
                out.push_str(" VALUES ");
                for (i, list) in lists.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push('(');
                    self.write_list(out, list, ", ");
                    out.push(')');
                }
                if !on_dup.is_empty() {
                    out.push_str(" ON DUPLICATE KEY UPDATE ");
                    self.write_list(out, on_dup, ", ");
                }
            }
            NodeKind::Update {
                table,
                assignments,
                selection,
            } => {
                out.push_str("UPDATE ");
                self.write_node(out, *table);
                out.push_str(" SET ");
                self.write_list(out, assignments, ", ");
                if let Some(w) = selection {
                    out.push_str(" WHERE ");
                    self.write_node(out, *w);
                }
            }
            NodeKind::Delete {
                table,
                selection,
                order_by,
                limit,
            } => {
                out.push_str("DELETE FROM ");
                self.write_node(out, *table);
                if let Some(w) = selection {
                    out.push_str(" WHERE ");
                    self.write_node(out, *w);
                }
                if !order_by.is_empty() {
                    out.push_str(" ORDER BY ");
                    self.write_list(out, order_by, ", ");
                }
                if let Some(l) = limit {
                    self.write_node(out, *l);
                }
            }
            NodeKind::CreateTable {
                name,
                if_not_exists,
                columns,
                constraints,
            } => {
                out.push_str("CREATE TABLE ");
                if *if_not_exists {
                    out.push_str("IF NOT EXISTS ");
                }
                out.push_str(name);
                out.push_str(" (");
                let mut first = true;
                for c in columns.iter().chain(constraints.iter()) {
                    if !first {
                        out.push_str(", ");
                    }
                    first = false;
                    self.write_node(out, *c);
                }
                out.push(')');
            }
            NodeKind::ColumnDef { name, options } => {
                out.push_str(name);
                out.push(' ');
                out.push_str(&self.ty(id).sql_type());
                for opt in options {
                    match opt {
                        ColumnOpt::NotNull => out.push_str(" NOT NULL"),
                        ColumnOpt::Null => out.push_str(" NULL"),
                        ColumnOpt::PrimaryKey => out.push_str(" PRIMARY KEY"),
                        ColumnOpt::AutoIncrement => out.push_str(" AUTO_INCREMENT"),
                        ColumnOpt::Unique => out.push_str(" UNIQUE"),
                        ColumnOpt::Default(e) => {
                            out.push_str(" DEFAULT ");
                            out.push_str(e);
                        }
                        ColumnOpt::OnUpdate(e) => {
                            out.push_str(" ON UPDATE ");
                            out.push_str(e);
                        }
                        ColumnOpt::Comment(c) => {
                            out.push_str(" COMMENT ");
                            out.push_str(&quote_str(c));
                        }
                    }
                }
            }
            NodeKind::Constraint {
                kind,
                name,
                columns,
            } => {
                match kind {
                    ConstraintKind::PrimaryKey => out.push_str("PRIMARY KEY"),
                    ConstraintKind::Unique => {
                        out.push_str("UNIQUE KEY");
                        if !name.is_empty() {
                            out.push(' ');
                            out.push_str(name);
                        }
                    }
                    ConstraintKind::Index => {
                        out.push_str("KEY");
                        if !name.is_empty() {
                            out.push(' ');
                            out.push_str(name);
                        }
                    }
                }
                out.push_str(" (");
                out.push_str(&columns.join(", "));
                out.push(')');
            }
            NodeKind::TableSource { source, alias } => {
                match self.kind(*source) {
                    NodeKind::Select { .. } => {
                        out.push('(');
                        self.write_node(out, *source);
                        out.push(')');
                    }
                    _ => self.write_node(out, *source),
                }
                if !alias.is_empty() {
                    out.push_str(" AS ");
                    out.push_str(alias);
                }
            }
            NodeKind::TableName { name } => out.push_str(name),
            NodeKind::Join {
                kind,
                left,
                right,
                on,
            } => {
                self.write_node(out, *left);
                match kind {
                    JoinKind::Plain => out.push_str(" JOIN "),
                    JoinKind::Cross => out.push_str(" CROSS JOIN "),
                    JoinKind::Left => out.push_str(" LEFT JOIN "),
                    JoinKind::Right => out.push_str(" RIGHT JOIN "),
                }
                self.write_node(out, *right);
                if let Some(on) = on {
                    out.push_str(" ON ");
                    self.write_node(out, *on);
                }
            }
            NodeKind::SelectField {
                expr,
                wildcard,
                alias,
            } => {
                if *wildcard {
                    out.push('*');
                    return;
                }
                if let Some(e) = expr {
                    self.write_node(out, *e);
                }
                if !alias.is_empty() {
                    out.push_str(" AS ");
                    out.push_str(alias);
                }
            }
            NodeKind::ColumnName {
                schema,
                table,
                name,
            } => {
                if !schema.is_empty() {
                    out.push_str(schema);
                    out.push('.');
                }
                if !table.is_empty() {
                    out.push_str(table);
                    out.push('.');
                }
                out.push_str(name);
            }
            NodeKind::ColumnExpr { name } => self.write_node(out, *name),
            NodeKind::ParamMarker => out.push('?'),
            NodeKind::Literal(lit) => match lit {
                Lit::Null => out.push_str("NULL"),
                Lit::Bool(true) => out.push_str("TRUE"),
                Lit::Bool(false) => out.push_str("FALSE"),
                Lit::Number(n) => out.push_str(n),
                Lit::Str(s) => out.push_str(&quote_str(s)),
            },
            NodeKind::BinaryOp { op, left, right } => {
                self.write_node(out, *left);
                out.push(' ');
                out.push_str(op.sql());
                out.push(' ');
                self.write_node(out, *right);
            }
            NodeKind::UnaryOp { op, expr } => {
                match op {
                    UnOp::Not => out.push_str("NOT "),
                    UnOp::Neg => out.push('-'),
                    UnOp::BitNeg => out.push('~'),
                }
                self.write_node(out, *expr);
            }
            NodeKind::PatternIn {
                expr,
                list,
                negated,
            } => {
                self.write_node(out, *expr);
                if *negated {
                    out.push_str(" NOT");
                }
                out.push_str(" IN (");
                self.write_list(out, list, ", ");
                out.push(')');
            }
            NodeKind::PatternLike {
                expr,
                pattern,
                negated,
            } => {
                self.write_node(out, *expr);
                if *negated {
                    out.push_str(" NOT");
                }
                out.push_str(" LIKE ");
                self.write_node(out, *pattern);
            }
            NodeKind::Between {
                expr,
                low,
                high,
                negated,
            } => {
                self.write_node(out, *expr);
                if *negated {
                    out.push_str(" NOT");
                }
                out.push_str(" BETWEEN ");
                self.write_node(out, *low);
                out.push_str(" AND ");
                self.write_node(out, *high);
            }
            NodeKind::IsNull { expr, negated } => {
                self.write_node(out, *expr);
                if *negated {
                    out.push_str(" IS NOT NULL");
                } else {
                    out.push_str(" IS NULL");
                }
            }
            NodeKind::Paren { expr } => {
                out.push('(');
                self.write_node(out, *expr);
                out.push(')');
            }
            NodeKind::FuncCall { name, args } => {
                out.push_str(&name.to_uppercase());
                out.push('(');
                self.write_list(out, args, ", ");
                out.push(')');
            }
            NodeKind::AggregateFunc {
                name,
                args,
                distinct,
                star,
            } => {
                out.push_str(&name.to_uppercase());
                out.push('(');
                if *distinct {
                    out.push_str("DISTINCT ");
                }
                if *star {
                    out.push('*');
                } else {
                    self.write_list(out, args, ", ");
                }
                out.push(')');
            }
            NodeKind::FuncCast { kind, expr, target } => match kind {
                super::CastKind::Cast => {
                    out.push_str("CAST(");
                    self.write_node(out, *expr);
                    out.push_str(" AS ");
                    out.push_str(&target.sql_type());
                    out.push(')');
                }
                super::CastKind::Convert => {
                    out.push_str("CONVERT(");
                    self.write_node(out, *expr);
                    out.push_str(", ");
                    out.push_str(&target.sql_type());
                    out.push(')');
                }
                super::CastKind::Binary => {
                    out.push_str("BINARY ");
                    self.write_node(out, *expr);
                }
            },
            NodeKind::Assignment { column, value } => {
                self.write_node(out, *column);
                out.push_str(" = ");
                self.write_node(out, *value);
            }
            NodeKind::OrderItem { expr, desc } => {
                self.write_node(out, *expr);
                if *desc {
                    out.push_str(" DESC");
                }
            }
            NodeKind::Limit { offset, count } => {
                out.push_str(" LIMIT ");
                if let Some(o) = offset {
                    self.write_node(out, *o);
                    out.push(',');
                }
                if let Some(c) = count {
                    self.write_node(out, *c);
                }
            }
        }
    }

    fn write_list(&self, out: &mut String, ids: &[NodeId], sep: &str) {
        for (i, id) in ids.iter().enumerate() {
            if i > 0 {
                out.push_str(sep);
            }
            self.write_node(out, *id);
        }
    }
}

fn quote_str(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}
