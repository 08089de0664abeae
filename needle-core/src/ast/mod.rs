//! The statement AST.
//!
//! Statements are stored as tagged variants in an arena (`SyntaxTree`),
//! with `NodeId` links between nodes. Visitors walk ids and mutate nodes
//! through the arena, which keeps an ancestor stack cheap to maintain and
//! lets a visitor standing on one node inspect any other part of the
//! tree.

mod restore;

use crate::types::FieldType;

/// Position of a token in the original statement text. Ordered so
/// parameter markers can be sorted by where they appear in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SrcPos {
    pub line: u64,
    pub column: u64,
}

/// Handle to a node inside a `SyntaxTree`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// One AST node: its variant, its inferred type and its source position
/// (positions are only recorded where ordering matters, i.e. on `?`
/// markers).
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub ty: FieldType,
    pub pos: Option<SrcPos>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// Unspecified join kind, treated as cross.
    Plain,
    Cross,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Xor,
    Plus,
    Minus,
    Mul,
    Div,
    IntDiv,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinOp {
    /// Arithmetic and bitwise operators keep the left operand's type;
    /// everything else produces a boolean.
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinOp::Plus
                | BinOp::Minus
                | BinOp::Mul
                | BinOp::Div
                | BinOp::IntDiv
                | BinOp::Mod
                | BinOp::BitAnd
                | BinOp::BitOr
                | BinOp::BitXor
                | BinOp::Shl
                | BinOp::Shr
        )
    }

    pub fn sql(self) -> &'static str {
        match self {
            BinOp::Eq => "=",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::LtEq => "<=",
            BinOp::Gt => ">",
            BinOp::GtEq => ">=",
            BinOp::And => "AND",
            BinOp::Or => "OR",
            BinOp::Xor => "XOR",
            BinOp::Plus => "+",
            BinOp::Minus => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::IntDiv => "DIV",
            BinOp::Mod => "%",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Not,
    Neg,
    BitNeg,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lit {
    Null,
    Bool(bool),
    /// Numbers keep their source spelling.
    Number(String),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    Cast,
    Convert,
    /// The `BINARY expr` operator form.
    Binary,
}

/// Column options of a CREATE TABLE column, kept for restoration. The
/// corresponding flags are also folded into the column's `FieldType` by
/// the parser adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnOpt {
    NotNull,
    Null,
    PrimaryKey,
    AutoIncrement,
    Unique,
    /// DEFAULT with the expression's canonical text.
    Default(String),
    /// ON UPDATE with the expression's canonical text.
    OnUpdate(String),
    Comment(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    PrimaryKey,
    Unique,
    Index,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Select {
        distinct: bool,
        fields: Vec<NodeId>,
        from: Option<NodeId>,
        selection: Option<NodeId>,
        group_by: Vec<NodeId>,
        having: Option<NodeId>,
        order_by: Vec<NodeId>,
        limit: Option<NodeId>,
    },
    Insert {
        table: NodeId,
        columns: Vec<NodeId>,
        lists: Vec<Vec<NodeId>>,
        on_dup: Vec<NodeId>,
    },
    Update {
        table: NodeId,
        assignments: Vec<NodeId>,
        selection: Option<NodeId>,
    },
    Delete {
        table: NodeId,
        selection: Option<NodeId>,
        order_by: Vec<NodeId>,
        limit: Option<NodeId>,
    },
    CreateTable {
        name: String,
        if_not_exists: bool,
        columns: Vec<NodeId>,
        constraints: Vec<NodeId>,
    },
    /// A column definition; the column's type lives in the node's `ty`.
    ColumnDef {
        name: String,
        options: Vec<ColumnOpt>,
    },
    Constraint {
        kind: ConstraintKind,
        name: String,
        columns: Vec<String>,
    },
    /// A table reference with an optional alias; `source` is a
    /// `TableName` or, for a derived table, a `Select`.
    TableSource {
        source: NodeId,
        alias: String,
    },
    TableName {
        name: String,
    },
    Join {
        kind: JoinKind,
        left: NodeId,
        right: NodeId,
        on: Option<NodeId>,
    },
    SelectField {
        expr: Option<NodeId>,
        wildcard: bool,
        alias: String,
    },
    /// A (possibly qualified) column name; not an expression by itself.
    ColumnName {
        schema: String,
        table: String,
        name: String,
    },
    /// A column name in expression position.
    ColumnExpr {
        name: NodeId,
    },
    ParamMarker,
    Literal(Lit),
    BinaryOp {
        op: BinOp,
        left: NodeId,
        right: NodeId,
    },
    UnaryOp {
        op: UnOp,
        expr: NodeId,
    },
    PatternIn {
        expr: NodeId,
        list: Vec<NodeId>,
        negated: bool,
    },
    PatternLike {
        expr: NodeId,
        pattern: NodeId,
        negated: bool,
    },
    Between {
        expr: NodeId,
        low: NodeId,
        high: NodeId,
        negated: bool,
    },
    IsNull {
        expr: NodeId,
        negated: bool,
    },
    Paren {
        expr: NodeId,
    },
    FuncCall {
        name: String,
        args: Vec<NodeId>,
    },
    AggregateFunc {
        name: String,
        args: Vec<NodeId>,
        distinct: bool,
        star: bool,
    },
    FuncCast {
        kind: CastKind,
        expr: NodeId,
        target: FieldType,
    },
    Assignment {
        column: NodeId,
        value: NodeId,
    },
    OrderItem {
        expr: NodeId,
        desc: bool,
    },
    Limit {
        offset: Option<NodeId>,
        count: Option<NodeId>,
    },
}

/// Arena holding one parsed statement.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl SyntaxTree {
    pub fn new() -> Self {
        SyntaxTree {
            nodes: Vec::new(),
            root: NodeId(0),
        }
    }

    pub fn add(&mut self, kind: NodeKind) -> NodeId {
        self.add_node(kind, FieldType::default(), None)
    }

    pub fn add_typed(&mut self, kind: NodeKind, ty: FieldType) -> NodeId {
        self.add_node(kind, ty, None)
    }

    pub fn add_at(&mut self, kind: NodeKind, pos: SrcPos) -> NodeId {
        self.add_node(kind, FieldType::default(), Some(pos))
    }

    fn add_node(&mut self, kind: NodeKind, ty: FieldType, pos: Option<SrcPos>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { kind, ty, pos });
        id
    }

    pub fn set_root(&mut self, id: NodeId) {
        self.root = id;
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    pub fn ty(&self, id: NodeId) -> &FieldType {
        &self.nodes[id.index()].ty
    }

    pub fn set_ty(&mut self, id: NodeId, ty: FieldType) {
        self.nodes[id.index()].ty = ty;
    }

    pub fn pos(&self, id: NodeId) -> Option<SrcPos> {
        self.nodes[id.index()].pos
    }

    /// The fully qualified `table.name` of a `ColumnName` node; empty
    /// parts are omitted from the left.
    pub fn column_full_name(&self, id: NodeId) -> String {
        match self.kind(id) {
            NodeKind::ColumnName { table, name, .. } => {
                if table.is_empty() {
                    name.clone()
                } else {
                    format!("{}.{}", table, name)
                }
            }
            _ => String::new(),
        }
    }

    /// Children in deterministic traversal order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        match self.kind(id) {
            NodeKind::Select {
                fields,
                from,
                selection,
                group_by,
                having,
                order_by,
                limit,
                ..
            } => {
                out.extend(from.iter().copied());
                out.extend(fields.iter().copied());
                out.extend(selection.iter().copied());
                out.extend(group_by.iter().copied());
                out.extend(having.iter().copied());
                out.extend(order_by.iter().copied());
                out.extend(limit.iter().copied());
            }
            NodeKind::Insert {
                table,
                columns,
                lists,
                on_dup,
            } => {
                out.push(*table);
                out.extend(columns.iter().copied());
                for list in lists {
                    out.extend(list.iter().copied());
                }
                out.extend(on_dup.iter().copied());
            }
            NodeKind::Update {
                table,
                assignments,
                selection,
            } => {
                out.push(*table);
                out.extend(assignments.iter().copied());
                out.extend(selection.iter().copied());
            }
            NodeKind::Delete {
                table,
                selection,
                order_by,
                limit,
            } => {
                out.push(*table);
                out.extend(selection.iter().copied());
                out.extend(order_by.iter().copied());
                out.extend(limit.iter().copied());
            }
            NodeKind::CreateTable {
                columns,
                constraints,
                ..
            } => {
                out.extend(columns.iter().copied());
                out.extend(constraints.iter().copied());
            }
            NodeKind::TableSource { source, .. } => out.push(*source),
            NodeKind::Join {
                left, right, on, ..
            } => {
                out.push(*left);
                out.push(*right);
                out.extend(on.iter().copied());
            }
            NodeKind::SelectField { expr, .. } => out.extend(expr.iter().copied()),
            NodeKind::ColumnExpr { name } => out.push(*name),
            NodeKind::BinaryOp { left, right, .. } => {
                out.push(*left);
                out.push(*right);
            }
            NodeKind::UnaryOp { expr, .. } => out.push(*expr),
            NodeKind::PatternIn { expr, list, .. } => {
                out.push(*expr);
                out.extend(list.iter().copied());
            }
            NodeKind::PatternLike { expr, pattern, .. } => {
                out.push(*expr);
                out.push(*pattern);
            }
            NodeKind::Between {
                expr, low, high, ..
            } => {
                out.push(*expr);
                out.push(*low);
                out.push(*high);
            }
            NodeKind::IsNull { expr, .. } => out.push(*expr),
            NodeKind::Paren { expr } => out.push(*expr),
            NodeKind::FuncCall { args, .. } => out.extend(args.iter().copied()),
            NodeKind::AggregateFunc { args, .. } => out.extend(args.iter().copied()),
            NodeKind::FuncCast { expr, .. } => out.push(*expr),
            NodeKind::Assignment { column, value } => {
                out.push(*column);
                out.push(*value);
            }
            NodeKind::OrderItem { expr, .. } => out.push(*expr),
            NodeKind::Limit { offset, count } => {
                out.extend(offset.iter().copied());
                out.extend(count.iter().copied());
            }
            NodeKind::ColumnName { .. }
            | NodeKind::TableName { .. }
            | NodeKind::ParamMarker
            | NodeKind::Literal(_)
            | NodeKind::ColumnDef { .. }
            | NodeKind::Constraint { .. } => {}
        }
        out
    }

    /// Canonical SQL of the whole statement.
    pub fn sql(&self) -> String {
        self.restore(self.root)
    }

    /// Every node id in the arena, in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }
}

impl Default for SyntaxTree {
    fn default() -> Self {
        SyntaxTree::new()
    }
}
