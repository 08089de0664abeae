//! The table model: immutable descriptors of parsed `CREATE TABLE`
//! statements, plus the SQL-to-Go type mapping used by codegen.

use crate::ast::{ConstraintKind, NodeKind, SyntaxTree};
use crate::error::{NeedleError, NeedleResult};
use crate::types::{EvalType, FieldType, TypeKind};

/// A column of a table: its name and its field type, detached from the
/// tree so visitors can clone types freely.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name: String,
    pub ty: FieldType,
}

impl ColumnInfo {
    pub fn not_null(&self) -> bool {
        self.ty.not_null
    }

    pub fn go_type(&self) -> Option<GoType> {
        go_type(&self.ty)
    }
}

/// An index derived from a table constraint.
#[derive(Debug, Clone)]
pub struct IndexInfo {
    pub name: String,
    pub primary: bool,
    pub key_names: Vec<String>,
}

/// A parsed table schema. Owns its syntax tree; immutable after
/// construction.
#[derive(Debug, Clone)]
pub struct TableInfo {
    tree: SyntaxTree,
    hidden_fields: Vec<String>,
}

impl TableInfo {
    /// Wrap a parsed `CREATE TABLE` tree. `IF NOT EXISTS` is enforced on
    /// the stored statement, the way exported schemas are written.
    pub fn new(mut tree: SyntaxTree, hidden_fields: Vec<String>) -> NeedleResult<TableInfo> {
        let root = tree.root();
        match tree.node_mut(root).kind {
            NodeKind::CreateTable {
                ref mut if_not_exists,
                ..
            } => *if_not_exists = true,
            _ => {
                return Err(NeedleError::InvalidConfig(
                    "schema sql is not a CREATE TABLE statement".into(),
                ))
            }
        }
        let table = TableInfo {
            tree,
            hidden_fields,
        };
        table.validate()?;
        Ok(table)
    }

    fn validate(&self) -> NeedleResult<()> {
        let cols = self.columns();
        let mut seen = std::collections::HashSet::new();
        for col in &cols {
            if !seen.insert(col.name.clone()) {
                return Err(NeedleError::InvalidConfig(format!(
                    "duplicated column name: {}",
                    col.name
                )));
            }
            if go_type(&col.ty).is_none() {
                return Err(NeedleError::InvalidConfig(format!(
                    "column {} has no generated-code mapping: {}",
                    col.name,
                    col.ty.sql_type()
                )));
            }
        }
        for hf in &self.hidden_fields {
            if !cols.iter().any(|c| &c.name == hf) {
                let hint = closest_name(hf, cols.iter().map(|c| c.name.as_str()));
                let mut msg = format!("hidden fields not defined in table: {}", hf);
                if let Some(h) = hint {
                    msg.push_str(&format!(", did you mean {}?", h));
                }
                return Err(NeedleError::InvalidConfig(msg));
            }
        }
        Ok(())
    }

    pub fn name(&self) -> String {
        match self.tree.kind(self.tree.root()) {
            NodeKind::CreateTable { name, .. } => name.clone(),
            _ => String::new(),
        }
    }

    /// Canonical SQL of the schema.
    pub fn sql(&self) -> String {
        self.tree.sql()
    }

    pub fn columns(&self) -> Vec<ColumnInfo> {
        let NodeKind::CreateTable { columns, .. } = self.tree.kind(self.tree.root()) else {
            return Vec::new();
        };
        columns
            .iter()
            .map(|id| match self.tree.kind(*id) {
                NodeKind::ColumnDef { name, .. } => ColumnInfo {
                    name: name.clone(),
                    ty: self.tree.ty(*id).clone(),
                },
                _ => ColumnInfo {
                    name: String::new(),
                    ty: FieldType::default(),
                },
            })
            .collect()
    }

    /// Columns in declaration order, minus the hidden fields; what
    /// `SELECT *` expands to.
    pub fn star_columns(&self) -> Vec<ColumnInfo> {
        self.columns()
            .into_iter()
            .filter(|c| !self.hidden_fields.contains(&c.name))
            .collect()
    }

    pub fn indexes(&self) -> Vec<IndexInfo> {
        let NodeKind::CreateTable { constraints, .. } = self.tree.kind(self.tree.root()) else {
            return Vec::new();
        };
        constraints
            .iter()
            .filter_map(|id| match self.tree.kind(*id) {
                NodeKind::Constraint {
                    kind,
                    name,
                    columns,
                } => Some(IndexInfo {
                    name: name.clone(),
                    primary: *kind == ConstraintKind::PrimaryKey,
                    key_names: columns.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

fn closest_name<'a>(target: &str, candidates: impl Iterator<Item = &'a str>) -> Option<String> {
    candidates
        .map(|c| (strsim::levenshtein(target, c), c))
        .filter(|(d, _)| *d <= 2)
        .min_by_key(|(d, _)| *d)
        .map(|(_, c)| c.to_string())
}

/// Names of Go types appearing in generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoTypeName {
    Int64,
    Float64,
    Str,
    Time,
    Bool,
    RawJson,
}

impl GoTypeName {
    pub fn as_str(self) -> &'static str {
        match self {
            GoTypeName::Int64 => "int64",
            GoTypeName::Float64 => "float64",
            GoTypeName::Str => "string",
            GoTypeName::Time => "time.Time",
            GoTypeName::Bool => "bool",
            GoTypeName::RawJson => "json.RawMessage",
        }
    }
}

/// A Go-side type with schema nullability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoType {
    pub name: GoTypeName,
    pub not_null: bool,
}

impl std::fmt::Display for GoType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.not_null {
            write!(f, "{}", self.name.as_str())
        } else {
            write!(f, "*{}", self.name.as_str())
        }
    }
}

/// Map a SQL field type to its Go rendition. `None` when the type has no
/// mapping (e.g. DECIMAL).
pub fn go_type(t: &FieldType) -> Option<GoType> {
    let name = go_type_name(t)?;
    Some(GoType {
        name,
        not_null: t.not_null,
    })
}

fn go_type_name(t: &FieldType) -> Option<GoTypeName> {
    // TINYINT(1) and explicitly boolean-flagged types map to bool.
    if (t.kind == TypeKind::Tiny && t.flen == Some(1)) || t.is_boolean {
        return Some(GoTypeName::Bool);
    }
    match t.eval_type() {
        EvalType::Int => Some(GoTypeName::Int64),
        EvalType::Real => Some(GoTypeName::Float64),
        EvalType::String => Some(GoTypeName::Str),
        EvalType::Datetime => Some(GoTypeName::Time),
        EvalType::Json => Some(GoTypeName::RawJson),
        EvalType::Decimal => None,
    }
    .filter(|_| t.kind != TypeKind::Unspecified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_one;

    const MUSICS: &str = "CREATE TABLE musics (\
        author VARCHAR(255) NOT NULL, \
        name VARCHAR(255) NOT NULL, \
        spotify_id BIGINT NOT NULL, \
        download_path VARCHAR(1024), \
        PRIMARY KEY (spotify_id), KEY name_idx (name))";

    fn table(hidden: &[&str]) -> NeedleResult<TableInfo> {
        TableInfo::new(
            parse_one(MUSICS).unwrap(),
            hidden.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_columns_in_order() {
        let t = table(&[]).unwrap();
        assert_eq!(t.name(), "musics");
        let names: Vec<_> = t.columns().iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, ["author", "name", "spotify_id", "download_path"]);
        assert!(t.columns()[0].not_null());
        assert!(!t.columns()[3].not_null());
    }

    #[test]
    fn test_star_columns_filter_hidden() {
        let t = table(&["download_path"]).unwrap();
        let names: Vec<_> = t.star_columns().iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, ["author", "name", "spotify_id"]);
    }

    #[test]
    fn test_hidden_field_must_exist() {
        let err = table(&["downlaod_path"]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("hidden fields not defined"), "{}", msg);
        assert!(msg.contains("download_path"), "{}", msg);
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let tree = parse_one("CREATE TABLE t (a INT, a INT)").unwrap();
        assert!(TableInfo::new(tree, vec![]).is_err());
    }

    #[test]
    fn test_indexes() {
        let t = table(&[]).unwrap();
        let idx = t.indexes();
        assert_eq!(idx.len(), 2);
        assert!(idx[0].primary);
        assert_eq!(idx[0].key_names, ["spotify_id"]);
        assert_eq!(idx[1].name, "name_idx");
        assert!(!idx[1].primary);
    }

    #[test]
    fn test_sql_forces_if_not_exists() {
        let t = table(&[]).unwrap();
        assert!(t.sql().starts_with("CREATE TABLE IF NOT EXISTS musics ("));
    }

    #[test]
    fn test_go_type_mapping() {
        let t = |sql_kind: TypeKind| FieldType::new(sql_kind);
        assert_eq!(
            go_type(&t(TypeKind::LongLong).not_null_clone())
                .unwrap()
                .to_string(),
            "int64"
        );
        assert_eq!(go_type(&t(TypeKind::VarChar)).unwrap().to_string(), "*string");
        assert_eq!(
            go_type(&t(TypeKind::Datetime)).unwrap().to_string(),
            "*time.Time"
        );
        let bool_col = FieldType::new(TypeKind::Tiny).with_flen(1);
        assert_eq!(go_type(&bool_col).unwrap().name, GoTypeName::Bool);
        assert!(go_type(&t(TypeKind::Decimal)).is_none());
        assert!(go_type(&FieldType::default()).is_none());
    }
}
