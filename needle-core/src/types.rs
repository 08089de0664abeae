//! Nullability-aware SQL field types.
//!
//! Every expression node carries a `FieldType`. A type starts out
//! `Unspecified` and is filled in by the type-inference visitor; the flags
//! mirror the column options of the schema (`NOT NULL`, `PRIMARY KEY`,
//! `AUTO_INCREMENT`) plus the markers inference relies on (boolean
//! display, binary collation, unsigned).

use std::fmt;

/// The concrete kind of a SQL value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Unspecified,
    /// The type of a bare NULL literal.
    Null,
    Tiny,
    Short,
    Int24,
    Long,
    LongLong,
    Float,
    Double,
    Decimal,
    Char,
    VarChar,
    Text,
    Blob,
    Date,
    Datetime,
    Timestamp,
    Json,
}

/// Evaluation category used by implicit-conversion checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalType {
    Int,
    Real,
    Decimal,
    String,
    Datetime,
    Json,
}

/// A SQL field type with display width and option flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldType {
    pub kind: TypeKind,
    /// Display width, e.g. the 255 of VARCHAR(255) or the 1 of TINYINT(1).
    pub flen: Option<u32>,
    /// Scale of DECIMAL(p, s).
    pub decimal: Option<u32>,
    pub not_null: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub unsigned: bool,
    pub is_boolean: bool,
    pub binary: bool,
}

impl Default for FieldType {
    fn default() -> Self {
        FieldType::new(TypeKind::Unspecified)
    }
}

impl FieldType {
    pub fn new(kind: TypeKind) -> Self {
        FieldType {
            kind,
            flen: None,
            decimal: None,
            not_null: false,
            primary_key: false,
            auto_increment: false,
            unsigned: false,
            is_boolean: false,
            binary: false,
        }
    }

    pub fn with_flen(mut self, flen: u32) -> Self {
        self.flen = Some(flen);
        self
    }

    pub fn is_unspecified(&self) -> bool {
        self.kind == TypeKind::Unspecified
    }

    /// A clone with the not-null flag set.
    pub fn not_null_clone(&self) -> FieldType {
        let mut t = self.clone();
        t.not_null = true;
        t
    }

    /// A clone with the not-null flag cleared. Used when an outer join
    /// makes a column nullable regardless of its schema.
    pub fn null_clone(&self) -> FieldType {
        let mut t = self.clone();
        t.not_null = false;
        t
    }

    pub fn eval_type(&self) -> EvalType {
        match self.kind {
            TypeKind::Tiny
            | TypeKind::Short
            | TypeKind::Int24
            | TypeKind::Long
            | TypeKind::LongLong
            | TypeKind::Null
            | TypeKind::Unspecified => EvalType::Int,
            TypeKind::Float | TypeKind::Double => EvalType::Real,
            TypeKind::Decimal => EvalType::Decimal,
            TypeKind::Char | TypeKind::VarChar | TypeKind::Text | TypeKind::Blob => {
                EvalType::String
            }
            TypeKind::Date | TypeKind::Datetime | TypeKind::Timestamp => EvalType::Datetime,
            TypeKind::Json => EvalType::Json,
        }
    }

    /// Loose equality used by the type checker: kind, width and sign;
    /// option flags are deliberately excluded.
    pub fn same_as(&self, other: &FieldType) -> bool {
        self.kind == other.kind && self.flen == other.flen && self.unsigned == other.unsigned
    }

    /// The canonical SQL spelling of the type, without option flags.
    pub fn sql_type(&self) -> String {
        let base = match self.kind {
            TypeKind::Unspecified => "UNSPECIFIED",
            TypeKind::Null => "NULL",
            TypeKind::Tiny => "TINYINT",
            TypeKind::Short => "SMALLINT",
            TypeKind::Int24 => "MEDIUMINT",
            TypeKind::Long => "INT",
            TypeKind::LongLong => "BIGINT",
            TypeKind::Float => "FLOAT",
            TypeKind::Double => "DOUBLE",
            TypeKind::Decimal => "DECIMAL",
            TypeKind::Char => "CHAR",
            TypeKind::VarChar => "VARCHAR",
            TypeKind::Text => "TEXT",
            TypeKind::Blob => "BLOB",
            TypeKind::Date => "DATE",
            TypeKind::Datetime => "DATETIME",
            TypeKind::Timestamp => "TIMESTAMP",
            TypeKind::Json => "JSON",
        };
        let mut out = base.to_string();
        match (self.flen, self.decimal) {
            (Some(l), Some(d)) => out.push_str(&format!("({},{})", l, d)),
            (Some(l), None) => out.push_str(&format!("({})", l)),
            _ => {}
        }
        if self.unsigned {
            out.push_str(" UNSIGNED");
        }
        out
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql_type())?;
        if self.not_null {
            write!(f, " NOT NULL")?;
        }
        Ok(())
    }
}

/// A not-null integer, the type of every LIMIT parameter.
pub fn not_null_int() -> FieldType {
    FieldType::new(TypeKind::Long).not_null_clone()
}

/// A not-null DATETIME, the return type of NOW() and friends.
pub fn not_null_datetime() -> FieldType {
    FieldType::new(TypeKind::Datetime).not_null_clone()
}

/// The boolean result type of comparisons and predicates.
pub fn bool_type() -> FieldType {
    let mut t = FieldType::new(TypeKind::Tiny);
    t.is_boolean = true;
    t
}

/// The float result type of AVG and the variance aggregates.
pub fn float_type() -> FieldType {
    FieldType::new(TypeKind::Float)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_clone_clears_not_null() {
        let t = FieldType::new(TypeKind::VarChar).with_flen(255).not_null_clone();
        assert!(t.not_null);
        let n = t.null_clone();
        assert!(!n.not_null);
        assert_eq!(n.kind, TypeKind::VarChar);
        assert_eq!(n.flen, Some(255));
    }

    #[test]
    fn test_same_as_ignores_flags() {
        let a = FieldType::new(TypeKind::LongLong).not_null_clone();
        let b = FieldType::new(TypeKind::LongLong);
        assert!(a.same_as(&b));
        let c = FieldType::new(TypeKind::Long);
        assert!(!a.same_as(&c));
    }

    #[test]
    fn test_sql_type_spelling() {
        assert_eq!(
            FieldType::new(TypeKind::VarChar).with_flen(255).sql_type(),
            "VARCHAR(255)"
        );
        let mut dec = FieldType::new(TypeKind::Decimal);
        dec.flen = Some(10);
        dec.decimal = Some(2);
        assert_eq!(dec.sql_type(), "DECIMAL(10,2)");
        assert_eq!(bool_type().sql_type(), "TINYINT");
    }

    #[test]
    fn test_eval_categories() {
        assert_eq!(FieldType::new(TypeKind::Tiny).eval_type(), EvalType::Int);
        assert_eq!(FieldType::new(TypeKind::Text).eval_type(), EvalType::String);
        assert_eq!(
            FieldType::new(TypeKind::Timestamp).eval_type(),
            EvalType::Datetime
        );
    }
}
