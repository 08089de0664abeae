//! Generated-code model: Go types, fields, structs and the per-statement
//! function descriptors assembled by the codegen pass.

pub mod gofmt;
pub mod templates;

use crate::config::CacheDuration;
use crate::schema::GoTypeName;

/// Capitalize each underscore-separated segment: `spotify_id` becomes
/// `SpotifyId`. The only source of generated field names.
pub fn go_name(s: &str) -> String {
    s.split('_')
        .filter(|seg| !seg.is_empty())
        .map(|seg| {
            let mut chars = seg.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// A Go type as written in a struct field or signature. When both list
/// and pointer, nullability sits on the element: `[]*T`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoType {
    pub name: GoTypeName,
    pub is_pointer: bool,
    pub is_list: bool,
}

impl GoType {
    pub fn new(t: crate::schema::GoType, is_list: bool) -> GoType {
        GoType {
            name: t.name,
            is_pointer: !t.not_null,
            is_list,
        }
    }
}

impl std::fmt::Display for GoType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_list {
            write!(f, "[]")?;
        }
        if self.is_pointer {
            write!(f, "*")?;
        }
        write!(f, "{}", self.name.as_str())
    }
}

/// A struct field with an optional struct tag.
#[derive(Debug, Clone)]
pub struct GoField {
    pub name: String,
    pub ty: GoType,
    pub tag: String,
}

impl GoField {
    pub fn new(name: &str, ty: GoType, tag: String) -> GoField {
        GoField {
            name: go_name(name),
            ty,
            tag,
        }
    }
}

impl std::fmt::Display for GoField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.name, self.ty)?;
        if !self.tag.is_empty() {
            write!(f, " {}", self.tag)?;
        }
        Ok(())
    }
}

/// A generated Go struct plus its helper methods.
#[derive(Debug, Clone)]
pub struct GoStruct {
    pub name: String,
    pub fields: Vec<GoField>,
    pub comment: String,
}

impl GoStruct {
    pub fn new(name: impl Into<String>) -> GoStruct {
        GoStruct {
            name: name.into(),
            fields: Vec::new(),
            comment: String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The struct declaration.
    pub fn decl(&self) -> String {
        let mut out = String::new();
        if self.comment.is_empty() {
            out.push_str(&format!("// {} -\n", self.name));
        } else {
            out.push_str(&format!("// {} - {}\n", self.name, self.comment));
        }
        out.push_str(&format!("type {} struct {{\n", self.name));
        for f in &self.fields {
            out.push_str(&format!("{}\n", f));
        }
        out.push_str("}\n");
        out
    }

    /// A scan function filling the fields, in order, from a row scanner.
    pub fn scan_func(&self) -> String {
        let refs = self
            .fields
            .iter()
            .map(|f| format!("&r.{}", f.name))
            .collect::<Vec<_>>()
            .join(",\n");
        format!(
            "func (r *{}) scan(sc rowScanner) error {{\nreturn sc.Scan(\n{})\n}}\n",
            self.name, refs
        )
    }

    /// The cache-key function: `prefix:%s:%s...`, one segment per field.
    pub fn key_func(&self, prefix: &str) -> String {
        if self.fields.is_empty() {
            return format!(
                "// Key - cache key\nfunc (r *{}) Key() string {{\nreturn \"{}\"\n}}\n",
                self.name, prefix
            );
        }
        let key = format!("{}{}", prefix, ":%s".repeat(self.fields.len()));
        let vals = self
            .fields
            .iter()
            .map(|f| format!("valueToString(r.{})", f.name))
            .collect::<Vec<_>>()
            .join(",\n");
        format!(
            "// Key - cache key\nfunc (r *{}) Key() string {{\nreturn fmt.Sprintf(\"{}\",\n{})\n}}\n",
            self.name, key, vals
        )
    }

    /// The arglist function: scalar fields appended directly, list
    /// fields element-by-element with their lengths recorded.
    pub fn arglist_func(&self) -> String {
        let mut body = String::new();
        for f in &self.fields {
            if f.ty.is_list {
                body.push_str(&format!(
                    "for _, v := range r.{} {{\nargs = append(args, v)\n}}\n",
                    f.name
                ));
                body.push_str(&format!("inlens = append(inlens, len(r.{}))\n", f.name));
            } else {
                body.push_str(&format!("args = append(args, r.{})\n", f.name));
            }
        }
        format!(
            "func (r *{}) arglist() (args []interface{{}}, inlens []int) {{\n{}return\n}}\n",
            self.name, body
        )
    }
}

/// A query function: its statement, cache policy and structs.
#[derive(Debug, Clone)]
pub struct QueryFunc {
    pub name: String,
    pub sql: String,
    pub cache_duration: Option<CacheDuration>,
    pub input: GoStruct,
    pub output: GoStruct,
    /// True when the output struct is the main row struct.
    pub output_is_main: bool,
    pub is_list: bool,
}

impl QueryFunc {
    pub fn return_type(&self) -> String {
        if self.is_list {
            format!("[]{}", self.output.name)
        } else {
            format!("*{}", self.output.name)
        }
    }

    /// The user-facing signature.
    pub fn signature(&self) -> String {
        let args = if self.input.is_empty() {
            String::new()
        } else {
            format!(", args *{}", self.input.name)
        };
        format!(
            "(ctx context.Context{}, options ...Option) ({}, error)",
            args,
            self.return_type()
        )
    }

    /// The signature of the hidden fetch function.
    pub fn signature_inner(&self) -> String {
        format!(
            "(ctx context.Context, exec DBExecuter, args *{}) ({}, error)",
            self.input.name,
            self.return_type()
        )
    }
}

/// A mutation function: its statement, argument struct and invalidation
/// targets (indices into the query funcs).
#[derive(Debug, Clone)]
pub struct MutationFunc {
    pub name: String,
    pub sql: String,
    pub input: GoStruct,
    /// True when the argument struct is the main row struct.
    pub input_is_main: bool,
    pub invalidates: Vec<usize>,
}

impl MutationFunc {
    /// The user-facing signature; invalidation targets are explicit
    /// `(key<i>, val<i>)` pairs typed after their query.
    pub fn signature(&self, queries: &[QueryFunc]) -> String {
        let mut pairs = String::new();
        for (i, q) in self.invalidates.iter().enumerate() {
            let q = &queries[*q];
            pairs.push_str(&format!(
                ", key{} *{}, val{} {}",
                i,
                q.input.name,
                i,
                q.return_type()
            ));
        }
        format!(
            "(ctx context.Context, args *{}{}, options ...Option) (sql.Result, error)",
            self.input.name, pairs
        )
    }
}

/// One `const` line of the statements block.
#[derive(Debug, Clone)]
pub struct SqlStatementDecl {
    pub var_name: String,
    pub sql: String,
}

impl SqlStatementDecl {
    pub fn decl(&self) -> String {
        format!("{} = `{}`", self.var_name, self.sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::GoTypeName;

    fn gt(name: GoTypeName, pointer: bool, list: bool) -> GoType {
        GoType {
            name,
            is_pointer: pointer,
            is_list: list,
        }
    }

    #[test]
    fn test_go_name() {
        assert_eq!(go_name("spotify_id"), "SpotifyId");
        assert_eq!(go_name("name"), "Name");
        assert_eq!(go_name("Offset"), "Offset");
        assert_eq!(go_name("download_path"), "DownloadPath");
    }

    #[test]
    fn test_go_type_display() {
        assert_eq!(gt(GoTypeName::Str, false, false).to_string(), "string");
        assert_eq!(gt(GoTypeName::Str, true, false).to_string(), "*string");
        assert_eq!(gt(GoTypeName::Int64, false, true).to_string(), "[]int64");
        assert_eq!(gt(GoTypeName::Time, true, true).to_string(), "[]*time.Time");
    }

    #[test]
    fn test_struct_decl_and_helpers() {
        let mut s = GoStruct::new("SearchArgs");
        s.fields.push(GoField::new(
            "name",
            gt(GoTypeName::Str, false, false),
            String::new(),
        ));
        s.fields.push(GoField::new(
            "id",
            gt(GoTypeName::Int64, false, true),
            String::new(),
        ));
        let decl = s.decl();
        assert!(decl.contains("type SearchArgs struct {"));
        assert!(decl.contains("Name string"));
        assert!(decl.contains("Id []int64"));

        let key = s.key_func("Search");
        assert!(key.contains("\"Search:%s:%s\""));
        assert!(key.contains("valueToString(r.Name)"));

        let arglist = s.arglist_func();
        assert!(arglist.contains("args = append(args, r.Name)"));
        assert!(arglist.contains("for _, v := range r.Id {"));
        assert!(arglist.contains("inlens = append(inlens, len(r.Id))"));

        let scan = s.scan_func();
        assert!(scan.contains("&r.Name"));
    }

    #[test]
    fn test_empty_struct_key_is_prefix() {
        let s = GoStruct::new("ListAllArgs");
        assert!(s.key_func("ListAll").contains("return \"ListAll\""));
    }
}
