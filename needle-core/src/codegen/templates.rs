//! Embedded code templates and their typed fronts. Each front gathers
//! the placeholder values for one template and renders it; template
//! errors are compiler errors.

use crate::config::CacheDuration;
use crate::error::NeedleResult;
use crate::render::Template;

static REPO: Template = Template::new("repo", include_str!("../../templates/repo.tmpl"));
static QUERY_INNER_SINGLE: Template = Template::new(
    "query_inner_single",
    include_str!("../../templates/query_inner_single.tmpl"),
);
static QUERY_INNER_MANY: Template = Template::new(
    "query_inner_many",
    include_str!("../../templates/query_inner_many.tmpl"),
);
static QUERY_CACHED: Template = Template::new(
    "query_cached",
    include_str!("../../templates/query_cached.tmpl"),
);
static QUERY_DIRECT: Template = Template::new(
    "query_direct",
    include_str!("../../templates/query_direct.tmpl"),
);
static MUTATION: Template = Template::new("mutation", include_str!("../../templates/mutation.tmpl"));
static LOAD_DUMP: Template = Template::new("loaddump", include_str!("../../templates/loaddump.tmpl"));

/// Spell a TTL as a Go expression; forever is zero.
fn go_duration(d: &CacheDuration) -> String {
    format!("time.Duration({})", d.ttl().as_nanos())
}

fn cache_note(d: &CacheDuration) -> String {
    match d {
        CacheDuration::Forever => "forever".to_string(),
        CacheDuration::Ttl(t) => format!("{:?}", t),
    }
}

/// The per-query function pair: the hidden fetch function plus the
/// public routing function.
pub struct QueryFuncTemplate<'a> {
    pub repo_name: &'a str,
    pub query_name: &'a str,
    pub query_sig: &'a str,
    pub hidden_query_name: &'a str,
    pub arg_type: &'a str,
    pub rst_type: &'a str,
    pub return_type: &'a str,
    pub cache_duration: Option<CacheDuration>,
    pub sql_var_name: &'a str,
    pub is_list: bool,
    /// When non-empty, the outer function materializes an empty argument
    /// struct of this type.
    pub init_args_type: &'a str,
}

impl QueryFuncTemplate<'_> {
    pub fn generate(&self) -> NeedleResult<String> {
        let inner_tmpl = if self.is_list {
            &QUERY_INNER_MANY
        } else {
            &QUERY_INNER_SINGLE
        };
        let inner = inner_tmpl.render(&[
            ("RepoName", self.repo_name),
            ("HiddenQueryName", self.hidden_query_name),
            ("ArgType", self.arg_type),
            ("RstType", self.rst_type),
            ("SQLVarName", self.sql_var_name),
        ])?;

        let init_args = if self.init_args_type.is_empty() {
            String::new()
        } else {
            format!("args := &{}{{}}\n", self.init_args_type)
        };

        let outer = match &self.cache_duration {
            Some(d) => QUERY_CACHED.render(&[
                ("RepoName", self.repo_name),
                ("QueryName", self.query_name),
                ("QuerySig", self.query_sig),
                ("HiddenQueryName", self.hidden_query_name),
                ("ReturnType", self.return_type),
                ("CacheTTL", go_duration(d).as_str()),
                ("CacheNote", cache_note(d).as_str()),
                ("InitArgs", init_args.as_str()),
            ])?,
            None => QUERY_DIRECT.render(&[
                ("RepoName", self.repo_name),
                ("QueryName", self.query_name),
                ("QuerySig", self.query_sig),
                ("HiddenQueryName", self.hidden_query_name),
                ("InitArgs", init_args.as_str()),
            ])?,
        };

        Ok(format!("{}\n{}", inner, outer))
    }
}

/// One `(key<i>, val<i>)` pair of a mutation's invalidation list.
pub struct InvalidateTemplate {
    pub arg_name: String,
    pub val_name: String,
    pub cache_duration: CacheDuration,
}

impl InvalidateTemplate {
    fn block(&self) -> String {
        format!(
            "if {k} != nil {{\n\
             if {v} != nil {{\n\
             if err := r.cache.Set(ctx, {k}.Key(), {v}, {ttl}); err != nil {{\n\
             return err\n\
             }}\n\
             }} else if err := r.cache.Invalidate(ctx, {k}.Key()); err != nil {{\n\
             return err\n\
             }}\n\
             }}\n",
            k = self.arg_name,
            v = self.val_name,
            ttl = go_duration(&self.cache_duration),
        )
    }
}

/// The per-mutation routing function.
pub struct MutationFuncTemplate<'a> {
    pub repo_name: &'a str,
    pub mutation_name: &'a str,
    pub mutation_sig: &'a str,
    pub sql_var_name: &'a str,
    pub invalidates: Vec<InvalidateTemplate>,
}

impl MutationFuncTemplate<'_> {
    pub fn generate(&self) -> NeedleResult<String> {
        let body = self
            .invalidates
            .iter()
            .map(|i| i.block())
            .collect::<String>();
        MUTATION.render(&[
            ("RepoName", self.repo_name),
            ("MutationName", self.mutation_name),
            ("MutationSig", self.mutation_sig),
            ("SQLVarName", self.sql_var_name),
            ("InvalidateBody", body.as_str()),
        ])
    }
}

/// The Load/Dump pair over the main table.
pub struct LoadDumpTemplate<'a> {
    pub repo_name: &'a str,
    pub main_struct_name: &'a str,
    pub select_all_var: &'a str,
    pub insert_row_var: &'a str,
}

impl LoadDumpTemplate<'_> {
    pub fn generate(&self) -> NeedleResult<String> {
        LOAD_DUMP.render(&[
            ("RepoName", self.repo_name),
            ("MainStructName", self.main_struct_name),
            ("SelectAllVar", self.select_all_var),
            ("InsertRowVar", self.insert_row_var),
        ])
    }
}

/// The whole module file.
pub struct RepoTemplate<'a> {
    pub needle_version: &'a str,
    pub schema_comment: &'a str,
    pub pkg_name: &'a str,
    pub metrics_prefix: &'a str,
    pub interface_name: &'a str,
    pub interface_signatures: &'a str,
    pub repo_name: &'a str,
    pub statements: &'a str,
    pub main_struct: &'a str,
    pub load_dump: &'a str,
    pub queries: &'a str,
    pub mutations: &'a str,
}

impl RepoTemplate<'_> {
    pub fn generate(&self) -> NeedleResult<String> {
        REPO.render(&[
            ("NeedleVersion", self.needle_version),
            ("SchemaComment", self.schema_comment),
            ("PkgName", self.pkg_name),
            ("MetricsPrefix", self.metrics_prefix),
            ("InterfaceName", self.interface_name),
            ("InterfaceSignatures", self.interface_signatures),
            ("RepoName", self.repo_name),
            ("Statements", self.statements),
            ("MainStruct", self.main_struct),
            ("LoadDump", self.load_dump),
            ("Queries", self.queries),
            ("Mutations", self.mutations),
        ])
    }
}
