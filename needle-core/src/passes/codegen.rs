//! The codegen pass: extract sockets from normalized ASTs, synthesize
//! argument and result structs, render the function bodies and assemble
//! the module file.

use std::collections::HashMap;

use super::Pass;
use crate::codegen::gofmt::format_go_code;
use crate::codegen::templates::{
    InvalidateTemplate, LoadDumpTemplate, MutationFuncTemplate, QueryFuncTemplate, RepoTemplate,
};
use crate::codegen::{
    go_name, GoField, GoStruct, GoType, MutationFunc, QueryFunc, SqlStatementDecl,
};
use crate::error::{NeedleError, NeedleResult};
use crate::repo::{Mutation, Query, Repo};
use crate::schema::TableInfo;
use crate::visitors::{walk, GoParam, GoVar, OutputExtractVisitor, ParamExtractVisitor};

const SELECT_ALL_VAR: &str = "loadDumpSelectAllStmt";
const INSERT_ROW_VAR: &str = "loadDumpInsertRowStmt";

/// The ordered (parameter, output) socket of one query.
pub struct QuerySocket {
    pub params: Vec<GoParam>,
    pub output: Vec<GoVar>,
}

/// The ordered parameter socket of one mutation.
pub struct MutationSocket {
    pub params: Vec<GoParam>,
}

/// Runs last; leaves the rendered module in `code`.
#[derive(Default)]
pub struct CodegenPass {
    pub code: String,
}

impl CodegenPass {
    pub fn gen_query_sockets(queries: &mut [Query]) -> NeedleResult<Vec<QuerySocket>> {
        let mut sockets = Vec::new();
        for q in queries {
            let mut params = ParamExtractVisitor::new();
            walk(&mut q.tree, &mut params);
            let params = params.finish()?;

            let mut output = OutputExtractVisitor::new();
            walk(&mut q.tree, &mut output);
            let output = output.finish()?;

            sockets.push(QuerySocket { params, output });
        }
        Ok(sockets)
    }

    pub fn gen_mutation_sockets(mutations: &mut [Mutation]) -> NeedleResult<Vec<MutationSocket>> {
        let mut sockets = Vec::new();
        for m in mutations {
            let mut params = ParamExtractVisitor::new();
            walk(&mut m.tree, &mut params);
            sockets.push(MutationSocket {
                params: params.finish()?,
            });
        }
        Ok(sockets)
    }
}

impl Pass for CodegenPass {
    fn run(&mut self, repo: &mut Repo) -> NeedleResult<()> {
        let query_sockets = Self::gen_query_sockets(&mut repo.queries)?;
        let mutation_sockets = Self::gen_mutation_sockets(&mut repo.mutations)?;

        let main_table = &repo.tables[0];
        let main_struct = gen_main_struct(main_table, &repo.schema.main_obj);

        // Per-query functions.
        let mut query_funcs = Vec::new();
        for (q, socket) in repo.queries.iter().zip(query_sockets.iter()) {
            let name = q.config.name.clone();
            let (output, output_is_main) = if can_star_cover_output(main_table, &socket.output) {
                (main_struct.clone(), true)
            } else {
                (gen_output_struct(&format!("{}Rst", name), &socket.output), false)
            };
            // Arguments cannot be null: MySQL wants `IS NULL`, never
            // `= NULL`.
            let input = gen_input_struct(&format!("{}Args", name), &socket.params);
            query_funcs.push(QueryFunc {
                name,
                sql: q.tree.sql(),
                cache_duration: q.config.cache_duration,
                input,
                output,
                output_is_main,
                is_list: !q.config.is_single_row(),
            });
        }

        // Per-mutation functions.
        let mut mutation_funcs = Vec::new();
        for (m, socket) in repo.mutations.iter().zip(mutation_sockets.iter()) {
            let name = m.config.name.clone();
            let (input, input_is_main) = if can_star_cover_input(main_table, &socket.params) {
                (main_struct.clone(), true)
            } else {
                (gen_input_struct(&format!("{}Args", name), &socket.params), false)
            };
            mutation_funcs.push(MutationFunc {
                name,
                sql: m.tree.sql(),
                input,
                input_is_main,
                invalidates: m.invalidates.clone(),
            });
        }

        let main_name = &repo.schema.name;
        let pkg_name = format!("{}repo", main_name.to_lowercase());
        let interface_name = main_name.clone();
        let repo_name = lower_first(main_name);

        let mut signatures = Vec::new();
        for q in &query_funcs {
            signatures.push(format!("{}{}", q.name, q.signature()));
        }
        for m in &mutation_funcs {
            signatures.push(format!("{}{}", m.name, m.signature(&query_funcs)));
        }
        signatures.push("Load(ctx context.Context, data []byte) error".to_string());
        signatures.push(format!(
            "Dump(ctx context.Context, processors ...func(*{})) ([]byte, error)",
            main_struct.name
        ));

        let mut stmt_decls = vec![SqlStatementDecl {
            var_name: "CreateTableStmt".into(),
            sql: main_table.sql(),
        }];

        // Per-query code blocks.
        let mut queries_code = Vec::new();
        for q in &query_funcs {
            let mut block = String::new();
            block.push_str(&q.input.decl());
            block.push('\n');
            block.push_str(&q.input.key_func(&q.name));
            block.push('\n');
            block.push_str(&q.input.arglist_func());
            block.push('\n');
            if !q.output_is_main {
                block.push_str(&q.output.decl());
                block.push('\n');
                block.push_str(&q.output.scan_func());
                block.push('\n');
            }
            let sql_var_name = format!("{}Stmt", q.name);
            let query_sig = q.signature();
            let hidden_query_name = lower_first(&q.name);
            let return_type = q.return_type();
            let tmpl = QueryFuncTemplate {
                repo_name: &repo_name,
                query_name: &q.name,
                query_sig: &query_sig,
                hidden_query_name: &hidden_query_name,
                arg_type: &q.input.name,
                rst_type: &q.output.name,
                return_type: &return_type,
                cache_duration: q.cache_duration,
                sql_var_name: &sql_var_name,
                is_list: q.is_list,
                init_args_type: if q.input.is_empty() {
                    q.input.name.as_str()
                } else {
                    ""
                },
            };
            block.push_str(&tmpl.generate()?);
            stmt_decls.push(SqlStatementDecl {
                var_name: sql_var_name,
                sql: q.sql.clone(),
            });
            queries_code.push(block);
        }

        // Per-mutation code blocks.
        let mut mutations_code = Vec::new();
        for m in &mutation_funcs {
            let mut block = String::new();
            if !m.input_is_main {
                block.push_str(&m.input.decl());
                block.push('\n');
                block.push_str(&m.input.arglist_func());
                block.push('\n');
            }
            let mut invalidates = Vec::new();
            for (i, qidx) in m.invalidates.iter().enumerate() {
                let target = &query_funcs[*qidx];
                let cache_duration = target.cache_duration.ok_or_else(|| {
                    NeedleError::Compiler(format!(
                        "invalidate target {} is not cached",
                        target.name
                    ))
                })?;
                invalidates.push(InvalidateTemplate {
                    arg_name: format!("key{}", i),
                    val_name: format!("val{}", i),
                    cache_duration,
                });
            }
            let sql_var_name = format!("{}Stmt", m.name);
            let mutation_sig = m.signature(&query_funcs);
            let tmpl = MutationFuncTemplate {
                repo_name: &repo_name,
                mutation_name: &m.name,
                mutation_sig: &mutation_sig,
                sql_var_name: &sql_var_name,
                invalidates,
            };
            block.push_str(&tmpl.generate()?);
            stmt_decls.push(SqlStatementDecl {
                var_name: sql_var_name,
                sql: m.sql.clone(),
            });
            mutations_code.push(block);
        }

        // Load/Dump statements over the main table's star columns.
        let star_names: Vec<String> = main_table
            .star_columns()
            .into_iter()
            .map(|c| c.name)
            .collect();
        stmt_decls.push(SqlStatementDecl {
            var_name: SELECT_ALL_VAR.into(),
            sql: format!("SELECT {} FROM {}", star_names.join(", "), main_table.name()),
        });
        stmt_decls.push(SqlStatementDecl {
            var_name: INSERT_ROW_VAR.into(),
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({})",
                main_table.name(),
                star_names.join(", "),
                vec!["?"; star_names.len()].join(", ")
            ),
        });

        let load_dump = LoadDumpTemplate {
            repo_name: &repo_name,
            main_struct_name: &main_struct.name,
            select_all_var: SELECT_ALL_VAR,
            insert_row_var: INSERT_ROW_VAR,
        }
        .generate()?;

        let main_struct_code = format!(
            "{}\n// nolint: unused\n{}\n// nolint: unused\n{}",
            main_struct.decl(),
            main_struct.scan_func(),
            main_struct.arglist_func()
        );

        let schema_comment = main_table
            .sql()
            .lines()
            .map(|l| format!("// {}", l))
            .collect::<Vec<_>>()
            .join("\n");

        let code = RepoTemplate {
            needle_version: env!("CARGO_PKG_VERSION"),
            schema_comment: &schema_comment,
            pkg_name: &pkg_name,
            metrics_prefix: &pkg_name,
            interface_name: &interface_name,
            interface_signatures: &signatures.join("\n"),
            repo_name: &repo_name,
            statements: &stmt_decls
                .iter()
                .map(|d| d.decl())
                .collect::<Vec<_>>()
                .join("\n"),
            main_struct: &main_struct_code,
            load_dump: &load_dump,
            queries: &queries_code.join("\n"),
            mutations: &mutations_code.join("\n"),
        }
        .generate()?;

        self.code = format_go_code(&code)?;
        Ok(())
    }
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn json_tag(name: &str) -> String {
    format!("`json:\"{}\"`", name)
}

/// The main row struct: one field per star column, in order.
pub fn gen_main_struct(table: &TableInfo, name: &str) -> GoStruct {
    let mut s = GoStruct::new(name);
    s.comment = "the main struct.".into();
    for col in table.star_columns() {
        // Validated at schema construction; unmapped columns never get
        // this far.
        let Some(t) = col.go_type() else { continue };
        s.fields
            .push(GoField::new(&col.name, GoType::new(t, false), json_tag(&col.name)));
    }
    s
}

/// An argument struct from an ordered parameter list. Naming rules, in
/// order: title-cased base name; qualified with the table on conflict;
/// counter-suffixed when still shared; `List` appended for in-list
/// parameters.
pub fn gen_input_struct(name: &str, params: &[GoParam]) -> GoStruct {
    let mut s = GoStruct::new(name);

    let bases: Vec<String> = params.iter().map(|p| go_name(&p.name)).collect();
    let mut base_count: HashMap<&str, usize> = HashMap::new();
    for b in &bases {
        *base_count.entry(b).or_default() += 1;
    }
    let quals: Vec<String> = params
        .iter()
        .map(|p| format!("{}{}", go_name(&p.table_name), go_name(&p.name)))
        .collect();
    let mut qual_count: HashMap<&str, usize> = HashMap::new();
    for q in &quals {
        *qual_count.entry(q).or_default() += 1;
    }

    let mut used: HashMap<String, usize> = HashMap::new();
    for (i, p) in params.iter().enumerate() {
        let mut nm = bases[i].clone();
        if base_count[bases[i].as_str()] > 1 {
            if qual_count[quals[i].as_str()] > 1 {
                let c = used.entry(quals[i].clone()).or_default();
                nm = format!("{}{}", quals[i], c);
                *c += 1;
            } else {
                nm = quals[i].clone();
            }
        }
        if p.in_pattern {
            nm.push_str("List");
        }
        s.fields.push(GoField::new(
            &nm,
            GoType::new(p.go_type, p.in_pattern),
            String::new(),
        ));
    }
    s
}

/// A result struct from an ordered output list, qualified with the table
/// name on conflict.
pub fn gen_output_struct(name: &str, output: &[GoVar]) -> GoStruct {
    let mut s = GoStruct::new(name);

    let mut name_count: HashMap<&str, usize> = HashMap::new();
    for v in output {
        *name_count.entry(v.name.as_str()).or_default() += 1;
    }

    let mut used: HashMap<String, usize> = HashMap::new();
    for v in output {
        let mut nm = go_name(&v.name);
        if name_count[v.name.as_str()] > 1 {
            nm = format!("{}{}", go_name(&v.table_name), nm);
        }
        let seen = used.entry(nm.clone()).or_insert(0);
        let count = *seen;
        *seen += 1;
        if count > 0 {
            nm = format!("{}{}", nm, count);
        }
        s.fields.push(GoField::new(
            &nm,
            GoType::new(v.go_type, false),
            json_tag(&v.name),
        ));
    }
    s
}

/// True when the query's projection is exactly the main table's star
/// columns, in order.
pub fn can_star_cover_output(table: &TableInfo, output: &[GoVar]) -> bool {
    let star = table.star_columns();
    if star.len() != output.len() {
        return false;
    }
    let table_name = table.name();
    star.iter()
        .zip(output.iter())
        .all(|(c, v)| c.name == v.name && v.table_name == table_name)
}

/// True when the mutation's parameters are exactly the main table's star
/// columns, in order.
pub fn can_star_cover_input(table: &TableInfo, params: &[GoParam]) -> bool {
    let star = table.star_columns();
    if star.len() != params.len() {
        return false;
    }
    let table_name = table.name();
    star.iter()
        .zip(params.iter())
        .all(|(c, p)| c.name == p.name && p.table_name == table_name)
}
