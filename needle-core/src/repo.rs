//! The repo: parsed tables plus one statement wrapper per declared
//! query and mutation, with invalidation links resolved.

use crate::ast::SyntaxTree;
use crate::config::{MutationConfig, NeedleConfig, QueryConfig, SchemaConfig};
use crate::error::{NeedleError, NeedleResult};
use crate::parser::parse_one;
use crate::schema::TableInfo;

/// A declared query and its AST.
#[derive(Debug)]
pub struct Query {
    pub config: QueryConfig,
    pub tree: SyntaxTree,
}

/// A declared mutation, its AST, and the indices of the queries it
/// invalidates.
#[derive(Debug)]
pub struct Mutation {
    pub config: MutationConfig,
    pub tree: SyntaxTree,
    pub invalidates: Vec<usize>,
}

/// The root structure handed from the builder to the passes. The first
/// table is the main table.
#[derive(Debug)]
pub struct Repo {
    pub schema: SchemaConfig,
    pub tables: Vec<TableInfo>,
    pub queries: Vec<Query>,
    pub mutations: Vec<Mutation>,
}

impl Repo {
    pub fn from_config(config: NeedleConfig) -> NeedleResult<Repo> {
        let mut tables = Vec::new();
        tables.push(table_from_sql(
            &config.schema.sql,
            config.schema.hidden_fields.clone(),
        )?);
        for r in &config.schema.refs {
            tables.push(table_from_sql(&r.sql, Vec::new())?);
        }

        let mut queries = Vec::new();
        for q in &config.queries {
            let tree = parse_one(&q.sql)?;
            queries.push(Query {
                config: q.clone(),
                tree,
            });
        }

        let mut mutations = Vec::new();
        for m in &config.mutations {
            let tree = parse_one(&m.sql)?;
            let mut invalidates = Vec::new();
            for name in &m.invalidates {
                let idx = queries
                    .iter()
                    .position(|q| &q.config.name == name)
                    .ok_or_else(|| {
                        NeedleError::InvalidConfig(format!("query name not exist: {}", name))
                    })?;
                invalidates.push(idx);
            }
            mutations.push(Mutation {
                config: m.clone(),
                tree,
                invalidates,
            });
        }

        Ok(Repo {
            schema: config.schema,
            tables,
            queries,
            mutations,
        })
    }

    pub fn main_table(&self) -> &TableInfo {
        &self.tables[0]
    }
}

fn table_from_sql(sql: &str, hidden_fields: Vec<String>) -> NeedleResult<TableInfo> {
    let tree = parse_one(sql)?;
    TableInfo::new(tree, hidden_fields)
}
