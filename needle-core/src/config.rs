//! Declarative configuration: the `<needle>` XML document.
//!
//! The loader reads the schema (main table SQL, hidden fields,
//! references), the ordered queries and the ordered mutations, validates
//! identifiers, types and cache durations, and resolves `<ref>` imports
//! exactly one level deep. The configuration is immutable afterwards.

use std::path::Path;
use std::time::Duration;

use tracing::warn;

use crate::error::{NeedleError, NeedleResult};
use crate::render::Template;

const CACHE_FOREVER: &str = "forever";

const RESERVED_IDENTIFIERS: &[&str] = &["Check"];

static INIT_TEMPLATE: Template =
    Template::new("init", include_str!("../templates/init.tmpl"));

/// How long a query result is cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDuration {
    Forever,
    Ttl(Duration),
}

impl CacheDuration {
    /// The TTL handed to the cache runtime; forever is spelled zero.
    pub fn ttl(&self) -> Duration {
        match self {
            CacheDuration::Forever => Duration::ZERO,
            CacheDuration::Ttl(d) => *d,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Single,
    Many,
}

/// A named SELECT statement.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    pub name: String,
    pub query_type: QueryType,
    pub cache_duration: Option<CacheDuration>,
    pub sql: String,
}

impl QueryConfig {
    pub fn is_single_row(&self) -> bool {
        self.query_type == QueryType::Single
    }
}

/// A named INSERT / UPDATE / DELETE statement with the cached queries it
/// invalidates.
#[derive(Debug, Clone)]
pub struct MutationConfig {
    pub name: String,
    pub invalidates: Vec<String>,
    pub sql: String,
}

/// The schema section: the main table, its hidden fields and the
/// referenced table schemas.
#[derive(Debug, Clone)]
pub struct SchemaConfig {
    pub name: String,
    pub main_obj: String,
    pub hidden_fields: Vec<String>,
    pub sql: String,
    pub refs: Vec<Reference>,
}

/// An imported schema. `sql` is filled from the referenced file's own
/// schema section.
#[derive(Debug, Clone)]
pub struct Reference {
    pub src: String,
    pub sql: String,
}

/// The root of a parsed configuration file.
#[derive(Debug, Clone)]
pub struct NeedleConfig {
    pub schema: SchemaConfig,
    pub queries: Vec<QueryConfig>,
    pub mutations: Vec<MutationConfig>,
}

impl NeedleConfig {
    pub fn from_file(path: impl AsRef<Path>) -> NeedleResult<NeedleConfig> {
        parse_file(path.as_ref(), true)
    }

    /// Parse without touching the filesystem; references are left
    /// unresolved. Used by tests.
    pub fn from_str_no_refs(text: &str) -> NeedleResult<NeedleConfig> {
        parse_document(text, Path::new("<memory>"), false)
    }

    pub fn query(&self, name: &str) -> Option<&QueryConfig> {
        self.queries.iter().find(|q| q.name == name)
    }
}

fn parse_file(path: &Path, resolve_refs: bool) -> NeedleResult<NeedleConfig> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| config_err(path, "load XML", &e.to_string()))?;
    parse_document(&text, path, resolve_refs)
}

fn parse_document(text: &str, path: &Path, resolve_refs: bool) -> NeedleResult<NeedleConfig> {
    let doc = roxmltree::Document::parse(text)
        .map_err(|e| config_err(path, "parse XML", &e.to_string()))?;
    let root = doc.root_element();
    if root.tag_name().name() != "needle" {
        return Err(config_err(path, "parse XML", "root element must be <needle>"));
    }

    let schema_node = root
        .children()
        .find(|n| n.has_tag_name("schema"))
        .ok_or_else(|| config_err(path, "parse XML", "missing <schema>"))?;

    let mut schema = SchemaConfig {
        name: schema_node.attribute("name").unwrap_or_default().to_string(),
        main_obj: schema_node
            .attribute("mainObj")
            .unwrap_or_default()
            .to_string(),
        hidden_fields: comma_split_list(schema_node.attribute("hiddenFields").unwrap_or_default()),
        sql: child_sql(&schema_node).unwrap_or_default(),
        refs: schema_node
            .children()
            .filter(|n| n.has_tag_name("ref"))
            .map(|n| Reference {
                src: n.attribute("src").unwrap_or_default().to_string(),
                sql: String::new(),
            })
            .collect(),
    };

    valid_name(&schema.name).map_err(|e| config_err(path, "validate schema names", &e))?;
    valid_name(&schema.main_obj).map_err(|e| config_err(path, "validate schema names", &e))?;
    if schema.name == schema.main_obj {
        return Err(config_err(
            path,
            "validate schema names",
            "mainObj name and schema name cannot be the same",
        ));
    }

    // Import referenced schemas, exactly one level deep.
    if resolve_refs {
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        for r in &mut schema.refs {
            let src = dir.join(&r.src);
            let imported = parse_file(&src, false).map_err(|e| {
                config_err(
                    path,
                    &format!("import referenced schema: {}", src.display()),
                    &e.to_string(),
                )
            })?;
            r.sql = imported.schema.sql;
        }
    }

    let mut queries = Vec::new();
    let mut mutations = Vec::new();
    if let Some(stmts) = root.children().find(|n| n.has_tag_name("stmts")) {
        for (i, node) in stmts.children().filter(|n| n.is_element()).enumerate() {
            match node.tag_name().name() {
                "query" => {
                    let q = parse_query(&node)
                        .map_err(|e| config_err(path, &format!("validate {}-th stmt", i), &e))?;
                    queries.push(q);
                }
                "mutation" => {
                    let m = parse_mutation(&node)
                        .map_err(|e| config_err(path, &format!("validate {}-th stmt", i), &e))?;
                    mutations.push(m);
                }
                other => {
                    return Err(config_err(
                        path,
                        "parse XML",
                        &format!("unexpected element <{}> in <stmts>", other),
                    ))
                }
            }
        }
    }

    let config = NeedleConfig {
        schema,
        queries,
        mutations,
    };
    validate_stmts(&config, path)?;
    Ok(config)
}

fn parse_query(node: &roxmltree::Node) -> Result<QueryConfig, String> {
    let name = node.attribute("name").unwrap_or_default().to_string();
    valid_name(&name).map_err(|e| format!("invalid query name: {}, because {}", name, e))?;
    let query_type = match node.attribute("type").unwrap_or_default() {
        "single" => QueryType::Single,
        "many" => QueryType::Many,
        _ => return Err(format!("query type illegal: {}", name)),
    };
    let cache_duration = parse_cache_duration(node.attribute("cacheDuration").unwrap_or_default())?;
    if cache_duration.is_none() {
        warn!("query {} is not cached", name);
    }
    let sql = child_sql(node).ok_or_else(|| format!("query {} has no <sql>", name))?;
    Ok(QueryConfig {
        name,
        query_type,
        cache_duration,
        sql,
    })
}

fn parse_mutation(node: &roxmltree::Node) -> Result<MutationConfig, String> {
    let name = node.attribute("name").unwrap_or_default().to_string();
    valid_name(&name).map_err(|e| format!("invalid mutation name: {}, because {}", name, e))?;
    let invalidates = comma_split_list(node.attribute("invalidate").unwrap_or_default());
    let sql = child_sql(node).ok_or_else(|| format!("mutation {} has no <sql>", name))?;
    Ok(MutationConfig {
        name,
        invalidates,
        sql,
    })
}

fn validate_stmts(config: &NeedleConfig, path: &Path) -> NeedleResult<()> {
    let mut names = std::collections::HashSet::new();
    for q in &config.queries {
        if !names.insert(q.name.clone()) {
            return Err(config_err(
                path,
                "validate queries",
                &format!("duplicated query name: {}", q.name),
            ));
        }
    }
    for m in &config.mutations {
        if !names.insert(m.name.clone()) {
            return Err(config_err(
                path,
                "validate mutations",
                &format!("mutation name conflicts: {}", m.name),
            ));
        }
        for target in &m.invalidates {
            match config.query(target) {
                None => {
                    let mut msg = format!("failed to find the query {}", target);
                    if let Some(hint) = closest(target, config.queries.iter().map(|q| &q.name)) {
                        msg.push_str(&format!(", did you mean {}?", hint));
                    }
                    return Err(config_err(
                        path,
                        &format!("validate mutation {}", m.name),
                        &msg,
                    ));
                }
                Some(q) if q.cache_duration.is_none() => {
                    return Err(config_err(
                        path,
                        &format!("validate mutation {}", m.name),
                        &format!("query {} in invalidate list is not cached", target),
                    ));
                }
                Some(_) => {}
            }
        }
    }
    Ok(())
}

fn closest<'a>(target: &str, candidates: impl Iterator<Item = &'a String>) -> Option<String> {
    candidates
        .map(|c| (strsim::levenshtein(target, c), c))
        .filter(|(d, _)| *d <= 2)
        .min_by_key(|(d, _)| *d)
        .map(|(_, c)| c.clone())
}

fn child_sql(node: &roxmltree::Node) -> Option<String> {
    node.children()
        .find(|n| n.has_tag_name("sql"))
        .and_then(|n| n.text())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn comma_split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(|p| p.to_string())
        .collect()
}

/// `cacheDuration` is absent (uncached), the literal `forever`, or a
/// positive duration literal.
fn parse_cache_duration(s: &str) -> Result<Option<CacheDuration>, String> {
    if s.is_empty() {
        return Ok(None);
    }
    if s == CACHE_FOREVER {
        return Ok(Some(CacheDuration::Forever));
    }
    let d = humantime::parse_duration(s).map_err(|e| format!("invalid cacheDuration {}: {}", s, e))?;
    if d.is_zero() {
        return Err(format!("cache-duration <= 0s is invalid: {}", s));
    }
    Ok(Some(CacheDuration::Ttl(d)))
}

/// User identifiers must be at least two characters, start with an
/// uppercase letter and stay off the reserved list.
fn valid_name(s: &str) -> Result<(), String> {
    if s.chars().count() < 2 {
        return Err(format!(
            "invalid identifier, length must be >= 2, but {:?} is not",
            s
        ));
    }
    if RESERVED_IDENTIFIERS.contains(&s) {
        return Err(format!("{} is a reserved identifier", s));
    }
    if !s.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
        return Err(format!(
            "invalid identifier, name must start with an upper-cased letter, but {} is not",
            s
        ));
    }
    Ok(())
}

fn config_err(path: &Path, section: &str, detail: &str) -> NeedleError {
    NeedleError::InvalidConfig(format!(
        "compiling {}, {}, error found: {}",
        path.display(),
        section,
        detail
    ))
}

/// Render the starter XML for `-t <Name>`: object type `<Name>`, table
/// `<Name>s`.
pub fn gen_template(obj_name: &str) -> NeedleResult<String> {
    valid_name(obj_name).map_err(NeedleError::InvalidConfig)?;
    let table_name = format!("{}s", obj_name);
    let sql_table_name = table_name.to_lowercase();
    INIT_TEMPLATE.render(&[
        ("TableName", table_name.as_str()),
        ("ObjName", obj_name),
        ("SQLTableName", sql_table_name.as_str()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    const MUSICS_XML: &str = r#"
<needle>
  <schema name="Musics" mainObj="Music" hiddenFields="">
    <sql>CREATE TABLE musics (author VARCHAR(255) NOT NULL, name VARCHAR(255) NOT NULL, spotify_id BIGINT NOT NULL)</sql>
  </schema>
  <stmts>
    <query name="Search" type="many" cacheDuration="10s">
      <sql>SELECT * FROM musics WHERE name LIKE ?</sql>
    </query>
    <mutation name="InsertMusic" invalidate="Search">
      <sql>INSERT INTO musics (author, name, spotify_id) VALUES (?, ?, ?)</sql>
    </mutation>
  </stmts>
</needle>"#;

    #[test]
    fn test_parse_musics_config() {
        let cfg = NeedleConfig::from_str_no_refs(MUSICS_XML).unwrap();
        assert_eq!(cfg.schema.name, "Musics");
        assert_eq!(cfg.schema.main_obj, "Music");
        assert!(cfg.schema.hidden_fields.is_empty());
        assert_eq!(cfg.queries.len(), 1);
        assert_eq!(cfg.queries[0].query_type, QueryType::Many);
        assert_eq!(
            cfg.queries[0].cache_duration,
            Some(CacheDuration::Ttl(Duration::from_secs(10)))
        );
        assert_eq!(cfg.mutations.len(), 1);
        assert_eq!(cfg.mutations[0].invalidates, ["Search"]);
    }

    #[test]
    fn test_identifier_rules() {
        assert!(valid_name("").is_err());
        assert!(valid_name("A").is_err());
        assert!(valid_name("abc").is_err());
        assert!(valid_name("Check").is_err());
        assert!(valid_name("Ab").is_ok());
        assert!(valid_name("Orders").is_ok());
    }

    #[test]
    fn test_cache_duration_rules() {
        assert_eq!(parse_cache_duration("").unwrap(), None);
        assert_eq!(
            parse_cache_duration("forever").unwrap(),
            Some(CacheDuration::Forever)
        );
        assert_eq!(
            parse_cache_duration("1s").unwrap(),
            Some(CacheDuration::Ttl(Duration::from_secs(1)))
        );
        assert_eq!(
            parse_cache_duration("500ms").unwrap(),
            Some(CacheDuration::Ttl(Duration::from_millis(500)))
        );
        assert!(parse_cache_duration("0s").is_err());
        assert!(parse_cache_duration("-1s").is_err());
    }

    #[test]
    fn test_invalidate_must_name_cached_query() {
        let uncached = MUSICS_XML.replace(r#" cacheDuration="10s""#, "");
        let err = NeedleConfig::from_str_no_refs(&uncached).unwrap_err();
        assert!(err.to_string().contains("is not cached"), "{}", err);

        let typo = MUSICS_XML.replace(r#"invalidate="Search""#, r#"invalidate="Searhc""#);
        let err = NeedleConfig::from_str_no_refs(&typo).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("failed to find the query Searhc"), "{}", msg);
        assert!(msg.contains("did you mean Search?"), "{}", msg);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let dup = MUSICS_XML.replace(r#"name="InsertMusic""#, r#"name="Search""#);
        let err = NeedleConfig::from_str_no_refs(&dup).unwrap_err();
        assert!(err.to_string().contains("mutation name conflicts"), "{}", err);
    }

    #[test]
    fn test_schema_name_not_main_obj() {
        let bad = MUSICS_XML.replace(r#"mainObj="Music""#, r#"mainObj="Musics""#);
        assert!(NeedleConfig::from_str_no_refs(&bad).is_err());
    }

    #[test]
    fn test_gen_template() {
        let xml = gen_template("Order").unwrap();
        assert!(xml.contains(r#"<schema name="Orders" mainObj="Order""#));
        assert!(xml.contains("CREATE TABLE orders ("));
        // The starter must itself be a loadable configuration.
        let cfg = NeedleConfig::from_str_no_refs(&xml).unwrap();
        assert_eq!(cfg.schema.main_obj, "Order");
        assert!(gen_template("x").is_err());
    }
}
