//! End-to-end compilation tests: XML in, generated module out.

use needle_core::config::NeedleConfig;
use needle_core::{compile, NeedleError};

fn musics_xml(stmts: &str) -> String {
    format!(
        r#"
<needle>
  <schema name="Musics" mainObj="Music" hiddenFields="">
    <sql>CREATE TABLE musics (author VARCHAR(255) NOT NULL, name VARCHAR(255) NOT NULL, spotify_id BIGINT NOT NULL)</sql>
  </schema>
  <stmts>
{}
  </stmts>
</needle>"#,
        stmts
    )
}

fn compile_xml(xml: &str) -> Result<String, NeedleError> {
    compile(NeedleConfig::from_str_no_refs(xml)?)
}

#[test]
fn test_search_query_generates_typed_module() {
    let code = compile_xml(&musics_xml(
        r#"
    <query name="Search" type="many" cacheDuration="10s">
      <sql>SELECT * FROM musics WHERE name LIKE ?</sql>
    </query>
"#,
    ))
    .unwrap();

    // The argument struct is a single not-null string.
    assert!(code.contains("type SearchArgs struct {"), "{}", code);
    assert!(code.contains("\tName string\n"), "{}", code);

    // Star expanded: the emitted SQL lists the three columns explicitly.
    assert!(
        code.contains(
            "SearchStmt = `SELECT musics.author, musics.name, musics.spotify_id FROM musics WHERE musics.name LIKE ?`"
        ),
        "{}",
        code
    );
    assert!(!code.contains("SELECT *"), "{}", code);

    // The query routes through the cache and returns a Music list.
    assert!(
        code.contains(
            "func (r *musics) Search(ctx context.Context, args *SearchArgs, options ...Option) ([]Music, error) {"
        ),
        "{}",
        code
    );
    assert!(
        code.contains("r.cache.Get(ctx, args.Key(), &rst, time.Duration(10000000000)"),
        "{}",
        code
    );

    // Repo scaffolding.
    assert!(code.contains("type Musics interface {"), "{}", code);
    assert!(code.contains("func NewMusics(cache Cache, exec DBExecuter) Musics {"), "{}", code);
    assert!(code.contains("type Music struct {"), "{}", code);
    assert!(code.contains("Author string `json:\"author\"`"), "{}", code);
}

#[test]
fn test_insert_covering_star_columns_reuses_main_struct() {
    let code = compile_xml(&musics_xml(
        r#"
    <query name="Search" type="many" cacheDuration="10s">
      <sql>SELECT * FROM musics WHERE name LIKE ?</sql>
    </query>
    <mutation name="InsertMusic" invalidate="Search">
      <sql>INSERT INTO musics (author, name, spotify_id) VALUES (?, ?, ?)</sql>
    </mutation>
"#,
    ))
    .unwrap();

    // No synthetic argument struct: the mutation takes *Music.
    assert!(!code.contains("InsertMusicArgs"), "{}", code);
    assert!(
        code.contains(
            "func (r *musics) InsertMusic(ctx context.Context, args *Music, key0 *SearchArgs, val0 []Music, options ...Option) (sql.Result, error) {"
        ),
        "{}",
        code
    );
    assert!(code.contains("r.cache.Set(ctx, key0.Key(), val0, time.Duration(10000000000))"), "{}", code);
    assert!(code.contains("r.cache.Invalidate(ctx, key0.Key())"), "{}", code);
}

#[test]
fn test_in_list_parameter_becomes_list_field() {
    let code = compile_xml(&musics_xml(
        r#"
    <query name="ListByIds" type="many" cacheDuration="1s">
      <sql>SELECT * FROM musics WHERE spotify_id IN (?)</sql>
    </query>
"#,
    ))
    .unwrap();

    assert!(code.contains("type ListByIdsArgs struct {"), "{}", code);
    assert!(code.contains("SpotifyIdList []int64"), "{}", code);
    assert!(code.contains("IN (?)"), "{}", code);
    assert!(
        code.contains("inlens = append(inlens, len(r.SpotifyIdList))"),
        "{}",
        code
    );
}

#[test]
fn test_reordered_projection_forces_result_struct() {
    let covering = compile_xml(&musics_xml(
        r#"
    <query name="All" type="many" cacheDuration="5s">
      <sql>SELECT author, name, spotify_id FROM musics</sql>
    </query>
"#,
    ))
    .unwrap();
    assert!(!covering.contains("AllRst"), "{}", covering);
    assert!(covering.contains("([]Music, error)"), "{}", covering);

    let reordered = compile_xml(&musics_xml(
        r#"
    <query name="All" type="many" cacheDuration="5s">
      <sql>SELECT name, author, spotify_id FROM musics</sql>
    </query>
"#,
    ))
    .unwrap();
    assert!(reordered.contains("type AllRst struct {"), "{}", reordered);
    assert!(reordered.contains("([]AllRst, error)"), "{}", reordered);
}

#[test]
fn test_empty_args_query_materializes_args_inline() {
    let code = compile_xml(&musics_xml(
        r#"
    <query name="All" type="many" cacheDuration="forever">
      <sql>SELECT * FROM musics</sql>
    </query>
"#,
    ))
    .unwrap();

    assert!(
        code.contains("func (r *musics) All(ctx context.Context, options ...Option) ([]Music, error) {"),
        "{}",
        code
    );
    assert!(code.contains("args := &AllArgs{}"), "{}", code);
    // Forever is spelled as a zero TTL.
    assert!(code.contains("time.Duration(0)"), "{}", code);
    assert!(code.contains("return \"All\""), "{}", code);
}

#[test]
fn test_uncached_query_skips_cache() {
    let code = compile_xml(&musics_xml(
        r#"
    <query name="Search" type="many">
      <sql>SELECT * FROM musics WHERE name LIKE ?</sql>
    </query>
"#,
    ))
    .unwrap();
    assert!(code.contains("// Search - uncached query."), "{}", code);
    let cached_call = code.contains("r.cache.Get");
    assert!(!cached_call, "{}", code);
}

#[test]
fn test_single_row_query_returns_pointer() {
    let code = compile_xml(&musics_xml(
        r#"
    <query name="GetByName" type="single" cacheDuration="10s">
      <sql>SELECT * FROM musics WHERE name = ?</sql>
    </query>
"#,
    ))
    .unwrap();
    assert!(
        code.contains(
            "func (r *musics) GetByName(ctx context.Context, args *GetByNameArgs, options ...Option) (*Music, error) {"
        ),
        "{}",
        code
    );
    assert!(code.contains("return nil, sql.ErrNoRows"), "{}", code);
}

#[test]
fn test_join_conflict_qualifies_arg_fields() {
    let xml = r#"
<needle>
  <schema name="Pairs" mainObj="Pair" hiddenFields="">
    <sql>CREATE TABLE u (id BIGINT NOT NULL, name VARCHAR(64) NOT NULL)</sql>
    <ref src="ignored.xml"/>
  </schema>
  <stmts>
    <query name="Match" type="many" cacheDuration="1s">
      <sql>SELECT u.name FROM u JOIN h ON u.id = h.id WHERE u.id = ? AND h.id = ?</sql>
    </query>
  </stmts>
</needle>"#;
    // Resolve the reference by hand: from_str_no_refs leaves refs empty.
    let mut cfg = NeedleConfig::from_str_no_refs(xml).unwrap();
    cfg.schema.refs[0].sql =
        "CREATE TABLE h (id BIGINT NOT NULL, uid BIGINT NOT NULL)".to_string();
    let code = compile(cfg).unwrap();
    assert!(code.contains("UId int64"), "{}", code);
    assert!(code.contains("HId int64"), "{}", code);
}

#[test]
fn test_ambiguous_column_aborts_before_codegen() {
    let xml = r#"
<needle>
  <schema name="Pairs" mainObj="Pair" hiddenFields="">
    <sql>CREATE TABLE u (userid BIGINT NOT NULL, username VARCHAR(64) NOT NULL)</sql>
    <ref src="ignored.xml"/>
  </schema>
  <stmts>
    <query name="Match" type="many" cacheDuration="1s">
      <sql>SELECT username FROM u JOIN h ON u.userid = h.id</sql>
    </query>
  </stmts>
</needle>"#;
    let mut cfg = NeedleConfig::from_str_no_refs(xml).unwrap();
    cfg.schema.refs[0].sql =
        "CREATE TABLE h (id BIGINT NOT NULL, username VARCHAR(64) NOT NULL)".to_string();
    let err = compile(cfg).unwrap_err();
    let msg = err.to_string();
    assert!(
        msg.contains("ambiguous expression: username, multiple defs: [u h]"),
        "{}",
        msg
    );
    assert!(msg.contains("cannot find the column of (username)"), "{}", msg);
}

#[test]
fn test_left_join_output_is_nullable() {
    let xml = r#"
<needle>
  <schema name="Posts" mainObj="Post" hiddenFields="">
    <sql>CREATE TABLE u (id BIGINT NOT NULL, name VARCHAR(64) NOT NULL)</sql>
    <ref src="ignored.xml"/>
  </schema>
  <stmts>
    <query name="WithTitles" type="many" cacheDuration="1s">
      <sql>SELECT u.name, p.title FROM u LEFT JOIN p ON u.id = p.uid</sql>
    </query>
  </stmts>
</needle>"#;
    let mut cfg = NeedleConfig::from_str_no_refs(xml).unwrap();
    cfg.schema.refs[0].sql =
        "CREATE TABLE p (uid BIGINT NOT NULL, title VARCHAR(128) NOT NULL)".to_string();
    let code = compile(cfg).unwrap();
    // u.name keeps its schema nullability; p.title is forced nullable.
    assert!(code.contains("Name string"), "{}", code);
    assert!(code.contains("Title *string"), "{}", code);
}

#[test]
fn test_hidden_fields_excluded_from_star_and_struct() {
    let xml = r#"
<needle>
  <schema name="Musics" mainObj="Music" hiddenFields="spotify_id">
    <sql>CREATE TABLE musics (author VARCHAR(255) NOT NULL, name VARCHAR(255) NOT NULL, spotify_id BIGINT NOT NULL)</sql>
  </schema>
  <stmts>
    <query name="All" type="many" cacheDuration="1s">
      <sql>SELECT * FROM musics</sql>
    </query>
  </stmts>
</needle>"#;
    let code = compile_xml(xml).unwrap();
    assert!(!code.contains("SpotifyId"), "{}", code);
    assert!(
        code.contains("AllStmt = `SELECT musics.author, musics.name FROM musics`"),
        "{}",
        code
    );
}

#[test]
fn test_load_dump_uses_star_statements() {
    let code = compile_xml(&musics_xml(
        r#"
    <query name="All" type="many" cacheDuration="1s">
      <sql>SELECT * FROM musics</sql>
    </query>
"#,
    ))
    .unwrap();
    assert!(
        code.contains("loadDumpSelectAllStmt = `SELECT author, name, spotify_id FROM musics`"),
        "{}",
        code
    );
    assert!(
        code.contains(
            "loadDumpInsertRowStmt = `INSERT INTO musics (author, name, spotify_id) VALUES (?, ?, ?)`"
        ),
        "{}",
        code
    );
    assert!(code.contains("func (r *musics) Load(ctx context.Context, data []byte) error {"), "{}", code);
    assert!(
        code.contains("func (r *musics) Dump(ctx context.Context, processors ...func(*Music)) ([]byte, error) {"),
        "{}",
        code
    );
}

#[test]
fn test_create_table_stmt_constant_round_trips() {
    let code = compile_xml(&musics_xml(
        r#"
    <query name="All" type="many" cacheDuration="1s">
      <sql>SELECT * FROM musics</sql>
    </query>
"#,
    ))
    .unwrap();
    let start = code.find("CreateTableStmt = `").unwrap() + "CreateTableStmt = `".len();
    let end = code[start..].find('`').unwrap() + start;
    let schema_sql = &code[start..end];
    assert!(schema_sql.starts_with("CREATE TABLE IF NOT EXISTS musics ("));
    // Restored schema text parses back to the same canonical form.
    let reparsed = needle_core::parser::parse_one(schema_sql).unwrap();
    assert_eq!(reparsed.sql(), schema_sql);
}

#[test]
fn test_compilation_is_deterministic() {
    let xml = musics_xml(
        r#"
    <query name="Search" type="many" cacheDuration="10s">
      <sql>SELECT * FROM musics WHERE name LIKE ?</sql>
    </query>
    <mutation name="InsertMusic" invalidate="Search">
      <sql>INSERT INTO musics (author, name, spotify_id) VALUES (?, ?, ?)</sql>
    </mutation>
"#,
    );
    assert_eq!(compile_xml(&xml).unwrap(), compile_xml(&xml).unwrap());
}
