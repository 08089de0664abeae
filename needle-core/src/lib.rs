//! Compiler core for needle.
//!
//! needle reads a declarative XML spec of a SQL-backed repository and
//! emits a typed data-access module with integrated result caching and
//! cache invalidation. The pipeline: configuration, SQL parsing through
//! the adapter, the normalize pass (star-elim, name-resolve,
//! type-inference), then codegen over the extracted sockets.
//!
//! ```ignore
//! let config = needle_core::config::NeedleConfig::from_file("musics.xml")?;
//! let code = needle_core::compile(config)?;
//! ```

pub mod ast;
pub mod codegen;
pub mod config;
pub mod error;
pub mod parser;
pub mod passes;
pub mod render;
pub mod repo;
pub mod schema;
pub mod types;
pub mod visitors;

pub use error::{NeedleError, NeedleResult};

use passes::{CodegenPass, NormalizePass, Pass};

/// Compile a loaded configuration into the generated module text.
pub fn compile(config: config::NeedleConfig) -> NeedleResult<String> {
    let mut repo = repo::Repo::from_config(config)?;
    NormalizePass.run(&mut repo)?;
    let mut backend = CodegenPass::default();
    backend.run(&mut repo)?;
    Ok(backend.code)
}

/// Compile an input file into the generated module text.
pub fn compile_file(path: impl AsRef<std::path::Path>) -> NeedleResult<String> {
    let config = config::NeedleConfig::from_file(path)?;
    compile(config)
}
