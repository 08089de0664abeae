//! Compiler passes. A pass is a series of visitors applied over every
//! statement of the repo; visitor errors are merged inside the pass, so
//! callers only check the returned result. When a pass fails, later
//! passes are not run.

mod codegen;
mod normalize;

pub use codegen::CodegenPass;
pub use normalize::NormalizePass;

use crate::error::NeedleResult;
use crate::repo::Repo;

pub trait Pass {
    fn run(&mut self, repo: &mut Repo) -> NeedleResult<()>;
}
