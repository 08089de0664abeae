//! The normalize pass: star-elim, name-resolve and type-inference over
//! every query and mutation, in that order, aborting after the first
//! visitor whose walk accumulated errors.

use super::Pass;
use crate::error::NeedleResult;
use crate::repo::Repo;
use crate::visitors::{walk, NameResolveVisitor, StarElimVisitor, TypeInferenceVisitor};

pub struct NormalizePass;

impl Pass for NormalizePass {
    fn run(&mut self, repo: &mut Repo) -> NeedleResult<()> {
        let Repo {
            ref tables,
            ref mut queries,
            ref mut mutations,
            ..
        } = *repo;

        let trees = queries
            .iter_mut()
            .map(|q| &mut q.tree)
            .chain(mutations.iter_mut().map(|m| &mut m.tree));

        for tree in trees {
            let mut star_elim = StarElimVisitor::new(&tables[0]);
            walk(tree, &mut star_elim);
            star_elim.finish()?;

            let mut name_resolve = NameResolveVisitor::new(tables);
            walk(tree, &mut name_resolve);
            name_resolve.finish()?;

            let mut type_inference = TypeInferenceVisitor::new(tables);
            walk(tree, &mut type_inference);
            type_inference.finish()?;
        }
        Ok(())
    }
}
