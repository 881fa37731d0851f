//! YM-009: Staleness evaluation: decide which nodes need building.
//!
//! Runs once over the linearized graph, requirements first, so every
//! node sees its requirements' final `(should_build, timestamp)`.

use super::dag::{Dag, Node, NodeId};
use super::error::{Error, Result};
use super::recipe::Recipe;
use super::state;
use super::types::ExistenceCheck;
use crate::transport::CommandRunner;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Inputs of the staleness decision besides the graph itself.
pub struct Staleness<'a> {
    pub base_dir: &'a Path,
    /// Rebuild everything
    pub force: bool,
    /// Existence checks pass without running
    pub dry_run: bool,
    /// Phony targets assumed up to date
    pub assume: &'a HashSet<String>,
    pub shell: &'a str,
    pub runner: &'a dyn CommandRunner,
}

impl Staleness<'_> {
    /// Set `should_build` and `timestamp` on every node in order.
    pub fn mark_unchanged(&self, dag: &mut Dag) -> Result<()> {
        let order: Vec<NodeId> = dag.iter().collect();
        for id in order {
            let (should_build, timestamp) = self.should_build(dag, id)?;
            let node = &mut dag[id];
            node.should_build = should_build;
            node.timestamp = timestamp;
        }
        Ok(())
    }

    /// `(should_build, timestamp)` of one node, given its requirements
    /// are already evaluated.
    pub fn should_build(&self, dag: &Dag, id: NodeId) -> Result<(bool, f64)> {
        let node = &dag[id];
        let path = self.path(node);
        let Some(ref recipe) = node.recipe else {
            return Ok((false, state::mtime(&path)?));
        };
        if self.force {
            return Ok((true, f64::INFINITY));
        }
        if recipe.phony && self.assume.contains(&recipe.target) {
            return Ok((false, f64::INFINITY));
        }
        if !self.path_exists(recipe, &path)? {
            return Ok((true, f64::INFINITY));
        }
        if recipe.existence_check.is_some() {
            update_timestamp(self.base_dir, recipe)?;
            return Ok((false, f64::INFINITY));
        }

        let mtime = if !recipe.phony && recipe.recursive {
            state::recursive_mtime(&path)?
        } else {
            state::mtime(&path)?
        };

        if recipe.exists_only {
            return Ok((false, mtime));
        }
        if node.requires.is_empty() {
            return Err(Error::Config(
                "This target already exists and has no requirements. \
                 Consider marking it with exists_only"
                    .to_string(),
            ));
        }
        if node.requires.iter().any(|&req| dag[req].should_build) {
            return Ok((true, mtime));
        }

        let latest = node
            .requires
            .iter()
            .map(|&req| dag[req].timestamp)
            .fold(f64::NEG_INFINITY, f64::max);
        Ok((latest > mtime, mtime))
    }

    /// Marker path for phony targets, the file itself otherwise.
    pub fn path(&self, node: &Node) -> PathBuf {
        match node.recipe {
            Some(ref recipe) if recipe.phony => state::phony_path(self.base_dir, &node.target),
            _ => state::file_path(self.base_dir, &node.target),
        }
    }

    fn path_exists(&self, recipe: &Recipe, path: &Path) -> Result<bool> {
        let Some(ref check) = recipe.existence_check else {
            return Ok(path.exists());
        };
        if !recipe.phony {
            return Err(Error::Config(
                "Existence commands need to be phony".to_string(),
            ));
        }
        if !recipe.exists_only {
            return Err(Error::Config(
                "Existence commands need exists_only".to_string(),
            ));
        }
        self.check_existence(check)
    }

    /// Run an existence check and compare its output to expectations.
    pub fn check_existence(&self, check: &ExistenceCheck) -> Result<bool> {
        if self.dry_run {
            return Ok(true);
        }
        let output = self.runner.check(&check.command, self.base_dir, self.shell)?;
        tracing::debug!(
            command = %check.command,
            exit_code = output.exit_code,
            "existence check"
        );
        if check.stdout.as_ref().is_some_and(|want| *want != output.stdout) {
            return Ok(false);
        }
        if check.stderr.as_ref().is_some_and(|want| *want != output.stderr) {
            return Ok(false);
        }
        Ok(output.exit_code == check.returncode)
    }
}

/// Refresh the timestamp a recipe keeps after running: the phony marker
/// with `keep_ts`, the target file itself with `update`.
pub fn update_timestamp(base_dir: &Path, recipe: &Recipe) -> Result<()> {
    if recipe.phony && recipe.keep_ts {
        state::touch_phony(base_dir, &recipe.target)?;
    }
    if !recipe.phony && recipe.update {
        state::touch(Path::new(&recipe.target))?;
    }
    Ok(())
}
