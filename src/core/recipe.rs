//! YM-006: Recipes: generic templates and their specified instances.
//!
//! A recipe is loaded *generic* straight from the cookbook: only its alias
//! and target are evaluated, and a regex target is compiled. Calling
//! [`Recipe::for_target`] produces the *specified* recipe for one concrete
//! target: regex captures and implicit variables are bound, then
//! requirements, commands and the existence check are evaluated. A
//! specified recipe is terminal and specifying it again returns itself.

use super::error::{Error, Result};
use super::state;
use super::template::{Template, Vars};
use super::types::{ExistenceCheck, RawRecipe, Value, VarBlock};
use super::vars::{Tier, VarTiers};
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// One target specification.
#[derive(Debug, Clone)]
pub struct Recipe {
    /// Literal name (phony/alias), absolute path (file), or pattern (generic regex)
    pub target: String,
    pub phony: bool,
    pub regex: bool,
    pub echo: bool,
    pub allow_failures: bool,
    pub exists_only: bool,
    pub keep_ts: bool,
    pub recursive: bool,
    pub update: bool,
    /// Target this recipe redirects to
    pub alias: Option<String>,
    /// Evaluated requirements; empty while generic
    pub requires: Vec<String>,
    /// Evaluated commands; empty while generic
    pub commands: Vec<String>,
    pub existence_check: Option<ExistenceCheck>,
    /// Trailing CLI arguments, bound to `.extra`
    pub extra: Vec<String>,
    pattern: Option<Regex>,
    raw: Rc<RawRecipe>,
    base_dir: PathBuf,
    vars: VarTiers,
    specified: bool,
}

impl Recipe {
    /// Create a generic recipe from its cookbook entry.
    ///
    /// `base_vars` supplies the shared `global`, `env` and `arg` tiers.
    pub fn new(
        target: &str,
        raw: RawRecipe,
        base_dir: &Path,
        base_vars: &VarTiers,
    ) -> Result<Self> {
        let mut vars = shared_tiers(base_vars);
        let flat = vars.flatten(base_dir)?;
        let template = Template::new(&flat, base_dir);

        let alias = match raw.alias {
            Some(ref alias) => Some(template.evaluate_str(alias)?),
            None => None,
        };
        let evaluated = template.evaluate_str(target)?;
        let is_file = !raw.phony && alias.is_none();

        let (target, pattern) = if raw.regex {
            let pattern = if is_file && !evaluated.starts_with('/') {
                format!(
                    "{}/{}",
                    regex::escape(&base_dir.to_string_lossy()),
                    evaluated
                )
            } else {
                evaluated
            };
            let compiled = compile_full_match(&pattern)?;
            (pattern, Some(compiled))
        } else if is_file {
            (
                state::file_path(base_dir, &evaluated)
                    .to_string_lossy()
                    .into_owned(),
                None,
            )
        } else {
            (evaluated, None)
        };

        vars.set(Tier::Local, raw.vars.clone().into_block());

        Ok(Self {
            target,
            phony: raw.phony,
            regex: raw.regex,
            echo: raw.echo,
            allow_failures: raw.allow_failures,
            exists_only: raw.exists_only,
            keep_ts: raw.keep_ts,
            recursive: raw.recursive,
            update: raw.update,
            alias,
            requires: Vec::new(),
            commands: Vec::new(),
            existence_check: None,
            extra: Vec::new(),
            pattern,
            raw: Rc::new(raw),
            base_dir: base_dir.to_path_buf(),
            vars,
            specified: false,
        })
    }

    pub fn is_specified(&self) -> bool {
        self.specified
    }

    /// Full match of a candidate against a generic regex recipe.
    pub fn matches(&self, candidate: &str) -> bool {
        self.pattern
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(candidate))
    }

    /// Specify this recipe for one concrete target.
    ///
    /// Idempotent: a specified recipe returns itself.
    pub fn for_target(self: &Rc<Self>, target: &str, extra: &[String]) -> Result<Rc<Self>> {
        if self.specified {
            return Ok(Rc::clone(self));
        }
        Ok(Rc::new(self.specify(target, extra)?))
    }

    fn specify(&self, target: &str, extra: &[String]) -> Result<Self> {
        let base_dir = self.base_dir.as_path();
        let mut vars = shared_tiers(&self.vars);
        vars.share(Tier::Local, &self.vars);

        let target = if !self.phony && self.alias.is_none() {
            state::file_path(base_dir, target)
                .to_string_lossy()
                .into_owned()
        } else {
            target.to_string()
        };

        let mut captures = VarBlock::new();
        if let Some(ref pattern) = self.pattern {
            let caps = pattern.captures(&target).ok_or_else(|| Error::NoRecipe {
                target: target.clone(),
            })?;
            for name in pattern.capture_names().flatten() {
                let value = caps.name(name).map(|m| m.as_str()).unwrap_or_default();
                captures.insert(name.to_string(), Value::from(value));
            }
        }
        vars.set(Tier::Regex, captures);

        let mut implicit = VarBlock::new();
        implicit.insert(".target".to_string(), Value::from(target.as_str()));
        implicit.insert(".extra".to_string(), Value::from(extra.to_vec()));
        vars.set(Tier::Implicit, implicit.clone());

        let flat = vars.flatten(base_dir)?;
        let requires = evaluate_list(&flat, base_dir, &self.raw.requires)?;

        implicit.insert(".requirements".to_string(), Value::from(requires.clone()));
        vars.set(Tier::Implicit, implicit);
        let flat = vars.flatten(base_dir)?;
        let commands = evaluate_list(&flat, base_dir, &self.raw.commands)?;
        let existence_check = match self.raw.raw_existence_check() {
            Some(raw_check) => Some(ExistenceCheck::from_value(
                Template::new(&flat, base_dir).evaluate(&raw_check)?,
            )?),
            None => None,
        };

        tracing::debug!(target = %target, requires = ?requires, "specified recipe");

        Ok(Self {
            target,
            phony: self.phony,
            regex: self.regex,
            echo: self.echo,
            allow_failures: self.allow_failures,
            exists_only: self.exists_only,
            keep_ts: self.keep_ts,
            recursive: self.recursive,
            update: self.update,
            alias: self.alias.clone(),
            requires,
            commands,
            existence_check,
            extra: extra.to_vec(),
            pattern: None,
            raw: Rc::clone(&self.raw),
            base_dir: self.base_dir.clone(),
            vars,
            specified: true,
        })
    }
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.specified {
            write!(f, "Specified recipe for {}", self.target)
        } else {
            write!(f, "Generic recipe for {}", self.target)
        }
    }
}

fn shared_tiers(from: &VarTiers) -> VarTiers {
    let mut vars = VarTiers::new();
    for tier in [Tier::Global, Tier::Env, Tier::Arg] {
        vars.share(tier, from);
    }
    vars
}

fn compile_full_match(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{})$", pattern))
        .map_err(|e| Error::Config(format!("invalid target pattern `{}`: {}", pattern, e)))
}

fn evaluate_list(flat: &Vars, base_dir: &Path, raw: &[Value]) -> Result<Vec<String>> {
    let evaluated = Template::new(flat, base_dir).evaluate(&Value::List(raw.to_vec()))?;
    Ok(evaluated.into_string_list())
}
