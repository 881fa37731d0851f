//! YM-012: Build driver: resolve the target, expand the graph, run commands.
//!
//! load cookbook → index recipes → expand DAG → linearize → mark stale →
//! for each stale node: run commands (retry with backoff) → touch markers

use super::dag::{Dag, Linearization, Node, NodeId};
use super::error::{Error, Result};
use super::parser;
use super::planner::{self, Staleness};
use super::recipe::Recipe;
use super::report::{self, CommandReport};
use super::state;
use super::template::{extract_options, has_option};
use super::types::{Cookbook, VarBlock};
use super::vars::{Tier, VarTiers};
use crate::transport::{CommandRunner, DEFAULT_SHELL};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Options of one build invocation.
#[derive(Debug, Clone)]
pub struct MakeConfig {
    /// Requested target, as typed
    pub target: String,
    /// Directory of the cookbook; commands run here
    pub base_dir: PathBuf,
    /// Do not expand requirements
    pub bare: bool,
    pub force: bool,
    pub dry_run: bool,
    /// Echo every command
    pub echo: bool,
    pub retries: u32,
    pub verbosity: u8,
    /// Used unless the cookbook sets `$globals.shell`
    pub shell: String,
    /// Trailing CLI arguments, bound to `.extra` on the root
    pub extra: Vec<String>,
    /// `-x KEY=value` overrides
    pub arg_vars: VarBlock,
    /// Process environment
    pub env_vars: VarBlock,
    /// Phony targets assumed up to date
    pub assume: HashSet<String>,
    /// Print the timing report
    pub time: bool,
    /// Length of one backoff step between retries
    pub backoff_unit: Duration,
}

impl MakeConfig {
    pub fn new(target: &str, base_dir: &Path) -> Self {
        Self {
            target: target.to_string(),
            base_dir: base_dir.to_path_buf(),
            bare: false,
            force: false,
            dry_run: false,
            echo: false,
            retries: 0,
            verbosity: 0,
            shell: DEFAULT_SHELL.to_string(),
            extra: Vec::new(),
            arg_vars: VarBlock::new(),
            env_vars: VarBlock::new(),
            assume: HashSet::new(),
            time: false,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

/// Non-fatal findings collected during a build.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<String>,
}

impl Diagnostics {
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// The build driver.
pub struct Make<'a> {
    config: MakeConfig,
    shell: String,
    runner: &'a dyn CommandRunner,
    static_recipes: IndexMap<String, Rc<Recipe>>,
    regex_recipes: IndexMap<String, Rc<Recipe>>,
    aliases: IndexMap<String, String>,
    reports: Vec<CommandReport>,
    diagnostics: Diagnostics,
}

impl<'a> Make<'a> {
    /// Validate the cookbook and index its recipes.
    pub fn new(config: MakeConfig, cookbook: Cookbook, runner: &'a dyn CommandRunner) -> Result<Self> {
        let mut diagnostics = Diagnostics::default();
        for warning in parser::validate_cookbook(&cookbook)? {
            diagnostics.warn(warning);
        }

        let Cookbook { globals, recipes } = cookbook;
        let shell = globals.shell.unwrap_or_else(|| config.shell.clone());
        let base_vars = VarTiers::new()
            .with(Tier::Global, globals.vars.into_block())
            .with(Tier::Env, config.env_vars.clone())
            .with(Tier::Arg, config.arg_vars.clone());

        let mut make = Self {
            config,
            shell,
            runner,
            static_recipes: IndexMap::new(),
            regex_recipes: IndexMap::new(),
            aliases: IndexMap::new(),
            reports: Vec::new(),
            diagnostics,
        };

        for (target, raw) in recipes {
            let recipe = Recipe::new(&target, raw, &make.config.base_dir, &base_vars)?;
            if let Some(ref alias) = recipe.alias {
                make.aliases.insert(recipe.target.clone(), alias.clone());
            } else if recipe.regex {
                make.regex_recipes.insert(recipe.target.clone(), Rc::new(recipe));
            } else {
                make.static_recipes.insert(recipe.target.clone(), Rc::new(recipe));
            }
        }
        tracing::debug!(
            static_recipes = make.static_recipes.len(),
            regex_recipes = make.regex_recipes.len(),
            aliases = make.aliases.len(),
            "indexed cookbook"
        );

        Ok(make)
    }

    /// Build the requested target. Returns the evaluated graph.
    pub fn make(&mut self) -> Result<Dag> {
        let dag = self.preprocess_target()?;
        let stale: Vec<NodeId> = dag.iter().filter(|&id| dag[id].should_build).collect();
        tracing::info!(target = %self.config.target, stale = stale.len(), "building");
        for id in stale {
            self.make_target(&dag[id])?;
        }
        if self.config.time {
            report::print_reports(&self.reports);
        }
        Ok(dag)
    }

    pub fn reports(&self) -> &[CommandReport] {
        &self.reports
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Expand, linearize and evaluate the graph of the requested target.
    pub fn preprocess_target(&mut self) -> Result<Dag> {
        let target = self.config.target.clone();
        let recipe = self
            .extract_recipe(&target, true)?
            .ok_or(Error::NoRecipe { target })?;

        let mut dag = Dag::new(Node::new(recipe));
        let mut unprocessed: IndexMap<String, NodeId> = IndexMap::new();
        unprocessed.insert(dag[dag.root()].target.clone(), dag.root());

        while !self.config.bare {
            let Some((_, id)) = unprocessed.pop() else {
                break;
            };
            dag.register(id);
            self.expand_node(&mut dag, &mut unprocessed, id)?;
        }

        if dag.sort()? == Linearization::Topological {
            self.diagnostics.warn(
                "The requirements order didn't allow the deterministic order; \
                 fell back to old-style dependency resolution",
            );
        }

        let staleness = Staleness {
            base_dir: &self.config.base_dir,
            force: self.config.force,
            dry_run: self.config.dry_run,
            assume: &self.config.assume,
            shell: &self.shell,
            runner: self.runner,
        };
        staleness.mark_unchanged(&mut dag)?;

        if self.config.verbosity > 3 {
            print_graph(&dag);
        }
        Ok(dag)
    }

    /// Resolve the requirements of one node into graph edges.
    fn expand_node(
        &mut self,
        dag: &mut Dag,
        unprocessed: &mut IndexMap<String, NodeId>,
        id: NodeId,
    ) -> Result<()> {
        let Some(recipe) = dag[id].recipe.clone() else {
            return Ok(());
        };

        let mut resolved = Vec::with_capacity(recipe.requires.len());
        for raw_requirement in recipe.requires.iter().rev() {
            let found = self.extract_recipe(raw_requirement, false)?;
            let requirement = match found {
                Some(ref found) => found.target.clone(),
                None => {
                    let path = state::file_path(&self.config.base_dir, raw_requirement);
                    let requirement = path.to_string_lossy().into_owned();
                    if !path.exists() {
                        return Err(Error::NoRecipe {
                            target: requirement,
                        });
                    }
                    requirement
                }
            };

            let node = if let Some(existing) = dag.get(&requirement) {
                existing
            } else if let Some(&queued) = unprocessed.get(&requirement) {
                queued
            } else if let Some(found) = found {
                let queued = dag.alloc(Node::new(found));
                unprocessed.insert(requirement.clone(), queued);
                queued
            } else {
                dag.add_node(Node::bare(&requirement))
            };

            if !dag.add_requirement(id, node) {
                self.diagnostics.warn(format!(
                    "`{}` is included twice in `{}` requirements, only the first will be considered",
                    dag[node], dag[id]
                ));
            }
            resolved.push(requirement);
        }

        resolved.reverse();
        if let Some(recipe) = dag[id].recipe.as_mut() {
            Rc::make_mut(recipe).requires = resolved;
        }
        Ok(())
    }

    /// Alias, then static name, then absolute path, then regex recipes in
    /// definition order.
    fn extract_recipe(&self, target: &str, use_extra: bool) -> Result<Option<Rc<Recipe>>> {
        let target = self.aliases.get(target).map_or(target, String::as_str);
        let absolute = state::file_path(&self.config.base_dir, target)
            .to_string_lossy()
            .into_owned();

        let recipe = self
            .static_recipes
            .get(target)
            .or_else(|| self.static_recipes.get(&absolute))
            .or_else(|| {
                self.regex_recipes
                    .values()
                    .find(|recipe| recipe.matches(target) || recipe.matches(&absolute))
            });
        let Some(recipe) = recipe else {
            return Ok(None);
        };

        let extra: &[String] = if use_extra { &self.config.extra } else { &[] };
        recipe.for_target(target, extra).map(Some)
    }

    fn make_target(&mut self, node: &Node) -> Result<()> {
        let recipe = node.recipe.as_ref().ok_or_else(|| Error::NoRecipe {
            target: node.target.clone(),
        })?;

        if self.config.verbosity > 1 {
            println!("=== target: {} ===", recipe.target);
        }
        tracing::info!(target = %recipe.target, "making target");

        let count = recipe.commands.len();
        for (i, raw_command) in recipe.commands.iter().enumerate() {
            let (command, options) = extract_options(raw_command);
            let echo = self.should_echo(recipe, &options);
            if echo {
                println!("🔧 Running `{}`", command);
            }
            let exit_code = self.run_command(&command)?;
            if echo {
                print_result(&command, exit_code);
            }
            if exit_code != 0
                && !recipe.allow_failures
                && !has_option(&options, "allow_failures")
            {
                if self.config.time {
                    report::print_reports(&self.reports);
                }
                return Err(Error::CommandFailed { command, exit_code });
            }
            if i + 1 != count {
                println!();
            }
        }

        planner::update_timestamp(&self.config.base_dir, recipe)
    }

    fn should_echo(&self, recipe: &Recipe, options: &[String]) -> bool {
        has_option(options, "echo")
            || recipe.echo
            || self.config.verbosity > 2
            || self.config.echo
            || self.config.dry_run
    }

    /// Run with retries. Waits 1, 1, 2, 3, 5... backoff units between
    /// attempts.
    fn run_command(&mut self, command: &str) -> Result<i32> {
        if self.config.dry_run {
            return Ok(0);
        }

        let mut delays = backoff_delays();
        let mut elapsed = Duration::ZERO;
        let mut attempt = 0;
        let exit_code = loop {
            let start = Instant::now();
            let exit_code = self.runner.run(command, &self.config.base_dir, &self.shell)?;
            elapsed += start.elapsed();
            if exit_code == 0 || attempt == self.config.retries {
                break exit_code;
            }
            let delay = delays.next().unwrap_or(u32::MAX);
            println!("{} failed. Retrying in {}s...", command, delay);
            tracing::debug!(command, attempt, exit_code, "retrying");
            std::thread::sleep(self.config.backoff_unit * delay);
            attempt += 1;
        };

        self.reports.push(CommandReport {
            command: command.to_string(),
            retries: attempt,
            elapsed,
            success: exit_code == 0,
        });
        Ok(exit_code)
    }
}

/// Fibonacci backoff in units: 1, 1, 2, 3, 5...
fn backoff_delays() -> impl Iterator<Item = u32> {
    std::iter::successors(Some((1u32, 1u32)), |&(a, b)| {
        a.checked_add(b).map(|next| (b, next))
    })
    .map(|(a, _)| a)
}

fn print_result(command: &str, exit_code: i32) {
    if exit_code != 0 {
        println!("❌ `{}` failed with exit code {}", command, exit_code);
    } else {
        println!("✅ `{}` run successfully!", command);
    }
}

fn target_names(dag: &Dag, ids: impl IntoIterator<Item = NodeId>) -> Vec<&str> {
    ids.into_iter().map(|id| dag[id].target.as_str()).collect()
}

fn print_graph(dag: &Dag) {
    println!("=== all targets ===");
    for id in dag.iter() {
        let node = &dag[id];
        println!("- {}:", node.target);
        println!(
            "    timestamp: {}",
            report::human_readable_timestamp(node.timestamp)
        );
        println!("    should_build: {}", node.should_build);
        println!("    requires: {:?}", target_names(dag, node.requires.iter().copied()));
        println!(
            "    required_by: {:?}",
            target_names(dag, node.required_by.iter().copied())
        );
    }
}
