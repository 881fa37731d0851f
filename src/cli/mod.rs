//! YM-013: Command-line surface of `yam`.

use crate::core::error::{Error, Result};
use crate::core::executor::{Make, MakeConfig};
use crate::core::parser::{self, CookbookFormat};
use crate::core::types::{Value, VarBlock};
use crate::transport::{LocalRunner, DEFAULT_SHELL};
use clap::Parser;
use std::path::{Path, PathBuf};

/// Yet another make command
#[derive(Parser, Debug)]
#[command(name = "yam", version, about = "Yet another make command")]
pub struct Cli {
    /// Increase the level of verbosity
    #[arg(short, long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Assume that dependency is up to date (works only with phony ones)
    #[arg(short, long, value_name = "dependency")]
    pub assume: Vec<String>,

    /// Build only the target, without checking the dependencies
    #[arg(short, long)]
    pub bare: bool,

    /// The path to the cookbook
    #[arg(short, long, value_name = "cookbook")]
    pub cookbook: Option<PathBuf>,

    /// The path to the directory that contains the cookbook
    #[arg(short, long, value_name = "dir", default_value = ".")]
    pub directory: PathBuf,

    /// Echo every command
    #[arg(short, long, overrides_with = "no_echo")]
    pub echo: bool,

    /// Do not echo commands unless a recipe asks for it
    #[arg(long)]
    pub no_echo: bool,

    /// Rebuild all dependencies and the target
    #[arg(short, long)]
    pub force: bool,

    /// Only print the commands to be executed
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Retry commands for <retries> number of times
    #[arg(short, long, value_name = "retries", default_value_t = 0)]
    pub retries: u32,

    /// The path to the shell used to execute the commands
    #[arg(short, long, value_name = "shell")]
    pub shell: Option<String>,

    /// The type of the cookbook, defaults to the file extension
    #[arg(short = 't', long, value_enum)]
    pub cookbook_type: Option<CookbookFormat>,

    /// Print a timing report
    #[arg(short = 'T', long)]
    pub time: bool,

    /// Override a cookbook variable, in the form KEY=value
    #[arg(short = 'x', long = "variable", value_name = "KEY=value")]
    pub variables: Vec<String>,

    /// The target for yam
    pub target: String,

    /// Extra args passed to the recipe as `.extra`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub extra: Vec<String>,
}

/// Load the cookbook and build the requested target.
pub fn run(cli: Cli) -> Result<()> {
    let cookbook_path = parser::find_cookbook(&cli.directory, cli.cookbook.as_deref())?;
    let cookbook = parser::parse_cookbook_file(&cookbook_path, cli.cookbook_type)?;
    tracing::info!(cookbook = %cookbook_path.display(), "loaded cookbook");

    let config = make_config(cli, base_dir(&cookbook_path))?;
    let runner = LocalRunner;
    let mut make = Make::new(config, cookbook, &runner)?;
    make.make()?;
    Ok(())
}

/// Build options from parsed arguments.
pub fn make_config(cli: Cli, base_dir: &Path) -> Result<MakeConfig> {
    let mut config = MakeConfig::new(&cli.target, base_dir);
    config.bare = cli.bare;
    config.force = cli.force;
    config.dry_run = cli.dry_run;
    config.echo = cli.echo && !cli.no_echo;
    config.retries = cli.retries;
    config.verbosity = cli.verbosity;
    config.shell = cli.shell.unwrap_or_else(|| DEFAULT_SHELL.to_string());
    config.extra = cli.extra;
    config.arg_vars = parse_variables(&cli.variables)?;
    config.env_vars = std::env::vars()
        .map(|(key, value)| (key, Value::from(value)))
        .collect();
    config.assume = cli.assume.into_iter().collect();
    config.time = cli.time;
    Ok(config)
}

/// `KEY=value` pairs, split at the first `=`.
pub fn parse_variables(raw: &[String]) -> Result<VarBlock> {
    raw.iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(key, value)| (key.to_string(), Value::from(value)))
                .ok_or_else(|| {
                    Error::Config(format!("variable `{}` is not in the form KEY=value", pair))
                })
        })
        .collect()
}

fn base_dir(cookbook: &Path) -> &Path {
    cookbook.parent().unwrap_or(Path::new("/"))
}
