//! YM-005: Variable tiers and flattening.
//!
//! Variables come from six tiers. Flattening walks them in a fixed order,
//! evaluating each entry against what has been accumulated so far, so a
//! later tier overrides an earlier one unless the key is `[weak]` (only set
//! when absent) or was previously marked `[strong]` (never overwritten).

use super::error::{Error, Result};
use super::template::{extract_options, has_option, Template, Vars};
use super::types::VarBlock;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::rc::Rc;

/// Provenance of a variable block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Env,
    Arg,
    Global,
    Local,
    Regex,
    Implicit,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Env => write!(f, "env"),
            Self::Arg => write!(f, "arg"),
            Self::Global => write!(f, "global"),
            Self::Local => write!(f, "local"),
            Self::Regex => write!(f, "regex"),
            Self::Implicit => write!(f, "implicit"),
        }
    }
}

/// Processing order, weakest first.
///
/// Tiers are revisited on purpose: `local` may reference `global` values,
/// regex captures beat globals but lose to locals, and `env`/`arg` win at
/// the very end.
pub const FLATTEN_ORDER: [Tier; 11] = [
    Tier::Env,
    Tier::Arg,
    Tier::Global,
    Tier::Local,
    Tier::Global,
    Tier::Regex,
    Tier::Implicit,
    Tier::Regex,
    Tier::Local,
    Tier::Env,
    Tier::Arg,
];

/// Variable blocks by tier. Blocks are shared, so cloning is cheap.
#[derive(Debug, Clone, Default)]
pub struct VarTiers {
    blocks: HashMap<Tier, Rc<VarBlock>>,
}

impl VarTiers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion.
    pub fn with(mut self, tier: Tier, block: VarBlock) -> Self {
        self.set(tier, block);
        self
    }

    pub fn set(&mut self, tier: Tier, block: VarBlock) {
        self.blocks.insert(tier, Rc::new(block));
    }

    /// Share a block already owned by another set of tiers.
    pub fn share(&mut self, tier: Tier, other: &VarTiers) {
        if let Some(block) = other.blocks.get(&tier) {
            self.blocks.insert(tier, Rc::clone(block));
        }
    }

    pub fn get(&self, tier: Tier) -> Option<&VarBlock> {
        self.blocks.get(&tier).map(|b| b.as_ref())
    }

    /// Flatten into one lookup table.
    pub fn flatten(&self, base_dir: &Path) -> Result<Vars> {
        flatten_vars(self, base_dir)
    }
}

/// Merge all tiers into a flat mapping following [`FLATTEN_ORDER`].
pub fn flatten_vars(tiers: &VarTiers, base_dir: &Path) -> Result<Vars> {
    let mut output = Vars::new();
    let mut strong_keys: HashSet<String> = HashSet::new();

    for tier in FLATTEN_ORDER {
        let Some(block) = tiers.get(tier) else {
            continue;
        };
        for (raw_key, raw_value) in block {
            if raw_key.starts_with('.') && tier != Tier::Implicit {
                return Err(Error::Config(format!(
                    "Only implicit vars can start with a dot (`.`), found `{}` in {} vars",
                    raw_key, tier
                )));
            }
            let (key, value) = {
                let template = Template::new(&output, base_dir);
                let evaluated_key = template.evaluate_str(raw_key)?;
                let (key, options) = extract_options(&evaluated_key);
                if strong_keys.contains(&key)
                    || (has_option(&options, "weak") && output.contains_key(&key))
                {
                    continue;
                }
                if has_option(&options, "strong") {
                    strong_keys.insert(key.clone());
                }
                (key, template.evaluate(raw_value)?)
            };
            output.insert(key, value);
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Value;

    fn block(pairs: &[(&str, &str)]) -> VarBlock {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(*v)))
            .collect()
    }

    fn flat(tiers: VarTiers) -> Vars {
        flatten_vars(&tiers, Path::new("/tmp")).unwrap()
    }

    #[test]
    fn test_ym005_local_only() {
        let out = flat(
            VarTiers::new()
                .with(Tier::Regex, block(&[]))
                .with(Tier::Local, block(&[("x", "1"), ("y", "2")])),
        );
        assert_eq!(out, block(&[("x", "1"), ("y", "2")]));
    }

    #[test]
    fn test_ym005_local_beats_regex() {
        let out = flat(
            VarTiers::new()
                .with(Tier::Regex, block(&[("x", "0")]))
                .with(Tier::Local, block(&[("x", "1")])),
        );
        assert_eq!(out["x"], Value::from("1"));
    }

    #[test]
    fn test_ym005_regex_and_local_mix() {
        let out = flat(
            VarTiers::new()
                .with(Tier::Global, block(&[]))
                .with(Tier::Regex, block(&[("x", "1"), ("y", "0")]))
                .with(Tier::Local, block(&[("y", "2")])),
        );
        assert_eq!(out["x"], Value::from("1"));
        assert_eq!(out["y"], Value::from("2"));
    }

    #[test]
    fn test_ym005_weak_cannot_override() {
        let out = flat(
            VarTiers::new()
                .with(Tier::Regex, block(&[("TEST_VAR", "test")]))
                .with(Tier::Local, block(&[("[weak]TEST_VAR", "1")])),
        );
        assert_eq!(out["TEST_VAR"], Value::from("test"));

        let out = flat(
            VarTiers::new()
                .with(Tier::Regex, block(&[("TEST_VAR", "test")]))
                .with(Tier::Local, block(&[("TEST_VAR", "1")])),
        );
        assert_eq!(out["TEST_VAR"], Value::from("1"));
    }

    #[test]
    fn test_ym005_weak_sets_when_absent() {
        let out = flat(VarTiers::new().with(Tier::Local, block(&[("[weak]x", "1")])));
        assert_eq!(out["x"], Value::from("1"));
    }

    #[test]
    fn test_ym005_strong_locks_key() {
        let out = flat(
            VarTiers::new()
                .with(Tier::Global, block(&[("[strong]x", "global")]))
                .with(Tier::Env, block(&[("x", "env")]))
                .with(Tier::Arg, block(&[("x", "arg")])),
        );
        assert_eq!(out["x"], Value::from("global"));
    }

    #[test]
    fn test_ym005_arg_beats_env_beats_local() {
        let out = flat(
            VarTiers::new()
                .with(Tier::Local, block(&[("V", "local")]))
                .with(Tier::Env, block(&[("V", "env")])),
        );
        assert_eq!(out["V"], Value::from("env"));

        let out = flat(
            VarTiers::new()
                .with(Tier::Local, block(&[("V", "local")]))
                .with(Tier::Env, block(&[("V", "env")]))
                .with(Tier::Arg, block(&[("V", "argument")])),
        );
        assert_eq!(out["V"], Value::from("argument"));
    }

    #[test]
    fn test_ym005_regex_beats_global() {
        let out = flat(
            VarTiers::new()
                .with(Tier::Global, block(&[("version", "v0")]))
                .with(Tier::Regex, block(&[("version", "7.0")])),
        );
        assert_eq!(out["version"], Value::from("7.0"));
    }

    #[test]
    fn test_ym005_local_references_global() {
        let out = flat(
            VarTiers::new()
                .with(Tier::Global, block(&[("prefix", "/etc")]))
                .with(Tier::Local, block(&[("conf", "${prefix}/service.conf")])),
        );
        assert_eq!(out["conf"], Value::from("/etc/service.conf"));
    }

    #[test]
    fn test_ym005_later_entries_see_earlier_ones() {
        let out = flat(VarTiers::new().with(Tier::Local, block(&[("a", "1"), ("b", "${a}2")])));
        assert_eq!(out["b"], Value::from("12"));
    }

    #[test]
    fn test_ym005_dot_keys_only_implicit() {
        let err = flatten_vars(
            &VarTiers::new().with(Tier::Local, block(&[(".target", "x")])),
            Path::new("/tmp"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Only implicit vars"));

        let out = flat(VarTiers::new().with(Tier::Implicit, block(&[(".target", "x")])));
        assert_eq!(out[".target"], Value::from("x"));
    }

    #[test]
    fn test_ym005_share_reuses_block() {
        let base = VarTiers::new().with(Tier::Global, block(&[("g", "1")]));
        let mut derived = VarTiers::new();
        derived.share(Tier::Global, &base);
        derived.share(Tier::Arg, &base);
        assert_eq!(derived.get(Tier::Global).unwrap()["g"], Value::from("1"));
        assert!(derived.get(Tier::Arg).is_none());
    }
}
