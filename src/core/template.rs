//! YM-003: Template evaluation.
//!
//! Evaluates `${var}`, `${var:key}` and `$((function args))` expressions
//! inside strings, lists and mappings against a flat variable environment.
//! `$$` escapes one level of `$`. A string that is exactly one bare
//! reference evaluates to the bound value itself, keeping its shape.

use super::error::{Error, Result};
use super::functions::Function;
use super::types::Value;
use indexmap::IndexMap;
use regex::{Captures, Regex};
use std::path::Path;
use std::sync::LazyLock;

/// Flat variable environment produced by tier flattening.
pub type Vars = IndexMap<String, Value>;

static VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<dollars>\$+)\{(?P<variable>[a-zA-Z0-9_.]+)(?P<sep>:)?(?P<key>[a-zA-Z0-9_.]+)?\}")
        .expect("static regex")
});
static BARE_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$\{(?P<variable>[a-zA-Z0-9_.]+)\}$").expect("static regex")
});
static OPTIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[(?P<options>.*?)\](?P<string>.*)$").expect("static regex"));
static FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$\(\((?P<name>\w+) *(?P<args>.*)\)\)$").expect("static regex")
});

/// Evaluator bound to one variable snapshot and the cookbook directory.
pub struct Template<'a> {
    vars: &'a Vars,
    base_dir: &'a Path,
}

impl<'a> Template<'a> {
    pub fn new(vars: &'a Vars, base_dir: &'a Path) -> Self {
        Self { vars, base_dir }
    }

    /// Evaluate a value recursively.
    ///
    /// Lists splice list-valued elements one level deep; mapping keys and
    /// values are both evaluated. `null` is rejected.
    pub fn evaluate(&self, value: &Value) -> Result<Value> {
        match value {
            Value::Str(s) => self.substitute(s),
            Value::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match self.evaluate(item)? {
                        Value::List(inner) => out.extend(inner),
                        other => out.push(other),
                    }
                }
                Ok(Value::List(out))
            }
            Value::Map(map) => {
                let mut out = IndexMap::with_capacity(map.len());
                for (key, val) in map {
                    let key = self.substitute(key)?.to_string();
                    out.insert(key, self.evaluate(val)?);
                }
                Ok(Value::Map(out))
            }
            Value::Bool(_) | Value::Int(_) | Value::Float(_) => Ok(value.clone()),
            Value::Null => Err(Error::Type("null is not supported for evaluation".to_string())),
        }
    }

    /// Evaluate a string, returning it as a string.
    pub fn evaluate_str(&self, string: &str) -> Result<String> {
        Ok(self.substitute(string)?.to_string())
    }

    /// Evaluate one string: function call, bare reference, or interpolation.
    pub fn substitute(&self, string: &str) -> Result<Value> {
        if let Some(caps) = FUNCTION.captures(string) {
            return self.expand_function(string, &caps["name"], &caps["args"]);
        }

        if let Some(caps) = BARE_VAR.captures(string) {
            let name = &caps["variable"];
            return self
                .vars
                .get(name)
                .cloned()
                .ok_or_else(|| Error::UndefinedVariable(name.to_string()));
        }

        let mut out = String::with_capacity(string.len());
        let mut last = 0;
        for caps in VAR.captures_iter(string) {
            let Some(whole) = caps.get(0) else { continue };
            out.push_str(&string[last..whole.start()]);
            out.push_str(&self.replace(string, &caps)?);
            last = whole.end();
        }
        out.push_str(&string[last..]);
        Ok(Value::Str(out))
    }

    fn replace(&self, template: &str, caps: &Captures<'_>) -> Result<String> {
        let dollars = caps["dollars"].len();
        let variable = &caps["variable"];
        let escaped = "$".repeat(dollars / 2);

        if dollars % 2 == 0 {
            let mut literal = format!("{}{{{}", escaped, variable);
            if caps.name("sep").is_some() {
                literal.push(':');
            }
            if let Some(key) = caps.name("key") {
                literal.push_str(key.as_str());
            }
            literal.push('}');
            return Ok(literal);
        }

        let value = self
            .vars
            .get(variable)
            .cloned()
            .unwrap_or_else(|| Value::from(""));
        let value = match caps.name("key") {
            None => value,
            Some(key) => index(template, variable, &value, key.as_str())?,
        };
        Ok(format!("{}{}", escaped, value))
    }

    fn expand_function(&self, template: &str, name: &str, args: &str) -> Result<Value> {
        let function = Function::from_name(name)?;
        let tokens = shell_words::split(args)
            .map_err(|e| Error::template(template, format!("cannot split arguments: {}", e)))?;
        let args = tokens
            .iter()
            .map(|token| self.substitute(token))
            .collect::<Result<Vec<_>>>()?;
        tracing::trace!(function = name, ?args, "calling template function");
        function.invoke(self.base_dir, &args)
    }
}

/// `${var:key}`: integer index into a list, key lookup into a mapping.
fn index(template: &str, variable: &str, value: &Value, key: &str) -> Result<Value> {
    match value {
        Value::List(items) => {
            let i: usize = key.parse().map_err(|_| {
                Error::template(template, format!("list `{}` needs an integer index", variable))
            })?;
            items.get(i).cloned().ok_or_else(|| {
                Error::template(template, format!("index {} out of range for `{}`", i, variable))
            })
        }
        Value::Map(map) => map.get(key).cloned().ok_or_else(|| {
            Error::template(template, format!("`{}` has no key `{}`", variable, key))
        }),
        other => Err(Error::template(
            template,
            format!("cannot index {} `{}`", other.type_name(), variable),
        )),
    }
}

/// Strip a leading `[opt, opt]` block.
///
/// Returns the remaining string and the trimmed option names. Without a
/// prefix the whole string comes back trimmed with no options.
pub fn extract_options(string: &str) -> (String, Vec<String>) {
    match OPTIONS.captures(string) {
        None => (string.trim().to_string(), Vec::new()),
        Some(caps) => {
            let options = caps["options"]
                .split(',')
                .map(|s| s.trim().to_string())
                .collect();
            (caps["string"].to_string(), options)
        }
    }
}

/// True if `option` was given in an extracted option list.
pub fn has_option(options: &[String], option: &str) -> bool {
    options.iter().any(|o| o == option)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, Value)]) -> Vars {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn eval(value: Value, env: &Vars) -> Result<Value> {
        Template::new(env, Path::new("/tmp")).evaluate(&value)
    }

    #[test]
    fn test_ym003_plain_string() {
        let env = vars(&[("x", Value::Int(1))]);
        assert_eq!(eval("string".into(), &env).unwrap(), Value::from("string"));
    }

    #[test]
    fn test_ym003_interpolation() {
        let env = vars(&[("x", Value::Int(1))]);
        assert_eq!(eval("string_${x}".into(), &env).unwrap(), Value::from("string_1"));
    }

    #[test]
    fn test_ym003_escape() {
        let env = vars(&[("x", Value::Int(1))]);
        assert_eq!(eval("string_$${x}".into(), &env).unwrap(), Value::from("string_${x}"));
        assert_eq!(eval("$$$${x}".into(), &env).unwrap(), Value::from("$${x}"));
        assert_eq!(eval("$$${x}".into(), &env).unwrap(), Value::from("$1"));
    }

    #[test]
    fn test_ym003_escape_keeps_key() {
        let env = vars(&[("list", Value::from(vec!["a"]))]);
        assert_eq!(eval("$${list:0}".into(), &env).unwrap(), Value::from("${list:0}"));
    }

    #[test]
    fn test_ym003_index_list_and_map() {
        let mut map = IndexMap::new();
        map.insert("key".to_string(), Value::from("value"));
        let env = vars(&[
            ("dict", Value::Map(map.clone())),
            ("list", Value::from(vec!["spam", "eggs"])),
        ]);
        assert_eq!(eval("${dict:key}".into(), &env).unwrap(), Value::from("value"));
        assert_eq!(eval("${list:0}".into(), &env).unwrap(), Value::from("spam"));
        assert_eq!(eval("${list:}".into(), &env).unwrap(), Value::from("spam eggs"));
        assert_eq!(eval("${dict:}".into(), &env).unwrap(), Value::from("{key: value}"));
    }

    #[test]
    fn test_ym003_bare_reference_keeps_shape() {
        let mut map = IndexMap::new();
        map.insert("key".to_string(), Value::from("value"));
        let env = vars(&[
            ("dict", Value::Map(map.clone())),
            ("list", Value::from(vec!["spam", "eggs"])),
        ]);
        assert_eq!(eval("${dict}".into(), &env).unwrap(), Value::Map(map));
        assert_eq!(
            eval("${list}".into(), &env).unwrap(),
            Value::from(vec!["spam", "eggs"])
        );
    }

    #[test]
    fn test_ym003_bare_reference_undefined() {
        let env = Vars::new();
        let err = eval("${ghost}".into(), &env).unwrap_err();
        assert!(matches!(err, Error::UndefinedVariable(ref n) if n == "ghost"));
    }

    #[test]
    fn test_ym003_embedded_undefined_is_empty() {
        let env = Vars::new();
        assert_eq!(eval("a${ghost}b".into(), &env).unwrap(), Value::from("ab"));
    }

    #[test]
    fn test_ym003_list_splices_nested() {
        let env = vars(&[("nested", Value::from(vec!["spam"])), ("x", Value::Int(1))]);
        let input = Value::from(vec!["${nested}", "string_${x}"]);
        assert_eq!(
            eval(input, &env).unwrap(),
            Value::from(vec!["spam", "string_1"])
        );
    }

    #[test]
    fn test_ym003_mapping_keys_and_values() {
        let env = vars(&[("key", Value::Int(1)), ("value", Value::Int(2))]);
        let mut input = IndexMap::new();
        input.insert("string_${key}".to_string(), Value::from("string_${value}"));
        let mut expected = IndexMap::new();
        expected.insert("string_1".to_string(), Value::from("string_2"));
        assert_eq!(eval(Value::Map(input), &env).unwrap(), Value::Map(expected));
    }

    #[test]
    fn test_ym003_function_returns_native_value() {
        let env = vars(&[("x", Value::from(vec![Value::Int(3), Value::Int(1), Value::Int(2)]))]);
        assert_eq!(
            eval("$((sort ${x}))".into(), &env).unwrap(),
            Value::from(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
    }

    #[test]
    fn test_ym003_function_quoted_arguments() {
        let env = Vars::new();
        assert_eq!(
            eval("$((sub 'a b' c 'a b a b'))".into(), &env).unwrap(),
            Value::from("c c")
        );
    }

    #[test]
    fn test_ym003_unknown_function() {
        let env = Vars::new();
        let err = eval("$((nope 1))".into(), &env).unwrap_err();
        assert!(matches!(err, Error::UnknownFunction(ref n) if n == "nope"));
    }

    #[test]
    fn test_ym003_null_rejected() {
        let env = Vars::new();
        assert!(matches!(eval(Value::Null, &env), Err(Error::Type(_))));
    }

    #[test]
    fn test_ym003_scalars_pass_through() {
        let env = Vars::new();
        assert_eq!(eval(Value::Bool(true), &env).unwrap(), Value::Bool(true));
        assert_eq!(eval(Value::Int(7), &env).unwrap(), Value::Int(7));
    }

    #[test]
    fn test_ym003_index_errors() {
        let env = vars(&[("list", Value::from(vec!["a"])), ("s", Value::from("x"))]);
        assert!(eval("${list:5}".into(), &env).is_err());
        assert!(eval("${list:k}".into(), &env).is_err());
        assert!(eval("${s:0}".into(), &env).is_err());
    }

    #[test]
    fn test_ym003_extract_options() {
        assert_eq!(extract_options("string"), ("string".to_string(), vec![]));
        assert_eq!(extract_options("  padded "), ("padded".to_string(), vec![]));
        assert_eq!(
            extract_options("[english]string"),
            ("string".to_string(), vec!["english".to_string()])
        );
        let (rest, options) = extract_options("[english, utf-8]string");
        assert_eq!(rest, "string");
        assert_eq!(options, vec!["english", "utf-8"]);
        let (rest, options) = extract_options("[more_brackets]string_with_]_in_it");
        assert_eq!(rest, "string_with_]_in_it");
        assert_eq!(options, vec!["more_brackets"]);
        assert!(has_option(&options, "more_brackets"));
        assert!(!has_option(&options, "echo"));
    }
}
