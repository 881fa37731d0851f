//! YM-004: Built-in template functions.
//!
//! Invoked as `$((name arg ...))`. Arguments arrive already evaluated, and
//! the returned value keeps its native shape (list, bool or string).
//! Path functions resolve relative paths against the cookbook directory
//! and map element-wise over lists.

use super::error::{Error, Result};
use super::types::Value;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// The fixed function registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Glob,
    Sort,
    Exists,
    Name,
    Stem,
    Suffix,
    Parent,
    ChangeSuffix,
    ChangeParent,
    Pwd,
    FilterOut,
    TernaryIf,
    Substitute,
    Merge,
}

impl Function {
    pub const ALL: [Function; 14] = [
        Self::Glob,
        Self::Sort,
        Self::Exists,
        Self::Name,
        Self::Stem,
        Self::Suffix,
        Self::Parent,
        Self::ChangeSuffix,
        Self::ChangeParent,
        Self::Pwd,
        Self::FilterOut,
        Self::TernaryIf,
        Self::Substitute,
        Self::Merge,
    ];

    /// Name used in `$((name ...))`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Glob => "glob",
            Self::Sort => "sort",
            Self::Exists => "exists",
            Self::Name => "name",
            Self::Stem => "stem",
            Self::Suffix => "suffix",
            Self::Parent => "parent",
            Self::ChangeSuffix => "change_suffix",
            Self::ChangeParent => "change_parent",
            Self::Pwd => "pwd",
            Self::FilterOut => "filter_out",
            Self::TernaryIf => "ternary_if",
            Self::Substitute => "sub",
            Self::Merge => "merge",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.name() == name)
            .ok_or_else(|| Error::UnknownFunction(name.to_string()))
    }

    pub fn invoke(self, base_dir: &Path, args: &[Value]) -> Result<Value> {
        match self {
            Self::Glob => {
                let [pattern] = arity::<1>(self, args)?;
                glob_paths(base_dir, pattern)
            }
            Self::Sort => {
                let [list] = arity::<1>(self, args)?;
                sort(list)
            }
            Self::Exists => {
                let [path] = arity::<1>(self, args)?;
                map_paths(path, |p| Ok(Value::Bool(base_dir.join(p).exists())))
            }
            Self::Name => {
                let [path] = arity::<1>(self, args)?;
                map_paths(path, |p| {
                    Ok(base_dir
                        .join(p)
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default()
                        .into())
                })
            }
            Self::Stem => {
                let [path] = arity::<1>(self, args)?;
                map_paths(path, |p| {
                    Ok(base_dir
                        .join(p)
                        .file_stem()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default()
                        .into())
                })
            }
            Self::Suffix => {
                let [path] = arity::<1>(self, args)?;
                map_paths(path, |p| {
                    Ok(base_dir
                        .join(p)
                        .extension()
                        .map(|e| format!(".{}", e.to_string_lossy()))
                        .unwrap_or_default()
                        .into())
                })
            }
            Self::Parent => {
                let [path] = arity::<1>(self, args)?;
                map_paths(path, |p| {
                    let joined = base_dir.join(p);
                    let parent = joined.parent().unwrap_or(&joined);
                    Ok(posix(parent).into())
                })
            }
            Self::ChangeSuffix => {
                let [path, suffix] = arity::<2>(self, args)?;
                let suffix = suffix.to_string();
                map_paths(path, |p| {
                    let mut joined = base_dir.join(p);
                    if joined.file_name().is_none() {
                        return Err(Error::Type(format!("{} has an empty name", p)));
                    }
                    joined.set_extension(suffix.trim_start_matches('.'));
                    Ok(posix(&joined).into())
                })
            }
            Self::ChangeParent => {
                let [path, parent] = arity::<2>(self, args)?;
                let parent = base_dir.join(parent.to_string());
                map_paths(path, |p| {
                    let joined = base_dir.join(p);
                    let name = joined.file_name().unwrap_or_default();
                    Ok(posix(&parent.join(name)).into())
                })
            }
            Self::Pwd => {
                arity::<0>(self, args)?;
                Ok(posix(base_dir).into())
            }
            Self::FilterOut => {
                let [odd, list] = arity::<2>(self, args)?;
                let Value::List(items) = list else {
                    return Err(expected(self, "a list", list));
                };
                Ok(Value::List(
                    items.iter().filter(|item| *item != odd).cloned().collect(),
                ))
            }
            Self::TernaryIf => {
                let [condition, if_true, if_false] = arity::<3>(self, args)?;
                Ok(if condition.truthy() {
                    if_true.clone()
                } else {
                    if_false.clone()
                })
            }
            Self::Substitute => {
                let [old, new, obj] = arity::<3>(self, args)?;
                let (old, new) = (old.to_string(), new.to_string());
                match obj {
                    Value::List(items) => Ok(Value::List(
                        items
                            .iter()
                            .map(|s| Value::Str(s.to_string().replace(&old, &new)))
                            .collect(),
                    )),
                    other => Ok(Value::Str(other.to_string().replace(&old, &new))),
                }
            }
            Self::Merge => {
                if args.is_empty() {
                    return Err(arity_error(self, "at least 1", 0));
                }
                let mut out = Vec::new();
                for arg in args {
                    match arg {
                        Value::List(items) => out.extend(items.iter().cloned()),
                        other => out.push(other.clone()),
                    }
                }
                Ok(Value::List(out))
            }
        }
    }
}

fn arity<const N: usize>(function: Function, args: &[Value]) -> Result<&[Value; N]> {
    args.try_into()
        .map_err(|_| arity_error(function, &N.to_string(), args.len()))
}

fn arity_error(function: Function, wanted: &str, got: usize) -> Error {
    Error::Type(format!(
        "{}() takes {} argument(s), got {}",
        function.name(),
        wanted,
        got
    ))
}

fn expected(function: Function, what: &str, got: &Value) -> Error {
    Error::Type(format!(
        "{}() expects {}, got {}",
        function.name(),
        what,
        got.type_name()
    ))
}

fn posix(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Apply `f` to one path or to every path of a list.
fn map_paths(value: &Value, f: impl Fn(&str) -> Result<Value>) -> Result<Value> {
    match value {
        Value::List(items) => items
            .iter()
            .map(|item| f(&item.to_string()))
            .collect::<Result<Vec<_>>>()
            .map(Value::List),
        other => f(&other.to_string()),
    }
}

fn glob_paths(base_dir: &Path, pattern: &Value) -> Result<Value> {
    let full: PathBuf = base_dir.join(pattern.to_string());
    let full = full.to_string_lossy();
    let paths = glob::glob(&full)
        .map_err(|e| Error::Type(format!("invalid glob pattern `{}`: {}", pattern, e)))?;
    let mut out = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| Error::io(e.path().to_path_buf(), e.into_error()))?;
        out.push(Value::Str(posix(&path)));
    }
    Ok(Value::List(out))
}

fn sort(list: &Value) -> Result<Value> {
    let Value::List(items) = list else {
        return Err(expected(Function::Sort, "a list", list));
    };
    let mut sorted = items.clone();
    let mut incomparable = None;
    sorted.sort_by(|a, b| {
        a.compare(b).unwrap_or_else(|| {
            incomparable.get_or_insert((a.type_name(), b.type_name()));
            Ordering::Equal
        })
    });
    if let Some((a, b)) = incomparable {
        return Err(Error::Type(format!("cannot compare {} with {}", a, b)));
    }
    Ok(Value::List(sorted))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(function: &str, base: &Path, args: Vec<Value>) -> Result<Value> {
        Function::from_name(function)?.invoke(base, &args)
    }

    #[test]
    fn test_ym004_registry_names_roundtrip() {
        for f in Function::ALL {
            assert_eq!(Function::from_name(f.name()).unwrap(), f);
        }
        assert!(Function::from_name("eval").is_err());
    }

    #[test]
    fn test_ym004_glob() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.c"), "").unwrap();
        std::fs::write(dir.path().join("b.c"), "").unwrap();
        std::fs::write(dir.path().join("c.h"), "").unwrap();
        let out = call("glob", dir.path(), vec!["*.c".into()]).unwrap();
        let expected: Vec<String> = ["a.c", "b.c"]
            .iter()
            .map(|n| dir.path().join(n).to_string_lossy().into_owned())
            .collect();
        assert_eq!(out, Value::from(expected));
    }

    #[test]
    fn test_ym004_sort() {
        let out = call(
            "sort",
            Path::new("/"),
            vec![Value::from(vec![Value::Int(3), Value::Int(1), Value::Int(2)])],
        )
        .unwrap();
        assert_eq!(out, Value::from(vec![Value::Int(1), Value::Int(2), Value::Int(3)]));
    }

    #[test]
    fn test_ym004_sort_incomparable() {
        let mixed = Value::from(vec![Value::Int(3), Value::from("a")]);
        assert!(call("sort", Path::new("/"), vec![mixed]).is_err());
        assert!(call("sort", Path::new("/"), vec!["scalar".into()]).is_err());
    }

    #[test]
    fn test_ym004_exists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("here"), "").unwrap();
        assert_eq!(
            call("exists", dir.path(), vec!["here".into()]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            call("exists", dir.path(), vec![Value::from(vec!["here", "random.rnd"])]).unwrap(),
            Value::from(vec![true, false])
        );
    }

    #[test]
    fn test_ym004_path_parts() {
        let base = Path::new("/base");
        assert_eq!(call("stem", base, vec!["make.toml".into()]).unwrap(), Value::from("make"));
        assert_eq!(
            call("stem", base, vec![Value::from(vec!["make.toml", "path/to/file.txt"])]).unwrap(),
            Value::from(vec!["make", "file"])
        );
        assert_eq!(
            call("suffix", base, vec!["path/random_name.extension".into()]).unwrap(),
            Value::from(".extension")
        );
        assert_eq!(call("suffix", base, vec!["Makefile".into()]).unwrap(), Value::from(""));
        assert_eq!(
            call("name", base, vec!["path/random_name.extension".into()]).unwrap(),
            Value::from("random_name.extension")
        );
        assert_eq!(
            call("parent", base, vec!["path/to/file.txt".into()]).unwrap(),
            Value::from("/base/path/to")
        );
    }

    #[test]
    fn test_ym004_change_suffix_and_parent() {
        let base = Path::new("/base");
        assert_eq!(
            call("change_suffix", base, vec!["src/main.c".into(), ".o".into()]).unwrap(),
            Value::from("/base/src/main.o")
        );
        assert_eq!(
            call(
                "change_suffix",
                base,
                vec![Value::from(vec!["a.c", "b.c"]), ".o".into()]
            )
            .unwrap(),
            Value::from(vec!["/base/a.o", "/base/b.o"])
        );
        assert_eq!(
            call("change_parent", base, vec!["src/main.c".into(), "build".into()]).unwrap(),
            Value::from("/base/build/main.c")
        );
    }

    #[test]
    fn test_ym004_pwd() {
        assert_eq!(call("pwd", Path::new("/base"), vec![]).unwrap(), Value::from("/base"));
        assert!(call("pwd", Path::new("/base"), vec!["x".into()]).is_err());
    }

    #[test]
    fn test_ym004_filter_out() {
        let out = call(
            "filter_out",
            Path::new("/"),
            vec!["b".into(), Value::from(vec!["a", "b", "c", "b"])],
        )
        .unwrap();
        assert_eq!(out, Value::from(vec!["a", "c"]));
    }

    #[test]
    fn test_ym004_ternary_if() {
        let base = Path::new("/");
        assert_eq!(
            call("ternary_if", base, vec![Value::Bool(true), "yes".into(), "no".into()]).unwrap(),
            Value::from("yes")
        );
        assert_eq!(
            call("ternary_if", base, vec![Value::Bool(false), "yes".into(), "no".into()]).unwrap(),
            Value::from("no")
        );
        assert_eq!(
            call("ternary_if", base, vec!["".into(), "yes".into(), "no".into()]).unwrap(),
            Value::from("no")
        );
    }

    #[test]
    fn test_ym004_substitute() {
        let base = Path::new("/");
        assert_eq!(
            call("sub", base, vec![".c".into(), ".o".into(), "main.c".into()]).unwrap(),
            Value::from("main.o")
        );
        assert_eq!(
            call(
                "sub",
                base,
                vec![".c".into(), ".o".into(), Value::from(vec!["a.c", "b.c"])]
            )
            .unwrap(),
            Value::from(vec!["a.o", "b.o"])
        );
    }

    #[test]
    fn test_ym004_merge() {
        let out = call(
            "merge",
            Path::new("/"),
            vec![Value::from(vec!["a", "b"]), "c".into(), Value::from(vec!["d"])],
        )
        .unwrap();
        assert_eq!(out, Value::from(vec!["a", "b", "c", "d"]));
        assert!(call("merge", Path::new("/"), vec![]).is_err());
    }

    #[test]
    fn test_ym004_wrong_arity() {
        let err = call("sub", Path::new("/"), vec!["a".into()]).unwrap_err();
        assert!(err.to_string().contains("takes 3 argument(s), got 1"));
    }
}
