//! A restricted Lua evaluator shared by the manifest store ([`crate::manifest`])
//! and the rockspec loader ([`crate::rockspec`]).
//!
//! Rockspecs and manifests are plain Lua scripts in the source ecosystem:
//! top-level statements assign global variables (`package = "xml"`,
//! `dependencies = {"lua >= 5.1"}`, …). This module evaluates such a script
//! in a fresh, sandboxed [`mlua::Lua`] instance — never reused across
//! evaluations, so no process-wide state can leak between rockspecs — and
//! converts the resulting global table into a closed, tagged-value tree
//! that rejects function values.

use std::collections::BTreeMap;

use mlua::{Lua, Value as LuaValue};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LuaEvalError {
    #[error("lua evaluation failed: {0}")]
    Lua(#[from] mlua::Error),
    #[error("function values are not permitted in rockspec/manifest tables (at '{0}')")]
    FunctionValue(String),
    #[error("userdata/thread values are not permitted in rockspec/manifest tables (at '{0}')")]
    UnsupportedValue(String),
}

/// A closed value tree: the only shapes a rockspec or manifest is allowed
/// to produce. No functions, userdata, or threads.
#[derive(Debug, Clone, PartialEq)]
pub enum TaggedValue {
    Nil,
    Bool(bool),
    Number(f64),
    Str(String),
    /// A Lua table indexed `1..n` contiguously is treated as a list.
    List(Vec<TaggedValue>),
    /// Any other table is treated as a string-keyed map, in insertion
    /// order as returned by `pairs` (best-effort; Lua does not guarantee
    /// table iteration order, so callers should not depend on it for
    /// semantics, only for display).
    Table(BTreeMap<String, TaggedValue>),
}

impl TaggedValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TaggedValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[TaggedValue]> {
        match self {
            TaggedValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&BTreeMap<String, TaggedValue>> {
        match self {
            TaggedValue::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&TaggedValue> {
        self.as_table().and_then(|t| t.get(key))
    }

    pub fn string_list(&self) -> Vec<String> {
        self.as_list()
            .map(|l| l.iter().filter_map(TaggedValue::as_str).map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// Strips a single leading `#!...` shebang line, as tolerated by the
/// reference rockspec/manifest loader.
pub fn strip_shebang(source: &str) -> &str {
    if let Some(rest) = source.strip_prefix("#!") {
        if let Some(idx) = rest.find('\n') {
            return &rest[idx + 1..];
        }
        return "";
    }
    source
}

/// Creates a fresh Lua VM with the globals that could mutate process-wide
/// state or perform I/O removed: `io`, `os`, `require`, `dofile`,
/// `loadfile`, `load` (which can construct new functions from strings, an
/// end-run around "no function values"), and `collectgarbage`.
fn sandboxed_lua() -> Result<Lua, mlua::Error> {
    let lua = Lua::new();
    {
        let globals = lua.globals();
        for name in ["io", "os", "require", "dofile", "loadfile", "load", "collectgarbage", "package"] {
            globals.set(name, LuaValue::Nil)?;
        }
    }
    Ok(lua)
}

/// Evaluates `source` as a rockspec/manifest body and returns its global
/// table as a [`TaggedValue::Table`]. Only the globals named in `fields`
/// are extracted (the rest of the sandboxed environment is discarded),
/// since rockspecs and manifests only ever read a closed, known set of
/// top-level names.
pub fn eval_globals(source: &str, fields: &[&str]) -> Result<BTreeMap<String, TaggedValue>, LuaEvalError> {
    let lua = sandboxed_lua()?;
    let body = strip_shebang(source);
    lua.load(body).exec()?;

    let globals = lua.globals();
    let mut result = BTreeMap::new();
    for &field in fields {
        let value: LuaValue = globals.get(field)?;
        if matches!(value, LuaValue::Nil) {
            continue;
        }
        result.insert(field.to_string(), to_tagged(value, field)?);
    }
    Ok(result)
}

fn to_tagged(value: LuaValue, path: &str) -> Result<TaggedValue, LuaEvalError> {
    match value {
        LuaValue::Nil => Ok(TaggedValue::Nil),
        LuaValue::Boolean(b) => Ok(TaggedValue::Bool(b)),
        LuaValue::Integer(i) => Ok(TaggedValue::Number(i as f64)),
        LuaValue::Number(n) => Ok(TaggedValue::Number(n)),
        LuaValue::String(s) => Ok(TaggedValue::Str(s.to_str()?.to_string())),
        LuaValue::Table(t) => {
            let len = t.raw_len();
            let is_array = len > 0
                && (1..=len).all(|i| !matches!(t.raw_get::<LuaValue>(i as i64).unwrap_or(LuaValue::Nil), LuaValue::Nil));
            if is_array {
                let mut list = Vec::with_capacity(len);
                for i in 1..=len {
                    let v: LuaValue = t.raw_get(i as i64)?;
                    list.push(to_tagged(v, &format!("{path}[{i}]"))?);
                }
                Ok(TaggedValue::List(list))
            } else {
                let mut map = BTreeMap::new();
                for pair in t.pairs::<LuaValue, LuaValue>() {
                    let (k, v) = pair?;
                    let key = match k {
                        LuaValue::String(s) => s.to_str()?.to_string(),
                        LuaValue::Integer(i) => i.to_string(),
                        LuaValue::Number(n) => n.to_string(),
                        other => {
                            return Err(LuaEvalError::UnsupportedValue(format!(
                                "{path}<non-string key {other:?}>"
                            )))
                        }
                    };
                    let child_path = format!("{path}.{key}");
                    map.insert(key, to_tagged(v, &child_path)?);
                }
                Ok(TaggedValue::Table(map))
            }
        }
        LuaValue::Function(_) => Err(LuaEvalError::FunctionValue(path.to_string())),
        LuaValue::UserData(_) | LuaValue::Thread(_) | LuaValue::LightUserData(_) | LuaValue::Error(_) => {
            Err(LuaEvalError::UnsupportedValue(path.to_string()))
        }
        _ => Err(LuaEvalError::UnsupportedValue(path.to_string())),
    }
}
