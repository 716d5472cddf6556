//! Typed access to evaluated call arguments.

use indexmap::IndexMap;

use super::error::{InterpreterError, fail};
use super::value::Value;

/// Evaluated positional and keyword arguments of one call.
#[derive(Debug, Clone)]
pub(crate) struct Args {
    /// Function or method name used in messages.
    pub name: String,
    pub positional: Vec<Value>,
    pub kwargs: IndexMap<String, Value>,
}

type Result<T> = std::result::Result<T, InterpreterError>;

impl Args {
    pub(crate) fn new(
        name: impl Into<String>,
        positional: Vec<Value>,
        kwargs: IndexMap<String, Value>,
    ) -> Self {
        Self {
            name: name.into(),
            positional,
            kwargs,
        }
    }

    /// Whether any argument is or contains a disabler.
    pub(crate) fn has_disabler(&self) -> bool {
        self.positional.iter().any(Value::contains_disabler)
            || self.kwargs.values().any(Value::contains_disabler)
    }

    /// Flatten nested arrays in the positional arguments.
    pub(crate) fn flatten(&mut self) {
        self.positional = Value::flatten(std::mem::take(&mut self.positional));
    }

    pub(crate) fn expect_count(&self, min: usize, max: usize) -> Result<()> {
        let n = self.positional.len();
        if n < min || n > max {
            let want = if min == max {
                format!("exactly {min}")
            } else if max == usize::MAX {
                format!("at least {min}")
            } else {
                format!("between {min} and {max}")
            };
            return fail(format!(
                "{}() takes {want} positional arguments, but got {n}.",
                self.name
            ));
        }
        Ok(())
    }

    pub(crate) fn no_positional(&self) -> Result<()> {
        self.expect_count(0, 0)
    }

    fn wrong_pos(&self, idx: usize, value: &Value, expected: &str) -> InterpreterError {
        InterpreterError::msg(format!(
            "{} argument {} was of type \"{}\" but should have been \"{expected}\"",
            self.name,
            idx + 1,
            value.type_name()
        ))
    }

    fn wrong_kw(&self, key: &str, value: &Value, expected: &str) -> InterpreterError {
        InterpreterError::msg(format!(
            "{} keyword argument \"{key}\" was of type {} but should have been {expected}",
            self.name,
            value.type_name()
        ))
    }

    fn missing(&self, idx: usize) -> InterpreterError {
        InterpreterError::msg(format!(
            "{}() is missing positional argument {}",
            self.name,
            idx + 1
        ))
    }

    /// The positional argument at `idx`.
    pub(crate) fn at(&self, idx: usize) -> Result<&Value> {
        self.positional.get(idx).ok_or_else(|| self.missing(idx))
    }

    pub(crate) fn str_at(&self, idx: usize) -> Result<String> {
        match self.positional.get(idx) {
            Some(Value::Str(s)) => Ok(s.clone()),
            Some(other) => Err(self.wrong_pos(idx, other, "str")),
            None => Err(self.missing(idx)),
        }
    }

    pub(crate) fn opt_str_at(&self, idx: usize) -> Result<Option<String>> {
        if self.positional.len() > idx {
            self.str_at(idx).map(Some)
        } else {
            Ok(None)
        }
    }

    pub(crate) fn int_at(&self, idx: usize) -> Result<i64> {
        match self.positional.get(idx) {
            Some(Value::Int(i)) => Ok(*i),
            Some(other) => Err(self.wrong_pos(idx, other, "int")),
            None => Err(self.missing(idx)),
        }
    }

    pub(crate) fn bool_at(&self, idx: usize) -> Result<bool> {
        match self.positional.get(idx) {
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(self.wrong_pos(idx, other, "bool")),
            None => Err(self.missing(idx)),
        }
    }

    /// Positional arguments from `start` as strings.
    pub(crate) fn strs_from(&self, start: usize) -> Result<Vec<String>> {
        self.positional
            .iter()
            .enumerate()
            .skip(start)
            .map(|(idx, v)| match v {
                Value::Str(s) => Ok(s.clone()),
                other => Err(self.wrong_pos(idx, other, "str")),
            })
            .collect()
    }

    pub(crate) fn take(&mut self, key: &str) -> Option<Value> {
        self.kwargs.shift_remove(key)
    }

    pub(crate) fn has(&self, key: &str) -> bool {
        self.kwargs.contains_key(key)
    }

    pub(crate) fn bool(&mut self, key: &str, default: bool) -> Result<bool> {
        match self.take(key) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(b),
            Some(other) => Err(self.wrong_kw(key, &other, "bool")),
        }
    }

    pub(crate) fn int(&mut self, key: &str, default: i64) -> Result<i64> {
        match self.take(key) {
            None => Ok(default),
            Some(Value::Int(i)) => Ok(i),
            Some(other) => Err(self.wrong_kw(key, &other, "int")),
        }
    }

    pub(crate) fn str(&mut self, key: &str) -> Result<Option<String>> {
        match self.take(key) {
            None => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s)),
            Some(other) => Err(self.wrong_kw(key, &other, "str")),
        }
    }

    /// A string or array of strings.
    pub(crate) fn str_list(&mut self, key: &str) -> Result<Vec<String>> {
        let Some(value) = self.take(key) else {
            return Ok(Vec::new());
        };
        match value {
            Value::Str(s) => Ok(vec![s]),
            Value::Array(items) => Value::flatten(items)
                .into_iter()
                .map(|v| match v {
                    Value::Str(s) => Ok(s),
                    other => Err(self.wrong_kw(key, &other, "array[str]")),
                })
                .collect(),
            other => Err(self.wrong_kw(key, &other, "array[str]")),
        }
    }

    /// Any value or array of values, flattened.
    pub(crate) fn list(&mut self, key: &str) -> Vec<Value> {
        match self.take(key) {
            None => Vec::new(),
            Some(Value::Array(items)) => Value::flatten(items),
            Some(other) => vec![other],
        }
    }

    /// Reject keyword arguments that were not consumed.
    pub(crate) fn finish(&self) -> Result<()> {
        if self.kwargs.is_empty() {
            return Ok(());
        }
        let keys: Vec<_> = self.kwargs.keys().map(|k| format!("\"{k}\"")).collect();
        fail(format!(
            "{} got unknown keyword arguments {}",
            self.name,
            keys.join(", ")
        ))
    }

    /// Drop keyword arguments accepted for compatibility but not used.
    pub(crate) fn ignore(&mut self, keys: &[&str]) {
        for key in keys {
            self.kwargs.shift_remove(*key);
        }
    }
}
