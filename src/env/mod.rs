use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SessionError;

mod loader;
mod placeholders;

pub use loader::{gather_environment, load_env_file};
pub use placeholders::expand_placeholders;

/// Mutable key/value context used for templating, defaults and credentials.
///
/// Keys keep their insertion order so listings match the order sources were
/// merged in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Environment {
    values: Map<String, Value>,
}

/// Environment shared between concurrently running steps.
pub type SharedEnvironment = Arc<Mutex<Environment>>;

/// Locks a shared environment. Guards must not be held across `.await`.
pub fn lock(shared: &SharedEnvironment) -> MutexGuard<'_, Environment> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Previous values of keys that an iteration overwrote, used to put the
/// environment back once the iteration is over.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    saved: Vec<(String, Option<Value>)>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Value of `key` in its template form. Null counts as absent.
    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.values.get(key) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value_to_string(value)),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        !matches!(self.values.get(key), None | Some(Value::Null))
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn set_array(&mut self, key: impl Into<String>) {
        self.values.insert(key.into(), Value::Array(Vec::new()));
    }

    pub fn append(&mut self, key: &str, value: impl Into<Value>) -> Result<(), SessionError> {
        match self.values.get_mut(key) {
            Some(Value::Array(items)) => {
                items.push(value.into());
                Ok(())
            }
            _ => Err(SessionError::NotAnArray(key.to_string())),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Later values overwrite earlier ones.
    pub fn merge<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        for (key, value) in values {
            self.values.insert(key, value);
        }
    }

    /// Records the current value of every key in `keys` (absent ones included).
    pub fn snapshot<'a, I>(&self, keys: I) -> Snapshot
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut saved: Vec<(String, Option<Value>)> = Vec::new();
        for key in keys {
            if saved.iter().any(|(existing, _)| existing == key) {
                continue;
            }
            saved.push((key.clone(), self.values.get(key).cloned()));
        }
        Snapshot { saved }
    }

    /// Puts back every key recorded in `snapshot`, except those in `keep`.
    pub fn restore(&mut self, snapshot: Snapshot, keep: &[String]) {
        for (key, previous) in snapshot.saved {
            if keep.contains(&key) {
                continue;
            }
            match previous {
                Some(value) => {
                    self.values.insert(key, value);
                }
                None => {
                    self.values.remove(&key);
                }
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_shared(self) -> SharedEnvironment {
        Arc::new(Mutex::new(self))
    }
}

impl From<Map<String, Value>> for Environment {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

impl FromIterator<(String, Value)> for Environment {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        let mut env = Environment::new();
        env.merge(iter);
        env
    }
}

/// Strings are used raw, scalars via their display form, null as an empty
/// string and containers as compact JSON.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}
