//! Record fragments and their storage keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::CoreError;
use crate::path::Path;
use crate::record::{self, PathRecord};

/// Address of one fragment: `<instance uuid>.<resource path>`, e.g.
/// `0b6c…e1.Device`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FragmentKey {
    pub instance: Uuid,
    pub resource: Path,
}

impl FragmentKey {
    pub fn new(instance: Uuid, resource: Path) -> Self {
        Self { instance, resource }
    }

    /// Fresh key with a random instance id.
    pub fn generate(resource: Path) -> Self {
        Self::new(Uuid::new_v4(), resource)
    }

    pub fn parse(text: &str) -> Result<Self, CoreError> {
        let (instance, resource) = text
            .split_once('.')
            .ok_or_else(|| CoreError::InvalidFragmentKey(text.to_string()))?;
        let resource = Path::parse(resource)?;
        if resource.is_root() {
            return Err(CoreError::InvalidFragmentKey(text.to_string()));
        }
        Ok(Self {
            instance: Uuid::parse_str(instance)?,
            resource,
        })
    }
}

impl fmt::Display for FragmentKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.instance, self.resource)
    }
}

impl FromStr for FragmentKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for FragmentKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FragmentKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        FragmentKey::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// One addressable subtree of the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub key: FragmentKey,
    #[serde(default = "empty_body")]
    pub body: Value,
}

fn empty_body() -> Value {
    Value::Object(Map::new())
}

impl Fragment {
    /// Empty fragment, as created on first access.
    pub fn empty(key: FragmentKey) -> Self {
        Self {
            key,
            body: empty_body(),
        }
    }

    pub fn with_body(key: FragmentKey, body: Value) -> Self {
        Self { key, body }
    }
}

impl PathRecord for Fragment {
    fn get(&self, path: &Path) -> Option<&Value> {
        record::lookup(&self.body, path.segments())
    }

    fn set(&mut self, path: &Path, value: Value) {
        *record::materialize(&mut self.body, path.segments()) = value;
    }

    fn delete_subtree(&mut self, path: &Path) -> bool {
        if path.is_root() {
            let had_content = !self.is_empty();
            self.body = empty_body();
            return had_content;
        }
        record::remove(&mut self.body, path.segments())
    }

    fn children(&self, prefix: &Path) -> Vec<Path> {
        record::child_paths(&self.body, prefix)
    }

    fn absolute_key(&self) -> &FragmentKey {
        &self.key
    }

    fn is_empty(&self) -> bool {
        match &self.body {
            Value::Null => true,
            Value::Object(map) => map.values().all(Value::is_null),
            _ => false,
        }
    }
}
