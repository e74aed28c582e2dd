use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

/// One controlled-vocabulary value as stored in a fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Coding {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub version: Option<String>,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub display: Option<String>,
}

impl Coding {
    /// Read a coding object from a record node. Anything without a string
    /// `code` is not a coding.
    pub fn from_value(value: &Value) -> Option<Self> {
        let coding: Coding = serde_json::from_value(value.clone()).ok()?;
        if coding.code.is_empty() {
            return None;
        }
        Some(coding)
    }

    pub fn to_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        if let Some(system) = &self.system {
            map.insert("system".into(), Value::String(system.clone()));
        }
        if let Some(version) = &self.version {
            map.insert("version".into(), Value::String(version.clone()));
        }
        map.insert("code".into(), Value::String(self.code.clone()));
        if let Some(display) = &self.display {
            map.insert("display".into(), Value::String(display.clone()));
        }
        Value::Object(map)
    }
}
