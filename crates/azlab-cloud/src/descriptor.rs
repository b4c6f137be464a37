//! Resource descriptors
//!
//! A [`Descriptor`] is the last attribute snapshot of a cloud resource as
//! returned by a "show" command. It has no fixed schema; fields are read by
//! dotted path (`"Network.Endpoints.0.port"`), where numeric segments index
//! into arrays. A descriptor is only ever replaced as a whole.

use crate::error::{CloudError, Result};
use crate::runner::Reply;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Point-in-time attribute snapshot of a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    /// Raw attributes
    value: Value,

    /// When the snapshot was taken
    observed_at: DateTime<Utc>,
}

impl Default for Descriptor {
    fn default() -> Self {
        Self::new(Value::Null)
    }
}

impl Descriptor {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            observed_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a descriptor from a show reply. Text replies carry no
    /// attributes and yield an empty descriptor.
    pub fn from_reply(reply: &Reply) -> Self {
        match reply {
            Reply::Structured(v) => Self::new(v.clone()),
            Reply::Text(t) => {
                tracing::warn!("Show reply is not structured: {}", t.trim());
                Self::empty()
            }
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    pub fn is_empty(&self) -> bool {
        match &self.value {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }

    /// Look up a value by dotted path
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        path.split('.').try_fold(&self.value, |current, segment| {
            match current {
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                Value::Object(map) => map.get(segment),
                _ => None,
            }
        })
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.lookup(path).and_then(Value::as_str)
    }

    /// String field with a fallback for missing values
    pub fn get_str_or<'a>(&'a self, path: &str, default: &'a str) -> &'a str {
        self.get_str(path).unwrap_or(default)
    }

    /// Unsigned number, accepting numeric strings (`"8589935104"`)
    pub fn get_u64(&self, path: &str) -> Option<u64> {
        match self.lookup(path)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Boolean, accepting `"true"`/`"false"` strings
    pub fn get_bool(&self, path: &str) -> Option<bool> {
        match self.lookup(path)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_array(&self, path: &str) -> Option<&Vec<Value>> {
        self.lookup(path).and_then(Value::as_array)
    }

    /// Deserialize a nested value into a typed record
    pub fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Option<T> {
        self.lookup(path)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn require(&self, path: &str) -> Result<&Value> {
        self.lookup(path)
            .ok_or_else(|| CloudError::MissingField(path.to_string()))
    }

    pub fn require_str(&self, path: &str) -> Result<&str> {
        self.get_str(path)
            .ok_or_else(|| CloudError::MissingField(path.to_string()))
    }

    pub fn require_u64(&self, path: &str) -> Result<u64> {
        self.get_u64(path)
            .ok_or_else(|| CloudError::MissingField(path.to_string()))
    }
}

impl From<Value> for Descriptor {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vm() -> Descriptor {
        Descriptor::new(json!({
            "VMName": "wala680414cli",
            "InstanceSize": "Medium",
            "VirtualIPAddresses": [
                {"address": "13.68.1.2", "name": "wala", "isDnsProgrammed": true}
            ],
            "DataDisks": [
                {"name": "d0", "logicalDiskSizeInGB": 50},
                {"name": "d1", "logicalUnitNumber": 1, "logicalDiskSizeInGB": "100"}
            ],
            "Network": {
                "Endpoints": [{"name": "ssh", "port": 22, "localPort": 22}]
            }
        }))
    }

    #[test]
    fn test_lookup_nested_paths() {
        let d = vm();
        assert_eq!(d.get_str("VirtualIPAddresses.0.address"), Some("13.68.1.2"));
        assert_eq!(d.get_u64("Network.Endpoints.0.port"), Some(22));
        assert_eq!(d.get_u64("DataDisks.1.logicalDiskSizeInGB"), Some(100));
        assert_eq!(d.get_bool("VirtualIPAddresses.0.isDnsProgrammed"), Some(true));
        assert!(d.lookup("VirtualIPAddresses.1.address").is_none());
        assert!(d.lookup("VMName.0").is_none());
    }

    #[test]
    fn test_default_on_missing() {
        let d = vm();
        assert_eq!(d.get_str_or("Location", "unknown"), "unknown");
        assert_eq!(d.get_str_or("InstanceSize", "Small"), "Medium");
    }

    #[test]
    fn test_require_reports_path() {
        let d = Descriptor::empty();
        match d.require_str("VirtualIPAddresses.0.address") {
            Err(CloudError::MissingField(path)) => {
                assert_eq!(path, "VirtualIPAddresses.0.address")
            }
            other => panic!("Expected MissingField, got {:?}", other),
        }
    }

    #[test]
    fn test_from_text_reply_is_empty() {
        let d = Descriptor::from_reply(&Reply::Text("No VMs found".into()));
        assert!(d.is_empty());
        assert!(d.lookup("VMName").is_none());
    }

    #[test]
    fn test_typed_get() {
        #[derive(Deserialize)]
        struct Endpoint {
            name: String,
            port: u16,
        }

        let ep: Endpoint = vm().get("Network.Endpoints.0").unwrap();
        assert_eq!(ep.name, "ssh");
        assert_eq!(ep.port, 22);
    }
}
