//! Typed metric-set key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KarError;

/// Identifies one logical counter source (one disk, one CPU, ...).
///
/// Keys order by module, then numeric instance, then name, so `cpu:2:sys`
/// sorts before `cpu:10:sys`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MetricKey {
    pub module: String,
    pub instance: u32,
    pub name: String,
}

impl MetricKey {
    pub fn new(module: impl Into<String>, instance: u32, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            instance,
            name: name.into(),
        }
    }

    /// Key of the per-host miscellaneous set carrying boot time and load.
    pub fn system_misc() -> Self {
        Self::new("unix", 0, "system_misc")
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.module, self.instance, self.name)
    }
}

impl FromStr for MetricKey {
    type Err = KarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let [module, instance, name] = parts.as_slice() else {
            return Err(KarError::Parse(format!(
                "metric key '{}' must be module:instance:name",
                s
            )));
        };
        let instance = instance
            .parse::<u32>()
            .map_err(|e| KarError::Parse(format!("metric key '{}': instance {}", s, e)))?;
        Ok(Self::new(*module, instance, *name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let key: MetricKey = "sd:3:sd3".parse().unwrap();
        assert_eq!(key, MetricKey::new("sd", 3, "sd3"));
        assert_eq!(key.to_string(), "sd:3:sd3");
    }

    #[test]
    fn test_parse_rejects_bad_keys() {
        assert!("sd:3".parse::<MetricKey>().is_err());
        assert!("sd:x:sd3".parse::<MetricKey>().is_err());
        assert!("a:1:b:c".parse::<MetricKey>().is_err());
    }

    #[test]
    fn test_ordering_is_numeric_on_instance() {
        let mut keys = vec![
            MetricKey::new("cpu", 10, "sys"),
            MetricKey::new("cpu", 2, "sys"),
            MetricKey::new("cpu", 2, "vm"),
        ];
        keys.sort();
        assert_eq!(keys[0], MetricKey::new("cpu", 2, "sys"));
        assert_eq!(keys[1], MetricKey::new("cpu", 2, "vm"));
        assert_eq!(keys[2], MetricKey::new("cpu", 10, "sys"));
    }

    #[test]
    fn test_components_do_not_collide() {
        // "a:1:b" built from different components must not compare equal.
        let a = MetricKey::new("a:1", 0, "b");
        let b = MetricKey::new("a", 1, "b");
        assert_ne!(a, b);
    }
}
