use serde::Deserialize;

use super::{check_bool, check_integer, check_text, ParamError};

/// Query-string parameters exactly as received, repeated keys included
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "Vec<(String, String)>")]
pub struct RawParams {
    pairs: Vec<(String, String)>,
}

/// Outcome of reading the `dbg` flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugMode {
    /// No `dbg` in the request; `api.default_debug` decides
    Default,
    Off,
    On,
    /// The flag was present but not a boolean
    Invalid,
}

impl DebugMode {
    pub fn resolved(self) -> Self {
        self.resolved_with(crate::config::config().api.default_debug)
    }

    /// Only an absent flag follows the configured default
    pub fn resolved_with(self, default_on: bool) -> Self {
        match self {
            DebugMode::Default if default_on => DebugMode::On,
            DebugMode::Default => DebugMode::Off,
            other => other,
        }
    }
}

impl From<Vec<(String, String)>> for RawParams {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }
}

impl RawParams {
    pub fn new<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// First value for `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Present with a non-blank value
    pub fn is_supplied(&self, name: &str) -> bool {
        self.get(name).map(|v| !v.trim().is_empty()).unwrap_or(false)
    }

    pub fn integer(&self, name: &str) -> Result<Option<i64>, ParamError> {
        match self.non_blank(name) {
            Some(raw) => check_integer(raw).map(Some).map_err(|e| e.named(name)),
            None => Ok(None),
        }
    }

    pub fn boolean(&self, name: &str) -> Result<Option<bool>, ParamError> {
        match self.non_blank(name) {
            Some(raw) => check_bool(raw).map(Some).map_err(|e| e.named(name)),
            None => Ok(None),
        }
    }

    /// Blank values count as absent
    pub fn text(&self, name: &str, min: usize, max: usize) -> Result<Option<String>, ParamError> {
        match self.non_blank(name) {
            Some(raw) => check_text(raw, min, max).map(Some).map_err(|e| e.named(name)),
            None => Ok(None),
        }
    }

    /// Every occurrence of `name`, joined with commas. Blank occurrences are skipped.
    pub fn joined(&self, name: &str) -> Option<String> {
        let parts: Vec<&str> = self
            .get_all(name)
            .into_iter()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(","))
        }
    }

    pub fn debug_mode(&self) -> DebugMode {
        match self.get("dbg") {
            None => DebugMode::Default,
            Some(raw) => match check_bool(raw) {
                Ok(true) => DebugMode::On,
                Ok(false) => DebugMode::Off,
                Err(_) => DebugMode::Invalid,
            },
        }
    }

    fn non_blank(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|v| !v.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_are_absent() {
        let params = RawParams::new([("parent", " "), ("name", "")]);
        assert_eq!(params.integer("parent"), Ok(None));
        assert_eq!(params.text("name", 1, 100), Ok(None));
        assert!(!params.is_supplied("parent"));
    }

    #[test]
    fn typed_reads_name_the_parameter() {
        let params = RawParams::new([("parent", "abc")]);
        let err = params.integer("parent").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Value «abc» from parameter «&parent=abc» is not type of «integer»"
        );
    }

    #[test]
    fn repeated_keys_are_joined() {
        let params = RawParams::new([("filters", "type:==:1"), ("filters", "name:like:A")]);
        assert_eq!(params.joined("filters").as_deref(), Some("type:==:1,name:like:A"));
        assert_eq!(params.joined("order_by"), None);
    }

    #[test]
    fn debug_mode_distinguishes_invalid_values() {
        assert_eq!(RawParams::default().debug_mode(), DebugMode::Default);
        assert_eq!(RawParams::new([("dbg", "false")]).debug_mode(), DebugMode::Off);
        assert_eq!(RawParams::new([("dbg", "true")]).debug_mode(), DebugMode::On);
        assert_eq!(RawParams::new([("dbg", "nope")]).debug_mode(), DebugMode::Invalid);
    }

    #[test]
    fn explicit_dbg_false_overrides_configured_default() {
        assert_eq!(DebugMode::Off.resolved_with(true), DebugMode::Off);
        assert_eq!(DebugMode::Default.resolved_with(true), DebugMode::On);
        assert_eq!(DebugMode::Default.resolved_with(false), DebugMode::Off);
        assert_eq!(DebugMode::Invalid.resolved_with(true), DebugMode::Invalid);
    }
}
