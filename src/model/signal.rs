//! `ResumeSignal`: the external event delivered to a `Suspended` instance.

use serde::{Deserialize, Serialize};

use crate::model::JsonMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeSignal {
    pub signal_name: String,
    #[serde(default)]
    pub data: JsonMap,
}

impl ResumeSignal {
    pub fn new(signal_name: impl Into<String>) -> Self {
        Self {
            signal_name: signal_name.into(),
            data: JsonMap::new(),
        }
    }

    pub fn with_data(mut self, data: JsonMap) -> Self {
        self.data = data;
        self
    }

    /// Each entry in `data` lands in instance state as `signal_<key>`.
    pub fn state_entries(&self) -> impl Iterator<Item = (String, crate::expression::JsonValue)> + '_ {
        self.data
            .iter()
            .map(|(k, v)| (format!("signal_{k}"), v.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn state_entries_are_prefixed() {
        let mut data = JsonMap::new();
        data.insert("ok".into(), json!(true));
        let signal = ResumeSignal::new("approve").with_data(data);
        let entries: Vec<_> = signal.state_entries().collect();
        assert_eq!(entries, vec![("signal_ok".to_string(), json!(true))]);
    }
}
