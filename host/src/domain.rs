use serde::{Deserialize, Serialize};
use std::fmt;

/// canonical node identifier, always `NODE` followed by digits
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// normalize a raw node label as typed on the field gateway
    ///
    /// the label is uppercased and stripped of everything that is not an ascii
    /// letter or digit, then reduced to `NODE` + the first run of digits.
    /// labels without any digit are rejected.
    ///
    /// `"nodo-07!!"`, `"NODO 07"` and `"NODE07"` all become `NODE07`.
    pub fn normalize(raw: &str) -> Option<Self> {
        let cleaned: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        let digits: String = cleaned
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();

        if digits.is_empty() {
            return None;
        }
        Some(Self(format!("NODE{}", digits)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// one parsed measurement set for one node, taken from one frame section
///
/// `None` means the field was not present in the frame (or did not parse),
/// which is different from a reported zero. gps fields are never absent,
/// they default to zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub node: NodeId,
    /// battery voltage in volts, a reported 0 is stored as None
    pub battery_voltage: Option<f64>,
    /// water temperature in celsius
    pub temperature: Option<f64>,
    pub ph: Option<f64>,
    /// electrical conductivity
    pub conductivity: Option<f64>,
    /// dissolved oxygen in mg/L
    pub dissolved_oxygen: Option<f64>,
    pub latitude: f64,
    pub longitude: f64,
    pub satellites: u32,
}

impl Reading {
    /// empty reading for a node, every measurement absent and gps zeroed
    pub fn empty(node: NodeId) -> Self {
        Self {
            node,
            battery_voltage: None,
            temperature: None,
            ph: None,
            conductivity: None,
            dissolved_oxygen: None,
            latitude: 0.0,
            longitude: 0.0,
            satellites: 0,
        }
    }
}

/// the hub's current belief about one node
///
/// this is also the record handed to live viewers, the field names are
/// part of that contract.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub node: NodeId,
    pub battery_voltage: Option<f64>,
    /// coarse state of charge derived from `battery_voltage`
    pub battery_percent: Option<u8>,
    pub temperature: Option<f64>,
    pub ph: Option<f64>,
    pub conductivity: Option<f64>,
    pub dissolved_oxygen: Option<f64>,
    pub latitude: f64,
    pub longitude: f64,
    pub satellites: u32,
    /// local wall clock of the last merge, display form (e.g. "10/18/2026, 3:05 PM")
    pub observed_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_labels_with_same_digits() {
        let a = NodeId::normalize("nodo-07!!").unwrap();
        let b = NodeId::normalize("NODO 07").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "NODE07");
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["nodo 3", "Node-12b", "  n0d0 99 ", "gw7-node42"] {
            let once = NodeId::normalize(raw).unwrap();
            let twice = NodeId::normalize(once.as_str()).unwrap();
            assert_eq!(once, twice, "label {raw:?}");
        }
    }

    #[test]
    fn normalize_takes_first_digit_run() {
        assert_eq!(NodeId::normalize("gw7-node42").unwrap().as_str(), "NODE7");
        // leading zeros are kept, "07" and "7" are different nodes
        assert_eq!(NodeId::normalize("nodo 007").unwrap().as_str(), "NODE007");
    }

    #[test]
    fn normalize_rejects_labels_without_digits() {
        assert!(NodeId::normalize("nodo").is_none());
        assert!(NodeId::normalize("").is_none());
        assert!(NodeId::normalize("--!!--").is_none());
    }

    #[test]
    fn snapshot_serializes_with_viewer_field_names() {
        let snap = Snapshot {
            node: NodeId::normalize("nodo 1").unwrap(),
            battery_voltage: Some(3.9),
            battery_percent: Some(60),
            temperature: None,
            ph: Some(7.0),
            conductivity: None,
            dissolved_oxygen: None,
            latitude: 1.5,
            longitude: -2.5,
            satellites: 4,
            observed_at: "10/18/2026, 3:05 PM".to_string(),
        };
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["node"], "NODE1");
        assert_eq!(json["battery_percent"], 60);
        assert!(json["temperature"].is_null());
        assert_eq!(json["satellites"], 4);
        assert_eq!(json["observed_at"], "10/18/2026, 3:05 PM");
    }
}
