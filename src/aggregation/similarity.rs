//! Asset identity extraction and pairwise similarity scoring.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const IP_WEIGHT: f64 = 0.4;
pub const NAME_WEIGHT: f64 = 0.3;
pub const MAC_WEIGHT: f64 = 0.2;
pub const UNIQUE_ID_WEIGHT: f64 = 0.1;

const IP_FIELDS: &[&str] = &[
    "ip_address",
    "private_ip",
    "private_ip_address",
    "primary_ip",
    "ip",
];
const NAME_FIELDS: &[&str] = &["name", "hostname"];
const MAC_FIELDS: &[&str] = &["mac_address", "mac"];
const UNIQUE_ID_FIELDS: &[&str] = &["unique_id", "id", "resource_id"];
const SERVICE_FIELDS: &[&str] = &["service", "service_name"];
const PORT_FIELDS: &[&str] = &["port"];

/// Identity-relevant fields pulled out of an adapter asset payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetIdentity {
    pub ip: Option<String>,
    pub name: Option<String>,
    pub mac: Option<String>,
    pub unique_id: Option<String>,
    pub service: Option<String>,
    pub port: Option<u64>,
}

impl AssetIdentity {
    pub fn from_value(payload: &Value) -> Self {
        Self {
            ip: first_string(payload, IP_FIELDS),
            name: first_string(payload, NAME_FIELDS),
            mac: first_string(payload, MAC_FIELDS),
            unique_id: first_string(payload, UNIQUE_ID_FIELDS),
            service: first_string(payload, SERVICE_FIELDS),
            port: PORT_FIELDS
                .iter()
                .filter_map(|field| payload.get(*field))
                .find_map(|value| match value {
                    Value::Number(n) => n.as_u64(),
                    Value::String(s) => s.trim().parse().ok(),
                    _ => None,
                }),
        }
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_mac(mut self, mac: impl Into<String>) -> Self {
        self.mac = Some(mac.into());
        self
    }

    pub fn with_unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }

    /// Whether the asset carries any field usable for matching
    pub fn is_identifiable(&self) -> bool {
        self.ip.is_some() || self.name.is_some() || self.mac.is_some() || self.unique_id.is_some()
    }
}

fn first_string(payload: &Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|field| payload.get(*field))
        .find_map(|value| match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// Weighted identity overlap in `0.0..=1.0`.
///
/// Each of ip (exact), name (case-insensitive), mac (exact) and unique id (exact)
/// contributes its weight when it matches. The sum is normalized by the weights of
/// the fields present on both sides, so agreement on every comparable field scores
/// 1.0. Assets with no comparable field score 0.0.
pub fn similarity_score(a: &AssetIdentity, b: &AssetIdentity) -> f64 {
    let mut matched = 0.0;
    let mut comparable = 0.0;

    let mut compare = |left: &Option<String>, right: &Option<String>, weight: f64, fold: bool| {
        if let (Some(left), Some(right)) = (left, right) {
            comparable += weight;
            let equal = if fold {
                left.to_lowercase() == right.to_lowercase()
            } else {
                left == right
            };
            if equal {
                matched += weight;
            }
        }
    };

    compare(&a.ip, &b.ip, IP_WEIGHT, false);
    compare(&a.name, &b.name, NAME_WEIGHT, true);
    compare(&a.mac, &b.mac, MAC_WEIGHT, false);
    compare(&a.unique_id, &b.unique_id, UNIQUE_ID_WEIGHT, false);

    if comparable <= 0.0 {
        0.0
    } else {
        (matched / comparable).min(1.0)
    }
}
