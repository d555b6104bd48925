use inventory_core::aggregation::AssetIdentity;
use inventory_core::resilience::RetryStrategy;
use proptest::prelude::*;
use proptest::strategy::Just;
use serde_json::{json, Value};

/// Small pools so generated identities collide often
pub fn ip_strategy() -> impl Strategy<Value = Option<String>> {
    prop::option::of(prop_oneof![
        Just("10.0.0.5".to_string()),
        Just("10.0.0.6".to_string()),
        Just("192.168.1.10".to_string()),
    ])
}

pub fn name_strategy() -> impl Strategy<Value = Option<String>> {
    prop::option::of(prop_oneof![
        Just("web-01".to_string()),
        Just("WEB-01".to_string()),
        Just("db-01".to_string()),
    ])
}

pub fn mac_strategy() -> impl Strategy<Value = Option<String>> {
    prop::option::of(prop_oneof![
        Just("aa:bb:cc:dd:ee:01".to_string()),
        Just("aa:bb:cc:dd:ee:02".to_string()),
    ])
}

pub fn unique_id_strategy() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[a-z]-[0-9]{1,2}")
}

pub fn identity_strategy() -> impl Strategy<Value = AssetIdentity> {
    (ip_strategy(), name_strategy(), mac_strategy(), unique_id_strategy()).prop_map(
        |(ip, name, mac, unique_id)| AssetIdentity {
            ip,
            name,
            mac,
            unique_id,
            ..Default::default()
        },
    )
}

/// Asset payload built from a generated identity
pub fn asset_strategy() -> impl Strategy<Value = Value> {
    identity_strategy().prop_map(|identity| {
        let mut asset = serde_json::Map::new();
        if let Some(ip) = identity.ip {
            asset.insert("ip_address".into(), json!(ip));
        }
        if let Some(name) = identity.name {
            asset.insert("name".into(), json!(name));
        }
        if let Some(mac) = identity.mac {
            asset.insert("mac_address".into(), json!(mac));
        }
        if let Some(id) = identity.unique_id {
            asset.insert("unique_id".into(), json!(id));
        }
        Value::Object(asset)
    })
}

pub fn growing_strategy() -> impl Strategy<Value = RetryStrategy> {
    prop_oneof![Just(RetryStrategy::Exponential), Just(RetryStrategy::Linear)]
}

pub fn any_strategy() -> impl Strategy<Value = RetryStrategy> {
    prop_oneof![
        Just(RetryStrategy::NoRetry),
        Just(RetryStrategy::Fixed),
        Just(RetryStrategy::Exponential),
        Just(RetryStrategy::Linear),
        Just(RetryStrategy::RandomJitter),
    ]
}
