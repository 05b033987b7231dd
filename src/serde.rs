use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::collections::{GetKey, IntoKeyedIndexMap};

/// Query-string helper: `?status=` behaves like an absent parameter.
pub fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.trim().is_empty()))
}

pub fn serialize_map_values<S: Serializer, K, V: Serialize>(
    map: &IndexMap<K, V>,
    s: S,
) -> Result<S::Ok, S::Error> {
    s.collect_seq(map.values())
}

pub fn deserialize_map_values<'de, D, T: GetKey>(
    d: D,
) -> Result<IndexMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let data = <Vec<T>>::deserialize(d)?;
    Ok(data.into_keyed_index_map())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Query {
        #[serde(default, deserialize_with = "empty_as_none")]
        status: Option<String>,
    }

    #[test]
    fn test_empty_as_none() {
        let q: Query = serde_json::from_str(r#"{"status":""}"#).unwrap();
        assert_eq!(q.status, None);
        let q: Query = serde_json::from_str(r#"{"status":"  "}"#).unwrap();
        assert_eq!(q.status, None);
        let q: Query = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(q.status, None);
        let q: Query = serde_json::from_str(r#"{"status":"active"}"#).unwrap();
        assert_eq!(q.status.as_deref(), Some("active"));
    }
}
