use std::ops::{Deref, DerefMut};

use indexmap::IndexMap;
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize, Serializer};

use crate::serde::{deserialize_map_values, serialize_map_values};

pub trait GetKey {
    fn get_key(&self) -> &str;
}

pub(crate) trait IntoKeyedIndexMap<S> {
    fn into_keyed_index_map(self) -> IndexMap<String, S>;
}

impl<T: GetKey> IntoKeyedIndexMap<T> for Vec<T> {
    fn into_keyed_index_map(self) -> IndexMap<String, T> {
        self.into_iter()
            .map(|x| (x.get_key().to_string(), x))
            .collect()
    }
}

/// Documents keyed by id, stored on disk as a plain JSON array.
#[derive(Debug, Clone)]
pub struct Collection<T> {
    pub items: IndexMap<String, T>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            items: IndexMap::new(),
        }
    }
}

impl<T: GetKey> Collection<T> {
    /// Insert or replace a document under its own key.
    pub fn upsert(&mut self, item: T) {
        self.items.insert(item.get_key().to_string(), item);
    }
}

impl<T> Deref for Collection<T> {
    type Target = IndexMap<String, T>;

    fn deref(&self) -> &Self::Target {
        &self.items
    }
}

impl<T> DerefMut for Collection<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.items
    }
}

impl<T: Serialize> Serialize for Collection<T> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        serialize_map_values(&self.items, s)
    }
}

impl<'de, T: DeserializeOwned + GetKey> Deserialize<'de> for Collection<T> {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        deserialize_map_values(d).map(|items| Collection { items })
    }
}
