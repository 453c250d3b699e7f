use alloc::string::String;

use serde::{Deserialize, Serialize};

use crate::macros::map;

map! {
  /// Query parameters attached to a request.
  ///
  /// Parameters keep their insertion order, which is also the order in
  /// which they are serialized.
  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  pub struct QueryParams(IndexMap<String, String, DefaultHashBuilder>);
}

impl QueryParams {
    /// Retrieves the value associated with the given key.
    #[must_use]
    #[inline]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

/// Appends the given query parameters to a path.
///
/// Parameters are serialized as `?k1=v1&k2=v2` in insertion order. An empty
/// collection leaves the path untouched.
#[must_use]
pub fn assemble_uri(path: &str, query: &QueryParams) -> String {
    let mut uri = String::from(path);

    for (index, (key, value)) in query.iter().enumerate() {
        uri.push(if index == 0 { '?' } else { '&' });
        uri.push_str(key);
        uri.push('=');
        uri.push_str(value);
    }

    uri
}
