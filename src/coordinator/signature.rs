//! Request Signature Module
//!
//! Derives the deterministic key under which a request is cached and
//! coalesced.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// == Method ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            other => Err(format!("Unsupported method: {}", other)),
        }
    }
}

impl TryFrom<String> for Method {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// == Api Request ==
/// A logical request against the upstream API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiRequest {
    pub method: Method,
    pub endpoint: String,
    #[serde(default)]
    pub params: Value,
}

impl ApiRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            params: Value::Null,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Get, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Post, endpoint)
    }

    pub fn put(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Put, endpoint)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Delete, endpoint)
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    pub fn signature(&self) -> String {
        signature(self.method, &self.endpoint, &self.params)
    }
}

// == Signature ==
/// Pure function of method, endpoint and parameters.
///
/// Object keys are sorted recursively, so two requests whose parameters
/// differ only in property order share a signature. `null` and `{}` are
/// equivalent.
pub fn signature(method: Method, endpoint: &str, params: &Value) -> String {
    let endpoint = endpoint.trim();
    if is_empty_params(params) {
        return format!("{} {}", method, endpoint);
    }

    let mut canonical = String::new();
    write_canonical(params, &mut canonical);
    format!("{} {}?{}", method, endpoint, canonical)
}

fn is_empty_params(params: &Value) -> bool {
    match params {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            out.push('{');
            for (index, key) in keys.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                if let Some(inner) = map.get(key) {
                    write_canonical(inner, out);
                }
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_signature_without_params() {
        let request = ApiRequest::get("/items");
        assert_eq!(request.signature(), "GET /items");
        assert_eq!(
            ApiRequest::get("/items").with_params(json!({})).signature(),
            "GET /items"
        );
    }

    #[test]
    fn test_signature_is_order_independent() {
        let a = ApiRequest::get("/items").with_params(json!({"page": 2, "sort": "name"}));
        let b = ApiRequest::get("/items").with_params(json!({"sort": "name", "page": 2}));
        assert_eq!(a.signature(), b.signature());
        assert_eq!(a.signature(), r#"GET /items?{"page":2,"sort":"name"}"#);
    }

    #[test]
    fn test_signature_sorts_nested_objects() {
        let a = json!({"filter": {"status": "open", "owner": 7}, "ids": [3, 1]});
        let b = json!({"ids": [3, 1], "filter": {"owner": 7, "status": "open"}});
        assert_eq!(
            signature(Method::Get, "/forms", &a),
            signature(Method::Get, "/forms", &b)
        );
    }

    #[test]
    fn test_signature_distinguishes_requests() {
        let base = ApiRequest::get("/items").with_params(json!({"page": 1}));
        assert_ne!(
            base.signature(),
            ApiRequest::get("/items").with_params(json!({"page": 2})).signature()
        );
        assert_ne!(
            base.signature(),
            ApiRequest::post("/items").with_params(json!({"page": 1})).signature()
        );
        // Array order is significant
        assert_ne!(
            signature(Method::Get, "/x", &json!({"ids": [1, 2]})),
            signature(Method::Get, "/x", &json!({"ids": [2, 1]}))
        );
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("get".parse::<Method>(), Ok(Method::Get));
        assert_eq!("PATCH".parse::<Method>(), Ok(Method::Patch));
        assert!("TRACE".parse::<Method>().is_err());
    }

    #[test]
    fn test_request_deserialize() {
        let request: ApiRequest =
            serde_json::from_str(r#"{"method": "DELETE", "endpoint": "/items/4"}"#).unwrap();
        assert_eq!(request.method, Method::Delete);
        assert_eq!(request.params, Value::Null);
    }

    proptest! {
        // Rebuilding the parameter object in reverse insertion order never
        // changes the signature.
        #[test]
        fn prop_signature_ignores_property_order(
            pairs in prop::collection::btree_map("[a-z]{1,8}", any::<i32>(), 0..10)
        ) {
            let mut forward = serde_json::Map::new();
            for (key, value) in pairs.iter() {
                forward.insert(key.clone(), json!(value));
            }
            let mut reverse = serde_json::Map::new();
            for (key, value) in pairs.iter().rev() {
                reverse.insert(key.clone(), json!(value));
            }

            prop_assert_eq!(
                signature(Method::Get, "/items", &Value::Object(forward)),
                signature(Method::Get, "/items", &Value::Object(reverse))
            );
        }
    }
}
