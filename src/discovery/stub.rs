//! Callable service stub assembled from a discovery document.

use anyhow::{Context, Result, bail};
use log::debug;
use reqwest::{Method, Url};
use serde_json::Value;
use std::collections::HashMap;

/// Discovery document wire types (internal).
mod api {
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct DiscoveryDocument {
        pub base_url: String,
        #[serde(default)]
        pub resources: HashMap<String, Resource>,
    }

    #[derive(Deserialize, Debug)]
    pub struct Resource {
        #[serde(default)]
        pub methods: HashMap<String, Method>,
        #[serde(default)]
        pub resources: HashMap<String, Resource>,
    }

    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct Method {
        pub id: String,
        pub path: String,
        pub http_method: String,
    }
}

#[derive(Debug, Clone)]
struct MethodSpec {
    http_method: Method,
    path: String,
}

/// A prepared-but-not-yet-sent RPC call. Consumed by the request executor.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method_id: String,
    pub http_method: Method,
    pub url: String,
    pub body: Option<Value>,
}

/// The discovered RPC surface: method ids mapped to an HTTP verb and a
/// path template relative to the service base URL.
#[derive(Debug, Clone)]
pub struct ServiceStub {
    base_url: String,
    methods: HashMap<String, MethodSpec>,
}

impl ServiceStub {
    pub(crate) fn from_document(document: Value) -> Result<Self> {
        let document: api::DiscoveryDocument =
            serde_json::from_value(document).context("Invalid discovery document")?;

        let mut methods = HashMap::new();
        for resource in document.resources.values() {
            flatten_resource(resource, &mut methods)?;
        }
        debug!("Discovered {} callable methods", methods.len());

        Ok(Self {
            base_url: document.base_url,
            methods,
        })
    }

    /// Prepares a request for a method id, binding path parameters and an
    /// optional JSON body. Parameters not named in the path template are
    /// sent as query parameters.
    pub fn prepare(
        &self,
        method_id: &str,
        params: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<PreparedRequest> {
        let Some(spec) = self.methods.get(method_id) else {
            bail!("Unknown API method: {}", method_id);
        };

        let mut path = spec.path.clone();
        let mut query = Vec::new();
        for (key, value) in params {
            let reserved = format!("{{+{}}}", key);
            let plain = format!("{{{}}}", key);
            if path.contains(&reserved) {
                path = path.replace(&reserved, value);
            } else if path.contains(&plain) {
                path = path.replace(&plain, value);
            } else {
                query.push((*key, *value));
            }
        }
        if path.contains('{') {
            bail!("Unbound parameter in path template: {}", path);
        }

        let mut url = Url::parse(&format!("{}{}", self.base_url, path))
            .with_context(|| format!("Invalid request URL for {}", method_id))?;
        for (key, value) in query {
            url.query_pairs_mut().append_pair(key, value);
        }

        Ok(PreparedRequest {
            method_id: method_id.to_string(),
            http_method: spec.http_method.clone(),
            url: url.to_string(),
            body,
        })
    }
}

fn flatten_resource(
    resource: &api::Resource,
    methods: &mut HashMap<String, MethodSpec>,
) -> Result<()> {
    for method in resource.methods.values() {
        let http_method = Method::from_bytes(method.http_method.as_bytes())
            .with_context(|| format!("Invalid HTTP method for {}", method.id))?;
        methods.insert(
            method.id.clone(),
            MethodSpec {
                http_method,
                path: method.path.clone(),
            },
        );
    }
    for nested in resource.resources.values() {
        flatten_resource(nested, methods)?;
    }
    Ok(())
}
