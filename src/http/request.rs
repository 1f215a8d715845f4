//! Request construction
//!
//! Resolves a [`StepSpec`] against the base address into a concrete
//! request: absolute URL, percent-encoded query and serialized body.

use url::Url;

use crate::common::{Error, Result};
use crate::harness::spec::{Method, StepSpec};

/// Content type declared for JSON bodies
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A fully resolved request
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    /// Serialized JSON body, if the step carries one
    pub body: Option<Vec<u8>>,
    pub content_type: Option<&'static str>,
}

impl Request {
    /// Path and query, without scheme and host
    pub fn target(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }
}

/// Parse and check the harness's base address
///
/// The base may carry a path prefix (`http://host/api`) but no query or
/// fragment.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| Error::invalid_base_url(raw, e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(Error::invalid_base_url(
            raw,
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    if url.cannot_be_a_base() || url.host().is_none() {
        return Err(Error::invalid_base_url(raw, "missing host"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(Error::invalid_base_url(
            raw,
            "query strings and fragments are not allowed",
        ));
    }

    Ok(url)
}

/// Build the request for `spec` relative to `base`
pub fn build(spec: &StepSpec, base: &Url) -> Result<Request> {
    let segments = resolve_path(spec)?;

    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| Error::invalid_base_url(base.as_str(), "cannot be a base"))?
        .pop_if_empty()
        .extend(segments);

    // An empty `query_pairs_mut` still leaves a bare `?`, so only touch
    // the query when there is something to encode
    if !spec.query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in &spec.query {
            pairs.append_pair(name, &value.to_string());
        }
    }

    let body = spec
        .body
        .as_ref()
        .map(serde_json::to_vec)
        .transpose()?;
    let content_type = body.as_ref().map(|_| JSON_CONTENT_TYPE);

    Ok(Request {
        method: spec.method,
        url,
        body,
        content_type,
    })
}

/// Split the path template and substitute `{name}` placeholders
fn resolve_path(spec: &StepSpec) -> Result<Vec<String>> {
    let mut used = vec![false; spec.path_params.len()];
    let mut segments = Vec::new();

    for segment in spec.path.split('/').filter(|s| !s.is_empty()) {
        if let Some(name) = segment
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
        {
            let index = spec
                .path_params
                .iter()
                .position(|(param, _)| param == name)
                .ok_or_else(|| {
                    Error::invalid_step(&spec.name, format!("no value for placeholder '{{{}}}'", name))
                })?;
            let value = &spec.path_params[index].1;
            // The url crate drops dot segments, which would change the endpoint
            if value.is_empty() || value == "." || value == ".." {
                return Err(Error::invalid_step(
                    &spec.name,
                    format!("'{}' is not a valid value for placeholder '{{{}}}'", value, name),
                ));
            }
            used[index] = true;
            segments.push(value.clone());
        } else if segment.contains(['{', '}']) {
            return Err(Error::invalid_step(
                &spec.name,
                format!("malformed path segment '{}'", segment),
            ));
        } else {
            segments.push(segment.to_string());
        }
    }

    if let Some(index) = used.iter().position(|u| !u) {
        return Err(Error::invalid_step(
            &spec.name,
            format!("path parameter '{}' is not used by '{}'", spec.path_params[index].0, spec.path),
        ));
    }

    Ok(segments)
}
