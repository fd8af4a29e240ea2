//! Description of one logical call

use idgate_egress::executor::QueryParams;
use reqwest::Method;
use serde_json::Value;

/// What to call and where.
///
/// `tenant` is a name or alias; `None` (or empty) targets the default
/// tenant. A paginated call gets a `limit` parameter and its response is
/// normalized as a list. Left unset, `paginated` follows the method: GET
/// is paginated, other methods are not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallSpec {
    pub endpoint: String,
    pub params: QueryParams,
    pub body: Option<Value>,
    pub tenant: Option<String>,
    pub paginated: Option<bool>,
    pub page_size: Option<u32>,
}

impl CallSpec {
    /// Call `endpoint`, relative to the tenant (e.g. `users/123`)
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Add a query parameter, replacing an earlier one with the same key
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        set_param(&mut self.params, key.into(), value.to_string());
        self
    }

    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        for (key, value) in params {
            set_param(&mut self.params, key.into(), value.to_string());
        }
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    /// Request a paginated list, optionally with an explicit page size
    pub fn paginated(mut self, page_size: Option<u32>) -> Self {
        self.paginated = Some(true);
        self.page_size = page_size;
        self
    }

    /// Request a single resource, even for GET
    pub fn single(mut self) -> Self {
        self.paginated = Some(false);
        self.page_size = None;
        self
    }

    /// Whether this call is paginated when sent with `method`
    pub fn is_paginated(&self, method: &Method) -> bool {
        self.paginated.unwrap_or(*method == Method::GET)
    }
}

pub(crate) fn set_param(params: &mut QueryParams, key: String, value: String) {
    match params.iter_mut().find(|(k, _)| *k == key) {
        Some(slot) => slot.1 = value,
        None => params.push((key, value)),
    }
}

pub(crate) fn has_param(params: &QueryParams, key: &str) -> bool {
    params.iter().any(|(k, _)| k == key)
}
