//! Gateway orchestrator

use dashmap::DashMap;
use idgate_config_env::{EnvironmentRegistry, ProcessEnv, SettingsSource};
use idgate_core::normalized::{normalize_list, normalize_single};
use idgate_core::{Error, NormalizedResult, Result, TenantConfig, TenantSummary};
use idgate_egress::executor::QueryParams;
use idgate_egress::pagination::DEFAULT_MAX_PAGES;
use idgate_egress::{
    HttpClientConfig, PageStream, RateLimiter, RequestExecutor, RetryPolicy, TokenCache,
    create_client,
};
use idgate_observability::ClientMetrics;
use reqwest::{Client, Method};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

use crate::call::{CallSpec, has_param, set_param};

/// Multi-tenant API gateway.
///
/// Owns the shared rate limiter, one HTTP client and one executor per
/// tenant id. Executors (and their token caches) are created on first use
/// and kept for the gateway's lifetime. Share a gateway through `Arc`.
pub struct Gateway {
    registry: EnvironmentRegistry,
    client: Client,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
    metrics: ClientMetrics,
    executors: DashMap<String, Arc<RequestExecutor>>,
}

impl Gateway {
    /// Build a gateway over a validated registry
    pub fn new(registry: EnvironmentRegistry) -> Result<Self> {
        let metrics = ClientMetrics::new()
            .map_err(|e| Error::Internal(format!("Failed to create metrics: {}", e)))?;
        Self::with_metrics(registry, metrics)
    }

    /// Build a gateway that records into existing metrics
    pub fn with_metrics(registry: EnvironmentRegistry, metrics: ClientMetrics) -> Result<Self> {
        let global = registry.global();
        let client = create_client(&HttpClientConfig::with_timeout(global.request_timeout))?;
        let limiter =
            Arc::new(RateLimiter::new(global.rate_limit).with_metrics(metrics.clone()));
        let policy = RetryPolicy::new(global.max_retries);

        info!(
            region = %global.region,
            tenants = registry.tenants().len(),
            rate_limit = global.rate_limit,
            max_retries = global.max_retries,
            "Gateway initialized"
        );

        Ok(Self {
            registry,
            client,
            limiter,
            policy,
            metrics,
            executors: DashMap::new(),
        })
    }

    /// Load settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_source(&ProcessEnv)
    }

    pub fn from_source(source: &dyn SettingsSource) -> Result<Self> {
        Self::new(EnvironmentRegistry::load(source)?)
    }

    /// Replace the retry policy; `max_retries` is kept from the settings
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = RetryPolicy {
            max_retries: self.registry.global().max_retries,
            ..policy
        };
        self.executors.clear();
        self
    }

    pub fn registry(&self) -> &EnvironmentRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &ClientMetrics {
        &self.metrics
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Configured tenants, for introspection
    pub fn list_tenants(&self) -> Vec<TenantSummary> {
        self.registry.list_tenants()
    }

    /// Perform a call against a tenant.
    ///
    /// # Errors
    /// - `Error::TenantNotFound` before any network I/O
    /// - `Error::RemoteApi` when the final response is not 2xx
    /// - `Error::Auth` / `Error::Transport` from the executor
    #[instrument(skip(self, spec), fields(endpoint = %spec.endpoint, tenant))]
    pub async fn call(&self, method: Method, spec: CallSpec) -> Result<NormalizedResult> {
        let tenant = self.registry.resolve(spec.tenant.as_deref().unwrap_or(""))?;
        tracing::Span::current().record("tenant", tenant.name.as_str());

        let executor = self.executor_for(tenant);
        let url = self.tenant_url(tenant, &spec.endpoint);

        let paginated = spec.is_paginated(&method);
        let mut params = spec.params;
        if paginated {
            self.apply_page_size(&mut params, spec.page_size);
        }

        let response = executor
            .execute(method, &url, &params, spec.body.as_ref())
            .await?;

        if !response.is_success() {
            error!(status = response.status, "API request failed");
            return Err(response.into_error().into());
        }

        let body = response.json()?;
        let result = if paginated {
            normalize_list(&body)
        } else {
            normalize_single(&body)
        };
        Ok(result.with_tenant(tenant.context()))
    }

    /// GET; paginated unless the call spec opts out with `single()`
    pub async fn get(&self, spec: CallSpec) -> Result<NormalizedResult> {
        self.call(Method::GET, spec).await
    }

    pub async fn post(&self, spec: CallSpec) -> Result<NormalizedResult> {
        self.call(Method::POST, spec).await
    }

    pub async fn put(&self, spec: CallSpec) -> Result<NormalizedResult> {
        self.call(Method::PUT, spec).await
    }

    pub async fn delete(&self, spec: CallSpec) -> Result<NormalizedResult> {
        self.call(Method::DELETE, spec).await
    }

    /// Lazily walk every page of a tenant collection.
    ///
    /// The first request carries `params` plus the default page size;
    /// traversal stops after `max_pages` pages (100 when `None`).
    pub fn pages(
        &self,
        endpoint: &str,
        tenant: Option<&str>,
        params: QueryParams,
        max_pages: Option<usize>,
    ) -> Result<PageStream> {
        let tenant = self.registry.resolve(tenant.unwrap_or(""))?;
        let executor = self.executor_for(tenant);
        let url = self.tenant_url(tenant, endpoint);

        let mut params = params;
        self.apply_page_size(&mut params, None);

        Ok(PageStream::new(
            executor,
            url,
            params,
            max_pages.unwrap_or(DEFAULT_MAX_PAGES),
        ))
    }

    /// Whether an authenticated call to the tenant root succeeds.
    ///
    /// Every failure, including an unknown tenant, reports `false`.
    pub async fn health_check(&self, tenant: Option<&str>) -> bool {
        let mut spec = CallSpec::new("").single();
        if let Some(tenant) = tenant {
            spec = spec.tenant(tenant);
        }

        match self.get(spec).await {
            Ok(result) => result.success,
            Err(e) => {
                error!(tenant = tenant.unwrap_or(""), error = %e, "Health check failed");
                false
            }
        }
    }

    pub(crate) fn executor_for(&self, tenant: &TenantConfig) -> Arc<RequestExecutor> {
        self.executors
            .entry(tenant.id.clone())
            .or_insert_with(|| {
                debug!(tenant = %tenant.name, "Creating executor");
                let global = self.registry.global();
                let token_cache =
                    TokenCache::new(self.client.clone(), global.auth_base_url(), tenant)
                        .with_metrics(self.metrics.clone());
                Arc::new(
                    RequestExecutor::new(
                        self.client.clone(),
                        token_cache,
                        self.limiter.clone(),
                        self.policy.clone(),
                        global.request_timeout,
                    )
                    .with_metrics(self.metrics.clone()),
                )
            })
            .value()
            .clone()
    }

    #[cfg(test)]
    pub(crate) fn executor_count(&self) -> usize {
        self.executors.len()
    }

    /// `{api_base}/v1/environments/{tenant_id}[/{endpoint}]`
    pub(crate) fn tenant_url(&self, tenant: &TenantConfig, endpoint: &str) -> String {
        let base = format!(
            "{}/v1/environments/{}",
            self.registry.global().api_base_url(),
            tenant.id
        );
        let endpoint = endpoint.trim_start_matches('/');
        if endpoint.is_empty() {
            base
        } else {
            format!("{}/{}", base, endpoint)
        }
    }

    /// Set `limit` from an explicit page size, or default it when absent
    pub(crate) fn apply_page_size(&self, params: &mut QueryParams, page_size: Option<u32>) {
        let global = self.registry.global();
        match page_size {
            Some(size) => {
                let limit = size.clamp(1, global.max_page_size);
                set_param(params, "limit".to_string(), limit.to_string());
            }
            None if !has_param(params, "limit") => {
                let limit = global.default_page_size.min(global.max_page_size);
                set_param(params, "limit".to_string(), limit.to_string());
            }
            None => {}
        }
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("registry", &self.registry)
            .field("policy", &self.policy)
            .field("executors", &self.executors.len())
            .finish_non_exhaustive()
    }
}
