//! Organization-level calls
//!
//! These address `{api_base}/v1/{endpoint}` instead of a tenant path and
//! authenticate with the default tenant's credentials. They are single
//! shot: no retry or backoff. They still take a rate-limiter token, and a
//! non-2xx answer comes back as a failed envelope (`HTTP_<status>`) rather
//! than an error.

use idgate_core::normalized::{normalize_list, normalize_single};
use idgate_core::{ErrorInfo, NormalizedResult, Result};
use reqwest::Method;
use tracing::{instrument, warn};

use crate::call::CallSpec;
use crate::gateway::Gateway;

impl Gateway {
    /// GET an organization-level endpoint.
    ///
    /// `spec.tenant` and `spec.body` are ignored. The result carries no
    /// tenant context.
    ///
    /// # Errors
    /// - `Error::Auth` if the default tenant can't authenticate
    /// - `Error::Transport` on timeout or connection failure
    #[instrument(skip(self, spec), fields(endpoint = %spec.endpoint))]
    pub async fn call_organization_level(&self, spec: CallSpec) -> Result<NormalizedResult> {
        let tenant = self.registry().default_tenant();
        let executor = self.executor_for(tenant);
        let url = self.organization_url(&spec.endpoint);

        // Single resource unless pagination is asked for explicitly
        let paginated = spec.paginated.unwrap_or(false);
        let mut params = spec.params;
        if paginated {
            self.apply_page_size(&mut params, spec.page_size);
        }

        let response = executor.execute_once(Method::GET, &url, &params).await?;

        if !response.is_success() {
            warn!(status = response.status, "Organization-level call failed");
            return Ok(NormalizedResult::failure(ErrorInfo {
                code: Some(format!("HTTP_{}", response.status)),
                message: Some(response.text()),
                details: Vec::new(),
                correlation_id: None,
            }));
        }

        let body = response.json()?;
        Ok(if paginated {
            normalize_list(&body)
        } else {
            normalize_single(&body)
        })
    }

    /// `{api_base}/v1/{endpoint}`
    fn organization_url(&self, endpoint: &str) -> String {
        format!(
            "{}/v1/{}",
            self.registry().global().api_base_url(),
            endpoint.trim_start_matches('/')
        )
    }
}
