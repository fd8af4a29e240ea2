//! idgate Core Types
//!
//! This crate provides the fundamental types shared by every idgate crate:
//! - Core error taxonomy
//! - Tenant records and tenant context
//! - The normalized response envelope and the extractors that build it
//! - Dotted-path field projection

pub mod error;
pub mod normalized;
pub mod projection;
pub mod tenant;

pub use error::{Error, Result};
pub use normalized::{ErrorInfo, NormalizedResult, Pagination};
pub use tenant::{TenantConfig, TenantContext, TenantSummary};
