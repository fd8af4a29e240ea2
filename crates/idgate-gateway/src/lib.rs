//! idgate Gateway
//!
//! Public entry point of the client core. A [`Gateway`] resolves the target
//! tenant, reuses that tenant's executor, builds the tenant-scoped URL and
//! returns a [`NormalizedResult`](idgate_core::NormalizedResult).
//!
//! ```no_run
//! use idgate_gateway::{CallSpec, Gateway};
//!
//! # async fn run() -> idgate_core::Result<()> {
//! let gateway = Gateway::from_env()?;
//! let users = gateway
//!     .get(CallSpec::new("users").tenant("prod").paginated(Some(50)))
//!     .await?;
//! println!("{} users", users.items().len());
//! # Ok(())
//! # }
//! ```

pub mod call;
pub mod gateway;
pub mod organization;

pub use call::CallSpec;
pub use gateway::Gateway;
pub use reqwest::Method;
