//! # Scout Exchange
//!
//! Trades an ID.me access token for a Firebase custom token.
//!
//! The caller hands in the token ID.me issued at the end of its OAuth flow.
//! The exchange reads the caller's ID.me attributes and group status, makes
//! sure the matching Firebase account exists and carries the verification
//! claims, then returns a custom token the app signs in with.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use scout_clients::{IdentityToolkitClient, IdmeClient, ServiceConfig};
//! use scout_exchange::{ExchangeRequest, TokenExchange, VerificationPolicy};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ServiceConfig::from_env();
//! let exchange = TokenExchange::new(
//!     Arc::new(IdmeClient::new(config.idme.clone(), config.timeout())?),
//!     Arc::new(IdentityToolkitClient::from_config(&config)?),
//!     VerificationPolicy::default(),
//! );
//!
//! let response = exchange
//!     .verify_and_issue_token(ExchangeRequest::new("idme-access-token"))
//!     .await?;
//! println!("{}", response.custom_token);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod exchange;
pub mod logger;
pub mod server;

pub use error::{CallableError, CallableErrorKind, CallableResult};
pub use exchange::{
    ExchangeRequest, ExchangeResponse, TokenExchange, VerificationPolicy, DEFAULT_RECOGNIZED_GROUP,
};
pub use server::{router, ServerConfig, CALLABLE_PATH};
