//! # Scout Clients
//!
//! HTTP clients for the services the token exchange depends on.
//!
//! ## Overview
//!
//! - `IdmeClient`: ID.me attributes API, implements
//!   `scout_auth::IdentityProviderClient`
//! - `IdentityToolkitClient`: Firebase Auth admin API (account lookup,
//!   creation, custom claims) plus local custom-token signing, implements
//!   `scout_auth::UserDirectory`
//! - `ServiceAccountTokenSource`: OAuth2 access tokens for the service
//!   account
//! - `ServiceConfig`: endpoints, credentials and timeouts from the
//!   environment
//!
//! ## Usage
//!
//! ```rust,no_run
//! use scout_clients::{IdentityToolkitClient, IdmeClient, ServiceConfig};
//!
//! let config = ServiceConfig::from_env();
//! let idme = IdmeClient::new(config.idme.clone(), config.timeout()).unwrap();
//! let users = IdentityToolkitClient::from_config(&config).unwrap();
//! ```

pub mod config;
pub mod identity_toolkit;
pub mod idme;
pub mod token_source;

pub use config::{ConfigError, ServiceConfig, ServiceEndpoint};
pub use identity_toolkit::{IdentityToolkitClient, IdentityToolkitError};
pub use idme::{IdmeClient, IdmeError};
pub use token_source::{ServiceAccountTokenSource, TokenSourceError};
