//! # Scout Authentication
//!
//! Building blocks for trading an ID.me verification for a Firebase
//! sign-in.
//!
//! ## Overview
//!
//! The scout-auth crate handles:
//! - **Claims**: verification claims stored on accounts and the Firebase
//!   custom-token payload
//! - **JWT**: custom-token signing and validation, service account
//!   assertions
//! - **ID.me**: attribute and group-status types, plus the
//!   `IdentityProviderClient` trait
//! - **Users**: account records and the `UserDirectory` trait
//!
//! ## Features
//!
//! - `jwt` (default): token signing using jsonwebtoken
//! - `memory` (default): in-memory `UserDirectory` for tests and local runs
//!
//! ## Usage
//!
//! ```rust,no_run
//! use scout_auth::{CustomTokenSigner, ServiceAccountKey, VerificationClaims};
//!
//! let key = ServiceAccountKey::from_file("service-account.json").unwrap();
//! let signer = CustomTokenSigner::from_service_account(&key).unwrap();
//!
//! let claims = VerificationClaims::verified("military").to_claims();
//! let token = signer.create_custom_token("some-uid", &claims).unwrap();
//! ```
//!
//! HTTP implementations of the traits live in `scout-clients`.

pub mod claims;
pub mod error;
pub mod idme;
#[cfg(feature = "jwt")]
pub mod jwt;
pub mod users;

// Re-export main types
pub use claims::{CustomClaims, CustomTokenClaims, VerificationClaims, FIREBASE_AUDIENCE};
pub use error::{AuthError, AuthResult};
pub use idme::{IdentityProviderClient, IdmeAttribute, IdmeProfile, IdmeStatus};
pub use users::{NewUser, UserDirectory, UserRecord};

#[cfg(feature = "jwt")]
pub use jwt::{CustomTokenSigner, JwtAlgorithm, ServiceAccountKey, SignerConfig};

#[cfg(feature = "memory")]
pub use users::MemoryUserDirectory;
