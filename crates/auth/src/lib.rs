//! `learnhub-auth`: pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: it knows how to
//! validate identity tokens and how to decide whether a role may perform an
//! action, nothing more.

pub mod authorize;
pub mod capability;
pub mod claims;
pub mod identity;
pub mod roles;

pub use authorize::{AuthzError, authorize, require_role};
pub use capability::{Action, Decision, Ownership, decide};
pub use claims::{Hs256JwtValidator, IdentityClaims, JwtValidator, TokenValidationError, validate_claims};
pub use identity::IdentityId;
pub use roles::Role;
