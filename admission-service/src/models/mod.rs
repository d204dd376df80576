//! Request-scoped value objects.

mod auth_request;
mod identity;

pub use auth_request::{
    AuthKind, AuthRequest, BioBlock, BioData, DigitalId, RequestBody, RequestedAuth,
};
pub use identity::{FilterProperties, IdentityData, IdentityInfo};
