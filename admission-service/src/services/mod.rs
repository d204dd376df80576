//! External collaborators of the admission pipeline.
//!
//! Each collaborator is a trait so deployments can swap in remote
//! implementations; the in-process ones here back the binary and the tests.

pub mod fraud;
pub mod security;

pub use fraud::{AuditLogFraudAnalytics, FraudAnalytics, FraudEvent, RecordingFraudAnalytics};
pub use security::{DomainType, LocalSecurityProvider, SecurityError, SecurityProvider};
