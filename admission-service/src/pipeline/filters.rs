//! Partner and domain specific filters run after core validation.

use arc_swap::ArcSwap;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

use super::{AdmissionError, DecipheredRequest, Stage};
use crate::config::FilterSettings;
use crate::models::{AuthRequest, FilterProperties, IdentityData};

pub const DEVICE_PROVIDER_DENY_LIST: &str = "device-provider-deny-list";

/// Rejection raised by a filter. Code and message reach the partner as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct FilterError {
    pub code: String,
    pub message: String,
}

impl FilterError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

pub trait AuthFilter: Send + Sync {
    /// Stable identifier used to enable or disable the filter.
    fn id(&self) -> &str;

    fn validate(
        &self,
        request: &AuthRequest,
        identity_data: &IdentityData,
        properties: &FilterProperties,
    ) -> Result<(), FilterError>;
}

pub trait FilterRegistry: Send + Sync {
    /// Currently enabled filters in registration order.
    fn enabled_filters(&self) -> Vec<Arc<dyn AuthFilter>>;
}

/// Registry with a fixed set of filters and a swappable enabled-id set.
pub struct InMemoryFilterRegistry {
    filters: Vec<Arc<dyn AuthFilter>>,
    enabled: ArcSwap<HashSet<String>>,
}

impl Default for InMemoryFilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryFilterRegistry {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
            enabled: ArcSwap::from_pointee(HashSet::new()),
        }
    }

    /// Built-in filters, enabled per `settings.enabled`.
    pub fn from_settings(settings: &FilterSettings) -> Self {
        let registry = Self::new().register(DeviceProviderDenyListFilter::new(
            settings.denied_device_providers.clone(),
        ));
        registry.set_enabled(settings.enabled.iter().cloned());

        tracing::info!(
            registered = registry.filters.len(),
            enabled = ?settings.enabled,
            "Filter registry initialized"
        );
        registry
    }

    /// Append a filter. Registration order is execution order.
    pub fn register(mut self, filter: impl AuthFilter + 'static) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    pub fn enable(&self, id: &str) {
        if !self.is_registered(id) {
            tracing::warn!(filter = %id, "Enabling unregistered filter");
        }
        self.enabled.rcu(|current| {
            let mut next = HashSet::clone(current);
            next.insert(id.to_string());
            next
        });
    }

    pub fn disable(&self, id: &str) {
        self.enabled.rcu(|current| {
            let mut next = HashSet::clone(current);
            next.remove(id);
            next
        });
    }

    /// Replace the whole enabled set.
    pub fn set_enabled(&self, ids: impl IntoIterator<Item = String>) {
        self.enabled.store(Arc::new(ids.into_iter().collect()));
    }

    fn is_registered(&self, id: &str) -> bool {
        self.filters.iter().any(|filter| filter.id() == id)
    }
}

impl FilterRegistry for InMemoryFilterRegistry {
    fn enabled_filters(&self) -> Vec<Arc<dyn AuthFilter>> {
        let enabled = self.enabled.load();
        self.filters
            .iter()
            .filter(|filter| enabled.contains(filter.id()))
            .cloned()
            .collect()
    }
}

/// Runs the registry's enabled filters in order; the first failure aborts.
pub struct FilterChain {
    registry: Arc<dyn FilterRegistry>,
}

impl FilterChain {
    pub fn new(registry: Arc<dyn FilterRegistry>) -> Self {
        Self { registry }
    }

    pub fn apply(
        &self,
        request: &AuthRequest,
        identity_data: &IdentityData,
        properties: &FilterProperties,
    ) -> Result<(), AdmissionError> {
        for filter in self.registry.enabled_filters() {
            filter
                .validate(request, identity_data, properties)
                .map_err(|source| {
                    tracing::warn!(
                        filter = %filter.id(),
                        code = %source.code,
                        "Filter rejected request"
                    );
                    AdmissionError::FilterRejected {
                        filter: filter.id().to_string(),
                        source,
                    }
                })?;
        }
        Ok(())
    }
}

impl Stage<DecipheredRequest> for FilterChain {
    type Output = AuthRequest;

    fn name(&self) -> &'static str {
        "filters"
    }

    fn run(&self, input: DecipheredRequest) -> Result<AuthRequest, AdmissionError> {
        let properties = input.filter_properties();
        self.apply(&input.request, &input.identity_data, &properties)?;
        Ok(input.request)
    }
}

/// Rejects biometrics captured by a device from a denied provider.
pub struct DeviceProviderDenyListFilter {
    denied: Vec<String>,
}

impl DeviceProviderDenyListFilter {
    pub fn new(denied: Vec<String>) -> Self {
        Self { denied }
    }
}

impl AuthFilter for DeviceProviderDenyListFilter {
    fn id(&self) -> &str {
        DEVICE_PROVIDER_DENY_LIST
    }

    fn validate(
        &self,
        request: &AuthRequest,
        _identity_data: &IdentityData,
        _properties: &FilterProperties,
    ) -> Result<(), FilterError> {
        let denied = request
            .biometrics()
            .iter()
            .filter_map(|block| block.data.as_ref()?.digital_id.as_ref()?.dp.as_deref())
            .find(|dp| self.denied.iter().any(|d| d.eq_ignore_ascii_case(dp)));

        match denied {
            Some(dp) => Err(FilterError::new(
                "DEVICE_PROVIDER_NOT_ALLOWED",
                format!("Device provider {} is not allowed", dp),
            )),
            None => Ok(()),
        }
    }
}
