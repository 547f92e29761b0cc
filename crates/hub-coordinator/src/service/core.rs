use crate::domain::{CallbackTable, CoordinatorConfig, HubError, ValidatorRegistry};
use crate::ports::{Geolocator, MonitoringRepository};
use std::sync::Arc;

/// Coordination engine shared by every connection task.
///
/// Cheap to share behind an `Arc`; all interior state is lock-guarded.
///
/// # Example
///
/// ```rust,ignore
/// let coordinator = Arc::new(HubCoordinator::new(
///     CoordinatorConfig::default(),
///     Arc::new(InMemoryRepository::new()),
///     Arc::new(NoopGeolocator),
/// )?);
///
/// tokio::spawn(scheduler_task(Arc::clone(&coordinator)));
/// ```
pub struct HubCoordinator {
    pub(crate) config: CoordinatorConfig,
    pub(crate) repository: Arc<dyn MonitoringRepository>,
    pub(crate) geolocator: Arc<dyn Geolocator>,
    pub(crate) registry: Arc<ValidatorRegistry>,
    pub(crate) callbacks: Arc<CallbackTable>,
}

impl HubCoordinator {
    /// Create a coordinator with empty registry and callback table.
    pub fn new(
        config: CoordinatorConfig,
        repository: Arc<dyn MonitoringRepository>,
        geolocator: Arc<dyn Geolocator>,
    ) -> Result<Self, HubError> {
        config.validate()?;
        Ok(Self {
            config,
            repository,
            geolocator,
            registry: Arc::new(ValidatorRegistry::new()),
            callbacks: Arc::new(CallbackTable::new()),
        })
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ValidatorRegistry> {
        &self.registry
    }

    pub fn callbacks(&self) -> &Arc<CallbackTable> {
        &self.callbacks
    }

    pub fn repository(&self) -> &Arc<dyn MonitoringRepository> {
        &self.repository
    }
}
