//! Gateway state
//!
//! Shared dependencies handed to every connection.

use std::sync::Arc;

use bonfire_common::{AppError, GatewaySettings};
use bonfire_core::{DomainEvent, SnowflakeGenerator};
use tokio::sync::mpsc;

use crate::collaborators::{Authenticator, CommandHandler};
use crate::connection::{OutboundConfig, SessionManager};
use crate::protocol::{Capabilities, VersionResolver};
use crate::router::EventRouter;

/// Buffer between external event producers and the router
const EVENT_INTAKE_BUFFER: usize = 1024;

/// Gateway application state
#[derive(Clone)]
pub struct GatewayState {
    sessions: Arc<SessionManager>,
    router: Arc<EventRouter>,
    authenticator: Arc<dyn Authenticator>,
    versions: Arc<VersionResolver>,
    settings: Arc<GatewaySettings>,
    capabilities: Capabilities,
    /// Domain events published from outside a connection
    events: mpsc::Sender<DomainEvent>,
}

impl GatewayState {
    /// Wire the registry, router and collaborators together and start the
    /// event intake task
    ///
    /// # Errors
    /// Returns `AppError::Config` if the supported version list is unusable.
    pub fn new(
        settings: GatewaySettings,
        ids: Arc<SnowflakeGenerator>,
        authenticator: Arc<dyn Authenticator>,
        commands: Arc<dyn CommandHandler>,
    ) -> Result<Self, AppError> {
        let versions = VersionResolver::from_config(&settings.supported_versions)
            .map_err(|e| AppError::Config(e.to_string()))?;

        let sessions = SessionManager::new_shared(ids, OutboundConfig::from_settings(&settings));
        let router = Arc::new(EventRouter::new(Arc::clone(&sessions), commands));

        let (events, intake) = mpsc::channel(EVENT_INTAKE_BUFFER);
        router.spawn_intake(intake);

        Ok(Self {
            sessions,
            router,
            authenticator,
            versions: Arc::new(versions),
            settings: Arc::new(settings),
            capabilities: Capabilities::default(),
            events,
        })
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn router(&self) -> &Arc<EventRouter> {
        &self.router
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn versions(&self) -> &VersionResolver {
        &self.versions
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Capability flags the server offers
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Sender for domain events produced outside the gateway
    pub fn events(&self) -> &mpsc::Sender<DomainEvent> {
        &self.events
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("sessions", &self.sessions)
            .field("versions", &self.versions)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}
