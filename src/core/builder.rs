use std::sync::Arc;

use crate::{
    config::Config,
    core::supervisor::{ConnectionSupervisor, SupervisorParams},
    dispatch::{DispatchCycle, DispatchSettings, DispatchTimer},
    error::RuntimeError,
    events::Bus,
    live::LiveNotifier,
    scanner::Scanner,
    store::{self, EventStore},
    subscribers::{LogWriter, Subscribe, SubscriberSet},
    transport::{HttpGateway, SessionConfig, Transport},
};

use super::service::Service;

/// Builder for wiring a [`Service`] from configuration.
///
/// Anything not provided explicitly is derived from [`Config`]:
/// - store: opened from `store_url`
/// - transport: [`HttpGateway`] over `gateway`
/// - subscribers: a single [`LogWriter`]
pub struct ServiceBuilder {
    cfg: Config,
    store: Option<Arc<dyn EventStore>>,
    transport: Option<Arc<dyn Transport>>,
    subscribers: Option<Vec<Arc<dyn Subscribe>>>,
    live: Option<Arc<LiveNotifier>>,
}

impl ServiceBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            store: None,
            transport: None,
            subscribers: None,
            live: None,
        }
    }

    /// Uses an already opened event store.
    pub fn with_store(mut self, store: Arc<dyn EventStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Uses a specific transport adapter.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replaces the default subscribers.
    ///
    /// Subscribers receive runtime events through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = Some(subscribers);
        self
    }

    /// Shares a live notifier with other request handlers.
    pub fn with_live(mut self, live: Arc<LiveNotifier>) -> Self {
        self.live = Some(live);
        self
    }

    /// Builds the service.
    ///
    /// Must be called from within a tokio runtime (subscriber workers are spawned here).
    /// Fails only when the store has to be opened and cannot be.
    pub fn build(self) -> Result<Service, RuntimeError> {
        let store: Arc<dyn EventStore> = match self.store {
            Some(store) => store,
            None => Arc::new(store::open(&self.cfg.store_url)?),
        };
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpGateway::new(self.cfg.gateway.clone())),
        };
        let subscribers = self.subscribers.unwrap_or_else(|| {
            let log: Arc<dyn Subscribe> = Arc::new(LogWriter::new());
            vec![log]
        });

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = SubscriberSet::new(subscribers);

        let cycle = Arc::new(DispatchCycle::new(
            Scanner::new(store),
            Arc::clone(&transport),
            bus.clone(),
            DispatchSettings::from(&self.cfg),
        ));
        let timer = DispatchTimer::new(cycle, self.cfg.dispatch_interval);
        let supervisor = Arc::new(ConnectionSupervisor::new(
            transport,
            timer,
            SupervisorParams {
                session: SessionConfig::new(self.cfg.gateway.session.clone()),
                backoff: self.cfg.reconnect,
                connect_timeout: self.cfg.connect_timeout,
            },
            bus.clone(),
        ));

        Ok(Service::new_internal(
            self.cfg,
            bus,
            subs,
            supervisor,
            self.live.unwrap_or_default(),
        ))
    }
}
