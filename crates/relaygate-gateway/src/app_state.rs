//! Shared application state for the relaygate gateway.
//!
//! Owns the registries, the offline pipeline and the router, and hands out
//! `Arc` clones to the transports and ops endpoints.

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::distribute::MessageRouter;
use crate::liveness::LivenessSupervisor;
use crate::obs::GatewayMetrics;
use crate::offline::{MemoryOfflineStore, OfflinePipeline};
use crate::registry::{ChannelSink, GroupStore, LocalDirectory, SessionRegistry};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: GatewayConfig,
    sessions: Arc<SessionRegistry>,
    groups: Arc<GroupStore>,
    liveness: Arc<LivenessSupervisor>,
    router: Arc<MessageRouter>,
    offline_store: Arc<MemoryOfflineStore>,
    metrics: Arc<GatewayMetrics>,
}

impl AppState {
    pub fn new(cfg: GatewayConfig) -> Self {
        let metrics = Arc::new(GatewayMetrics::default());
        let sessions = Arc::new(SessionRegistry::new());
        let groups = Arc::new(GroupStore::new());
        let liveness = Arc::new(LivenessSupervisor::new(Arc::clone(&metrics)));

        let directory = Arc::new(LocalDirectory::new(Arc::clone(&sessions), Arc::clone(&groups)));
        let sink = Arc::new(ChannelSink::new(cfg.gateway.send_timeout()));
        let router = Arc::new(MessageRouter::new(
            directory.clone(),
            directory,
            sink,
            OfflinePipeline::new(&cfg.offline),
            Arc::clone(&liveness),
            Arc::clone(&metrics),
        ));

        Self {
            inner: Arc::new(AppStateInner {
                cfg,
                sessions,
                groups,
                liveness,
                router,
                offline_store: Arc::new(MemoryOfflineStore::new()),
                metrics,
            }),
        }
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.inner.cfg
    }

    pub fn sessions(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.inner.sessions)
    }

    pub fn groups(&self) -> Arc<GroupStore> {
        Arc::clone(&self.inner.groups)
    }

    pub fn liveness(&self) -> Arc<LivenessSupervisor> {
        Arc::clone(&self.inner.liveness)
    }

    pub fn router(&self) -> Arc<MessageRouter> {
        Arc::clone(&self.inner.router)
    }

    pub fn offline(&self) -> &OfflinePipeline {
        self.inner.router.offline()
    }

    pub fn offline_store(&self) -> Arc<MemoryOfflineStore> {
        Arc::clone(&self.inner.offline_store)
    }

    pub fn metrics(&self) -> Arc<GatewayMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    pub fn is_draining(&self) -> bool {
        self.inner.metrics.is_draining()
    }

    pub fn set_draining(&self) {
        self.inner.metrics.set_draining();
    }

    /// Point-in-time gauges rendered next to the registry metrics.
    pub fn metrics_extra(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("relaygate_online_users", self.inner.sessions.online_users() as u64),
            ("relaygate_offline_backlog", self.offline().backlog() as u64),
            ("relaygate_offline_stored", self.inner.offline_store.total() as u64),
            ("relaygate_liveness_tracked", self.inner.liveness.tracked() as u64),
        ]
    }
}
