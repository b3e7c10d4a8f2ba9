// src/core/state/core.rs

//! Defines the central `ServerState` struct, holding all shared server-wide state.

use super::stats::StatsState;
use crate::config::Config;
use crate::core::SpinelKvError;
use crate::core::cluster::redirect::parse_slot_range;
use crate::core::cluster::{
    AdmissionControl, KeepAlive, LocalOwnership, NoReplication, RedirectCheck, ReplicationHook,
    ReplicationLog, SlotOwnership,
};
use crate::core::commands::CommandRegistry;
use crate::core::latency::{SlowLog, SlowLogSink};
use crate::core::scripting::ScriptCache;
use crate::core::storage::{Engine, MemoryEngine};
use crate::core::transaction::TxCoordinator;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

/// The pluggable parts of the server. `from_config` picks the in-process
/// implementations; tests and embedders may substitute their own.
#[derive(Debug, Clone)]
pub struct Collaborators {
    pub engine: Arc<dyn Engine>,
    pub redirect: Arc<dyn RedirectCheck>,
    pub replication: Arc<dyn ReplicationHook>,
    /// `None` reports slow queries to the built-in `SlowLog`.
    pub slow_log_sink: Option<Arc<dyn SlowLogSink>>,
    pub admission: Arc<dyn AdmissionControl>,
}

impl Collaborators {
    pub fn from_config(config: &Config) -> Result<Self, SpinelKvError> {
        let redirect: Arc<dyn RedirectCheck> = if config.cluster.enabled {
            let ranges = config
                .cluster
                .owned_slots
                .iter()
                .map(|range| parse_slot_range(range))
                .collect::<Result<Vec<_>, _>>()
                .map_err(SpinelKvError::Internal)?;
            Arc::new(SlotOwnership::new(&ranges, config.cluster.redirect_addr.clone()))
        } else {
            Arc::new(LocalOwnership)
        };
        let replication: Arc<dyn ReplicationHook> = if config.replication.enabled {
            Arc::new(ReplicationLog::new(config.replication.log_capacity))
        } else {
            Arc::new(NoReplication)
        };
        Ok(Self {
            engine: Arc::new(MemoryEngine::new()),
            redirect,
            replication,
            slow_log_sink: None,
            admission: Arc::new(KeepAlive),
        })
    }
}

/// The single runtime object shared by every connection. It owns the command
/// registry, the storage engine, the transaction coordinator and the
/// collaborators, and is passed around as `Arc<ServerState>`.
#[derive(Debug)]
pub struct ServerState {
    pub config: Arc<Config>,
    pub registry: Arc<CommandRegistry>,
    pub engine: Arc<dyn Engine>,
    pub tx: Arc<TxCoordinator>,
    pub redirect: Arc<dyn RedirectCheck>,
    pub replication: Arc<dyn ReplicationHook>,
    pub slow_log: Arc<SlowLog>,
    pub slow_log_sink: Arc<dyn SlowLogSink>,
    pub admission: Arc<dyn AdmissionControl>,
    pub scripts: ScriptCache,
    /// Connected clients by session ID.
    pub clients: DashMap<u64, SocketAddr>,
    pub stats: StatsState,
    is_master: AtomicBool,
    started_at: Instant,
    next_client_id: AtomicU64,
}

impl ServerState {
    /// Builds the server state with the collaborators the configuration asks for.
    pub fn initialize(config: Config) -> Result<Arc<Self>, SpinelKvError> {
        let collaborators = Collaborators::from_config(&config)?;
        Self::with_collaborators(config, collaborators)
    }

    pub fn with_collaborators(
        config: Config,
        collaborators: Collaborators,
    ) -> Result<Arc<Self>, SpinelKvError> {
        let registry = CommandRegistry::with_builtin_commands()?;
        let slow_log = Arc::new(SlowLog::new(config.slowlog_max_len));
        let slow_log_sink = collaborators
            .slow_log_sink
            .unwrap_or_else(|| Arc::clone(&slow_log) as Arc<dyn SlowLogSink>);
        let tx = Arc::new(TxCoordinator::new(&config.transaction));

        info!(
            commands = registry.len(),
            tx_enabled = tx.is_enabled(),
            replication = collaborators.replication.is_active(),
            "Server state initialized"
        );

        Ok(Arc::new(Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            engine: collaborators.engine,
            tx,
            redirect: collaborators.redirect,
            replication: collaborators.replication,
            slow_log,
            slow_log_sink,
            admission: collaborators.admission,
            scripts: ScriptCache::new(),
            clients: DashMap::new(),
            stats: StatsState::new(),
            is_master: AtomicBool::new(true),
            started_at: Instant::now(),
            next_client_id: AtomicU64::new(1),
        }))
    }

    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    pub fn is_master(&self) -> bool {
        self.is_master.load(Ordering::Acquire)
    }

    /// Switches the node's role. Only a master accepts `WATCH` and `MULTI`.
    pub fn set_master(&self, value: bool) {
        if value != self.is_master.swap(value, Ordering::AcqRel) {
            info!(master = value, "Node role changed");
        }
    }

    /// Hands out session IDs, starting at 1.
    pub fn next_client_id(&self) -> u64 {
        self.next_client_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}
