//! Node wiring: opens storage, builds the components and runs the
//! background loops.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use docket_ledger::LedgerClient;
use docket_store::record::RecordStore;
use docket_store_lmdb::LmdbEnvironment;
use docket_types::{CaseId, Clock, LifecycleEvent, SystemClock, Timestamp};

use crate::case_diff::{diff_case, CaseSnapshot};
use crate::config::NodeConfig;
use crate::dispatcher::{Dispatcher, SubmitOutcome};
use crate::evidence::EvidenceStore;
use crate::metrics::NodeMetrics;
use crate::notify::EscalationNotifier;
use crate::reconciler::Reconciler;
use crate::shutdown::ShutdownController;
use crate::sla::SlaTracker;
use crate::NodeError;

/// How often the dispatch loop polls the retry queue.
const DISPATCH_TICK: Duration = Duration::from_secs(1);
/// How long `stop` waits for the background tasks to drain.
const STOP_TIMEOUT: Duration = Duration::from_secs(10);
/// How often the metrics snapshot is written to the log.
const METRICS_SNAPSHOT_INTERVAL: Duration = Duration::from_secs(60);

pub struct DocketNode {
    config: NodeConfig,
    records: Arc<dyn RecordStore + Send + Sync>,
    dispatcher: Arc<Dispatcher>,
    sla: Arc<SlaTracker>,
    reconciler: Arc<Reconciler>,
    evidence: EvidenceStore,
    metrics: Arc<NodeMetrics>,
    shutdown: ShutdownController,
}

impl DocketNode {
    /// Build a node with the real system clock.
    pub fn new(
        config: NodeConfig,
        ledger: Arc<dyn LedgerClient>,
        notifier: Arc<dyn EscalationNotifier>,
    ) -> Result<Self, NodeError> {
        Self::with_clock(config, ledger, notifier, Arc::new(SystemClock))
    }

    /// Build a node with an injected clock (tests drive time by hand).
    pub fn with_clock(
        config: NodeConfig,
        ledger: Arc<dyn LedgerClient>,
        notifier: Arc<dyn EscalationNotifier>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, NodeError> {
        let env = Arc::new(LmdbEnvironment::open(&config.data_dir)?);
        let records = Arc::new(env.record_store());
        let slas = Arc::new(env.sla_store());
        let meta = Arc::new(env.meta_store());
        let metrics = Arc::new(NodeMetrics::new());

        let dispatcher = Arc::new(Dispatcher::new(
            records.clone(),
            ledger.clone(),
            clock.clone(),
            metrics.clone(),
            config.max_attempts,
            config.base_delay_secs,
            config.submit_timeout(),
        ));
        dispatcher.recover()?;

        let sla = Arc::new(SlaTracker::new(
            slas,
            ledger.clone(),
            notifier,
            clock.clone(),
            metrics.clone(),
            config.escalation_batch_size,
        ));

        let reconciler = Arc::new(Reconciler::new(
            records.clone(),
            meta,
            env,
            ledger,
            clock,
            metrics.clone(),
        ));

        let evidence = EvidenceStore::new(config.evidence_dir.clone());

        Ok(Self {
            config,
            records,
            dispatcher,
            sla,
            reconciler,
            evidence,
            metrics,
            shutdown: ShutdownController::new(),
        })
    }

    /// Spawn the background loops: dispatch, SLA scan, reconcile and the
    /// failed-record sweep. Each one drains on shutdown.
    pub fn start(&mut self) {
        info!(
            data_dir = %self.config.data_dir.display(),
            "starting docket node"
        );

        // Dispatch loop.
        let dispatcher = self.dispatcher.clone();
        let metrics = self.metrics.clone();
        let mut shutdown_rx = self.shutdown.subscribe();
        self.shutdown.register(tokio::spawn(async move {
            let mut interval = tokio::time::interval(DISPATCH_TICK);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => break,
                    _ = interval.tick() => {
                        if let Err(e) = dispatcher.run_due().await {
                            error!(error = %e, "dispatch pass failed");
                        }
                        metrics.pending_records.set(dispatcher.queued() as i64);
                    }
                }
            }
        }));

        // SLA scan loop.
        let sla = self.sla.clone();
        let mut shutdown_rx = self.shutdown.subscribe();
        let scan_interval = Duration::from_secs(self.config.sla_scan_interval_secs);
        self.shutdown.register(tokio::spawn(async move {
            let mut interval = tokio::time::interval(scan_interval);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => break,
                    _ = interval.tick() => {
                        if let Err(e) = sla.scan().await {
                            error!(error = %e, "SLA scan failed");
                        }
                    }
                }
            }
        }));

        // Reconcile loop.
        let reconciler = self.reconciler.clone();
        let mut shutdown_rx = self.shutdown.subscribe();
        let reconcile_interval = Duration::from_secs(self.config.reconcile_interval_secs);
        self.shutdown.register(tokio::spawn(async move {
            let mut interval = tokio::time::interval(reconcile_interval);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => break,
                    _ = interval.tick() => {
                        if let Err(e) = reconciler.sync().await {
                            error!(error = %e, "reconcile pass failed");
                        }
                    }
                }
            }
        }));

        // Failed-record sweep loop.
        let dispatcher = self.dispatcher.clone();
        let mut shutdown_rx = self.shutdown.subscribe();
        let sweep_interval = Duration::from_secs(self.config.retry_sweep_interval_secs);
        let sweep_max_age = self.config.retry_sweep_max_age_secs;
        self.shutdown.register(tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => break,
                    _ = interval.tick() => {
                        if let Err(e) = dispatcher.sweep_failed(sweep_max_age) {
                            error!(error = %e, "retry sweep failed");
                        }
                    }
                }
            }
        }));

        // Metrics snapshot loop. There is no HTTP surface on this node,
        // so the log is the exporter.
        if self.config.enable_metrics {
            let metrics = self.metrics.clone();
            let mut shutdown_rx = self.shutdown.subscribe();
            self.shutdown.register(tokio::spawn(async move {
                let mut interval = tokio::time::interval(METRICS_SNAPSHOT_INTERVAL);
                loop {
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => break,
                        _ = interval.tick() => {
                            info!(target: "docket_metrics", "\n{}", metrics.encode_text());
                        }
                    }
                }
            }));
        }
    }

    /// Signal shutdown and join the background loops. A loop that is
    /// still running when the timeout expires is aborted rather than
    /// left behind.
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        if self.shutdown.drain(STOP_TIMEOUT).await > 0 {
            return Err(NodeError::ShutdownTimeout);
        }
        info!("docket node stopped");
        Ok(())
    }

    /// Block until SIGINT/SIGTERM, then stop.
    pub async fn run_until_signal(&mut self) -> Result<(), NodeError> {
        self.shutdown.wait_for_signal().await;
        self.stop().await
    }

    /// Apply a case mutation: anchor the implied events and keep the SLA
    /// deadline in step (assignment starts the window, resolution ends
    /// it).
    pub fn handle_case_change(
        &self,
        old: Option<&CaseSnapshot>,
        new: &CaseSnapshot,
        actor: &str,
        now: Timestamp,
    ) -> Result<Vec<SubmitOutcome>, NodeError> {
        let events = diff_case(old, new, actor, now);
        let mut outcomes = Vec::with_capacity(events.len());
        for event in &events {
            use docket_types::EventType;
            match event.event_type {
                EventType::Assigned => {
                    self.sla
                        .set_deadline(&event.case_id, self.config.default_sla_secs())?;
                }
                EventType::Resolved => {
                    self.sla.resolve(&event.case_id)?;
                }
                _ => {}
            }
            outcomes.push(self.dispatcher.submit(event)?);
        }
        Ok(outcomes)
    }

    /// Anchor an evidence file: store the bytes locally, then submit a
    /// STATUS_UPDATED-style event carrying the digest.
    pub fn anchor_evidence(
        &self,
        case_id: &CaseId,
        bytes: &[u8],
        name: &str,
        actor: &str,
        now: Timestamp,
    ) -> Result<SubmitOutcome, NodeError> {
        let (path, digest) = self.evidence.store(bytes, name)?;
        let event = LifecycleEvent::new(
            case_id.clone(),
            docket_types::EventType::StatusUpdated,
            actor,
            now,
        )
        .with_data("evidence_digest", digest)
        .with_data("evidence_name", name)
        .with_data("evidence_path", path.display().to_string());
        self.dispatcher.submit(&event)
    }

    /// Read access to the local anchor-record mirror.
    pub fn records(&self) -> &(dyn RecordStore + Send + Sync) {
        self.records.as_ref()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn sla_tracker(&self) -> &SlaTracker {
        &self.sla
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn evidence(&self) -> &EvidenceStore {
        &self.evidence
    }

    pub fn metrics(&self) -> &NodeMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }
}
