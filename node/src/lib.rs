//! The docket node: anchors case lifecycle events to an external
//! append-only ledger, tracks SLA deadlines and reconciles the local
//! mirror against the ledger's history.

pub mod case_diff;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod evidence;
pub mod logging;
pub mod metrics;
pub mod notify;
pub mod reconciler;
pub mod retry_queue;
pub mod service;
pub mod shutdown;
pub mod sla;

pub use case_diff::{diff_case, CaseSnapshot, CaseStatus};
pub use config::NodeConfig;
pub use dispatcher::{Dispatcher, SubmitOutcome};
pub use error::NodeError;
pub use evidence::EvidenceStore;
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use notify::{EscalationNotifier, LogNotifier};
pub use reconciler::{Reconciler, SyncReport};
pub use retry_queue::RetryQueue;
pub use service::DocketNode;
pub use shutdown::ShutdownController;
pub use sla::SlaTracker;
