use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("ledger error: {0}")]
    Ledger(#[from] docket_ledger::LedgerError),

    #[error("store error: {0}")]
    Store(#[from] docket_store::StoreError),

    #[error("invalid event: {0}")]
    InvalidEvent(#[from] docket_types::EventError),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("reconciliation conflict for record {0}")]
    ReconciliationConflict(String),

    #[error("shutdown timeout")]
    ShutdownTimeout,

    #[error("{0}")]
    Other(String),
}
