use thiserror::Error;

/// Every fatal condition the selection can hit. None of them is retried.
#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cluster constraint unsatisfiable: feature set {features:?} already spans every cluster")]
    ClusterConstraintUnsatisfiable { features: Vec<String> },

    #[error("Duplicate sampling stall: {shortfall} of {requested} unique feature sets still missing after {attempts} attempts")]
    DuplicateSamplingStall {
        requested: usize,
        shortfall: usize,
        attempts: usize,
    },

    #[error("Oracle failure on {features:?}: {reason}")]
    OracleFailure { features: Vec<String>, reason: String },

    #[error("Data error: {0}")]
    Data(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Bincode error: {0}")]
    Bincode(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, SelectionError>;
