//! Domain models for hyperparameter tuning experiments.
//!
//! Canonical definitions for the core entities:
//! - `ExperimentInfo`: declared hyperparameters and metrics
//! - `Session`: one training run with hparam assignments and metric series
//! - `Snapshot`: immutable, digest-keyed set of sessions handed to a query

pub mod digest;
pub mod error;
pub mod experiment;
pub mod infer;
pub mod session;
pub mod snapshot;

pub use error::{HParamsError, Result};
pub use experiment::{
    DataType, DatasetType, Domain, ExperimentInfo, HParamInfo, HParamValue, MetricInfo,
    MetricName,
};
pub use infer::infer_experiment_info;
pub use session::{MetricEval, MetricObservation, Session, SessionStatus};
pub use snapshot::Snapshot;
