pub mod decision_layer;
pub mod dispatch;
pub mod state_builder;

pub use decision_layer::{DecisionLayer, DecisionOutputs};
pub use dispatch::{dispatch, DispatchOutcome};
pub use state_builder::{DecisionSection, SignalsPayload, SignalsSummary, StateBuilder, StatePayload};

use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("failed to write decision output: {0}")]
    Persist(#[from] StoreError),
}
