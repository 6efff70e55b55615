//! Caller-facing error taxonomy.
//!
//! Unique-index conflicts never reach this type: repositories resolve them
//! by re-reading. Dispatcher failures never reach it either.

use crate::key::PeriodError;
use crate::model::attendance::SubjectKind;
use crate::model::fee::{FeeId, PlanId};
use crate::model::money::Money;
use crate::model::PersonId;
use crate::repo::RepoError;
use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("student not found: {0}")]
    StudentNotFound(PersonId),
    #[error("{} not found: {id}", .kind.as_str())]
    SubjectNotFound { kind: SubjectKind, id: PersonId },
    #[error("fee plan not found: {0}")]
    PlanNotFound(PlanId),
    #[error("fee record not found: {0}")]
    RecordNotFound(FeeId),
    #[error("no default monthly fee plan is active; pass an explicit amount")]
    NoDefaultFeePlan,
    #[error("invalid period: {0}")]
    InvalidPeriod(#[from] PeriodError),
    #[error("amount {0} must not be negative")]
    InvalidAmount(Money),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("role `{role}` may not access `{route}`")]
    Unauthorized { route: String, role: String },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl CoreError {
    /// Stable machine-readable code for response envelopes and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::StudentNotFound(_)
            | Self::SubjectNotFound { .. }
            | Self::PlanNotFound(_)
            | Self::RecordNotFound(_) => "not_found",
            Self::NoDefaultFeePlan => "no_default_fee_plan",
            Self::InvalidPeriod(_) => "invalid_period",
            Self::InvalidAmount(_) | Self::InvalidInput(_) => "invalid_input",
            Self::Unauthorized { .. } => "unauthorized",
            Self::Repo(_) => "storage",
        }
    }
}
