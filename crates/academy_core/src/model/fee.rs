//! Fee plan and monthly fee record model.
//!
//! # Invariants
//! - At most one non-deleted plan carries `is_monthly_default`.
//! - `(student_id, month, year)` identifies one live `MonthlyFeeRecord`.
//! - `status` is always `FeeStatus::derive(paid_amount, amount)`.
//! - `paid_amount` never decreases through the payment flow.

use crate::model::money::Money;
use crate::model::PersonId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type FeeId = Uuid;
pub type PlanId = Uuid;

/// Administrator-defined fee amount template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePlan {
    pub id: PlanId,
    pub name: String,
    pub amount: Money,
    pub is_monthly_default: bool,
    pub is_deleted: bool,
}

impl FeePlan {
    pub fn new(name: impl Into<String>, amount: Money, is_monthly_default: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            amount,
            is_monthly_default,
            is_deleted: false,
        }
    }
}

/// Payment state of one monthly bill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeeStatus {
    Unpaid,
    Partial,
    Paid,
}

impl FeeStatus {
    /// Derives status from the recorded total.
    ///
    /// Nothing paid is `Unpaid` even for a zero-amount bill.
    pub fn derive(paid_amount: Money, amount: Money) -> Self {
        if paid_amount.minor() <= 0 {
            Self::Unpaid
        } else if paid_amount >= amount {
            Self::Paid
        } else {
            Self::Partial
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
            Self::Partial => "partial",
            Self::Paid => "paid",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unpaid" => Some(Self::Unpaid),
            "partial" => Some(Self::Partial),
            "paid" => Some(Self::Paid),
            _ => None,
        }
    }
}

/// One bill for one student and one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyFeeRecord {
    pub id: FeeId,
    pub student_id: PersonId,
    pub parent_id: PersonId,
    pub fee_plan_id: Option<PlanId>,
    pub amount: Money,
    pub month: u32,
    pub year: i32,
    pub status: FeeStatus,
    pub paid_amount: Money,
    /// Unix epoch milliseconds of the first transition to `Paid`.
    pub paid_at: Option<i64>,
    pub due_date: NaiveDate,
    pub is_deleted: bool,
    /// Unix epoch milliseconds of creation.
    pub created_at: i64,
}

/// Options for the payment flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkPaidOptions {
    /// Emit `FeePaid` to the dispatcher after the write commits.
    pub send_email: bool,
    /// Bill amount used only when the record does not exist yet.
    pub amount: Option<Money>,
}

/// One calendar slot of the yearly fee view.
///
/// Months without a stored record are synthesized as `Unpaid` with every
/// optional field empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub month: u32,
    pub status: FeeStatus,
    pub amount: Option<Money>,
    pub paid_at: Option<i64>,
    pub paid_amount: Option<Money>,
    pub fee_id: Option<FeeId>,
}

impl PeriodSummary {
    pub fn unbilled(month: u32) -> Self {
        Self {
            month,
            status: FeeStatus::Unpaid,
            amount: None,
            paid_at: None,
            paid_amount: None,
            fee_id: None,
        }
    }
}

impl From<&MonthlyFeeRecord> for PeriodSummary {
    fn from(record: &MonthlyFeeRecord) -> Self {
        Self {
            month: record.month,
            status: record.status,
            amount: Some(record.amount),
            paid_at: record.paid_at,
            paid_amount: Some(record.paid_amount),
            fee_id: Some(record.id),
        }
    }
}

/// Result of a batch generation run over all active students.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub created: usize,
    pub existing: usize,
}
