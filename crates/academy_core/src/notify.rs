//! Domain events and the notification dispatch contract.
//!
//! # Responsibility
//! - Define the events the ledger and the register emit.
//! - Isolate dispatcher failures from the write that triggered them.
//!
//! # Invariants
//! - Core never awaits delivery and never retries on a dispatcher's behalf.
//! - A failing or panicking dispatcher is logged, never propagated.

use crate::model::attendance::{AttendanceStatus, SubjectKind};
use crate::model::fee::FeeId;
use crate::model::PersonId;
use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{channel, Receiver, Sender};
use thiserror::Error;
use uuid::Uuid;

/// Event handed to a dispatcher and then forgotten by core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE"
)]
pub enum DomainEvent {
    FeePaid {
        fee_id: FeeId,
    },
    AttendanceMarked {
        subject_id: PersonId,
        subject_kind: SubjectKind,
        date: NaiveDate,
        status: AttendanceStatus,
    },
    AdmissionStatusChanged {
        admission_id: Uuid,
        status: String,
    },
    OrderStatusChanged {
        order_id: Uuid,
        status: String,
    },
}

impl DomainEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FeePaid { .. } => "FEE_PAID",
            Self::AttendanceMarked { .. } => "ATTENDANCE_MARKED",
            Self::AdmissionStatusChanged { .. } => "ADMISSION_STATUS_CHANGED",
            Self::OrderStatusChanged { .. } => "ORDER_STATUS_CHANGED",
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("notification queue receiver is gone")]
    Disconnected,
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Narrow emit contract between core and the notification side.
///
/// Implementations format, queue or send; they must return quickly.
pub trait NotificationDispatcher: Send + Sync {
    fn emit(&self, event: &DomainEvent) -> Result<(), DispatchError>;
}

/// Emits `event` and swallows any failure after logging it.
pub fn dispatch_isolated(dispatcher: &dyn NotificationDispatcher, event: &DomainEvent) {
    let outcome = catch_unwind(AssertUnwindSafe(|| dispatcher.emit(event)));
    match outcome {
        Ok(Ok(())) => debug!(
            "event=notify_dispatch module=notify status=ok type={}",
            event.kind()
        ),
        Ok(Err(err)) => warn!(
            "event=notify_dispatch module=notify status=error type={} error={}",
            event.kind(),
            err
        ),
        Err(_) => warn!(
            "event=notify_dispatch module=notify status=error type={} error=dispatcher_panicked",
            event.kind()
        ),
    }
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDispatcher;

impl NotificationDispatcher for NoopDispatcher {
    fn emit(&self, _event: &DomainEvent) -> Result<(), DispatchError> {
        Ok(())
    }
}

/// Writes one structured log line per event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDispatcher;

impl NotificationDispatcher for LogDispatcher {
    fn emit(&self, event: &DomainEvent) -> Result<(), DispatchError> {
        let payload =
            serde_json::to_string(event).map_err(|err| DispatchError::Delivery(err.to_string()))?;
        info!(
            "event=notify_emit module=notify type={} payload={}",
            event.kind(),
            payload
        );
        Ok(())
    }
}

/// Hands events to an out-of-band consumer over an unbounded channel.
///
/// `emit` never blocks. The consumer owns delivery, templating and retry.
#[derive(Debug)]
pub struct QueueDispatcher {
    sender: Sender<DomainEvent>,
}

impl QueueDispatcher {
    pub fn channel() -> (Self, Receiver<DomainEvent>) {
        let (sender, receiver) = channel();
        (Self { sender }, receiver)
    }
}

impl NotificationDispatcher for QueueDispatcher {
    fn emit(&self, event: &DomainEvent) -> Result<(), DispatchError> {
        self.sender
            .send(event.clone())
            .map_err(|_| DispatchError::Disconnected)
    }
}
