//! Fee ledger use-case service.
//!
//! # Responsibility
//! - Idempotent "ensure record" per student-period.
//! - Monotone "mark paid" with isolated `FeePaid` notification.
//! - Calendar views and batch generation over the stored records.
//!
//! # Invariants
//! - Ensuring an existing record returns it unchanged.
//! - A payment never lowers the recorded total.
//! - Notification failure never rolls back or fails a payment.

use crate::error::{CoreError, CoreResult};
use crate::key::{resolve_fee_key, validate_period, FeeKey};
use crate::model::fee::{
    BatchReport, FeeId, FeePlan, FeeStatus, MarkPaidOptions, MonthlyFeeRecord, PeriodSummary,
    PlanId,
};
use crate::model::money::Money;
use crate::model::roster::Student;
use crate::model::PersonId;
use crate::notify::{dispatch_isolated, DomainEvent, NotificationDispatcher};
use crate::repo::fee_repo::FeeRepository;
use crate::repo::roster_repo::RosterRepository;
use crate::repo::RepoError;
use chrono::Utc;
use log::info;
use std::sync::Arc;
use uuid::Uuid;

const MONTHS_PER_YEAR: u32 = 12;

/// Fee ledger facade over fee and roster repositories.
pub struct FeeService<F: FeeRepository, R: RosterRepository> {
    fees: F,
    roster: R,
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl<F: FeeRepository, R: RosterRepository> FeeService<F, R> {
    pub fn new(fees: F, roster: R, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self {
            fees,
            roster,
            dispatcher,
        }
    }

    /// Creates a plan. A default plan demotes the previous default.
    pub fn create_plan(
        &self,
        name: impl Into<String>,
        amount: Money,
        is_monthly_default: bool,
    ) -> CoreResult<FeePlan> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CoreError::InvalidInput(
                "fee plan name must not be empty".to_string(),
            ));
        }
        ensure_non_negative(amount)?;

        let plan = FeePlan::new(name.trim(), amount, is_monthly_default);
        self.fees.create_plan(&plan)?;
        info!(
            "event=fee_plan_create module=fee status=ok plan_id={} default={}",
            plan.id, plan.is_monthly_default
        );
        Ok(plan)
    }

    pub fn set_default_plan(&self, plan_id: PlanId) -> CoreResult<()> {
        self.fees
            .set_default_plan(plan_id)
            .map_err(|err| not_found_as(err, CoreError::PlanNotFound(plan_id)))?;
        info!("event=fee_plan_default module=fee status=ok plan_id={plan_id}");
        Ok(())
    }

    pub fn active_default_plan(&self) -> CoreResult<Option<FeePlan>> {
        Ok(self.fees.default_plan()?)
    }

    pub fn list_plans(&self) -> CoreResult<Vec<FeePlan>> {
        Ok(self.fees.list_plans()?)
    }

    /// Returns the live record for the period, creating it when absent.
    ///
    /// `amount` is only consulted on creation; without it the active
    /// default plan supplies the amount.
    pub fn ensure_monthly_record(
        &self,
        student_id: PersonId,
        month: u32,
        year: i32,
        amount: Option<Money>,
    ) -> CoreResult<MonthlyFeeRecord> {
        let key = resolve_fee_key(student_id, month, year)?;
        let student = self.require_student(student_id)?;
        self.ensure_for(&key, &student, amount)
            .map(|(record, _)| record)
    }

    /// Records a payment against the period, creating the bill first when
    /// needed. The stored total becomes `max(stored, paid_amount)`.
    pub fn mark_paid(
        &self,
        student_id: PersonId,
        month: u32,
        year: i32,
        paid_amount: Money,
        options: MarkPaidOptions,
    ) -> CoreResult<MonthlyFeeRecord> {
        ensure_non_negative(paid_amount)?;
        let key = resolve_fee_key(student_id, month, year)?;
        let student = self.require_student(student_id)?;
        let (ensured, _) = self.ensure_for(&key, &student, options.amount)?;

        // A delete landing between ensure and payment leaves no live row.
        let record = self
            .fees
            .apply_payment(&key, paid_amount, Utc::now().timestamp_millis())?
            .ok_or(CoreError::RecordNotFound(ensured.id))?;
        info!(
            "event=fee_mark_paid module=fee status=ok fee_id={} period={}-{:02} paid={} of={} fee_status={}",
            record.id,
            record.year,
            record.month,
            record.paid_amount,
            record.amount,
            record.status.as_str()
        );

        if options.send_email {
            dispatch_isolated(
                self.dispatcher.as_ref(),
                &DomainEvent::FeePaid { fee_id: record.id },
            );
        }
        Ok(record)
    }

    /// Returns exactly twelve summaries, January first.
    ///
    /// Months without a record are synthesized and never persisted.
    pub fn list_year(&self, student_id: PersonId, year: i32) -> CoreResult<Vec<PeriodSummary>> {
        validate_period(1, year)?;
        self.require_student(student_id)?;

        let records = self.fees.list_student_year(student_id, year)?;
        Ok((1..=MONTHS_PER_YEAR)
            .map(|month| {
                records
                    .iter()
                    .find(|record| record.month == month)
                    .map(PeriodSummary::from)
                    .unwrap_or_else(|| PeriodSummary::unbilled(month))
            })
            .collect())
    }

    /// Lists every live record of one period, ordered by student id.
    pub fn list_period(&self, month: u32, year: i32) -> CoreResult<Vec<MonthlyFeeRecord>> {
        validate_period(month, year)?;
        Ok(self.fees.list_period(month, year)?)
    }

    pub fn get_record(&self, record_id: FeeId) -> CoreResult<MonthlyFeeRecord> {
        self.fees
            .get_record(record_id)?
            .ok_or(CoreError::RecordNotFound(record_id))
    }

    /// Ensures a default-plan bill for every active student in the period.
    ///
    /// Safe to re-run: existing bills are counted, not duplicated.
    pub fn generate_month(&self, month: u32, year: i32) -> CoreResult<BatchReport> {
        validate_period(month, year)?;
        if self.fees.default_plan()?.is_none() {
            return Err(CoreError::NoDefaultFeePlan);
        }

        let mut report = BatchReport::default();
        for student in self.roster.list_active_students()? {
            let key = resolve_fee_key(student.id, month, year)?;
            let (_, created) = self.ensure_for(&key, &student, None)?;
            if created {
                report.created += 1;
            } else {
                report.existing += 1;
            }
        }

        info!(
            "event=fee_generate module=fee status=ok period={year}-{month:02} created={} existing={}",
            report.created, report.existing
        );
        Ok(report)
    }

    pub fn delete_plan(&self, plan_id: PlanId) -> CoreResult<()> {
        self.fees
            .soft_delete_plan(plan_id)
            .map_err(|err| not_found_as(err, CoreError::PlanNotFound(plan_id)))?;
        info!("event=fee_plan_delete module=fee status=ok plan_id={plan_id}");
        Ok(())
    }

    pub fn delete_record(&self, record_id: FeeId) -> CoreResult<()> {
        self.fees
            .soft_delete_record(record_id)
            .map_err(|err| not_found_as(err, CoreError::RecordNotFound(record_id)))?;
        info!("event=fee_record_delete module=fee status=ok fee_id={record_id}");
        Ok(())
    }

    fn require_student(&self, student_id: PersonId) -> CoreResult<Student> {
        self.roster
            .get_student(student_id)?
            .ok_or(CoreError::StudentNotFound(student_id))
    }

    fn ensure_for(
        &self,
        key: &FeeKey,
        student: &Student,
        amount: Option<Money>,
    ) -> CoreResult<(MonthlyFeeRecord, bool)> {
        if let Some(existing) = self.fees.find_record(key)? {
            return Ok((existing, false));
        }

        let (amount, fee_plan_id) = match amount {
            Some(amount) => {
                ensure_non_negative(amount)?;
                (amount, None)
            }
            None => {
                let plan = self
                    .fees
                    .default_plan()?
                    .ok_or(CoreError::NoDefaultFeePlan)?;
                (plan.amount, Some(plan.id))
            }
        };

        let candidate = MonthlyFeeRecord {
            id: Uuid::new_v4(),
            student_id: key.student_id(),
            parent_id: student.parent_id,
            fee_plan_id,
            amount,
            month: key.month(),
            year: key.year(),
            status: FeeStatus::Unpaid,
            paid_amount: Money::ZERO,
            paid_at: None,
            due_date: key.due_date(),
            is_deleted: false,
            created_at: Utc::now().timestamp_millis(),
        };
        let (record, created) = self.fees.insert_record_if_absent(&candidate)?;
        info!(
            "event=fee_ensure module=fee status={} fee_id={} period={}-{:02}",
            if created { "ok" } else { "replay" },
            record.id,
            record.year,
            record.month
        );
        Ok((record, created))
    }
}

fn ensure_non_negative(amount: Money) -> CoreResult<()> {
    if amount.is_negative() {
        return Err(CoreError::InvalidAmount(amount));
    }
    Ok(())
}

fn not_found_as(err: RepoError, mapped: CoreError) -> CoreError {
    match err {
        RepoError::NotFound { .. } => mapped,
        other => CoreError::Repo(other),
    }
}
