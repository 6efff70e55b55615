//! Fee plan and monthly fee record persistence.
//!
//! # Responsibility
//! - Keep plan/record SQL inside the persistence boundary.
//! - Resolve concurrent first-time inserts for one student-period to a
//!   single stored row.
//! - Apply payments as one atomic read-modify-write.
//!
//! # Invariants
//! - `uq_monthly_fees_student_period` is the source of truth for record
//!   uniqueness; a unique violation on insert is answered with a re-read.
//! - `uq_fee_plans_single_default` is the source of truth for the single
//!   default plan; switching defaults happens in one immediate transaction.
//! - `apply_payment` never lowers `paid_amount_minor`.

use crate::db::is_unique_violation;
use crate::key::FeeKey;
use crate::model::fee::{FeeId, FeePlan, FeeStatus, MonthlyFeeRecord, PlanId};
use crate::model::money::Money;
use crate::model::PersonId;
use crate::repo::{
    bool_to_int, day_to_db, parse_bool, parse_day, parse_optional_uuid, parse_uuid, RepoError,
    RepoResult,
};
use log::debug;
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};

const PLAN_SELECT_SQL: &str = "SELECT
    id,
    name,
    amount_minor,
    is_monthly_default,
    is_deleted
FROM fee_plans";

const RECORD_SELECT_SQL: &str = "SELECT
    id,
    student_id,
    parent_id,
    fee_plan_id,
    amount_minor,
    month,
    year,
    status,
    paid_amount_minor,
    paid_at,
    due_date,
    is_deleted,
    created_at
FROM monthly_fees";

/// Repository interface for the fee ledger.
pub trait FeeRepository {
    /// Inserts a plan; a default plan first demotes the previous default.
    fn create_plan(&self, plan: &FeePlan) -> RepoResult<PlanId>;
    /// Promotes an existing live plan to the single monthly default.
    fn set_default_plan(&self, id: PlanId) -> RepoResult<()>;
    fn default_plan(&self) -> RepoResult<Option<FeePlan>>;
    fn list_plans(&self) -> RepoResult<Vec<FeePlan>>;
    fn soft_delete_plan(&self, id: PlanId) -> RepoResult<()>;

    fn find_record(&self, key: &FeeKey) -> RepoResult<Option<MonthlyFeeRecord>>;
    fn get_record(&self, id: FeeId) -> RepoResult<Option<MonthlyFeeRecord>>;
    /// Inserts `record` unless a live record for its key exists.
    ///
    /// Returns the stored record and whether this call created it.
    fn insert_record_if_absent(
        &self,
        record: &MonthlyFeeRecord,
    ) -> RepoResult<(MonthlyFeeRecord, bool)>;
    /// Raises the paid total to `max(stored, paid_amount)` and re-derives
    /// status. `paid_at_ms` is stamped on the first transition to `Paid`.
    ///
    /// Returns `None` when the key has no live record.
    fn apply_payment(
        &self,
        key: &FeeKey,
        paid_amount: Money,
        paid_at_ms: i64,
    ) -> RepoResult<Option<MonthlyFeeRecord>>;
    fn list_student_year(&self, student_id: PersonId, year: i32)
        -> RepoResult<Vec<MonthlyFeeRecord>>;
    fn list_period(&self, month: u32, year: i32) -> RepoResult<Vec<MonthlyFeeRecord>>;
    fn soft_delete_record(&self, id: FeeId) -> RepoResult<()>;
}

/// SQLite-backed fee repository.
pub struct SqliteFeeRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteFeeRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn immediate(&self) -> RepoResult<Transaction<'conn>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

impl FeeRepository for SqliteFeeRepository<'_> {
    fn create_plan(&self, plan: &FeePlan) -> RepoResult<PlanId> {
        let tx = self.immediate()?;
        if plan.is_monthly_default {
            clear_default_plan(&tx)?;
        }
        tx.execute(
            "INSERT INTO fee_plans (id, name, amount_minor, is_monthly_default, is_deleted)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                plan.id.to_string(),
                plan.name.as_str(),
                plan.amount.minor(),
                bool_to_int(plan.is_monthly_default),
                bool_to_int(plan.is_deleted),
            ],
        )?;
        tx.commit()?;
        Ok(plan.id)
    }

    fn set_default_plan(&self, id: PlanId) -> RepoResult<()> {
        let tx = self.immediate()?;
        let exists: i64 = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM fee_plans WHERE id = ?1 AND is_deleted = 0);",
            [id.to_string()],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(RepoError::NotFound {
                entity: "fee plan",
                id,
            });
        }

        clear_default_plan(&tx)?;
        tx.execute(
            "UPDATE fee_plans SET is_monthly_default = 1 WHERE id = ?1;",
            [id.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn default_plan(&self) -> RepoResult<Option<FeePlan>> {
        query_plans(
            self.conn,
            &format!("{PLAN_SELECT_SQL} WHERE is_monthly_default = 1 AND is_deleted = 0;"),
            params![],
        )
        .map(|plans| plans.into_iter().next())
    }

    fn list_plans(&self) -> RepoResult<Vec<FeePlan>> {
        query_plans(
            self.conn,
            &format!(
                "{PLAN_SELECT_SQL} WHERE is_deleted = 0 ORDER BY is_monthly_default DESC, name ASC;"
            ),
            params![],
        )
    }

    fn soft_delete_plan(&self, id: PlanId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE fee_plans SET is_deleted = 1 WHERE id = ?1 AND is_deleted = 0;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "fee plan",
                id,
            });
        }
        Ok(())
    }

    fn find_record(&self, key: &FeeKey) -> RepoResult<Option<MonthlyFeeRecord>> {
        find_record_with(self.conn, key)
    }

    fn get_record(&self, id: FeeId) -> RepoResult<Option<MonthlyFeeRecord>> {
        query_records(
            self.conn,
            &format!("{RECORD_SELECT_SQL} WHERE id = ?1 AND is_deleted = 0;"),
            params![id.to_string()],
        )
        .map(|records| records.into_iter().next())
    }

    fn insert_record_if_absent(
        &self,
        record: &MonthlyFeeRecord,
    ) -> RepoResult<(MonthlyFeeRecord, bool)> {
        let inserted = self.conn.execute(
            "INSERT INTO monthly_fees (
                id,
                student_id,
                parent_id,
                fee_plan_id,
                amount_minor,
                month,
                year,
                status,
                paid_amount_minor,
                paid_at,
                due_date,
                is_deleted,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13);",
            params![
                record.id.to_string(),
                record.student_id.to_string(),
                record.parent_id.to_string(),
                record.fee_plan_id.map(|id| id.to_string()),
                record.amount.minor(),
                record.month,
                record.year,
                record.status.as_str(),
                record.paid_amount.minor(),
                record.paid_at,
                day_to_db(record.due_date),
                bool_to_int(record.is_deleted),
                record.created_at,
            ],
        );

        match inserted {
            Ok(_) => Ok((record.clone(), true)),
            Err(err) if is_unique_violation(&err) => {
                debug!(
                    "event=fee_insert module=repo status=conflict month={} year={}",
                    record.month, record.year
                );
                let existing = find_live_record(
                    self.conn,
                    record.student_id,
                    record.month,
                    record.year,
                )?
                .ok_or_else(|| {
                    RepoError::InvalidData(
                        "unique conflict on monthly_fees without a live row".to_string(),
                    )
                })?;
                Ok((existing, false))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn apply_payment(
        &self,
        key: &FeeKey,
        paid_amount: Money,
        paid_at_ms: i64,
    ) -> RepoResult<Option<MonthlyFeeRecord>> {
        let tx = self.immediate()?;
        let Some(mut record) = find_record_with(&tx, key)? else {
            debug!(
                "event=fee_apply_payment module=repo status=missing period={}-{:02}",
                key.year(),
                key.month()
            );
            return Ok(None);
        };

        record.paid_amount = record.paid_amount.max(paid_amount);
        record.status = FeeStatus::derive(record.paid_amount, record.amount);
        if record.status == FeeStatus::Paid && record.paid_at.is_none() {
            record.paid_at = Some(paid_at_ms);
        }

        tx.execute(
            "UPDATE monthly_fees
             SET
                paid_amount_minor = ?1,
                status = ?2,
                paid_at = ?3,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?4;",
            params![
                record.paid_amount.minor(),
                record.status.as_str(),
                record.paid_at,
                record.id.to_string(),
            ],
        )?;
        tx.commit()?;
        Ok(Some(record))
    }

    fn list_student_year(
        &self,
        student_id: PersonId,
        year: i32,
    ) -> RepoResult<Vec<MonthlyFeeRecord>> {
        query_records(
            self.conn,
            &format!(
                "{RECORD_SELECT_SQL}
                 WHERE student_id = ?1 AND year = ?2 AND is_deleted = 0
                 ORDER BY month ASC;"
            ),
            params![student_id.to_string(), year],
        )
    }

    fn list_period(&self, month: u32, year: i32) -> RepoResult<Vec<MonthlyFeeRecord>> {
        query_records(
            self.conn,
            &format!(
                "{RECORD_SELECT_SQL}
                 WHERE month = ?1 AND year = ?2 AND is_deleted = 0
                 ORDER BY student_id ASC;"
            ),
            params![month, year],
        )
    }

    fn soft_delete_record(&self, id: FeeId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE monthly_fees
             SET
                is_deleted = 1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1 AND is_deleted = 0;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "fee record",
                id,
            });
        }
        Ok(())
    }
}

fn clear_default_plan(tx: &Transaction<'_>) -> RepoResult<()> {
    tx.execute(
        "UPDATE fee_plans
         SET is_monthly_default = 0
         WHERE is_monthly_default = 1 AND is_deleted = 0;",
        [],
    )?;
    Ok(())
}

fn find_record_with(conn: &Connection, key: &FeeKey) -> RepoResult<Option<MonthlyFeeRecord>> {
    find_live_record(conn, key.student_id(), key.month(), key.year())
}

fn find_live_record(
    conn: &Connection,
    student_id: PersonId,
    month: u32,
    year: i32,
) -> RepoResult<Option<MonthlyFeeRecord>> {
    query_records(
        conn,
        &format!(
            "{RECORD_SELECT_SQL}
             WHERE student_id = ?1 AND month = ?2 AND year = ?3 AND is_deleted = 0;"
        ),
        params![student_id.to_string(), month, year],
    )
    .map(|records| records.into_iter().next())
}

fn query_plans(
    conn: &Connection,
    sql: &str,
    bind: &[&dyn rusqlite::ToSql],
) -> RepoResult<Vec<FeePlan>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(bind)?;
    let mut plans = Vec::new();
    while let Some(row) = rows.next()? {
        plans.push(parse_plan_row(row)?);
    }
    Ok(plans)
}

fn query_records(
    conn: &Connection,
    sql: &str,
    bind: &[&dyn rusqlite::ToSql],
) -> RepoResult<Vec<MonthlyFeeRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(bind)?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(parse_record_row(row)?);
    }
    Ok(records)
}

fn parse_plan_row(row: &Row<'_>) -> RepoResult<FeePlan> {
    let id_text: String = row.get("id")?;
    Ok(FeePlan {
        id: parse_uuid(&id_text, "fee_plans.id")?,
        name: row.get("name")?,
        amount: Money::from_minor(row.get("amount_minor")?),
        is_monthly_default: parse_bool(
            row.get("is_monthly_default")?,
            "fee_plans.is_monthly_default",
        )?,
        is_deleted: parse_bool(row.get("is_deleted")?, "fee_plans.is_deleted")?,
    })
}

fn parse_record_row(row: &Row<'_>) -> RepoResult<MonthlyFeeRecord> {
    let id_text: String = row.get("id")?;
    let student_text: String = row.get("student_id")?;
    let parent_text: String = row.get("parent_id")?;
    let status_text: String = row.get("status")?;
    let due_text: String = row.get("due_date")?;

    let status = FeeStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid fee status `{status_text}` in monthly_fees.status"
        ))
    })?;
    let amount = Money::from_minor(row.get("amount_minor")?);
    let paid_amount = Money::from_minor(row.get("paid_amount_minor")?);
    if status != FeeStatus::derive(paid_amount, amount) {
        return Err(RepoError::InvalidData(format!(
            "monthly_fees.status `{status_text}` disagrees with paid {paid_amount} of {amount}"
        )));
    }

    Ok(MonthlyFeeRecord {
        id: parse_uuid(&id_text, "monthly_fees.id")?,
        student_id: parse_uuid(&student_text, "monthly_fees.student_id")?,
        parent_id: parse_uuid(&parent_text, "monthly_fees.parent_id")?,
        fee_plan_id: parse_optional_uuid(row.get("fee_plan_id")?, "monthly_fees.fee_plan_id")?,
        amount,
        month: row.get("month")?,
        year: row.get("year")?,
        status,
        paid_amount,
        paid_at: row.get("paid_at")?,
        due_date: parse_day(&due_text, "monthly_fees.due_date")?,
        is_deleted: parse_bool(row.get("is_deleted")?, "monthly_fees.is_deleted")?,
        created_at: row.get("created_at")?,
    })
}
