use academy_core::db::open_db_in_memory;
use academy_core::key::FeeKey;
use academy_core::model::fee::{FeeId, PlanId};
use academy_core::notify::{DispatchError, DomainEvent, NotificationDispatcher};
use academy_core::{
    CoreError, FeePlan, FeeRepository, FeeService, FeeStatus, MarkPaidOptions, Money,
    MonthlyFeeRecord, NoopDispatcher, PeriodError, PersonId, QueueDispatcher, RepoResult,
    RosterService, SqliteFeeRepository, SqliteRosterRepository, Student,
};
use chrono::NaiveDate;
use rusqlite::Connection;
use std::sync::Arc;
use uuid::Uuid;

type Ledger<'a> = FeeService<SqliteFeeRepository<'a>, SqliteRosterRepository<'a>>;

fn ledger(conn: &Connection, dispatcher: Arc<dyn NotificationDispatcher>) -> Ledger<'_> {
    FeeService::new(
        SqliteFeeRepository::new(conn),
        SqliteRosterRepository::new(conn),
        dispatcher,
    )
}

fn quiet_ledger(conn: &Connection) -> Ledger<'_> {
    ledger(conn, Arc::new(NoopDispatcher))
}

fn seed_student(conn: &Connection) -> Student {
    let roster = RosterService::new(SqliteRosterRepository::new(conn));
    let parent = roster
        .add_parent("Dana Parent", Some("dana@example.com".to_string()))
        .unwrap();
    roster.add_student("Sam Student", parent.id).unwrap()
}

fn pay(amount: Money, send_email: bool) -> MarkPaidOptions {
    MarkPaidOptions {
        send_email,
        amount: Some(amount),
    }
}

#[test]
fn ensure_is_idempotent_and_copies_parent() {
    let conn = open_db_in_memory().unwrap();
    let student = seed_student(&conn);
    let fees = quiet_ledger(&conn);

    let first = fees
        .ensure_monthly_record(student.id, 3, 2025, Some(Money::from_major(50)))
        .unwrap();
    let second = fees
        .ensure_monthly_record(student.id, 3, 2025, Some(Money::from_major(80)))
        .unwrap();

    assert_eq!(first, second);
    assert!(second.created_at > 0);
    assert_eq!(first.amount, Money::from_major(50));
    assert_eq!(first.status, FeeStatus::Unpaid);
    assert_eq!(first.paid_amount, Money::ZERO);
    assert_eq!(first.parent_id, student.parent_id);
    assert_eq!(fees.list_period(3, 2025).unwrap().len(), 1);
}

#[test]
fn full_payment_marks_record_paid_with_fifth_day_due_date() {
    let conn = open_db_in_memory().unwrap();
    let student = seed_student(&conn);
    let fees = quiet_ledger(&conn);

    let record = fees
        .mark_paid(
            student.id,
            3,
            2025,
            Money::from_major(50),
            pay(Money::from_major(50), false),
        )
        .unwrap();

    assert_eq!(record.status, FeeStatus::Paid);
    assert_eq!(record.paid_amount, Money::from_major(50));
    assert_eq!(record.due_date, NaiveDate::from_ymd_opt(2025, 3, 5).unwrap());
    assert!(record.paid_at.is_some());
}

#[test]
fn payments_are_monotone_and_paid_at_is_stamped_once() {
    let conn = open_db_in_memory().unwrap();
    let student = seed_student(&conn);
    let fees = quiet_ledger(&conn);
    let bill = Money::from_major(50);

    let partial = fees
        .mark_paid(student.id, 4, 2025, Money::from_major(20), pay(bill, false))
        .unwrap();
    assert_eq!(partial.status, FeeStatus::Partial);
    assert!(partial.paid_at.is_none());

    let paid = fees
        .mark_paid(student.id, 4, 2025, bill, pay(bill, false))
        .unwrap();
    assert_eq!(paid.status, FeeStatus::Paid);
    let paid_at = paid.paid_at.expect("paid_at set on first PAID transition");

    let lower = fees
        .mark_paid(student.id, 4, 2025, Money::from_major(10), pay(bill, false))
        .unwrap();
    assert_eq!(lower.paid_amount, bill);
    assert_eq!(lower.status, FeeStatus::Paid);
    assert_eq!(lower.paid_at, Some(paid_at));

    let stored = fees.get_record(paid.id).unwrap();
    assert_eq!(stored, lower);
}

#[test]
fn mark_paid_without_amount_uses_default_plan() {
    let conn = open_db_in_memory().unwrap();
    let student = seed_student(&conn);
    let fees = quiet_ledger(&conn);
    let plan = fees
        .create_plan("Monthly tuition", Money::from_major(60), true)
        .unwrap();

    let record = fees
        .mark_paid(
            student.id,
            1,
            2026,
            Money::from_major(30),
            MarkPaidOptions::default(),
        )
        .unwrap();

    assert_eq!(record.amount, Money::from_major(60));
    assert_eq!(record.fee_plan_id, Some(plan.id));
    assert_eq!(record.status, FeeStatus::Partial);
}

#[test]
fn ensure_without_amount_or_default_plan_fails() {
    let conn = open_db_in_memory().unwrap();
    let student = seed_student(&conn);
    let fees = quiet_ledger(&conn);

    let err = fees
        .ensure_monthly_record(student.id, 5, 2025, None)
        .unwrap_err();
    assert!(matches!(err, CoreError::NoDefaultFeePlan));
    assert!(fees.list_period(5, 2025).unwrap().is_empty());
}

#[test]
fn unknown_student_and_bad_periods_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let student = seed_student(&conn);
    let fees = quiet_ledger(&conn);
    let ghost = Uuid::new_v4();

    let err = fees
        .ensure_monthly_record(ghost, 3, 2025, Some(Money::from_major(50)))
        .unwrap_err();
    assert!(matches!(err, CoreError::StudentNotFound(id) if id == ghost));

    let err = fees.list_year(ghost, 2025).unwrap_err();
    assert!(matches!(err, CoreError::StudentNotFound(_)));

    let err = fees
        .ensure_monthly_record(student.id, 13, 2025, Some(Money::from_major(50)))
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::InvalidPeriod(PeriodError::MonthOutOfRange(13))
    ));

    let err = fees
        .mark_paid(
            student.id,
            3,
            2025,
            Money::from_minor(-1),
            MarkPaidOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidAmount(_)));
}

#[test]
fn list_year_returns_twelve_months_without_persisting_gaps() {
    let conn = open_db_in_memory().unwrap();
    let student = seed_student(&conn);
    let fees = quiet_ledger(&conn);
    let bill = Money::from_major(50);

    fees.mark_paid(student.id, 3, 2025, bill, pay(bill, false))
        .unwrap();
    fees.ensure_monthly_record(student.id, 7, 2025, Some(bill))
        .unwrap();

    let year = fees.list_year(student.id, 2025).unwrap();
    assert_eq!(year.len(), 12);
    assert_eq!(
        year.iter().map(|entry| entry.month).collect::<Vec<_>>(),
        (1..=12).collect::<Vec<_>>()
    );
    assert_eq!(year[2].status, FeeStatus::Paid);
    assert_eq!(year[2].amount, Some(bill));
    assert_eq!(year[6].status, FeeStatus::Unpaid);
    assert!(year[6].fee_id.is_some());
    assert_eq!(year[0].status, FeeStatus::Unpaid);
    assert!(year[0].amount.is_none());
    assert!(year[0].fee_id.is_none());

    let stored: i64 = conn
        .query_row("SELECT COUNT(*) FROM monthly_fees;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(stored, 2);
}

#[test]
fn only_one_plan_stays_default() {
    let conn = open_db_in_memory().unwrap();
    let fees = quiet_ledger(&conn);

    let first = fees.create_plan("Basic", Money::from_major(40), true).unwrap();
    let second = fees.create_plan("Premium", Money::from_major(90), true).unwrap();
    assert_eq!(fees.active_default_plan().unwrap().unwrap().id, second.id);

    fees.set_default_plan(first.id).unwrap();
    let defaults = fees
        .list_plans()
        .unwrap()
        .into_iter()
        .filter(|plan| plan.is_monthly_default)
        .collect::<Vec<_>>();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0].id, first.id);

    fees.delete_plan(first.id).unwrap();
    assert!(fees.active_default_plan().unwrap().is_none());
    assert!(matches!(
        fees.set_default_plan(first.id),
        Err(CoreError::PlanNotFound(_))
    ));
}

#[test]
fn deleting_a_record_frees_its_period() {
    let conn = open_db_in_memory().unwrap();
    let student = seed_student(&conn);
    let fees = quiet_ledger(&conn);

    let original = fees
        .ensure_monthly_record(student.id, 9, 2025, Some(Money::from_major(50)))
        .unwrap();
    fees.delete_record(original.id).unwrap();
    assert!(matches!(
        fees.get_record(original.id),
        Err(CoreError::RecordNotFound(_))
    ));
    assert!(matches!(
        fees.delete_record(original.id),
        Err(CoreError::RecordNotFound(_))
    ));

    let fresh = fees
        .ensure_monthly_record(student.id, 9, 2025, Some(Money::from_major(55)))
        .unwrap();
    assert_ne!(fresh.id, original.id);
    assert_eq!(fresh.amount, Money::from_major(55));
}

#[test]
fn generate_month_bills_active_students_once() {
    let conn = open_db_in_memory().unwrap();
    let fees = quiet_ledger(&conn);
    let roster = RosterService::new(SqliteRosterRepository::new(&conn));
    let parent = roster.add_parent("Lee", None).unwrap();
    let active = roster.add_student("Ari", parent.id).unwrap();
    let inactive = roster.add_student("Bo", parent.id).unwrap();
    roster.set_student_active(inactive.id, false).unwrap();

    assert!(matches!(
        fees.generate_month(2, 2025),
        Err(CoreError::NoDefaultFeePlan)
    ));

    fees.create_plan("Monthly", Money::from_major(45), true)
        .unwrap();
    let first = fees.generate_month(2, 2025).unwrap();
    assert_eq!((first.created, first.existing), (1, 0));
    let second = fees.generate_month(2, 2025).unwrap();
    assert_eq!((second.created, second.existing), (0, 1));

    let period = fees.list_period(2, 2025).unwrap();
    assert_eq!(period.len(), 1);
    assert_eq!(period[0].student_id, active.id);
    assert_eq!(period[0].amount, Money::from_major(45));
}

#[test]
fn fee_paid_is_emitted_only_when_requested() {
    let conn = open_db_in_memory().unwrap();
    let student = seed_student(&conn);
    let (dispatcher, events) = QueueDispatcher::channel();
    let fees = ledger(&conn, Arc::new(dispatcher));
    let bill = Money::from_major(50);

    fees.mark_paid(student.id, 3, 2025, bill, pay(bill, false))
        .unwrap();
    assert!(events.try_recv().is_err());

    let record = fees
        .mark_paid(student.id, 3, 2025, bill, pay(bill, true))
        .unwrap();
    assert_eq!(
        events.try_recv().unwrap(),
        DomainEvent::FeePaid { fee_id: record.id }
    );
}

struct FailingDispatcher;

impl NotificationDispatcher for FailingDispatcher {
    fn emit(&self, _event: &DomainEvent) -> Result<(), DispatchError> {
        Err(DispatchError::Delivery("mail relay offline".to_string()))
    }
}

struct PanickingDispatcher;

impl NotificationDispatcher for PanickingDispatcher {
    fn emit(&self, _event: &DomainEvent) -> Result<(), DispatchError> {
        panic!("template missing");
    }
}

#[test]
fn dispatcher_failures_do_not_fail_or_roll_back_payments() {
    let conn = open_db_in_memory().unwrap();
    let student = seed_student(&conn);
    let bill = Money::from_major(50);

    let failing = ledger(&conn, Arc::new(FailingDispatcher));
    let record = failing
        .mark_paid(student.id, 3, 2025, bill, pay(bill, true))
        .unwrap();
    assert_eq!(record.status, FeeStatus::Paid);

    let panicking = ledger(&conn, Arc::new(PanickingDispatcher));
    let record = panicking
        .mark_paid(student.id, 4, 2025, bill, pay(bill, true))
        .unwrap();
    assert_eq!(record.status, FeeStatus::Paid);
    assert_eq!(
        panicking.get_record(record.id).unwrap().status,
        FeeStatus::Paid
    );
}

/// Soft-deletes the period's bill right before every payment is applied.
struct DeletesBeforePayment<'conn> {
    inner: SqliteFeeRepository<'conn>,
}

impl FeeRepository for DeletesBeforePayment<'_> {
    fn create_plan(&self, plan: &FeePlan) -> RepoResult<PlanId> {
        self.inner.create_plan(plan)
    }

    fn set_default_plan(&self, id: PlanId) -> RepoResult<()> {
        self.inner.set_default_plan(id)
    }

    fn default_plan(&self) -> RepoResult<Option<FeePlan>> {
        self.inner.default_plan()
    }

    fn list_plans(&self) -> RepoResult<Vec<FeePlan>> {
        self.inner.list_plans()
    }

    fn soft_delete_plan(&self, id: PlanId) -> RepoResult<()> {
        self.inner.soft_delete_plan(id)
    }

    fn find_record(&self, key: &FeeKey) -> RepoResult<Option<MonthlyFeeRecord>> {
        self.inner.find_record(key)
    }

    fn get_record(&self, id: FeeId) -> RepoResult<Option<MonthlyFeeRecord>> {
        self.inner.get_record(id)
    }

    fn insert_record_if_absent(
        &self,
        record: &MonthlyFeeRecord,
    ) -> RepoResult<(MonthlyFeeRecord, bool)> {
        self.inner.insert_record_if_absent(record)
    }

    fn apply_payment(
        &self,
        key: &FeeKey,
        paid_amount: Money,
        paid_at_ms: i64,
    ) -> RepoResult<Option<MonthlyFeeRecord>> {
        if let Some(record) = self.inner.find_record(key)? {
            self.inner.soft_delete_record(record.id)?;
        }
        self.inner.apply_payment(key, paid_amount, paid_at_ms)
    }

    fn list_student_year(
        &self,
        student_id: PersonId,
        year: i32,
    ) -> RepoResult<Vec<MonthlyFeeRecord>> {
        self.inner.list_student_year(student_id, year)
    }

    fn list_period(&self, month: u32, year: i32) -> RepoResult<Vec<MonthlyFeeRecord>> {
        self.inner.list_period(month, year)
    }

    fn soft_delete_record(&self, id: FeeId) -> RepoResult<()> {
        self.inner.soft_delete_record(id)
    }
}

#[test]
fn payment_on_a_bill_deleted_mid_flight_is_record_not_found() {
    let conn = open_db_in_memory().unwrap();
    let student = seed_student(&conn);
    let (dispatcher, events) = QueueDispatcher::channel();
    let fees = FeeService::new(
        DeletesBeforePayment {
            inner: SqliteFeeRepository::new(&conn),
        },
        SqliteRosterRepository::new(&conn),
        Arc::new(dispatcher),
    );
    let bill = Money::from_major(50);

    let err = fees
        .mark_paid(student.id, 3, 2025, bill, pay(bill, true))
        .unwrap_err();
    assert!(matches!(err, CoreError::RecordNotFound(_)), "{err:?}");
    assert_eq!(err.code(), "not_found");
    assert!(events.try_recv().is_err());
    assert!(quiet_ledger(&conn).list_period(3, 2025).unwrap().is_empty());
}
