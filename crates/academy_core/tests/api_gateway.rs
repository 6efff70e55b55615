use academy_core::api::{ROUTE_FEE_PAY, ROUTE_FEE_YEAR};
use academy_core::db::open_db_in_memory;
use academy_core::{
    AccessPolicy, ApiResponse, AttendanceStatus, CoreError, DomainEvent, FeeRequest, FeeStatus,
    Gateway, ListYearRequest, MarkAttendanceRequest, Money, QueueDispatcher, RosterService,
    SqliteRosterRepository, SubjectKind,
};
use std::sync::Arc;

#[test]
fn fee_requests_are_gated_then_applied() {
    let conn = open_db_in_memory().unwrap();
    let policy = AccessPolicy::academy_default();
    let (dispatcher, events) = QueueDispatcher::channel();
    let gateway = Gateway::new(&conn, &policy, Arc::new(dispatcher));
    let roster = RosterService::new(SqliteRosterRepository::new(&conn));
    let parent = roster.add_parent("Ola", None).unwrap();
    let student = roster.add_student("Uma", parent.id).unwrap();

    let request = FeeRequest {
        student_id: student.id,
        month: 3,
        year: 2025,
        amount: Some(Money::from_major(50)),
        paid_amount: Some(Money::from_major(50)),
        send_email: true,
    };

    let err = gateway.submit_fee(Some("parent"), &request).unwrap_err();
    assert!(matches!(err, CoreError::Unauthorized { .. }));
    assert!(events.try_recv().is_err());
    assert!(!gateway.check_access(ROUTE_FEE_PAY, Some("teacher")));

    let record = gateway.submit_fee(Some("admin"), &request).unwrap();
    assert_eq!(record.status, FeeStatus::Paid);
    assert_eq!(
        events.try_recv().unwrap(),
        DomainEvent::FeePaid { fee_id: record.id }
    );

    assert!(gateway.check_access(ROUTE_FEE_YEAR, Some("parent")));
    let year = gateway
        .list_year(
            Some("parent"),
            &ListYearRequest {
                student_id: student.id,
                year: 2025,
            },
        )
        .unwrap();
    assert_eq!(year.len(), 12);
    assert_eq!(year[2].fee_id, Some(record.id));
}

#[test]
fn attendance_requests_report_created_flag() {
    let conn = open_db_in_memory().unwrap();
    let policy = AccessPolicy::academy_default();
    let (dispatcher, _events) = QueueDispatcher::channel();
    let gateway = Gateway::new(&conn, &policy, Arc::new(dispatcher));
    let coach = RosterService::new(SqliteRosterRepository::new(&conn))
        .add_member(SubjectKind::Coach, "Noor")
        .unwrap();

    let request = MarkAttendanceRequest {
        subject_id: coach.id,
        subject_kind: SubjectKind::Coach,
        date: "2025-03-10".to_string(),
        status: AttendanceStatus::Present,
    };
    let first = gateway.mark_attendance(Some("teacher"), &request).unwrap();
    assert!(first.created);

    let replay = gateway
        .mark_attendance(
            Some("admin"),
            &MarkAttendanceRequest {
                status: AttendanceStatus::Absent,
                ..request.clone()
            },
        )
        .unwrap();
    assert!(!replay.created);
    assert_eq!(replay.status, AttendanceStatus::Present);

    assert!(matches!(
        gateway.mark_attendance(Some("student"), &request),
        Err(CoreError::Unauthorized { .. })
    ));
    assert_eq!(
        gateway
            .marked_status(Some("student"), coach.id, SubjectKind::Coach, "2025-03-10")
            .unwrap(),
        Some(AttendanceStatus::Present)
    );
}

#[test]
fn responses_wrap_failures_with_codes_and_messages() {
    let conn = open_db_in_memory().unwrap();
    let policy = AccessPolicy::academy_default();
    let (dispatcher, _events) = QueueDispatcher::channel();
    let gateway = Gateway::new(&conn, &policy, Arc::new(dispatcher));

    let request = FeeRequest {
        student_id: uuid::Uuid::new_v4(),
        month: 3,
        year: 2025,
        amount: None,
        paid_amount: None,
        send_email: false,
    };
    let response = ApiResponse::from_result(
        gateway.submit_fee(Some("admin"), &request),
        "fee record ready",
    );
    assert!(!response.ok);
    assert!(response.data.is_none());
    assert_eq!(response.error_code.as_deref(), Some("not_found"));
    assert!(response.message.contains("student not found"));

    let ok = ApiResponse::from_result(Ok::<u32, CoreError>(7), "done");
    assert!(ok.ok);
    assert_eq!(ok.data, Some(7));
    assert_eq!(ok.message, "done");
}
