//! `PostgresStore` against a real database.
//!
//! Needs Docker. Run with `--features postgres`.

#![cfg(feature = "postgres")]

mod common;

use chrono::Utc;
use checkin::{
    AttendanceId, AttendanceStore, CheckInError, CheckInMethod, LinkStatus, MemberDirectory,
    NewAttendance, NewMember,
};
use common::postgres::{unique_name, unique_phone, PgHarness, FAIL_ON_LINK};

#[tokio::test]
async fn test_sequential_duplicate_check_in() {
    let h = PgHarness::new().await;
    let member = h.add_member(&unique_name("Yaw"), None).await;

    h.check_in(member).await;
    let err = h
        .store
        .insert(NewAttendance::member(member, h.event, CheckInMethod::Qr, Utc::now()))
        .await
        .unwrap_err();

    assert!(matches!(err, CheckInError::DuplicateCheckIn { member_id, .. } if member_id == member));
    assert_eq!(h.attendance_rows().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_check_ins_leave_one_row() {
    let h = PgHarness::new().await;
    let member = h.add_member(&unique_name("Akosua"), None).await;

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let store = h.store.clone();
            let event = h.event;
            tokio::spawn(async move {
                store
                    .insert(NewAttendance::member(member, event, CheckInMethod::Qr, Utc::now()))
                    .await
            })
        })
        .collect();

    let mut created = 0;
    let mut duplicates = 0;
    for result in futures::future::join_all(handles).await {
        match result.unwrap() {
            Ok(_) => created += 1,
            Err(CheckInError::DuplicateCheckIn { .. }) => duplicates += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(duplicates, 15);
    assert_eq!(h.attendance_rows().await, 1);
}

#[tokio::test]
async fn test_visitors_are_not_unique() {
    let h = PgHarness::new().await;
    h.visitor("Walk-in", None).await;
    h.visitor("Walk-in", None).await;

    assert_eq!(h.store.list_for_event(h.event).await.unwrap().len(), 2);
    assert_eq!(h.store.list_unreconciled(h.event).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_link_conflict_leaves_both_rows_unchanged() {
    let h = PgHarness::new().await;
    let member = h.add_member(&unique_name("Esi"), None).await;
    let checked_in = h.check_in(member).await;
    let visitor = h.visitor("Esi O.", None).await;

    let err = h
        .store
        .link_member(visitor.id, member, Utc::now())
        .await
        .unwrap_err();

    match err {
        CheckInError::ConflictingAttendance { member_id, existing } => {
            assert_eq!(member_id, member);
            assert_eq!(existing, checked_in.id);
        }
        other => panic!("expected ConflictingAttendance, got {other}"),
    }
    assert_eq!(h.store.find(checked_in.id).await.unwrap(), Some(checked_in));
    assert_eq!(h.store.find(visitor.id).await.unwrap(), Some(visitor));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_links_name_the_winning_record() {
    for _ in 0..5 {
        let h = PgHarness::new().await;
        let member = h.add_member(&unique_name("Kojo"), None).await;
        let first = h.visitor("Kojo", None).await;
        let second = h.visitor("Kojo A.", None).await;

        let (a, b) = tokio::join!(
            h.store.link_member(first.id, member, Utc::now()),
            h.store.link_member(second.id, member, Utc::now()),
        );

        let (winner, loser) = match (a, b) {
            (Ok(winner), Err(loser)) | (Err(loser), Ok(winner)) => (winner, loser),
            (a, b) => panic!("expected exactly one link to win: {a:?} / {b:?}"),
        };
        match loser {
            CheckInError::ConflictingAttendance { existing, .. } => {
                assert_eq!(existing, winner.id)
            }
            other => panic!("expected ConflictingAttendance, got {other}"),
        }
        assert_eq!(h.store.list_unreconciled(h.event).await.unwrap().len(), 1);
    }
}

#[tokio::test]
async fn test_link_keeps_check_in_time() {
    let h = PgHarness::new().await;
    let member = h.add_member(&unique_name("Adwoa"), None).await;
    let visitor = h.visitor("Adwoa", None).await;

    let linked = h
        .store
        .link_member(visitor.id, member, Utc::now())
        .await
        .unwrap();

    assert_eq!(linked.member_id, Some(member));
    assert_eq!(linked.link_status, LinkStatus::Linked);
    assert_eq!(linked.check_in_time, visitor.check_in_time);
    assert!(linked.linked_at.is_some());
    assert_eq!(h.store.list_for_member(member).await.unwrap(), vec![linked]);
}

#[tokio::test]
async fn test_link_unknown_record_or_member() {
    let h = PgHarness::new().await;
    let member = h.add_member(&unique_name("Kwesi"), None).await;
    let visitor = h.visitor("Kwesi", None).await;

    let missing = AttendanceId::new();
    assert!(matches!(
        h.store.link_member(missing, member, Utc::now()).await,
        Err(CheckInError::RecordNotFound(id)) if id == missing
    ));
    assert!(matches!(
        h.store
            .link_member(visitor.id, checkin::MemberId::new(), Utc::now())
            .await,
        Err(CheckInError::MemberNotFound(_))
    ));
    assert_eq!(h.store.find(visitor.id).await.unwrap(), Some(visitor));
}

#[tokio::test]
async fn test_create_member_and_link() {
    let h = PgHarness::new().await;
    let name = unique_name("Akua Mensah");
    let visitor = h.visitor(&name, None).await;

    let (record, member) = h
        .store
        .create_member_and_link(visitor.id, NewMember::default(), Utc::now())
        .await
        .unwrap();

    assert_eq!(member.full_name, name);
    assert_eq!(member.phone, visitor.visitor_phone);
    assert_eq!(record.member_id, Some(member.id));
    assert_eq!(record.link_status, LinkStatus::Linked);
    assert_eq!(h.store.find_member(member.id).await.unwrap(), Some(member));
}

#[tokio::test]
async fn test_failed_create_and_link_leaves_no_member() {
    let h = PgHarness::new().await;
    let name = unique_name("Orphan Candidate");
    let visitor = h.visitor(&name, Some(FAIL_ON_LINK)).await;

    let err = h
        .store
        .create_member_and_link(visitor.id, NewMember::default(), Utc::now())
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(h.members_named(&name).await, 0);
    assert_eq!(h.store.find(visitor.id).await.unwrap(), Some(visitor));
}

#[tokio::test]
async fn test_shared_phone_matches_nobody() {
    let h = PgHarness::new().await;
    let household = unique_phone();
    h.add_member(&unique_name("Kwame Asante"), Some(&household)).await;
    h.add_member(&unique_name("Ama Asante"), Some(&household)).await;

    let own = unique_phone();
    let sole = h.add_member(&unique_name("Yaa Asante"), Some(&own)).await;

    assert!(h.store.find_by_phone(&household).await.unwrap().is_none());
    assert_eq!(
        h.store.find_by_phone(&own).await.unwrap().map(|m| m.id),
        Some(sole)
    );
}

#[tokio::test]
async fn test_ping() {
    let h = PgHarness::new().await;
    h.store.ping().await.unwrap();
}
