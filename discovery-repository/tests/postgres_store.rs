//! Integration tests for the PostgreSQL catalog store.
//!
//! These tests require a real PostgreSQL database (`DATABASE_URL`) and are
//! ignored by default.
//!
//! Run with: `cargo test --test postgres_store -- --ignored`

use discovery_repository::{
    CatalogRepositoryError, CatalogStore, PostgresCatalogStore, RecordFilter, RecordWrite,
    StoreOutcome,
};
use discovery_shared::{
    ChangeContext, Course, CourseRun, EntityKind, HistoryType, SkillValidationConfiguration,
    DEFAULT_EXCLUDED_FIELDS,
};

fn write<E: discovery_shared::CatalogEntity>(entity: &E) -> RecordWrite {
    let excluded: Vec<String> = DEFAULT_EXCLUDED_FIELDS.iter().map(|s| s.to_string()).collect();
    RecordWrite::from_entity(entity, Some("courses_api"), &excluded).unwrap()
}

async fn store_with_partner(pool: sqlx::PgPool) -> (PostgresCatalogStore, i64) {
    let store = PostgresCatalogStore::new(pool).await.unwrap();
    let partner = store.ensure_partner("edx", "edX").await.unwrap();
    (store, partner.id)
}

fn course(partner_id: i64, title: &str) -> Course {
    Course {
        partner_id,
        key: "MITx+0.111x".into(),
        title: Some(title.into()),
        ..Default::default()
    }
}

#[sqlx::test(migrations = "src/postgres/migrations")]
#[ignore]
async fn test_upsert_twice_appends_one_history_row(pool: sqlx::PgPool) {
    let (store, partner_id) = store_with_partner(pool).await;
    let ctx = ChangeContext::refresh();

    let first = store.save(write(&course(partner_id, "Circuits")), &ctx).await.unwrap();
    let second = store.save(write(&course(partner_id, "Circuits")), &ctx).await.unwrap();

    assert!(matches!(first, StoreOutcome::Created(_)));
    assert!(matches!(second, StoreOutcome::Unchanged(_)));

    let history = store.history(EntityKind::Course, first.record().id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].history_type, HistoryType::Created);
    assert_eq!(history[0].change_reason.as_deref(), Some("refresh_course_metadata"));
}

#[sqlx::test(migrations = "src/postgres/migrations")]
#[ignore]
async fn test_update_and_delete_history(pool: sqlx::PgPool) {
    let (store, partner_id) = store_with_partner(pool).await;
    let ctx = ChangeContext::refresh();

    let id = store
        .save(write(&course(partner_id, "Circuits")), &ctx)
        .await
        .unwrap()
        .record()
        .id;
    let updated = store.save(write(&course(partner_id, "Electronics")), &ctx).await.unwrap();
    match updated {
        StoreOutcome::Updated { changes, .. } => assert_eq!(changes[0].field, "title"),
        other => panic!("expected update, got {other:?}"),
    }

    store.delete(EntityKind::Course, id, &ctx).await.unwrap();
    let types: Vec<_> = store
        .history(EntityKind::Course, id)
        .await
        .unwrap()
        .into_iter()
        .map(|h| h.history_type)
        .collect();
    assert_eq!(
        types,
        vec![HistoryType::Created, HistoryType::Changed, HistoryType::Deleted]
    );
}

#[sqlx::test(migrations = "src/postgres/migrations")]
#[ignore]
async fn test_draft_and_official_runs_share_key(pool: sqlx::PgPool) {
    let (store, partner_id) = store_with_partner(pool).await;
    let ctx = ChangeContext::refresh();
    let run = CourseRun {
        partner_id,
        course_id: 1,
        key: "course-v1:MITx+0.111x+2T2015".into(),
        ..Default::default()
    };

    let official = store.save(write(&run), &ctx).await.unwrap().into_record();
    let draft = CourseRun {
        draft: true,
        uuid: official.uuid,
        ..run
    };
    let draft = store.save(write(&draft), &ctx).await.unwrap().into_record();

    assert_ne!(official.id, draft.id);
    assert_eq!(official.uuid, draft.uuid);
    let rows = store
        .list(EntityKind::CourseRun, &RecordFilter::partner(partner_id))
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
}

#[sqlx::test(migrations = "src/postgres/migrations")]
#[ignore]
async fn test_skill_validation_check_constraint(pool: sqlx::PgPool) {
    let (store, partner_id) = store_with_partner(pool).await;
    let ctx = ChangeContext::refresh();

    let both = SkillValidationConfiguration {
        partner_id,
        course_id: Some(1),
        organization_id: Some(2),
        ..Default::default()
    };
    let err = store.save(write(&both), &ctx).await.unwrap_err();
    assert!(matches!(err, CatalogRepositoryError::ValidationError(_)));
}

#[sqlx::test(migrations = "src/postgres/migrations")]
#[ignore]
async fn test_idempotency_key_and_slug_history(pool: sqlx::PgPool) {
    let (store, partner_id) = store_with_partner(pool).await;
    let ctx = ChangeContext::refresh().with_idempotency_key("req-1");

    let id = store
        .save(write(&course(partner_id, "Circuits")), &ctx)
        .await
        .unwrap()
        .record()
        .id;
    let replay = store
        .save(write(&course(partner_id, "Other")), &ctx)
        .await
        .unwrap();
    assert!(matches!(replay, StoreOutcome::Unchanged(_)));

    store.record_historical_slug(partner_id, id, "circuits").await.unwrap();
    assert_eq!(
        store
            .find_course_by_historical_slug(partner_id, "circuits")
            .await
            .unwrap(),
        Some(id)
    );
}

#[sqlx::test(migrations = "src/postgres/migrations")]
#[ignore]
async fn test_replace_history_user_counts_rows(pool: sqlx::PgPool) {
    let (store, partner_id) = store_with_partner(pool).await;
    let ctx = ChangeContext::refresh().with_user("alice");

    store.save(write(&course(partner_id, "A")), &ctx).await.unwrap();
    store.save(write(&course(partner_id, "B")), &ctx).await.unwrap();

    assert_eq!(store.replace_history_user("alice", "alice2").await.unwrap(), 2);
    assert_eq!(store.replace_history_user("ghost", "x").await.unwrap(), 0);
}
