//! RelationalBackend integration tests against a temp-file SQLite database.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use chrono::Utc;
use sea_orm::{ActiveValue::NotSet, ActiveValue::Set, EntityTrait};
use tempfile::TempDir;

use quotawatch_core::error::CoreError;
use quotawatch_core::traits::PersistenceBackend;
use quotawatch_core::types::{Account, EncryptedToken, EventType, UserRole, WebhookRegistration};
use quotawatch_store::relational::entity;
use quotawatch_store::RelationalBackend;

async fn setup() -> (TempDir, RelationalBackend) {
    let dir = TempDir::new().expect("temp dir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
    let backend = RelationalBackend::connect(&url).await.expect("connect");
    (dir, backend)
}

fn registration(id: &str, user_id: Option<i64>) -> WebhookRegistration {
    WebhookRegistration {
        id: id.to_string(),
        user_id,
        name: format!("hook-{id}"),
        url: "http://localhost/hook".to_string(),
        secret: Some("s3cret".to_string()),
        events: vec![EventType::QuotaWarning, EventType::ServiceDown],
        enabled: true,
        created_at: Utc::now(),
    }
}

// ===== Accounts =====

#[tokio::test]
async fn save_accounts_replaces_whole_scope() {
    let (_dir, backend) = setup().await;

    backend
        .save_accounts(None, &[Account::new("a", "t1"), Account::new("b", "t2")])
        .await
        .unwrap();
    backend
        .save_accounts(None, &[Account::new("c", "t3")])
        .await
        .unwrap();

    let accounts = backend.load_accounts(None).await.unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].name, "c");
}

#[tokio::test]
async fn scopes_do_not_interfere() {
    let (_dir, backend) = setup().await;

    let uid = backend
        .create_user("alice", "h", UserRole::User)
        .await
        .unwrap();
    backend
        .save_accounts(None, &[Account::new("global", "g")])
        .await
        .unwrap();
    backend
        .save_accounts(Some(uid), &[Account::new("mine", "m")])
        .await
        .unwrap();

    backend.save_accounts(Some(uid), &[]).await.unwrap();

    assert_eq!(backend.load_accounts(None).await.unwrap().len(), 1);
    assert!(backend.load_accounts(Some(uid)).await.unwrap().is_empty());
}

#[tokio::test]
async fn encrypted_token_columns_roundtrip() {
    let (_dir, backend) = setup().await;

    let account = Account {
        name: "enc".to_string(),
        token: None,
        encrypted_token: Some(EncryptedToken {
            ciphertext: "Y2lwaGVy".to_string(),
            nonce: "bm9uY2U=".to_string(),
        }),
        user_id: None,
    };
    backend.save_accounts(None, &[account]).await.unwrap();

    let loaded = backend.load_accounts(None).await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert!(loaded[0].token.is_none());
    let enc = loaded[0].encrypted_token.as_ref().unwrap();
    assert_eq!(enc.ciphertext, "Y2lwaGVy");
    assert_eq!(enc.nonce, "bm9uY2U=");
}

#[tokio::test]
async fn load_accounts_ordered_by_insertion() {
    let (_dir, backend) = setup().await;

    let accounts: Vec<Account> = (0..4)
        .map(|i| Account::new(format!("acc-{i}"), "t"))
        .collect();
    backend.save_accounts(None, &accounts).await.unwrap();

    let names: Vec<String> = backend
        .load_accounts(None)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.name)
        .collect();
    assert_eq!(names, vec!["acc-0", "acc-1", "acc-2", "acc-3"]);
}

// ===== Admin credential =====

#[tokio::test]
async fn admin_credential_upserts() {
    let (_dir, backend) = setup().await;

    assert!(backend.load_admin_credential().await.unwrap().is_none());
    backend.save_admin_credential("first").await.unwrap();
    backend.save_admin_credential("second").await.unwrap();
    assert_eq!(
        backend.load_admin_credential().await.unwrap().as_deref(),
        Some("second")
    );
}

// ===== Users =====

#[tokio::test]
async fn duplicate_username_maps_to_user_exists() {
    let (_dir, backend) = setup().await;

    backend
        .create_user("alice", "h1", UserRole::Admin)
        .await
        .unwrap();
    let err = backend
        .create_user("alice", "h2", UserRole::User)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::UserExists(_)));
}

#[tokio::test]
async fn get_user_roundtrips_role_and_timestamp() {
    let (_dir, backend) = setup().await;

    backend
        .create_user("admin-user", "hash", UserRole::Admin)
        .await
        .unwrap();
    let user = backend.get_user("admin-user").await.unwrap().unwrap();
    assert_eq!(user.role, UserRole::Admin);
    assert!(user.created_at <= Utc::now());
    assert!(backend.get_user("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn delete_user_cascades_via_foreign_keys() {
    let (_dir, backend) = setup().await;

    let uid = backend
        .create_user("alice", "h", UserRole::User)
        .await
        .unwrap();
    backend
        .save_accounts(Some(uid), &[Account::new("owned", "t")])
        .await
        .unwrap();
    backend
        .save_webhook(&registration("cafe000011112222", Some(uid)))
        .await
        .unwrap();

    assert!(backend.delete_user(uid).await.unwrap());
    assert!(!backend.delete_user(uid).await.unwrap());

    assert!(backend.load_accounts(Some(uid)).await.unwrap().is_empty());
    assert!(backend.get_webhooks(Some(uid)).await.unwrap().is_empty());
}

// ===== Webhooks =====

#[tokio::test]
async fn webhook_upsert_and_events_roundtrip() {
    let (_dir, backend) = setup().await;

    let mut hook = registration("beef000011112222", None);
    backend.save_webhook(&hook).await.unwrap();

    hook.events = vec![EventType::Test];
    hook.enabled = false;
    hook.secret = None;
    backend.save_webhook(&hook).await.unwrap();

    let all = backend.get_all_webhooks().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].events, vec![EventType::Test]);
    assert!(!all[0].enabled);
    assert!(all[0].secret.is_none());
}

#[tokio::test]
async fn webhook_scope_filter() {
    let (_dir, backend) = setup().await;

    let uid = backend
        .create_user("owner", "h", UserRole::User)
        .await
        .unwrap();
    backend
        .save_webhook(&registration("aaaa000011112222", None))
        .await
        .unwrap();
    backend
        .save_webhook(&registration("bbbb000011112222", Some(uid)))
        .await
        .unwrap();

    assert_eq!(backend.get_webhooks(None).await.unwrap().len(), 1);
    assert_eq!(backend.get_webhooks(Some(uid)).await.unwrap().len(), 1);
    assert_eq!(backend.get_all_webhooks().await.unwrap().len(), 2);

    assert!(backend.delete_webhook("aaaa000011112222").await.unwrap());
    assert!(!backend.delete_webhook("aaaa000011112222").await.unwrap());
}

// ===== Usage history =====

#[tokio::test]
async fn usage_history_filters_but_never_deletes() {
    let (_dir, backend) = setup().await;

    // Insert an out-of-window row directly; a later write must not prune it.
    let stale = entity::usage_history::ActiveModel {
        id: NotSet,
        account_name: Set("old-acc".to_string()),
        usage_amount: Set(5.0),
        recorded_at: Set((Utc::now() - chrono::Duration::days(45)).to_rfc3339()),
    };
    entity::usage_history::Entity::insert(stale)
        .exec(backend.connection())
        .await
        .unwrap();

    backend.record_usage("fresh-acc", 1.0).await.unwrap();

    // 30-day window hides the stale row...
    let recent = backend.get_usage_history(None, 30).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].account_name, "fresh-acc");

    // ...but the row is still stored and reachable with a wider window.
    let wide = backend.get_usage_history(None, 90).await.unwrap();
    assert_eq!(wide.len(), 2);

    let rows = entity::usage_history::Entity::find()
        .all(backend.connection())
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn usage_history_name_filter_and_order() {
    let (_dir, backend) = setup().await;

    backend.record_usage("a", 1.0).await.unwrap();
    backend.record_usage("b", 2.0).await.unwrap();
    backend.record_usage("a", 3.0).await.unwrap();

    let only_a = backend.get_usage_history(Some("a"), 7).await.unwrap();
    assert_eq!(only_a.len(), 2);
    assert!(only_a[0].recorded_at <= only_a[1].recorded_at);
    assert!((only_a[0].usage_amount - 1.0).abs() < f64::EPSILON);
}
