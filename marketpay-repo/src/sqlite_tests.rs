//! SQLite adapter integration tests against an in-memory database.

use chrono::Utc;

use marketpay_types::{
    CardNetwork, ChargeRecord, FailureRecord, NewOrder, NotificationStatus, OrderRepository,
    PaymentDetail, PaymentMode, PaymentStatus, RefundRecord, UserId,
};

use crate::security::hash_api_key;
use crate::sqlite::SqliteRepo;

async fn repo() -> SqliteRepo {
    SqliteRepo::new("sqlite::memory:").await.unwrap()
}

fn new_order(user_id: UserId, mode: PaymentMode, dinars: i64) -> NewOrder {
    NewOrder {
        user_id,
        provider_id: Some(UserId::new()),
        total: marketpay_types::Amount::from_dinars(dinars).unwrap(),
        payment_mode: mode,
    }
}

fn charge_record() -> ChargeRecord {
    ChargeRecord {
        card_last4: "1111".to_string(),
        card_network: CardNetwork::Cib,
        authorization_code: "123456".to_string(),
        response_code: "00".to_string(),
        completed_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_insert_and_get_round_trip() {
    let repo = repo().await;
    let user = UserId::new();

    let order = repo
        .insert_order(new_order(user, PaymentMode::Cib, 1200))
        .await
        .unwrap();

    let loaded = repo.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(loaded.order_number, order.order_number);
    assert_eq!(loaded.user_id, user);
    assert_eq!(loaded.total.centimes(), 120_000);
    assert_eq!(loaded.payment_status, PaymentStatus::Pending);
    assert!(loaded.payment_detail.is_empty());
}

#[tokio::test]
async fn test_find_for_user_resolves_number_then_id() {
    let repo = repo().await;
    let user = UserId::new();
    let order = repo
        .insert_order(new_order(user, PaymentMode::Cib, 1200))
        .await
        .unwrap();

    let by_number = repo
        .find_for_user(user, &order.order_number)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_number.id, order.id);

    let by_id = repo
        .find_for_user(user, &order.id.to_string())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_id.id, order.id);

    assert!(
        repo.find_for_user(user, "ORD-DOESNOTEXIST")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_find_for_user_is_scoped() {
    let repo = repo().await;
    let owner = UserId::new();
    let stranger = UserId::new();
    let order = repo
        .insert_order(new_order(owner, PaymentMode::Cib, 1200))
        .await
        .unwrap();

    // Another user cannot see the order through either identifier.
    assert!(
        repo.find_for_user(stranger, &order.order_number)
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        repo.find_for_user(stranger, &order.id.to_string())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_begin_processing_is_compare_and_set() {
    let repo = repo().await;
    let order = repo
        .insert_order(new_order(UserId::new(), PaymentMode::Cib, 1200))
        .await
        .unwrap();

    // PENDING -> PROCESSING wins exactly once.
    assert!(repo.begin_processing(order.id).await.unwrap());
    assert!(!repo.begin_processing(order.id).await.unwrap());

    // FAILED is retryable.
    let detail = PaymentDetail::default().with_failure(FailureRecord {
        error: "Authorization refused".to_string(),
        code: "05".to_string(),
        transaction_id: None,
        failed_at: Utc::now(),
    });
    repo.record_outcome(order.id, PaymentStatus::Failed, None, &detail)
        .await
        .unwrap();
    assert!(repo.begin_processing(order.id).await.unwrap());

    // SUCCESS is not.
    repo.record_outcome(order.id, PaymentStatus::Success, Some("txn_1"), &detail)
        .await
        .unwrap();
    assert!(!repo.begin_processing(order.id).await.unwrap());
}

#[tokio::test]
async fn test_record_outcome_success_sets_fields() {
    let repo = repo().await;
    let order = repo
        .insert_order(new_order(UserId::new(), PaymentMode::Cib, 1200))
        .await
        .unwrap();

    let detail = PaymentDetail::default().with_charge(charge_record());
    repo.record_outcome(order.id, PaymentStatus::Success, Some("txn_42"), &detail)
        .await
        .unwrap();

    let loaded = repo.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(loaded.payment_status, PaymentStatus::Success);
    assert_eq!(loaded.transaction_id.as_deref(), Some("txn_42"));
    assert_eq!(
        loaded.payment_detail.charge.as_ref().unwrap().card_last4,
        "1111"
    );
}

#[tokio::test]
async fn test_detail_merge_survives_later_operations() {
    let repo = repo().await;
    let order = repo
        .insert_order(new_order(UserId::new(), PaymentMode::Cib, 1200))
        .await
        .unwrap();

    let detail = PaymentDetail::default().with_charge(charge_record());
    repo.record_outcome(order.id, PaymentStatus::Success, Some("txn_42"), &detail)
        .await
        .unwrap();

    // Refund merges onto what is stored, charge record intact.
    let loaded = repo.get_order(order.id).await.unwrap().unwrap();
    let merged = loaded.payment_detail.with_refund(RefundRecord {
        refund_id: "rf_1".to_string(),
        amount: loaded.total,
        reason: None,
        status: "PROCESSED".to_string(),
        estimated_delay: "5-7 business days".to_string(),
        requested_at: Utc::now(),
    });
    repo.record_outcome(order.id, PaymentStatus::Refunded, None, &merged)
        .await
        .unwrap();

    let final_order = repo.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(final_order.payment_status, PaymentStatus::Refunded);
    assert_eq!(final_order.transaction_id.as_deref(), Some("txn_42"));
    assert!(final_order.payment_detail.charge.is_some());
    assert!(final_order.payment_detail.refund.is_some());
}

#[tokio::test]
async fn test_confirm_cash_forces_mode_and_pending() {
    let repo = repo().await;
    let order = repo
        .insert_order(new_order(UserId::new(), PaymentMode::Edahabia, 800))
        .await
        .unwrap();
    repo.begin_processing(order.id).await.unwrap();

    repo.confirm_cash(order.id).await.unwrap();

    let loaded = repo.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(loaded.payment_mode, PaymentMode::Cash);
    assert_eq!(loaded.payment_status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_webhook_lookup_prefers_transaction_id() {
    let repo = repo().await;
    let first = repo
        .insert_order(new_order(UserId::new(), PaymentMode::Cib, 1200))
        .await
        .unwrap();
    let second = repo
        .insert_order(new_order(UserId::new(), PaymentMode::Cib, 900))
        .await
        .unwrap();

    repo.store_transaction_id(first.id, "txn_a").await.unwrap();

    let found = repo
        .find_by_transaction_or_number(Some("txn_a"), Some(&second.order_number))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, first.id);

    // Falls back to the order number when the transaction id is unknown.
    let found = repo
        .find_by_transaction_or_number(Some("txn_unknown"), Some(&second.order_number))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, second.id);

    assert!(
        repo.find_by_transaction_or_number(None, None)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_list_for_user_paginates_and_scopes() {
    let repo = repo().await;
    let user = UserId::new();
    for i in 0..5 {
        repo.insert_order(new_order(user, PaymentMode::Cib, 100 + i))
            .await
            .unwrap();
    }
    repo.insert_order(new_order(UserId::new(), PaymentMode::Cib, 999))
        .await
        .unwrap();

    let (first_page, total) = repo.list_for_user(user, 1, 2).await.unwrap();
    assert_eq!(total, 5);
    assert_eq!(first_page.len(), 2);

    let (last_page, _) = repo.list_for_user(user, 3, 2).await.unwrap();
    assert_eq!(last_page.len(), 1);
}

#[tokio::test]
async fn test_api_key_lifecycle() {
    let repo = repo().await;
    let user = UserId::new();

    let (key, raw) = repo.create_api_key("ops-key", user, true).await.unwrap();
    assert!(raw.starts_with("sk_"));
    assert_eq!(repo.count_api_keys().await.unwrap(), 1);

    let verified = repo
        .verify_api_key_hash(&hash_api_key(&raw))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(verified.id, key.id);
    assert_eq!(verified.user_id, user);
    assert!(verified.is_admin);

    assert_eq!(repo.list_api_keys().await.unwrap().len(), 1);
    assert!(repo.delete_api_key(key.id).await.unwrap());
    assert!(
        repo.verify_api_key_hash(&hash_api_key(&raw))
            .await
            .unwrap()
            .is_none()
    );
    assert!(!repo.delete_api_key(key.id).await.unwrap());
}

#[tokio::test]
async fn test_notification_queue() {
    let repo = repo().await;
    let user = UserId::new();

    repo.enqueue_notification(
        user,
        "payment.success",
        serde_json::json!({"order_number": "ORD-1", "amount": "1200.00"}),
    )
    .await
    .unwrap();

    let pending = repo.get_pending_notifications(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].event_type, "payment.success");
    assert_eq!(pending[0].user_id, user);

    repo.update_notification_status(pending[0].id, NotificationStatus::Completed, None)
        .await
        .unwrap();

    assert!(repo.get_pending_notifications(10).await.unwrap().is_empty());
}
