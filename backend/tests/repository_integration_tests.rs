use portal_backend::{
    CredentialStore, InMemoryCredentialStore,
    models::{AccountChanges, NewAccount, Role},
    repository::StoreError,
};
use std::sync::Arc;

// --- Test Data Helpers ---

fn new_account(username: &str, email: &str) -> NewAccount {
    NewAccount {
        username: username.to_string(),
        email: email.to_string(),
        password_hash: "$argon2id$placeholder".to_string(),
        role: Role::User,
    }
}

async fn seeded_store() -> InMemoryCredentialStore {
    let store = InMemoryCredentialStore::new();
    store.insert(new_account("user1", "user1@example.com")).await.unwrap();
    store.insert(new_account("user2", "user2@example.com")).await.unwrap();
    store
}

// --- Tests ---

#[tokio::test]
async fn test_insert_assigns_increasing_ids_and_lookups_agree() {
    let store = seeded_store().await;

    let by_name = store.find_by_username("user2").await.unwrap().unwrap();
    let by_email = store.find_by_email("user2@example.com").await.unwrap().unwrap();
    let by_id = store.find_by_id(by_name.id).await.unwrap().unwrap();

    assert_eq!(by_name.id, 2);
    assert_eq!(by_name, by_email);
    assert_eq!(by_name, by_id);
    assert!(store.find_by_username("ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn test_insert_rejects_duplicates() {
    let store = seeded_store().await;

    assert_eq!(
        store.insert(new_account("user1", "fresh@example.com")).await,
        Err(StoreError::DuplicateUsername)
    );
    assert_eq!(
        store.insert(new_account("fresh", "user1@example.com")).await,
        Err(StoreError::DuplicateEmail)
    );
    assert_eq!(store.list().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_ids_are_not_reused_after_delete() {
    let store = seeded_store().await;

    assert!(store.delete(2).await.unwrap());
    let next = store.insert(new_account("user3", "user3@example.com")).await.unwrap();

    assert_eq!(next.id, 3);
    assert!(!store.delete(2).await.unwrap());
}

#[tokio::test]
async fn test_update_applies_partial_changes() {
    let store = seeded_store().await;

    let updated = store
        .update(
            1,
            AccountChanges {
                email: Some("renamed@example.com".to_string()),
                role: Some(Role::Admin),
                ..AccountChanges::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.username, "user1");
    assert_eq!(updated.email, "renamed@example.com");
    assert_eq!(updated.role, Role::Admin);
    assert!(store.find_by_email("user1@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_checks_uniqueness_against_other_accounts_only() {
    let store = seeded_store().await;

    // Keeping your own email is not a conflict.
    let same = store
        .update(
            1,
            AccountChanges {
                email: Some("user1@example.com".to_string()),
                ..AccountChanges::default()
            },
        )
        .await;
    assert!(same.is_ok());

    let clash = store
        .update(
            1,
            AccountChanges {
                username: Some("user2".to_string()),
                ..AccountChanges::default()
            },
        )
        .await;
    assert_eq!(clash, Err(StoreError::DuplicateUsername));

    let missing = store.update(99, AccountChanges::default()).await;
    assert_eq!(missing, Err(StoreError::NotFound));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_inserts_keep_usernames_unique() {
    let store = Arc::new(InMemoryCredentialStore::new());

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .insert(new_account("contended", &format!("c{i}@example.com")))
                    .await
            })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(e) => assert_eq!(e, StoreError::DuplicateUsername),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(store.list().await.unwrap().len(), 1);
}
