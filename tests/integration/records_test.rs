// Record store persistence across process restarts

use tempfile::TempDir;

use kura::records::{NewUser, RecordStore};

fn user(name: &str) -> NewUser {
    NewUser {
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
    }
}

#[tokio::test]
async fn test_users_and_tokens_round_trip_through_file() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("records.json");

    {
        let store = RecordStore::open(Some(path.clone())).await?;
        let agus = store.add_user(user("Agus")).await?;
        let budi = store.add_user(user("Budi")).await?;
        store.add_token("your-authentication-token").await?;
        store.update_user(budi, user("Bambang")).await?;
        store.delete_user(agus).await?;
    }

    let store = RecordStore::open(Some(path.clone())).await?;
    let users = store.users().await;
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].id, 2);
    assert_eq!(users[0].name, "Bambang");
    assert_eq!(store.tokens().await[0].token, "your-authentication-token");

    // Deleted ids are not reused
    assert_eq!(store.add_user(user("Citra")).await?, 3);

    let on_disk: serde_json::Value = serde_json::from_slice(&std::fs::read(&path)?)?;
    assert!(on_disk["users"]["records"].is_object());
    Ok(())
}

#[tokio::test]
async fn test_concurrent_inserts_get_distinct_ids() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let store = RecordStore::open(Some(temp_dir.path().join("records.json"))).await?;

    let inserts = (0..10).map(|i| store.add_user(user(&format!("user{}", i))));
    let mut ids = futures::future::try_join_all(inserts).await?;
    ids.sort_unstable();

    assert_eq!(ids, (1..=10).collect::<Vec<u64>>());
    Ok(())
}
