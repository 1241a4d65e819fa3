//! ClientStore 集成测试（内存 SQLite）

use warden_adapter_sql::{ClientStore, ConnectionConfig, connect};
use warden_ports::{ClientInfo, ClientStorage};

#[tokio::test]
async fn test_client_round_trip_and_decode_error() {
    let db = connect(&ConnectionConfig::sqlite_memory()).await.unwrap();
    let store = ClientStore::new(db.clone(), "clients").await.unwrap();

    let client = ClientInfo::new("1", "11").with_domain("http://localhost");
    store.set("1", &client).await.unwrap();
    assert_eq!(store.get_by_id("1").await.unwrap(), Some(client));

    sqlx::query("UPDATE clients SET data = ? WHERE id = ?")
        .bind("not json")
        .bind("1")
        .execute(db.pool())
        .await
        .unwrap();

    let err = store.get_by_id("1").await.unwrap_err();
    assert!(err.is_decode());
}

#[tokio::test]
async fn test_client_invalid_table_name() {
    let db = connect(&ConnectionConfig::sqlite_memory()).await.unwrap();
    let err = ClientStore::new(db, "bad name").await.unwrap_err();
    assert!(err.is_configuration());
}
