//! Storage account and container commands against a scripted CLI

mod common;

use azlab_azure::{AccountSpec, Container, StorageAccount, StorageCredentials};
use azlab_cloud::{Mode, Resource};
use common::{ScriptedRunner, failed, json, ok};
use serde_json::json;
use std::time::Duration;

fn account() -> AccountSpec {
    AccountSpec {
        name: "walaautoasmeastus".into(),
        location: Some("East US".into()),
        account_type: Some("LRS".into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_account_refresh_reads_keys_and_connection_string() {
    let runner = ScriptedRunner::new();
    runner.on(
        &["storage", "account", "show"],
        vec![json(json!({
            "name": "walaautoasmeastus",
            "properties": {
                "endpoints": ["https://walaautoasmeastus.blob.core.windows.net/"],
                "location": "East US",
                "accountType": "Standard_RAGRS"
            }
        }))],
    );
    runner.on(
        &["storage", "account", "keys", "list"],
        vec![json(json!({"primaryKey": "k1", "secondaryKey": "k2"}))],
    );
    runner.on(
        &["storage", "account", "connectionstring", "show"],
        vec![json(json!({"string": "DefaultEndpointsProtocol=https;AccountName=walaautoasmeastus;AccountKey=k1"}))],
    );

    let mut account = StorageAccount::with_cli(runner.cli(Mode::Asm), account());
    account.refresh(None).await.unwrap();

    assert_eq!(account.info().account_type(), Some("Standard_RAGRS"));
    assert_eq!(account.info().endpoints().len(), 1);
    assert_eq!(account.keys().get_str("primaryKey"), Some("k1"));
    assert!(account.connection_string().unwrap().contains("AccountKey=k1"));
    assert!(account.credentials().is_some());
}

#[tokio::test]
async fn test_account_create_only_when_name_free() {
    let runner = ScriptedRunner::new();
    runner.on(
        &["storage", "account", "check"],
        vec![json(json!({"nameAvailable": true})), json(json!({"nameAvailable": "false"}))],
    );
    runner.on(&["storage", "account", "create"], vec![ok()]);
    let mut account = StorageAccount::with_cli(runner.cli(Mode::Asm), account());

    assert_eq!(account.create(&[]).await.unwrap(), Some(0));
    assert_eq!(account.create(&[]).await.unwrap(), None);
    assert_eq!(runner.count(&["storage", "account", "create"]), 1);

    let create = runner
        .calls()
        .into_iter()
        .find(|c| c.arguments().get(2).map(String::as_str) == Some("create"))
        .unwrap();
    assert!(create.arguments().windows(2).any(|w| w == ["--type", "LRS"]));
}

#[tokio::test]
async fn test_account_delete_uses_delete() {
    let runner = ScriptedRunner::new();
    runner.on(&["storage", "account", "delete"], vec![ok()]);
    let mut account = StorageAccount::with_cli(runner.cli(Mode::Asm), account());

    assert_eq!(account.delete(Duration::from_secs(240)).await.unwrap(), 0);
    assert_eq!(runner.count(&["storage", "account", "delete", "walaautoasmeastus", "--quiet"]), 1);
    assert_eq!(runner.count(&["storage", "account", "show"]), 0);
}

#[tokio::test]
async fn test_container_lifecycle() {
    let runner = ScriptedRunner::new();
    runner.on(
        &["storage", "container", "show"],
        vec![
            failed(1, "error:   Container vhds doesn't exist"),
            json(json!({"name": "vhds", "publicAccessLevel": "Off"})),
        ],
    );
    runner.on(&["storage", "container", "create"], vec![ok()]);
    runner.on(&["storage", "container", "delete"], vec![ok()]);

    let mut container = Container::new(
        runner.cli(Mode::Asm),
        "vhds",
        StorageCredentials::connection_string("AccountName=a;AccountKey=k"),
    )
    .with_permission("Off");

    assert_eq!(container.create(&[]).await.unwrap(), Some(0));
    container.refresh(None).await.unwrap();
    assert_eq!(container.info().public_access_level(), Some("Off"));
    assert_eq!(container.delete(Duration::from_secs(240)).await.unwrap(), 0);

    let create = runner
        .calls()
        .into_iter()
        .find(|c| c.arguments().get(2).map(String::as_str) == Some("create"))
        .unwrap();
    assert!(create.arguments().windows(2).any(|w| w == ["--permission", "Off"]));
    assert!(!create.command_line().contains("AccountKey"));
}

#[tokio::test]
async fn test_container_ambiguous_failure_counts_as_existing() {
    let runner = ScriptedRunner::new();
    runner.on(
        &["storage", "container", "show"],
        vec![failed(1, "error:   Server failed to authenticate the request")],
    );
    let container = Container::new(runner.cli(Mode::Asm), "vhds", StorageCredentials::default());
    assert!(container.exists().await.unwrap());
}
