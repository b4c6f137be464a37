//! OS image resource against a scripted CLI

mod common;

use azlab_azure::{ImageSpec, VmImage};
use azlab_cloud::{Mode, Resource};
use common::{ScriptedRunner, failed, json, ok, text};
use serde_json::json;
use std::time::Duration;

fn spec() -> ImageSpec {
    ImageSpec {
        name: "wala-capture-1".into(),
        blob_url: Some("https://acct.blob.core.windows.net/vhds/wala.vhd".into()),
        os: Some("Linux".into()),
        location: Some("East US".into()),
        blob_delete: true,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_image_exists_needs_structured_reply() {
    let runner = ScriptedRunner::new();
    runner.on(
        &["vm", "image", "show"],
        vec![
            json(json!({"name": "wala-capture-1", "operatingSystemType": "Linux"})),
            failed(1, "error:   Image not found"),
            text(0, "info:    vm image show command OK\n"),
        ],
    );
    let image = VmImage::with_cli(runner.cli(Mode::Asm), spec());

    assert!(image.exists().await.unwrap());
    assert!(!image.exists().await.unwrap());
    assert!(!image.exists().await.unwrap());
}

#[tokio::test]
async fn test_image_create_then_refresh() {
    let runner = ScriptedRunner::new();
    runner.on(
        &["vm", "image", "show"],
        vec![
            failed(1, "error:   Image not found"),
            json(json!({
                "name": "wala-capture-1",
                "operatingSystemType": "Linux",
                "mediaLinkUri": "https://acct.blob.core.windows.net/vhds/wala.vhd"
            })),
        ],
    );
    runner.on(&["vm", "image", "create"], vec![ok()]);
    let mut image = VmImage::with_cli(runner.cli(Mode::Asm), spec());

    assert_eq!(image.create(&[]).await.unwrap(), Some(0));
    let create = &runner.calls()[1];
    assert!(create.arguments().contains(&"--blob-url".to_string()));
    assert!(create.arguments().contains(&"--os".to_string()));

    image.refresh(None).await.unwrap();
    assert_eq!(image.os(), Some("Linux"));
    assert!(image.media_link().unwrap().ends_with("wala.vhd"));
}

#[tokio::test]
async fn test_image_delete_removes_blob() {
    let runner = ScriptedRunner::new();
    runner.on(&["vm", "image", "delete"], vec![ok()]);
    let mut image = VmImage::with_cli(runner.cli(Mode::Asm), spec());

    assert_eq!(image.delete(Duration::from_secs(240)).await.unwrap(), 0);
    let call = &runner.calls()[0];
    assert_eq!(
        call.arguments(),
        &["vm", "image", "delete", "wala-capture-1", "--blob-delete"]
    );
    assert_eq!(call.time_limit(), Some(Duration::from_secs(240)));
}
