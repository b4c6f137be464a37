//! VM lifecycle against a scripted CLI

mod common;

use azlab_azure::{
    CaptureParams, DELETE_TIMEOUT, DiskParams, PowerState, RESTART_TIMEOUT, SelinuxMode,
    TransferDirection, VirtualMachine, VmSpec,
};
use azlab_cloud::{CloudError, Descriptor, Mode, Resource};
use common::{FakeRemote, ScriptedRunner, json, ok, text};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const NOT_FOUND: &str = "No VMs found\n";

fn spec() -> VmSpec {
    VmSpec {
        name: "vm-test-1".into(),
        size: "Small".into(),
        image: "wala68-20160414".into(),
        location: Some("East US".into()),
        username: "azureuser".into(),
        password: "Secret123!".into(),
        ..Default::default()
    }
}

fn running() -> serde_json::Value {
    json!({
        "VMName": "vm-test-1",
        "InstanceStatus": "ReadyRole",
        "InstanceSize": "Small",
        "VirtualIPAddresses": [{"address": "40.1.2.3", "name": "vm-test-1ContractContract"}],
        "Network": {"Endpoints": [{"name": "ssh", "port": 50022, "localPort": 22}]}
    })
}

#[tokio::test]
async fn test_exists_only_false_on_sentinel() {
    let runner = ScriptedRunner::new();
    runner.on(
        &["vm", "show"],
        vec![
            text(0, NOT_FOUND),
            json(running()),
            text(1, "error:   An unexpected error occurred\n"),
            text(0, "No VMs found in cloud service"),
        ],
    );
    let vm = VirtualMachine::with_cli(runner.cli(Mode::Asm), spec());

    assert!(!vm.exists().await.unwrap());
    assert!(vm.exists().await.unwrap());
    // Anything other than the exact sentinel is not proof of absence.
    assert!(vm.exists().await.unwrap());
    assert!(vm.exists().await.unwrap());
}

#[tokio::test]
async fn test_create_skipped_when_present() {
    let runner = ScriptedRunner::new();
    runner.on(&["vm", "show"], vec![json(running())]);
    let mut vm = VirtualMachine::with_cli(runner.cli(Mode::Asm), spec());

    assert_eq!(vm.create(&[]).await.unwrap(), None);
    assert_eq!(runner.count(&["vm", "create"]), 0);
}

#[tokio::test]
async fn test_refresh_replaces_descriptor() {
    let runner = ScriptedRunner::new();
    runner.on(
        &["vm", "show"],
        vec![json(json!({"VMName": "vm-test-1", "InstanceStatus": "StoppedVM"}))],
    );
    let mut vm = VirtualMachine::with_cli(runner.cli(Mode::Asm), spec())
        .with_descriptor(Descriptor::new(running()));
    assert_eq!(vm.public_address().unwrap(), "40.1.2.3");

    vm.refresh(None).await.unwrap();
    assert_eq!(vm.power_state(), PowerState::Stopped);
    assert!(matches!(
        vm.public_address(),
        Err(CloudError::MissingField(_))
    ));

    vm.refresh(Some(Descriptor::new(json!({"VMName": "other"}))))
        .await
        .unwrap();
    assert_eq!(vm.descriptor().get_str("VMName"), Some("other"));
    assert_eq!(vm.descriptor().get_str("InstanceStatus"), None);
}

#[tokio::test]
async fn test_asm_lifecycle_scenario() {
    let runner = ScriptedRunner::new();
    runner.on(&["vm", "show"], vec![text(0, NOT_FOUND)]);
    runner.on(&["vm", "create"], vec![ok()]);
    runner.on(&["vm", "start"], vec![ok()]);
    runner.on(&["vm", "restart"], vec![ok()]);
    runner.on(&["vm", "delete"], vec![ok()]);

    let mut vm = VirtualMachine::with_cli(runner.cli(Mode::Asm), spec());

    assert_eq!(vm.create(&[]).await.unwrap(), Some(0));
    assert_eq!(runner.count(&["vm", "create"]), 1);

    runner.reset(&["vm", "show"], vec![json(running())]);
    assert_eq!(vm.start().await.unwrap(), 0);
    assert!(vm.is_running().await.unwrap());
    assert_eq!(vm.restart(RESTART_TIMEOUT).await.unwrap(), 0);
    assert_eq!(vm.delete(DELETE_TIMEOUT).await.unwrap(), 0);

    runner.reset(&["vm", "show"], vec![text(0, NOT_FOUND)]);
    assert!(!vm.exists().await.unwrap());

    let calls = runner.calls();
    let restart = calls
        .iter()
        .find(|c| c.arguments().starts_with(&["vm".to_string(), "restart".to_string()]))
        .unwrap();
    assert_eq!(restart.time_limit(), Some(Duration::from_secs(240)));
    let delete = calls
        .iter()
        .find(|c| c.arguments().starts_with(&["vm".to_string(), "delete".to_string()]))
        .unwrap();
    assert_eq!(delete.arguments().last().map(String::as_str), Some("--quiet"));
}

#[tokio::test]
async fn test_nonzero_status_returned_verbatim() {
    let runner = ScriptedRunner::new();
    runner.on(&["vm", "shutdown"], vec![text(1, "error:   VM is busy\n")]);
    runner.on(&["vm", "capture"], vec![text(2, "error:   VM must be stopped\n")]);
    let vm = VirtualMachine::with_cli(runner.cli(Mode::Asm), spec());

    assert_eq!(vm.shutdown().await.unwrap(), 1);
    let status = vm
        .capture("img-0419", &CaptureParams::default(), Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(status, 2);
}

#[tokio::test]
async fn test_arm_uses_group_scoped_stop() {
    let runner = ScriptedRunner::new();
    runner.on(&["vm", "stop"], vec![ok()]);
    let mut spec = spec();
    spec.resource_group = Some("wala-rg".into());
    let vm = VirtualMachine::with_cli(runner.cli(Mode::Arm), spec);

    assert_eq!(vm.mode(), Mode::Arm);
    assert_eq!(vm.shutdown().await.unwrap(), 0);
    assert_eq!(runner.count(&["vm", "stop", "wala-rg", "vm-test-1"]), 1);
    assert_eq!(runner.count(&["vm", "shutdown"]), 0);
}

#[tokio::test]
async fn test_verify_alive_on_stopped_vm() {
    let runner = ScriptedRunner::new();
    runner.on(
        &["vm", "show"],
        vec![json(json!({"VMName": "vm-test-1", "InstanceStatus": "StoppedDeallocated"}))],
    );
    let mut vm = VirtualMachine::with_cli(runner.cli(Mode::Asm), spec());

    assert!(vm.is_deallocated().await.unwrap());
    assert!(matches!(
        vm.verify_alive().await,
        Err(CloudError::VmDead(_))
    ));
}

#[tokio::test]
async fn test_login_records_sessions() {
    let runner = ScriptedRunner::new();
    let remote = Arc::new(FakeRemote {
        answers: vec![
            ("getenforce".into(), 0, "Enforcing".into()),
            ("setenforce 0".into(), 0, String::new()),
        ],
        ..Default::default()
    });
    let log_dir = tempfile::tempdir().unwrap();
    let mut vm = VirtualMachine::with_cli(runner.cli(Mode::Asm), spec())
        .with_descriptor(Descriptor::new(running()))
        .with_remote(remote.clone())
        .with_log_dir(log_dir.path());

    vm.login(Duration::from_secs(30), None, None).await.unwrap();
    vm.login(Duration::from_secs(30), Some("root"), Some("toor"))
        .await
        .unwrap();
    assert_eq!(vm.sessions().len(), 2);

    let requests = remote.sessions.lock().unwrap().clone();
    assert_eq!(requests[0].address, "40.1.2.3");
    assert_eq!(requests[0].port, 50022);
    assert_eq!(requests[0].username, "azureuser");
    assert_eq!(requests[1].username, "root");
    assert_ne!(requests[0].log_file, requests[1].log_file);
    assert!(requests[0].log_file.starts_with(log_dir.path()));

    assert_eq!(vm.getenforce().await.unwrap(), SelinuxMode::Enforcing);
    vm.setenforce(SelinuxMode::Permissive).await.unwrap();
    assert_eq!(
        remote.history.lock().unwrap().clone(),
        vec!["getenforce".to_string(), "setenforce 0".to_string()]
    );

    vm.close_sessions().await.unwrap();
    assert!(vm.sessions().iter().all(|s| s.is_closed()));
}

#[tokio::test]
async fn test_login_without_address_fails() {
    let runner = ScriptedRunner::new();
    let mut vm = VirtualMachine::with_cli(runner.cli(Mode::Asm), spec())
        .with_remote(Arc::new(FakeRemote::default()));

    assert!(matches!(
        vm.login(Duration::from_secs(30), None, None).await,
        Err(CloudError::MissingField(_))
    ));
    assert!(vm.sessions().is_empty());
}

#[tokio::test]
async fn test_copy_files_to_guest() {
    let runner = ScriptedRunner::new();
    let remote = Arc::new(FakeRemote::default());
    let vm = VirtualMachine::with_cli(runner.cli(Mode::Asm), spec())
        .with_descriptor(Descriptor::new(running()))
        .with_remote(remote.clone());

    vm.copy_files_to(
        std::path::Path::new("/tmp/waagent.conf"),
        "/etc/",
        Some(1024),
        Duration::from_secs(600),
    )
    .await
    .unwrap();

    let transfers = remote.transfers.lock().unwrap().clone();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].remote_path, "/etc/");
    assert_eq!(transfers[0].rate_limit, Some(1024));
    let log = transfers[0].log_file.file_name().unwrap().to_string_lossy().to_string();
    assert!(log.starts_with("transfer-vm-test-1-to-40.1.2.3-"));
}

#[tokio::test]
async fn test_copy_files_from_guest() {
    let runner = ScriptedRunner::new();
    let remote = Arc::new(FakeRemote::default());
    let vm = VirtualMachine::with_cli(runner.cli(Mode::Asm), spec())
        .with_descriptor(Descriptor::new(running()))
        .with_remote(remote.clone());

    vm.copy_files_from(
        "/var/log/waagent.log",
        std::path::Path::new("/tmp/waagent.log"),
        None,
        Duration::from_secs(600),
    )
    .await
    .unwrap();

    let transfers = remote.transfers.lock().unwrap().clone();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].direction, TransferDirection::From);
    assert_eq!(transfers[0].port, 50022);
    assert_eq!(transfers[0].rate_limit, None);
    let log = transfers[0].log_file.file_name().unwrap().to_string_lossy().to_string();
    assert!(log.starts_with("transfer-vm-test-1-from-40.1.2.3-"));
}

#[tokio::test]
async fn test_disk_attach_new_per_mode() {
    let runner = ScriptedRunner::new();
    runner.on(&["vm", "disk", "attach-new"], vec![ok()]);
    let params = DiskParams {
        host_caching: Some("ReadOnly".into()),
        ..Default::default()
    };

    let vm = VirtualMachine::with_cli(runner.cli(Mode::Asm), spec());
    assert_eq!(vm.disk_attach_new(50, &params).await.unwrap(), 0);

    let mut arm_spec = spec();
    arm_spec.resource_group = Some("azlab-rg".into());
    let vm = VirtualMachine::with_cli(runner.cli(Mode::Arm), arm_spec);
    assert_eq!(vm.disk_attach_new(50, &DiskParams::default()).await.unwrap(), 0);

    let calls = runner.calls();
    assert_eq!(
        calls[0].arguments(),
        &["vm", "disk", "attach-new", "vm-test-1", "50", "--host-caching", "ReadOnly"]
    );
    assert_eq!(
        calls[1].arguments(),
        &["vm", "disk", "attach-new", "azlab-rg", "vm-test-1", "50"]
    );
}
