//! End-to-end approval scenarios against real processes.

use shellgate::approval::DEFAULT_DENIAL_REASON;
use shellgate::events::CommandEvent;
use shellgate::tools::{Classification, CommandExecutor, ExecutorConfig};
use shellgate::whitelist::{ArgPattern, SecurityLevel, WhitelistEntry, WhitelistRegistry};
use shellgate::{CommandError, CommandOutcome, CommandService, ExecuteOptions};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn service_in(dir: &TempDir, entries: Vec<WhitelistEntry>) -> Arc<CommandService> {
    let executor = CommandExecutor::with_config(ExecutorConfig::with_working_dir(dir.path()));
    Arc::new(CommandService::new(
        WhitelistRegistry::with_entries(entries),
        Arc::new(executor),
    ))
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

async fn pending_id(service: &CommandService, command: &str, list: &[&str]) -> uuid::Uuid {
    service
        .execute_command(command, args(list), ExecuteOptions::default())
        .await
        .expect("command should be queued")
        .pending_id()
        .expect("command should require approval")
}

#[tokio::test]
async fn test_unlisted_command_is_rejected() {
    let dir = TempDir::new().unwrap();
    let service = service_in(&dir, vec![]);
    let marker = dir.path().join("marker");

    let err = service
        .execute_command(
            "touch",
            vec![marker.display().to_string()],
            ExecuteOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CommandError::NotWhitelisted { .. }));
    assert!(!marker.exists());
}

#[tokio::test]
async fn test_forbidden_regardless_of_arguments() {
    let dir = TempDir::new().unwrap();
    let service = service_in(
        &dir,
        vec![WhitelistEntry::new("touch", SecurityLevel::Forbidden)
            .with_allowed_args(vec![ArgPattern::exact("safe-file")])],
    );

    for call in [vec![], args(&["safe-file"]), args(&["a", "b", "c"])] {
        let err = service
            .execute_command_and_wait("touch", call, ExecuteOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Forbidden { .. }));
    }
    assert!(!dir.path().join("safe-file").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_safe_echo_runs_immediately() {
    let dir = TempDir::new().unwrap();
    let service = service_in(&dir, vec![WhitelistEntry::new("echo", SecurityLevel::Safe)]);

    let outcome = service
        .execute_command("echo", args(&["test"]), ExecuteOptions::default())
        .await
        .unwrap();

    match outcome {
        CommandOutcome::Completed(result) => {
            assert_eq!(result.stdout, "test\n");
            assert_eq!(result.stderr, "");
        }
        other => panic!("Expected Completed, got {:?}", other),
    }
}

#[test]
fn test_argument_mismatch_escalates() {
    let dir = TempDir::new().unwrap();
    let service = service_in(
        &dir,
        vec![WhitelistEntry::new("build", SecurityLevel::Safe)
            .with_allowed_args(vec![ArgPattern::exact("--version")])],
    );

    assert_eq!(
        service.classify("build", &args(&["--bogus"])),
        Classification::Level(SecurityLevel::RequiresApproval)
    );
    assert_eq!(
        service.classify("build", &args(&["--version"])),
        Classification::Level(SecurityLevel::Safe)
    );
}

#[tokio::test]
async fn test_unknown_and_resolved_ids_are_not_found() {
    let dir = TempDir::new().unwrap();
    let service = service_in(
        &dir,
        vec![WhitelistEntry::new("mkdir", SecurityLevel::RequiresApproval)],
    );

    let unknown = uuid::Uuid::new_v4();
    assert_eq!(
        service.approve_command(unknown).await.unwrap_err(),
        CommandError::NotFound { id: unknown }
    );

    let id = pending_id(&service, "mkdir", &["once"]).await;
    service.approve_command(id).await.unwrap();
    assert!(matches!(
        service.approve_command(id).await,
        Err(CommandError::NotFound { .. })
    ));
    assert!(matches!(
        service.deny_command(id, None),
        Err(CommandError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_deny_settles_blocking_caller() {
    let dir = TempDir::new().unwrap();
    let service = service_in(
        &dir,
        vec![WhitelistEntry::new("mkdir", SecurityLevel::RequiresApproval)],
    );
    let mut events = service.subscribe();

    let caller = {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            service
                .execute_command_and_wait("mkdir", args(&["blocked"]), ExecuteOptions::default())
                .await
        })
    };

    let id = match &*events.recv().await.unwrap() {
        CommandEvent::Pending(pending) => pending.id,
        other => panic!("Expected Pending, got {:?}", other),
    };
    assert_eq!(service.get_pending_commands().len(), 1);

    service
        .deny_command(id, Some("not allowed".to_string()))
        .unwrap();

    let err = caller.await.unwrap().unwrap_err();
    assert_eq!(err.to_string(), "not allowed");
    assert!(service.get_pending_commands().is_empty());
    assert!(!dir.path().join("blocked").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_mkdir_end_to_end() {
    let dir = TempDir::new().unwrap();
    let service = service_in(
        &dir,
        vec![WhitelistEntry::new("mkdir", SecurityLevel::RequiresApproval)],
    );

    let id = pending_id(&service, "mkdir", &["x"]).await;

    let pending = service.get_pending_commands();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, id);
    assert_eq!(pending[0].command, "mkdir");
    assert_eq!(pending[0].args, args(&["x"]));
    assert!(!dir.path().join("x").exists());

    let result = service.approve_command(id).await.unwrap();
    assert_eq!(result.stdout, "");
    assert_eq!(result.stderr, "");
    assert!(dir.path().join("x").is_dir());
    assert!(service.get_pending_commands().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_pending_commands_resolve_independently() {
    let dir = TempDir::new().unwrap();
    let service = service_in(
        &dir,
        vec![WhitelistEntry::new("mkdir", SecurityLevel::RequiresApproval)],
    );

    let first = pending_id(&service, "mkdir", &["first"]).await;
    let second = pending_id(&service, "mkdir", &["second"]).await;
    assert_ne!(first, second);
    let before = service
        .get_pending_commands()
        .into_iter()
        .find(|p| p.id == first)
        .unwrap();

    service.approve_command(second).await.unwrap();

    let remaining = service.get_pending_commands();
    assert_eq!(remaining, vec![before]);
    assert!(dir.path().join("second").is_dir());
    assert!(!dir.path().join("first").exists());

    service.deny_command(first, None).unwrap();
    assert!(service.get_pending_commands().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_failed_approval_reaches_blocking_caller() {
    let dir = TempDir::new().unwrap();
    let service = service_in(
        &dir,
        vec![WhitelistEntry::new("ls", SecurityLevel::RequiresApproval)],
    );
    let mut events = service.subscribe();

    let caller = {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            service
                .execute_command_and_wait(
                    "ls",
                    args(&["/definitely/not/here"]),
                    ExecuteOptions::default(),
                )
                .await
        })
    };
    let id = events.recv().await.unwrap().command_id();

    let approver_err = service.approve_command(id).await.unwrap_err();
    let caller_err = caller.await.unwrap().unwrap_err();

    assert!(matches!(approver_err, CommandError::Execution { .. }));
    assert_eq!(approver_err, caller_err);
    assert_eq!(events.recv().await.unwrap().event_type(), "command:failed");
}

#[tokio::test]
async fn test_watchdog_notifies_without_expiring() {
    let dir = TempDir::new().unwrap();
    let service = CommandService::new(
        WhitelistRegistry::with_entries(vec![WhitelistEntry::new(
            "mkdir",
            SecurityLevel::RequiresApproval,
        )]),
        Arc::new(CommandExecutor::with_config(ExecutorConfig::with_working_dir(
            dir.path(),
        ))),
    )
    .with_watchdog_delay(Duration::from_millis(50));
    let mut events = service.subscribe();

    let id = pending_id(&service, "mkdir", &["late"]).await;
    assert_eq!(events.recv().await.unwrap().event_type(), "command:pending");

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("watchdog should fire")
        .unwrap();
    assert_eq!(event.event_type(), "command:approval_timeout");
    assert_eq!(event.command_id(), id);

    assert_eq!(service.get_pending_commands().len(), 1);
    service.deny_command(id, None).unwrap();
    match &*events.recv().await.unwrap() {
        CommandEvent::Denied { reason, .. } => assert_eq!(reason, DEFAULT_DENIAL_REASON),
        other => panic!("Expected Denied, got {:?}", other),
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_safe_command_timeout() {
    let dir = TempDir::new().unwrap();
    let service = service_in(&dir, vec![WhitelistEntry::new("sleep", SecurityLevel::Safe)]);

    let err = service
        .execute_command(
            "sleep",
            args(&["5"]),
            ExecuteOptions::default().with_timeout(Duration::from_millis(100)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CommandError::Timeout { .. }));
}
