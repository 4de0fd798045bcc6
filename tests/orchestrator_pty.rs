// tests/orchestrator_pty.rs
#![cfg(unix)]

mod common;
use crate::common::{init_tracing, wait_until, with_timeout, CapturedOutput};

use std::error::Error;
use std::time::Duration;

use tokio::sync::watch;

use rewatch::orchestrator::{ChildExit, MultiSchemaOrchestrator};

type TestResult = Result<(), Box<dyn Error>>;

/// `sh -c <script> sh --schema N`, so the script sees the schema number as `$2`.
fn shell_orchestrator(script: &str, output: &CapturedOutput) -> MultiSchemaOrchestrator {
    MultiSchemaOrchestrator::with_program(
        "sh",
        vec!["-c".to_string(), script.to_string(), "sh".to_string()],
        output.shared(),
    )
}

#[tokio::test]
#[ignore = "needs a pseudo-terminal"]
async fn children_output_and_exit_codes_are_relayed() -> TestResult {
    init_tracing();
    let output = CapturedOutput::new();
    let orchestrator = shell_orchestrator("echo child=$2; exit $2", &output);
    let (_stop, stop_rx) = watch::channel(false);

    let mut exits = with_timeout(orchestrator.run(&[1, 2], stop_rx)).await?;
    exits.sort_by_key(|e| e.schema);

    assert_eq!(
        exits,
        vec![
            ChildExit { schema: 1, success: false, code: 1 },
            ChildExit { schema: 2, success: false, code: 2 },
        ]
    );
    assert!(output.contains("child=1"));
    assert!(output.contains("child=2"));
    assert!(output.contains("schema 2 exited with code 2"));
    Ok(())
}

#[tokio::test]
#[ignore = "needs a pseudo-terminal"]
async fn shutdown_interrupts_every_child() -> TestResult {
    init_tracing();
    let output = CapturedOutput::new();
    let orchestrator = shell_orchestrator(
        "trap 'echo bye=$2; exit 0' INT; echo up=$2; while true; do sleep 0.05; done",
        &output,
    );
    let (stop, stop_rx) = watch::channel(false);

    let run = tokio::spawn(async move { orchestrator.run(&[1, 2], stop_rx).await });
    wait_until(Duration::from_secs(3), || output.contains("up=1") && output.contains("up=2")).await;

    stop.send(true)?;
    let exits = with_timeout(run).await??;

    assert_eq!(exits.len(), 2);
    assert!(exits.iter().all(|e| e.success));
    assert!(output.contains("bye=1"));
    assert!(output.contains("bye=2"));
    Ok(())
}
