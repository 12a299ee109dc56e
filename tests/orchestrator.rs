use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, Instant};

use probebench::engine::{JobPhase, Orchestrator};
use probebench::exec::{Stream, Termination};
use probebench::monitor::Monitor;
use probebench::parser::encode_payload;
use probebench_test_utils::{FakeMonitor, init_tracing, with_timeout};
use serde_json::json;

type TestResult = Result<(), Box<dyn Error>>;

fn cmds(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn job_records_are_numbered_and_kept() -> TestResult {
    init_tracing();

    let mut orch = Orchestrator::new(Vec::new());
    let first = orch.shell(&cmds(&["echo a"]), None).await?.id;
    let second = orch.shell(&cmds(&["echo b", "echo c"]), None).await?.id;

    assert_eq!((first, second), (0, 1));
    assert_eq!(orch.history().len(), 2);
    assert_eq!(orch.phase(), JobPhase::Complete);

    let rec = &orch.history()[1];
    assert_eq!(rec.outputs.len(), 2);
    assert_eq!(rec.output(0).unwrap().texts(Stream::Stdout), vec!["b"]);
    assert_eq!(rec.output(1).unwrap().texts(Stream::Stdout), vec!["c"]);
    Ok(())
}

#[tokio::test]
async fn commands_in_a_job_run_concurrently() -> TestResult {
    init_tracing();

    let mut orch = Orchestrator::new(Vec::new());
    let begin = Instant::now();
    orch.shell(&cmds(&["sleep 0.4", "sleep 0.4", "sleep 0.4"]), None)
        .await?;
    assert!(begin.elapsed() < Duration::from_millis(1100));
    Ok(())
}

#[tokio::test]
async fn telemetry_is_isolated_per_job() -> TestResult {
    init_tracing();

    let (monitor, handle) = FakeMonitor::new("fake");
    let mut orch = Orchestrator::new(vec![Arc::new(monitor) as Arc<dyn Monitor>]);
    orch.start_samplers();

    // Sampled before the job: wiped by the job's reset.
    handle.push(1).await;
    let job = orch.shell(&cmds(&["true"]), None).await?;
    assert!(job.timeline("fake").unwrap().is_empty());

    handle.push(2).await;
    handle.push(3).await;
    let job = orch.shell(&cmds(&["true"]), None).await?;
    // Samples pushed between jobs belong to no job.
    assert!(job.timeline("fake").unwrap().is_empty());

    assert_eq!(handle.resets(), 2);
    orch.stop_samplers().await;
    assert!(handle.was_stopped());
    assert!(!orch.samplers_running());
    Ok(())
}

#[tokio::test]
async fn samples_taken_during_a_job_are_reported() -> TestResult {
    init_tracing();

    let (monitor, handle) = FakeMonitor::new("fake");
    let mut orch = Orchestrator::new(vec![Arc::new(monitor) as Arc<dyn Monitor>]);

    let pusher = {
        let handle = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            handle.push(7).await;
        })
    };
    let job = orch.shell(&cmds(&["sleep 0.5"]), None).await?;
    pusher.await?;

    let timeline = job.timeline("fake").unwrap();
    assert_eq!(timeline.column("value").unwrap(), [json!(7)]);
    Ok(())
}

#[tokio::test]
async fn timed_out_command_contributes_partial_output() -> TestResult {
    init_tracing();

    let mut orch = Orchestrator::new(Vec::new()).with_terminate_grace(Duration::from_millis(300));
    let job = with_timeout(orch.shell(
        &cmds(&["echo early; sleep 30", "echo quick"]),
        Some(Duration::from_millis(300)),
    ))
    .await?;

    let slow = job.output(0).unwrap();
    assert_eq!(slow.termination, Termination::TimedOut);
    assert_eq!(slow.texts(Stream::Stdout), vec!["early"]);
    assert_eq!(job.output(1).unwrap().termination, Termination::Exited(Some(0)));
    Ok(())
}

#[tokio::test]
async fn payloads_are_extracted_by_default() -> TestResult {
    init_tracing();

    let marker = encode_payload("PasFmtDat", &json!({"bw": 42}))?;
    let mut orch = Orchestrator::new(Vec::new());
    let job = orch.shell(&[format!("echo {marker}")], None).await?;

    let payloads: Vec<_> = job.output(0).unwrap().payloads().cloned().collect();
    assert_eq!(payloads, vec![json!({"bw": 42})]);
    Ok(())
}

#[tokio::test]
async fn job_record_serializes_to_json() -> TestResult {
    init_tracing();

    let (monitor, _handle) = FakeMonitor::new("fake");
    let mut orch = Orchestrator::new(vec![Arc::new(monitor) as Arc<dyn Monitor>]);
    let job = orch.shell(&cmds(&["echo hi"]), None).await?;

    let value = serde_json::to_value(job)?;
    assert_eq!(value["id"], json!(0));
    assert_eq!(value["commands"], json!(["echo hi"]));
    assert_eq!(value["outputs"][0]["stdout"][0]["text"], json!("hi"));
    assert_eq!(value["telemetry"]["fake"]["value"], json!([]));
    Ok(())
}

#[tokio::test]
async fn sampler_stop_is_bounded() -> TestResult {
    init_tracing();

    let (monitor, handle) = FakeMonitor::new("fake");
    let mut orch = Orchestrator::new(vec![Arc::new(monitor) as Arc<dyn Monitor>])
        .with_stop_timeout(Duration::from_secs(1));
    orch.start_samplers();
    tokio::task::yield_now().await;

    let begin = Instant::now();
    orch.stop_samplers().await;
    assert!(begin.elapsed() < Duration::from_secs(2));
    assert!(handle.was_stopped());
    Ok(())
}

#[tokio::test]
async fn unknown_program_is_an_exit_code_not_a_failure() -> TestResult {
    init_tracing();

    // The shell itself spawns fine and reports 127.
    let mut orch = Orchestrator::new(Vec::new());
    let job = orch
        .shell(&cmds(&["definitely-not-a-real-binary-probebench"]), None)
        .await?;
    assert_eq!(job.output(0).unwrap().termination, Termination::Exited(Some(127)));
    Ok(())
}

#[tokio::test]
async fn failed_sampler_reset_or_drain_returns_to_idle() -> TestResult {
    init_tracing();

    let (monitor, handle) = FakeMonitor::new("fake");
    let mut orch = Orchestrator::new(vec![Arc::new(monitor) as Arc<dyn Monitor>]);

    handle.fail_reset(true);
    assert!(with_timeout(orch.shell(&cmds(&["true"]), None)).await.is_err());
    assert_eq!(orch.phase(), JobPhase::Idle);

    handle.fail_reset(false);
    handle.fail_get(true);
    assert!(with_timeout(orch.shell(&cmds(&["true"]), None)).await.is_err());
    assert_eq!(orch.phase(), JobPhase::Idle);
    assert!(orch.history().is_empty());

    handle.fail_get(false);
    let id = with_timeout(orch.shell(&cmds(&["true"]), None)).await?.id;
    assert_eq!(id, 0, "failed jobs do not consume ids");
    assert_eq!(orch.phase(), JobPhase::Complete);
    Ok(())
}
