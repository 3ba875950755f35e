mod common;

use anyhow::Result;
use cadence_scheduler::{
    RemoteCallError, SchedulerApi, SchedulerError, SequenceRunner, WebhookCorrelator,
};
use common::{fast_polling, hook_config, FakeScheduler, JobPlan, RecordingReporter};
use std::sync::Arc;
use std::time::Duration;

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn start(api: &Arc<FakeScheduler>) -> Result<WebhookCorrelator> {
    let shared: Arc<dyn SchedulerApi> = api.clone();
    Ok(WebhookCorrelator::start(shared, hook_config(&fast_polling()))?)
}

#[test]
fn test_progress_is_aggregated_across_events() -> Result<()> {
    let api = Arc::new(
        FakeScheduler::new()
            .with_event(
                "Dump",
                JobPlan {
                    progress: 0.4,
                    run_for: Duration::from_millis(150),
                    elapsed: 12.0,
                    ..JobPlan::default()
                },
            )
            .with_event(
                "Upload",
                JobPlan {
                    elapsed: 3.5,
                    ..JobPlan::default()
                },
            ),
    );
    let hooks = start(&api)?;
    let runner = SequenceRunner::new(api.clone(), &hooks, fast_polling());

    let mut reporter = RecordingReporter::default();
    let completed = runner.execute(&["Dump", "Upload"], &mut reporter)?;

    assert_eq!(completed.len(), 2);
    assert_eq!(completed[0].title, "Dump");
    assert_eq!(completed[1].elapsed, Some(3.5));
    assert_eq!(api.started(), vec!["Dump", "Upload"]);

    let progress = &reporter.progress;
    assert!(approx(progress[0], 0.2), "first report was {}", progress[0]);
    let after_first = progress
        .iter()
        .copied()
        .find(|p| !approx(*p, 0.2))
        .expect("progress moved past the first event");
    assert!(approx(after_first, 0.5), "next report was {}", after_first);
    assert!(approx(*progress.last().unwrap(), 1.0));
    assert!(progress.windows(2).all(|w| w[0] <= w[1] + 1e-9));

    assert_eq!(
        reporter.perf,
        vec![("Dump".to_string(), 12.0), ("Upload".to_string(), 3.5)]
    );
    assert_eq!(reporter.messages[0], "Running event Dump.");
    assert_eq!(hooks.pending(), 0);
    Ok(())
}

#[test]
fn test_failed_event_aborts_sequence() -> Result<()> {
    let api = Arc::new(
        FakeScheduler::new()
            .with_event(
                "Backup",
                JobPlan {
                    code: 7,
                    description: "disk full".to_string(),
                    ..JobPlan::default()
                },
            )
            .with_event("Prune", JobPlan::default()),
    );
    let hooks = start(&api)?;
    let runner = SequenceRunner::new(api.clone(), &hooks, fast_polling());

    let mut reporter = RecordingReporter::default();
    let err = runner
        .execute(&["Backup", "Prune"], &mut reporter)
        .unwrap_err();

    match &err {
        SchedulerError::JobFailure {
            title,
            code,
            description,
        } => {
            assert_eq!(title, "Backup");
            assert_eq!(*code, 7);
            assert_eq!(description, "disk full");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.code(), 3);
    assert_eq!(api.started(), vec!["Backup"]);
    assert!(reporter.perf.is_empty());
    Ok(())
}

#[test]
fn test_lost_completion_is_detected_by_polling() -> Result<()> {
    let api = Arc::new(FakeScheduler::new().with_event(
        "Reindex",
        JobPlan {
            progress: 0.1,
            run_for: Duration::from_millis(30),
            push_complete: false,
            elapsed: 8.0,
            ..JobPlan::default()
        },
    ));
    let hooks = start(&api)?;
    let runner = SequenceRunner::new(api.clone(), &hooks, fast_polling());

    let mut reporter = RecordingReporter::default();
    let completed = runner.execute(&["Reindex"], &mut reporter)?;

    assert_eq!(completed[0].elapsed, Some(8.0));
    assert!(approx(*reporter.progress.last().unwrap(), 1.0));
    // One fetch when the job started, at least one forced refresh after.
    assert!(api.status_calls() >= 2);
    assert_eq!(hooks.pending(), 0);
    Ok(())
}

#[test]
fn test_lost_completions_do_not_accumulate() -> Result<()> {
    let api = Arc::new(FakeScheduler::new().with_event(
        "Reindex",
        JobPlan {
            run_for: Duration::from_millis(20),
            push_complete: false,
            ..JobPlan::default()
        },
    ));
    let hooks = start(&api)?;
    let runner = SequenceRunner::new(api.clone(), &hooks, fast_polling());

    for _ in 0..3 {
        runner.execute(&["Reindex"], &mut RecordingReporter::default())?;
    }
    assert_eq!(api.started().len(), 3);
    assert_eq!(hooks.pending(), 0);
    Ok(())
}

#[test]
fn test_status_outage_aborts_sequence() -> Result<()> {
    let api = Arc::new(
        FakeScheduler::new()
            .with_event(
                "Backup",
                JobPlan {
                    push_complete: false,
                    status_fails: true,
                    run_for: Duration::from_millis(10),
                    ..JobPlan::default()
                },
            )
            .with_event("Prune", JobPlan::default()),
    );
    let hooks = start(&api)?;
    let runner = SequenceRunner::new(api.clone(), &hooks, fast_polling());

    let err = runner
        .execute(&["Backup", "Prune"], &mut RecordingReporter::default())
        .unwrap_err();

    match &err {
        SchedulerError::Remote(RemoteCallError::Status { status, .. }) => assert_eq!(*status, 503),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.code(), 100);
    assert_eq!(api.started(), vec!["Backup"]);
    // One failed fetch at start, then a full forced refresh.
    assert_eq!(api.status_calls(), 1 + fast_polling().refresh_attempts as usize);
    Ok(())
}

#[test]
fn test_launch_failure_aborts_sequence() -> Result<()> {
    let api = Arc::new(
        FakeScheduler::new()
            .with_event(
                "Backup",
                JobPlan {
                    launch_fails: true,
                    ..JobPlan::default()
                },
            )
            .with_event("Prune", JobPlan::default()),
    );
    let hooks = start(&api)?;
    let runner = SequenceRunner::new(api.clone(), &hooks, fast_polling());

    let err = runner
        .execute(&["Backup", "Prune"], &mut RecordingReporter::default())
        .unwrap_err();

    assert!(matches!(err, SchedulerError::LaunchFailure { ref title } if title == "Backup"));
    assert_eq!(err.code(), 101);
    assert_eq!(api.started(), vec!["Backup"]);
    Ok(())
}

#[test]
fn test_one_listener_serves_many_runs() -> Result<()> {
    let api = Arc::new(
        FakeScheduler::new()
            .with_event("One", JobPlan::default())
            .with_event("Two", JobPlan::default())
            .with_event("Three", JobPlan::default()),
    );
    let hooks = start(&api)?;
    let addr = hooks.local_addr();
    let runner = SequenceRunner::new(api.clone(), &hooks, fast_polling());

    let completed = runner.execute(&["One", "Two", "Three"], &mut RecordingReporter::default())?;
    let jobs: Vec<&str> = completed.iter().map(|c| c.job_id.as_str()).collect();
    assert_eq!(jobs, vec!["job-1", "job-2", "job-3"]);
    assert_eq!(api.started(), vec!["One", "Two", "Three"]);
    assert_eq!(hooks.local_addr(), addr);

    // A second sequence reuses the same listener.
    let again = runner.execute(&["Two"], &mut RecordingReporter::default())?;
    assert_eq!(again[0].job_id.as_str(), "job-4");
    Ok(())
}
