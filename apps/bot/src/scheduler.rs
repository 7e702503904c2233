use std::{future::Future, sync::Arc, time::Duration};

use anyhow::Result;
use chrono_tz::Tz;
use market::{AlertEvaluator, NotificationSink, ReportBuilder, SharedState};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, info_span};
use tracing_futures::Instrument;

/// Runs one invocation in its own task and waits for it. Errors and panics
/// end up in the log and nowhere else.
pub async fn run_guarded<Fut>(name: &'static str, fut: Fut)
where
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    match tokio::spawn(fut).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(task = name, error = ?e, "scheduled task failed"),
        Err(e) => error!(task = name, error = %e, "scheduled task panicked"),
    }
}

/// Calls `task` every `period`, the first time after `start_delay`. An
/// invocation finishes before the next one starts; late ticks are delayed,
/// not bunched up.
pub async fn run_repeating<F, Fut>(
    name: &'static str,
    start_delay: Duration,
    period: Duration,
    mut task: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let mut tick = time::interval_at(Instant::now() + start_delay, period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tick.tick().await;
        run_guarded(name, task()).await;
    }
}

pub fn spawn_alert_loop(
    evaluator: Arc<AlertEvaluator>,
    state: Arc<SharedState>,
    sink: Arc<dyn NotificationSink>,
    start_delay: Duration,
    period: Duration,
) -> JoinHandle<()> {
    info!(
        start_delay_secs = start_delay.as_secs(),
        period_secs = period.as_secs(),
        "alert loop scheduled"
    );

    tokio::spawn(run_repeating("alerts", start_delay, period, move || {
        let evaluator = Arc::clone(&evaluator);
        let state = Arc::clone(&state);
        let sink = Arc::clone(&sink);

        async move {
            evaluator.run(&state, sink.as_ref()).await;
            Ok(())
        }
        .instrument(info_span!("alert_check"))
    }))
}

/// Six-field cron expression firing on the hour at each of `hours`.
pub fn report_cron(hours: &[u32]) -> String {
    let hours: Vec<String> = hours.iter().map(u32::to_string).collect();
    format!("0 0 {} * * *", hours.join(","))
}

pub async fn run_report(
    builder: Arc<ReportBuilder>,
    state: Arc<SharedState>,
    sink: Arc<dyn NotificationSink>,
) -> Result<()> {
    builder.run(&state, sink.as_ref()).await?;
    Ok(())
}

pub async fn schedule_reports(
    sched: &JobScheduler,
    hours: &[u32],
    timezone: Tz,
    builder: Arc<ReportBuilder>,
    state: Arc<SharedState>,
    sink: Arc<dyn NotificationSink>,
) -> Result<()> {
    let cron = report_cron(hours);
    // held for a whole run so a slow report never overlaps the next one
    let running = Arc::new(Mutex::new(()));

    sched
        .add(Job::new_async_tz(
            cron.as_str(),
            timezone,
            move |_uuid, _l| {
                let builder = Arc::clone(&builder);
                let state = Arc::clone(&state);
                let sink = Arc::clone(&sink);
                let running = Arc::clone(&running);

                Box::pin(async move {
                    let _guard = running.lock().await;
                    run_guarded(
                        "report",
                        run_report(builder, state, sink).instrument(info_span!("report")),
                    )
                    .await;
                })
            },
        )?)
        .await?;

    info!(cron = %cron, timezone = %timezone, "report job scheduled");
    Ok(())
}
