use std::{sync::Arc, time::Duration};

use anyhow::{Context as _, Result};
use cryptobot::{
    Data, command::crypto::crypto_command, config::Config, scheduler, sink::ChannelSink,
};
use market::{
    AlertEvaluator, JsonStateStore, NewsClient, NotificationSink, PriceClient, ReportBuilder,
    SharedState,
};
use poise::{Framework, FrameworkOptions};
use serenity::all::{ClientBuilder, GatewayIntents};
use tokio_cron_scheduler::JobScheduler;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let state = Arc::new(
        SharedState::open(JsonStateStore::new(&config.state_path))
            .context("refusing to start with an unreadable state file")?,
    );
    let price_client = Arc::new(PriceClient::new(config.price_api_base_url.clone())?);
    let news_client = Arc::new(NewsClient::new(config.news_feeds.clone())?);
    let sink: Arc<dyn NotificationSink> = Arc::new(ChannelSink::from_token(
        &config.discord_token,
        config.channel_id,
    ));

    let evaluator = Arc::new(
        AlertEvaluator::new(price_client.clone())
            .suppress_repeats(config.suppress_repeat_alerts),
    );
    let reports = Arc::new(ReportBuilder::new(
        price_client.clone(),
        news_client.clone(),
        config.timezone,
    ));

    let alert_loop = scheduler::spawn_alert_loop(
        evaluator,
        Arc::clone(&state),
        Arc::clone(&sink),
        config.alert_start_delay,
        config.alert_interval,
    );

    let sched = JobScheduler::new()
        .await
        .context("failed to create job scheduler")?;
    scheduler::schedule_reports(
        &sched,
        &config.report_hours,
        config.timezone,
        reports,
        Arc::clone(&state),
        sink,
    )
    .await?;

    sched.shutdown_on_ctrl_c();
    sched.start().await?;

    // The gateway connection comes and goes; the timers above do not care.
    let transport = tokio::spawn(supervise_client(
        config.discord_token.clone(),
        Data {
            price_client,
            news_client,
            state,
        },
    ));

    shutdown_signal().await;

    transport.abort();
    alert_loop.abort();
    info!("Shutdown complete.");
    Ok(())
}

/// Keeps a gateway client running, rebuilding it after every failure.
async fn supervise_client(token: String, data: Data) {
    loop {
        let data = Data {
            price_client: Arc::clone(&data.price_client),
            news_client: Arc::clone(&data.news_client),
            state: Arc::clone(&data.state),
        };

        match run_client(&token, data).await {
            Ok(()) => {
                info!("gateway client stopped");
                break;
            }
            Err(e) => {
                error!(
                    error = ?e,
                    backoff_secs = RECONNECT_BACKOFF.as_secs(),
                    "gateway client failed, restarting"
                );
                tokio::time::sleep(RECONNECT_BACKOFF).await;
            }
        }
    }
}

async fn run_client(token: &str, data: Data) -> Result<()> {
    let framework = Framework::builder()
        .options(FrameworkOptions {
            commands: vec![crypto_command()],
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!(
                    user = %ready.user.name,
                    user_id = %ready.user.id,
                    "connected successfully"
                );

                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                Ok(data)
            })
        })
        .build();

    let mut client = ClientBuilder::new(token, GatewayIntents::non_privileged())
        .framework(framework)
        .await?;

    client.start().await?;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::{
            select,
            signal::unix::{SignalKind, signal},
        };
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        select! {
            _ = sigterm.recv() => {},
            _ = sigint.recv()  => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
