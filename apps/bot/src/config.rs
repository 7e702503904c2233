use std::{path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, Result, bail};
use chrono_tz::Tz;
use market::{DEFAULT_BASE_API, DEFAULT_FEEDS};

#[derive(Clone, Debug)]
pub struct Config {
    pub discord_token: String,
    pub channel_id: u64,
    pub timezone: Tz,
    pub state_path: PathBuf,
    pub alert_interval: Duration,
    pub alert_start_delay: Duration,
    pub report_hours: Vec<u32>,
    pub suppress_repeat_alerts: bool,
    pub price_api_base_url: String,
    pub news_feeds: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| var(key).with_context(|| format!("{key} not set"));
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            discord_token: required("DISCORD_TOKEN")?,
            channel_id: parse("DISCORD_TARGET_CHANNEL_ID", &required("DISCORD_TARGET_CHANNEL_ID")?)?,
            timezone: parse("TIMEZONE", &or("TIMEZONE", "Europe/Paris"))?,
            state_path: PathBuf::from(or("STATE_PATH", "state.json")),
            alert_interval: parse_interval(&or("ALERT_INTERVAL_SECS", "300"))?,
            alert_start_delay: Duration::from_secs(parse(
                "ALERT_START_DELAY_SECS",
                &or("ALERT_START_DELAY_SECS", "10"),
            )?),
            report_hours: parse_hours(&or("REPORT_HOURS", "6,12,20"))
                .context("invalid REPORT_HOURS")?,
            suppress_repeat_alerts: parse(
                "SUPPRESS_REPEAT_ALERTS",
                &or("SUPPRESS_REPEAT_ALERTS", "false"),
            )?,
            price_api_base_url: or("PRICE_API_BASE_URL", DEFAULT_BASE_API),
            news_feeds: match var("NEWS_FEEDS") {
                Some(raw) => split_list(&raw),
                None => DEFAULT_FEEDS.iter().map(|f| f.to_string()).collect(),
            },
        })
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid {key} {raw:?}: {e}"))
}

fn parse_interval(raw: &str) -> Result<Duration> {
    let secs: u64 = parse("ALERT_INTERVAL_SECS", raw)?;
    if secs == 0 {
        bail!("ALERT_INTERVAL_SECS must be at least 1");
    }
    Ok(Duration::from_secs(secs))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// `"6,12,20"` to sorted, de-duplicated hours of the day.
pub fn parse_hours(raw: &str) -> Result<Vec<u32>> {
    let mut hours = Vec::new();

    for item in split_list(raw) {
        let hour: u32 = item.parse().with_context(|| format!("{item:?} is not an hour"))?;
        if hour > 23 {
            bail!("{hour} is not an hour of the day");
        }
        hours.push(hour);
    }

    if hours.is_empty() {
        bail!("no report hours configured");
    }

    hours.sort_unstable();
    hours.dedup();
    Ok(hours)
}
