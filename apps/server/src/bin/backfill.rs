//! Historical backfill of mandi prices into the local store.
//!
//! ```text
//! mandi-backfill --states Karnataka,Punjab --days 7
//! mandi-backfill --states Karnataka --start-date 2025-01-01 --end-date 2025-01-31
//! ```

use std::time::Duration;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::Parser;

use mandi_core::prices::{BackfillRequest, DEFAULT_HOT_STATES};
use mandi_server::{build_state, config::Config, init_tracing};

#[derive(Parser, Debug)]
#[command(
    name = "mandi-backfill",
    version,
    about = "Load historical mandi prices into the local store"
)]
struct Args {
    /// Comma separated states (defaults to the hot states)
    #[arg(long, value_delimiter = ',')]
    states: Vec<String>,

    /// Days ending at the end date, inclusive
    #[arg(long, default_value_t = 7)]
    days: u32,

    /// First day to load (overrides --days)
    #[arg(long)]
    start_date: Option<NaiveDate>,

    /// Last day to load (defaults to today)
    #[arg(long)]
    end_date: Option<NaiveDate>,

    /// Fetch days that already have stored records
    #[arg(long)]
    no_skip_existing: bool,

    /// Pause between fetches in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,
}

impl Args {
    fn into_request(self, today: NaiveDate) -> anyhow::Result<BackfillRequest> {
        let end_date = self.end_date.unwrap_or(today);
        let start_date = match self.start_date {
            Some(start) => start,
            None => {
                let span = i64::from(self.days.max(1)) - 1;
                end_date - chrono::Duration::days(span)
            }
        };
        let states = if self.states.is_empty() {
            DEFAULT_HOT_STATES.iter().map(|s| s.to_string()).collect()
        } else {
            self.states
        };
        if start_date > end_date {
            anyhow::bail!("start date {} is after end date {}", start_date, end_date);
        }
        Ok(BackfillRequest {
            states,
            start_date,
            end_date,
            skip_existing: !self.no_skip_existing,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = Config::from_env()?;
    init_tracing();

    if let Some(ms) = args.delay_ms {
        config.backfill_delay = Duration::from_millis(ms);
    }
    let request = args.into_request(Utc::now().date_naive())?;
    tracing::info!(
        "Backfilling {:?} from {} to {}",
        request.states,
        request.start_date,
        request.end_date
    );

    let state = build_state(&config).await?;
    let stats = state
        .backfill_loader
        .run(&request)
        .await
        .context("Backfill request rejected")?;

    println!("{}", serde_json::to_string_pretty(&stats)?);
    stats.ensure_complete()?;
    Ok(())
}
