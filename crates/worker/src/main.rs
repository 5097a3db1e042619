use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod analysis;

#[derive(Debug, Parser)]
#[command(name = "stockdash_worker")]
struct Args {
    /// Analysis result file: a JSON array of stocks in rank order.
    #[arg(long)]
    input: PathBuf,

    /// Parse and validate without writing to the database.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = stockdash_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let entries = analysis::load_analysis(&args.input)?;
    let total = entries.len();

    let (records, rejected) = analysis::build_records(entries);
    for r in &rejected {
        tracing::warn!(
            rank = r.rank,
            ticker = r.ticker.as_deref().unwrap_or("unknown"),
            error = %format!("{:#}", r.error),
            "invalid analysed stock; skipping"
        );
    }
    let mut failed: usize = rejected.len();

    if args.dry_run {
        tracing::info!(
            input = %args.input.display(),
            dry_run = true,
            total,
            valid = records.len(),
            invalid = failed,
            "analysis validated"
        );
        return Ok(());
    }

    let pool = stockdash_core::storage::connect_pool(settings.require_database_url()?).await?;
    stockdash_core::storage::migrate(&pool).await?;

    let updated_at = chrono::Utc::now();
    let mut written: usize = 0;
    for record in &records {
        match stockdash_core::storage::analysis::persist_stock_analysis(&pool, record, updated_at)
            .await
        {
            Ok(()) => written += 1,
            Err(err) => {
                failed += 1;
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(ticker = %record.ticker, error = %format!("{err:#}"), "stock write failed");
            }
        }
    }

    tracing::info!(total, written, failed, "analysis write summary");

    anyhow::ensure!(
        total == 0 || written > 0,
        "no stocks were written ({failed} failed)"
    );
    Ok(())
}

fn init_sentry(settings: &stockdash_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
