//! voipbill - VoIP rate listing, call simulation and billing reports

use anyhow::Context;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voipbill::{
    cli::{AnalyticArgs, Cli, Command, RateBookArgs, RateListingArgs, ReportFilterArgs, TimezoneArgs},
    config::AppConfig,
    server::{self, AppState},
};
use voipbill_analytics::{
    pipeline::BillingQuery, report::BillingReporter, store::InMemoryAnalyticStore,
};
use voipbill_core::{
    aggregation_types::BillingTotals,
    dates::{DayBound, ceil_strdate, day_range, parse_form_date, pin_to_day},
    timezone::TimezoneConfig,
    types::{AccountCode, RateRow, SwitchId, VoipPlanId},
};
use voipbill_rates::{csv_export::export_rates_to_path, engine::RateBook};
use voipbill_terminal::output::get_formatter;

fn timezone_config(args: &TimezoneArgs) -> anyhow::Result<TimezoneConfig> {
    let tz_config = TimezoneConfig::from_cli(args.timezone.as_deref(), args.utc)?;
    info!("Using timezone: {}", tz_config.display_name());
    Ok(tz_config)
}

/// Load the analytic documents and wrap them in a reporter
async fn create_reporter(
    analytic: &AnalyticArgs,
    timezone: TimezoneConfig,
) -> anyhow::Result<BillingReporter> {
    let store = Arc::new(InMemoryAnalyticStore::new());
    store
        .load_jsonl(&analytic.collection, &analytic.analytic_data)
        .await
        .with_context(|| format!("loading {}", analytic.analytic_data.display()))?;
    Ok(BillingReporter::new(store, analytic.collection.clone(), timezone))
}

fn report_filter(filter: &ReportFilterArgs) -> anyhow::Result<(SwitchId, Option<AccountCode>)> {
    let switch_id = filter.switch.parse::<SwitchId>()?;
    let accountcode = filter
        .accountcode
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(AccountCode::new);
    Ok((switch_id, accountcode))
}

fn load_rate_book(path: &Path) -> anyhow::Result<RateBook> {
    RateBook::load(path).with_context(|| format!("loading rate book {}", path.display()))
}

fn rate_listing(book: &RateBookArgs, listing: &RateListingArgs) -> anyhow::Result<Vec<RateRow>> {
    let rate_book = load_rate_book(&book.rate_book)?;
    let (sort_field, sort_order) = server::pagination::parse_sort_by(&listing.sort_by);
    Ok(rate_book.rate_listing(
        VoipPlanId::new(book.voipplan),
        listing.dialcode.as_deref(),
        sort_field,
        sort_order,
    )?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments first to check for quiet flag
    let cli = Cli::parse();

    // Initialize logging. The --quiet flag should override RUST_LOG.
    let filter = if cli.quiet {
        tracing_subscriber::EnvFilter::new("warn")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("voipbill=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if !is_terminal::is_terminal(std::io::stdout()) {
        colored::control::set_override(false);
    }

    let json = cli.json;
    let formatter = get_formatter(json);

    match cli.command {
        Command::Serve(args) => {
            let config = AppConfig::from_args(&args, &cli.timezone_args)?;
            info!("Using timezone: {}", config.timezone.display_name());

            let listener = tokio::net::TcpListener::bind(config.listen_addr())
                .await
                .with_context(|| format!("binding {}", config.listen_addr()))?;
            let state = AppState::from_config(config, listener.local_addr()?).await?;
            server::serve(listener, state).await?;
        }
        Command::Daily {
            analytic,
            filter,
            from,
            to,
        } => {
            info!("Running daily billing report");
            let tz_config = timezone_config(&cli.timezone_args)?;
            let today = tz_config.today();

            let start = match from.as_deref() {
                Some(date) => ceil_strdate(date, DayBound::Start)?,
                None => pin_to_day(today, DayBound::Start),
            };
            let end = match to.as_deref() {
                Some(date) => ceil_strdate(date, DayBound::End)?,
                None => pin_to_day(today, DayBound::End),
            };
            let (switch_id, accountcode) = report_filter(&filter)?;

            let reporter = create_reporter(&analytic, tz_config).await?;
            let query = BillingQuery::new(start, end)
                .with_switch(switch_id)
                .with_accountcode(accountcode);
            let buckets = reporter.daily_report(&query).await?;
            let totals = BillingTotals::from_daily(&buckets);
            println!("{}", formatter.format_daily(&buckets, &totals));
        }
        Command::Hourly {
            analytic,
            filter,
            date,
        } => {
            info!("Running hourly billing report");
            let tz_config = timezone_config(&cli.timezone_args)?;
            let day = match date.as_deref() {
                Some(date) => parse_form_date(date)?,
                None => tz_config.today(),
            };
            let (switch_id, accountcode) = report_filter(&filter)?;

            let reporter = create_reporter(&analytic, tz_config).await?;
            let (start, end) = day_range(day);
            let query = BillingQuery::new(start, end)
                .with_switch(switch_id)
                .with_accountcode(accountcode);
            let report = reporter.hourly_report(&query).await?;
            let totals = BillingTotals::from_hourly(&report);
            println!("{}", formatter.format_hourly(&report, &totals));
        }
        Command::Rates { book, listing } => {
            let rates = rate_listing(&book, &listing)?;
            println!("{}", formatter.format_rates(&rates));
        }
        Command::ExportRates {
            book,
            listing,
            output,
        } => {
            let rates = rate_listing(&book, &listing)?;
            export_rates_to_path(&output, &rates)
                .with_context(|| format!("writing {}", output.display()))?;
            info!("Exported {} rates to {}", rates.len(), output.display());
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "output": output.display().to_string(),
                        "rate_count": rates.len(),
                    })
                );
            }
        }
        Command::Simulate {
            book,
            destination_no,
        } => {
            let rate_book = load_rate_book(&book.rate_book)?;
            let rows = rate_book.simulate(&destination_no, VoipPlanId::new(book.voipplan))?;
            println!("{}", formatter.format_simulation(&destination_no, &rows));
        }
    }

    Ok(())
}
