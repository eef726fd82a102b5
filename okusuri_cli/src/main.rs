use chrono::{Duration, NaiveDate, Utc};
use clap::{ArgAction, Parser, Subcommand};
use okusuri_core::status::latest_per_day;
use okusuri_core::*;
use std::path::PathBuf;
use uuid::Uuid;

const OUTBOX_FILE: &str = "outbox.jsonl";

#[derive(Parser)]
#[command(name = "okusuri")]
#[command(about = "Daily medication tracker with rest-period aware reminders", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Load configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Act as this user instead of the configured profile
    #[arg(long, global = true)]
    user: Option<String>,

    /// Log more detail to stderr (repeat for more)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Record today's dose (or a past day's)
    Log {
        /// Bleeding occurred on this day
        #[arg(long)]
        bleeding: bool,

        /// Day to record, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Change the bleeding flag of a recorded log
    Mark {
        /// Log id as printed by `log` or `history`
        id: Uuid,

        /// New bleeding flag (true or false)
        #[arg(long, action = ArgAction::Set)]
        bleeding: bool,
    },

    /// Show the current medication status (default)
    Status {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// List recorded days, newest first
    History {
        /// How many days back to show
        #[arg(long, default_value_t = 30)]
        days: i64,
    },

    /// Register a Web Push subscription for reminders
    Subscribe {
        /// Subscription JSON as produced by the browser
        #[arg(long)]
        subscription: String,

        /// Platform the subscription belongs to
        #[arg(long, default_value = "web")]
        platform: String,

        /// Store the subscription but turn reminders off
        #[arg(long)]
        disable: bool,
    },

    /// Send reminders to every user with notifications enabled
    Notify {
        /// Print the dispatch report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export recorded days to CSV
    Export {
        /// Destination CSV file
        #[arg(long)]
        output: PathBuf,
    },
}

struct Context {
    config: Config,
    store: JsonStore,
    user_id: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    okusuri_core::logging::init_with_level(okusuri_core::logging::level_for_verbosity(
        cli.verbose,
    ));

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.data.data_dir.clone());
    let user_id = cli
        .user
        .clone()
        .unwrap_or_else(|| config.profile.user_id.clone());

    let ctx = Context {
        store: JsonStore::open(data_dir)?,
        config,
        user_id,
    };

    match cli.command {
        Some(Commands::Log { bleeding, date }) => cmd_log(&ctx, bleeding, date),
        Some(Commands::Mark { id, bleeding }) => cmd_mark(&ctx, id, bleeding),
        Some(Commands::Status { json }) => cmd_status(&ctx, json),
        Some(Commands::History { days }) => cmd_history(&ctx, days),
        Some(Commands::Subscribe {
            subscription,
            platform,
            disable,
        }) => cmd_subscribe(&ctx, subscription, platform, disable),
        Some(Commands::Notify { json }) => cmd_notify(&ctx, json),
        Some(Commands::Export { output }) => cmd_export(&ctx, output),
        None => {
            // Default to "status" command
            cmd_status(&ctx, false)
        }
    }
}

/// Make sure the acting user is known to the directory
fn ensure_user(ctx: &Context) -> Result<()> {
    let name = if ctx.user_id == ctx.config.profile.user_id {
        ctx.config
            .profile
            .display_name
            .clone()
            .unwrap_or_else(|| ctx.user_id.clone())
    } else {
        ctx.user_id.clone()
    };

    let added = ctx.store.add_user(User {
        id: ctx.user_id.clone(),
        name,
        created_at: Utc::now(),
    })?;
    if added {
        tracing::info!("Registered user {}", ctx.user_id);
    }
    Ok(())
}

fn cmd_log(ctx: &Context, bleeding: bool, date: Option<NaiveDate>) -> Result<()> {
    ensure_user(ctx)?;
    let entry = record_log(&ctx.store, &ctx.user_id, date, bleeding, Utc::now())?;

    println!(
        "✓ Logged {}{}",
        entry.date,
        if entry.has_bleeding { " (bleeding)" } else { "" }
    );
    println!("  id: {}", entry.id);

    let status = medication_status(&ctx.store, &ctx.user_id, Utc::now())?;
    print_status_summary(&status);
    Ok(())
}

fn cmd_mark(ctx: &Context, id: Uuid, bleeding: bool) -> Result<()> {
    let entry = ctx.store.update_bleeding(&ctx.user_id, id, bleeding)?;
    println!(
        "✓ Updated {} ({}): bleeding={}",
        entry.id, entry.date, entry.has_bleeding
    );
    Ok(())
}

fn cmd_status(ctx: &Context, json: bool) -> Result<()> {
    let status = medication_status(&ctx.store, &ctx.user_id, Utc::now())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("\nMedication status for {}", ctx.user_id);
    println!("─────────────────────────────────────────");
    println!("  Current streak:            {} days", status.current_streak);
    if status.is_rest_period {
        println!(
            "  Rest period:               yes ({} days left)",
            status.rest_days_left
        );
    } else {
        println!("  Rest period:               no");
    }
    println!(
        "  Consecutive bleeding days: {}",
        status.consecutive_bleeding_days
    );
    println!();
    println!("  {}", compose_message(&status));
    println!();
    Ok(())
}

fn print_status_summary(status: &MedicationStatus) {
    if status.is_rest_period {
        println!("  Rest period: {} days left", status.rest_days_left);
    } else {
        println!("  Streak: {} days", status.current_streak);
    }
}

fn cmd_history(ctx: &Context, days: i64) -> Result<()> {
    let logs = ctx.store.logs_for_user(&ctx.user_id)?;
    let cutoff = Utc::now().date_naive() - Duration::days(days.max(0));

    let recent: Vec<_> = latest_per_day(&logs)
        .into_iter()
        .rev()
        .filter(|(date, _)| *date > cutoff)
        .collect();

    if recent.is_empty() {
        println!("No logs in the last {} days.", days);
        return Ok(());
    }

    for (date, entry) in recent {
        println!(
            "  {}  {:<9} {}",
            date,
            if entry.has_bleeding { "bleeding" } else { "-" },
            entry.id
        );
    }
    Ok(())
}

fn cmd_subscribe(
    ctx: &Context,
    subscription: String,
    platform: String,
    disable: bool,
) -> Result<()> {
    let parsed = PushSubscription::parse(&subscription)?;
    ensure_user(ctx)?;

    let setting =
        NotificationSetting::new(&ctx.user_id, &platform, subscription, !disable, Utc::now());
    ctx.store.save_setting(setting)?;

    println!(
        "✓ Notifications {} for {} ({})",
        if disable { "disabled" } else { "enabled" },
        ctx.user_id,
        platform
    );
    println!("  endpoint: {}", parsed.preview());
    Ok(())
}

fn cmd_notify(ctx: &Context, json: bool) -> Result<()> {
    let dedup = DedupCache::from_config(&ctx.config.notification);
    let transport = OutboxTransport::new(ctx.store.dir().join(OUTBOX_FILE), &ctx.config.push);

    let report = DispatchCoordinator::new(&ctx.store, &ctx.store, &ctx.store, &transport, &dedup)
        .with_title(ctx.config.notification.title.clone())
        .dispatch(Utc::now())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("✓ Sent {} notification(s)", report.sent_count);
    if report.skipped_shared + report.skipped_recent > 0 {
        println!(
            "  Skipped as duplicates: {}",
            report.skipped_shared + report.skipped_recent
        );
    }
    if report.skipped_disabled > 0 {
        println!("  Without reminders:     {}", report.skipped_disabled);
    }
    if report.failed > 0 {
        println!("  Failed:                {}", report.failed);
    }
    Ok(())
}

fn cmd_export(ctx: &Context, output: PathBuf) -> Result<()> {
    let logs = ctx.store.logs_for_user(&ctx.user_id)?;
    let rows = write_logs_csv(&logs, &output)?;

    println!("✓ Exported {} days", rows);
    println!("  CSV: {}", output.display());
    Ok(())
}
