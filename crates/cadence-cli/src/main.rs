//! Cadence CLI
//!
//! Command-line interface for the Cadence spaced-repetition engine.

use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use directories::ProjectDirs;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use cadence_core::{NewItem, ReviewRecord, ScheduleOutcome, Scheduler, SchedulerConfig, Storage};

/// Cadence - spaced-repetition scheduler CLI
#[derive(Parser)]
#[command(name = "cadence")]
#[command(author = "Cadence Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "CLI for the Cadence spaced-repetition engine")]
#[command(long_about = "Cadence schedules flashcard reviews with an FSRS-style memory model.\n\nGrade each review on the configured scale (1-5 by default) and Cadence works out when you should see the item again.")]
struct Cli {
    /// Database file (defaults to the platform data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Scheduler config file in TOML (defaults to config.toml in the platform config directory, if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new item
    Add {
        /// Prompt side
        front: String,
        /// Answer side
        back: String,
    },

    /// List items due for review, most overdue first
    Due {
        /// Maximum number of items to show
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Grade a review of an item
    Review {
        /// Item id
        id: Uuid,
        /// Score on the configured rating scale
        #[arg(allow_negative_numbers = true)]
        score: i32,
    },

    /// Show the interval each rating would schedule right now
    Preview {
        /// Item id
        id: Uuid,
    },

    /// Show an item's review history
    History {
        /// Item id
        id: Uuid,
        /// Include retracted reviews
        #[arg(long)]
        all: bool,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Replace an item's text (history is kept)
    Edit {
        /// Item id
        id: Uuid,
        /// New prompt side
        front: String,
        /// New answer side
        back: String,
    },

    /// Delete an item (its reviews stay in the audit trail)
    Delete {
        /// Item id
        id: Uuid,
        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Retract a single review, e.g. a mis-graded one
    Retract {
        /// Review record id
        review_id: Uuid,
    },

    /// Replay every history and rewrite cached memory states
    Rebuild,

    /// Show store statistics
    Stats {
        /// Print JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let storage = open_storage(cli.db, cli.config)?;

    match cli.command {
        Commands::Add { front, back } => run_add(&storage, front, back),
        Commands::Due { limit, json } => run_due(&storage, limit, json),
        Commands::Review { id, score } => run_review(&storage, id, score),
        Commands::Preview { id } => run_preview(&storage, id),
        Commands::History { id, all, json } => run_history(&storage, id, all, json),
        Commands::Edit { id, front, back } => run_edit(&storage, id, front, back),
        Commands::Delete { id, yes } => run_delete(&storage, id, yes),
        Commands::Retract { review_id } => run_retract(&storage, review_id),
        Commands::Rebuild => run_rebuild(&storage),
        Commands::Stats { json } => run_stats(&storage, json),
    }
}

/// Open the store with the effective scheduler config
fn open_storage(db: Option<PathBuf>, config: Option<PathBuf>) -> anyhow::Result<Storage> {
    let config = match config.or_else(default_config_path) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "Using scheduler config");
            SchedulerConfig::load(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config {}: {}", path.display(), e))?
        }
        None => SchedulerConfig::default(),
    };
    let scheduler = Scheduler::new(config)?;
    Ok(Storage::new(db)?.with_scheduler(scheduler))
}

/// The platform config file, if one exists
fn default_config_path() -> Option<PathBuf> {
    let proj_dirs = ProjectDirs::from("com", "cadence", "core")?;
    let path = proj_dirs.config_dir().join("config.toml");
    path.exists().then_some(path)
}

/// Add an item
fn run_add(storage: &Storage, front: String, back: String) -> anyhow::Result<()> {
    if front.trim().is_empty() {
        anyhow::bail!("Front cannot be empty");
    }

    let item = storage.add_item(NewItem::new(front, back))?;
    println!("{}: {}", "Item ID".white().bold(), item.id);
    println!(
        "{}",
        format!("Item added ({})", truncate(&item.front, 60)).green().bold()
    );
    Ok(())
}

/// List due items
fn run_due(storage: &Storage, limit: usize, json: bool) -> anyhow::Result<()> {
    let due = storage.due_items(limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&due)?);
        return Ok(());
    }

    println!("{}", "=== Cadence Due Items ===".cyan().bold());
    println!();

    if due.items.is_empty() {
        println!("{}", "Nothing due. Come back later.".dimmed());
        return Ok(());
    }

    let now = storage.now();
    for entry in &due.items {
        let status = match &entry.schedule {
            None => "new".blue().to_string(),
            Some(schedule) => format!("overdue {}", format_duration(now - schedule.next_due)).yellow().to_string(),
        };
        println!(
            "  {}  {:<50} {}",
            entry.item.id.to_string().dimmed(),
            truncate(&entry.item.front, 50),
            status
        );
    }

    if due.remaining() > 0 {
        println!();
        println!("{}", format!("... and {} more due", due.remaining()).dimmed());
    }
    Ok(())
}

/// Grade a review
fn run_review(storage: &Storage, id: Uuid, score: i32) -> anyhow::Result<()> {
    let reviewed = storage.review(id, score)?;
    let record = &reviewed.record;
    let memory = &reviewed.scheduled.memory;

    println!("{}", "=== Cadence Review ===".cyan().bold());
    println!();
    println!("{}: {} ({})", "Rating".white().bold(), record.rating, record.quality);
    println!("{}: {:.2} days", "Stability".white().bold(), memory.stability);
    println!("{}: {:.2}", "Difficulty".white().bold(), memory.difficulty);
    println!("{}: {}", "Review ID".white().bold(), record.id);
    println!();
    println!(
        "{}",
        format!(
            "Next review in {} ({})",
            pluralize_days(record.interval_days()),
            format_timestamp(&record.next_due)
        )
        .green()
        .bold()
    );
    Ok(())
}

/// Preview all ratings
fn run_preview(storage: &Storage, id: Uuid) -> anyhow::Result<()> {
    let item = storage
        .get_item(id)?
        .ok_or_else(|| anyhow::anyhow!("Item not found: {}", id))?;
    let preview = storage.preview(id)?;
    let scale = storage.scheduler().config().rating_scale;

    println!("{}", "=== Cadence Preview ===".cyan().bold());
    println!("{}", truncate(&item.front, 70).white());
    println!();

    let rows: [(&str, &ScheduleOutcome); 4] = [
        ("again", &preview.again),
        ("hard", &preview.hard),
        ("good", &preview.good),
        ("easy", &preview.easy),
    ];
    for (label, outcome) in rows {
        println!(
            "  {:6} {:>10}   stability {:>8.2}",
            label,
            pluralize_days(outcome.interval_days as i64),
            outcome.state.stability
        );
    }
    println!();
    println!("{}", format!("Grading on the {} scale", scale).dimmed());
    Ok(())
}

/// Show review history
fn run_history(storage: &Storage, id: Uuid, all: bool, json: bool) -> anyhow::Result<()> {
    let item = storage
        .get_item(id)?
        .ok_or_else(|| anyhow::anyhow!("Item not found: {}", id))?;
    let records = if all {
        storage.audit_trail(id)?
    } else {
        storage.history(id)?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    println!("{}", "=== Cadence History ===".cyan().bold());
    println!("{}", truncate(&item.front, 70).white());
    if item.is_deleted() {
        println!("{}", "(item deleted)".red());
    }
    println!();

    if records.is_empty() {
        println!("{}", "Never reviewed.".dimmed());
        return Ok(());
    }

    for record in &records {
        println!("  {}", format_record(record));
    }

    if let Some(state) = storage.item_state(id)? {
        println!();
        println!(
            "{}: {:.1}%",
            "Recall Probability Now".white().bold(),
            storage.scheduler().retrievability_at(&state.memory, storage.now()) * 100.0
        );
    }
    Ok(())
}

/// Edit an item's text
fn run_edit(storage: &Storage, id: Uuid, front: String, back: String) -> anyhow::Result<()> {
    if front.trim().is_empty() {
        anyhow::bail!("Front cannot be empty");
    }
    let item = storage.update_item_text(id, &front, &back)?;
    println!(
        "{}",
        format!("Item updated ({})", truncate(&item.front, 60)).green().bold()
    );
    Ok(())
}

/// Delete an item
fn run_delete(storage: &Storage, id: Uuid, yes: bool) -> anyhow::Result<()> {
    let item = storage
        .get_item(id)?
        .ok_or_else(|| anyhow::anyhow!("Item not found: {}", id))?;

    if !yes {
        print!(
            "{} Delete \"{}\"? [y/N] ",
            "WARNING:".red().bold(),
            truncate(&item.front, 50)
        );
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        let input = input.trim().to_lowercase();

        if input != "y" && input != "yes" {
            println!("{}", "Aborted.".yellow());
            return Ok(());
        }
    }

    if storage.soft_delete_item(id)? {
        println!("{}", "Item deleted".green().bold());
    } else {
        println!("{}", "Item was already deleted".yellow());
    }
    Ok(())
}

/// Retract one review
fn run_retract(storage: &Storage, review_id: Uuid) -> anyhow::Result<()> {
    if storage.soft_delete_review(review_id)? {
        println!("{}", "Review retracted; schedule recomputed from the remaining history".green().bold());
        Ok(())
    } else {
        anyhow::bail!("Review not found or already retracted: {}", review_id)
    }
}

/// Rebuild snapshots
fn run_rebuild(storage: &Storage) -> anyhow::Result<()> {
    let report = storage.rebuild_snapshots()?;

    println!("{}", "=== Cadence Rebuild ===".cyan().bold());
    println!();
    println!("{}: {}", "Items Scanned".white().bold(), report.items);
    println!("{}: {}", "Snapshots Written".white().bold(), report.written);
    println!("{}: {}", "Snapshots Removed".white().bold(), report.removed);
    println!("{}: {}", "Stale".white().bold(), report.stale);

    let drifted = format!("{}", report.drifted);
    println!(
        "{}: {}",
        "Drifted".white().bold(),
        if report.drifted > 0 { drifted.red().bold() } else { drifted.green() }
    );
    Ok(())
}

/// Run stats command
fn run_stats(storage: &Storage, json: bool) -> anyhow::Result<()> {
    let stats = storage.stats()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{}", "=== Cadence Statistics ===".cyan().bold());
    println!();
    println!("{}: {}", "Items".white().bold(), stats.total_items);
    println!("{}: {}", "Due Now".white().bold(), stats.due_now);
    println!("{}: {}", "Never Reviewed".white().bold(), stats.new_items);
    println!("{}: {}", "Reviews".white().bold(), stats.total_reviews);
    if stats.retracted_reviews > 0 {
        println!("{}: {}", "Retracted Reviews".white().bold(), stats.retracted_reviews);
    }
    if stats.deleted_items > 0 {
        println!("{}: {}", "Deleted Items".white().bold(), stats.deleted_items);
    }
    if let Some(r) = stats.average_retrievability {
        println!("{}: {:.1}%", "Average Recall Probability".white().bold(), r * 100.0);
    }
    if let Some(oldest) = stats.oldest_item {
        println!("{}: {}", "Oldest Item".white().bold(), format_timestamp(&oldest));
    }
    if let Some(newest) = stats.newest_item {
        println!("{}: {}", "Newest Item".white().bold(), format_timestamp(&newest));
    }
    Ok(())
}

// ============================================================================
// FORMATTING
// ============================================================================

fn format_record(record: &ReviewRecord) -> String {
    let line = format!(
        "{}  {:<6} ({})  next {}  {}",
        format_timestamp(&record.reviewed_at),
        record.rating.as_str(),
        record.quality,
        format_timestamp(&record.next_due),
        record.id
    );
    if record.is_deleted() {
        format!("{} {}", line.dimmed().strikethrough(), "retracted".red())
    } else {
        line
    }
}

fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M").to_string()
}

fn pluralize_days(days: i64) -> String {
    if days == 1 {
        "1 day".to_string()
    } else {
        format!("{} days", days)
    }
}

/// Coarse human duration: days when at least one, else hours
fn format_duration(d: chrono::Duration) -> String {
    if d.num_days() >= 1 {
        pluralize_days(d.num_days())
    } else {
        format!("{}h", d.num_hours().max(0))
    }
}

/// Truncate a string for display (UTF-8 safe)
fn truncate(s: &str, max_chars: usize) -> String {
    let s = s.replace('\n', " ");
    if s.chars().count() <= max_chars {
        s
    } else {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}
