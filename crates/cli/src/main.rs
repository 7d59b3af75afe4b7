use clap::{Parser, Subcommand};
use queue_core::config::{api_base_url_from_env_value, duration_secs_from_env_value};
use queue_core::constants::{DEFAULT_POLL_INTERVAL, DEFAULT_REQUEST_TIMEOUT};
use queue_core::{
    AdvanceOutcome, EntryId, QueueConfig, QueueController, QueueError, QueueRow, QueueSnapshot,
    SessionContext,
};
use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "queue")]
#[command(about = "Clinic patient queue CLI")]
struct Cli {
    /// Clinic backend base URL (overrides QUEUE_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the queue in priority order
    List {
        /// Only show entries whose number, identifier, name or blood pressure match
        #[arg(long, short)]
        query: Option<String>,
    },
    /// Show the entry being served
    Current,
    /// Complete the serving entry and move to the next
    Next,
    /// Remove an entry without serving it
    Remove {
        /// Queue entry id
        id: EntryId,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Escalate a registered patient as an emergency
    Emergency {
        /// Patient registry identifier
        patient_id: String,
    },
    /// Reprint the queue on every poll until Ctrl-C
    Watch,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("queue_core=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("No command given. Run `queue --help` for usage.");
        return Ok(ExitCode::SUCCESS);
    };

    let controller = build_controller(cli.api_url)?;
    let result = run(&controller, command).await;
    controller.shutdown();
    result
}

fn build_controller(
    api_url: Option<String>,
) -> Result<QueueController, Box<dyn std::error::Error>> {
    let api_url =
        api_base_url_from_env_value(api_url.or_else(|| std::env::var("QUEUE_API_URL").ok()));
    let poll_interval = duration_secs_from_env_value(
        "QUEUE_POLL_INTERVAL_SECS",
        std::env::var("QUEUE_POLL_INTERVAL_SECS").ok(),
        DEFAULT_POLL_INTERVAL,
    )?;
    let request_timeout = duration_secs_from_env_value(
        "QUEUE_REQUEST_TIMEOUT_SECS",
        std::env::var("QUEUE_REQUEST_TIMEOUT_SECS").ok(),
        DEFAULT_REQUEST_TIMEOUT,
    )?;

    let cfg = Arc::new(QueueConfig::new(api_url, poll_interval, request_timeout)?);
    let session = SessionContext::new(
        std::env::var("QUEUE_STAFF_ID").ok(),
        std::env::var("QUEUE_SESSION_TOKEN").ok(),
    );
    Ok(QueueController::with_http_store(cfg, session)?)
}

/// Runs one command. A command the backend rejects is reported on stderr and yields
/// `ExitCode::FAILURE`.
async fn run(
    controller: &QueueController,
    command: Commands,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    if let Commands::Watch = command {
        watch(controller).await?;
        return Ok(ExitCode::SUCCESS);
    }

    // Every other command acts on the current order, so load it first.
    controller.refresh().await?;

    match command {
        Commands::List { query } => {
            let snapshot = controller.snapshot().await;
            let rows = snapshot.filter(query.as_deref().unwrap_or_default());
            print_listing(&snapshot, &rows);
        }
        Commands::Current => match controller.current().await {
            Some(row) => print_rows(&[row]),
            None => println!("Queue is empty."),
        },
        Commands::Next => match controller.advance().await {
            Ok(AdvanceOutcome::NothingToAdvance) => {
                println!("Queue is empty; nothing to advance.")
            }
            Ok(AdvanceOutcome::Advanced {
                completed,
                now_serving,
                refreshed,
            }) => {
                println!(
                    "Completed {} {}",
                    completed.number,
                    completed.entry.display_name()
                );
                print_now_serving(now_serving.as_ref());
                warn_if_not_refreshed(refreshed);
            }
            Err(e) => {
                eprintln!("Error advancing queue: {}", e);
                return Ok(ExitCode::FAILURE);
            }
        },
        Commands::Remove { id, yes } => {
            let snapshot = controller.snapshot().await;
            let Some(row) = snapshot.view.row_for(id) else {
                eprintln!("No entry {} in the queue.", id);
                return Ok(ExitCode::FAILURE);
            };
            let prompt = format!(
                "Remove {} {} from the queue?",
                row.number,
                row.entry.display_name()
            );
            if !yes && !confirm(&prompt)? {
                println!("Cancelled.");
                return Ok(ExitCode::SUCCESS);
            }
            match controller.remove(id).await {
                Ok(outcome) => {
                    println!("Removed {} {}", row.number, row.entry.display_name());
                    if outcome.was_serving {
                        print_now_serving(outcome.now_serving.as_ref());
                    }
                    warn_if_not_refreshed(outcome.refreshed);
                }
                Err(e) => {
                    eprintln!("Error removing entry: {}", e);
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Commands::Emergency { patient_id } => {
            match controller.emergency_insert(&patient_id).await {
                Ok(outcome) => {
                    println!(
                        "{} escalated to {}",
                        outcome.patient.display_name(),
                        outcome.priority
                    );
                    match outcome.entry {
                        Some(row) => print_rows(&[row]),
                        None => println!("Not in the queue yet; it will appear on the next poll."),
                    }
                    warn_if_not_refreshed(outcome.refreshed);
                }
                Err(QueueError::PatientNotFound(id)) => {
                    eprintln!("No patient registered as {}", id);
                    return Ok(ExitCode::FAILURE);
                }
                Err(e) => {
                    eprintln!("Error escalating patient: {}", e);
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Commands::Watch => {}
    }

    Ok(ExitCode::SUCCESS)
}

async fn watch(controller: &QueueController) -> Result<(), Box<dyn std::error::Error>> {
    let poller = controller.spawn_poller();
    // Print one second behind each poll so the fetch has usually landed.
    let mut ticker = tokio::time::interval_at(
        Instant::now() + Duration::from_secs(1),
        controller.config().poll_interval(),
    );
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                let snapshot = controller.snapshot().await;
                println!();
                print_listing(&snapshot, &snapshot.rows());
            }
        }
    }

    poller.shutdown().await;
    Ok(())
}

fn confirm(prompt: &str) -> io::Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn print_now_serving(row: Option<&QueueRow>) {
    match row {
        Some(row) => println!("Now serving {} {}", row.number, row.entry.display_name()),
        None => println!("Queue is now empty."),
    }
}

fn warn_if_not_refreshed(refreshed: bool) {
    if !refreshed {
        eprintln!("Warning: queue could not be refreshed; the order shown may be out of date.");
    }
}

fn print_listing(snapshot: &QueueSnapshot, rows: &[QueueRow]) {
    if let Some(at) = snapshot.refreshed_at {
        println!(
            "{} in queue, refreshed {}",
            snapshot.len(),
            at.format("%H:%M:%S")
        );
    }
    if snapshot.stale {
        println!("Showing last known order; the latest refresh failed.");
    }
    if rows.is_empty() {
        println!("No entries.");
    } else {
        print_rows(rows);
    }
}

fn print_rows(rows: &[QueueRow]) {
    println!("{}", header_line());
    for row in rows {
        println!("{}", row_line(row));
    }
}

fn header_line() -> String {
    format!(
        "{:<2}{:<5}{:<9}{:<14}{:<26}{:<9}{:<8}{:<9}{:<6}{}",
        "", "NO.", "PRIORITY", "PATIENT", "NAME", "BP", "HR", "TEMP", "SPO2", "BMI"
    )
}

/// One listing line: serving marker, number, priority (flagged when urgent), identity and
/// vitals.
fn row_line(row: &QueueRow) -> String {
    let vitals = row.vitals();
    let priority = row.entry.effective_priority();
    let badge = if priority.is_urgent() {
        format!("{}!", priority)
    } else {
        priority.to_string()
    };
    format!(
        "{:<2}{:<5}{:<9}{:<14}{:<26}{:<9}{:<8}{:<9}{:<6}{}",
        if row.serving { ">" } else { "" },
        row.number.to_string(),
        badge,
        row.entry.patient_identifier(),
        row.entry.display_name(),
        vitals.blood_pressure,
        vitals.heart_rate,
        vitals.temperature,
        vitals.oxygen_saturation,
        vitals.bmi
    )
}
