//! jobmail CLI: job-application tracking from a mailbox.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use jobmail::config::JobmailConfig;
use jobmail::email::ImapConnector;
use jobmail::job::{JobRecord, determine_status};
use jobmail::paths::JobmailPaths;
use jobmail::pipeline::{Ingestor, RunOptions, RunSummary, Scheduler, ShutdownFlag};
use jobmail::store::{JobSink, JobStore};

#[derive(Parser)]
#[command(
    name = "jobmail",
    version,
    about = "Track job applications from your inbox"
)]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/jobmail/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for the job database.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one ingestion pass over the mailbox window.
    Run,

    /// Run a pass now and then every schedule.interval_secs until interrupted.
    Watch,

    /// List stored job records.
    List {
        /// Print records as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Delete one record by id.
    Delete {
        /// Record id.
        id: u64,
    },

    /// Delete every record.
    Clear,

    /// Show how a message would be classified, without touching the mailbox.
    Classify {
        /// Message subject.
        #[arg(long)]
        subject: String,

        /// Sender address.
        #[arg(long)]
        from: String,

        /// Message body, used for status inference.
        #[arg(long, default_value = "")]
        body: String,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run => {
            config.validate()?;
            let store = open_store(cli.data_dir.as_deref(), &config)?;
            let connector = ImapConnector::new(config.mailbox.clone());
            let extractor = config.extraction.build();
            let mut ingestor = Ingestor::new(
                &connector,
                extractor.as_ref(),
                &store,
                &config.classifier,
                RunOptions::from_config(&config),
            );
            let summary = ingestor.run_once()?;
            print_summary(&summary);
        }

        Commands::Watch => {
            config.validate()?;
            let store = open_store(cli.data_dir.as_deref(), &config)?;
            let connector = ImapConnector::new(config.mailbox.clone());
            let extractor = config.extraction.build();
            let mut ingestor = Ingestor::new(
                &connector,
                extractor.as_ref(),
                &store,
                &config.classifier,
                RunOptions::from_config(&config),
            );

            let shutdown = ShutdownFlag::new();
            shutdown.register_signals().into_diagnostic()?;
            let scheduler = Scheduler::new(config.schedule.interval(), shutdown);
            scheduler.run(|| {
                ingestor.run_logged();
            });
        }

        Commands::List { json } => {
            let store = open_store(cli.data_dir.as_deref(), &config)?;
            let records = store.list_all()?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&records).into_diagnostic()?
                );
            } else if records.is_empty() {
                println!("No job records.");
            } else {
                print_records(&records);
            }
        }

        Commands::Delete { id } => {
            let store = open_store(cli.data_dir.as_deref(), &config)?;
            if store.delete(id)? {
                println!("Deleted record {id}.");
            } else {
                miette::bail!("no record with id {id}");
            }
        }

        Commands::Clear => {
            let store = open_store(cli.data_dir.as_deref(), &config)?;
            let count = store.list_all()?.len();
            store.clear_all()?;
            println!("Deleted {count} record(s).");
        }

        Commands::Classify {
            subject,
            from,
            body,
        } => {
            let verdict = config.classifier.classify(&subject, &from);
            println!("verdict: {verdict}");
            if verdict.is_accepted() {
                println!("status:  {}", determine_status(&subject, &body));
            }
        }
    }

    Ok(())
}

/// Load the config file and apply environment overrides.
fn load_config(explicit: Option<&Path>) -> Result<JobmailConfig> {
    let mut config = match explicit {
        Some(path) => JobmailConfig::load(path)?,
        None => {
            let paths = JobmailPaths::resolve()?;
            JobmailConfig::load_or_default(&paths.config_file())?
        }
    };
    config.apply_env();
    Ok(config)
}

/// Open the store at `--data-dir`, else `[store] data_dir`, else the XDG data dir.
fn open_store(explicit: Option<&Path>, config: &JobmailConfig) -> Result<JobStore> {
    let data_dir = match explicit.or(config.store.data_dir.as_deref()) {
        Some(dir) => dir.to_path_buf(),
        None => JobmailPaths::resolve()?.data_dir,
    };
    tracing::debug!(data_dir = %data_dir.display(), "opening job store");
    Ok(JobStore::open(&data_dir)?)
}

fn print_summary(summary: &RunSummary) {
    println!("Fetched:    {}", summary.fetched);
    println!("Accepted:   {}", summary.accepted);
    println!("Rejected:   {}", summary.rejected);
    println!("Stored:     {}", summary.stored);
    println!("Duplicates: {}", summary.duplicates);
    if summary.degraded > 0 {
        println!("Fallback:   {}", summary.degraded);
    }
    let failed = summary.failed + summary.decode_failed;
    if failed > 0 {
        println!("Failed:     {failed}");
    }
}

fn print_records(records: &[JobRecord]) {
    println!(
        "{:>5}  {:<10}  {:<10}  {:<24}  Title",
        "ID", "Date", "Status", "Company"
    );
    for r in records {
        println!(
            "{:>5}  {:<10}  {:<10}  {:<24}  {}",
            r.id,
            r.date,
            r.status.to_string(),
            truncate(&r.company, 24),
            r.title
        );
    }
    println!("\n{} record(s).", records.len());
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max_chars.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}
