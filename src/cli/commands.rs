use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use crate::backup::discover_backups;
use crate::export::{
    ExportContext, ExportFormat, ExportNotifier, ExportOptions, Exporter, PageOrder, PassOutcome,
};
use crate::utils::default_backup_root;

const DEFAULT_DOMAIN: &str = "AppDomain-com.example.messenger";

#[derive(Parser)]
#[command(name = "mobile-chat-exporter")]
#[command(version = "0.1.0")]
#[command(about = "Export chat history from device backups", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the device backups found under a backup root
    ListBackups {
        /// Backup root; defaults to the host sync tool's backup folder
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Run one export pass against a backup
    Export {
        /// Backup directory (one device's backup, not the backup root)
        #[arg(long)]
        backup: PathBuf,
        /// Output directory; must exist
        #[arg(long)]
        output: PathBuf,
        /// Application domain to export from
        #[arg(long, default_value = DEFAULT_DOMAIN)]
        domain: String,
        /// Emit plain text instead of HTML
        #[arg(long)]
        text: bool,
        /// Newest messages first
        #[arg(long)]
        desc: bool,
        /// Ignore previous export state and re-render everything
        #[arg(long)]
        no_incremental: bool,
        /// Ship everything inline instead of paginating
        #[arg(long)]
        sync: bool,
        /// Records per page in paginated output
        #[arg(long, default_value_t = 1000)]
        page_size: usize,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::ListBackups { dir }) => list_backups(dir),
        Some(Commands::Export {
            backup,
            output,
            domain,
            text,
            desc,
            no_incremental,
            sync,
            page_size,
        }) => {
            let options = ExportOptions::default()
                .with_format(if text { ExportFormat::Text } else { ExportFormat::Html })
                .with_order(if desc { PageOrder::Descending } else { PageOrder::Ascending })
                .with_incremental(!no_incremental)
                .with_sync_loading(sync)
                .with_page_size(page_size);
            export(backup, output, domain, options)
        }
        None => {
            println!("Use --help for usage information");
            Ok(())
        }
    }
}

fn list_backups(dir: Option<PathBuf>) -> Result<()> {
    let root = match dir {
        Some(dir) => dir,
        None => default_backup_root()?,
    };
    if !root.is_dir() {
        bail!("backup root does not exist: {}", root.display());
    }

    let manifests = discover_backups(&root);
    if manifests.is_empty() {
        println!("No backups found under {}", root.display());
        return Ok(());
    }
    for manifest in manifests {
        println!("{manifest}");
    }
    Ok(())
}

fn export(backup: PathBuf, output: PathBuf, domain: String, options: ExportOptions) -> Result<()> {
    std::fs::create_dir_all(&output)
        .with_context(|| format!("Failed to create output directory {}", output.display()))?;

    if let Some((_, time)) = ExportContext::has_previous_export(&output) {
        println!("Continuing export from {}", time.format("%Y-%m-%d %H:%M"));
    }

    let mut exporter = Exporter::new(backup, &output, domain, options);
    exporter.set_notifier(Arc::new(ConsoleNotifier));
    exporter.start()?;

    match exporter.wait_for_completion() {
        Some(PassOutcome::Completed) => {
            println!("Export finished: {}", output.display());
            Ok(())
        }
        Some(PassOutcome::Cancelled) => {
            println!("Export cancelled");
            Ok(())
        }
        Some(PassOutcome::Failed(reason)) => bail!("export failed: {reason}"),
        None => bail!("export pass never started"),
    }
}

/// Prints per-conversation progress to stderr.
struct ConsoleNotifier;

impl ExportNotifier for ConsoleNotifier {
    fn on_conversation_progress(&self, conversation_id: &str, done: u32, total_records: u32) {
        if total_records > 0 && (done % 500 == 0 || done == total_records) {
            eprintln!("  {conversation_id}: {done}/{total_records}");
        }
    }

    fn on_tasks_start(&self, user_id: &str, total_tasks: u32) {
        if total_tasks > 0 {
            eprintln!("  {user_id}: waiting for {total_tasks} deferred task(s)");
        }
    }
}
