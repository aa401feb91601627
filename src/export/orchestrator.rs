//! One export pass over a backup, driven on a dedicated worker thread.
//!
//! # Error Handling Strategy
//!
//! Failures are isolated at the smallest useful scope, in line with the rest
//! of the crate's graceful-degradation approach:
//!
//! - **Fatal**: an unreadable top-level manifest or an account-less backup
//!   aborts the pass before any output is produced.
//! - **Per-account / per-conversation**: I/O and store failures are logged
//!   to stderr and the pass continues with the next item.
//! - **Cancellation**: a level-triggered flag observed between conversations
//!   and between records, never mid-record. Partial progress of an in-flight
//!   conversation (high-water mark, merged fragment log) is flushed, not
//!   discarded.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};

use crate::backup::{BackupError, BackupIndex, parse_backup_directory};
use crate::export::context::{ExportContext, STATE_DIR};
use crate::export::fragments::{
    fragment_log_path, merge_fragments, read_fragments, write_fragments,
};
use crate::export::naming::choose_output_name;
use crate::export::notify::{ExportNotifier, NullNotifier};
use crate::export::options::{ExportFormat, ExportOptions};
use crate::models::{Account, Conversation};
use crate::render::{ListingItem, PlainRenderer, Renderer, ShellParams};
use crate::store::{DOCUMENTS_PREFIX, RecordEnumerator, discover_accounts};
use crate::tasks::{TaskManager, WorkerPool};
use crate::utils::{encode_url, format_elapsed};

const TASK_DRAIN_INTERVAL: Duration = Duration::from_millis(512);
const DEFAULT_TASK_WORKERS: usize = 4;

/// Terminal state of one export pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    Completed,
    Cancelled,
    Failed(String),
}

/// Cloneable handle for requesting cancellation from another thread.
#[derive(Clone)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives export passes. At most one pass is active per instance; starting a
/// second one while a pass runs is rejected, not queued. The control surface
/// (`start` / `cancel` / `is_running` / `wait_for_completion`) is safe to
/// call from a thread other than the worker's.
pub struct Exporter {
    backup_dir: PathBuf,
    output_dir: PathBuf,
    domain: String,
    options: ExportOptions,
    renderer: Arc<dyn Renderer>,
    tasks: Arc<dyn TaskManager>,
    notifier: Arc<dyn ExportNotifier>,
    running: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<PassOutcome>>>,
}

impl Exporter {
    pub fn new(
        backup_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        domain: impl Into<String>,
        options: ExportOptions,
    ) -> Self {
        let renderer = Arc::new(PlainRenderer::new(options.format()));
        Self {
            backup_dir: backup_dir.into(),
            output_dir: output_dir.into(),
            domain: domain.into(),
            options,
            renderer,
            tasks: Arc::new(WorkerPool::new(DEFAULT_TASK_WORKERS)),
            notifier: Arc::new(NullNotifier),
            running: Arc::new(AtomicBool::new(false)),
            cancelled: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    pub fn set_renderer(&mut self, renderer: Arc<dyn Renderer>) {
        self.renderer = renderer;
    }

    pub fn set_task_manager(&mut self, tasks: Arc<dyn TaskManager>) {
        self.tasks = tasks;
    }

    pub fn set_notifier(&mut self, notifier: Arc<dyn ExportNotifier>) {
        self.notifier = notifier;
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn cancel_signal(&self) -> CancelSignal {
        CancelSignal(Arc::clone(&self.cancelled))
    }

    /// Spawn the pass worker. Fails when a pass is already active or the
    /// output directory is not accessible.
    pub fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            bail!("previous export pass has not completed");
        }
        if !self.output_dir.is_dir() {
            self.running.store(false, Ordering::SeqCst);
            bail!("can't access output directory: {}", self.output_dir.display());
        }
        self.cancelled.store(false, Ordering::SeqCst);

        let runner = PassRunner {
            backup_dir: self.backup_dir.clone(),
            output_dir: self.output_dir.clone(),
            domain: self.domain.clone(),
            options: self.options.clone(),
            renderer: Arc::clone(&self.renderer),
            tasks: Arc::clone(&self.tasks),
            notifier: Arc::clone(&self.notifier),
            running: Arc::clone(&self.running),
            cancelled: Arc::clone(&self.cancelled),
        };
        let handle = thread::spawn(move || runner.run());
        *self.worker.lock().expect("exporter lock poisoned") = Some(handle);
        Ok(())
    }

    /// Block until the current pass finishes. `None` when no pass was
    /// started since the last wait.
    pub fn wait_for_completion(&self) -> Option<PassOutcome> {
        let handle = self.worker.lock().expect("exporter lock poisoned").take()?;
        let outcome = handle
            .join()
            .unwrap_or_else(|_| PassOutcome::Failed("export worker panicked".to_string()));
        self.running.store(false, Ordering::SeqCst);
        Some(outcome)
    }
}

/// Everything one pass needs, moved onto the worker thread.
struct PassRunner {
    backup_dir: PathBuf,
    output_dir: PathBuf,
    domain: String,
    options: ExportOptions,
    renderer: Arc<dyn Renderer>,
    tasks: Arc<dyn TaskManager>,
    notifier: Arc<dyn ExportNotifier>,
    running: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
}

impl PassRunner {
    fn run(mut self) -> PassOutcome {
        let started = Instant::now();
        self.notifier.on_start();

        let outcome = match self.run_pass() {
            Ok(outcome) => outcome,
            Err(e) => PassOutcome::Failed(format!("{e:#}")),
        };

        let verb = match &outcome {
            PassOutcome::Completed => "Completed",
            PassOutcome::Cancelled => "Cancelled",
            PassOutcome::Failed(_) => "Failed",
        };
        eprintln!("{} in {}.", verb, format_elapsed(started.elapsed()));

        self.notifier.on_complete(outcome == PassOutcome::Cancelled);
        self.running.store(false, Ordering::SeqCst);
        outcome
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn run_pass(&mut self) -> Result<PassOutcome> {
        // Encrypted backups can't be read without keys; refuse up front when
        // the descriptor says so.
        if let Ok(manifest) = parse_backup_directory(&self.backup_dir) {
            if manifest.encrypted {
                bail!("encrypted backups are not supported: {}", self.backup_dir.display());
            }
        }

        let mut index = BackupIndex::new(&self.backup_dir);
        index
            .load(&self.domain, true, Some(&|path, _| path.starts_with(DOCUMENTS_PREFIX)))
            .with_context(|| {
                format!("failed to load backup manifest in {}", self.backup_dir.display())
            })?;
        eprintln!("Backup index loaded: {} files.", index.len());

        let mut accounts: Vec<Account> = discover_accounts(&index)?;
        if accounts.is_empty() {
            bail!("no chat accounts found in backup {}", self.backup_dir.display());
        }
        eprintln!("{} account(s) found.", accounts.len());

        fs::create_dir_all(self.output_dir.join(STATE_DIR))
            .context("Failed to create state directory")?;

        // An incremental rerun adopts the options of the pass it continues,
        // so merged output stays consistent; the caller's options only apply
        // to fresh exports.
        let caller_options = self.options.clone();
        let prior = if self.options.is_incremental() {
            ExportContext::load(&self.output_dir)
        } else {
            None
        };
        let mut context = match prior {
            Some(prior) => {
                self.options = prior.options().clone().with_incremental(true);
                prior
            }
            None => ExportContext::new(self.options.clone()),
        };

        let mut used_names = HashSet::new();
        let mut listing = Vec::new();
        for account in &mut accounts {
            if self.is_cancelled() {
                break;
            }
            let Some(dir_name) = choose_output_name(&account.name_candidates(), &mut used_names)
            else {
                eprintln!(
                    "Warning: can't build directory name for account {}. Skipping it.",
                    account.user_id
                );
                continue;
            };
            let label = if account.display_name.is_empty() {
                account.user_id.clone()
            } else {
                account.display_name.clone()
            };
            match self.export_account(&index, account, &dir_name, &mut context) {
                Ok(()) => listing.push(ListingItem {
                    link: format!("{}/index.{}", encode_url(&dir_name), self.options.extension()),
                    label,
                }),
                Err(e) => {
                    eprintln!("Warning: account {} failed: {e:#}", account.user_id);
                }
            }
        }

        let listing_doc = self.renderer.build_listing("Exported Chats", &listing);
        let listing_path = self.output_dir.join(format!("index.{}", self.options.extension()));
        fs::write(&listing_path, listing_doc)
            .with_context(|| format!("Failed to write {}", listing_path.display()))?;

        self.options = caller_options;
        if !context.is_empty() {
            context.refresh_export_time();
            context.save(&self.output_dir)?;
        }

        Ok(if self.is_cancelled() { PassOutcome::Cancelled } else { PassOutcome::Completed })
    }

    fn export_account(
        &self,
        index: &BackupIndex,
        account: &mut Account,
        dir_name: &str,
        context: &mut ExportContext,
    ) -> Result<()> {
        let account_dir = self.output_dir.join(dir_name);
        fs::create_dir_all(&account_dir)
            .with_context(|| format!("Failed to create {}", account_dir.display()))?;
        fs::create_dir_all(self.output_dir.join(STATE_DIR).join(&account.user_id))
            .context("Failed to create account state directory")?;

        let label = if account.display_name.is_empty() {
            account.user_id.clone()
        } else {
            account.display_name.clone()
        };
        eprintln!("Handling account: {} ({} conversations)", label, account.conversations.len());

        let user_id = account.user_id.clone();
        let total = account.conversations.len();
        let mut used_names = HashSet::new();
        let mut items = Vec::new();
        for (position, conversation) in account.conversations.iter_mut().enumerate() {
            if self.is_cancelled() {
                break;
            }
            self.notifier
                .on_conversation_start(&conversation.conversation_id, conversation.record_count);

            let Some(name) = choose_output_name(&conversation.name_candidates(), &mut used_names)
            else {
                eprintln!(
                    "Warning: can't build file name for conversation {}. Skipping it.",
                    conversation.conversation_id
                );
                self.notifier
                    .on_conversation_complete(&conversation.conversation_id, self.is_cancelled());
                continue;
            };
            conversation.output_name = Some(name);

            eprintln!(
                "{}/{}: handling conversation {}",
                position + 1,
                total,
                conversation.display_name
            );
            match self.export_conversation(index, &user_id, conversation, &account_dir, context) {
                Ok(count) if count > 0 => {
                    eprintln!("Succeeded handling {count} records.");
                    let name = conversation.output_name.as_deref().unwrap_or_default();
                    items.push(ListingItem {
                        link: format!("{}.{}", encode_url(name), self.options.extension()),
                        label: conversation.display_name.clone(),
                    });
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!(
                        "Warning: conversation {} failed: {e:#}",
                        conversation.conversation_id
                    );
                }
            }
            self.notifier
                .on_conversation_complete(&conversation.conversation_id, self.is_cancelled());
        }

        let listing = self.renderer.build_listing(&label, &items);
        let listing_path = account_dir.join(format!("index.{}", self.options.extension()));
        fs::write(&listing_path, listing)
            .with_context(|| format!("Failed to write {}", listing_path.display()))?;

        self.drain_tasks(&user_id);
        Ok(())
    }

    /// Export one conversation's new records. Returns how many records were
    /// rendered this pass; 0 is a normal outcome, not an error.
    fn export_conversation(
        &self,
        index: &BackupIndex,
        user_id: &str,
        conversation: &Conversation,
        account_dir: &Path,
        context: &mut ExportContext,
    ) -> Result<usize> {
        let prior_max = context.max_id(&conversation.conversation_id);

        // The store may legitimately be missing (conversation purged from
        // the device before the backup); there is simply nothing to export.
        let Some(store_path) = index.find_real_path(&conversation.store_path) else {
            return Ok(0);
        };
        let mut enumerator = match RecordEnumerator::open(&store_path, prior_max) {
            Ok(enumerator) => enumerator,
            Err(BackupError::NotFound(_)) => return Ok(0),
            Err(e) => return Err(e).context("Failed to open conversation store"),
        };

        let mut fragments: Vec<Vec<u8>> = Vec::new();
        let mut count = 0usize;
        while let Some(record) =
            enumerator.next().context("Failed to read conversation store")?
        {
            let values = self.renderer.render(&record, conversation)?;
            let mut fragment = String::new();
            for template_values in &values {
                fragment.push_str(&self.renderer.build_fragment(template_values));
            }
            fragments.push(fragment.into_bytes());
            count += 1;
            self.notifier.on_conversation_progress(
                &conversation.conversation_id,
                count as u32,
                conversation.record_count,
            );
            if self.is_cancelled() {
                break;
            }
        }

        if enumerator.max_seen_id() > prior_max {
            context.set_max_id(&conversation.conversation_id, enumerator.max_seen_id());
        }

        let log_path = fragment_log_path(&self.output_dir, user_id, &conversation.conversation_id);
        let merged = if self.options.is_incremental() {
            merge_fragments(read_fragments(&log_path), fragments, self.options.order())
        } else {
            fragments
        };
        write_fragments(&log_path, &merged)?;

        if count > 0 && !merged.is_empty() {
            self.paginate(conversation, &merged, account_dir)?;
        }

        Ok(count)
    }

    /// Emit the shell document and, for multi-page output, the on-demand
    /// data chunks.
    fn paginate(
        &self,
        conversation: &Conversation,
        merged: &[Vec<u8>],
        account_dir: &Path,
    ) -> Result<()> {
        let name = conversation.output_name.as_deref().unwrap_or(&conversation.conversation_id);
        let page_size = self.options.page_size();
        let total = merged.len();

        let single_document = self.options.is_sync_loading()
            || self.options.format() == ExportFormat::Text
            || total <= page_size;

        let inline_count = if single_document { total } else { page_size };
        let mut body = String::new();
        for fragment in &merged[..inline_count] {
            body.push_str(&String::from_utf8_lossy(fragment));
        }

        let page_count = if single_document { 0 } else { total.div_ceil(page_size) };
        let files_dir_name = format!("{name}_files");
        let data_path = format!("{}/Data", encode_url(&files_dir_name));

        let params = ShellParams {
            body: &body,
            page_size,
            total_records: total,
            page_count,
            data_path: &data_path,
            load_on_scroll: self.options.loads_on_scroll(),
        };
        let shell = self.renderer.build_shell(conversation, &params);
        let shell_path = account_dir.join(format!("{name}.{}", self.options.extension()));
        fs::write(&shell_path, shell)
            .with_context(|| format!("Failed to write {}", shell_path.display()))?;

        if page_count > 0 {
            let data_dir = account_dir.join(&files_dir_name).join("Data");
            fs::create_dir_all(&data_dir)
                .with_context(|| format!("Failed to create {}", data_dir.display()))?;
            for page in 0..page_count {
                let start = page * page_size;
                let end = (start + page_size).min(total);
                let texts: Vec<std::borrow::Cow<'_, str>> =
                    merged[start..end].iter().map(|f| String::from_utf8_lossy(f)).collect();
                let json = serde_json::to_string(&texts)
                    .context("Failed to serialize page data")?;
                let chunk_path = data_dir.join(format!("msg-{}.js", page + 1));
                fs::write(&chunk_path, self.renderer.build_data_chunk(&json))
                    .with_context(|| format!("Failed to write {}", chunk_path.display()))?;
            }
        }
        Ok(())
    }

    /// Block until the subordinate task queue is empty, reporting progress;
    /// on cancellation the queue is force-cancelled and drained instead.
    /// The account's page counts are final only after this returns.
    fn drain_tasks(&self, user_id: &str) {
        if self.is_cancelled() {
            self.tasks.cancel_all();
        }
        let (total, description) = self.tasks.outstanding();
        if total > 0 && !self.is_cancelled() {
            let what = if description.is_empty() { total.to_string() } else { description };
            eprintln!("Waiting for tasks: {what}");
        }
        self.notifier.on_tasks_start(user_id, total as u32);

        let mut previous = total;
        loop {
            if self.tasks.wait_until_drained(TASK_DRAIN_INTERVAL) {
                break;
            }
            if self.is_cancelled() {
                self.tasks.cancel_all();
            }
            let (current, _) = self.tasks.outstanding();
            if current != previous {
                self.notifier.on_tasks_progress(
                    user_id,
                    total.saturating_sub(current) as u32,
                    total as u32,
                );
                previous = current;
            }
        }
        if previous != 0 {
            self.notifier.on_tasks_progress(user_id, total as u32, total as u32);
        }
        self.notifier.on_tasks_complete(user_id, self.is_cancelled());
    }
}
