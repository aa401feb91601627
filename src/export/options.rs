//! Per-pass configuration.
//!
//! One immutable options value is built before a pass and passed down;
//! components read named accessors instead of testing option bits at call
//! sites. The struct also serializes inside the export context so an
//! incremental rerun can adopt the options of the pass it continues.

use serde::{Deserialize, Serialize};

/// Records per page in paginated output.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Html,
    Text,
}

/// Display ordering of merged output: oldest-first or newest-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportOptions {
    format: ExportFormat,
    order: PageOrder,
    incremental: bool,
    sync_loading: bool,
    load_on_scroll: bool,
    page_size: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: ExportFormat::Html,
            order: PageOrder::Ascending,
            incremental: true,
            sync_loading: false,
            load_on_scroll: false,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ExportOptions {
    pub fn format(&self) -> ExportFormat {
        self.format
    }

    pub fn order(&self) -> PageOrder {
        self.order
    }

    pub fn is_incremental(&self) -> bool {
        self.incremental
    }

    /// Synchronous output: everything inline, no data chunks.
    pub fn is_sync_loading(&self) -> bool {
        self.sync_loading
    }

    pub fn loads_on_scroll(&self) -> bool {
        self.load_on_scroll
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// File extension of emitted documents.
    pub fn extension(&self) -> &'static str {
        match self.format {
            ExportFormat::Html => "html",
            ExportFormat::Text => "txt",
        }
    }

    pub fn with_format(mut self, format: ExportFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_order(mut self, order: PageOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_incremental(mut self, incremental: bool) -> Self {
        self.incremental = incremental;
        self
    }

    pub fn with_sync_loading(mut self, sync_loading: bool) -> Self {
        self.sync_loading = sync_loading;
        self
    }

    pub fn with_load_on_scroll(mut self, load_on_scroll: bool) -> Self {
        self.load_on_scroll = load_on_scroll;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}
