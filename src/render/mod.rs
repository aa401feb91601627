//! Rendering seam between the export pipeline and the presentation layer.
//!
//! The pipeline hands each record to a [`Renderer`] and stores whatever
//! comes back as opaque fragments; it never interprets fragment contents.
//! Template lookup, markup escaping, and payload decoding all live behind
//! this trait.

pub mod plain;

use anyhow::Result;

use crate::models::{ChatRecord, Conversation};

pub use plain::PlainRenderer;

/// One template invocation: a template name plus the substitutions to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateValues {
    pub name: String,
    pub values: Vec<(String, String)>,
}

impl TemplateValues {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), values: Vec::new() }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.push((key.into(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

/// Everything the shell document needs to know about its paginated body.
#[derive(Debug)]
pub struct ShellParams<'a> {
    /// Fragments shipped inline for immediate display.
    pub body: &'a str,
    pub page_size: usize,
    pub total_records: usize,
    /// Number of on-demand data chunks; 0 for single-document output.
    pub page_count: usize,
    /// URL-encoded path, relative to the shell document, of the chunk folder.
    pub data_path: &'a str,
    pub load_on_scroll: bool,
}

/// An entry in an account or backup-level listing document.
#[derive(Debug, Clone)]
pub struct ListingItem {
    pub link: String,
    pub label: String,
}

pub trait Renderer: Send + Sync {
    /// Decode one record into template invocations. A record may expand to
    /// several (message plus attachments, for example).
    fn render(&self, record: &ChatRecord, conversation: &Conversation)
    -> Result<Vec<TemplateValues>>;

    /// Build one display fragment from a template invocation.
    fn build_fragment(&self, values: &TemplateValues) -> String;

    /// Build the self-contained shell document for a conversation.
    fn build_shell(&self, conversation: &Conversation, params: &ShellParams<'_>) -> String;

    /// Build a listing document (accounts overview, per-account index).
    fn build_listing(&self, title: &str, items: &[ListingItem]) -> String;

    /// Wrap one page's JSON payload into a loadable data chunk.
    fn build_data_chunk(&self, json: &str) -> String;
}
