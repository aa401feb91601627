//! Built-in minimal renderer.
//!
//! Renders records as simple timestamped lines (text) or divs (HTML) with
//! no template files on disk. Rich template packs are expected to live in
//! external renderers; this one exists so the crate works end-to-end out of
//! the box.

use anyhow::Result;
use chrono::DateTime;

use super::{ListingItem, Renderer, ShellParams, TemplateValues};
use crate::export::options::ExportFormat;
use crate::models::{ChatRecord, Conversation};

pub struct PlainRenderer {
    format: ExportFormat,
}

impl PlainRenderer {
    pub fn new(format: ExportFormat) -> Self {
        Self { format }
    }

    fn format_time(timestamp: i64) -> String {
        DateTime::from_timestamp(timestamp, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default()
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

impl Renderer for PlainRenderer {
    fn render(
        &self,
        record: &ChatRecord,
        _conversation: &Conversation,
    ) -> Result<Vec<TemplateValues>> {
        let mut values = TemplateValues::new("message");
        values.insert("time", Self::format_time(record.timestamp));
        values.insert("direction", if record.outbound { "out" } else { "in" });
        values.insert("content", record.content.clone());
        Ok(vec![values])
    }

    fn build_fragment(&self, values: &TemplateValues) -> String {
        let time = values.get("time").unwrap_or_default();
        let direction = values.get("direction").unwrap_or_default();
        let content = values.get("content").unwrap_or_default();
        match self.format {
            ExportFormat::Html => format!(
                "<div class=\"message {direction}\"><span class=\"time\">{time}</span>\
                 <span class=\"content\">{}</span></div>\n",
                escape_html(content)
            ),
            ExportFormat::Text => format!("[{time}] {content}\n"),
        }
    }

    fn build_shell(&self, conversation: &Conversation, params: &ShellParams<'_>) -> String {
        match self.format {
            ExportFormat::Html => {
                let loading = if params.load_on_scroll { "onscroll" } else { "initial" };
                format!(
                    "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">\
                     <title>{title}</title>\n\
                     <script>var pageSize={page_size},totalRecords={total},\
                     pageCount={pages},dataPath=\"{data}\",loadingType=\"{loading}\";</script>\n\
                     </head>\n<body>\n<h1>{title}</h1>\n<div id=\"messages\">\n{body}</div>\n\
                     </body></html>\n",
                    title = escape_html(&conversation.display_name),
                    page_size = params.page_size,
                    total = params.total_records,
                    pages = params.page_count,
                    data = params.data_path,
                    body = params.body,
                )
            }
            ExportFormat::Text => {
                format!("{}\n\n{}", conversation.display_name, params.body)
            }
        }
    }

    fn build_listing(&self, title: &str, items: &[ListingItem]) -> String {
        match self.format {
            ExportFormat::Html => {
                let mut body = String::new();
                for item in items {
                    body.push_str(&format!(
                        "<li><a href=\"{}\">{}</a></li>\n",
                        item.link,
                        escape_html(&item.label)
                    ));
                }
                format!(
                    "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">\
                     <title>{title}</title></head>\n<body>\n<h1>{title}</h1>\n\
                     <ul>\n{body}</ul>\n</body></html>\n",
                    title = escape_html(title),
                    body = body,
                )
            }
            ExportFormat::Text => {
                let mut body = format!("{title}\n");
                for item in items {
                    body.push_str(&format!("- {} ({})\n", item.label, item.link));
                }
                body
            }
        }
    }

    fn build_data_chunk(&self, json: &str) -> String {
        format!("appendMessages({json});\n")
    }
}
