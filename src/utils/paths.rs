use std::time::Duration;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

// Characters that need escaping inside a link emitted into a document.
const ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b':')
    .add(b'@')
    .add(b'[')
    .add(b']')
    .add(b'%');

/// Percent-encode one path component for use in an emitted link.
///
/// # Examples
///
/// ```
/// use mobile_chat_exporter::utils::encode_url;
///
/// assert_eq!(encode_url("Bob & Co"), "Bob%20&%20Co");
/// ```
pub fn encode_url(component: &str) -> String {
    utf8_percent_encode(component, ENCODE_SET).to_string()
}

/// `HH:MM:SS` rendering of an elapsed wall-clock duration.
pub fn format_elapsed(elapsed: Duration) -> String {
    let seconds = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", seconds / 3600, (seconds / 60) % 60, seconds % 60)
}
