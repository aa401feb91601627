use serde::{Deserialize, Serialize};

/// A chat account found in the backup. Owns its conversations; downstream
/// code refers to conversations through the owning account rather than
/// through back pointers.
#[derive(Debug, Clone)]
pub struct Account {
    pub user_id: String,
    pub display_name: String,
    pub conversations: Vec<Conversation>,
}

impl Account {
    /// Candidate names for the account's output directory, preferred first.
    pub fn name_candidates(&self) -> [&str; 2] {
        [self.display_name.as_str(), self.user_id.as_str()]
    }
}

/// One conversation inside an account.
///
/// `store_path` is the virtual path of the backing message store inside the
/// backup; it is resolved to a real path through the backup index.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub conversation_id: String,
    pub display_name: String,
    pub record_count: u32,
    pub last_message_time: i64,
    pub store_path: String,
    /// Chosen by the output-naming policy once per pass.
    pub output_name: Option<String>,
}

impl Conversation {
    pub fn name_candidates(&self) -> [&str; 2] {
        [self.display_name.as_str(), self.conversation_id.as_str()]
    }
}

/// A single message row from a per-conversation store. The export core never
/// interprets `content`; decoding it into renderable fields is the renderer's
/// job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRecord {
    pub local_id: i64,
    pub timestamp: i64,
    pub kind: i32,
    pub outbound: bool,
    pub content: String,
}
