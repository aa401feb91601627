pub mod environment;
pub mod paths;

pub use environment::default_backup_root;
pub use paths::{encode_url, format_elapsed};
