mod config_cmd;
mod record;
mod sync_cmd;

pub use config_cmd::ConfigCommand;
pub use record::RecordCommand;
pub use sync_cmd::{SyncCommand, WatchCommand};
