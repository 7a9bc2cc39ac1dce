pub mod wizard;

pub use wizard::{complete_missing, run_mode_wizard, validate_channel_id};
