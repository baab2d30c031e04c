pub mod blocker;
pub mod fetch;
pub mod hosts;

pub use blocker::{canonicalize, BlockReason, BlockingEngine, BlocklistAdmin, BlocklistStats};
pub use fetch::load_blocklists;
pub use hosts::parse_hosts;
