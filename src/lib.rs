mod amount;
mod config;
mod error;
mod governance;
mod ledger;
mod memory_ledger;
mod proposals;
mod request;
mod serve;
mod status;
mod tally;
pub mod util;
mod vote;

pub use amount::*;
pub use config::*;
pub use error::*;
pub use governance::*;
pub use ledger::*;
pub use memory_ledger::*;
pub use proposals::*;
pub use request::*;
pub use serve::*;
pub use status::*;
pub use tally::*;
pub use vote::*;
