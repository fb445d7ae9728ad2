pub mod lead;
pub mod save_to_sheet;

pub use lead::{LeadHandler, LeadResponse};
pub use save_to_sheet::{ArchiveHandler, ArchiveResponse};
