// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    load_domains_from_file,
    load_domains_from_source,
    parse_domain_line,
};

// Re-export the run API from linkscout-core
pub use linkscout_core::report::{Report, ReportFormat};
pub use linkscout_core::run::{Mode, RunProgressCallback, RunRequest, execute_run};
