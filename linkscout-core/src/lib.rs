pub mod anchors;
pub mod authority;
pub mod cache;
pub mod combination;
pub mod compare;
pub mod config;
pub mod diagnostics;
pub mod domain;
pub mod entity;
pub mod error;
pub mod graph;
pub mod model;
pub mod report;
pub mod run;
pub mod scoring;
pub mod search;

pub use anchors::AnchorContextExtractor;
pub use authority::{authority_bar, authority_score};
pub use cache::BacklinkGraphClient;
pub use combination::{CombinationGenerator, SearchQuery};
pub use compare::DomainComparator;
pub use config::RunConfig;
pub use diagnostics::{Diagnostics, RunDiagnostics, SourceKind};
pub use domain::{Blacklist, normalize_domain};
pub use entity::EntityExtractor;
pub use error::LinkscoutError;
pub use graph::{GraphAnalyzer, SharedLinkParams};
pub use report::{Findings, Report, ReportFormat};
pub use run::{Mode, RunProgressCallback, RunRequest, Sources, execute_run};
pub use scoring::ResultAggregator;
pub use search::SearchOrchestrator;
