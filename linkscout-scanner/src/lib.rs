pub mod content;
pub mod engine;
pub mod error;
pub mod fixture;
pub mod gate;
pub mod html;
pub mod ner;
pub mod provider;
pub mod result;

pub use content::{ContentSource, HttpContentSource};
pub use engine::{HttpSearchEngine, SearchEngine};
pub use error::SourceError;
pub use fixture::FixtureSet;
pub use gate::RequestGate;
pub use ner::{HttpNerService, NerService};
pub use provider::{HttpLinkProvider, LinkProvider};
pub use result::{EntityKind, LinkEdge, LinkPage, RawEntity, SearchHit};
