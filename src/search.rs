//! Query orchestration: filter, encode, score, rank.

pub mod filter;
pub mod request;
pub mod scorer;
pub mod text;
pub mod vision;

pub use self::filter::{Constraints, FilterEngine, FilterOutcome, Relaxation};
pub use self::request::{
    ImagePayload, RankedItem, SearchOutcome, SearchResponse, TextSearchRequest,
    VisionSearchRequest,
};
pub use self::scorer::{Scored, Scorer};
pub use self::text::TextSearchEngine;
pub use self::vision::{VisionSearchEngine, resolve_payload};
