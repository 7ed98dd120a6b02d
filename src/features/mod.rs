//! Feature extraction
//!
//! Team and venue profiles built from match summaries, the immutable profile
//! snapshot, and the assembler that turns a match state into the ordered
//! feature vector shared by training and serving.

pub mod assembler;
pub mod profiles;
pub mod team_stats;
pub mod venue;

pub use assembler::{AssemblyParams, FeatureAssembler, FeatureSchema, FeatureVector, MatchState};
pub use profiles::{ProfileBuilder, ProfileSet};
pub use team_stats::TeamProfile;
pub use venue::VenueProfile;
