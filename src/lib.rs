// Keyplot: keyword intent clustering and week-over-week opportunity tracking
//
// This is the library root. Each module corresponds to a stage of the
// clustering pipeline or to the ledger and plumbing around it.

pub mod clustering;
pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod intent;
pub mod interest;
pub mod keywords;
pub mod ledger;
pub mod output;
pub mod pipeline;
pub mod similarity;
pub mod status;
