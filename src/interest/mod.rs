// Interest signals — how much search attention a keyword is getting.
//
// The ledger's growing/shrinking verdicts compare aggregate interest between
// snapshots, and the threshold clusterer processes high-interest keywords
// first. VolumeInterest serves the search volume that came with the input;
// RemoteInterestProvider asks a trend endpoint.

pub mod traits;
pub mod volume;
pub mod remote;
