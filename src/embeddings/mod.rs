// Keyword embeddings — trait-based abstraction for swappable providers.
//
// The EmbeddingProvider trait defines the interface. RemoteEmbeddingProvider
// talks to an OpenAI-compatible endpoint; LocalFallbackProvider hashes lexical
// features locally and is always available, so a run can finish without any
// network access.

pub mod traits;
pub mod local;
pub mod remote;
