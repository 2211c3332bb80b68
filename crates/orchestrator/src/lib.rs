pub mod chunking;
pub mod coordination;
pub mod discovery;
pub mod job_orchestrator;
pub mod queue;

pub use chunking::{Chunk, ChunkingLimits};
pub use coordination::{CoordinationError, OrchestratorLock, RepositoryCoordinator};
pub use discovery::{DiscoveredFile, DiscoveryError};
pub use job_orchestrator::{JobOrchestrator, OrchestratorError};
pub use queue::{InProcessQueue, JobQueue};
