pub mod config;
pub mod metrics;
pub mod orchestrator;
pub mod session;
pub mod stage;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, LogFormat,
    SanitizedConfig,
};
pub use orchestrator::{
    EnqueueAck, FinalizeError, FinalizeOutcome, OrchestratorConfig, OrchestratorError,
    OrchestratorHandle, PendingFinalize, SessionOrchestrator, StartOptions, StatusCallback,
};
pub use session::{BatchIndex, Payload, SessionContext, SessionState, StatusSnapshot};
pub use stage::{
    FinalizeInput, FinalizeStage, HttpFinalizeStage, HttpPartialProcessor, PartialProcessor,
    StageError, StagesConfig,
};
