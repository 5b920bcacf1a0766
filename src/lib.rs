pub mod audio;
pub mod config;
pub mod engine;
pub mod language;
pub mod pipeline;
pub mod session;
pub mod translate;
pub mod ws;

pub use config::Config;
pub use engine::{EngineOutput, RemoteWhisperEngine, SpeechEngine, TranscriptSegment};
pub use pipeline::{PipelineConfig, Scheduler, StatsMonitor};
pub use session::{
    AudioChunk, ClientProfile, RegistryLimits, ServerStats, Session, SessionRegistry,
};
pub use translate::{GoogleProvider, MyMemoryProvider, TranslationProvider, TranslationRouter};
pub use ws::{create_router, AppState};
