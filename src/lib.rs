// Re-export from sub-crates
pub use parlo_audio::{
    AudioCapture, CaptureError, CaptureHandle, LevelProbe, Recorder, Recording, VolumeMeter,
};
pub use parlo_core::{
    APP_NAME, APP_NAME_PRETTY, Config, ConfigManager, DEFAULT_LOG_LEVEL, ItemId, Origin,
    PENDING_TEXT, RecorderState, SessionEvent, TranscriptItem,
};
pub use parlo_translate::{
    FALLBACK_TEXT, GeminiClient, GeminiConfig, RetryPolicy, TranslateError, TranslateInput,
    Translator,
};

// App-specific modules
pub mod session;

pub use session::{BUSY_TEXT, ERROR_TEXT, SessionController};

// Version from this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
