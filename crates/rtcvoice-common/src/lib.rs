pub mod errors;
pub mod events;
pub mod id;

pub use errors::{ConfigError, RtcVoiceError};
pub use events::{Event, EventBus};
pub use id::{new_id, new_transaction_id, redact, ViewerToken};

pub type Result<T> = std::result::Result<T, RtcVoiceError>;
