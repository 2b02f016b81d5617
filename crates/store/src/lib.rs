pub mod error;
pub mod gateway;

pub use error::StoreError;
pub use gateway::{MessageStore, PgMessageStore, SaveOutcome};
