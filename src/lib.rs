//! Grow space tracking: user-owned grow spaces with an embedded plant list
//! and calendar-indexed notes, persisted through a pluggable record store.

pub mod config;
pub mod error;
pub mod grow_space;
pub mod models;
pub mod notes;
pub mod session;
pub mod store;

pub use config::Config;
pub use error::{GrowError, GrowResult, StoreError, StoreResult};
pub use grow_space::{EditSession, GrowSpaceManager};
pub use models::*;
pub use notes::{NotesManager, NotesState};
pub use session::{AuthSession, SessionCache, SessionProvider, Subscription, User};
pub use store::{Collection, Filter, MemoryStore, MongoStore, Record, RecordStore};
