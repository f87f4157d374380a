//! Client-side session handling for the API.
//!
//! [`SessionClient`] keeps the signed-in user's token pair in a
//! [`SessionStorage`], attaches the access token to requests, and refreshes
//! it once when the server answers 401.

mod http;
mod session;
mod storage;

pub use http::{ApiClient, Tokens};
pub use session::{SessionClient, SessionError, SessionStatus};
pub use storage::{FileStorage, MemoryStorage, Session, SessionStorage, StorageError};
