//! Bearer token authentication.
//!
//! Two policies gate handlers: [`Auth`] (required, 401 on failure) and
//! [`OptionalAuth`] (binds `None` on failure). Both verify the access token
//! statelessly; nothing here touches the database.

mod bearer;
mod errors;
mod extractors;
mod ip;
mod state;

pub use bearer::{BEARER_PREFIX, bearer_token};
pub use errors::{AuthError, EXPIRED_TOKEN_MESSAGE, INVALID_TOKEN_MESSAGE, MISSING_TOKEN_MESSAGE};
pub use extractors::{Auth, Identity, OptionalAuth};
pub use ip::{UNKNOWN_CLIENT, client_ip};
pub use state::HasAuthBackend;
