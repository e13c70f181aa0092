/// Client module
///
/// The request gateway used by API consumers: caches the access token,
/// single-flights refreshes across concurrent requests and persists the
/// session through a pluggable storage.

mod gateway;
mod session;
mod transport;

pub use gateway::{
    Gateway, GatewayError, CURRENT_USER_PATH, LOGIN_PATH, LOGOUT_PATH, REFRESH_PATH, SIGNUP_PATH,
};
pub use session::{MemorySessionStorage, SessionStatus, SessionStorage, StoredSession};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
