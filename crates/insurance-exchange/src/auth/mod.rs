pub mod password;
pub mod session;

pub use password::{hash_password, verify_password, PasswordError};
pub use session::{
    cleared_session_cookie, session_cookie, token_from_headers, IssuedSession, SessionClaims,
    SessionError, SessionService, SESSION_COOKIE,
};
