//! Authentication: password hashing, cookie sessions, and request extractors

mod extract;
pub mod password;
mod session;

pub use extract::{ClientAddr, SessionUser};
pub use session::*;
