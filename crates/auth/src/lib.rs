//! `console-auth`: authentication boundary of the admin console.
//!
//! Expiry policy, token wire shapes, the signed-in session model and the
//! login payload. No HTTP or storage here.

pub mod device;
pub mod expiry;
pub mod session;
pub mod tokens;

pub use device::{DeviceId, DeviceInfo, DeviceType, LoginPayload, StoredLoginPayload};
pub use expiry::{ExpiryPolicy, REMEMBER_ME_DAYS};
pub use session::{Session, SessionStatus};
pub use tokens::{AuthResponse, RefreshRequest, TokenError, TokenPair};
