//! Taskboard authentication library
//!
//! Token storage, client-side token decoding and the two backend token
//! endpoints. Nothing here coordinates concurrent refreshes; that is the
//! session crate's job. This crate only knows how to read, write and obtain
//! tokens.
//!
//! Token flow:
//! 1. `AuthEndpoints::login()` exchanges email/password for a `TokenPair`
//! 2. The pair is persisted through `TokenStore::set()`
//! 3. `TokenCodec::is_expired()` decides whether the stored access token is
//!    still worth sending
//! 4. `AuthEndpoints::refresh()` trades the refresh token for a new access token
//! 5. The new access token replaces the old one via `TokenStore::set_access()`

pub mod codec;
pub mod constants;
pub mod endpoints;
pub mod error;
pub mod storage;
pub mod tokens;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use codec::{Claims, Clock, ManualClock, SystemClock, TokenCodec, decode};
pub use constants::*;
pub use endpoints::{AuthEndpoints, RefreshResponse};
pub use error::{AuthError, Result, StorageError};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use tokens::{TokenPair, TokenStore};
