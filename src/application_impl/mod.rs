mod auth_service_impl;
mod credential_hasher_argon2;
mod identity_directory_memory;
mod token_codec_jwt;

pub use auth_service_impl::*;
pub use credential_hasher_argon2::*;
pub use identity_directory_memory::*;
pub use token_codec_jwt::*;
