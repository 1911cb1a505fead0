pub mod caching;
pub mod provider;
pub mod static_token;
pub mod token_cache;

pub use caching::CachingCredential;
pub use provider::{AccessToken, CredentialProvider};
pub use static_token::StaticTokenCredential;
pub use token_cache::TokenCache;
