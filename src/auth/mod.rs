//! Identity comes from an external service. This module only checks its tokens.

pub(crate) mod claims;
pub(crate) mod extractors;
pub(crate) mod jwt;

pub use extractors::AuthUser;
