pub mod cli;

pub mod bugtriage;
pub mod config;
pub mod confirm;
pub mod git;
pub mod maturity;
pub mod refs;
pub mod release;
pub mod requirements;
pub mod role_requirements;
pub mod upstream;
pub mod version;
pub mod yaml;

pub use config::Config;
pub use refs::{resolve, PatchOrdering, RefKind, RemoteRef, Resolver};

pub(crate) const USER_AGENT: &str = concat!("osa-toolkit/", env!("CARGO_PKG_VERSION"));

#[cfg(test)]
pub(crate) mod test_helpers;
