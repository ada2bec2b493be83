pub mod caller;
pub mod crypto;
pub mod header;
pub mod middleware;
pub mod session;

pub use caller::Caller;
