/// Mock Cashu Mint Library
/// 
/// This crate provides both a standalone binary and library components
/// for serving a local Cashu mint (NUT-01/02/04/06) that wallets and tests
/// can mint against without a lightning node.

pub mod handlers;
pub mod mint;
pub mod server;

// Re-export commonly used types
pub use mint::{MintError, MockMint};
pub use server::{create_router, run_server, serve};
