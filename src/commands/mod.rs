//! CLI commands implementation

pub mod init;
pub mod maintain;
pub mod query;
pub mod scan;
pub mod status;

pub use init::*;
pub use maintain::*;
pub use query::*;
pub use scan::*;
pub use status::*;
