pub mod cat;
pub mod init;
pub mod ls;
#[cfg(feature = "fuse")]
pub mod mount;
pub mod stat;
pub mod version;

pub use cat::Cat;
pub use init::Init;
pub use ls::Ls;
#[cfg(feature = "fuse")]
pub use mount::Mount;
pub use stat::Stat;
pub use version::Version;
