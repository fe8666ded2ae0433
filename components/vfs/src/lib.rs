mod config;
pub use config::Config;
mod err;
pub use err::{Error, Result};
mod dirty_pages;
mod file;
pub use file::File;
mod handle;
pub use handle::FileHandle;
mod reef;
pub use reef::ReefVFS;
