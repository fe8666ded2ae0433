use reef_types::{Errno, ToErrno};
use snafu::{Location, Snafu};

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("empty file {}/{}", dir, name))]
    EmptyFile {
        dir: String,
        name: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("read {}/{} failed", dir, name))]
    ReadFailed {
        dir: String,
        name: String,
        #[snafu(implicit)]
        location: Location,
        source: reef_storage::err::Error,
    },

    #[snafu(display("dirty page upload failed"))]
    UploadFailed {
        #[snafu(implicit)]
        location: Location,
        source: reef_storage::err::Error,
    },

    #[snafu(display("update entry {}/{} failed", dir, name))]
    UpdateEntryFailed {
        dir: String,
        name: String,
        #[snafu(implicit)]
        location: Location,
        source: reef_filer::err::Error,
    },

    #[snafu(display("operation cancelled"))]
    Cancelled {
        #[snafu(implicit)]
        location: Location,
    },

    LibcError {
        errno: Errno,
        #[snafu(implicit)]
        location: Location,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl ToErrno for Error {
    fn to_errno(&self) -> Errno {
        match self {
            Self::LibcError { errno, .. } => *errno,
            Self::EmptyFile { .. } => libc::ENODATA,
            Self::Cancelled { .. } => libc::EINTR,
            _ => libc::EIO,
        }
    }
}
