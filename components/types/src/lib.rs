pub mod chunk;
pub mod entry;
pub mod file_id;

pub type Errno = libc::c_int;

/// Map an error onto the errno channel consumed by the FUSE bridge.
pub trait ToErrno {
    fn to_errno(&self) -> Errno;
}
