mod blob;
pub mod err;
mod mem;
mod scatter;

pub use blob::{AssignedBlob, BlobStore, BlobStoreRef, HttpBlobStore};
pub use mem::MemBlobStore;
pub use scatter::ReadScatter;
