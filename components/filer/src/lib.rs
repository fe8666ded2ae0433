mod client;
pub mod context;
pub mod err;
mod mem;

pub use client::{
    FilerClient, FilerClientRef, HttpFilerClient, Location, Locations, LookupVolumeRequest,
    LookupVolumeResponse, UpdateEntryRequest,
};
pub use context::OpContext;
pub use mem::MemFiler;
