#![allow(clippy::needless_range_loop)]

/// Use mimalloc as the global allocator.
/// 2-3x faster than glibc malloc for small allocations,
/// better thread-local caching, and reduced fragmentation.
/// The sort allocates one temporary buffer per worker per call.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod common;
pub mod sort;
