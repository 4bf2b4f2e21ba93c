//! # Table Capacities

/// Maximum number of threads alive at once, across all domains.
pub const MAX_THREADS: usize = 256;

/// Maximum number of domains alive at once.
pub const MAX_DOMAINS: usize = 64;

/// Bytes kept of a domain's display name.
pub const DOMAIN_NAME_LEN: usize = 32;

const _: () = {
    assert!(MAX_DOMAINS <= MAX_THREADS);
    assert!(MAX_THREADS <= u16::MAX as usize);
};
