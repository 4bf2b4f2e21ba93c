use crate::arena::Handle;
use crate::ring::{Links, Ring, RingMember};
use crate::thread::Thread;
use kernel_info::limits::DOMAIN_NAME_LEN;
use kernel_info::segments::USER_RPL;
use kernel_vmem::AddressSpace;

pub type DomainId = Handle<Domain>;

/// Segment selectors user threads of a domain run with (RPL not yet applied).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct UserSegments {
    pub cs: u16,
    pub ss: u16,
    pub ds: u16,
    pub es: u16,
    pub fs: u16,
    pub gs: u16,
}

impl UserSegments {
    /// `selector | RPL 3`, widened to a saved register slot.
    #[inline]
    #[must_use]
    pub const fn user(selector: u16) -> u32 {
        (selector | USER_RPL) as u32
    }
}

/// A display name truncated to [`DOMAIN_NAME_LEN`] bytes on a character
/// boundary.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct DomainName {
    bytes: [u8; DOMAIN_NAME_LEN],
    len: u8,
}

impl DomainName {
    #[must_use]
    pub fn new(name: &str) -> Self {
        let mut len = name.len().min(DOMAIN_NAME_LEN);
        while !name.is_char_boundary(len) {
            len -= 1;
        }
        let mut bytes = [0; DOMAIN_NAME_LEN];
        bytes[..len].copy_from_slice(&name.as_bytes()[..len]);
        #[allow(clippy::cast_possible_truncation)]
        Self {
            bytes,
            len: len as u8,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        // Only ever filled from a `&str` cut at a character boundary.
        core::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or_default()
    }
}

impl core::fmt::Debug for DomainName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(self.as_str(), f)
    }
}

impl core::fmt::Display for DomainName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A process: an address space and the threads running in it.
#[derive(Debug)]
pub struct Domain {
    links: Links<Domain>,
    pub(crate) pid: u32,
    pub segments: UserSegments,
    pub space: AddressSpace,
    pub(crate) running: Ring<Thread>,
    pub(crate) blocked: Ring<Thread>,
    pub(crate) next_tid: u32,
    pub(crate) thread_count: u32,
    name: DomainName,
}

impl Domain {
    /// A domain without threads. Its pid is assigned when it joins the
    /// domain ring.
    #[must_use]
    pub const fn new(name: DomainName, segments: UserSegments, space: AddressSpace) -> Self {
        Self {
            links: Links::new(),
            pid: 0,
            segments,
            space,
            running: Ring::new(),
            blocked: Ring::new(),
            next_tid: 0,
            thread_count: 0,
            name,
        }
    }

    #[inline]
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    #[inline]
    #[must_use]
    pub const fn name(&self) -> &DomainName {
        &self.name
    }

    #[inline]
    #[must_use]
    pub const fn thread_count(&self) -> u32 {
        self.thread_count
    }

    #[inline]
    #[must_use]
    pub const fn running(&self) -> &Ring<Thread> {
        &self.running
    }

    #[inline]
    #[must_use]
    pub const fn blocked(&self) -> &Ring<Thread> {
        &self.blocked
    }
}

impl RingMember for Domain {
    fn links(&self) -> &Links<Self> {
        &self.links
    }

    fn links_mut(&mut self) -> &mut Links<Self> {
        &mut self.links
    }
}
