//! # Program Start
//!
//! Turns an already parsed executable into a running domain. The ELF parser
//! lives outside the core; it hands over a [`ProgramImage`] with the entry
//! point and the segments to load.
//!
//! ## User stack
//!
//! ```text
//!  USER_STACK_TOP ─► ┌───────────────────────────┐ 0xffffc000
//!                    │ "HOME=/\0" "prog\0" ...   │ strings, from the top down
//!                    │            ...            │
//!                    │ envp[0..n], NULL          │
//!                    │ argv[0..n], NULL          │
//!  initial ESP ────► │ argc                      │ 0xffffb000
//!                    ├───────────────────────────┤
//!                    │ 15 more zeroed pages      │
//!                    └───────────────────────────┘ 0xfffec000
//! ```
//!
//! Pointers in `argv`/`envp` are user addresses inside the argument page.

use crate::context::Kernel;
use crate::cpu::Cpu;
use kernel_info::memory::{
    KERNEL_RESERVED, PAGE_SIZE, USER_STACK_PAGES, USER_STACK_SIZE, USER_STACK_TOP,
};
use kernel_memory_addresses::{PhysicalPage, Size4K, VirtualAddress};
use kernel_task::{Domain, DomainId, DomainName, ThreadId};
use kernel_vmem::{AddressSpace, PageEntryBits, PhysMapper, align_down, align_up};
use log::{debug, error, info};

/// Bytes of one argument-page word.
const WORD: usize = size_of::<u32>();

type PageBytes = [u8; PAGE_SIZE as usize];

/// One loadable segment: `data` is copied to `vaddr`, the rest of
/// `mem_size` stays zero.
#[derive(Clone, Copy, Debug)]
pub struct ProgramSegment<'a> {
    pub vaddr: u32,
    pub data: &'a [u8],
    pub mem_size: u32,
    pub writable: bool,
}

/// A parsed executable plus its command line and environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProgramImage<'a> {
    pub entry: u32,
    pub segments: &'a [ProgramSegment<'a>],
    /// Strings without their terminating NUL.
    pub args: &'a [&'a [u8]],
    pub env: &'a [&'a [u8]],
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ProgramError {
    #[error("arguments and environment need {size} bytes, more than one page")]
    ArgumentsTooLarge { size: usize },
    #[error("segment at {vaddr:#010x} is outside the user range or larger than its memory size")]
    BadSegment { vaddr: u32 },
}

impl ProgramImage<'_> {
    /// Size of the argument page contents: argc, both pointer arrays with
    /// their NULLs, and every string with its NUL.
    #[must_use]
    pub fn argument_size(&self) -> usize {
        let words = 1 + self.args.len() + 1 + self.env.len() + 1;
        let strings: usize = self.args.iter().chain(self.env).map(|s| s.len() + 1).sum();
        words * WORD + strings
    }

    /// Highest end address of all segments, page aligned.
    fn top(&self) -> Option<u32> {
        self.segments
            .iter()
            .map(|s| align_up(s.vaddr + s.mem_size, PAGE_SIZE))
            .max()
    }

    fn validate(&self) -> Result<(), ProgramError> {
        let size = self.argument_size();
        if size > PAGE_SIZE as usize {
            return Err(ProgramError::ArgumentsTooLarge { size });
        }
        let stack_bottom = USER_STACK_TOP - USER_STACK_SIZE;
        for segment in self.segments {
            let end = segment
                .vaddr
                .checked_add(segment.mem_size)
                .and_then(|end| end.checked_add(PAGE_SIZE - 1));
            let fits = segment.vaddr >= KERNEL_RESERVED
                && end.is_some_and(|end| end <= stack_bottom)
                && segment.data.len() <= segment.mem_size as usize;
            if !fits {
                return Err(ProgramError::BadSegment {
                    vaddr: segment.vaddr,
                });
            }
        }
        Ok(())
    }
}

impl<C: Cpu, M: PhysMapper> Kernel<C, M> {
    /// Create a domain running `image`: segments loaded, `brk` set past the
    /// highest segment, a 16-page user stack with the argument page on top,
    /// and one thread about to enter at `image.entry`.
    ///
    /// # Errors
    /// The image is checked before anything is allocated; see
    /// [`ProgramError`].
    pub fn start_program(
        &mut self,
        name: &str,
        image: &ProgramImage<'_>,
    ) -> Result<(DomainId, ThreadId), ProgramError> {
        image.validate()?;

        let mut space = AddressSpace::with_kernel_identity(&mut self.mem);
        for segment in image.segments {
            self.load_segment(&mut space, segment);
        }
        let brk = image.top().unwrap_or_else(|| space.vm_top().as_u32());
        space.set_brk(VirtualAddress::new(brk));

        let argument_page = space.map_zeroed(
            &mut self.mem,
            VirtualAddress::new(USER_STACK_TOP - PAGE_SIZE),
            PageEntryBits::user_rw(),
        );
        for i in 1..USER_STACK_PAGES {
            let va = VirtualAddress::new(USER_STACK_TOP - (i + 1) * PAGE_SIZE);
            space.map_zeroed(&mut self.mem, va, PageEntryBits::user_rw());
        }
        self.write_arguments(argument_page, image);

        let domain = self.tasks.add_domain(Domain::new(
            DomainName::new(name),
            self.user_segments,
            space,
        ));
        let thread = self.create_thread(domain, USER_STACK_TOP, None);
        self.tasks
            .thread_mut(thread)
            .context
            .user
            .info
            .set_eip(image.entry)
            .set_esp(USER_STACK_TOP - PAGE_SIZE);

        info!(
            "started {name} as domain {} (entry {:#010x}, brk {brk:#010x}, {} args)",
            self.tasks.domain(domain).pid(),
            image.entry,
            image.args.len()
        );
        Ok((domain, thread))
    }

    /// Map every page the segment touches (pages shared with an earlier
    /// segment keep their first mapping) and copy the file bytes in.
    #[allow(clippy::cast_possible_truncation)]
    fn load_segment(&mut self, space: &mut AddressSpace, segment: &ProgramSegment<'_>) {
        let flags = if segment.writable {
            PageEntryBits::user_rw()
        } else {
            PageEntryBits::user_ro()
        };
        let first = align_down(segment.vaddr, PAGE_SIZE);
        let end = align_up(segment.vaddr + segment.mem_size, PAGE_SIZE);
        for va in (first..end).step_by(PAGE_SIZE as usize) {
            let va = VirtualAddress::new(va);
            if !space.entry(&self.mem, va).is_present() {
                space.map_zeroed(&mut self.mem, va, flags);
            }
        }

        let mut va = segment.vaddr;
        let mut rest = segment.data;
        while !rest.is_empty() {
            let offset = (va % PAGE_SIZE) as usize;
            let n = rest.len().min(PAGE_SIZE as usize - offset);
            let entry = space.entry(&self.mem, VirtualAddress::new(va));
            let Some((frame, _)) = entry.page_4k() else {
                error!("segment page {va:#010x} missing after mapping, entry {:#010x}", entry.raw());
                panic!("segment page {va:#010x} not mapped");
            };
            // SAFETY: the frame was allocated for this space and nothing else
            // references it yet.
            let page = unsafe { self.mem.phys_to_mut::<PageBytes>(frame.base()) };
            page[offset..offset + n].copy_from_slice(&rest[..n]);
            rest = &rest[n..];
            va += n as u32;
        }
        debug!(
            "loaded segment {:#010x}..{end:#010x} ({} bytes of data)",
            segment.vaddr,
            segment.data.len()
        );
    }

    /// Fill the argument page: argc, argv and envp with NULL terminators from
    /// the bottom up, the strings they point to from the top down.
    #[allow(clippy::cast_possible_truncation)]
    fn write_arguments(&mut self, frame: PhysicalPage<Size4K>, image: &ProgramImage<'_>) {
        // SAFETY: the frame was just allocated and zeroed for the stack.
        let page = unsafe { self.mem.phys_to_mut::<PageBytes>(frame.base()) };
        let page_va = USER_STACK_TOP - PAGE_SIZE;

        let mut word = 0;
        let mut put_word = |page: &mut PageBytes, value: u32| {
            page[word..word + WORD].copy_from_slice(&value.to_le_bytes());
            word += WORD;
        };

        put_word(page, image.args.len() as u32);

        let mut top = PAGE_SIZE as usize;
        for strings in [image.args, image.env] {
            for s in strings {
                top -= s.len() + 1;
                page[top..top + s.len()].copy_from_slice(s);
                page[top + s.len()] = 0;
                put_word(page, page_va + top as u32);
            }
            put_word(page, 0);
        }
    }
}
