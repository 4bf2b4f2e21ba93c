use crate::arena::Arena;
use crate::domain::{Domain, DomainId};
use crate::ring::{Ring, RingMember};
use crate::thread::{Thread, ThreadId};
use kernel_info::limits::{MAX_DOMAINS, MAX_THREADS};
use log::{debug, error, trace};

/// Every domain and thread in the system, plus the scheduler's notion of
/// which of them is current.
pub struct TaskTable {
    threads: Arena<Thread, MAX_THREADS>,
    domains: Arena<Domain, MAX_DOMAINS>,
    all_domains: Ring<Domain>,
    next_pid: u32,
    current_thread: Option<ThreadId>,
    current_domain: Option<DomainId>,
}

impl Default for TaskTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cold]
fn stale_thread(id: ThreadId) -> ! {
    error!("stale thread handle {id:?}");
    panic!("stale thread handle {id:?}");
}

#[cold]
fn stale_domain(id: DomainId) -> ! {
    error!("stale domain handle {id:?}");
    panic!("stale domain handle {id:?}");
}

impl TaskTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            threads: Arena::new(),
            domains: Arena::new(),
            all_domains: Ring::new(),
            next_pid: 0,
            current_thread: None,
            current_domain: None,
        }
    }

    /// # Panics
    /// If `id` no longer refers to a live thread.
    #[must_use]
    pub fn thread(&self, id: ThreadId) -> &Thread {
        self.threads.get(id).unwrap_or_else(|| stale_thread(id))
    }

    /// # Panics
    /// If `id` no longer refers to a live thread.
    pub fn thread_mut(&mut self, id: ThreadId) -> &mut Thread {
        self.threads.get_mut(id).unwrap_or_else(|| stale_thread(id))
    }

    #[must_use]
    pub fn try_thread_mut(&mut self, id: ThreadId) -> Option<&mut Thread> {
        self.threads.get_mut(id)
    }

    #[must_use]
    pub fn contains_thread(&self, id: ThreadId) -> bool {
        self.threads.contains(id)
    }

    /// # Panics
    /// If `id` no longer refers to a live domain.
    #[must_use]
    pub fn domain(&self, id: DomainId) -> &Domain {
        self.domains.get(id).unwrap_or_else(|| stale_domain(id))
    }

    /// # Panics
    /// If `id` no longer refers to a live domain.
    pub fn domain_mut(&mut self, id: DomainId) -> &mut Domain {
        self.domains.get_mut(id).unwrap_or_else(|| stale_domain(id))
    }

    #[must_use]
    pub fn contains_domain(&self, id: DomainId) -> bool {
        self.domains.contains(id)
    }

    #[inline]
    #[must_use]
    pub const fn thread_count(&self) -> usize {
        self.threads.len()
    }

    #[inline]
    #[must_use]
    pub const fn domain_count(&self) -> usize {
        self.domains.len()
    }

    #[inline]
    #[must_use]
    pub const fn current_thread(&self) -> Option<ThreadId> {
        self.current_thread
    }

    #[inline]
    pub const fn set_current_thread(&mut self, id: Option<ThreadId>) {
        self.current_thread = id;
    }

    #[inline]
    #[must_use]
    pub const fn current_domain(&self) -> Option<DomainId> {
        self.current_domain
    }

    #[inline]
    pub const fn set_current_domain(&mut self, id: Option<DomainId>) {
        self.current_domain = id;
    }

    /// Head of the domain ring.
    #[inline]
    #[must_use]
    pub const fn first_domain(&self) -> Option<DomainId> {
        self.all_domains.cursor()
    }

    /// Successor of `id` in the domain ring, `None` if `id` is not in it.
    #[must_use]
    pub fn next_domain(&self, id: DomainId) -> Option<DomainId> {
        self.domain(id).links().next()
    }

    /// Domains in ring order, head first.
    pub fn domains(&self) -> impl Iterator<Item = DomainId> + '_ {
        self.all_domains.iter(&self.domains)
    }

    /// Store `domain`, give it the next pid and append it to the domain ring.
    ///
    /// # Panics
    /// If the domain table is full.
    pub fn add_domain(&mut self, mut domain: Domain) -> DomainId {
        domain.pid = self.next_pid;
        let Ok(id) = self.domains.insert(domain) else {
            error!("too many domains ({MAX_DOMAINS})");
            panic!("too many domains");
        };
        self.next_pid += 1;
        self.all_domains.push_back(&mut self.domains, id);
        debug!("added domain {} ({id:?})", self.domain(id).pid);
        id
    }

    /// Take `id` out of the domain ring; it keeps its slot and threads.
    /// If `id` was the current domain, its predecessor takes its place, so
    /// the next schedule continues with `id`'s successor.
    pub fn unlink_domain(&mut self, id: DomainId) {
        let prev = self.domain(id).links().prev().filter(|&prev| prev != id);
        self.all_domains.remove(&mut self.domains, id);
        if self.current_domain == Some(id) {
            self.current_domain = prev;
        }
    }

    /// Free the slot of an unlinked domain, handing back its data.
    pub fn free_domain(&mut self, id: DomainId) -> Option<Domain> {
        debug_assert!(!self.domain(id).links().is_linked());
        self.domains.remove(id)
    }

    /// Store `thread`, attach it to its domain with the domain's next tid and
    /// append it to the running ring.
    ///
    /// # Panics
    /// If the thread table is full or the thread is already in a ring.
    pub fn add_thread(&mut self, mut thread: Thread) -> ThreadId {
        if thread.is_linked() {
            error!("thread should not be in a list yet");
            panic!("thread should not be in a list yet");
        }
        let domain_id = thread.domain;
        let domain = self.domains.get_mut(domain_id).unwrap_or_else(|| stale_domain(domain_id));
        thread.tid = domain.next_tid;
        thread.blocked = false;

        let Ok(id) = self.threads.insert(thread) else {
            error!("too many threads ({MAX_THREADS})");
            panic!("too many threads");
        };
        domain.next_tid += 1;
        domain.thread_count += 1;
        domain.running.push_back(&mut self.threads, id);
        trace!("thread {} joined domain {}", self.thread(id).tid, self.domain(domain_id).pid);
        id
    }

    /// Unlink `id` from whichever ring of its domain holds it. The slot stays
    /// allocated until [`free_thread`](Self::free_thread).
    pub fn remove_thread(&mut self, id: ThreadId) {
        let thread = self.thread(id);
        let (domain_id, blocked) = (thread.domain, thread.blocked);
        let domain = self.domains.get_mut(domain_id).unwrap_or_else(|| stale_domain(domain_id));
        let ring = if blocked {
            &mut domain.blocked
        } else {
            &mut domain.running
        };
        if ring.remove(&mut self.threads, id) {
            domain.thread_count -= 1;
        }
    }

    /// Free the slot of an unlinked thread. Clears the current thread if it
    /// was `id`.
    pub fn free_thread(&mut self, id: ThreadId) -> Option<Thread> {
        if self.current_thread == Some(id) {
            self.current_thread = None;
        }
        self.threads.remove(id)
    }

    /// Pop the head of a domain's running ring, falling back to the blocked
    /// ring; used to tear a domain down thread by thread.
    pub fn pop_any_thread(&mut self, domain_id: DomainId) -> Option<ThreadId> {
        let domain = self.domain(domain_id);
        let id = domain.running.cursor().or(domain.blocked.cursor())?;
        self.remove_thread(id);
        Some(id)
    }

    /// Mark `id` blocked and move it to its domain's blocked ring.
    pub fn park(&mut self, id: ThreadId) {
        if self.thread(id).blocked {
            return;
        }
        let domain_id = self.thread(id).domain;
        let domain = self.domains.get_mut(domain_id).unwrap_or_else(|| stale_domain(domain_id));
        domain.running.remove(&mut self.threads, id);
        self.thread_mut(id).blocked = true;
        let domain = self.domains.get_mut(domain_id).unwrap_or_else(|| stale_domain(domain_id));
        domain.blocked.push_back(&mut self.threads, id);
    }

    /// Clear `id`'s blocked state and wait address and append it to the tail
    /// of its domain's running ring.
    pub fn resume(&mut self, id: ThreadId) {
        let thread = self.thread_mut(id);
        thread.wait_address = None;
        if !thread.blocked {
            return;
        }
        let domain_id = thread.domain;
        let domain = self.domains.get_mut(domain_id).unwrap_or_else(|| stale_domain(domain_id));
        domain.blocked.remove(&mut self.threads, id);
        self.thread_mut(id).blocked = false;
        let domain = self.domains.get_mut(domain_id).unwrap_or_else(|| stale_domain(domain_id));
        domain.running.push_back(&mut self.threads, id);
    }

    /// Advance `domain_id`'s running cursor to the next thread that is not
    /// blocked, examining every member at most once.
    pub fn next_runnable(&mut self, domain_id: DomainId) -> Option<ThreadId> {
        let domain = self.domains.get_mut(domain_id).unwrap_or_else(|| stale_domain(domain_id));
        for _ in 0..domain.running.len() {
            let candidate = domain.running.advance(&self.threads)?;
            if self.threads.get(candidate).is_some_and(|t| !t.blocked) {
                return Some(candidate);
            }
        }
        None
    }

    /// Threads of `domain_id` waiting on the futex word at `address`, in
    /// blocked-ring order.
    pub fn waiters(
        &self,
        domain_id: DomainId,
        address: kernel_memory_addresses::PhysicalAddress,
    ) -> impl Iterator<Item = ThreadId> + '_ {
        self.domain(domain_id)
            .blocked
            .iter(&self.threads)
            .filter(move |&id| self.thread(id).wait_address == Some(address))
    }
}
