//! # Threads and Domains
//!
//! The data half of the scheduler: who exists, who may run, and what CPU
//! state each thread carries between traps. The policy half (picking the next
//! thread, switching to it, trap entry and exit) lives in the `kernel` crate.
//!
//! ## Ownership
//!
//! ```text
//!  TaskTable
//!  ├─ domains: Arena<Domain>   ── domain ring (allDomains), head first
//!  │    └─ Domain
//!  │        ├─ AddressSpace
//!  │        ├─ running: Ring<Thread> ── cursor advances on every pick
//!  │        └─ blocked: Ring<Thread>
//!  └─ threads: Arena<Thread>
//!       └─ Thread ── control-block page (FPU area + TLS table)
//! ```
//!
//! Control blocks are addressed by generation-checked [`Handle`]s, so a
//! handle kept across a thread's exit can never reach the slot's next
//! occupant. Rings are intrusive: the links live inside the members.
//!
//! ## Invariants
//! - A thread is in exactly one of its domain's running or blocked ring.
//! - A thread's kernel stack and control-block page are mapped kernel-only
//!   into its own domain's address space, at their physical addresses.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod arena;
mod control_block;
pub mod domain;
pub mod frame;
pub mod ring;
mod table;
pub mod thread;
pub mod tls;

pub use crate::arena::{Arena, Handle};
pub use crate::control_block::{ControlBlock, FpuArea};
pub use crate::domain::{Domain, DomainId, DomainName, UserSegments};
pub use crate::frame::{RegisterState, SavedContext, StackBounds, TrapFrame, TrapInfo};
pub use crate::ring::{Links, Ring, RingMember};
pub use crate::table::TaskTable;
pub use crate::thread::{Thread, ThreadId};
pub use crate::tls::{GdtEntry, TlsTable, UserDesc, UserDescFlags};
