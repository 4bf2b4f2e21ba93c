//! # QEMU Debug Console Output
//!
//! Logging and tracing for the kernel while it runs under QEMU. Output goes to
//! the ISA debug console (`-debugcon`), a write-only I/O port that QEMU copies
//! to a host file or terminal. It works from the first instruction of the
//! kernel, needs no allocation and no driver state, and so is the sink of
//! choice for trap and scheduler diagnostics.
//!
//! ## Output Path
//! ```text
//! log::trace!/debug!/…        qemu_trace!
//!         ↓                       ↓
//!    QemuLogger (log::Log)  →  QemuSink (fmt::Write)
//!                                 ↓
//!                        outb → I/O port 0x402
//! ```
//!
//! ## Features
//!
//! * `enabled` (default): compile the port writes in. Without it every
//!   output call is an empty function.
//!
//! Port writes are only emitted on x86 targets and never in unit tests, so the
//! logger can be installed in host-side test binaries without faulting.
//!
//! ## Usage
//! ```rust,no_run
//! use kernel_qemu::QemuLogger;
//! use log::LevelFilter;
//!
//! static LOGGER: QemuLogger = QemuLogger::new(LevelFilter::Debug);
//!
//! LOGGER.init().expect("logger already installed");
//! log::info!("paging enabled");
//! ```
//!
//! Host side: `qemu-system-i386 -kernel kernel.elf -debugcon stdio`.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod logger;

pub use logger::QemuLogger;

#[cfg(feature = "enabled")]
#[doc(hidden)]
pub mod qemu_fmt {
    use core::fmt::{self, Write};

    /// The port number for QEMU's debug port.
    #[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), not(test)))]
    const QEMU_DEBUG_PORT: u16 = 0x402;

    /// Write a single byte to QEMU's debug port.
    #[allow(clippy::inline_always)]
    #[inline(always)]
    pub fn dbg_putc(c: u8) {
        #[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), not(test)))]
        unsafe {
            core::arch::asm!(
                "out dx, al",
                in("dx") QEMU_DEBUG_PORT,
                in("al") c,
                options(nomem, nostack, preserves_flags)
            );
        }
        #[cfg(not(all(any(target_arch = "x86", target_arch = "x86_64"), not(test))))]
        let _ = c;
    }

    pub struct QemuSink;

    impl Write for QemuSink {
        #[inline]
        fn write_str(&mut self, s: &str) -> fmt::Result {
            s.bytes().for_each(dbg_putc);
            Ok(())
        }
    }

    #[doc(hidden)]
    #[inline]
    pub fn qemu_write(args: fmt::Arguments) {
        // Best-effort debug output; the sink itself never fails.
        let _ = fmt::write(&mut QemuSink, args);
    }
}

#[cfg(not(feature = "enabled"))]
#[doc(hidden)]
pub mod qemu_fmt {
    use core::fmt;

    #[doc(hidden)]
    #[inline(always)]
    #[allow(clippy::inline_always)]
    pub fn qemu_write(_: fmt::Arguments) {}
}

/// `format!`-style output straight to the debug port, bypassing `log`.
#[macro_export]
macro_rules! qemu_trace {
    ($($arg:tt)*) => {{
        $crate::qemu_fmt::qemu_write(core::format_args!($($arg)*));
    }};
}
