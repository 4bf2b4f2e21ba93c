use bitfield_struct::bitfield;

/// Architectural EFLAGS model for IA-32.
///
/// Bit 1 is architecturally fixed to one, so [`Eflags::new`] already yields
/// the minimal valid value `0x2` that freshly created contexts start from.
#[bitfield(u32, order = Lsb)]
pub struct Eflags {
    /// Carry Flag
    pub cf_carry: bool, // 0

    /// Always 1.
    #[bits(default = true)]
    _always1: bool, // 1

    /// Parity Flag
    pub pf_parity: bool, // 2

    #[bits(default = false)]
    _rsvd3: bool, // 3

    /// Adjust Flag
    pub af_adjust: bool, // 4

    #[bits(default = false)]
    _rsvd5: bool, // 5

    /// Zero Flag
    pub zf_zero: bool, // 6

    /// Sign Flag
    pub sf_sign: bool, // 7

    /// Trap Flag
    pub tf_trap: bool, // 8

    /// Interrupt Enable Flag
    pub if_interrupt_enable: bool, // 9

    /// Direction Flag
    pub df_direction: bool, // 10

    /// Overflow Flag
    pub of_overflow: bool, // 11

    /// I/O Privilege Level
    #[bits(2)]
    pub iopl: u8, // 12–13

    /// Nested Task
    pub nt_nested: bool, // 14

    #[bits(default = false)]
    _rsvd15: bool, // 15

    /// Resume Flag
    pub rf_resume: bool, // 16

    /// Virtual 8086 mode
    pub vm_virtual_8086: bool, // 17

    /// Alignment Check
    pub ac_alignment_check: bool, // 18

    /// Virtual Interrupt Flag
    pub vif_virtual_interrupt: bool, // 19

    /// Virtual Interrupt Pending
    pub vip_virtual_interrupt_pending: bool, // 20

    /// ID Flag: allows toggling CPUID.
    pub id_cpuid: bool, // 21

    #[bits(10, default = 0)]
    _rsvd22_31: u16, // 22–31
}

impl Eflags {
    /// Bit mask of the interrupt enable flag.
    pub const IF: u32 = 1 << 9;

    /// Flags a kernel context starts with: reserved bit only, interrupts off.
    #[must_use]
    pub const fn kernel_entry() -> Self {
        Self::new()
    }

    /// Flags a user context starts with: reserved bit plus interrupts enabled.
    #[must_use]
    pub const fn user_entry() -> Self {
        Self::new().with_if_interrupt_enable(true)
    }
}
