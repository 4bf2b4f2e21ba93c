use kernel_vmem::user::UserAccessError;

/// Linux error numbers the core calls can return.
#[repr(u32)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum Errno {
    #[error("no such process")]
    Srch = 3,
    #[error("try again")]
    Again = 11,
    #[error("out of memory")]
    NoMem = 12,
    #[error("bad address")]
    Fault = 14,
    #[error("invalid argument")]
    Inval = 22,
    #[error("function not implemented")]
    NoSys = 38,
}

impl Errno {
    #[inline]
    #[must_use]
    pub const fn code(self) -> u32 {
        self as u32
    }
}

impl From<UserAccessError> for Errno {
    fn from(_: UserAccessError) -> Self {
        Self::Fault
    }
}

/// What a system call leaves in EAX: the value itself, or the error number
/// negated in two's complement.
#[must_use]
pub const fn encode(result: Result<u32, Errno>) -> u32 {
    match result {
        Ok(value) => value,
        Err(err) => err.code().wrapping_neg(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_memory_addresses::VirtualAddress;

    #[test]
    fn errors_are_negated() {
        assert_eq!(encode(Ok(7)), 7);
        assert_eq!(encode(Err(Errno::NoSys)), (-38_i32).cast_unsigned());
        assert_eq!(encode(Err(Errno::Fault)), 0xffff_fff2);
    }

    #[test]
    fn user_faults_become_efault() {
        let err = UserAccessError::Fault {
            address: VirtualAddress::new(0x10),
        };
        assert_eq!(Errno::from(err), Errno::Fault);
    }
}
