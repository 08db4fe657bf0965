//! Memory budget for the bitmap cache
//!
//! The default budget is a fraction of the machine's physical memory, as
//! reported by the OS.

/// Used when the OS cannot report physical memory
pub const FALLBACK_BUDGET_BYTES: usize = 256 * 1024 * 1024;

/// Default denominator: one eighth of physical memory
pub const DEFAULT_FRACTION: usize = 8;

/// Byte budget resolved from configuration and the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBudget {
    pub bytes: usize,
}

impl MemoryBudget {
    /// Resolve a budget
    ///
    /// An explicit byte count wins; otherwise `1 / fraction` of physical
    /// memory, or [`FALLBACK_BUDGET_BYTES`] when that is unknown.
    pub fn resolve(explicit_bytes: Option<usize>, fraction: usize) -> Self {
        if let Some(bytes) = explicit_bytes {
            return Self { bytes };
        }
        Self::from_physical(physical_ram_bytes(), fraction)
    }

    fn from_physical(physical: Option<u64>, fraction: usize) -> Self {
        let fraction = fraction.max(1) as u64;
        let bytes = physical
            .map(|total| usize::try_from(total / fraction).unwrap_or(usize::MAX))
            .filter(|bytes| *bytes > 0)
            .unwrap_or(FALLBACK_BUDGET_BYTES);
        Self { bytes }
    }
}

#[cfg(target_os = "linux")]
pub fn physical_ram_bytes() -> Option<u64> {
    let mut info = std::mem::MaybeUninit::<libc::sysinfo>::uninit();
    // SAFETY: sysinfo only writes into the provided struct.
    let rc = unsafe { libc::sysinfo(info.as_mut_ptr()) };
    if rc != 0 {
        return None;
    }
    // SAFETY: rc == 0 means the kernel filled the struct.
    let info = unsafe { info.assume_init() };
    Some((info.totalram as u64).saturating_mul(info.mem_unit as u64))
}

#[cfg(target_os = "macos")]
pub fn physical_ram_bytes() -> Option<u64> {
    use std::ffi::CString;
    use std::mem::size_of;
    use std::ptr;

    let key = CString::new("hw.memsize").ok()?;
    let mut value: u64 = 0;
    let mut len = size_of::<u64>();
    // SAFETY: value and len describe a valid u64 out-buffer.
    let rc = unsafe {
        libc::sysctlbyname(
            key.as_ptr(),
            &mut value as *mut u64 as *mut libc::c_void,
            &mut len,
            ptr::null_mut(),
            0,
        )
    };
    if rc == 0 && len == size_of::<u64>() {
        Some(value)
    } else {
        None
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub fn physical_ram_bytes() -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_budget_wins() {
        assert_eq!(MemoryBudget::resolve(Some(1234), 8).bytes, 1234);
    }

    #[test]
    fn test_fraction_of_physical() {
        let budget = MemoryBudget::from_physical(Some(8 * 1024 * 1024 * 1024), 8);
        assert_eq!(budget.bytes, 1024 * 1024 * 1024);
    }

    #[test]
    fn test_fallback_when_unknown() {
        assert_eq!(MemoryBudget::from_physical(None, 8).bytes, FALLBACK_BUDGET_BYTES);
        assert_eq!(MemoryBudget::from_physical(Some(0), 8).bytes, FALLBACK_BUDGET_BYTES);
    }

    #[test]
    fn test_zero_fraction_treated_as_one() {
        assert_eq!(MemoryBudget::from_physical(Some(4096), 0).bytes, 4096);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_physical_memory_reported_on_linux() {
        assert!(physical_ram_bytes().unwrap_or(0) > 0);
    }
}
