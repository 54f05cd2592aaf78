use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Optional process attributes a snapshot should carry.
///
/// Flags combine with `|`. Bits outside the known set are dropped on
/// construction, so an unrecognized bit never reaches a snapshot provider.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct ProcessDataFlags(u32);

impl ProcessDataFlags {
    pub const NONE: Self = Self(0);
    /// Resident memory size, in bytes
    pub const MEMORY: Self = Self(1);
    /// Full command line of the process
    pub const COMMAND_LINE: Self = Self(2);

    const KNOWN_BITS: u32 = Self::MEMORY.0 | Self::COMMAND_LINE.0;

    pub const fn from_bits_truncate(bits: u32) -> Self {
        Self(bits & Self::KNOWN_BITS)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether every bit of `other` is set in `self`
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ProcessDataFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ProcessDataFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl From<u32> for ProcessDataFlags {
    fn from(bits: u32) -> Self {
        Self::from_bits_truncate(bits)
    }
}

impl From<ProcessDataFlags> for u32 {
    fn from(flags: ProcessDataFlags) -> Self {
        flags.0
    }
}

impl fmt::Debug for ProcessDataFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "ProcessDataFlags(NONE)");
        }
        let names = [(Self::MEMORY, "MEMORY"), (Self::COMMAND_LINE, "COMMAND_LINE")]
            .into_iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| name)
            .join(" | ");
        write!(f, "ProcessDataFlags({names})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_or_combines_flags() {
        let flags = ProcessDataFlags::MEMORY | ProcessDataFlags::COMMAND_LINE;
        assert!(flags.contains(ProcessDataFlags::MEMORY));
        assert!(flags.contains(ProcessDataFlags::COMMAND_LINE));
        assert_eq!(flags.bits(), 3);
    }

    #[test]
    fn test_none_contains_nothing_but_none() {
        let flags = ProcessDataFlags::NONE;
        assert!(flags.is_empty());
        assert!(flags.contains(ProcessDataFlags::NONE));
        assert!(!flags.contains(ProcessDataFlags::MEMORY));
    }

    #[test]
    fn test_unknown_bits_are_ignored() {
        let flags = ProcessDataFlags::from(0b1101);
        assert_eq!(flags, ProcessDataFlags::MEMORY);
    }

    #[test]
    fn test_serde_uses_raw_bits() {
        let flags: ProcessDataFlags = serde_json::from_str("6").unwrap();
        assert_eq!(flags, ProcessDataFlags::COMMAND_LINE);
        assert_eq!(serde_json::to_string(&flags).unwrap(), "2");
    }

    #[test]
    fn test_debug_lists_flag_names() {
        let flags = ProcessDataFlags::MEMORY | ProcessDataFlags::COMMAND_LINE;
        assert_eq!(
            format!("{flags:?}"),
            "ProcessDataFlags(MEMORY | COMMAND_LINE)"
        );
        assert_eq!(
            format!("{:?}", ProcessDataFlags::NONE),
            "ProcessDataFlags(NONE)"
        );
    }
}
