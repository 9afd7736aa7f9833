//! Architecture descriptors
//!
//! The generator only needs two facts about an architecture: its word size
//! and where the high 32 bits of a syscall argument live inside the kernel's
//! `struct seccomp_data`.

use std::fmt;

use thiserror::Error;

/// `offsetof(struct seccomp_data, args)`: nr (4) + arch (4) + instruction_pointer (8)
const SECCOMP_DATA_ARGS_OFFSET: u32 = 16;
const ARG_SIZE: u32 = 8;

/// Native word size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchSize {
    Bits32,
    Bits64,
}

/// Byte order of the syscall argument words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// Which 32-bit half of a 64-bit argument a node tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgHalf {
    #[default]
    Lo,
    Hi,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown architecture: {0}. Supported: {supported}", supported = supported_names())]
pub struct ArchError(pub String);

/// Architecture definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arch {
    name: &'static str,
    size: ArchSize,
    endian: Endian,
}

impl Arch {
    pub const X86: Arch = Arch::new("x86", ArchSize::Bits32, Endian::Little);
    pub const X86_64: Arch = Arch::new("x86_64", ArchSize::Bits64, Endian::Little);
    pub const X32: Arch = Arch::new("x32", ArchSize::Bits32, Endian::Little);
    pub const ARM: Arch = Arch::new("arm", ArchSize::Bits32, Endian::Little);
    pub const AARCH64: Arch = Arch::new("aarch64", ArchSize::Bits64, Endian::Little);
    pub const MIPS: Arch = Arch::new("mips", ArchSize::Bits32, Endian::Big);
    pub const MIPS64: Arch = Arch::new("mips64", ArchSize::Bits64, Endian::Big);
    pub const PPC64: Arch = Arch::new("ppc64", ArchSize::Bits64, Endian::Big);
    pub const S390X: Arch = Arch::new("s390x", ArchSize::Bits64, Endian::Big);

    const KNOWN: [Arch; 9] = [
        Arch::X86,
        Arch::X86_64,
        Arch::X32,
        Arch::ARM,
        Arch::AARCH64,
        Arch::MIPS,
        Arch::MIPS64,
        Arch::PPC64,
        Arch::S390X,
    ];

    pub const fn new(name: &'static str, size: ArchSize, endian: Endian) -> Self {
        Self { name, size, endian }
    }

    /// Look up a built-in architecture by name
    pub fn from_name(name: &str) -> Result<Self, ArchError> {
        let wanted = name.trim();
        Self::KNOWN
            .iter()
            .find(|arch| arch.name.eq_ignore_ascii_case(wanted))
            .copied()
            .ok_or_else(|| ArchError(name.to_string()))
    }

    /// The architecture this binary was compiled for, when it is in the table
    pub fn native() -> Option<Self> {
        Self::from_name(std::env::consts::ARCH).ok()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn size(&self) -> ArchSize {
        self.size
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn is_64bit(&self) -> bool {
        self.size == ArchSize::Bits64
    }

    /// Byte offset of `args[arg]` in `seccomp_data`, `None` when it does not
    /// fit in a `u32`
    pub fn arg_offset(&self, arg: u32) -> Option<u32> {
        arg.checked_mul(ARG_SIZE)?
            .checked_add(SECCOMP_DATA_ARGS_OFFSET)
    }

    /// Byte offset of the high 32 bits of `args[arg]`
    pub fn arg_offset_hi(&self, arg: u32) -> Option<u32> {
        match self.endian {
            Endian::Little => self.arg_offset(arg)?.checked_add(4),
            Endian::Big => self.arg_offset(arg),
        }
    }

    /// Byte offset of the low 32 bits of `args[arg]`
    pub fn arg_offset_lo(&self, arg: u32) -> Option<u32> {
        match self.endian {
            Endian::Little => self.arg_offset(arg),
            Endian::Big => self.arg_offset(arg)?.checked_add(4),
        }
    }

    /// Offset of the requested half; 32-bit arches only have the low word
    pub fn half_offset(&self, arg: u32, half: ArgHalf) -> Option<u32> {
        match (self.size, half) {
            (ArchSize::Bits64, ArgHalf::Hi) => self.arg_offset_hi(arg),
            (ArchSize::Bits64, ArgHalf::Lo) => self.arg_offset_lo(arg),
            (ArchSize::Bits32, _) => self.arg_offset(arg),
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

fn supported_names() -> String {
    Arch::KNOWN
        .iter()
        .map(|arch| arch.name)
        .collect::<Vec<_>>()
        .join(", ")
}
