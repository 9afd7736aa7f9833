//! Filter actions
//!
//! Seccomp actions travel as a packed `u32`: the upper half-word selects the
//! action kind and the lower half-word carries an auxiliary code (only
//! meaningful for ERRNO and TRACE). The packed value is decoded once into
//! [`Action`] and everything downstream works with the tagged form.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Kill the offending thread
pub const SCMP_ACT_KILL: u32 = 0x0000_0000;
/// Raise SIGSYS
pub const SCMP_ACT_TRAP: u32 = 0x0003_0000;
/// Fail the syscall with the errno in the low half-word
pub const SCMP_ACT_ERRNO: u32 = 0x0005_0000;
/// Notify a ptrace tracer with the message in the low half-word
pub const SCMP_ACT_TRACE: u32 = 0x7ff0_0000;
/// Let the syscall through
pub const SCMP_ACT_ALLOW: u32 = 0x7fff_0000;

const KIND_MASK: u32 = 0xffff_0000;
const CODE_MASK: u32 = 0x0000_ffff;

/// Terminal disposition of a matched filter path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Kill,
    Trap,
    Errno(u16),
    Trace(u16),
    Allow,
    /// Action kind this crate does not know; keeps the full packed value
    Unknown(u32),
}

impl Action {
    /// Decode a packed action value
    pub fn from_raw(raw: u32) -> Self {
        let code = (raw & CODE_MASK) as u16;
        match raw & KIND_MASK {
            SCMP_ACT_KILL => Action::Kill,
            SCMP_ACT_TRAP => Action::Trap,
            SCMP_ACT_ERRNO => Action::Errno(code),
            SCMP_ACT_TRACE => Action::Trace(code),
            SCMP_ACT_ALLOW => Action::Allow,
            _ => Action::Unknown(raw),
        }
    }

    /// Pack back into the wire representation
    pub fn to_raw(self) -> u32 {
        match self {
            Action::Kill => SCMP_ACT_KILL,
            Action::Trap => SCMP_ACT_TRAP,
            Action::Errno(code) => SCMP_ACT_ERRNO | u32::from(code),
            Action::Trace(code) => SCMP_ACT_TRACE | u32::from(code),
            Action::Allow => SCMP_ACT_ALLOW,
            Action::Unknown(raw) => raw,
        }
    }

    pub fn is_unknown(self) -> bool {
        matches!(self, Action::Unknown(_))
    }
}

/// Renders the PFC instruction, e.g. `action ERRNO(13);`
impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Kill => write!(f, "action KILL;"),
            Action::Trap => write!(f, "action TRAP;"),
            Action::Errno(code) => write!(f, "action ERRNO({});", code),
            Action::Trace(code) => write!(f, "action TRACE({});", code),
            Action::Allow => write!(f, "action ALLOW;"),
            Action::Unknown(raw) => write!(f, "action 0x{:x};", raw),
        }
    }
}

/// Error parsing a textual action
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid action: {0:?}. Expected kill, trap, allow, errno(N), trace(N) or a raw value")]
pub struct ParseActionError(pub String);

impl FromStr for Action {
    type Err = ParseActionError;

    /// Parse `kill`, `trap`, `allow`, `errno(N)`, `trace(N)` or a raw packed
    /// value (`0x7fff0000`, `2147418112`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseActionError(s.to_string());
        let text = s.trim().to_ascii_lowercase();

        match text.as_str() {
            "kill" => return Ok(Action::Kill),
            "trap" => return Ok(Action::Trap),
            "allow" => return Ok(Action::Allow),
            _ => {}
        }

        if let Some(arg) = call_arg(&text, "errno") {
            return arg.parse().map(Action::Errno).map_err(|_| err());
        }
        if let Some(arg) = call_arg(&text, "trace") {
            return arg.parse().map(Action::Trace).map_err(|_| err());
        }

        parse_u32(&text).map(Action::from_raw).ok_or_else(err)
    }
}

/// Extract `N` from `name(N)`
fn call_arg<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    text.strip_prefix(name)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
        .map(str::trim)
}

/// Decimal or `0x`-prefixed hexadecimal
pub(crate) fn parse_u32(text: &str) -> Option<u32> {
    match text.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}
