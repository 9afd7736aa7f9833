//! scmp-pfc - Seccomp pseudo filter code generator
//!
//! This library renders a seccomp filter database (per-syscall rules with
//! argument decision trees, for a given architecture) as human-readable
//! "pseudo filter code", ordered by rule priority.

pub mod action;
pub mod arch;
pub mod cli;
pub mod config;
pub mod db;
pub mod generator;
pub mod order;
pub mod render;
pub mod syscalls;

pub use action::Action;
pub use arch::Arch;
pub use db::{ArgNode, Branch, CmpOp, FilterDb, NodeId, SyscallEntry};
pub use generator::{generate, generate_to_writer, to_pfc_string, PfcError};
