//! Filter description files
//!
//! A description names the architecture, the default action and a list of
//! syscall rules, each optionally carrying a tree of argument comparisons.
//! It is compiled into a [`FilterDb`] for the generator.
//!
//! Syscall `name`s resolve through the x86_64 table; other architectures
//! should use `num`.
//!
//! # Example filter.toml
//!
//! ```toml
//! arch = "x86_64"
//! default_action = "kill"
//!
//! [[syscall]]
//! name = "read"
//! priority = 5
//!
//! [[syscall]]
//! name = "write"
//! priority = 10
//!
//! [[syscall.chain]]
//! arg = 0
//! op = "eq"
//! datum = 1
//! on_true = "allow"
//! on_false = "errno(9)"
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::action::{parse_u32, Action, ParseActionError};
use crate::arch::{Arch, ArchError, ArgHalf};
use crate::db::{
    ArgNode, Branch, CmpOp, FilterDb, NodeId, SyscallEntry, SCMP_CMP_LE, SCMP_CMP_LT, SCMP_CMP_NE,
};
use crate::syscalls;

/// Errors that can occur while loading a filter description
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Arch(#[from] ArchError),

    #[error(transparent)]
    Action(#[from] ParseActionError),

    #[error("Invalid comparison operator: {0:?}. Expected eq, ge, gt, masked_eq, ne, lt, le or a number")]
    Operator(String),

    #[error("Unknown syscall name: {0}")]
    UnknownSyscall(String),

    #[error("Syscall entry needs exactly one of `name` or `num`")]
    SyscallId,

    #[error("Argument index {0} out of range, seccomp passes args 0 to {max}", max = MAX_ARG)]
    ArgIndex(u32),

    #[error("Node on arg {arg} has both a {side} action and a {side} chain")]
    ConflictingBranch { arg: u32, side: &'static str },
}

/// Highest syscall argument index seccomp exposes
pub const MAX_ARG: u32 = 5;

/// Result type for description loading
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Root of a filter description file
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    /// Architecture name, defaults to the host architecture
    #[serde(default)]
    pub arch: Option<String>,
    pub default_action: String,
    #[serde(default)]
    pub syscall: Vec<SyscallConfig>,
}

/// One `[[syscall]]` table
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SyscallConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub num: Option<i32>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_syscall_action")]
    pub action: String,
    #[serde(default = "default_true")]
    pub valid: bool,
    /// First decision level, in order
    #[serde(default)]
    pub chain: Vec<NodeConfig>,
}

/// One argument comparison
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    pub arg: u32,
    pub op: OpConfig,
    pub datum: u32,
    #[serde(default)]
    pub mask: u32,
    #[serde(default)]
    pub half: ArgHalf,
    #[serde(default)]
    pub on_true: Option<String>,
    #[serde(default)]
    pub true_chain: Vec<NodeConfig>,
    #[serde(default)]
    pub on_false: Option<String>,
    #[serde(default)]
    pub false_chain: Vec<NodeConfig>,
}

/// Operator given by name or as a raw operator value
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum OpConfig {
    Raw(u32),
    Name(String),
}

fn default_syscall_action() -> String {
    "allow".to_string()
}

fn default_true() -> bool {
    true
}

impl OpConfig {
    fn to_cmp_op(&self) -> Result<CmpOp> {
        match self {
            OpConfig::Raw(raw) => Ok(CmpOp::from_raw(*raw)),
            OpConfig::Name(name) => match name.trim().to_ascii_lowercase().as_str() {
                "eq" | "==" => Ok(CmpOp::Eq),
                "ge" | ">=" => Ok(CmpOp::Ge),
                "gt" | ">" => Ok(CmpOp::Gt),
                "masked_eq" => Ok(CmpOp::MaskedEq),
                // accepted so hand-written files can show what the
                // generator does with operators it does not render
                "ne" | "!=" => Ok(CmpOp::Other(SCMP_CMP_NE)),
                "lt" | "<" => Ok(CmpOp::Other(SCMP_CMP_LT)),
                "le" | "<=" => Ok(CmpOp::Other(SCMP_CMP_LE)),
                other => parse_u32(other)
                    .map(CmpOp::from_raw)
                    .ok_or_else(|| ConfigError::Operator(name.clone())),
            },
        }
    }
}

impl FilterConfig {
    /// Load a description from a file; `.json` files are parsed as JSON,
    /// anything else as TOML
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Resolve the architecture named in the file, or the host's
    pub fn arch(&self) -> Result<Arch> {
        match &self.arch {
            Some(name) => Ok(Arch::from_name(name)?),
            None => Ok(Arch::native().unwrap_or(Arch::X86_64)),
        }
    }

    /// Compile into a filter database for the file's architecture
    pub fn build(&self) -> Result<FilterDb> {
        self.build_for(self.arch()?)
    }

    /// Compile into a filter database for `arch`
    pub fn build_for(&self, arch: Arch) -> Result<FilterDb> {
        let default_action: Action = self.default_action.parse()?;
        let mut db = FilterDb::new(arch, default_action);

        for sys in &self.syscall {
            let num = sys.resolve_num()?;
            let action: Action = sys.action.parse()?;
            let mut entry = SyscallEntry::new(num, sys.priority, action);
            entry.valid = sys.valid;
            entry.chain = build_level(&mut db, &sys.chain)?;

            tracing::trace!(
                num,
                name = syscalls::syscall_name(num).unwrap_or("?"),
                priority = sys.priority,
                "loaded syscall rule"
            );
            db.add_syscall(entry);
        }

        tracing::debug!(
            arch = %db.arch(),
            syscalls = db.syscalls().len(),
            nodes = db.node_count(),
            "filter description compiled"
        );
        Ok(db)
    }
}

impl SyscallConfig {
    fn resolve_num(&self) -> Result<i32> {
        match (&self.name, self.num) {
            (Some(name), None) => syscalls::syscall_number(name)
                .ok_or_else(|| ConfigError::UnknownSyscall(name.clone())),
            (None, Some(num)) => Ok(num),
            _ => Err(ConfigError::SyscallId),
        }
    }
}

/// Store one sibling level, children first, and return its first node
fn build_level(db: &mut FilterDb, level: &[NodeConfig]) -> Result<Option<NodeId>> {
    let mut nodes = Vec::with_capacity(level.len());
    for cfg in level {
        if cfg.arg > MAX_ARG {
            return Err(ConfigError::ArgIndex(cfg.arg));
        }
        let on_true = build_branch(db, cfg.arg, "true", cfg.on_true.as_deref(), &cfg.true_chain)?;
        let on_false =
            build_branch(db, cfg.arg, "false", cfg.on_false.as_deref(), &cfg.false_chain)?;
        let op = cfg.op.to_cmp_op()?;

        let node = ArgNode::for_arch(db.arch(), cfg.arg, cfg.half, op, cfg.datum)
            .with_mask(cfg.mask)
            .on_true(on_true)
            .on_false(on_false);
        nodes.push(node);
    }
    Ok(db.add_level(nodes))
}

fn build_branch(
    db: &mut FilterDb,
    arg: u32,
    side: &'static str,
    action: Option<&str>,
    chain: &[NodeConfig],
) -> Result<Branch> {
    match (action, chain.is_empty()) {
        (Some(_), false) => Err(ConfigError::ConflictingBranch { arg, side }),
        (Some(action), true) => Ok(Branch::Action(action.parse()?)),
        (None, false) => Ok(build_level(db, chain)?.map_or(Branch::None, Branch::Subtree)),
        (None, true) => Ok(Branch::None),
    }
}
