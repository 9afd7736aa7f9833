//! Filter database
//!
//! Holds everything the generator reads: the target architecture, the
//! per-syscall rules with their argument decision trees, and the action
//! applied when nothing matches.
//!
//! Decision nodes live in an arena owned by the database and refer to each
//! other through [`NodeId`] indices. Nodes at the same depth form an ordered
//! doubly-linked sibling list (`lvl_prev` / `lvl_next`); each branch that
//! continues with further tests points at one node of the next level.

use crate::action::Action;
use crate::arch::{Arch, ArgHalf};

/// Index of a decision node inside a [`FilterDb`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Raw libseccomp comparison operator values
pub const SCMP_CMP_NE: u32 = 1;
pub const SCMP_CMP_LT: u32 = 2;
pub const SCMP_CMP_LE: u32 = 3;
pub const SCMP_CMP_EQ: u32 = 4;
pub const SCMP_CMP_GE: u32 = 5;
pub const SCMP_CMP_GT: u32 = 6;
pub const SCMP_CMP_MASKED_EQ: u32 = 7;

/// Comparison performed by a decision node
///
/// The database normalizes everything into the four forms below; any other
/// operator value is kept verbatim in `Other` so it can still be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ge,
    Gt,
    MaskedEq,
    Other(u32),
}

impl CmpOp {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            SCMP_CMP_EQ => CmpOp::Eq,
            SCMP_CMP_GE => CmpOp::Ge,
            SCMP_CMP_GT => CmpOp::Gt,
            SCMP_CMP_MASKED_EQ => CmpOp::MaskedEq,
            other => CmpOp::Other(other),
        }
    }

    pub fn to_raw(self) -> u32 {
        match self {
            CmpOp::Eq => SCMP_CMP_EQ,
            CmpOp::Ge => SCMP_CMP_GE,
            CmpOp::Gt => SCMP_CMP_GT,
            CmpOp::MaskedEq => SCMP_CMP_MASKED_EQ,
            CmpOp::Other(raw) => raw,
        }
    }
}

/// Where a decision node sends control for one outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Branch {
    /// Nothing here; the false side falls through to the default action
    #[default]
    None,
    Action(Action),
    Subtree(NodeId),
}

/// One comparison on a syscall argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgNode {
    pub arg: u32,
    pub op: CmpOp,
    pub datum: u32,
    /// Only meaningful for [`CmpOp::MaskedEq`]
    pub mask: u32,
    /// Byte offset in `seccomp_data` of the 32-bit half being tested
    pub arg_offset: u32,
    pub on_true: Branch,
    pub on_false: Branch,
    pub(crate) lvl_prev: Option<NodeId>,
    pub(crate) lvl_next: Option<NodeId>,
}

impl ArgNode {
    pub fn new(arg: u32, op: CmpOp, datum: u32) -> Self {
        Self {
            arg,
            op,
            datum,
            mask: 0,
            arg_offset: 0,
            on_true: Branch::None,
            on_false: Branch::None,
            lvl_prev: None,
            lvl_next: None,
        }
    }

    /// Node testing one half of `arg`, with the offset taken from `arch`
    ///
    /// An index past the end of `seccomp_data` keeps offset 0.
    pub fn for_arch(arch: &Arch, arg: u32, half: ArgHalf, op: CmpOp, datum: u32) -> Self {
        let offset = arch.half_offset(arg, half).unwrap_or_default();
        Self::new(arg, op, datum).with_offset(offset)
    }

    pub fn with_mask(mut self, mask: u32) -> Self {
        self.mask = mask;
        self
    }

    pub fn with_offset(mut self, arg_offset: u32) -> Self {
        self.arg_offset = arg_offset;
        self
    }

    pub fn on_true(mut self, branch: Branch) -> Self {
        self.on_true = branch;
        self
    }

    pub fn on_false(mut self, branch: Branch) -> Self {
        self.on_false = branch;
        self
    }

    pub fn prev_at_level(&self) -> Option<NodeId> {
        self.lvl_prev
    }

    pub fn next_at_level(&self) -> Option<NodeId> {
        self.lvl_next
    }
}

/// Filter rule for a single syscall
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyscallEntry {
    pub num: i32,
    pub priority: i32,
    /// Entries marked invalid are left out of the generated code
    pub valid: bool,
    /// Any node of the first decision level
    pub chain: Option<NodeId>,
    /// Applied directly when there is no chain
    pub action: Action,
}

impl SyscallEntry {
    pub fn new(num: i32, priority: i32, action: Action) -> Self {
        Self {
            num,
            priority,
            valid: true,
            chain: None,
            action,
        }
    }

    pub fn with_chain(mut self, root: NodeId) -> Self {
        self.chain = Some(root);
        self
    }

    pub fn invalid(mut self) -> Self {
        self.valid = false;
        self
    }
}

/// Complete filter for one architecture
#[derive(Debug, Clone)]
pub struct FilterDb {
    arch: Arch,
    default_action: Action,
    syscalls: Vec<SyscallEntry>,
    nodes: Vec<ArgNode>,
}

impl FilterDb {
    pub fn new(arch: Arch, default_action: Action) -> Self {
        Self {
            arch,
            default_action,
            syscalls: Vec::new(),
            nodes: Vec::new(),
        }
    }

    pub fn arch(&self) -> &Arch {
        &self.arch
    }

    pub fn default_action(&self) -> Action {
        self.default_action
    }

    /// Syscall entries in insertion order
    pub fn syscalls(&self) -> &[SyscallEntry] {
        &self.syscalls
    }

    pub fn add_syscall(&mut self, entry: SyscallEntry) {
        self.syscalls.push(entry);
    }

    /// Store a node that starts a new sibling level
    ///
    /// Any sibling links already set on `node` are discarded.
    pub fn add_node(&mut self, mut node: ArgNode) -> NodeId {
        node.lvl_prev = None;
        node.lvl_next = None;
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Store a node directly after `prev` on the same level
    ///
    /// If `prev` already had a successor the new node is spliced in between.
    ///
    /// # Panics
    ///
    /// Panics if `prev` does not belong to this database.
    pub fn add_sibling(&mut self, prev: NodeId, node: ArgNode) -> NodeId {
        let next = self.nodes[prev.0].lvl_next;
        let id = self.add_node(node);

        self.nodes[id.0].lvl_prev = Some(prev);
        self.nodes[id.0].lvl_next = next;
        self.nodes[prev.0].lvl_next = Some(id);
        if let Some(next) = next {
            self.nodes[next.0].lvl_prev = Some(id);
        }
        id
    }

    /// Store `nodes` as one sibling level, returning the first one
    pub fn add_level(&mut self, nodes: impl IntoIterator<Item = ArgNode>) -> Option<NodeId> {
        let mut nodes = nodes.into_iter();
        let first = self.add_node(nodes.next()?);
        let mut last = first;
        for node in nodes {
            last = self.add_sibling(last, node);
        }
        Some(first)
    }

    /// # Panics
    ///
    /// Panics if `id` does not belong to this database.
    pub fn node(&self, id: NodeId) -> &ArgNode {
        &self.nodes[id.0]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// First node of the sibling level containing `id`
    pub fn first_sibling(&self, id: NodeId) -> NodeId {
        let mut cur = id;
        while let Some(prev) = self.node(cur).lvl_prev {
            cur = prev;
        }
        cur
    }

    /// Every node of the level containing `id`, left to right
    pub fn level(&self, id: NodeId) -> LevelIter<'_> {
        LevelIter {
            db: self,
            next: Some(self.first_sibling(id)),
        }
    }
}

/// Iterator over one sibling level
pub struct LevelIter<'a> {
    db: &'a FilterDb,
    next: Option<NodeId>,
}

impl<'a> Iterator for LevelIter<'a> {
    type Item = (NodeId, &'a ArgNode);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let node = self.db.node(id);
        self.next = node.lvl_next;
        Some((id, node))
    }
}
