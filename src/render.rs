//! Pseudo filter code rendering
//!
//! Turns syscall entries and their decision trees into indented PFC lines.
//! Every body line starts with one space plus one more space per nesting
//! level, e.g.
//!
//! ```text
//! # filter code for syscall #2 (priority: 0)
//!  if ($syscall != 2) goto syscall_2_end;
//!  if ($a1.lo32 & 0x00000003 == 0)
//!   action ALLOW;
//!  else
//!   action ERRNO(13);
//!  syscall_2_end:
//! ```

use std::io::{self, Write};

use crate::action::Action;
use crate::arch::Arch;
use crate::db::{ArgNode, Branch, CmpOp, FilterDb, NodeId, SyscallEntry};

/// Operand token for the argument half a node tests
///
/// On 64-bit arches a node whose offset is not the high half is shown as the
/// low half, including offsets that match neither and argument indices with
/// no offset at all.
pub fn arg_operand(arch: &Arch, node: &ArgNode) -> String {
    if arch.is_64bit() {
        if arch.arg_offset_hi(node.arg) == Some(node.arg_offset) {
            format!("$a{}.hi32", node.arg)
        } else {
            format!("$a{}.lo32", node.arg)
        }
    } else {
        format!("$a{}", node.arg)
    }
}

/// Comparison symbol placed between operand and datum
pub fn op_symbol(node: &ArgNode) -> String {
    match node.op {
        CmpOp::Eq => "==".to_string(),
        CmpOp::Ge => ">=".to_string(),
        CmpOp::Gt => ">".to_string(),
        CmpOp::MaskedEq => format!("& 0x{:08x} ==", node.mask),
        CmpOp::Other(raw) => {
            tracing::warn!(op = raw, arg = node.arg, "unknown comparison operator");
            "???".to_string()
        }
    }
}

fn indent<W: Write + ?Sized>(out: &mut W, depth: usize) -> io::Result<()> {
    write!(out, "{:width$}", "", width = depth)
}

/// Emit ` <action>` at `depth`
pub fn render_action<W: Write + ?Sized>(
    out: &mut W,
    action: Action,
    depth: usize,
) -> io::Result<()> {
    if action.is_unknown() {
        tracing::warn!(raw = action.to_raw(), "unknown action kind");
    }
    indent(out, depth)?;
    writeln!(out, " {}", action)
}

/// Render every node of the sibling level containing `node`
///
/// Output is the same whichever member of the level is passed in.
pub fn render_chain<W: Write + ?Sized>(
    out: &mut W,
    db: &FilterDb,
    node: NodeId,
    depth: usize,
) -> io::Result<()> {
    for (_, cur) in db.level(node) {
        indent(out, depth)?;
        writeln!(
            out,
            " if ({} {} {})",
            arg_operand(db.arch(), cur),
            op_symbol(cur),
            cur.datum
        )?;

        match cur.on_true {
            Branch::Action(action) => render_action(out, action, depth + 1)?,
            Branch::Subtree(next) => render_chain(out, db, next, depth + 1)?,
            Branch::None => {}
        }

        match cur.on_false {
            Branch::Action(action) => {
                indent(out, depth)?;
                writeln!(out, " else")?;
                render_action(out, action, depth + 1)?;
            }
            Branch::Subtree(next) => {
                indent(out, depth)?;
                writeln!(out, " else")?;
                render_chain(out, db, next, depth + 1)?;
            }
            // falls through to the filter's default action
            Branch::None => {}
        }
    }
    Ok(())
}

/// Render the block for one syscall entry
pub fn render_syscall<W: Write + ?Sized>(
    out: &mut W,
    db: &FilterDb,
    sys: &SyscallEntry,
) -> io::Result<()> {
    tracing::trace!(num = sys.num, priority = sys.priority, "rendering syscall");

    writeln!(
        out,
        "# filter code for syscall #{} (priority: {})",
        sys.num, sys.priority
    )?;
    match sys.chain {
        Some(root) => {
            writeln!(
                out,
                " if ($syscall != {}) goto syscall_{}_end;",
                sys.num, sys.num
            )?;
            render_chain(out, db, root, 0)?;
            writeln!(out, " syscall_{}_end:", sys.num)
        }
        None => {
            writeln!(out, " if ($syscall == {})", sys.num)?;
            render_action(out, sys.action, 0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::ArgHalf;

    fn render_to_string(db: &FilterDb, node: NodeId) -> String {
        let mut out = Vec::new();
        render_chain(&mut out, db, node, 0).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_arg_operand_32bit_has_no_suffix() {
        let node = ArgNode::new(2, CmpOp::Eq, 0).with_offset(16 + 2 * 8);
        assert_eq!(arg_operand(&Arch::X86, &node), "$a2");

        // even an offset that would be "hi" on a 64-bit arch
        let node = ArgNode::new(2, CmpOp::Eq, 0).with_offset(16 + 2 * 8 + 4);
        assert_eq!(arg_operand(&Arch::X86, &node), "$a2");
    }

    #[test]
    fn test_arg_operand_64bit_halves() {
        let arch = Arch::X86_64;
        let hi = ArgNode::for_arch(&arch, 3, ArgHalf::Hi, CmpOp::Eq, 0);
        let lo = ArgNode::for_arch(&arch, 3, ArgHalf::Lo, CmpOp::Eq, 0);
        assert_eq!(arg_operand(&arch, &hi), "$a3.hi32");
        assert_eq!(arg_operand(&arch, &lo), "$a3.lo32");
    }

    #[test]
    fn test_arg_operand_bogus_offset_is_lo() {
        let node = ArgNode::new(0, CmpOp::Eq, 0).with_offset(9999);
        assert_eq!(arg_operand(&Arch::AARCH64, &node), "$a0.lo32");
    }

    #[test]
    fn test_arg_operand_huge_index_is_lo() {
        let node = ArgNode::new(u32::MAX, CmpOp::Eq, 0);
        assert_eq!(arg_operand(&Arch::X86_64, &node), "$a4294967295.lo32");

        let node = ArgNode::new(600_000_000, CmpOp::Eq, 1).with_offset(u32::MAX);
        assert_eq!(arg_operand(&Arch::S390X, &node), "$a600000000.lo32");
        assert_eq!(arg_operand(&Arch::X86, &node), "$a600000000");
    }

    #[test]
    fn test_arg_operand_big_endian_hi() {
        let arch = Arch::PPC64;
        let node = ArgNode::new(1, CmpOp::Eq, 0).with_offset(24);
        assert_eq!(arg_operand(&arch, &node), "$a1.hi32");
    }

    #[test]
    fn test_op_symbols() {
        assert_eq!(op_symbol(&ArgNode::new(0, CmpOp::Eq, 0)), "==");
        assert_eq!(op_symbol(&ArgNode::new(0, CmpOp::Ge, 0)), ">=");
        assert_eq!(op_symbol(&ArgNode::new(0, CmpOp::Gt, 0)), ">");
        assert_eq!(
            op_symbol(&ArgNode::new(0, CmpOp::MaskedEq, 0).with_mask(0xf0)),
            "& 0x000000f0 =="
        );
        assert_eq!(op_symbol(&ArgNode::new(0, CmpOp::Other(1), 0)), "???");
    }

    #[test]
    fn test_render_action_indents() {
        let mut out = Vec::new();
        render_action(&mut out, Action::Errno(13), 2).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "   action ERRNO(13);\n");
    }

    #[test]
    fn test_chain_true_action_no_else() {
        let mut db = FilterDb::new(Arch::X86, Action::Kill);
        let root = db.add_node(
            ArgNode::new(0, CmpOp::Eq, 1).on_true(Branch::Action(Action::Kill)),
        );
        assert_eq!(
            render_to_string(&db, root),
            " if ($a0 == 1)\n  action KILL;\n"
        );
    }

    #[test]
    fn test_chain_false_action_emits_else() {
        let mut db = FilterDb::new(Arch::X86, Action::Kill);
        let root = db.add_node(
            ArgNode::new(1, CmpOp::Gt, 10)
                .on_true(Branch::Action(Action::Allow))
                .on_false(Branch::Action(Action::Errno(1))),
        );
        assert_eq!(
            render_to_string(&db, root),
            " if ($a1 > 10)\n  action ALLOW;\n else\n  action ERRNO(1);\n"
        );
    }

    #[test]
    fn test_chain_nested_subtrees() {
        let mut db = FilterDb::new(Arch::X86, Action::Kill);
        let inner_true = db.add_node(
            ArgNode::new(1, CmpOp::Ge, 5).on_true(Branch::Action(Action::Allow)),
        );
        let inner_false = db.add_node(
            ArgNode::new(2, CmpOp::Eq, 0).on_true(Branch::Action(Action::Trap)),
        );
        let root = db.add_node(
            ArgNode::new(0, CmpOp::Eq, 1)
                .on_true(Branch::Subtree(inner_true))
                .on_false(Branch::Subtree(inner_false)),
        );

        let expected = "\
 if ($a0 == 1)
  if ($a1 >= 5)
   action ALLOW;
 else
  if ($a2 == 0)
   action TRAP;
";
        assert_eq!(render_to_string(&db, root), expected);
    }

    #[test]
    fn test_chain_siblings_in_order() {
        let mut db = FilterDb::new(Arch::X86, Action::Kill);
        let first = db
            .add_level([
                ArgNode::new(0, CmpOp::Eq, 1).on_true(Branch::Action(Action::Allow)),
                ArgNode::new(0, CmpOp::Eq, 2).on_true(Branch::Action(Action::Trap)),
            ])
            .unwrap();
        let expected = " if ($a0 == 1)\n  action ALLOW;\n if ($a0 == 2)\n  action TRAP;\n";
        assert_eq!(render_to_string(&db, first), expected);
    }

    #[test]
    fn test_chain_entry_point_independent() {
        let mut db = FilterDb::new(Arch::X86_64, Action::Kill);
        let first = db
            .add_level((0..3).map(|d| {
                ArgNode::for_arch(&Arch::X86_64, 0, ArgHalf::Lo, CmpOp::Eq, d)
                    .on_true(Branch::Action(Action::Errno(d as u16)))
            }))
            .unwrap();
        let ids: Vec<NodeId> = db.level(first).map(|(id, _)| id).collect();

        let baseline = render_to_string(&db, first);
        for id in ids {
            assert_eq!(render_to_string(&db, id), baseline);
        }
    }

    #[test]
    fn test_unknown_operator_does_not_stop_siblings() {
        let mut db = FilterDb::new(Arch::X86, Action::Kill);
        let first = db
            .add_level([
                ArgNode::new(0, CmpOp::Other(42), 7).on_true(Branch::Action(Action::Kill)),
                ArgNode::new(0, CmpOp::Eq, 8).on_true(Branch::Action(Action::Allow)),
            ])
            .unwrap();
        let text = render_to_string(&db, first);
        assert!(text.contains(" if ($a0 ??? 7)\n"));
        assert!(text.contains(" if ($a0 == 8)\n  action ALLOW;\n"));
    }

    #[test]
    fn test_node_without_true_outcome() {
        let mut db = FilterDb::new(Arch::X86, Action::Kill);
        let root = db.add_node(
            ArgNode::new(0, CmpOp::Eq, 3).on_false(Branch::Action(Action::Allow)),
        );
        assert_eq!(
            render_to_string(&db, root),
            " if ($a0 == 3)\n else\n  action ALLOW;\n"
        );
    }

    #[test]
    fn test_render_syscall_without_chain() {
        let db = FilterDb::new(Arch::X86, Action::Kill);
        let sys = SyscallEntry::new(0, 0, Action::Allow);
        let mut out = Vec::new();
        render_syscall(&mut out, &db, &sys).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "# filter code for syscall #0 (priority: 0)\n if ($syscall == 0)\n action ALLOW;\n"
        );
    }

    #[test]
    fn test_render_syscall_with_chain() {
        let mut db = FilterDb::new(Arch::X86, Action::Kill);
        let root = db.add_node(
            ArgNode::new(0, CmpOp::Eq, 1).on_true(Branch::Action(Action::Kill)),
        );
        let sys = SyscallEntry::new(60, -3, Action::Allow).with_chain(root);
        let mut out = Vec::new();
        render_syscall(&mut out, &db, &sys).unwrap();

        let expected = "\
# filter code for syscall #60 (priority: -3)
 if ($syscall != 60) goto syscall_60_end;
 if ($a0 == 1)
  action KILL;
 syscall_60_end:
";
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }
}
