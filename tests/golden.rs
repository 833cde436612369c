//! End-to-end scenarios E1-E6 (spec.md §8), each driven through the public
//! `decode` + `lift_instruction` pipeline rather than any internal helper.

use vex_lift::decode::decode;
use vex_lift::guest::{Amd64Schema, GuestSchema};
use vex_lift::ir::expr::{ConstValue, Expr};
use vex_lift::ir::irsb::Irsb;
use vex_lift::ir::op::UnaryOp;
use vex_lift::ir::stmt::{JumpKind, Stmt};
use vex_lift::lift::lift_instruction;

fn lift_one(bytes: &[u8], addr: u64) -> Irsb {
    let instr = decode(bytes, addr).expect("decodes");
    let mut irsb = Irsb::new(addr);
    irsb.add(Stmt::IMark {
        addr,
        len: instr.length as u32,
        delta: 0,
    })
    .unwrap();
    lift_instruction(&mut irsb, &Amd64Schema, &instr).unwrap();
    irsb
}

#[test]
fn e1_mov_rbx_rax_is_a_plain_64_bit_register_copy() {
    let irsb = lift_one(&[0x48, 0x89, 0xC3], 0x1000);
    assert_eq!(irsb.instruction_count(), 1);
    let rax = Amd64Schema.offset_of("rax").unwrap();
    let rbx = Amd64Schema.offset_of("rbx").unwrap();
    let put = irsb
        .stmts()
        .iter()
        .find(|s| matches!(s, Stmt::Put { offset, .. } if *offset == rbx))
        .expect("writes rbx");
    match put {
        Stmt::Put { value: Expr::Get { offset, .. }, .. } => assert_eq!(*offset, rax),
        other => panic!("expected a plain Get(rax), got {other:?}"),
    }
}

#[test]
fn e2_add_rbx_rax_writes_result_and_the_addq_flag_quadruple() {
    let irsb = lift_one(&[0x48, 0x01, 0xC3], 0x1000);
    let cc_op_off = vex_lift::guest::ccop::OFFSETS.0;
    let rbx = Amd64Schema.offset_of("rbx").unwrap();
    assert!(irsb.stmts().iter().any(|s| matches!(s, Stmt::Put { offset, .. } if *offset == rbx)));
    let cc_op_put = irsb
        .stmts()
        .iter()
        .find(|s| matches!(s, Stmt::Put { offset, .. } if *offset == cc_op_off))
        .expect("writes CC_OP");
    match cc_op_put {
        Stmt::Put { value: Expr::Const(ConstValue::I64(v)), .. } => {
            assert_eq!(*v, vex_lift::guest::CcOp::AddQ as u64)
        }
        other => panic!("expected a constant CC_OP, got {other:?}"),
    }
}

#[test]
fn e3_mov_eax_ebx_zero_extends_into_the_full_64_bit_register() {
    let irsb = lift_one(&[0x89, 0xD8], 0x1000);
    let rax = Amd64Schema.offset_of("rax").unwrap();
    let put = irsb
        .stmts()
        .iter()
        .find(|s| matches!(s, Stmt::Put { offset, .. } if *offset == rax))
        .expect("writes rax's offset");
    match put {
        Stmt::Put { value: Expr::Unop(UnaryOp::ZeroExt32to64, inner), .. } => {
            assert!(matches!(**inner, Expr::Get { .. }));
        }
        other => panic!("expected Put(rax, ZeroExt32to64(_)), got {other:?}"),
    }
}

#[test]
fn e4_rip_relative_lea_resolves_to_a_constant_address() {
    // lea rax, [rip+0x10] at address 0x1000, length 7
    let irsb = lift_one(&[0x48, 0x8D, 0x05, 0x10, 0x00, 0x00, 0x00], 0x1000);
    let rax = Amd64Schema.offset_of("rax").unwrap();
    let put = irsb
        .stmts()
        .iter()
        .find(|s| matches!(s, Stmt::Put { offset, .. } if *offset == rax))
        .expect("writes rax");
    match put {
        Stmt::Put { value: Expr::Const(ConstValue::I64(addr)), .. } => assert_eq!(*addr, 0x1017),
        other => panic!("expected a resolved constant address, got {other:?}"),
    }
    assert!(!irsb.stmts().iter().any(|s| matches!(
        s,
        Stmt::StoreLE { .. }
    ) || matches!(s, Stmt::Put { value: Expr::LoadLE { .. }, .. })));
}

#[test]
fn e5_conditional_jump_is_a_side_exit_and_the_block_keeps_going() {
    let irsb = lift_one(&[0x74, 0x05], 0x2000);
    let exit = irsb
        .stmts()
        .iter()
        .find(|s| matches!(s, Stmt::Exit { .. }))
        .expect("emits a side exit");
    match exit {
        Stmt::Exit { jump_kind, target, .. } => {
            assert_eq!(*jump_kind, JumpKind::Boring);
            assert_eq!(*target, Expr::konst(ConstValue::I64(0x2007)));
        }
        _ => unreachable!(),
    }
    // JmpCc never sets the block's own terminator fields.
    assert_eq!(irsb.jump_kind, JumpKind::Boring);
    assert_eq!(irsb.next, Expr::konst(ConstValue::I64(0x2000)));
}

#[test]
fn e6_ret_pops_into_next_and_advances_rsp_by_eight() {
    let irsb = lift_one(&[0xC3], 0x3000);
    assert_eq!(irsb.jump_kind, JumpKind::Ret);
    match &irsb.next {
        Expr::RdTmp(_) => {}
        other => panic!("expected next to read the popped temp, got {other:?}"),
    }
    let rsp = Amd64Schema.offset_of("rsp").unwrap();
    assert!(irsb.stmts().iter().any(|s| matches!(s, Stmt::Put { offset, .. } if *offset == rsp)));
}
