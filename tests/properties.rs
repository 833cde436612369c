//! Property tests for the testable properties in spec.md §8 that benefit
//! from randomized or table-driven coverage rather than one golden case
//! each (invariants 1-4 are already exercised directly by `ir::irsb`'s own
//! unit tests, since they are enforced inside `Irsb::add` itself).

use quickcheck_macros::quickcheck;
use test_case::test_case;

use vex_lift::decode::decode;
use vex_lift::decode::instr::Mnemonic;
use vex_lift::driver::{lift_block, Budgets};
use vex_lift::guest::Amd64Schema;
use vex_lift::ir::stmt::Stmt;

/// Invariant 5: a 32-bit GPR write always zero-extends into the aliased
/// 64-bit register, for every one-byte register encoding of `MOV r32, r32`.
#[test_case(0xC0; "eax, eax")]
#[test_case(0xD8; "eax, ebx")]
#[test_case(0xC8; "eax, ecx")]
#[test_case(0xF8; "edi, eax")]
fn dword_mov_zero_extends_the_destination(modrm: u8) {
    let instr = decode(&[0x89, modrm], 0x1000).expect("decodes");
    assert_eq!(instr.mnemonic, Mnemonic::Mov);
    let mut irsb = vex_lift::ir::irsb::Irsb::new(0x1000);
    irsb.add(Stmt::IMark { addr: 0x1000, len: instr.length as u32, delta: 0 }).unwrap();
    vex_lift::lift::lift_instruction(&mut irsb, &Amd64Schema, &instr).unwrap();
    let put = irsb
        .stmts()
        .iter()
        .find(|s| matches!(s, Stmt::Put { .. }))
        .expect("writes the destination register");
    match put {
        Stmt::Put { value, .. } => {
            assert!(
                matches!(value, vex_lift::ir::expr::Expr::Unop(vex_lift::ir::op::UnaryOp::ZeroExt32to64, _)),
                "expected a ZeroExt32to64-wrapped write, got {value:?}"
            );
        }
        _ => unreachable!(),
    }
}

/// Invariant 7: every flag-affecting mnemonic only ever writes the lazy
/// `CC_*` quadruple offsets, never a scalar bit offset outside that set.
#[test_case(&[0x01, 0xD8]; "add eax, ebx")]
#[test_case(&[0x29, 0xD8]; "sub eax, ebx")]
#[test_case(&[0xFF, 0xC0]; "inc eax")]
#[test_case(&[0xC1, 0xE0, 0x04]; "shl eax, 4")]
fn flag_writes_stay_within_the_lazy_quadruple(bytes: &[u8]) {
    let instr = decode(bytes, 0x1000).expect("decodes");
    let mut irsb = vex_lift::ir::irsb::Irsb::new(0x1000);
    irsb.add(Stmt::IMark { addr: 0x1000, len: instr.length as u32, delta: 0 }).unwrap();
    vex_lift::lift::lift_instruction(&mut irsb, &Amd64Schema, &instr).unwrap();
    let (off_op, off_dep1, off_dep2, off_ndep) = vex_lift::guest::ccop::OFFSETS;
    let allowed = [off_op, off_dep1, off_dep2, off_ndep];
    let gpr_offsets: Vec<u32> = (0u8..16).map(Amd64Schema::gpr64_offset).collect();
    for stmt in irsb.stmts() {
        if let Stmt::Put { offset, .. } = stmt {
            assert!(
                allowed.contains(offset) || gpr_offsets.contains(offset),
                "unexpected Put target offset {offset}, not a GPR or a CC_* slot"
            );
        }
    }
}

/// Invariant 8: `lift_block` never exceeds either budget, for any prefix of
/// a long run of single-byte `NOP`s.
#[quickcheck]
fn budgets_are_always_honored(max_instructions: u8, max_bytes: u8) -> bool {
    let budgets = Budgets {
        max_instructions: max_instructions as usize,
        max_bytes: max_bytes as usize,
    };
    let bytes = vec![0x90u8; 300]; // 300 NOPs, far more than either cap allows
    let (irsb, consumed) = match lift_block(&bytes, 0x4000, &Amd64Schema, budgets) {
        Ok(result) => result,
        Err(_) => return true, // a LiftBug here would be a separate, unrelated failure
    };
    consumed <= budgets.max_bytes && irsb.instruction_count() <= budgets.max_instructions
}
