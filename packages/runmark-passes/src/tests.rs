use expect_test::{expect, Expect};
use runmark_diagnostics::span::FileIdMap;
use runmark_diagnostics::Diagnostics;
use runmark_ir::block::{Block, Module};
use runmark_ir::instr::{Instr, InstrKind, Operand};
use runmark_ir::parser::parse_module;
use runmark_ir::reg::Reg;
use runmark_ir::visitor::Visitor;

use crate::config::{PassConfig, TerminatorPolicy};
use crate::hazard::{find_memory_hazard, memory_hazard, register_hazard, Hazard};
use crate::marker::{MarkerFactory, Noopn};
use crate::state::RunState;
use crate::stats::CollectStats;
use crate::transform::{plan_runs, BlockTransformer, Classification};
use crate::{parse_file, run_passes, run_passes_with, CompileError};

#[track_caller]
fn parse(input: &str) -> Module {
    let mut map = FileIdMap::new();
    let diagnostics = Diagnostics::default();
    let id = map.create_virtual_file("<test>", input.to_string());
    let module = parse_module(id, input, diagnostics.clone()).unwrap();
    assert!(diagnostics.eprint(&map));
    module
}

/// All the instructions of the first block of `input`.
#[track_caller]
fn instrs(input: &str) -> Vec<Instr> {
    let module = parse(input);
    module.functions[0].blocks[0].instrs().cloned().collect()
}

#[track_caller]
fn check_with(input: &str, config: PassConfig, expect: Expect) {
    let mut module = parse(input);
    run_passes(&mut module, &config);
    expect.assert_eq(&module.to_string());
}

#[track_caller]
fn check(input: &str, expect: Expect) {
    check_with(input, PassConfig::default(), expect);
}

#[track_caller]
fn check_plan(input: &str, expect: Expect) {
    let module = parse(input);
    let mut actual = String::new();
    for function in &module.functions {
        for block in &function.blocks {
            let plan = plan_runs(block, &PassConfig::default());
            for (id, class) in &plan.classified {
                actual.push_str(&format!("{} ; {class}\n", block[*id]));
            }
            for run in &plan.runs {
                actual.push_str(&format!("run of {} from `{}`\n", run.len, block[run.start]));
            }
        }
    }
    expect.assert_eq(&actual);
}

#[test]
fn independent_instructions_share_one_run() {
    check(
        r#"
f:
    add a1, a2, a3
    add a4, a5, a6
    lw a7, 0(a0)
"#,
        expect![[r#"
            f:
                noopn   t3, 3
                add     a1, a2, a3
                add     a4, a5, a6
                lw      a7, 0(a0)
        "#]],
    );
}

#[test]
fn read_after_write_closes_run() {
    check(
        r#"
f:
    add a1, a2, a3
    add a4, a1, a6
"#,
        expect![[r#"
            f:
                noopn   t3, 1
                add     a1, a2, a3
                add     a4, a1, a6
        "#]],
    );
}

#[test]
fn stores_through_same_base_never_share_a_run() {
    check_plan(
        r#"
f:
    sw a2, 0(a1)
    sw a3, 0(a1)
"#,
        expect![[r#"
            sw      a2, 0(a1) ; member
            sw      a3, 0(a1) ; boundary (memory through a1)
            run of 1 from `sw      a2, 0(a1)`
        "#]],
    );
}

#[test]
fn loads_through_same_base_are_independent() {
    check(
        r#"
f:
    lw a0, 0(a2)
    lw a1, 4(a2)
"#,
        expect![[r#"
            f:
                noopn   t3, 2
                lw      a0, 0(a2)
                lw      a1, 4(a2)
        "#]],
    );
}

#[test]
fn write_hazards() {
    check_plan(
        r#"
f:
    add a1, a0, a2
    li a0, 5
    li a0, 6
"#,
        expect![[r#"
            add     a1, a0, a2 ; member
            li      a0, 5 ; boundary (write-after-read on a0)
            li      a0, 6 ; boundary (write-after-write on a0)
            run of 1 from `add     a1, a0, a2`
        "#]],
    );
}

#[test]
fn register_sets_persist_while_idle() {
    // `mul` only depends on `add a3`, two boundaries back.
    check_plan(
        r#"
f:
    add a0, a1, a2
    add a3, a0, a1
    sub a4, a3, a2
    mul a5, a3, a6
    xor t0, t1, t2
"#,
        expect![[r#"
            add     a0, a1, a2 ; member
            add     a3, a0, a1 ; boundary (read-after-write on a0)
            sub     a4, a3, a2 ; boundary (read-after-write on a3)
            mul     a5, a3, a6 ; boundary (read-after-write on a3)
            xor     t0, t1, t2 ; member
            run of 1 from `add     a0, a1, a2`
            run of 1 from `xor     t0, t1, t2`
        "#]],
    );
}

#[test]
fn terminators_flush_and_are_skipped() {
    check(
        r#"
f:
    add a0, a1, a2
    beqz a3, .L1
    add a4, a0, a0
    asm "csrr t0, mcycle"
    call g
.L1:
    ret
"#,
        expect![[r#"
            f:
                noopn   t3, 1
                add     a0, a1, a2
                beqz    a3, .L1
                noopn   t3, 1
                add     a4, a0, a0
                asm "csrr t0, mcycle"
                call    g
            .L1:
                ret
        "#]],
    );
}

#[test]
fn ordinary_terminator_policy() {
    let config = PassConfig {
        policy: TerminatorPolicy::Ordinary,
        ..PassConfig::default()
    };
    check_with(
        r#"
f:
    add a0, a1, a2
    j .L1
    add a3, a4, a5
    bnez a6, .L1
.L1:
    ret
"#,
        config,
        expect![[r#"
            f:
                noopn   t3, 4
                add     a0, a1, a2
                j       .L1
                add     a3, a4, a5
                bnez    a6, .L1
            .L1:
                noopn   t3, 1
                ret
        "#]],
    );
}

#[test]
fn metadata_is_transparent() {
    check(
        r#"
f:
    .loc 1 2 3
    add a0, a1, a2
    .cfi_def_cfa_offset 16
    add a3, a4, a5
"#,
        expect![[r#"
            f:
                .loc 1 2 3
                noopn   t3, 2
                add     a0, a1, a2
                .cfi_def_cfa_offset 16
                add     a3, a4, a5
        "#]],
    );
}

#[test]
fn markers_are_never_classified() {
    // The carrier is read and written by the marker, but markers never reach the state.
    check_plan(
        r#"
f:
    noopn t3, 2
    add t3, t3, a0
    add a1, a2, a3
"#,
        expect![[r#"
            add     t3, t3, a0 ; member
            add     a1, a2, a3 ; member
            run of 2 from `add     t3, t3, a0`
        "#]],
    );
}

#[test]
fn annotated_output_plans_the_same_runs() {
    let input = r#"
f:
    add a0, a1, a2
    add a3, a0, a1
    sw a3, 0(sp)
    lw a4, 4(sp)
    ret
"#;
    let lens = |module: &Module| -> Vec<u32> {
        plan_runs(&module.functions[0].blocks[0], &PassConfig::default())
            .runs
            .iter()
            .map(|run| run.len)
            .collect()
    };

    let mut module = parse(input);
    let before = lens(&module);
    run_passes(&mut module, &PassConfig::default());
    let annotated = parse(&module.to_string());
    assert_eq!(lens(&annotated), before);
}

#[test]
fn planning_is_idempotent() {
    let mut module = parse(
        r#"
f:
    li a0, 1
    sw a0, 0(sp)
    li a1, 2
    sw a1, 4(sp)
    lw a2, 0(sp)
"#,
    );
    let config = PassConfig::default();
    let block = &mut module.functions[0].blocks[0];
    let first = plan_runs(block, &config);
    assert_eq!(plan_runs(block, &config), first);

    // Inserting markers keeps every id, and markers are skipped.
    let transformer = BlockTransformer::new(&config, &Noopn);
    assert!(transformer.apply(block, &first));
    assert_eq!(plan_runs(block, &config), first);
    // Applying the same plan again finds every marker in place.
    let len = block.len();
    assert!(!transformer.apply(block, &first));
    assert_eq!(block.len(), len);
}

#[test]
fn annotating_twice_keeps_one_marker_per_run() {
    let mut module = parse("f:\n add a0, a1, a2\n add a3, a4, a5\n add a6, a0, a3\n ret\n");
    run_passes(&mut module, &PassConfig::default());
    let once = module.to_string();
    expect![[r#"
        f:
            noopn   t3, 2
            add     a0, a1, a2
            add     a3, a4, a5
            add     a6, a0, a3
            ret
    "#]]
    .assert_eq(&once);

    let mut again = parse(&once);
    let stats = run_passes(&mut again, &PassConfig::default());
    assert_eq!(again.to_string(), once);
    assert_eq!(stats.markers, 1);
    assert_eq!(stats.modified_blocks, 0);
}

#[test]
fn stale_markers_are_rebuilt_or_dropped() {
    check(
        r#"
f:
    noopn t3, 5
    add a0, a1, a2
    add a3, a4, a5
    noopn t3, 1
    add a6, a0, a3
    ret
"#,
        expect![[r#"
            f:
                noopn   t3, 2
                add     a0, a1, a2
                add     a3, a4, a5
                add     a6, a0, a3
                ret
        "#]],
    );

    let config = PassConfig {
        carrier: Reg::X(5),
        ..PassConfig::default()
    };
    check_with(
        "f:\n noopn t3, 1\n add a0, a1, a2\n",
        config,
        expect![[r#"
            f:
                noopn   t0, 1
                add     a0, a1, a2
        "#]],
    );
}

#[test]
fn compiler_output_is_annotated() {
    check(
        r#"
main:
    lui a0, %hi(.L.str)
    addi a0, a0, %lo(.L.str)
    call printf@plt
    jal ra, g
    li a1, 3
    li a2, 4
1:
    addi a1, a1, -1
    bnez a1, 1b
    ret
"#,
        expect![[r#"
            main:
                noopn   t3, 1
                lui     a0, %hi(.L.str)
                addi    a0, a0, %lo(.L.str)
                call    printf@plt
                jal     ra, g
                noopn   t3, 2
                li      a1, 3
                li      a2, 4
            1:
                noopn   t3, 1
                addi    a1, a1, -1
                bnez    a1, 1b
                ret
        "#]],
    );
}

#[test]
fn runs_account_for_every_instruction() {
    let inputs = [
        "f:\n add a1, a2, a3\n add a4, a5, a6\n lw a7, 0(a0)\n",
        "f:\n sw a2, 0(a1)\n sw a3, 0(a1)\n lw a4, 0(a5)\n",
        "f:\n li a0, 1\n li a0, 2\n add a1, a0, a0\n ret\n",
        "f:\n .loc 1 1 0\n add a0, a1, a2\n j .L2\n.L2:\n mv a1, a0\n add a2, a1, a1\n noopn t3, 1\n",
    ];
    for input in inputs {
        let module = parse(input);
        for block in &module.functions[0].blocks {
            let plan = plan_runs(block, &PassConfig::default());
            let eligible = block
                .instrs()
                .filter(|instr| !instr.is_marker() && !instr.is_metadata_only())
                .filter(|instr| !instr.is_run_terminator())
                .count();
            assert_eq!(plan.members() + plan.boundaries(), eligible, "{input}");
            let counted: u32 = plan.runs.iter().map(|run| run.len).sum();
            assert_eq!(counted as usize, plan.members(), "{input}");
            assert!(plan.runs.iter().all(|run| run.len > 0));
        }
    }
}

#[test]
fn block_modified_only_when_markers_are_inserted() {
    let config = PassConfig::default();
    let transformer = BlockTransformer::new(&config, &Noopn);

    let mut empty = Block::new(None);
    assert!(!transformer.run_on_block(&mut empty));

    let mut module = parse("f:\n ret\n.L1:\n nop\n");
    let blocks = &mut module.functions[0].blocks;
    assert!(!transformer.run_on_block(&mut blocks[0]));
    assert_eq!(blocks[0].len(), 1);
    assert!(transformer.run_on_block(&mut blocks[1]));
    assert_eq!(blocks[1].len(), 2);
}

#[test]
fn missing_register_operands_are_skipped() {
    let instrs = instrs("f:\n addi _, a0, 1\n addi _, a1, 2\n");
    let mut state = RunState::new();
    state.fold(&instrs[0]);
    assert!(state.def_regs.is_empty());
    assert!(!register_hazard(&instrs[1], &state.live_regs, &state.def_regs));

    check(
        "f:\n addi _, a0, 1\n addi _, a1, 2\n",
        expect![[r#"
            f:
                noopn   t3, 2
                addi    _, a0, 1
                addi    _, a1, 2
        "#]],
    );
}

#[test]
fn def_then_use_is_a_hazard() {
    let instrs = instrs("f:\n li a0, 1\n add a1, a0, a0\n addi a0, a0, 1\n");
    let mut state = RunState::new();
    state.fold(&instrs[0]);
    assert!(register_hazard(&instrs[1], &state.live_regs, &state.def_regs));
    // Writing and reading the same register leaves it in both sets.
    state.fold(&instrs[2]);
    assert!(state.live_regs.contains(&Reg::X(10)));
    assert!(state.def_regs.contains(&Reg::X(10)));
}

#[test]
fn memory_hazard_needs_a_store_and_a_shared_register() {
    let instrs = instrs(
        r#"
f:
    sw a0, 0(a1)
    sw a2, 0(a3)
    lw a4, 8(a1)
    lw a5, 0(a3)
    add a6, a1, a3
    amoswap.w a7, a0, (a3)
"#,
    );
    let [store_a1, store_a3, load_a1, load_a3, add, amo] = &instrs[..] else {
        panic!("expected 6 instructions");
    };
    assert!(!memory_hazard(store_a1, store_a3));
    assert!(!memory_hazard(load_a1, load_a3));
    assert!(!memory_hazard(add, store_a1));
    assert_eq!(find_memory_hazard(load_a1, store_a1), Some(Hazard::Memory(Reg::X(11))));
    assert_eq!(find_memory_hazard(store_a1, load_a1), Some(Hazard::Memory(Reg::X(11))));
    assert!(memory_hazard(amo, load_a3));
    // The stored value register counts too.
    assert!(memory_hazard(amo, store_a1));
}

#[test]
fn custom_carrier_and_factory() {
    let config = PassConfig {
        carrier: Reg::X(5),
        ..PassConfig::default()
    };
    check_with(
        "f:\n add a0, a1, a2\n",
        config,
        expect![[r#"
            f:
                noopn   t0, 1
                add     a0, a1, a2
        "#]],
    );

    struct Hint;

    impl MarkerFactory for Hint {
        fn build_marker(&self, _carrier: Reg, count: u32) -> Instr {
            Instr::new("hint", InstrKind::Marker, vec![Operand::Imm(count.into())])
        }
    }

    let mut module = parse("f:\n add a0, a1, a2\n add a3, a4, a5\n");
    run_passes_with(&mut module, &config, &Hint);
    expect![[r#"
        f:
            hint    2
            add     a0, a1, a2
            add     a3, a4, a5
    "#]]
    .assert_eq(&module.to_string());
}

#[test]
fn pass_stats() {
    let mut module = parse(
        r#"
    .text
f:
    add a0, a1, a2
    add a3, a0, a1
.L1:
    lw a4, 0(sp)
    sw a4, 4(sp)
    ret
g:
    .cfi_startproc
    nop
"#,
    );
    let stats = run_passes(&mut module, &PassConfig::default());
    expect![[r#"
        PassStats {
            functions: 2,
            blocks: 3,
            modified_blocks: 3,
            markers: 3,
            run_members: 3,
            boundaries: 2,
            terminators: 1,
        }
    "#]]
    .assert_debug_eq(&stats);
    expect![[r#"
            .text
        f:
            noopn   t3, 1
            add     a0, a1, a2
            add     a3, a0, a1
        .L1:
            noopn   t3, 1
            lw      a4, 0(sp)
            sw      a4, 4(sp)
            ret
        g:
            .cfi_startproc
            noopn   t3, 1
            nop
    "#]]
    .assert_eq(&module.to_string());

    let mut collect = CollectStats::new();
    collect.visit_module(&module);
    expect![[r#"
        functions: 2
        instructions: 10
          Alu: 3
          Load: 1
          Store: 1
          Jump: 1
          Meta: 1
          Marker: 3
        marked instructions: 3"#]]
    .assert_eq(&collect.to_string());
}

#[test]
fn classification_display() {
    let hazard = Classification::Boundary(Hazard::WriteAfterWrite(Reg::Virt(3)));
    expect!["boundary (write-after-write on %3)"].assert_eq(&hazard.to_string());
}

#[test]
fn run_state_lifecycle() {
    let mut block = Block::new(None);
    let first = block.push(Instr::new("nop", InstrKind::Alu, Vec::new()));
    let second = block.push(Instr::new("nop", InstrKind::Alu, Vec::new()));

    let mut state = RunState::new();
    state.live_regs.insert(Reg::X(10));
    // Idle: nothing to flush and the sets are kept.
    assert_eq!(state.flush(), None);
    assert!(state.live_regs.contains(&Reg::X(10)));

    state.extend(first);
    state.extend(second);
    assert!(state.is_accumulating());
    assert_eq!(state.count(), 2);
    assert_eq!(state.insert_pos(), Some(first));

    let run = state.flush().unwrap();
    assert_eq!((run.start, run.len), (first, 2));
    assert!(state.live_regs.is_empty());
    assert_eq!(state.count(), 0);
    assert_eq!(state.finish(), None);
}

#[test]
fn parse_file_registers_its_source() {
    let dir = std::env::temp_dir().join(format!("runmark-parse-file-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("short.s");
    std::fs::write(&path, "f:\n    lw a0\n").unwrap();

    let mut map = FileIdMap::new();
    let diagnostics = Diagnostics::default();
    let err = parse_file(&path, &mut map, diagnostics.clone()).unwrap_err();
    expect!["Parse error: `lw` takes 2 operands, found 1."].assert_eq(&err.to_string());
    let mut rendered = Vec::new();
    assert!(!diagnostics.write(&map, &mut rendered).unwrap());
    assert!(String::from_utf8_lossy(&rendered).contains("takes 2 operands"));

    let good = dir.join("good.s");
    std::fs::write(&good, "f:\n    lw a0, 0(a1)\n").unwrap();
    let parsed = parse_file(&good, &mut map, Diagnostics::default()).unwrap();
    assert_eq!(parsed.name, "good");
    assert_eq!(map.name(parsed.file_id), good.display().to_string());

    let wrong = dir.join("notes.txt");
    assert!(matches!(
        parse_file(&wrong, &mut map, Diagnostics::default()),
        Err(CompileError::BadFileExtension(_))
    ));
    std::fs::remove_dir_all(&dir).unwrap();
}
