use super::*;
use crate::analysis::{AssignmentConverter, RegionConverter};
use crate::{Error, Options, OptionsBuilder, RC};

fn is_slot(region: &AbsRegion) -> bool {
    matches!(
        region.absloc(),
        AbsLoc::StackSlot { .. } | AbsLoc::FrameSlot { .. }
    )
}

#[test]
fn no_stack_or_frame_pointer_no_slot() {
    let function = amd64_function();
    let heights = heights_at(&function, ENTRY, value(-32, 1), value(-16, 1));
    let converter = RegionConverter::new(&heights, Options::new());

    let expressions = [
        insn::expr_reg("rax", 64),
        insn::expr_imm(0x601040),
        Expression::add(insn::expr_reg("rdi", 64), insn::expr_imm(8)),
        Expression::add(
            insn::expr_reg("rax", 64),
            Expression::mul(insn::expr_reg("rcx", 64), insn::expr_imm(8)),
        ),
        Expression::add(insn::expr_reg("rip", 64), insn::expr_imm(0x10)),
    ];

    for expression in &expressions {
        let region = converter.classify(expression, ENTRY, &function).unwrap();
        assert!(!is_slot(&region), "{} became {}", expression, region);
    }
}

#[test]
fn program_counter_relative() {
    let function = amd64_function();
    let heights = heights_at(&function, ENTRY, value(-32, 1), StackHeight::Bottom);
    let converter = RegionConverter::new(&heights, Options::new());

    let expression = Expression::add(insn::expr_reg("rip", 64), insn::expr_imm(0x10));
    assert_eq!(
        converter.classify(&expression, ENTRY, &function).unwrap(),
        AbsRegion::new(AbsLoc::Memory(ENTRY + 0x10))
    );
}

#[test]
fn frame_takes_precedence() {
    let function = amd64_function();
    let heights = heights_at(&function, ENTRY, value(-32, 1), value(-16, 2));
    let converter = RegionConverter::new(&heights, Options::new());

    let expression = Expression::add(insn::expr_reg("rbp", 64), insn::expr_reg("rsp", 64));
    assert_eq!(
        converter.classify(&expression, ENTRY, &function).unwrap(),
        frame_slot(&function, -48, 2)
    );
}

#[test]
fn unknown_stack_height_is_generic_stack() {
    let function = amd64_function();
    let heights = heights_at(&function, ENTRY, StackHeight::Bottom, StackHeight::Bottom);
    let converter = RegionConverter::new(&heights, Options::new());

    let expression = Expression::add(insn::expr_reg("rsp", 64), insn::expr_imm(8));
    assert_eq!(
        converter.classify(&expression, ENTRY, &function).unwrap(),
        AbsRegion::new(AbsLoc::GenericStack)
    );

    let expression = Expression::sub(insn::expr_reg("rbp", 64), insn::expr_imm(8));
    assert_eq!(
        converter.classify(&expression, ENTRY, &function).unwrap(),
        AbsRegion::new(AbsLoc::GenericStack)
    );
}

#[test]
fn unanalyzed_classify_is_error() {
    let function = amd64_function();
    let heights = StackHeights::new();
    let converter = RegionConverter::new(&heights, Options::new());

    let expression = Expression::add(insn::expr_reg("rsp", 64), insn::expr_imm(8));
    assert!(matches!(
        converter.classify(&expression, ENTRY, &function),
        Err(Error::Unanalyzed { .. })
    ));
}

#[test]
fn conversion_is_idempotent() {
    let function = amd64_function();
    let heights = heights_at(&function, ENTRY, value(-32, 1), value(-16, 1));
    let mut converter = AssignmentConverter::new(&heights, Options::new());

    let address = Expression::sub(insn::expr_reg("rbp", 64), insn::expr_imm(8));
    let instruction = other("mov", 4)
        .operand(Operand::new(insn::expr_reg("rax", 64)))
        .operand(Operand::new(insn::deref(address.clone(), 64)))
        .read(insn::reg("rbp", 64))
        .read_memory(address)
        .write(insn::reg("rax", 64));

    let first = converter.convert(&instruction, ENTRY, &function).unwrap();
    let second = converter.convert(&instruction, ENTRY, &function).unwrap();

    assert_eq!(first, second);
    assert!(converter.cache().is_empty());
}

#[test]
fn cached_conversion_skips_oracle_and_decoder() {
    let function = amd64_function();
    let oracle = CountingOracle::new(heights_at(
        &function,
        ENTRY,
        value(0, 1),
        StackHeight::Bottom,
    ));
    let mut converter =
        AssignmentConverter::new(&oracle, OptionsBuilder::new().cache(true).build());

    let instruction =
        CountingInstruction::new(push(insn::expr_reg("rbx", 64), "rsp", 64));

    let first = converter.convert(&instruction, ENTRY, &function).unwrap();
    let queries = oracle.queries();
    let calls = instruction.calls();
    assert!(queries > 0);
    assert!(calls > 0);

    let second = converter.convert(&instruction, ENTRY, &function).unwrap();
    assert_eq!(oracle.queries(), queries);
    assert_eq!(instruction.calls(), calls);

    assert_eq!(first, second);
    assert!(first
        .iter()
        .zip(second.iter())
        .all(|(a, b)| RC::ptr_eq(a, b)));
    assert_eq!(converter.cache().len(), 1);
}

#[test]
fn cache_is_keyed_by_function() {
    let amd64 = amd64_function();
    let mut other_function = Function::new(FunctionId::new(7), ENTRY, Amd64::new());
    other_function.set_name(Some("other".to_string()));

    let mut heights = heights_at(&amd64, ENTRY, value(0, 1), StackHeight::Bottom);
    heights.set_stack(other_function.id(), ENTRY, value(-8, 1));
    heights.set_frame(other_function.id(), ENTRY, StackHeight::Bottom);

    let mut converter =
        AssignmentConverter::new(&heights, OptionsBuilder::new().cache(true).build());

    let instruction = push(insn::expr_reg("rbx", 64), "rsp", 64);
    let first = converter.convert(&instruction, ENTRY, &amd64).unwrap();
    let second = converter
        .convert(&instruction, ENTRY, &other_function)
        .unwrap();

    assert_eq!(first[0].output(), &stack_slot(&amd64, -8, 1));
    assert_eq!(second[0].output(), &stack_slot(&other_function, -16, 1));
    assert_eq!(converter.cache().len(), 2);
}

#[test]
fn uncached_conversion_consults_oracle() {
    let function = amd64_function();
    let oracle = CountingOracle::new(heights_at(
        &function,
        ENTRY,
        value(0, 1),
        StackHeight::Bottom,
    ));
    let mut converter = AssignmentConverter::new(&oracle, Options::new());

    let instruction = push(insn::expr_reg("rbx", 64), "rsp", 64);

    converter.convert(&instruction, ENTRY, &function).unwrap();
    let queries = oracle.queries();
    converter.convert(&instruction, ENTRY, &function).unwrap();

    assert_eq!(oracle.queries(), 2 * queries);
    assert!(converter.cache().is_empty());
}

#[test]
fn convert_instruction_caches_regions() {
    let function = x86_function();
    let heights = heights_at(&function, ENTRY, value(-12, 1), value(-4, 1));
    let mut converter = RegionConverter::new(&heights, OptionsBuilder::new().cache(true).build());

    // mov dword [ebp - 4], ecx
    let address = Expression::sub(insn::expr_reg("ebp", 32), insn::expr_imm(4));
    let instruction = CountingInstruction::new(
        other("mov", 3)
            .operand(Operand::new(insn::deref(address.clone(), 32)))
            .operand(Operand::new(insn::expr_reg("ecx", 32)))
            .read(insn::reg("ecx", 32))
            .read(insn::reg("ebp", 32))
            .write_memory(address),
    );

    let (used, defined) = converter
        .convert_instruction(&instruction, ENTRY, &function)
        .unwrap();

    assert_eq!(used, vec![register("ecx", 32), register("ebp", 32)]);
    assert_eq!(defined, vec![frame_slot(&function, -8, 1)]);
    assert_eq!(converter.used_cache().get(function.id(), ENTRY), Some(&used));
    assert_eq!(
        converter.defined_cache().get(function.id(), ENTRY),
        Some(&defined)
    );

    let calls = instruction.calls();
    let again = converter
        .convert_instruction(&instruction, ENTRY, &function)
        .unwrap();
    assert_eq!(again, (used, defined));
    assert_eq!(instruction.calls(), calls);
}

#[test]
fn failed_conversion_is_not_cached() {
    let function = amd64_function();
    let mut heights = StackHeights::new();
    let mut converter =
        AssignmentConverter::new(&heights, OptionsBuilder::new().cache(true).build());

    let instruction = push(insn::expr_reg("rbx", 64), "rsp", 64);
    assert!(converter.convert(&instruction, ENTRY, &function).is_err());
    assert!(converter.cache().is_empty());
    assert!(converter.region_converter().used_cache().is_empty());

    // Analysis results may arrive later
    drop(converter);
    heights.set_stack(function.id(), ENTRY, value(0, 1));
    heights.set_frame(function.id(), ENTRY, StackHeight::Bottom);
    let mut converter =
        AssignmentConverter::new(&heights, OptionsBuilder::new().cache(true).build());
    assert_eq!(
        converter.convert(&instruction, ENTRY, &function).unwrap().len(),
        2
    );
}
