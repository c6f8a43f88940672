use anyhow::Result;
use fpga_arch::db::{CellId, Context, Design, InstId, ACTIVE_PIPS_KEY, ACTIVE_REPEATERS_KEY};
use fpga_arch::eval::Evaluator;
use fpga_arch::tech::DisplayLevel;
use fpga_arch::{layout, primitive, sexpr};
use std::fs;

fn build() -> Result<(Design, CellId)> {
    let s = fs::read_to_string(format!(
        "{}/tests/sample.fpga",
        env!("CARGO_MANIFEST_DIR")
    ))?;
    let top = sexpr::read_str(&s)?;
    let catalog = primitive::build_primitives(&top)?;
    let mut design = Design::new();
    let arch = layout::build_cells(&top, &catalog, &mut design)?;
    Ok((design, arch))
}

fn program(design: &mut Design, cell: CellId, inst: &str, key: &str, value: &str) -> InstId {
    let id = design.cell(cell).find_instance(inst).unwrap();
    design
        .cell_mut(cell)
        .instance_mut(id)
        .attributes
        .insert(key.to_string(), value.to_string());
    id
}

#[test]
fn active_pip_drives_both_of_its_nets() -> Result<()> {
    let (mut design, arch) = build()?;
    let t0 = program(&mut design, arch, "t0", ACTIVE_PIPS_KEY, "xbar.p1");
    let tile = design.find_cell("tile").unwrap();
    let xbar = design.cell(tile).find_instance("xbar").unwrap();

    let eval = Evaluator::new(&design);
    let ctx = Context::top(arch).push(t0);
    let activity = eval.pip_activity(&ctx, xbar);
    assert_eq!(activity.pip_active, vec![true]);
    // Nets h and v light up; the unconnected net stays dark.
    assert_eq!(activity.net_active, vec![true, true, false]);
    Ok(())
}

#[test]
fn evaluation_is_repeatable() -> Result<()> {
    let (mut design, arch) = build()?;
    let t0 = program(&mut design, arch, "t0", ACTIVE_PIPS_KEY, "xbar.p1");
    let tile = design.find_cell("tile").unwrap();
    let xbar = design.cell(tile).find_instance("xbar").unwrap();

    let eval = Evaluator::new(&design);
    let ctx = Context::top(arch).push(t0);
    let first = eval.pip_activity(&ctx, xbar);
    let second = eval.pip_activity(&ctx, xbar);
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn annotation_paths_are_anchored_to_the_queried_instance() -> Result<()> {
    // A bare pip name on an ancestor does not reach down a level, and a
    // pathless annotation on the primitive itself does.
    let (mut design, arch) = build()?;
    let tile = design.find_cell("tile").unwrap();
    let xbar = design.cell(tile).find_instance("xbar").unwrap();

    let t0 = program(&mut design, arch, "t0", ACTIVE_PIPS_KEY, "p1");
    let eval = Evaluator::new(&design);
    let ctx = Context::top(arch).push(t0);
    assert_eq!(eval.pip_activity(&ctx, xbar).pip_active, vec![false]);
    drop(eval);

    program(&mut design, arch, "t0", ACTIVE_PIPS_KEY, "xbar.p1");
    let eval = Evaluator::new(&design);
    assert_eq!(eval.pip_activity(&ctx, xbar).pip_active, vec![true]);
    drop(eval);

    program(&mut design, tile, "xbar", ACTIVE_PIPS_KEY, "p1");
    // Annotation on the primitive itself shadows the ancestor's.
    let eval = Evaluator::new(&design);
    assert_eq!(eval.pip_activity(&ctx, xbar).pip_active, vec![true]);
    Ok(())
}

#[test]
fn too_deep_annotation_tokens_are_skipped() -> Result<()> {
    let (mut design, arch) = build()?;
    let t0 = program(
        &mut design,
        arch,
        "t0",
        ACTIVE_PIPS_KEY,
        "no.such.chain.p1 xbar.p1",
    );
    let tile = design.find_cell("tile").unwrap();
    let xbar = design.cell(tile).find_instance("xbar").unwrap();
    let eval = Evaluator::new(&design);
    let ctx = Context::top(arch).push(t0);
    assert_eq!(eval.pip_activity(&ctx, xbar).pip_active, vec![true]);
    Ok(())
}

#[test]
fn wire_activity_crosses_the_cell_boundary() -> Result<()> {
    let (mut design, arch) = build()?;
    let eval = Evaluator::new(&design);
    let ctx = Context::top(arch);
    // The chip's only wire ties its pin to t0's west port; nothing is
    // programmed yet.
    let wire = fpga_arch::db::WireId(0);
    assert!(!eval.wire_active(&ctx, wire));
    drop(eval);

    program(&mut design, arch, "t0", ACTIVE_PIPS_KEY, "xbar.p1");
    let eval = Evaluator::new(&design);
    assert!(eval.wire_active(&ctx, wire));
    Ok(())
}

#[test]
fn display_levels_control_saved_state() -> Result<()> {
    let (mut design, arch) = build()?;
    let t0 = program(&mut design, arch, "t0", ACTIVE_PIPS_KEY, "xbar.p1");
    let tile = design.find_cell("tile").unwrap();
    let xbar = design.cell(tile).find_instance("xbar").unwrap();
    let eval = Evaluator::new(&design);
    let ctx = Context::top(arch).push(t0);

    let nothing = eval.display_activity(&ctx, xbar, DisplayLevel::Nothing);
    assert!(nothing.net_saved.iter().all(|&b| !b));
    assert!(nothing.pip_saved.iter().all(|&b| !b));

    let everything = eval.display_activity(&ctx, xbar, DisplayLevel::Everything);
    assert!(everything.net_saved.iter().all(|&b| b));
    assert!(everything.pip_saved.iter().all(|&b| !b));

    let active = eval.display_activity(&ctx, xbar, DisplayLevel::ActiveOnly);
    assert_eq!(active.pip_saved, vec![true]);
    assert_eq!(active.net_saved, vec![true, true, false]);
    Ok(())
}

#[test]
fn repeater_activity_matches_by_instance_name() -> Result<()> {
    let (mut design, arch) = build()?;
    let tile = design.find_cell("tile").unwrap();
    let r1 = program(&mut design, tile, "r1", ACTIVE_REPEATERS_KEY, "r1");
    let t0 = design.cell(arch).find_instance("t0").unwrap();

    let eval = Evaluator::new(&design);
    let ctx = Context::top(arch).push(t0);
    assert!(eval.repeater_active(&ctx, r1));
    drop(eval);

    program(&mut design, tile, "r1", ACTIVE_REPEATERS_KEY, "other");
    let eval = Evaluator::new(&design);
    assert!(!eval.repeater_active(&ctx, r1));
    Ok(())
}
