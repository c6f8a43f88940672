use anyhow::Result;
use fpga_arch::db::Design;
use fpga_arch::geom::Point;
use fpga_arch::{layout, primitive, sexpr};
use std::fs;

fn sample() -> Result<String> {
    Ok(fs::read_to_string(format!(
        "{}/tests/sample.fpga",
        env!("CARGO_MANIFEST_DIR")
    ))?)
}

#[test]
fn parse_and_build() -> Result<()> {
    let s = sample()?;
    let top = sexpr::read_str(&s)?;
    let catalog = primitive::build_primitives(&top)?;
    assert_eq!(catalog.len(), 1);

    let def = catalog.find("crossbar").unwrap();
    assert_eq!(def.width, 10.0);
    assert_eq!(def.ports.len(), 3);
    assert_eq!(def.nets.len(), 3);
    assert_eq!(def.ports[0].con, Some(0));
    assert_eq!(def.ports[1].con, Some(0));
    assert_eq!(def.ports[2].con, Some(1));
    let pip = def.pip("p1").unwrap();
    assert_eq!(pip.con1, Some(0));
    assert_eq!(pip.con2, Some(1));

    let mut design = Design::new();
    let arch = layout::build_cells(&top, &catalog, &mut design)?;
    assert_eq!(design.top, Some(arch));
    assert_eq!(design.cell(arch).name, "chip");

    let tile_id = design.find_cell("tile").unwrap();
    let tile = design.cell(tile_id);
    let xbar = tile.find_instance("xbar").unwrap();
    assert_eq!(tile.instance(xbar).center, Point::new(15.0, 15.0));
    // The repeater sits at the midpoint of its two ports, pointing east.
    let r1 = tile.find_instance("r1").unwrap();
    assert_eq!(tile.instance(r1).center, Point::new(30.0, 15.0));
    assert_eq!(tile.instance(r1).rotation, 0);
    assert!(tile.find_export("west").is_some());
    assert!(tile.find_export("north").is_some());

    Ok(())
}

#[test]
fn reserializes_to_the_same_tree() -> Result<()> {
    let s = sample()?;
    let top = sexpr::read_str(&s)?;
    let first = top.branches().next().unwrap();
    let again = sexpr::read_str(&first.to_string())?;
    assert_eq!(again.branches().next().unwrap().to_string(), first.to_string());
    Ok(())
}
