//! Builds the cell hierarchy from `blockdef` and `architecture` sections.

use crate::db::{Cell, CellId, Design, Export, InstId, Instance, Proto, WireEnd};
use crate::error::{Error, Result};
use crate::geom::{self, Point};
use crate::primitive::{scan_sections, PrimitiveCatalog};
use crate::sexpr::{Cursor, LispTree};
use crate::tech;
use fxhash::FxHashMap;

/// Builds every block definition and the single architecture cell under
/// `top`, returning the architecture's cell id. `design.top` is set to it.
pub fn build_cells(
    top: &LispTree,
    catalog: &PrimitiveCatalog,
    design: &mut Design,
) -> Result<CellId> {
    let mut architecture = None;
    for sub in top.branches() {
        if sub.keyword == atom!("blockdef") {
            build_cell(sub, catalog, design)?;
        } else if sub.keyword == atom!("architecture") {
            if architecture.is_some() {
                return Err(Error::semantic(
                    sub.line,
                    "multiple 'architecture' definitions",
                ));
            }
            architecture = Some(build_cell(sub, catalog, design)?);
        }
    }
    let architecture = architecture
        .ok_or_else(|| Error::semantic(top.line, "no 'architecture' definition in file"))?;
    design.top = Some(architecture);
    Ok(architecture)
}

fn build_cell(tree: &LispTree, catalog: &PrimitiveCatalog, design: &mut Design) -> Result<CellId> {
    let sections = scan_sections(tree, "block definition")?;
    let attrs = sections.attributes.ok_or_else(|| {
        Error::semantic(tree.line, "missing 'attributes' section in block definition")
    })?;

    let mut name = None;
    let mut size = None;
    let mut properties = FxHashMap::default();
    for attr in attrs.branches() {
        if attr.keyword == atom!("name") {
            name = Some(attr.single_leaf()?.to_string());
        } else if attr.keyword == atom!("size") {
            size = Some(attr.num_pair()?);
        } else if attr.size() == 1 {
            if let Some(v) = attr.leaf_at(0) {
                properties.insert(attr.keyword.to_string(), v.to_string());
            }
        }
    }
    let name =
        name.ok_or_else(|| Error::semantic(tree.line, "missing 'name' attribute in block definition"))?;
    tracing::info!("creating cell '{}'", name);

    let mut cell = Cell::new(name);
    if let Some((sx, sy)) = size {
        // Four corner pins give the cell its extent.
        for &(x, y) in &[
            (0.5, 0.5),
            (sx - 0.5, 0.5),
            (0.5, sy - 0.5),
            (sx - 0.5, sy - 0.5),
        ] {
            let (pw, ph) = tech::WIRE_PIN_SIZE;
            cell.add_instance(Instance::pin(Point::new(x, y), pw, ph));
        }
    }
    cell.properties = properties;

    // The cell goes into the design before its contents are built so
    // that nets and ports can refer to it by id.
    let cell_id = design.add_cell(cell);

    if let Some(section) = sections.components {
        for sub in section.branches() {
            if sub.keyword == atom!("instance") {
                build_instance(sub, catalog, design, cell_id)?;
            } else if sub.keyword == atom!("repeater") {
                build_repeater(sub, design, cell_id)?;
            }
        }
    }

    if let Some(section) = sections.ports {
        for sub in section.branches() {
            if sub.keyword == atom!("port") {
                build_cell_port(sub, design, cell_id)?;
            }
        }
    }

    if let Some(section) = sections.nets {
        for sub in section.branches() {
            if sub.keyword == atom!("net") {
                build_cell_net(sub, design, cell_id)?;
            }
        }
    }

    Ok(cell_id)
}

fn build_instance(
    tree: &LispTree,
    catalog: &PrimitiveCatalog,
    design: &mut Design,
    cell_id: CellId,
) -> Result<InstId> {
    let mut name = None;
    let mut type_name = None;
    let mut position = None;
    let mut rotation = 0;
    let mut attributes = FxHashMap::default();
    for sub in tree.branches() {
        if sub.keyword == atom!("name") {
            if name.is_some() {
                return Err(Error::semantic(sub.line, "multiple 'name' sections for an instance"));
            }
            name = Some(sub.single_leaf()?.to_string());
        } else if sub.keyword == atom!("type") {
            if type_name.is_some() {
                return Err(Error::semantic(sub.line, "multiple 'type' sections for an instance"));
            }
            type_name = Some(sub.single_leaf()?.to_string());
        } else if sub.keyword == atom!("position") {
            if position.is_some() {
                return Err(Error::semantic(
                    sub.line,
                    "multiple 'position' sections for an instance",
                ));
            }
            let (x, y) = sub.num_pair()?;
            position = Some(Point::new(x, y));
        } else if sub.keyword == atom!("rotation") {
            rotation = sub.single_int()? as i32 * 10;
        } else if sub.keyword == atom!("attributes") {
            for attr in sub.branches() {
                if let Some(v) = attr.leaf_at(0) {
                    attributes.insert(attr.keyword.to_string(), v.to_string());
                }
            }
        }
    }
    let type_name = type_name
        .ok_or_else(|| Error::semantic(tree.line, "instance has no type"))?;
    let position =
        position.ok_or_else(|| Error::semantic(tree.line, "instance has no position"))?;

    let (proto, width, height) = resolve_proto(&type_name, catalog, design)
        .ok_or_else(|| {
            Error::semantic(tree.line, format!("cannot find block type '{}'", type_name))
        })?;
    // Primitive positions name the lower-left corner; block instances are
    // placed at the given point directly.
    let center = if proto.is_block() {
        position
    } else {
        position + Point::new(width / 2.0, height / 2.0)
    };

    Ok(design.cell_mut(cell_id).add_instance(Instance {
        name,
        proto,
        center,
        width,
        height,
        rotation,
        attributes,
    }))
}

fn resolve_proto(
    type_name: &str,
    catalog: &PrimitiveCatalog,
    design: &Design,
) -> Option<(Proto, f64, f64)> {
    if let Some(def) = catalog.find(type_name) {
        return Some((Proto::Prim(def.clone()), def.width, def.height));
    }
    if type_name.eq_ignore_ascii_case("wire_pin") {
        let (w, h) = tech::WIRE_PIN_SIZE;
        return Some((Proto::WirePin, w, h));
    }
    if type_name.eq_ignore_ascii_case("pip") {
        let (w, h) = tech::PIP_NODE_SIZE;
        return Some((Proto::PipNode, w, h));
    }
    if type_name.eq_ignore_ascii_case("repeater") {
        let (w, h) = tech::REPEATER_SIZE;
        return Some((Proto::Repeater, w, h));
    }
    design.find_cell(type_name).map(|id| (Proto::Block(id), 0.0, 0.0))
}

fn build_repeater(tree: &LispTree, design: &mut Design, cell_id: CellId) -> Result<InstId> {
    let mut name = None;
    let mut porta = None;
    let mut portb = None;
    for sub in tree.branches() {
        if sub.keyword == atom!("name") {
            name = Some(sub.single_leaf()?.to_string());
        } else if sub.keyword == atom!("porta") {
            let (x, y) = sub.num_pair()?;
            porta = Some(Point::new(x, y));
        } else if sub.keyword == atom!("portb") {
            let (x, y) = sub.num_pair()?;
            portb = Some(Point::new(x, y));
        }
    }
    let porta = porta.ok_or_else(|| Error::semantic(tree.line, "repeater has no 'porta'"))?;
    let portb = portb.ok_or_else(|| Error::semantic(tree.line, "repeater has no 'portb'"))?;
    let center = Point::new((porta.x + portb.x) / 2.0, (porta.y + portb.y) / 2.0);
    let rotation = geom::figure_angle(porta, portb);
    let (width, height) = tech::REPEATER_SIZE;
    Ok(design.cell_mut(cell_id).add_instance(Instance {
        name,
        proto: Proto::Repeater,
        center,
        width,
        height,
        rotation,
        attributes: FxHashMap::default(),
    }))
}

fn build_cell_port(tree: &LispTree, design: &mut Design, cell_id: CellId) -> Result<()> {
    let mut name = None;
    let mut position = None;
    for sub in tree.branches() {
        if sub.keyword == atom!("name") {
            name = Some(sub.single_leaf()?.to_string());
        } else if sub.keyword == atom!("position") {
            let (x, y) = sub.num_pair()?;
            position = Some(Point::new(x, y));
        }
    }
    let name = name.ok_or_else(|| Error::semantic(tree.line, "port has no name"))?;
    let position =
        position.ok_or_else(|| Error::semantic(tree.line, format!("port '{}' has no position", name)))?;

    let cell = design.cell_mut(cell_id);
    if cell.find_export(&name).is_some() {
        return Err(Error::semantic(
            tree.line,
            format!("duplicate port '{}' in block definition", name),
        ));
    }
    let pin = find_or_make_pin(cell, position);
    cell.exports.push(Export {
        name,
        inst: pin,
        port: "wire".to_string(),
    });
    Ok(())
}

// Pins created for ports and bare coordinates are zero-size.
fn find_or_make_pin(cell: &mut Cell, at: Point) -> InstId {
    match cell.pin_at(at) {
        Some(id) => id,
        None => cell.add_instance(Instance::pin(at, 0.0, 0.0)),
    }
}

fn build_cell_net(tree: &LispTree, design: &mut Design, cell_id: CellId) -> Result<()> {
    for sub in tree.branches() {
        if sub.keyword != atom!("segment") {
            continue;
        }
        let mut cursor = Cursor::new(sub);
        let a = net_end(&mut cursor, design, cell_id)?;
        let b = net_end(&mut cursor, design, cell_id)?;
        design.cell_mut(cell_id).add_wire(a, b);
    }
    Ok(())
}

/// One endpoint of a cell-level net: `component INSTANCE PORT`,
/// `coord X Y`, or `port NAME` naming a port of the cell itself.
fn net_end(cursor: &mut Cursor, design: &mut Design, cell_id: CellId) -> Result<WireEnd> {
    let kind = cursor.next_leaf()?;
    if kind.eq_ignore_ascii_case("component") {
        let inst_name = cursor.next_leaf()?;
        let port = cursor.next_leaf()?;
        let cell = design.cell(cell_id);
        let inst = cell.find_instance(inst_name).ok_or_else(|| {
            Error::semantic(cursor.line(), format!("unknown component '{}' in net segment", inst_name))
        })?;
        if !design.port_exists(&cell.instance(inst).proto, port) {
            return Err(Error::semantic(
                cursor.line(),
                format!("unknown port '{}' on component '{}'", port, inst_name),
            ));
        }
        Ok(WireEnd {
            inst,
            port: port.to_ascii_lowercase(),
        })
    } else if kind.eq_ignore_ascii_case("coord") {
        let x = cursor.next_num()?;
        let y = cursor.next_num()?;
        let pin = find_or_make_pin(design.cell_mut(cell_id), Point::new(x, y));
        Ok(WireEnd {
            inst: pin,
            port: "wire".to_string(),
        })
    } else if kind.eq_ignore_ascii_case("port") {
        let name = cursor.next_leaf()?;
        let cell = design.cell(cell_id);
        let export = cell.find_export(name).ok_or_else(|| {
            Error::semantic(cursor.line(), format!("unknown port '{}' in net segment", name))
        })?;
        Ok(WireEnd {
            inst: export.inst,
            port: export.port.clone(),
        })
    } else {
        Err(Error::semantic(
            cursor.line(),
            format!("unknown segment keyword '{}'", kind),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::build_primitives;
    use crate::sexpr::read_str;

    const ARCH: &str = "\
(primdef
  (attributes (name buf) (size 4 4))
  (ports
    (port (name a) (position 0 2))
    (port (name b) (position 4 2)))
  (nets (net (name thru) (segment port a port b))))
(blockdef
  (attributes (name tile) (size 40 40))
  (components
    (instance (name b0) (type buf) (position 10 10)))
  (ports
    (port (name west) (position 0 12)))
  (nets
    (net (segment port west component b0 a))))
(architecture
  (attributes (name chip))
  (components
    (instance (name t0) (type tile) (position 0 0))))
";

    fn build(src: &str) -> (Design, CellId) {
        let top = read_str(src).unwrap();
        let catalog = build_primitives(&top).unwrap();
        let mut design = Design::new();
        let arch = build_cells(&top, &catalog, &mut design).unwrap();
        (design, arch)
    }

    #[test]
    fn instances_are_placed_by_center() {
        let (design, arch) = build(ARCH);
        let tile = design.find_cell("tile").unwrap();
        let b0 = design.cell(tile).find_instance("b0").unwrap();
        let inst = design.cell(tile).instance(b0);
        assert_eq!(inst.center, Point::new(12.0, 12.0));
        assert!(matches!(inst.proto, Proto::Prim(_)));

        // Block instances keep their given position.
        let t0 = design.cell(arch).find_instance("t0").unwrap();
        assert_eq!(design.cell(arch).instance(t0).center, Point::new(0.0, 0.0));
    }

    #[test]
    fn cell_size_creates_corner_pins() {
        let (design, _) = build(ARCH);
        let tile = design.cell(design.find_cell("tile").unwrap());
        assert!(tile.pin_at(Point::new(0.5, 0.5)).is_some());
        assert!(tile.pin_at(Point::new(39.5, 39.5)).is_some());
    }

    #[test]
    fn ports_become_exports_backed_by_pins() {
        let (design, _) = build(ARCH);
        let tile = design.cell(design.find_cell("tile").unwrap());
        let west = tile.find_export("WEST").unwrap();
        assert_eq!(tile.instance(west.inst).center, Point::new(0.0, 12.0));
        // The net ties the export's pin to b0's port a.
        let b0 = tile.find_instance("b0").unwrap();
        assert!(tile
            .wires
            .iter()
            .any(|w| w.ends.contains(&WireEnd { inst: west.inst, port: "wire".into() })
                && w.ends.contains(&WireEnd { inst: b0, port: "a".into() })));
    }

    #[test]
    fn missing_architecture_is_rejected() {
        let top = read_str("(blockdef (attributes (name lonely)))").unwrap();
        let catalog = build_primitives(&top).unwrap();
        let mut design = Design::new();
        assert!(build_cells(&top, &catalog, &mut design).is_err());
    }

    #[test]
    fn unknown_block_type_is_rejected() {
        let src = "(architecture (attributes (name chip)) (components (instance (name x) (type nosuch) (position 0 0))))";
        let top = read_str(src).unwrap();
        let catalog = build_primitives(&top).unwrap();
        let mut design = Design::new();
        let err = build_cells(&top, &catalog, &mut design).unwrap_err();
        assert!(err.to_string().contains("cannot find block type"));
    }
}
