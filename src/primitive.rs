//! Primitive definitions: the leaf blocks of an architecture, with their
//! ports, internal nets, and programmable pips.

use crate::error::{Error, Result};
use crate::geom::Point;
use crate::sexpr::{Cursor, LispTree};
use fxhash::FxHashMap;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
    Bidir,
    Unknown,
}

/// A connection point on the boundary of a primitive.
#[derive(Debug, Clone)]
pub struct PrimPort {
    pub name: String,
    /// Offset from the primitive's center.
    pub pos: Point,
    pub direction: PortDirection,
    /// Index of the internal net this port touches, if any segment of a
    /// net ends at the port's position.
    pub con: Option<usize>,
}

/// One straight piece of an internal net.
#[derive(Debug, Clone, Copy)]
pub struct Segment {
    pub from: Point,
    pub to: Point,
}

/// An internal net: a named bundle of segments inside a primitive.
#[derive(Debug, Clone)]
pub struct PrimNet {
    pub name: Option<String>,
    pub segments: Vec<Segment>,
}

/// A programmable connection between two internal nets.
#[derive(Debug, Clone)]
pub struct PrimPip {
    pub name: String,
    /// Offset from the primitive's center.
    pub pos: Point,
    pub con1: Option<usize>,
    pub con2: Option<usize>,
}

#[derive(Debug)]
pub struct PrimitiveDefinition {
    pub name: String,
    pub width: f64,
    pub height: f64,
    pub ports: Vec<PrimPort>,
    pub nets: Vec<PrimNet>,
    pub pips: Vec<PrimPip>,
}

impl PrimitiveDefinition {
    pub fn port_index(&self, name: &str) -> Option<usize> {
        self.ports.iter().position(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn pip(&self, name: &str) -> Option<&PrimPip> {
        self.pips.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

/// All primitive definitions of one architecture, indexed by lowercased
/// name.
#[derive(Debug, Default)]
pub struct PrimitiveCatalog {
    defs: Vec<Rc<PrimitiveDefinition>>,
    by_name: FxHashMap<String, usize>,
}

impl PrimitiveCatalog {
    pub fn insert(&mut self, def: PrimitiveDefinition) -> bool {
        let key = def.name.to_ascii_lowercase();
        if self.by_name.contains_key(&key) {
            return false;
        }
        self.by_name.insert(key, self.defs.len());
        self.defs.push(Rc::new(def));
        true
    }

    pub fn find(&self, name: &str) -> Option<&Rc<PrimitiveDefinition>> {
        self.by_name
            .get(&name.to_ascii_lowercase())
            .map(|&i| &self.defs[i])
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<PrimitiveDefinition>> {
        self.defs.iter()
    }
}

/// Splits a definition's children into its known sections, rejecting
/// duplicates. Sections that do not apply to `what` stay `None`.
pub(crate) struct Sections<'t> {
    pub attributes: Option<&'t LispTree>,
    pub ports: Option<&'t LispTree>,
    pub nets: Option<&'t LispTree>,
    pub components: Option<&'t LispTree>,
}

pub(crate) fn scan_sections<'t>(tree: &'t LispTree, what: &str) -> Result<Sections<'t>> {
    let mut sections = Sections {
        attributes: None,
        ports: None,
        nets: None,
        components: None,
    };
    for sub in tree.branches() {
        let slot = if sub.keyword == atom!("attributes") {
            &mut sections.attributes
        } else if sub.keyword == atom!("ports") {
            &mut sections.ports
        } else if sub.keyword == atom!("nets") {
            &mut sections.nets
        } else if sub.keyword == atom!("components") {
            &mut sections.components
        } else {
            continue;
        };
        if slot.is_some() {
            return Err(Error::semantic(
                sub.line,
                format!("multiple '{}' sections for a {}", sub.keyword, what),
            ));
        }
        *slot = Some(sub);
    }
    Ok(sections)
}

/// Builds the catalog from every `primdef` section under `top`.
pub fn build_primitives(top: &LispTree) -> Result<PrimitiveCatalog> {
    let mut catalog = PrimitiveCatalog::default();
    for sub in top.branches() {
        if sub.keyword != atom!("primdef") {
            continue;
        }
        let def = build_primitive(sub)?;
        let line = sub.line;
        let name = def.name.clone();
        if !catalog.insert(def) {
            return Err(Error::semantic(
                line,
                format!("duplicate primitive definition '{}'", name),
            ));
        }
        tracing::debug!("defined primitive '{}'", name);
    }
    Ok(catalog)
}

fn build_primitive(tree: &LispTree) -> Result<PrimitiveDefinition> {
    let sections = scan_sections(tree, "primitive definition")?;

    let mut name = None;
    let mut size = None;
    if let Some(attrs) = sections.attributes {
        for attr in attrs.branches() {
            if attr.keyword == atom!("name") {
                name = Some(attr.single_leaf()?.to_string());
            } else if attr.keyword == atom!("size") {
                size = Some(attr.num_pair()?);
            }
        }
    }
    let name = name.ok_or_else(|| {
        Error::semantic(tree.line, "missing 'name' attribute in primitive definition")
    })?;
    let (width, height) = size.ok_or_else(|| {
        Error::semantic(tree.line, "missing 'size' attribute in primitive definition")
    })?;

    let mut ports = Vec::new();
    if let Some(section) = sections.ports {
        for sub in section.branches() {
            if sub.keyword != atom!("port") {
                continue;
            }
            let port = build_port(sub, width, height)?;
            if ports.iter().any(|p: &PrimPort| p.name.eq_ignore_ascii_case(&port.name)) {
                return Err(Error::semantic(
                    sub.line,
                    format!("duplicate port '{}' in primitive '{}'", port.name, name),
                ));
            }
            ports.push(port);
        }
    }

    let mut nets = Vec::new();
    if let Some(section) = sections.nets {
        for sub in section.branches() {
            if sub.keyword != atom!("net") {
                continue;
            }
            nets.push(build_net(sub, &ports, width, height)?);
        }
    }

    // A port is connected to the first net that has a segment ending at
    // the port's position.
    for port in &mut ports {
        port.con = nets.iter().position(|net| {
            net.segments
                .iter()
                .any(|s| s.from == port.pos || s.to == port.pos)
        });
    }

    let mut pips = Vec::new();
    if let Some(section) = sections.components {
        for sub in section.branches() {
            if sub.keyword == atom!("pip") {
                pips.push(build_pip(sub, width, height, &nets)?);
            }
        }
    }

    Ok(PrimitiveDefinition {
        name,
        width,
        height,
        ports,
        nets,
        pips,
    })
}

fn build_port(tree: &LispTree, width: f64, height: f64) -> Result<PrimPort> {
    let mut name = None;
    let mut pos = None;
    let mut direction = PortDirection::Unknown;
    for sub in tree.branches() {
        if sub.keyword == atom!("name") {
            name = Some(sub.single_leaf()?.to_string());
        } else if sub.keyword == atom!("position") {
            let (x, y) = sub.num_pair()?;
            pos = Some(Point::new(x - width / 2.0, y - height / 2.0));
        } else if sub.keyword == atom!("direction") {
            direction = match sub.single_leaf()? {
                s if s.eq_ignore_ascii_case("input") => PortDirection::Input,
                s if s.eq_ignore_ascii_case("output") => PortDirection::Output,
                s if s.eq_ignore_ascii_case("bidir") => PortDirection::Bidir,
                s => {
                    return Err(Error::semantic(
                        sub.line,
                        format!("unknown port direction '{}'", s),
                    ))
                }
            };
        }
    }
    let name = name.ok_or_else(|| Error::semantic(tree.line, "port has no name"))?;
    let pos = pos.ok_or_else(|| {
        Error::semantic(tree.line, format!("port '{}' has no position", name))
    })?;
    Ok(PrimPort {
        name,
        pos,
        direction,
        con: None,
    })
}

fn build_net(tree: &LispTree, ports: &[PrimPort], width: f64, height: f64) -> Result<PrimNet> {
    let mut name = None;
    let mut segments = Vec::new();
    for sub in tree.branches() {
        if sub.keyword == atom!("name") {
            name = Some(sub.single_leaf()?.to_string());
        } else if sub.keyword == atom!("segment") {
            let mut cursor = Cursor::new(sub);
            let from = segment_end(&mut cursor, ports, width, height)?;
            let to = segment_end(&mut cursor, ports, width, height)?;
            segments.push(Segment { from, to });
        }
    }
    Ok(PrimNet { name, segments })
}

/// One endpoint of a net segment: either `coord X Y` in the primitive's
/// corner-anchored units or `port NAME` referring to a declared port.
fn segment_end(cursor: &mut Cursor, ports: &[PrimPort], width: f64, height: f64) -> Result<Point> {
    let kind = cursor.next_leaf()?;
    if kind.eq_ignore_ascii_case("coord") {
        let x = cursor.next_num()?;
        let y = cursor.next_num()?;
        Ok(Point::new(x - width / 2.0, y - height / 2.0))
    } else if kind.eq_ignore_ascii_case("port") {
        let name = cursor.next_leaf()?;
        ports
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.pos)
            .ok_or_else(|| {
                Error::semantic(cursor.line(), format!("unknown port '{}' in net segment", name))
            })
    } else {
        Err(Error::semantic(
            cursor.line(),
            format!("unknown segment keyword '{}'", kind),
        ))
    }
}

fn build_pip(tree: &LispTree, width: f64, height: f64, nets: &[PrimNet]) -> Result<PrimPip> {
    let mut name = None;
    let mut pos = None;
    let mut connectivity = (None, None);
    for sub in tree.branches() {
        if sub.keyword == atom!("name") {
            name = Some(sub.single_leaf()?.to_string());
        } else if sub.keyword == atom!("position") {
            let (x, y) = sub.num_pair()?;
            pos = Some(Point::new(x - width / 2.0, y - height / 2.0));
        } else if sub.keyword == atom!("connectivity") {
            let (a, b) = sub.leaf_pair()?;
            connectivity = (net_index(nets, a), net_index(nets, b));
        }
    }
    let name = name.ok_or_else(|| Error::semantic(tree.line, "pip has no name"))?;
    let pos = pos.ok_or_else(|| {
        Error::semantic(tree.line, format!("pip '{}' has no position", name))
    })?;
    Ok(PrimPip {
        name,
        pos,
        con1: connectivity.0,
        con2: connectivity.1,
    })
}

fn net_index(nets: &[PrimNet], name: &str) -> Option<usize> {
    nets.iter().position(|n| {
        n.name
            .as_deref()
            .map_or(false, |n| n.eq_ignore_ascii_case(name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sexpr::read_str;

    const BUF: &str = "(primdef\n  (attributes (name buf) (size 4 4))\n  (ports\n    (port (name a) (position 0 2) (direction input))\n    (port (name b) (position 4 2) (direction output)))\n  (nets\n    (net (name thru) (segment port a port b))))\n";

    #[test]
    fn ports_are_recentered_and_connected() {
        let top = read_str(BUF).unwrap();
        let catalog = build_primitives(&top).unwrap();
        let def = catalog.find("BUF").unwrap();
        assert_eq!(def.width, 4.0);
        assert_eq!(def.height, 4.0);
        assert_eq!(def.ports[0].pos, Point::new(-2.0, 0.0));
        assert_eq!(def.ports[1].pos, Point::new(2.0, 0.0));
        assert_eq!(def.ports[0].con, Some(0));
        assert_eq!(def.ports[1].con, Some(0));
        assert_eq!(def.ports[0].direction, PortDirection::Input);
        assert_eq!(def.nets[0].segments.len(), 1);
    }

    #[test]
    fn grouped_segment_endpoints_parse() {
        let src = "(primdef (attributes (name \"buf\") (size 4 4))\n  (ports (port (name a) (position 0 0) (direction input))\n         (port (name b) (position 4 0) (direction output)))\n  (nets (net (name n1) (segment (port a) (port b)))))\n";
        let top = read_str(src).unwrap();
        let catalog = build_primitives(&top).unwrap();
        let def = catalog.find("buf").unwrap();
        assert_eq!(def.ports[0].con, Some(0));
        assert_eq!(def.ports[1].con, Some(0));
        let seg = def.nets[0].segments[0];
        assert_eq!(seg.from, Point::new(-2.0, -2.0));
        assert_eq!(seg.to, Point::new(2.0, -2.0));
    }

    #[test]
    fn pip_connectivity_resolves_net_names() {
        let src = "(primdef\n  (attributes (name xbar) (size 10 10))\n  (ports\n    (port (name in1) (position 0 5))\n    (port (name top1) (position 5 10)))\n  (components\n    (pip (name p1) (position 5 5) (connectivity H V)))\n  (nets\n    (net (name h) (segment port in1 coord 0 0))\n    (net (name v) (segment port top1 coord 0 0))))\n";
        let top = read_str(src).unwrap();
        let catalog = build_primitives(&top).unwrap();
        let def = catalog.find("xbar").unwrap();
        let pip = def.pip("P1").unwrap();
        assert_eq!(pip.pos, Point::new(0.0, 0.0));
        assert_eq!(pip.con1, Some(0));
        assert_eq!(pip.con2, Some(1));
    }

    #[test]
    fn missing_size_is_rejected() {
        let src = "(primdef (attributes (name bad)))";
        let top = read_str(src).unwrap();
        let err = build_primitives(&top).unwrap_err();
        assert!(matches!(err, Error::Semantic { line: 1, .. }));
    }

    #[test]
    fn duplicate_primitive_name_is_rejected() {
        let src = format!("{}{}", BUF, BUF);
        let top = read_str(&src).unwrap();
        assert!(build_primitives(&top).is_err());
    }
}
