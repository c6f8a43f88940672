//! The placed design: cells, instances, wires, and exports, plus the
//! hierarchical context used when evaluating programming.

use crate::geom::Point;
use crate::primitive::PrimitiveDefinition;
use fxhash::FxHashMap;
use petgraph::unionfind::UnionFind;
use std::rc::Rc;

/// Attribute key holding the space-separated list of programmed pips.
pub const ACTIVE_PIPS_KEY: &str = "FPGA_activepips";

/// Attribute key holding the space-separated list of programmed repeaters.
pub const ACTIVE_REPEATERS_KEY: &str = "FPGA_activerepeaters";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WireId(pub usize);

/// What an instance is an instance of.
#[derive(Debug, Clone)]
pub enum Proto {
    /// A primitive from the architecture's catalog.
    Prim(Rc<PrimitiveDefinition>),
    /// A built-in connection pin for wires.
    WirePin,
    /// A built-in standalone pip node.
    PipNode,
    /// A built-in repeater.
    Repeater,
    /// Another cell of the design.
    Block(CellId),
}

impl Proto {
    pub fn is_block(&self) -> bool {
        matches!(self, Proto::Block(_))
    }
}

/// A placed instance inside a cell. `center` is in cell coordinates and
/// `rotation` in tenth-degrees counterclockwise.
#[derive(Debug, Clone)]
pub struct Instance {
    pub name: Option<String>,
    pub proto: Proto,
    pub center: Point,
    pub width: f64,
    pub height: f64,
    pub rotation: i32,
    pub attributes: FxHashMap<String, String>,
}

impl Instance {
    /// A wire pin placed at `center`.
    pub fn pin(center: Point, width: f64, height: f64) -> Instance {
        Instance {
            name: None,
            proto: Proto::WirePin,
            center,
            width,
            height,
            rotation: 0,
            attributes: FxHashMap::default(),
        }
    }
}

/// One endpoint of a wire. Port names are stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireEnd {
    pub inst: InstId,
    pub port: String,
}

#[derive(Debug, Clone)]
pub struct Wire {
    pub ends: [WireEnd; 2],
}

/// A port of a cell, re-exporting a port of one of its instances.
#[derive(Debug, Clone)]
pub struct Export {
    pub name: String,
    pub inst: InstId,
    pub port: String,
}

#[derive(Debug, Default)]
pub struct Cell {
    pub name: String,
    pub instances: Vec<Instance>,
    pub wires: Vec<Wire>,
    pub exports: Vec<Export>,
    pub properties: FxHashMap<String, String>,
}

impl Cell {
    pub fn new(name: impl Into<String>) -> Cell {
        Cell {
            name: name.into(),
            ..Cell::default()
        }
    }

    pub fn add_instance(&mut self, inst: Instance) -> InstId {
        self.instances.push(inst);
        InstId(self.instances.len() - 1)
    }

    pub fn add_wire(&mut self, a: WireEnd, b: WireEnd) -> WireId {
        self.wires.push(Wire { ends: [a, b] });
        WireId(self.wires.len() - 1)
    }

    pub fn instance(&self, id: InstId) -> &Instance {
        &self.instances[id.0]
    }

    pub fn instance_mut(&mut self, id: InstId) -> &mut Instance {
        &mut self.instances[id.0]
    }

    pub fn find_instance(&self, name: &str) -> Option<InstId> {
        self.instances
            .iter()
            .position(|i| {
                i.name
                    .as_deref()
                    .map_or(false, |n| n.eq_ignore_ascii_case(name))
            })
            .map(InstId)
    }

    pub fn find_export(&self, name: &str) -> Option<&Export> {
        self.exports
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// An existing wire pin at exactly `at`, if one has been placed.
    pub fn pin_at(&self, at: Point) -> Option<InstId> {
        self.instances
            .iter()
            .position(|i| matches!(i.proto, Proto::WirePin) && i.center == at)
            .map(InstId)
    }

    /// All wires with an end on `inst`.
    pub fn wires_on(&self, inst: InstId) -> impl Iterator<Item = (WireId, &Wire)> {
        self.wires
            .iter()
            .enumerate()
            .filter(move |(_, w)| w.ends.iter().any(|e| e.inst == inst))
            .map(|(i, w)| (WireId(i), w))
    }
}

/// All cells of one architecture.
#[derive(Debug, Default)]
pub struct Design {
    pub cells: Vec<Cell>,
    pub top: Option<CellId>,
}

impl Design {
    pub fn new() -> Design {
        Design::default()
    }

    pub fn add_cell(&mut self, cell: Cell) -> CellId {
        self.cells.push(cell);
        CellId(self.cells.len() - 1)
    }

    pub fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id.0]
    }

    pub fn cell_mut(&mut self, id: CellId) -> &mut Cell {
        &mut self.cells[id.0]
    }

    pub fn find_cell(&self, name: &str) -> Option<CellId> {
        self.cells
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
            .map(CellId)
    }

    /// Lowercased names of the ports a proto offers for wiring.
    pub fn port_names(&self, proto: &Proto) -> Vec<String> {
        match proto {
            Proto::Prim(def) => def
                .ports
                .iter()
                .map(|p| p.name.to_ascii_lowercase())
                .collect(),
            Proto::WirePin => vec!["wire".to_string()],
            Proto::PipNode => vec!["pip".to_string()],
            Proto::Repeater => vec!["a".to_string(), "b".to_string()],
            Proto::Block(cell) => self
                .cell(*cell)
                .exports
                .iter()
                .map(|e| e.name.to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn port_exists(&self, proto: &Proto, port: &str) -> bool {
        self.port_names(proto)
            .iter()
            .any(|n| n.eq_ignore_ascii_case(port))
    }
}

/// A point in the instance hierarchy: the root cell plus the chain of
/// block instances descended through, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Context {
    pub root: CellId,
    pub hops: Vec<InstId>,
}

impl Context {
    pub fn top(root: CellId) -> Context {
        Context {
            root,
            hops: Vec::new(),
        }
    }

    pub fn push(&self, inst: InstId) -> Context {
        let mut hops = self.hops.clone();
        hops.push(inst);
        Context {
            root: self.root,
            hops,
        }
    }

    /// The enclosing context, with the block instance that was descended
    /// into. `None` at the root.
    pub fn pop(&self) -> Option<(Context, InstId)> {
        let (&last, parents) = self.hops.split_last()?;
        Some((
            Context {
                root: self.root,
                hops: parents.to_vec(),
            },
            last,
        ))
    }

    /// The cell this context is inside.
    pub fn cell(&self, design: &Design) -> CellId {
        let mut cell = self.root;
        for &hop in &self.hops {
            match design.cell(cell).instance(hop).proto {
                Proto::Block(child) => cell = child,
                _ => break,
            }
        }
        cell
    }

    /// The instances along the descent, deepest first.
    pub fn frames<'d>(&self, design: &'d Design) -> Vec<&'d Instance> {
        let mut cell = self.root;
        let mut frames = Vec::with_capacity(self.hops.len());
        for &hop in &self.hops {
            let inst = design.cell(cell).instance(hop);
            frames.push(inst);
            match inst.proto {
                Proto::Block(child) => cell = child,
                _ => break,
            }
        }
        frames.reverse();
        frames
    }
}

/// Connectivity of one cell: every `(instance, port)` endpoint mapped to
/// a net label. Wires merge their two ends; a primitive's ports that
/// share an internal net are merged too.
pub struct CellNetlist {
    index: FxHashMap<(InstId, String), usize>,
    labels: Vec<usize>,
}

impl CellNetlist {
    pub fn build(design: &Design, cell_id: CellId) -> CellNetlist {
        let cell = design.cell(cell_id);
        let mut index = FxHashMap::default();
        for (i, inst) in cell.instances.iter().enumerate() {
            for port in design.port_names(&inst.proto) {
                let next = index.len();
                index.entry((InstId(i), port)).or_insert(next);
            }
        }
        // Wires can name ports the proto does not declare; give those
        // endpoints labels too.
        for wire in &cell.wires {
            for end in &wire.ends {
                let next = index.len();
                index
                    .entry((end.inst, end.port.clone()))
                    .or_insert(next);
            }
        }

        let mut uf = UnionFind::<usize>::new(index.len());
        for (i, inst) in cell.instances.iter().enumerate() {
            if let Proto::Prim(def) = &inst.proto {
                // Ports of the same internal net are one node here.
                let mut first: FxHashMap<usize, usize> = FxHashMap::default();
                for port in &def.ports {
                    let con = match port.con {
                        Some(c) => c,
                        None => continue,
                    };
                    let key = (InstId(i), port.name.to_ascii_lowercase());
                    let label = index[&key];
                    match first.get(&con) {
                        Some(&other) => {
                            uf.union(label, other);
                        }
                        None => {
                            first.insert(con, label);
                        }
                    }
                }
            }
        }
        for wire in &cell.wires {
            let a = index[&(wire.ends[0].inst, wire.ends[0].port.clone())];
            let b = index[&(wire.ends[1].inst, wire.ends[1].port.clone())];
            uf.union(a, b);
        }

        let labels = (0..index.len()).map(|i| uf.find(i)).collect();
        CellNetlist { index, labels }
    }

    pub fn net_of(&self, inst: InstId, port: &str) -> Option<usize> {
        self.index
            .get(&(inst, port.to_ascii_lowercase()))
            .map(|&i| self.labels[i])
    }
}
