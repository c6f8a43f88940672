//! Evaluates programming attributes: which pips are active in a given
//! hierarchical context, and which nets and wires carry a signal.
//!
//! Programming lives in instance attributes. `FPGA_activepips` on an
//! instance lists pip names, each optionally prefixed by an instance path
//! (`inner.deeper.pipname`) that selects a primitive below the annotated
//! instance. `FPGA_activerepeaters` lists repeater instance names.

use crate::db::{
    CellNetlist, Context, Design, InstId, Proto, WireEnd, WireId, ACTIVE_PIPS_KEY,
    ACTIVE_REPEATERS_KEY,
};
use crate::primitive::PrimitiveDefinition;
use crate::tech::DisplayLevel;
use fxhash::FxHashSet;
use std::rc::Rc;

/// Longest instance path considered when matching annotated programming.
const MAX_PATH: usize = 100;

/// Per-query activity of one primitive instance in one context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Activity {
    pub net_active: Vec<bool>,
    pub net_saved: Vec<bool>,
    pub pip_active: Vec<bool>,
    pub pip_saved: Vec<bool>,
}

impl Activity {
    pub fn cleared(def: &PrimitiveDefinition) -> Activity {
        Activity {
            net_active: vec![false; def.nets.len()],
            net_saved: vec![false; def.nets.len()],
            pip_active: vec![false; def.pips.len()],
            pip_saved: vec![false; def.pips.len()],
        }
    }

    /// Copies the active bits into the saved bits.
    pub fn save(&mut self) {
        self.net_saved.copy_from_slice(&self.net_active);
        self.pip_saved.copy_from_slice(&self.pip_active);
    }
}

pub struct Evaluator<'a> {
    design: &'a Design,
}

impl<'a> Evaluator<'a> {
    pub fn new(design: &'a Design) -> Evaluator<'a> {
        Evaluator { design }
    }

    /// Walks the ancestry of `inst` in `ctx` looking for `key`, and calls
    /// `on_match` with the final token component for each entry whose
    /// instance path selects `inst`. Only the innermost annotated
    /// ancestor is consulted.
    fn programmed_names(
        &self,
        ctx: &Context,
        inst: InstId,
        key: &str,
        mut on_match: impl FnMut(&str),
    ) {
        let cell = ctx.cell(self.design);
        let queried = self.design.cell(cell).instance(inst);
        let mut path = vec![queried];
        path.extend(ctx.frames(self.design));
        path.truncate(MAX_PATH);

        for (c, frame) in path.iter().enumerate() {
            let value = match frame.attributes.get(key) {
                Some(v) => v,
                None => continue,
            };
            for token in value.split_whitespace() {
                let mut parts: Vec<&str> = token.split('.').collect();
                let last = match parts.pop() {
                    Some(l) => l,
                    None => continue,
                };
                // The dotted prefix, read deepest-first, must name the
                // chain of instances from the queried one up to (not
                // including) the annotated ancestor.
                if parts.len() != c {
                    continue;
                }
                let matches = parts.iter().rev().zip(path[..c].iter()).all(|(part, p)| {
                    p.name
                        .as_deref()
                        .map_or(false, |n| n.eq_ignore_ascii_case(part))
                });
                if matches {
                    on_match(last);
                }
            }
            // Outer annotations are shadowed by this one.
            break;
        }
    }

    /// Which pips and internal nets of the primitive `inst` are switched
    /// on by the programming visible in `ctx`.
    pub fn pip_activity(&self, ctx: &Context, inst: InstId) -> Activity {
        let cell = ctx.cell(self.design);
        let def = match &self.design.cell(cell).instance(inst).proto {
            Proto::Prim(def) => Rc::clone(def),
            _ => return Activity::default(),
        };
        let mut activity = Activity::cleared(&def);

        self.programmed_names(ctx, inst, ACTIVE_PIPS_KEY, |name| {
            if let Some(k) = def
                .pips
                .iter()
                .position(|p| p.name.eq_ignore_ascii_case(name))
            {
                activity.pip_active[k] = true;
            }
        });

        for (k, pip) in def.pips.iter().enumerate() {
            if !activity.pip_active[k] {
                continue;
            }
            if let Some(n) = pip.con1 {
                activity.net_active[n] = true;
            }
            if let Some(n) = pip.con2 {
                activity.net_active[n] = true;
            }
        }
        activity
    }

    /// Activity with the saved bits filled in for the given display
    /// level. `ActiveOnly` additionally marks nets that pick up a signal
    /// from neighbors or from the enclosing cell.
    pub fn display_activity(&self, ctx: &Context, inst: InstId, level: DisplayLevel) -> Activity {
        let cell = ctx.cell(self.design);
        let def = match &self.design.cell(cell).instance(inst).proto {
            Proto::Prim(def) => Rc::clone(def),
            _ => return Activity::default(),
        };
        match level {
            DisplayLevel::Nothing => Activity::cleared(&def),
            DisplayLevel::Everything => {
                let mut activity = Activity::cleared(&def);
                for saved in &mut activity.net_saved {
                    *saved = true;
                }
                activity
            }
            DisplayLevel::ActiveOnly => {
                let mut activity = self.pip_activity(ctx, inst);
                activity.save();
                for (n, _) in def.nets.iter().enumerate() {
                    if activity.net_saved[n] {
                        continue;
                    }
                    if self.net_fed_externally(ctx, inst, &def, n) {
                        activity.net_saved[n] = true;
                    }
                }
                activity
            }
        }
    }

    /// True if internal net `n` of primitive `inst` receives a signal
    /// through one of its ports from the surrounding cell.
    fn net_fed_externally(
        &self,
        ctx: &Context,
        inst: InstId,
        def: &PrimitiveDefinition,
        n: usize,
    ) -> bool {
        let cell = ctx.cell(self.design);
        for port in def.ports.iter().filter(|p| p.con == Some(n)) {
            for (wid, wire) in self.design.cell(cell).wires_on(inst) {
                for (e, end) in wire.ends.iter().enumerate() {
                    if end.inst != inst || !end.port.eq_ignore_ascii_case(&port.name) {
                        continue;
                    }
                    let far = 1 - e;
                    let mut seen = FxHashSet::default();
                    if self.wire_end_active(ctx, wid, far, &mut seen) {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// True if the wire carries a signal in `ctx`. Each end is probed
    /// independently.
    pub fn wire_active(&self, ctx: &Context, wid: WireId) -> bool {
        let mut seen = FxHashSet::default();
        if self.wire_end_active(ctx, wid, 0, &mut seen) {
            return true;
        }
        let mut seen = FxHashSet::default();
        self.wire_end_active(ctx, wid, 1, &mut seen)
    }

    /// True if end `end` of wire `wid` is driven: directly by a pip in
    /// the primitive it lands on, by another wire on the same net, or by
    /// the enclosing cell through an export. Revisited endpoints are
    /// inactive, which makes cycles terminate.
    fn wire_end_active(
        &self,
        ctx: &Context,
        wid: WireId,
        end: usize,
        seen: &mut FxHashSet<(Context, WireId, usize)>,
    ) -> bool {
        if !seen.insert((ctx.clone(), wid, end)) {
            return false;
        }
        let cell_id = ctx.cell(self.design);
        let cell = self.design.cell(cell_id);
        let WireEnd { inst, ref port } = cell.wires[wid.0].ends[end];

        match &cell.instance(inst).proto {
            // Descend into the block and keep following from the export's
            // pin.
            Proto::Block(child) => {
                let inner = ctx.push(inst);
                if let Some(export) = self.design.cell(*child).find_export(port) {
                    let pin = export.inst;
                    let child_cell = self.design.cell(*child);
                    for (inner_wid, wire) in child_cell.wires_on(pin) {
                        for (e, inner_end) in wire.ends.iter().enumerate() {
                            if inner_end.inst != pin {
                                continue;
                            }
                            if self.wire_end_active(&inner, inner_wid, 1 - e, seen) {
                                return true;
                            }
                        }
                    }
                }
                false
            }
            Proto::Prim(def) => {
                let def = Rc::clone(def);
                let activity = self.pip_activity(ctx, inst);
                if let Some(i) = def.port_index(port) {
                    if let Some(n) = def.ports[i].con {
                        if activity.net_active[n] {
                            return true;
                        }
                    }
                }
                self.propagated_active(ctx, wid, end, seen)
            }
            _ => self.propagated_active(ctx, wid, end, seen),
        }
    }

    /// Follows the endpoint's cell-level net sideways to other wires and
    /// upward through exports to the enclosing cell.
    fn propagated_active(
        &self,
        ctx: &Context,
        wid: WireId,
        end: usize,
        seen: &mut FxHashSet<(Context, WireId, usize)>,
    ) -> bool {
        let cell_id = ctx.cell(self.design);
        let cell = self.design.cell(cell_id);
        let here = &cell.wires[wid.0].ends[end];
        let netlist = CellNetlist::build(self.design, cell_id);
        let net = match netlist.net_of(here.inst, &here.port) {
            Some(n) => n,
            None => return false,
        };

        // Sideways: other wires whose endpoint shares this net.
        for (other_wid, wire) in cell.wires.iter().enumerate() {
            let other_wid = WireId(other_wid);
            if other_wid == wid {
                continue;
            }
            for (e, other_end) in wire.ends.iter().enumerate() {
                if netlist.net_of(other_end.inst, &other_end.port) != Some(net) {
                    continue;
                }
                if self.wire_end_active(ctx, other_wid, 1 - e, seen) {
                    return true;
                }
            }
        }

        // Upward: if an export of this cell is on the net, follow the
        // wires attached to the corresponding port in the parent.
        if let Some((parent_ctx, hop)) = ctx.pop() {
            let parent_cell = self.design.cell(parent_ctx.cell(self.design));
            for export in &cell.exports {
                if netlist.net_of(export.inst, &export.port) != Some(net) {
                    continue;
                }
                for (up_wid, wire) in parent_cell.wires_on(hop) {
                    for (e, up_end) in wire.ends.iter().enumerate() {
                        if up_end.inst != hop
                            || !up_end.port.eq_ignore_ascii_case(&export.name)
                        {
                            continue;
                        }
                        if self.wire_end_active(&parent_ctx, up_wid, 1 - e, seen) {
                            return true;
                        }
                    }
                }
            }
        }
        false
    }

    /// True if the repeater instance is listed in the programming visible
    /// in `ctx`.
    pub fn repeater_active(&self, ctx: &Context, inst: InstId) -> bool {
        let cell = ctx.cell(self.design);
        let inst_name = match &self.design.cell(cell).instance(inst).name {
            Some(n) => n.clone(),
            None => return false,
        };
        let mut active = false;
        self.programmed_names(ctx, inst, ACTIVE_REPEATERS_KEY, |name| {
            if name.eq_ignore_ascii_case(&inst_name) {
                active = true;
            }
        });
        active
    }
}
