//! Turns placed instances and wires into drawable polygons, honoring the
//! display level and the programming of the queried context.

use crate::db::{Context, Design, InstId, Proto, WireId};
use crate::eval::Evaluator;
use crate::geom::Point;
use crate::tech::{DisplayLevel, DisplayOptions, LayerKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolyStyle {
    /// Filled polygon (or thick line for two points).
    Filled,
    /// Closed outline.
    Closed,
    /// Open polyline.
    Opened,
    /// Filled circle given by center and edge.
    Disc,
    /// Text label centered on the single point.
    Text,
}

#[derive(Debug, Clone)]
pub struct Poly {
    pub points: Vec<Point>,
    pub style: PolyStyle,
    pub layer: LayerKind,
    pub text: Option<String>,
}

impl Poly {
    fn new(points: Vec<Point>, style: PolyStyle, layer: LayerKind) -> Poly {
        Poly {
            points,
            style,
            layer,
            text: None,
        }
    }

    fn box_at(center: Point, width: f64, height: f64, style: PolyStyle, layer: LayerKind) -> Poly {
        let hw = width / 2.0;
        let hh = height / 2.0;
        Poly::new(
            vec![
                Point::new(center.x - hw, center.y - hh),
                Point::new(center.x + hw, center.y - hh),
                Point::new(center.x + hw, center.y + hh),
                Point::new(center.x - hw, center.y + hh),
            ],
            style,
            layer,
        )
    }
}

pub struct ShapeGenerator<'a> {
    design: &'a Design,
    options: DisplayOptions,
}

impl<'a> ShapeGenerator<'a> {
    pub fn new(design: &'a Design, options: DisplayOptions) -> ShapeGenerator<'a> {
        ShapeGenerator { design, options }
    }

    /// The polygons drawn for instance `inst` of the cell `ctx` is in.
    pub fn shape_of_node(&self, ctx: &Context, inst: InstId) -> Vec<Poly> {
        let cell = self.design.cell(ctx.cell(self.design));
        let instance = cell.instance(inst);
        let eval = Evaluator::new(self.design);
        match &instance.proto {
            Proto::WirePin => {
                // Pins vanish once a wire lands on them.
                if cell.wires_on(inst).next().is_some() {
                    return Vec::new();
                }
                vec![Poly::new(
                    vec![
                        instance.center,
                        instance.center + Point::new(instance.width / 2.0, 0.0),
                    ],
                    PolyStyle::Disc,
                    LayerKind::Wire,
                )]
            }
            Proto::PipNode => vec![Poly::box_at(
                instance.center,
                instance.width,
                instance.height,
                PolyStyle::Filled,
                LayerKind::Pip,
            )],
            Proto::Repeater => {
                if self.options.level == DisplayLevel::ActiveOnly
                    && !eval.repeater_active(ctx, inst)
                {
                    return Vec::new();
                }
                vec![Poly::box_at(
                    instance.center,
                    instance.width,
                    instance.height,
                    PolyStyle::Filled,
                    LayerKind::Repeater,
                )]
            }
            Proto::Block(_) => Vec::new(),
            Proto::Prim(def) => {
                let mut polys = vec![Poly::box_at(
                    instance.center,
                    instance.width,
                    instance.height,
                    PolyStyle::Closed,
                    LayerKind::Component,
                )];
                let activity = eval.display_activity(ctx, inst, self.options.level);
                for (k, pip) in def.pips.iter().enumerate() {
                    if !activity.pip_saved.get(k).copied().unwrap_or(false) {
                        continue;
                    }
                    polys.push(Poly::box_at(
                        instance.center + pip.pos,
                        2.0,
                        2.0,
                        PolyStyle::Filled,
                        LayerKind::Pip,
                    ));
                }
                for (n, net) in def.nets.iter().enumerate() {
                    if !activity.net_saved.get(n).copied().unwrap_or(false) {
                        continue;
                    }
                    for seg in &net.segments {
                        polys.push(Poly::new(
                            vec![instance.center + seg.from, instance.center + seg.to],
                            PolyStyle::Opened,
                            LayerKind::Wire,
                        ));
                    }
                }
                if self.options.text {
                    if let Some(name) = &instance.name {
                        let mut label =
                            Poly::new(vec![instance.center], PolyStyle::Text, LayerKind::Component);
                        label.text = Some(name.clone());
                        polys.push(label);
                    }
                }
                polys
            }
        }
    }

    /// The polygon drawn for wire `wid`, or nothing when the display
    /// level hides inactive wires.
    pub fn shape_of_wire(&self, ctx: &Context, wid: WireId) -> Vec<Poly> {
        match self.options.level {
            DisplayLevel::Nothing => return Vec::new(),
            DisplayLevel::ActiveOnly => {
                let eval = Evaluator::new(self.design);
                if !eval.wire_active(ctx, wid) {
                    return Vec::new();
                }
            }
            DisplayLevel::Everything => {}
        }
        let cell = self.design.cell(ctx.cell(self.design));
        let wire = &cell.wires[wid.0];
        let points = wire
            .ends
            .iter()
            .map(|end| {
                let instance = cell.instance(end.inst);
                match &instance.proto {
                    Proto::Prim(def) => match def.port_index(&end.port) {
                        Some(i) => {
                            instance.center + def.ports[i].pos.rotated(instance.rotation)
                        }
                        None => instance.center,
                    },
                    _ => instance.center,
                }
            })
            .collect();
        vec![Poly::new(points, PolyStyle::Filled, LayerKind::Wire)]
    }
}
