//! Fixed technology data: layers, built-in node sizes, and display options.

/// One unit of cell coordinates in nanometers.
pub const SCALE_NANOMETERS: f64 = 2000.0;

/// Default width and height of a wire pin node.
pub const WIRE_PIN_SIZE: (f64, f64) = (1.0, 1.0);

/// Default width and height of a pip node.
pub const PIP_NODE_SIZE: (f64, f64) = (2.0, 2.0);

/// Default width and height of a repeater node.
pub const REPEATER_SIZE: (f64, f64) = (10.0, 3.0);

/// The drawing layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Wire,
    Component,
    Pip,
    Repeater,
}

impl LayerKind {
    pub fn name(self) -> &'static str {
        match self {
            LayerKind::Wire => "Wire",
            LayerKind::Component => "Component",
            LayerKind::Pip => "Pip",
            LayerKind::Repeater => "Repeater",
        }
    }

    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            LayerKind::Wire => (255, 0, 0),
            LayerKind::Component => (0, 0, 0),
            LayerKind::Pip => (0, 255, 0),
            LayerKind::Repeater => (0, 0, 255),
        }
    }
}

/// The single arc kind used to draw wires between ports.
#[derive(Debug, Clone, Copy)]
pub struct ArcInfo {
    pub name: &'static str,
    pub layer: LayerKind,
    /// Permitted routing angles, in degrees.
    pub angle_increment: i32,
    pub fixed_angle: bool,
}

pub const WIRE_ARC: ArcInfo = ArcInfo {
    name: "wire",
    layer: LayerKind::Wire,
    angle_increment: 45,
    fixed_angle: true,
};

/// How much of a primitive's internals to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayLevel {
    /// Primitive outlines only.
    Nothing,
    /// Draw only the wires and pips that are programmed active.
    ActiveOnly,
    /// Draw every internal wire regardless of programming.
    Everything,
}

impl Default for DisplayLevel {
    fn default() -> DisplayLevel {
        DisplayLevel::ActiveOnly
    }
}

/// Options consulted when generating shapes.
#[derive(Debug, Clone, Copy)]
pub struct DisplayOptions {
    pub level: DisplayLevel,
    /// Draw primitive name labels.
    pub text: bool,
}

impl Default for DisplayOptions {
    fn default() -> DisplayOptions {
        DisplayOptions {
            level: DisplayLevel::default(),
            text: true,
        }
    }
}
