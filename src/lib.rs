//! Reader and evaluator for FPGA architecture files.
//!
//! An architecture file defines primitives (`primdef`), block cells
//! (`blockdef`), and a single top-level `architecture` cell. This crate
//! parses the file, builds the placed design, and evaluates the
//! programming attributes that decide which pips, nets, and wires are
//! active in a given hierarchical context.

#[macro_use]
#[allow(dead_code, clippy::all)]
mod atom {
    include!(concat!(env!("OUT_DIR"), "/fpga_atom.rs"));
}

pub use crate::atom::Atom;

pub mod db;
pub mod error;
pub mod eval;
pub mod geom;
pub mod layout;
pub mod primitive;
pub mod sexpr;
pub mod shapes;
pub mod tech;
