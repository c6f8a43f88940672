use std::env;
use std::path::Path;

fn main() {
    println!("rerun-if-changed=build.rs");
    string_cache_codegen::AtomType::new("atom::Atom", "atom!")
        .atoms(&[
            "top",
            "primdef",
            "blockdef",
            "architecture",
            "attributes",
            "name",
            "size",
            "ports",
            "port",
            "position",
            "direction",
            "nets",
            "net",
            "segment",
            "components",
            "pip",
            "connectivity",
            "instance",
            "type",
            "rotation",
            "repeater",
            "porta",
            "portb",
        ])
        .write_to_file(&Path::new(&env::var("OUT_DIR").unwrap()).join("fpga_atom.rs"))
        .unwrap()
}
