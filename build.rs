extern crate protobuf_codegen_pure;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

const MOD: &[u8] = b"
pub use self::cast_channel::*;

mod cast_channel;
";

fn main() {
    println!("cargo:rerun-if-changed=proto/cast_channel.proto");
    let generated = "src/proto/cast_channel.rs";

    fs::create_dir_all("src/proto").expect("Failed to create src/proto");
    protobuf_codegen_pure::Codegen::new()
        .out_dir("src/proto")
        .inputs(&["proto/cast_channel.proto"])
        .include("proto")
        .run()
        .expect("protoc");

    // Code mod to silence clippy warnings about deprecated lints
    let data = fs::read_to_string(generated)
        .unwrap_or_else(|_| panic!("Failed to read {}", generated))
        .replace(
            "#![allow(clippy)]",
            "#![allow(clippy::all, clippy::pedantic)]",
        );
    fs::write(generated, data).unwrap_or_else(|_| panic!("Failed to write {}", generated));

    let dest_path = Path::new(".").join("src/proto/mod.rs");
    let mut f = File::create(&dest_path).expect("Failed to create proto/mod.rs");
    f.write_all(MOD).expect("Failed to write proto/mod.rs");
}
