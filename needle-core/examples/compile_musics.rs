//! Compile the bundled musics spec and print the generated module.
//!
//! ```bash
//! cargo run --example compile_musics
//! ```

use needle_core::config::NeedleConfig;

fn main() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/examples/musics.xml");
    let config = match NeedleConfig::from_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    match needle_core::compile(config) {
        Ok(code) => print!("{}", code),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
