//! Copies the configuration templates into the local data directory so a
//! fresh install has `.env.example` and `config.example.toml` next to the
//! files the binary reads.

use std::{env, fs, path::PathBuf};

const TEMPLATES: &[&str] = &[".env.example", "config.example.toml"];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    for template in TEMPLATES {
        println!("cargo:rerun-if-changed={template}");
    }

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);

    let mut out_dir = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    out_dir.push("sporlsync");
    fs::create_dir_all(&out_dir)?;

    for template in TEMPLATES {
        let source = manifest_dir.join(template);
        if source.is_file() {
            fs::copy(&source, out_dir.join(template))?;
        } else {
            println!("cargo:warning={template} not found at {}", source.display());
        }
    }

    Ok(())
}
