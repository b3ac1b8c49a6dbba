//! Build script for the plugin protocol types.
//!
//! The generated code lives in `src/generated.rs` and is committed, so this
//! only does work when the proto file changes and the feature is enabled.
//!
//! To regenerate: `cargo build --features regenerate-proto`

fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(feature = "regenerate-proto")]
    {
        let out_dir = std::path::PathBuf::from("src");
        tonic_prost_build::configure()
            .build_client(false)
            .build_server(true)
            .out_dir(&out_dir)
            .compile_protos(&["proto/provider.proto"], &["proto"])?;

        let generated = out_dir.join("hemmer.provider.v1.rs");
        let target = out_dir.join("generated.rs");
        if generated.exists() {
            std::fs::rename(generated, target)?;
        }
    }

    println!("cargo:rerun-if-changed=proto/provider.proto");

    Ok(())
}
