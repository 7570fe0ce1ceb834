//! Compiles the SPM/PA/PB protobuf service definitions into Rust bindings.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_build::configure().compile(
        &["proto/common.proto", "proto/spm.proto", "proto/pb.proto", "proto/pa.proto"],
        &["proto"],
    )?;
    Ok(())
}
