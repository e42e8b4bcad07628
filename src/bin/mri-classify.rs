//! MRI slice classification CLI tool
//!
//! Command-line interface for classifying brain MRI slices with the
//! mri-classify library, on ONNX Runtime or Tract backends.

#[cfg(feature = "cli")]
use mri_classify::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(2);
}
