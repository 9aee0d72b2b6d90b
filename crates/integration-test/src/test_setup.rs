use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::sync::OnceLock;

use anyhow::Context;
use tracing::info;
use tracing::warn;

/// Crates whose artifacts the tests load or execute.
const DEPENDENT_CRATES: [&str; 2] = ["filecoin-agent", "agent-host"];

/// global logging initialization function, ensure logging is initialized only once
pub fn init_test_logging() {
    static INIT: OnceLock<()> = OnceLock::new();
    INIT.get_or_init(|| {
        utils::logging::init();
        info!("Test logging initialized");
    });
}

/// auto-executed function when module is loaded, used for test environment initialization
#[ctor::ctor]
fn init_test_environment() {
    init_test_logging();
    build_dependent_crates();
}

/// Root of the main workspace: this crate lives at `<root>/crates/integration-test`.
pub fn workspace_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .and_then(Path::parent)
        .unwrap_or(manifest_dir.as_path())
        .to_path_buf()
}

fn target_dir() -> PathBuf {
    std::env::var_os("CARGO_TARGET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| workspace_root().join("target"))
        .join("debug")
}

fn build_dependent_crates() {
    let manifest = workspace_root().join("Cargo.toml");
    for crate_name in DEPENDENT_CRATES {
        info!("Building {crate_name}...");
        let output = Command::new("cargo")
            .arg("build")
            .arg("--manifest-path")
            .arg(&manifest)
            .args(["--package", crate_name])
            .output();

        match output {
            Ok(output) if output.status.success() => info!("Successfully built {crate_name}."),
            Ok(output) => warn!(
                "Failed to build {}:\nstdout: {}\nstderr: {}",
                crate_name,
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            ),
            Err(e) => warn!("Failed to execute cargo build for {crate_name}: {e}"),
        }
    }
}

/// Path of the reference agent library, `AGENT_TEST_LIBRARY` taking precedence.
pub fn agent_library() -> anyhow::Result<PathBuf> {
    if let Some(explicit) = std::env::var_os("AGENT_TEST_LIBRARY") {
        return Ok(PathBuf::from(explicit));
    }
    let path = target_dir().join("libagent.so");
    anyhow::ensure!(path.exists(), "agent library not built at {}", path.display());
    Ok(path)
}

pub fn host_binary() -> anyhow::Result<PathBuf> {
    let path = target_dir().join("agent-host");
    anyhow::ensure!(path.exists(), "agent-host not built at {}", path.display());
    Ok(path)
}

/// Copies the agent library into `dir` as `libagent.so`, the host's default lookup path.
pub fn install_agent_library(dir: &Path) -> anyhow::Result<PathBuf> {
    let source = agent_library()?;
    let dest = dir.join("libagent.so");
    std::fs::copy(&source, &dest)
        .with_context(|| format!("copy {} to {}", source.display(), dest.display()))?;
    Ok(dest)
}
