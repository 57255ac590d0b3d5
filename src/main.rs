//! Host-side helper: `cargo run` builds the wasm package into `static/pkg`
//! and serves `static/` locally for previewing the background.

use std::io;
use std::process::{Command, ExitCode, Stdio};

use tracing::{error, info, warn};

const PORT: &str = "8000";

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_target(false).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "preview failed");
            ExitCode::FAILURE
        }
    }
}

fn run() -> io::Result<()> {
    info!("building wasm package");
    match Command::new("wasm-pack")
        .args(["build", "--release", "--target", "web", "--out-dir", "static/pkg"])
        .status()
    {
        Ok(status) if status.success() => {}
        Ok(status) => {
            return Err(io::Error::other(format!("wasm-pack exited with {status}")));
        }
        Err(_) => {
            warn!("wasm-pack not found in PATH; serving whatever is already in static/pkg");
        }
    }

    info!("serving static/ at http://127.0.0.1:{PORT}");
    let status = Command::new("python3")
        .args(["-m", "http.server", PORT, "--directory", "static"])
        .stdout(Stdio::null())
        .stderr(Stdio::inherit())
        .status()?;
    if !status.success() {
        return Err(io::Error::other(format!("http server exited with {status}")));
    }
    Ok(())
}
