use anyhow::{bail, Result};
use coreos_customizer::{build_custom_image, CustomizeConfig};
use std::io::Write;
use std::process::ExitCode;
use tracing::info;

use super::parse::Invocation;

pub(crate) fn run(invocation: Invocation) -> Result<()> {
    match invocation {
        Invocation::Help => bail!(super::usage()),
        Invocation::Customize {
            config_file,
            overrides,
        } => {
            let config = CustomizeConfig::resolve(config_file.as_deref(), overrides)?;
            let report = build_custom_image(&config)?;
            info!(
                vmlinuz = %report.vmlinuz.display(),
                initram = %report.original_initram.display(),
                custom = %report.custom.display(),
                bytes = report.custom_size,
                "custom initram written"
            );
            Ok(())
        }
    }
}

/// Print the final outcome line and pick the exit code.
///
/// Written straight to `out` rather than through `tracing` so `RUST_LOG`
/// cannot filter it away.
pub(crate) fn finish(result: Result<()>, out: &mut impl Write) -> ExitCode {
    let (line, code) = match result {
        Ok(()) => ("Success".to_string(), ExitCode::SUCCESS),
        Err(err) => (format!("Error: {:#}", err), ExitCode::FAILURE),
    };
    let _ = writeln!(out, "{}", line);
    code
}
