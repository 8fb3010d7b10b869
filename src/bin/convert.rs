use anyhow::Result;

use etp_backend::{config::ConverterConfig, logging, services::converter::ExcelConverter};

fn main() {
    if let Err(err) = run() {
        eprintln!("Fatal: {:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    logging::init_logging()?;

    let config = ConverterConfig::from_env()?;
    let converter = ExcelConverter::new(config);

    // An early abort (missing sources, zero employees) logs its reason but
    // still exits 0; only setup failures reach the process exit code.
    match converter.run() {
        Some(summary) => tracing::info!(
            "Outputs ready in {} ({} file(s) mirrored)",
            summary.employees_path.parent().map(|p| p.display().to_string()).unwrap_or_default(),
            summary.mirrored_files
        ),
        None => tracing::warn!("Conversion ended without producing outputs"),
    }

    Ok(())
}
