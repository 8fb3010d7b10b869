use anyhow::Result;
use dotenvy::dotenv;
use std::path::PathBuf;

fn required_var(name: &str) -> Result<String> {
    std::env::var(name).map_err(|e| anyhow::anyhow!("Failed to load {}: {}", name, e))
}

/// Paths for the one-shot Excel → JSON batch job. All four are required
/// environment variables; there are no built-in path defaults.
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    pub employees_source: PathBuf,
    pub activities_source: PathBuf,
    pub json_output_dir: PathBuf,
    pub mirror_output_dir: PathBuf,
}

impl ConverterConfig {
    pub fn new(
        employees_source: PathBuf,
        activities_source: PathBuf,
        json_output_dir: PathBuf,
        mirror_output_dir: PathBuf,
    ) -> Self {
        Self {
            employees_source,
            activities_source,
            json_output_dir,
            mirror_output_dir,
        }
    }

    pub fn from_env() -> Result<Self> {
        // Load .env file first
        dotenv().ok();

        Ok(Self {
            employees_source: PathBuf::from(required_var("EMPLOYEES_XLS_PATH")?),
            activities_source: PathBuf::from(required_var("ACTIVITIES_XLSX_PATH")?),
            json_output_dir: PathBuf::from(required_var("JSON_OUTPUT_DIR")?),
            mirror_output_dir: PathBuf::from(required_var("MIRROR_OUTPUT_DIR")?),
        })
    }
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_pass: String,
    pub from_name: String,
    pub http_port: u16,
}

impl MailConfig {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let smtp_port = required_var("MAIL_PORT")?
            .parse::<u16>()
            .map_err(|e| anyhow::anyhow!("MAIL_PORT is not a valid port: {}", e))?;

        let http_port = match std::env::var("PORT") {
            Ok(value) => value
                .parse::<u16>()
                .map_err(|e| anyhow::anyhow!("PORT is not a valid port: {}", e))?,
            Err(_) => 4000,
        };

        Ok(Self {
            smtp_host: required_var("MAIL_HOST")?,
            smtp_port,
            smtp_user: required_var("MAIL_USER")?,
            smtp_pass: required_var("MAIL_PASS")?,
            from_name: std::env::var("MAIL_FROM_NAME").unwrap_or_else(|_| "ETP App".to_string()),
            http_port,
        })
    }
}
