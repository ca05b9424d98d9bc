//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{PeerSyncConfig, Role};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    role: String,
    bind_addr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    host_addr: Option<String>,
    wire_format: String,
    offset_window_size: usize,
    pose_window_size: usize,
    candidate_window_size: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    role: config.role.to_string(),
                    bind_addr: config.network.bind_addr.clone(),
                    host_addr: config.network.host_addr.clone(),
                    wire_format: format!("{:?}", config.network.format),
                    offset_window_size: config.clock.offset_window_size,
                    pose_window_size: config.alignment.pose_window_size,
                    candidate_window_size: config.alignment.candidate_window_size,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &PeerSyncConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.role == Role::Host && config.network.host_addr.is_some() {
        warnings.push("network.host_addr is ignored for the host role".to_string());
    }

    if config.role == Role::Client && config.clock.max_probe_rounds.is_none() {
        warnings.push("clock.max_probe_rounds is unset - probing runs until convergence".to_string());
    }

    if config.alignment.max_session_seconds.is_none() {
        warnings.push(
            "alignment.max_session_seconds is unset - sessions run until converged or stopped"
                .to_string(),
        );
    }

    // Host samples are one frame apart; the nearest one can be half a frame off
    let alignment = &config.alignment;
    if alignment.timestamp_deviation_tolerance_seconds < alignment.frame_interval_seconds / 2.0 {
        warnings.push(format!(
            "alignment.timestamp_deviation_tolerance_seconds ({}) is below half a frame ({:.4}) - \
             the host may drop most pose requests",
            alignment.timestamp_deviation_tolerance_seconds,
            alignment.frame_interval_seconds / 2.0
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Role: {}", summary.role);
            println!("  Bind: {}", summary.bind_addr);
            if let Some(ref host) = summary.host_addr {
                println!("  Host: {}", host);
            }
            println!("  Wire format: {}", summary.wire_format);
            println!(
                "  Windows: offset={} pose={} candidate={}",
                summary.offset_window_size, summary.pose_window_size, summary.candidate_window_size
            );
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_valid_host_config() {
        let file = write_config("role = \"host\"\n");
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        };
        let result = validate_config(&args);
        assert!(result.valid);
        let summary = result.summary.unwrap();
        assert_eq!(summary.role, "host");
        assert_eq!(summary.pose_window_size, 50);
    }

    #[test]
    fn test_client_without_host_is_invalid() {
        let file = write_config("role = \"client\"\n");
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: false,
        };
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("host_addr"));
        assert!(run_validate(&args).is_err());
    }

    #[test]
    fn test_missing_file() {
        let args = ValidateArgs {
            config: PathBuf::from("/nonexistent/peer.toml"),
            json: false,
        };
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("File not found"));
    }

    #[test]
    fn test_warnings() {
        let mut config = PeerSyncConfig::default();
        config.role = Role::Host;
        config.network.host_addr = Some("127.0.0.1:7400".to_string());
        config.alignment.timestamp_deviation_tolerance_seconds = 0.001;

        let warnings = collect_warnings(&config);
        assert!(warnings.iter().any(|w| w.contains("ignored")));
        assert!(warnings.iter().any(|w| w.contains("half a frame")));
        assert!(!warnings.iter().any(|w| w.contains("max_probe_rounds")));
    }
}
