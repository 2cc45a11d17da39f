//! Models command - inspect the OCR model files.

use std::fs;
use std::path::PathBuf;

use clap::{Args, Subcommand};
use console::style;

use super::load_config;

/// Arguments for the models command.
#[derive(Args)]
pub struct ModelsArgs {
    #[command(subcommand)]
    command: ModelsCommand,
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// Check that the model files for a language are present
    Check(CheckArgs),
}

#[derive(Args)]
struct CheckArgs {
    /// OCR language (default: from configuration)
    #[arg(long)]
    lang: Option<String>,

    /// Model directory (default: from configuration)
    #[arg(short, long)]
    model_dir: Option<PathBuf>,
}

pub fn run(args: ModelsArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    match args.command {
        ModelsCommand::Check(check_args) => check_models(check_args, config_path),
    }
}

fn check_models(args: CheckArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(lang) = args.lang {
        config.ocr.language = lang;
    }
    if let Some(dir) = args.model_dir {
        config.models.model_dir = dir;
    }

    let paths = config.model_paths();

    println!("{}", style("Model Status").bold());
    println!("Language: {}", style(&config.ocr.language).cyan().bold());
    println!("Directory: {}", config.models.model_dir.display());
    println!();

    let entries = [
        ("detection", &paths.detection),
        ("recognition", &paths.recognition),
        ("dictionary", &paths.dictionary),
    ];

    let mut total_size: u64 = 0;
    for (role, path) in entries {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let (status, size_str) = if path.exists() {
            let size = fs::metadata(path)?.len();
            total_size += size;
            (style("✓").green(), format_size(size))
        } else {
            (style("✗").red(), "missing".to_string())
        };
        println!("    {} {:<12} {:<25} {:>10}", status, role, file_name, size_str);
    }

    println!();
    if paths.exist() {
        println!(
            "{} Ready ({} total)",
            style("✓").green(),
            format_size(total_size)
        );
        Ok(())
    } else {
        anyhow::bail!(
            "OCR models missing in {}; pages without a text layer will stay empty",
            config.models.model_dir.display()
        )
    }
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(10 * 1024 * 1024), "10.0 MB");
    }
}
