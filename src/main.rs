use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cclint::checks::all_checks;
use cclint::cli::{Cli, CliLogger, Commands};
use cclint::config::Settings;
use cclint::engine;
use cclint::errors::ErrorMessage;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            path,
            format,
            config,
            defines,
            include_paths,
            enable,
            force,
            jobs,
            max_configs,
            inconclusive,
            verbose,
            quiet,
            suppress,
            suppressions_list,
            template,
            xml_version,
        } => {
            let project_root = if path.is_dir() {
                path.clone()
            } else {
                path.parent().map(Into::into).unwrap_or_else(|| ".".into())
            };
            let mut settings = Settings::load(config.as_deref(), &project_root)?;

            settings.enabled.extend(enable);
            settings.include_paths.extend(include_paths);
            if let Some(defines) = defines {
                settings.defines = defines;
            }
            settings.force |= force;
            if let Some(jobs) = jobs {
                settings.jobs = jobs.max(1);
            }
            if let Some(max_configs) = max_configs {
                settings.max_configs = max_configs;
            }
            settings.inconclusive |= inconclusive;
            settings.verbose |= verbose;
            settings.errors_only |= quiet;
            if let Some(template) = template {
                settings.template = template;
            }
            if let Some(version) = xml_version {
                settings.xml_version = version;
            }
            for rule in &suppress {
                settings
                    .suppressions
                    .parse_line(rule)
                    .with_context(|| format!("invalid suppression \"{rule}\""))?;
            }
            if let Some(list) = suppressions_list {
                let content = std::fs::read_to_string(&list)
                    .with_context(|| format!("cannot read {}", list.display()))?;
                settings.suppressions.parse_file(&content)?;
            }

            let files = if path.is_file() {
                vec![path.clone()]
            } else {
                engine::scan(&path, &settings)
            };
            if files.is_empty() {
                anyhow::bail!("No C/C++ source files found in {}", path.display());
            }

            let logger = CliLogger::new(settings.errors_only);
            let exit_code = engine::run(&files, &settings, &logger);

            let diagnostics = logger.into_diagnostics();
            cclint::cli::output::render(&diagnostics, &settings, format.unwrap_or_default());

            if exit_code != 0 {
                std::process::exit(1);
            }
        }
        Commands::Errorlist { xml_version } => {
            let settings = Settings::default();
            let logger = CliLogger::new(true);
            for check in all_checks() {
                check.error_messages(&logger, &settings);
            }
            let version = xml_version.unwrap_or(2);
            println!("{}", ErrorMessage::xml_header(version));
            for msg in logger.into_diagnostics() {
                println!("{}", msg.to_xml(false, version));
            }
            println!("{}", ErrorMessage::xml_footer(version));
        }
        Commands::Init => {
            let path = std::env::current_dir()?.join(".cclintrc.toml");
            if path.exists() {
                eprintln!(".cclintrc.toml already exists");
                std::process::exit(1);
            }
            std::fs::write(&path, Settings::default_toml())?;
            println!("Created .cclintrc.toml");
        }
    }

    Ok(())
}
