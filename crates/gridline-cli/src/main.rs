// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod runtime;

use anyhow::{Context, Result, anyhow};
use config::Config;
use gridline_app::ExportScope;
use gridline_db::SqliteRepository;
use gridline_http::HttpSource;
use std::env;
use std::io;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "warn,gridline_app=info,gridline_cli=info";

fn main() {
    init_logging();
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `gridline --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    let db_path = config.db_path()?;
    let repository = SqliteRepository::open(&db_path).with_context(|| {
        format!(
            "open database {} -- if this path is wrong, set [storage].db_path or GRIDLINE_DB_PATH",
            db_path.display()
        )
    })?;
    let mut table = runtime::open_table(&config, Box::new(repository))?;

    let url = config.source_url().ok_or_else(|| {
        anyhow!(
            "no [source].url in {}; point it at the endpoint that lists records",
            options.config_path.display()
        )
    })?;
    let mut source = HttpSource::new(url, config.source_timeout()?)?;
    if options.check_only {
        return Ok(());
    }

    if let Some(preset) = &options.preset {
        runtime::apply_preset(&mut table, preset)?;
    }

    let rows = runtime::reload(&mut table, &mut source)?;
    info!(rows, visible = table.visible_ids().len(), "loaded rows");

    if let Some(operation) = &options.run {
        let ids = runtime::parse_ids(options.ids.as_deref().unwrap_or_default())?;
        runtime::select_ids(&mut table, &ids)?;
        let summary = runtime::run_operation(&mut table, operation, &options.settings)?;
        for line in runtime::outcome_report(&table, &ids) {
            println!("{line}");
        }
        eprintln!(
            "{}: {} succeeded, {} failed of {}",
            summary.operation, summary.succeeded, summary.failed, summary.total
        );
        return Ok(());
    }

    let scope = if options.visible_only {
        ExportScope::Visible
    } else {
        ExportScope::All
    };
    match &options.export {
        Some(target) => {
            let path = runtime::export_to(&table, target, scope)?;
            println!("{}", path.display());
        }
        None => {
            let stdout = io::stdout();
            table.export_csv(stdout.lock(), ExportScope::Visible)?;
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
    export: Option<PathBuf>,
    visible_only: bool,
    preset: Option<String>,
    run: Option<String>,
    ids: Option<String>,
    settings: Vec<(String, String)>,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_example: false,
        check_only: false,
        show_help: false,
        export: None,
        visible_only: false,
        preset: None,
        run: None,
        ids: None,
        settings: Vec::new(),
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        let mut value_for = |flag: &str, what: &str| {
            iter.next()
                .map(|value| value.as_ref().to_owned())
                .ok_or_else(|| anyhow!("{flag} requires {what}"))
        };
        match arg.as_ref() {
            "--config" => {
                options.config_path = PathBuf::from(value_for("--config", "a file path")?);
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--export" => {
                options.export = Some(PathBuf::from(value_for("--export", "a file or directory")?));
            }
            "--visible-only" => {
                options.visible_only = true;
            }
            "--preset" => {
                options.preset = Some(value_for("--preset", "a preset name")?);
            }
            "--run" => {
                options.run = Some(value_for("--run", "an operation id")?);
            }
            "--ids" => {
                options.ids = Some(value_for("--ids", "a comma-separated id list")?);
            }
            "--set" => {
                let raw = value_for("--set", "key=value")?;
                options.settings.push(runtime::parse_setting(&raw)?);
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    if options.run.is_some() && options.ids.is_none() {
        return Err(anyhow!("--run needs --ids with the rows to process"));
    }
    if options.run.is_some() && options.export.is_some() {
        return Err(anyhow!("--run and --export cannot be combined"));
    }

    Ok(options)
}

fn print_help() {
    println!("gridline");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a config template");
    println!("  --check                  Validate config, database and columns, then exit");
    println!("  --preset <name>          Apply a configured filter preset before loading");
    println!("  --export <path>          Write loaded rows as CSV (file or directory)");
    println!("  --visible-only           Export only rows passing the saved filters");
    println!("  --run <operation>        Run a mass operation over --ids");
    println!("  --ids <a,b,c>            Row ids for --run");
    println!("  --set <key=value>        Operation setting for --run (repeatable)");
    println!("  --help                   Show this help");
    println!();
    println!("Without --export or --run, visible rows are printed to stdout as CSV.");
}

#[cfg(test)]
mod tests {
    use super::{CliOptions, parse_cli_args};
    use anyhow::Result;
    use std::path::PathBuf;

    fn default_options_path() -> PathBuf {
        PathBuf::from("/tmp/gridline-config.toml")
    }

    #[test]
    fn parse_cli_args_defaults_to_provided_config_path() -> Result<()> {
        let options = parse_cli_args(Vec::<String>::new(), default_options_path())?;
        assert_eq!(
            options,
            CliOptions {
                config_path: default_options_path(),
                print_config_path: false,
                print_example: false,
                check_only: false,
                show_help: false,
                export: None,
                visible_only: false,
                preset: None,
                run: None,
                ids: None,
                settings: Vec::new(),
            }
        );
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_config_path_override() -> Result<()> {
        let options = parse_cli_args(
            vec!["--config", "/custom/config.toml"],
            default_options_path(),
        )?;
        assert_eq!(options.config_path, PathBuf::from("/custom/config.toml"));
        Ok(())
    }

    #[test]
    fn parse_cli_args_errors_for_missing_values() {
        let error = parse_cli_args(vec!["--config"], default_options_path())
            .expect_err("missing config value should fail");
        assert!(error.to_string().contains("--config requires a file path"));

        let error = parse_cli_args(vec!["--export"], default_options_path())
            .expect_err("missing export target should fail");
        assert!(error.to_string().contains("--export requires"));
    }

    #[test]
    fn parse_cli_args_errors_for_unknown_argument() {
        let error = parse_cli_args(vec!["--wat"], default_options_path())
            .expect_err("unknown arg should fail");
        let message = error.to_string();
        assert!(message.contains("unknown argument"));
        assert!(message.contains("--help"));
    }

    #[test]
    fn parse_cli_args_reads_export_flags() -> Result<()> {
        let options = parse_cli_args(
            vec!["--export", "/tmp/out", "--visible-only", "--preset", "stale"],
            default_options_path(),
        )?;
        assert_eq!(options.export, Some(PathBuf::from("/tmp/out")));
        assert!(options.visible_only);
        assert_eq!(options.preset.as_deref(), Some("stale"));
        Ok(())
    }

    #[test]
    fn parse_cli_args_reads_run_with_ids_and_settings() -> Result<()> {
        let options = parse_cli_args(
            vec!["--run", "move", "--ids", "3,4", "--set", "group=ops"],
            default_options_path(),
        )?;
        assert_eq!(options.run.as_deref(), Some("move"));
        assert_eq!(options.ids.as_deref(), Some("3,4"));
        assert_eq!(
            options.settings,
            vec![("group".to_owned(), "ops".to_owned())]
        );
        Ok(())
    }

    #[test]
    fn parse_cli_args_requires_ids_for_run() {
        let error = parse_cli_args(vec!["--run", "move"], default_options_path())
            .expect_err("run without ids should fail");
        assert!(error.to_string().contains("--ids"));

        let error = parse_cli_args(
            vec!["--run", "move", "--ids", "1", "--export", "x.csv"],
            default_options_path(),
        )
        .expect_err("run with export should fail");
        assert!(error.to_string().contains("cannot be combined"));
    }

    #[test]
    fn parse_cli_args_sets_print_and_check_flags() -> Result<()> {
        let options = parse_cli_args(
            vec!["--print-config-path", "--print-example-config", "--check", "-h"],
            default_options_path(),
        )?;
        assert!(options.print_config_path);
        assert!(options.print_example);
        assert!(options.check_only);
        assert!(options.show_help);
        Ok(())
    }
}
