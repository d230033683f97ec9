mod run;
mod serve;

use anyhow::{Result, bail};
use console::style;
use std::path::PathBuf;

use crate::core::terminal::{self, GuideSection, print_error};

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Commands")
        .command("serve", "Start the mission API (POST /results, GET /logs)")
        .command("run", "Run one mission and print its result as JSON")
        .command("help", "Show this help")
        .print();

    GuideSection::new("Options")
        .text("serve  [--host <host>] [--port <port>] [--config <file>]")
        .text("run    --mission <id> [--store <url|path>] [--config <file>]")
        .blank()
        .text("The store is an http(s) record API or a JSON records file.")
        .text("Without --store, [store].endpoint from the config is used.")
        .print();

    println!(
        "\n {} {} <command> [options]\n",
        style("Usage:").bold(),
        style("crewrun").green()
    );
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ServeArgs {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RunArgs {
    pub mission: String,
    pub store: Option<String>,
    pub config: Option<PathBuf>,
}

pub(crate) fn parse_serve_args(args: &[String], start: usize) -> ServeArgs {
    let mut parsed = ServeArgs::default();
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--host" => {
                if i + 1 < args.len() {
                    parsed.host = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--port" | "-p" => {
                if i + 1 < args.len() {
                    parsed.port = args[i + 1].parse().ok();
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    parsed.config = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    parsed
}

pub(crate) fn parse_run_args(args: &[String], start: usize) -> RunArgs {
    let mut parsed = RunArgs::default();
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--mission" | "-m" => {
                if i + 1 < args.len() {
                    parsed.mission = args[i + 1].clone();
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--store" | "-s" => {
                if i + 1 < args.len() {
                    parsed.store = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    parsed.config = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    parsed
}

pub(crate) fn require_mission(args: RunArgs) -> Result<RunArgs> {
    if args.mission.trim().is_empty() {
        bail!("--mission is required for run. See 'crewrun help'.");
    }
    Ok(args)
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        let cmd = args[1].as_str();
        match cmd {
            "serve" => serve::run_serve(parse_serve_args(&args, 2)).await,
            "run" => {
                let parsed = require_mission(parse_run_args(&args, 2))?;
                run::run_mission_command(parsed).await
            }
            "help" | "--help" | "-h" => {
                print_help();
                Ok(())
            }
            _ => {
                print_error(&format!("Unknown command: {}", cmd));
                print_help();
                Ok(())
            }
        }
    } else {
        print_help();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_serve_args_reads_host_port_and_config() {
        let args = argv(&[
            "crewrun", "serve", "--host", "0.0.0.0", "--port", "9000", "--config", "crew.toml",
        ]);
        let parsed = parse_serve_args(&args, 2);
        assert_eq!(parsed.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(parsed.port, Some(9000));
        assert_eq!(parsed.config, Some(PathBuf::from("crew.toml")));
    }

    #[test]
    fn parse_serve_args_ignores_bad_port_and_dangling_flag() {
        let args = argv(&["crewrun", "serve", "--port", "http", "--host"]);
        let parsed = parse_serve_args(&args, 2);
        assert_eq!(parsed.port, None);
        assert_eq!(parsed.host, None);
    }

    #[test]
    fn parse_run_args_reads_mission_and_store() {
        let args = argv(&[
            "crewrun",
            "run",
            "-m",
            "m42",
            "--store",
            "https://records.example/api/",
        ]);
        let parsed = parse_run_args(&args, 2);
        assert_eq!(parsed.mission, "m42");
        assert_eq!(parsed.store.as_deref(), Some("https://records.example/api/"));
        assert_eq!(parsed.config, None);
    }

    #[test]
    fn run_without_mission_is_an_error() {
        let args = argv(&["crewrun", "run", "--store", "records.json"]);
        let parsed = parse_run_args(&args, 2);
        assert!(parsed.mission.is_empty());
        let err = require_mission(parsed).unwrap_err();
        assert!(err.to_string().contains("--mission is required"));

        let args = argv(&["crewrun", "run", "--mission", "m1"]);
        assert_eq!(require_mission(parse_run_args(&args, 2)).unwrap().mission, "m1");
    }
}
