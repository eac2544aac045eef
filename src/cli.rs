use std::env;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::{ConfigError, RegionProfiles, ServerConfig, PROFILES_ENV};
use crate::recon::{reconcile_files, InputPaths, Region, RegionProfile};
use crate::report::write_report;
use crate::server;

const USAGE: &str = "usage: skuledger <serve|reconcile|summarize>\n  \
    skuledger serve\n  \
    skuledger reconcile <region> <out.xlsx> --orders <file>... --settlements <file>... --consumption <file>\n  \
    skuledger summarize <region> --orders <file>... --settlements <file>... --consumption <file>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Serve,
    Reconcile,
    Summarize,
}

pub fn parse_command(args: &[String]) -> Option<Command> {
    match args.get(1).map(String::as_str) {
        Some("serve") => Some(Command::Serve),
        Some("reconcile") => Some(Command::Reconcile),
        Some("summarize") => Some(Command::Summarize),
        _ => None,
    }
}

pub fn run_with_args(args: &[String]) -> i32 {
    match parse_command(args) {
        Some(Command::Serve) => handle_serve(),
        Some(Command::Reconcile) => handle_reconcile(args),
        Some(Command::Summarize) => handle_summarize(args),
        None => {
            eprintln!("{USAGE}");
            2
        }
    }
}

/// `--orders`, `--settlements` and `--consumption` values; each flag takes every
/// argument up to the next flag.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FileArgs {
    pub orders: Vec<PathBuf>,
    pub settlements: Vec<PathBuf>,
    pub consumption: Vec<PathBuf>,
}

impl FileArgs {
    pub fn parse(args: &[String]) -> Result<Self, String> {
        #[derive(Clone, Copy)]
        enum Slot {
            Orders,
            Settlements,
            Consumption,
        }

        let mut files = Self::default();
        let mut slot = None;
        for arg in args {
            match arg.as_str() {
                "--orders" => slot = Some(Slot::Orders),
                "--settlements" => slot = Some(Slot::Settlements),
                "--consumption" => slot = Some(Slot::Consumption),
                flag if flag.starts_with("--") => return Err(format!("unknown option '{flag}'")),
                value => {
                    let list = match slot {
                        Some(Slot::Orders) => &mut files.orders,
                        Some(Slot::Settlements) => &mut files.settlements,
                        Some(Slot::Consumption) => &mut files.consumption,
                        None => return Err(format!("unexpected argument '{value}'")),
                    };
                    list.push(PathBuf::from(value));
                }
            }
        }
        Ok(files)
    }

    pub fn into_paths(self) -> Result<InputPaths, String> {
        if self.orders.is_empty() {
            return Err("--orders needs at least one file".to_string());
        }
        if self.settlements.is_empty() {
            return Err("--settlements needs at least one file".to_string());
        }
        let mut consumption = self.consumption;
        if consumption.len() != 1 {
            return Err("--consumption takes exactly one file".to_string());
        }
        Ok(InputPaths {
            orders: self.orders,
            settlements: self.settlements,
            consumption: consumption.remove(0),
        })
    }
}

fn load_profiles() -> Result<RegionProfiles, ConfigError> {
    match env::var(PROFILES_ENV) {
        Ok(path) if !path.trim().is_empty() => RegionProfiles::load(Path::new(&path)),
        _ => Ok(RegionProfiles::default()),
    }
}

/// Resolves `<region>` and the file flags that follow `skip` leading arguments.
fn parse_job(args: &[String], skip: usize) -> Result<(RegionProfile, InputPaths), String> {
    let region: Region = args
        .get(2)
        .ok_or_else(|| "missing <region>".to_string())?
        .parse()?;
    let paths = FileArgs::parse(args.get(skip..).unwrap_or_default())?.into_paths()?;
    Ok((region_profile(region)?, paths))
}

fn region_profile(region: Region) -> Result<RegionProfile, String> {
    load_profiles()
        .map(|profiles| profiles.get(region).clone())
        .map_err(|err| err.to_string())
}

fn handle_serve() -> i32 {
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config error: {err}");
            return 1;
        }
    };
    match server::run_server(config) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("server error: {err}");
            1
        }
    }
}

fn handle_reconcile(args: &[String]) -> i32 {
    let Some(out) = args.get(3).filter(|a| !a.starts_with("--")) else {
        eprintln!("{USAGE}");
        return 2;
    };
    let (profile, paths) = match parse_job(args, 4) {
        Ok(job) => job,
        Err(msg) => {
            eprintln!("{msg}\n{USAGE}");
            return 2;
        }
    };

    let result = reconcile_files(&profile, &paths)
        .and_then(|recon| write_report(&recon, &profile, Path::new(out)).map(|()| recon));
    match result {
        Ok(recon) => {
            println!(
                "report written: {out} (skus={}, lines={}, excluded_settlements={})",
                recon.skus.len(),
                recon.lines.len(),
                recon.excluded.len()
            );
            0
        }
        Err(err) => {
            eprintln!("reconcile failed: {err}");
            1
        }
    }
}

fn handle_summarize(args: &[String]) -> i32 {
    let (profile, paths) = match parse_job(args, 3) {
        Ok(job) => job,
        Err(msg) => {
            eprintln!("{msg}\n{USAGE}");
            return 2;
        }
    };

    let recon = match reconcile_files(&profile, &paths) {
        Ok(recon) => recon,
        Err(err) => {
            eprintln!("summarize failed: {err}");
            return 1;
        }
    };

    let mut writer = csv::Writer::from_writer(io::stdout());
    for summary in &recon.skus {
        if let Err(err) = writer.serialize(summary) {
            eprintln!("failed to write summary: {err}");
            return 1;
        }
    }
    match writer.flush() {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("failed to write summary: {err}");
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn file_flags_collect_until_next_flag() {
        let files = FileArgs::parse(&args(&[
            "--orders",
            "a.xlsx",
            "b.xlsx",
            "--settlements",
            "s.xlsx",
            "--consumption",
            "c.xlsx",
        ]))
        .expect("parse");
        assert_eq!(files.orders.len(), 2);
        assert_eq!(files.settlements, vec![PathBuf::from("s.xlsx")]);

        let paths = files.into_paths().expect("paths");
        assert_eq!(paths.consumption, PathBuf::from("c.xlsx"));
    }

    #[test]
    fn stray_arguments_and_unknown_flags_are_rejected() {
        assert!(FileArgs::parse(&args(&["a.xlsx"])).is_err());
        assert!(FileArgs::parse(&args(&["--orders", "a.xlsx", "--verbose"])).is_err());
    }

    #[test]
    fn missing_consumption_is_a_usage_error() {
        let files = FileArgs::parse(&args(&["--orders", "a.xlsx", "--settlements", "s.xlsx"]))
            .expect("parse");
        assert!(files.into_paths().is_err());
    }

    #[test]
    fn unknown_command_prints_usage() {
        assert_eq!(parse_command(&args(&["skuledger", "simulate"])), None);
        assert_eq!(run_with_args(&args(&["skuledger"])), 2);
    }
}
