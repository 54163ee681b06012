use std::{env, path::PathBuf};

use anyhow::{anyhow, Context, Result};

#[derive(Debug, PartialEq, Eq)]
pub enum CliAction {
    Run { base_dir: Option<PathBuf> },
    Help,
}

pub fn parse_cli_action() -> Result<CliAction> {
    parse_args(env::args().skip(1))
}

pub fn print_help() {
    println!("tasktickr");
    println!("Usage:");
    println!("  tasktickr [--base-dir <path>]");
    println!("Options:");
    println!("  --base-dir <path>   Directory holding TaskTickrSettings.ini and logs/");
    println!("                      (defaults to the directory of the executable)");
    println!("Keys:");
    println!("  j/k or arrows move | s start | x stop and log | r refresh | q quit");
}

/// Settings and logs live next to the executable unless overridden.
pub fn resolve_base_dir(requested: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(base_dir) = requested {
        return Ok(base_dir);
    }
    let exe = env::current_exe().context("failed to locate the running executable")?;
    exe.parent()
        .map(|parent| parent.to_path_buf())
        .ok_or_else(|| anyhow!("executable path {} has no parent", exe.display()))
}

fn parse_args<I>(args: I) -> Result<CliAction>
where
    I: IntoIterator<Item = String>,
{
    let mut base_dir = None;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--base-dir" => {
                base_dir = Some(PathBuf::from(
                    args.next()
                        .ok_or_else(|| anyhow!("--base-dir requires a value"))?,
                ));
            }
            "--help" | "-h" => {
                return Ok(CliAction::Help);
            }
            other => return Err(anyhow!("Unknown argument: {other}")),
        }
    }

    Ok(CliAction::Run { base_dir })
}
