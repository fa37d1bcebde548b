use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Load environment variables from a .env file before clap parses the
/// command line, so `env =` attributes see them. `--env-file` has to be
/// extracted by hand for the same reason.
pub fn bootstrap_from_args(args: &[OsString]) -> Result<()> {
    let explicit = extract_env_file_arg(args);
    load_env(explicit.as_ref())
}

pub fn load_env(explicit_env_file: Option<&PathBuf>) -> Result<()> {
    let env_file = match explicit_env_file {
        Some(path) => path.clone(),
        None => {
            let cwd = std::env::current_dir().context("failed to read current directory")?;
            let default = cwd.join(".env");
            if !default.exists() {
                return Ok(());
            }
            default
        }
    };

    let parsed = dotenvy::from_path_iter(&env_file)
        .with_context(|| format!("failed to read env file {}", env_file.display()))?;
    for item in parsed {
        let (key, value) =
            item.with_context(|| format!("failed to parse env file {}", env_file.display()))?;
        // The real environment always wins over file values.
        if std::env::var_os(&key).is_none() {
            std::env::set_var(key, value);
        }
    }
    Ok(())
}

fn extract_env_file_arg(args: &[OsString]) -> Option<PathBuf> {
    let mut explicit = None;
    let mut idx = 1usize;
    while idx < args.len() {
        let Some(arg) = args[idx].to_str() else {
            idx += 1;
            continue;
        };

        if arg == "--" {
            break;
        }

        if arg == "--env-file" {
            if let Some(next) = args.get(idx + 1) {
                explicit = Some(PathBuf::from(next));
            }
            idx += 2;
            continue;
        }

        if let Some(value) = arg.strip_prefix("--env-file=") {
            explicit = Some(PathBuf::from(value));
        }

        idx += 1;
    }
    explicit
}
