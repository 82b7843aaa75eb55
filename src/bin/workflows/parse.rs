use anyhow::{bail, Result};
use coreos_customizer::ConfigOverrides;
use std::path::PathBuf;

pub(crate) fn usage() -> &'static str {
    "Usage:\n  customize-coreos -vmlinuz <url> -initram <url> -resources <dir> -custom <output>\n\
     \n\
     Flags:\n  \
       -vmlinuz <url>      URL to vmlinuz image.\n  \
       -initram <url>      URL to initram image.\n  \
       -resources <dir>    Directory with files to add to custom image.\n  \
       -custom <path>      Name of customized image.\n  \
       -config <file>      TOML file supplying any of the settings above.\n  \
       -skip-preflight     Do not check for required host tools.\n  \
       -h, -help           Show this help."
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Invocation {
    Help,
    Customize {
        config_file: Option<PathBuf>,
        overrides: ConfigOverrides,
    },
}

/// Parse Go-style flags: one or two dashes, `-flag value` or `-flag=value`.
///
/// A repeated flag keeps its last value. `--` ends flag parsing.
pub(crate) fn parse_args(args: &[String]) -> Result<Invocation> {
    let mut overrides = ConfigOverrides::default();
    let mut config_file = None;
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        if arg == "--" {
            if let Some(extra) = iter.next() {
                bail!("unexpected argument '{}'", extra);
            }
            break;
        }

        let Some(flag) = arg.strip_prefix("--").or_else(|| arg.strip_prefix('-')) else {
            bail!("unexpected argument '{}'", arg);
        };
        let (name, inline) = match flag.split_once('=') {
            Some((name, value)) => (name, Some(value.to_string())),
            None => (flag, None),
        };

        match name {
            "h" | "help" => return Ok(Invocation::Help),
            "skip-preflight" => overrides.skip_preflight = parse_bool(name, inline.as_deref())?,
            "vmlinuz" | "initram" | "resources" | "custom" | "config" => {
                let value = match inline {
                    Some(value) => value,
                    None => iter
                        .next()
                        .cloned()
                        .ok_or_else(|| anyhow::anyhow!("flag needs an argument: -{}", name))?,
                };
                match name {
                    "vmlinuz" => overrides.vmlinuz = Some(value),
                    "initram" => overrides.initram = Some(value),
                    "resources" => overrides.resources = Some(PathBuf::from(value)),
                    "custom" => overrides.custom = Some(PathBuf::from(value)),
                    _ => config_file = Some(PathBuf::from(value)),
                }
            }
            "" => bail!("bad flag syntax: {}", arg),
            other => bail!("flag provided but not defined: -{}", other),
        }
    }

    Ok(Invocation::Customize {
        config_file,
        overrides,
    })
}

fn parse_bool(name: &str, value: Option<&str>) -> Result<bool> {
    match value {
        None => Ok(true),
        Some("1" | "t" | "T" | "true" | "TRUE" | "True") => Ok(true),
        Some("0" | "f" | "F" | "false" | "FALSE" | "False") => Ok(false),
        Some(other) => bail!("invalid boolean value '{}' for -{}", other, name),
    }
}
