//! Shared command-line plumbing for the binaries

use std::ffi::OsString;

/// Rewrite multi-letter single-dash flags (`-rs`) to their long forms
///
/// `aliases` maps the short spelling to the long one, e.g.
/// `("-rs", "--remove-string")`. Both `-rs value` and `-rs=value` are
/// handled. Arguments after `--` are left alone.
pub fn expand_legacy_flags<I, T>(args: I, aliases: &[(&str, &str)]) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut expanded = Vec::new();
    let mut passthrough = false;

    for arg in args {
        let arg: OsString = arg.into();
        if passthrough {
            expanded.push(arg);
            continue;
        }

        let rewritten = arg.to_str().and_then(|text| {
            if text == "--" {
                return None;
            }
            aliases.iter().find_map(|(short, long)| {
                if text == *short {
                    Some(OsString::from(*long))
                } else {
                    text.strip_prefix(short)
                        .and_then(|rest| rest.strip_prefix('='))
                        .map(|value| OsString::from(format!("{}={}", long, value)))
                }
            })
        });

        if arg == "--" {
            passthrough = true;
        }
        expanded.push(rewritten.unwrap_or(arg));
    }

    expanded
}

/// Install the stderr logger
///
/// Defaults to `info`; `RUST_LOG` overrides it.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}
