//! Build script: render the ice-server man page for packaging.

use std::path::{Path, PathBuf};
use std::{env, fs, io};

use time::{OffsetDateTime, format_description::well_known::Iso8601};

const FALLBACK_DATE: &str = "1970-01-01";

/// Flags documented in the OPTIONS section, with their defaults.
const OPTIONS: &[(&str, &str)] = &[
    ("--config-path PATH", "Read settings from a TOML file."),
    ("--listen-socket URI", "Client endpoint (default tcp://0.0.0.0:18121)."),
    ("--client-rsp-timeout-ms MS", "Wait for client responses (default 3000)."),
    ("--pool-core-size N", "Release workers kept while idle (default 4)."),
    ("--pool-max-size N", "Release worker ceiling (default 16)."),
    ("--pool-keep-alive-seconds S", "Idle time before extra workers retire (default 60)."),
    ("--pool-queue-capacity N", "Pending release capacity (default 60000)."),
    ("--client-expire-ms MS", "Silence after which clients are dropped (default 40000)."),
    ("--reap-interval-ms MS", "Reaper cadence (default 10000)."),
    ("--log-filter FILTER", "tracing filter expression (default info)."),
    ("--log-format FORMAT", "json or compact (default json)."),
];

/// Man page date: `SOURCE_DATE_EPOCH` for reproducible packages, else the epoch.
fn manual_date() -> String {
    let stamp = env::var("SOURCE_DATE_EPOCH").ok();
    let formatted = stamp
        .as_deref()
        .and_then(|raw| raw.parse::<i64>().ok())
        .and_then(|seconds| OffsetDateTime::from_unix_timestamp(seconds).ok())
        .and_then(|moment| moment.format(&Iso8601::DATE).ok());
    match (stamp, formatted) {
        (_, Some(date)) => date,
        (Some(raw), None) => {
            println!("cargo:warning=ignoring SOURCE_DATE_EPOCH '{raw}', using {FALLBACK_DATE}");
            FALLBACK_DATE.to_owned()
        }
        (None, None) => FALLBACK_DATE.to_owned(),
    }
}

/// Packaging picks pages up from `target/generated-man/<triple>/<profile>`.
/// `OUT_DIR` sits four levels below `target`.
fn packaging_dir() -> Option<PathBuf> {
    let out_dir = PathBuf::from(env::var_os("OUT_DIR")?);
    let target_dir = out_dir.ancestors().nth(4)?;
    let triple = env::var("TARGET").ok()?;
    let profile = env::var("PROFILE").ok()?;
    Some(target_dir.join("generated-man").join(triple).join(profile))
}

/// Writes through a temporary file so readers never see half a page.
fn install_page(page: &str, dir: &Path, file_name: &str) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let staged = dir.join(format!("{file_name}.part"));
    fs::write(&staged, page)?;
    fs::rename(&staged, dir.join(file_name))
}

fn render(binary_name: &str, version: &str, date: &str) -> String {
    let title = binary_name.to_uppercase();
    let mut page = format!(
        ".TH \"{title}\" \"1\" \"{date}\" \"{binary_name} {version}\" \"Ice Control Plane\"\n\
.SH NAME\n\
{binary_name} \\- ice configuration server client bridge\n\
.SH SYNOPSIS\n\
.B {binary_name}\n\
[\\fIOPTIONS\\fR]\n\
.SH DESCRIPTION\n\
Accepts persistent connections from ice clients, tracks them per application,\n\
and relays class checks, configuration releases, rule-tree snapshots and mock\n\
evaluations to them.\n\
.SH OPTIONS\n"
    );
    for (flag, help) in OPTIONS {
        page += &format!(".TP\n.B {flag}\n{help}\n");
    }
    page.push_str(
        ".SH ENVIRONMENT\n\
Every option may also be set through an \\fBICE_\\fR prefixed variable, for\n\
example \\fBICE_CLIENT_RSP_TIMEOUT_MS\\fR. Flags override the environment,\n\
which overrides the configuration file.\n",
    );
    page
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    for var in ["CARGO_PKG_VERSION", "SOURCE_DATE_EPOCH", "TARGET", "PROFILE"] {
        println!("cargo:rerun-if-env-changed={var}");
    }

    let binary_name = env::var("CARGO_PKG_NAME")?;
    let version = env::var("CARGO_PKG_VERSION")?;
    let page = render(&binary_name, &version, &manual_date());
    let file_name = format!("{binary_name}.1");

    let out_dir = PathBuf::from(env::var_os("OUT_DIR").ok_or("OUT_DIR is not set")?);
    install_page(&page, &out_dir, &file_name)?;
    if let Some(dir) = packaging_dir()
        && let Err(error) = install_page(&page, &dir, &file_name)
    {
        println!("cargo:warning=could not stage {file_name} in {}: {error}", dir.display());
    }
    Ok(())
}
