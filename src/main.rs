//! xrdp-configurator - xrdp.ini and sesman.ini editor
//!
//! Entry point for the command-line front end.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use xrdp_configurator::document::{AnyDocument, IniDocument, LoadNotice};
use xrdp_configurator::flags;
use xrdp_configurator::sesman::{Limit, SesmanIni, XServer};
use xrdp_configurator::validation::{validate_sesman, validate_xrdp, ValidationResult};
use xrdp_configurator::xrdp::{Channel, ConnectionType, XrdpIni};

/// Command-line arguments for xrdp-configurator
#[derive(Parser, Debug)]
#[command(name = "xrdp-configurator")]
#[command(version, about = "Edit xrdp.ini and sesman.ini", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Write changes to this file instead of the one that was read
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Verbose logging (can be specified multiple times)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log format (json|pretty|compact)
    #[arg(
        long,
        env = "XRDP_CONFIGURATOR_LOG_FORMAT",
        default_value = "compact",
        global = true
    )]
    pub log_format: String,

    /// Write logs to file (in addition to stderr)
    #[arg(long, global = true)]
    pub log_file: Option<String>,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Summarise a file
    Show {
        /// xrdp.ini or sesman.ini
        file: PathBuf,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Check a file for problems
    Validate {
        /// xrdp.ini or sesman.ini
        file: PathBuf,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print the file as it would be saved
    Preview {
        /// xrdp.ini or sesman.ini
        file: PathBuf,
    },
    /// Manage xrdp.ini sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsCommand,
    },
    /// Manage per-session channel overrides
    Overrides {
        #[command(subcommand)]
        action: OverridesCommand,
    },
    /// Bind or release the debug session at position 1
    Debug {
        /// on or off
        #[arg(value_enum)]
        state: Switch,
        /// xrdp.ini
        file: PathBuf,
    },
    /// Read or write a boolean setting
    Flag {
        /// xrdp.ini or sesman.ini
        file: PathBuf,
        /// Key name, e.g. tcp_nodelay or AllowRootLogin
        key: String,
        /// New value; omit to print the current one
        #[arg(value_enum)]
        value: Option<Switch>,
    },
    /// Read or replace an X server command line in sesman.ini
    SesmanParams {
        /// sesman.ini
        file: PathBuf,
        /// X11rdp or Xvnc
        server: String,
        /// New command line; omit to print the current one
        line: Option<String>,
    },
}

/// Session list operations; positions are 1-based
#[derive(Subcommand, Debug)]
pub enum SessionsCommand {
    /// List sessions
    List {
        /// xrdp.ini
        file: PathBuf,
    },
    /// Append a session from a connection template
    Add {
        /// xrdp.ini
        file: PathBuf,
        /// Session name shown in the login window
        name: String,
        /// Template label (e.g. console, sesman-Xvnc) or index
        #[arg(long = "type", default_value = "sesman-Xvnc")]
        kind: String,
    },
    /// Delete a session
    Delete {
        /// xrdp.ini
        file: PathBuf,
        /// Session position
        position: usize,
    },
    /// Exchange two sessions
    Swap {
        /// xrdp.ini
        file: PathBuf,
        /// First position
        a: usize,
        /// Second position
        b: usize,
    },
    /// Renumber session sections
    Resequence {
        /// xrdp.ini
        file: PathBuf,
    },
}

/// Channel override operations; positions are 1-based
#[derive(Subcommand, Debug)]
pub enum OverridesCommand {
    /// Write channel.* keys for a session
    Enable {
        /// xrdp.ini
        file: PathBuf,
        /// Session position
        position: usize,
    },
    /// Remove channel.* keys from a session
    Disable {
        /// xrdp.ini
        file: PathBuf,
        /// Session position
        position: usize,
    },
    /// Set one channel override
    Set {
        /// xrdp.ini
        file: PathBuf,
        /// Session position
        position: usize,
        /// Channel name, e.g. rdpdr or channel.rdpdr
        channel: String,
        /// on or off
        #[arg(value_enum)]
        value: Switch,
    },
}

/// Two-state command-line switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Switch {
    /// Enabled
    On,
    /// Disabled
    Off,
}

impl Switch {
    fn is_on(self) -> bool {
        self == Switch::On
    }
}

fn main() {
    let args = Args::parse();

    if let Err(e) = init_logging(&args) {
        eprintln!("{}", xrdp_configurator::utils::format_user_error(&e));
        std::process::exit(1);
    }

    debug!("════════════════════════════════════════════════════════");
    debug!("  xrdp-configurator v{}", env!("CARGO_PKG_VERSION"));
    debug!("  Built: {}", env!("BUILD_DATE"));
    debug!("  Commit: {}", env!("GIT_HASH"));
    debug!("════════════════════════════════════════════════════════");

    if let Err(e) = run(&args) {
        eprintln!("{}", xrdp_configurator::utils::format_user_error(&e));
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let output = args.output.as_deref();
    match &args.command {
        Command::Show { file, json } => show(file, *json),
        Command::Validate { file, json } => validate(file, *json),
        Command::Preview { file } => {
            let (doc, _) = open_any(file)?;
            print!("{}", doc.render());
            Ok(())
        }
        Command::Sessions { action } => sessions(action, output),
        Command::Overrides { action } => overrides(action, output),
        Command::Debug { state, file } => {
            let mut ini = open_xrdp(file)?;
            let changed = ini.set_debug(state.is_on());
            finish(&mut ini, changed, output)
        }
        Command::Flag { file, key, value } => flag(file, key, *value, output),
        Command::SesmanParams { file, server, line } => {
            let server: XServer = server.parse()?;
            let mut ini = SesmanIni::open(file)
                .with_context(|| format!("Opening {}", file.display()))?;
            match line {
                None => {
                    println!("{}", ini.params(server));
                    Ok(())
                }
                Some(line) => {
                    let changed = ini.set_params(server, line);
                    finish(&mut ini, changed, output)
                }
            }
        }
    }
}

fn init_logging(args: &Args) -> Result<()> {
    use std::fs::File;

    let log_level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "xrdp_configurator={level},warn",
            level = log_level
        ))
    });

    // stdout carries command output, logs go to stderr
    if let Some(log_file_path) = &args.log_file {
        let file = File::create(log_file_path)
            .with_context(|| format!("Creating log file {}", log_file_path))?;

        match args.log_format.as_str() {
            "json" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(std::io::stderr),
                    )
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(file)
                            .with_ansi(false),
                    )
                    .init();
            }
            "pretty" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .pretty()
                            .with_writer(std::io::stderr),
                    )
                    .with(
                        tracing_subscriber::fmt::layer()
                            .with_writer(file)
                            .with_ansi(false),
                    )
                    .init();
            }
            _ => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .compact()
                            .with_writer(std::io::stderr),
                    )
                    .with(
                        tracing_subscriber::fmt::layer()
                            .compact()
                            .with_writer(file)
                            .with_ansi(false),
                    )
                    .init();
            }
        }
        info!("Logging to file: {}", log_file_path);
    } else {
        match args.log_format.as_str() {
            "json" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(std::io::stderr),
                    )
                    .init();
            }
            "pretty" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .pretty()
                            .with_writer(std::io::stderr),
                    )
                    .init();
            }
            _ => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .compact()
                            .with_writer(std::io::stderr),
                    )
                    .init();
            }
        }
    }

    Ok(())
}

// =============================================================================
// Loading and saving
// =============================================================================

fn report_notices(notices: &[LoadNotice]) {
    for notice in notices {
        warn!("{}", notice);
    }
}

fn open_any(path: &Path) -> Result<(AnyDocument, Vec<LoadNotice>)> {
    let (doc, notices) =
        AnyDocument::open(path).with_context(|| format!("Opening {}", path.display()))?;
    report_notices(&notices);
    Ok((doc, notices))
}

fn open_xrdp(path: &Path) -> Result<XrdpIni> {
    let (ini, notices) =
        XrdpIni::open(path).with_context(|| format!("Opening {}", path.display()))?;
    report_notices(&notices);
    Ok(ini)
}

/// Save `doc` if anything changed, to `output` when given
fn finish<D: IniDocument>(doc: &mut D, changed: bool, output: Option<&Path>) -> Result<()> {
    if !changed {
        warn!("Nothing changed, file left untouched");
        return Ok(());
    }
    match output {
        Some(path) => doc
            .save_as(path)
            .with_context(|| format!("Saving to {}", path.display()))?,
        None => doc.save().context("Saving in place")?,
    }
    if let Some(path) = doc.state().path() {
        println!("Saved {}", path.display());
    }
    Ok(())
}

fn index_of(position: usize) -> Result<usize> {
    match position.checked_sub(1) {
        Some(index) => Ok(index),
        None => bail!("Session positions start at 1"),
    }
}

// =============================================================================
// Commands
// =============================================================================

fn show(file: &Path, as_json: bool) -> Result<()> {
    let (doc, notices) = open_any(file)?;
    match doc {
        AnyDocument::Xrdp(ini) => {
            if as_json {
                let value = json!({
                    "kind": "xrdp",
                    "version": ini.version(),
                    "address": ini.address(),
                    "port": ini.port(),
                    "autorun": ini.autorun(),
                    "notices": notices.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "sessions": ini.session_summaries(),
                    "login_layout": ini.login_layout(),
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("{}", ini.title());
                println!("  listen   {}:{}", ini.address(), ini.port());
                println!("  schema   {:?}", ini.version());
                if let Some(autorun) = ini.autorun() {
                    println!("  autorun  {}", autorun);
                }
                println!();
                print_sessions(&ini);
            }
        }
        AnyDocument::Sesman(ini) => {
            let limits: serde_json::Map<String, serde_json::Value> = Limit::ALL
                .iter()
                .map(|limit| (limit.location().1.to_string(), json!(ini.limit(*limit))))
                .collect();
            if as_json {
                let value = json!({
                    "kind": "sesman",
                    "listen_address": ini.listen_address(),
                    "listen_port": ini.listen_port(),
                    "limits": limits,
                    "log_level": ini.log_level(),
                    "syslog_level": ini.syslog_level(),
                    "x11rdp_params": ini.params(XServer::X11rdp),
                    "xvnc_params": ini.params(XServer::Xvnc),
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("{}", ini.title());
                println!(
                    "  listen   {}:{}",
                    ini.listen_address().unwrap_or("-"),
                    ini.listen_port().map(|p| p.to_string()).unwrap_or_else(|| "-".into())
                );
                for (key, value) in &limits {
                    println!("  {:<22} {}", key, value);
                }
                for server in XServer::ALL {
                    println!("  {:<22} {}", server.section_name(), ini.params(server));
                }
            }
        }
    }
    Ok(())
}

fn print_sessions(ini: &XrdpIni) {
    println!("{:<4} {:<8} {:<24} {:<16} {:<10} overrides", "#", "section", "name", "lib", "port");
    for s in ini.session_summaries() {
        println!(
            "{:<4} {:<8} {:<24} {:<16} {:<10} {}{}",
            s.position,
            s.section,
            s.name,
            s.lib.as_deref().unwrap_or("-"),
            s.port.as_deref().unwrap_or("-"),
            if s.overrides.is_enabled() { "yes" } else { "no" },
            if s.debug { "  [debug]" } else { "" },
        );
    }
}

fn print_validation(result: &ValidationResult, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        for e in &result.errors {
            println!("error   {}: {}", e.field, e.message);
        }
        for w in &result.warnings {
            println!("warning {}: {}", w.field, w.message);
        }
        if result.errors.is_empty() && result.warnings.is_empty() {
            println!("No problems found");
        }
    }
    if !result.is_valid {
        bail!("Validation found {} error(s)", result.errors.len());
    }
    Ok(())
}

fn validate(file: &Path, as_json: bool) -> Result<()> {
    let (doc, _) = open_any(file)?;
    let result = match &doc {
        AnyDocument::Xrdp(ini) => validate_xrdp(ini),
        AnyDocument::Sesman(ini) => validate_sesman(ini),
    };
    info!(
        "{}: {} error(s), {} warning(s)",
        doc.kind(),
        result.errors.len(),
        result.warnings.len()
    );
    print_validation(&result, as_json)
}

fn sessions(action: &SessionsCommand, output: Option<&Path>) -> Result<()> {
    match action {
        SessionsCommand::List { file } => {
            print_sessions(&open_xrdp(file)?);
            Ok(())
        }
        SessionsCommand::Add { file, name, kind } => {
            let kind: ConnectionType = kind.parse()?;
            let mut ini = open_xrdp(file)?;
            let added = ini.add_session(name, kind);
            if let Some(index) = added {
                info!("Added '{}' at position {}", name, index + 1);
            }
            finish(&mut ini, added.is_some(), output)
        }
        SessionsCommand::Delete { file, position } => {
            let mut ini = open_xrdp(file)?;
            let changed = ini.delete_session(index_of(*position)?);
            finish(&mut ini, changed, output)
        }
        SessionsCommand::Swap { file, a, b } => {
            let mut ini = open_xrdp(file)?;
            let changed = ini.swap_sessions(index_of(*a)?, index_of(*b)?);
            finish(&mut ini, changed, output)
        }
        SessionsCommand::Resequence { file } => {
            let mut ini = open_xrdp(file)?;
            let names = ini.resequence();
            debug!("Resequenced: {}", names.join(", "));
            // loading already renumbers, so always write the result out
            finish(&mut ini, true, output)
        }
    }
}

fn overrides(action: &OverridesCommand, output: Option<&Path>) -> Result<()> {
    match action {
        OverridesCommand::Enable { file, position } => {
            let mut ini = open_xrdp(file)?;
            let changed = ini.enable_overrides(index_of(*position)?);
            finish(&mut ini, changed, output)
        }
        OverridesCommand::Disable { file, position } => {
            let mut ini = open_xrdp(file)?;
            let changed = ini.disable_overrides(index_of(*position)?);
            finish(&mut ini, changed, output)
        }
        OverridesCommand::Set {
            file,
            position,
            channel,
            value,
        } => {
            let channel: Channel = channel.parse()?;
            let mut ini = open_xrdp(file)?;
            let changed = ini.set_override(index_of(*position)?, channel, value.is_on());
            finish(&mut ini, changed, output)
        }
    }
}

fn flag(file: &Path, key: &str, value: Option<Switch>, output: Option<&Path>) -> Result<()> {
    let (doc, _) = open_any(file)?;
    match doc {
        AnyDocument::Xrdp(mut ini) => {
            let spelling = match flags::xrdp::by_key(key) {
                Some(spelling) => spelling,
                None if key.eq_ignore_ascii_case("enablesyslog") => flags::xrdp::ENABLE_SYSLOG,
                None => bail!("'{}' is not a boolean xrdp.ini setting", key),
            };
            match value {
                None => {
                    println!("{}={}", spelling.key, on_off(ini.flag(spelling)));
                    Ok(())
                }
                Some(value) if spelling == flags::xrdp::ENABLE_SYSLOG => {
                    let changed = ini.set_syslog_enabled(value.is_on());
                    finish(&mut ini, changed, output)
                }
                Some(value) => {
                    let changed = ini.set_flag(spelling, value.is_on());
                    finish(&mut ini, changed, output)
                }
            }
        }
        AnyDocument::Sesman(mut ini) => {
            let Some(spelling) = flags::sesman::by_key(key) else {
                bail!("'{}' is not a boolean sesman.ini setting", key);
            };
            match value {
                None => {
                    println!("{}={}", spelling.key, on_off(ini.flag(spelling)));
                    Ok(())
                }
                Some(value) if spelling == flags::sesman::ENABLE_SYSLOG => {
                    let changed = ini.set_syslog_enabled(value.is_on());
                    finish(&mut ini, changed, output)
                }
                Some(value) if spelling == flags::sesman::ENABLE_USER_WINDOW_MANAGER => {
                    let changed = ini.set_user_window_manager_enabled(value.is_on());
                    finish(&mut ini, changed, output)
                }
                Some(value) => {
                    let changed = ini.set_flag(spelling, value.is_on());
                    finish(&mut ini, changed, output)
                }
            }
        }
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}
