use crate::config::{Config, LogLevel};
use crate::credential::{Options, ProcessEnvironment, TerminalPrompt};
use crate::tpm::get_context;
use crate::workflow::clear_ownership;
use clap::Parser;
use eyre::Result;
use std::path::PathBuf;
use zeroize::Zeroizing;

const TPM_ENV_VAR: &str = "TCTI";
const CONFIG_ENV_VAR: &str = "TPM_CLEAR_CONFIG";
const DEFAULT_TCTI: &str = "device:/dev/tpmrm0";

/// Clear TPM ownership, returning the TPM to its default state after a reboot
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Set owner secret, prompts for it when given without a value
    #[arg(short, long, value_name = "secret", num_args = 0..=1)]
    owner: Option<Option<String>>,

    /// TPM owner secret is in an environment variable whose name is given by -o
    #[arg(short = 't', long)]
    use_env: bool,

    /// Use hex encoding for owner secret
    #[arg(short = 'x', long)]
    use_hex: bool,

    /// Use physical presence authorization
    #[arg(short, long)]
    force: bool,

    /// Use 20 bytes of zeros (TSS_WELL_KNOWN_SECRET) as the TPM secret authorization data
    #[arg(short = 'z', long)]
    well_known: bool,

    /// Use TSS UNICODE (UTF-16LE) encoding for a prompted owner secret
    #[arg(short, long)]
    unicode: bool,

    /// TPM device specified in TCTI format [default: device:/dev/tpmrm0]
    #[arg(short = 'T', long, env = TPM_ENV_VAR)]
    tcti: Option<String>,

    /// YAML file with defaults for --tcti and --log
    #[arg(short, long, value_name = "path", env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Log level, overrides RUST_LOG
    #[arg(short, long, value_enum)]
    log: Option<LogLevel>,
}

/// Settings that flags, environment and config file are merged into.
#[derive(Debug, PartialEq, Eq)]
pub struct Settings {
    pub tcti: String,
    pub log: Option<LogLevel>,
}

impl Cli {
    pub fn new() -> Self {
        Cli::parse()
    }

    pub fn settings(&self) -> Result<Settings> {
        let config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        Ok(Settings {
            tcti: self
                .tcti
                .clone()
                .or(config.tcti)
                .unwrap_or_else(|| DEFAULT_TCTI.to_owned()),
            log: self.log.or(config.log),
        })
    }

    /// Consumes the parsed flags; the owner value moves into a zeroizing string.
    pub fn into_options(self) -> Options {
        Options {
            owner: self.owner.flatten().map(Zeroizing::new),
            use_env: self.use_env,
            use_hex: self.use_hex,
            force: self.force,
            well_known: self.well_known,
            unicode: self.unicode,
        }
    }

    pub fn run(self, settings: &Settings) -> Result<()> {
        let options = self.into_options();
        log::debug!("{:?}", options);
        clear_ownership(
            &options,
            || get_context(&settings.tcti),
            &mut TerminalPrompt,
            &ProcessEnvironment,
        )?;
        log::info!("tpm_clear succeeded");
        println!(
            "TPM successfully cleared. You need to reboot to complete this operation. \
             After reboot the TPM will be in the default state: unowned, disabled and inactive."
        );
        Ok(())
    }
}
