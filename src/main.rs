/// To build distributable binary (WIP):
/// ```
/// rustup target add x86_64-unknown-linux-musl
/// TPM_CLEAR_BUILD_STATIC=1 cargo build --release --target=x86_64-unknown-linux-musl
/// ```
use eyre::Result;
use std::env;
use tpm_clear::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::new();
    let settings = cli.settings()?;
    let mut logger = env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );
    if let Some(level) = settings.log {
        logger.filter_level(level.into());
    }
    logger.init();
    env::set_var("TSS2_LOG", "all+NONE");
    cli.run(&settings)?;
    Ok(())
}
