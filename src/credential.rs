use crate::secret::{self, Provenance, SecretBuffer, SecretError};
use std::ffi::OsString;
use std::fmt;
use std::io;
use std::os::unix::ffi::OsStringExt;
use thiserror::Error;
use zeroize::Zeroizing;

pub const OWNER_PROMPT: &str = "Enter owner password: ";

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("failed to get password")]
    PromptFailed(#[source] io::Error),
    #[error("{name} is not defined")]
    EnvVarUndefined { name: String },
    #[error("invalid hex TPM owner secret")]
    InvalidHexSecret,
    #[error("TPM owner secret is not valid UTF-8 and cannot be unicode encoded")]
    NotUnicode,
}

impl From<SecretError> for CredentialError {
    fn from(err: SecretError) -> Self {
        match err {
            SecretError::InvalidHex => Self::InvalidHexSecret,
            SecretError::NotUtf8 => Self::NotUnicode,
        }
    }
}

pub type Result<T, E = CredentialError> = core::result::Result<T, E>;

/// How the owner secret is obtained. Exactly one applies per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialMode {
    /// No secret, the clear is authorized out of band (physical presence)
    ForcedClear,
    WellKnown,
    InteractivePrompt,
    LiteralOrEnvPlain,
    LiteralHex,
}

/// Secret source selection, built once from the command line.
#[derive(Default)]
pub struct Options {
    /// Literal secret, or an environment variable name when `use_env` is set
    pub owner: Option<Zeroizing<String>>,
    pub use_env: bool,
    pub use_hex: bool,
    pub force: bool,
    pub well_known: bool,
    /// Encode a prompted secret as UTF-16LE
    pub unicode: bool,
}

impl Options {
    pub fn mode(&self) -> CredentialMode {
        if self.force {
            CredentialMode::ForcedClear
        } else if self.well_known {
            CredentialMode::WellKnown
        } else if self.owner.is_none() {
            CredentialMode::InteractivePrompt
        } else if self.use_hex {
            CredentialMode::LiteralHex
        } else {
            CredentialMode::LiteralOrEnvPlain
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("owner", &self.owner.as_ref().map(|_| "<redacted>"))
            .field("use_env", &self.use_env)
            .field("use_hex", &self.use_hex)
            .field("force", &self.force)
            .field("well_known", &self.well_known)
            .field("unicode", &self.unicode)
            .finish()
    }
}

/// Reads a secret from the operator without echoing it.
pub trait PasswordPrompt {
    fn read_password(&mut self, prompt: &str) -> io::Result<SecretBuffer>;
}

pub struct TerminalPrompt;

impl PasswordPrompt for TerminalPrompt {
    fn read_password(&mut self, prompt: &str) -> io::Result<SecretBuffer> {
        let password = rpassword::prompt_password(prompt)?;
        Ok(SecretBuffer::new(password.into_bytes(), Provenance::Prompt))
    }
}

pub trait Environment {
    /// Copies the value of `name` out of the environment
    fn lookup(&self, name: &str) -> Option<SecretBuffer>;
}

pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn lookup(&self, name: &str) -> Option<SecretBuffer> {
        std::env::var_os(name)
            .map(OsString::into_vec)
            .map(|value| SecretBuffer::new(value, Provenance::Environment))
    }
}

/// Result of resolution. `secret` is `None` exactly for [`CredentialMode::ForcedClear`].
#[derive(Debug)]
pub struct ResolvedSecret {
    secret: Option<SecretBuffer>,
    mode: CredentialMode,
}

impl ResolvedSecret {
    pub fn mode(&self) -> CredentialMode {
        self.mode
    }

    pub fn secret(&self) -> Option<&SecretBuffer> {
        self.secret.as_ref()
    }

    pub fn into_secret(self) -> Option<SecretBuffer> {
        self.secret
    }
}

pub struct SecretResolver<'a> {
    options: &'a Options,
}

impl<'a> SecretResolver<'a> {
    pub fn new(options: &'a Options) -> Self {
        Self { options }
    }

    pub fn resolve<P, E>(&self, prompt: &mut P, env: &E) -> Result<ResolvedSecret>
    where
        P: PasswordPrompt,
        E: Environment,
    {
        let mode = self.options.mode();
        let secret = match mode {
            CredentialMode::ForcedClear => {
                log::debug!("Changing mode to use force authorization");
                None
            }
            CredentialMode::WellKnown => {
                log::debug!("Using TSS_WELL_KNOWN_SECRET to authorize the TPM command");
                Some(SecretBuffer::well_known())
            }
            _ => {
                let text = self.secret_text(prompt, env)?;
                Some(self.encode(text)?)
            }
        };
        if let Some(secret) = &secret {
            log::debug!(
                "Resolved {:?} owner secret of {} bytes from {:?}",
                mode,
                secret.len(),
                secret.provenance()
            );
        }
        Ok(ResolvedSecret { secret, mode })
    }

    /// The secret as the operator supplied it, before any decoding.
    fn secret_text<P, E>(&self, prompt: &mut P, env: &E) -> Result<SecretBuffer>
    where
        P: PasswordPrompt,
        E: Environment,
    {
        match self.options.owner.as_deref() {
            None => prompt
                .read_password(OWNER_PROMPT)
                .map_err(CredentialError::PromptFailed),
            Some(name) if self.options.use_env => {
                env.lookup(name).ok_or_else(|| CredentialError::EnvVarUndefined {
                    name: name.to_owned(),
                })
            }
            Some(literal) => Ok(SecretBuffer::copy_from(
                literal.as_bytes(),
                Provenance::Literal,
            )),
        }
    }

    /// Turns operator text into authorization bytes; `text` is scrubbed when
    /// it is not the returned buffer itself. Unicode encoding only applies to
    /// prompted text, literal and environment secrets are bound as given.
    fn encode(&self, text: SecretBuffer) -> Result<SecretBuffer> {
        if self.options.use_hex {
            Ok(secret::decode_hex(text.as_bytes())?)
        } else if self.options.unicode && text.provenance() == Provenance::Prompt {
            Ok(secret::to_utf16le(text.as_bytes())?)
        } else {
            Ok(text)
        }
    }
}
