use std::str::FromStr;
use thiserror::Error;
use tss_esapi::handles::{AuthHandle, ObjectHandle};
use tss_esapi::interface_types::session_handles::AuthSession;
use tss_esapi::structures::Auth;
use tss_esapi::tcti_ldr::TctiNameConf;

pub mod clear;

#[derive(Error, Debug)]
pub enum TpmError {
    #[error("failed to establish a TPM session")]
    SessionError(#[source] tss_esapi::Error),
    #[error("failed to set the owner secret on the authorization policy")]
    PolicyBindFailed(#[source] tss_esapi::Error),
    #[error("TPM rejected the clear command")]
    ClearRejected(#[source] tss_esapi::Error),
}

pub type Result<T, E = TpmError> = core::result::Result<T, E>;

pub type Context = tss_esapi::Context;

/// What the clear workflow needs from an open TPM session.
pub trait TpmSession {
    /// Sets `secret` as the authorization value used for the next clear.
    fn bind_owner_auth(&mut self, secret: &[u8]) -> Result<()>;
    /// Issues TPM2_Clear. `force` uses platform (physical presence)
    /// authorization instead of the bound owner secret.
    fn clear_owner(&mut self, force: bool) -> Result<()>;
}

impl<T: TpmSession + ?Sized> TpmSession for &mut T {
    fn bind_owner_auth(&mut self, secret: &[u8]) -> Result<()> {
        (**self).bind_owner_auth(secret)
    }

    fn clear_owner(&mut self, force: bool) -> Result<()> {
        (**self).clear_owner(force)
    }
}

/// Hierarchy whose authorization is checked by TPM2_Clear.
fn clear_authority(force: bool) -> AuthHandle {
    match force {
        true => AuthHandle::Platform,
        false => AuthHandle::Lockout,
    }
}

/// Copies `secret` into a TPM authorization value. Secrets longer than a
/// TPM2B_AUTH can hold are rejected like any other failed assignment.
fn owner_auth(secret: &[u8]) -> Result<Auth> {
    Auth::try_from(secret.to_vec()).map_err(TpmError::PolicyBindFailed)
}

impl TpmSession for Context {
    fn bind_owner_auth(&mut self, secret: &[u8]) -> Result<()> {
        let auth = owner_auth(secret)?;
        self.tr_set_auth(ObjectHandle::from(clear_authority(false)), auth)
            .map_err(TpmError::PolicyBindFailed)
    }

    fn clear_owner(&mut self, force: bool) -> Result<()> {
        let authority = clear_authority(force);
        log::debug!("Issuing TPM2_Clear with {:?} authorization", authority);
        self.execute_with_session(Some(AuthSession::Password), |ctx| ctx.clear(authority))
            .map_err(TpmError::ClearRejected)
    }
}

/// Opens a TPM context through `tcti`. The caller owns it; dropping it
/// finalizes the ESYS context and closes the TCTI.
pub fn get_context(tcti: &str) -> Result<Context> {
    let conf = TctiNameConf::from_str(tcti).map_err(TpmError::SessionError)?;
    log::debug!("TCTI config {:?}", conf);
    Context::new(conf).map_err(TpmError::SessionError)
}
