//! TPM2_Clear driven through typestate contexts.
//!
//! A session starts [`Connected`]; it has to either bind the owner secret
//! ([`PolicyBound`]) or explicitly switch to physical presence ([`Forced`])
//! before `clear()` becomes available, so a clear can never be issued with
//! both a secret and force, or with neither.

use super::{Result, TpmSession};
use crate::credential::ResolvedSecret;
use crate::secret::{Provenance, SecretBuffer};

/// A clear that either carries the owner secret or is forced.
#[derive(Debug)]
pub enum ClearRequest {
    Forced,
    Authorized(SecretBuffer),
}

impl ClearRequest {
    pub fn is_forced(&self) -> bool {
        matches!(self, ClearRequest::Forced)
    }
}

impl From<ResolvedSecret> for ClearRequest {
    fn from(resolved: ResolvedSecret) -> Self {
        match resolved.into_secret() {
            Some(secret) => ClearRequest::Authorized(secret),
            None => ClearRequest::Forced,
        }
    }
}

pub struct ClearContext<C: TpmSession, S: ClearState> {
    ctx: C,
    state: S,
}

pub trait ClearState {}

pub struct Connected;
pub struct PolicyBound {
    provenance: Provenance,
    len: usize,
}
pub struct Forced;

impl ClearState for Connected {}
impl ClearState for PolicyBound {}
impl ClearState for Forced {}

impl<C: TpmSession> ClearContext<C, Connected> {
    pub fn new(ctx: C) -> Self {
        Self {
            ctx,
            state: Connected,
        }
    }

    /// Binds `secret` as the clear authorization. The bytes are only
    /// borrowed; the caller keeps ownership and scrubs them.
    pub fn bind_owner_auth(
        mut self,
        secret: &SecretBuffer,
    ) -> Result<ClearContext<C, PolicyBound>> {
        self.ctx.bind_owner_auth(secret.as_bytes())?;
        Ok(ClearContext {
            ctx: self.ctx,
            state: PolicyBound {
                provenance: secret.provenance(),
                len: secret.len(),
            },
        })
    }

    pub fn force(self) -> ClearContext<C, Forced> {
        ClearContext {
            ctx: self.ctx,
            state: Forced,
        }
    }
}

impl<C: TpmSession> ClearContext<C, PolicyBound> {
    pub fn clear(mut self) -> Result<()> {
        log::debug!(
            "Clearing with {} byte owner secret from {:?}",
            self.state.len,
            self.state.provenance
        );
        self.ctx.clear_owner(false)
    }
}

impl<C: TpmSession> ClearContext<C, Forced> {
    pub fn clear(mut self) -> Result<()> {
        log::debug!("Clearing with physical presence authorization");
        self.ctx.clear_owner(true)
    }
}

/// Issues the clear described by `request`. No retry; errors pass through.
pub fn clear<C: TpmSession>(session: C, request: &ClearRequest) -> Result<()> {
    let connected = ClearContext::new(session);
    match request {
        ClearRequest::Forced => connected.force().clear(),
        ClearRequest::Authorized(secret) => connected.bind_owner_auth(secret)?.clear(),
    }
}
