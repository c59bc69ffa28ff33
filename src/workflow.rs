//! The credential-to-clear sequence.
//!
//! Secret buffers are owned by this scope and scrub themselves when dropped,
//! so every return below (including each `?`) leaves no secret bytes behind.
//! `request` is declared after `session`, so it is dropped (scrubbed) before
//! the session is dropped, which finalizes the TPM context.

use crate::credential::{CredentialError, Environment, Options, PasswordPrompt, SecretResolver};
use crate::tpm::clear::{self, ClearRequest};
use crate::tpm::{TpmError, TpmSession};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    Tpm(#[from] TpmError),
}

pub type Result<T, E = WorkflowError> = core::result::Result<T, E>;

/// Connects, resolves the owner secret, binds it (unless forced) and clears the TPM.
pub fn clear_ownership<S, F, P, E>(
    options: &Options,
    connect: F,
    prompt: &mut P,
    env: &E,
) -> Result<()>
where
    S: TpmSession,
    F: FnOnce() -> crate::tpm::Result<S>,
    P: PasswordPrompt,
    E: Environment,
{
    let mut session = connect()?;
    let request = ClearRequest::from(SecretResolver::new(options).resolve(prompt, env)?);
    clear::clear(&mut session, &request)?;
    log::info!(
        "TPM cleared {}",
        match request.is_forced() {
            true => "with physical presence",
            false => "with owner authorization",
        }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::tests::{owner, FakeEnvironment, ScriptedPrompt};
    use crate::secret::ledger;
    use crate::secret::Provenance;
    use crate::tpm::mock::{tss_error, Call, MockSession};
    use std::cell::Cell;
    use std::rc::Rc;

    /// Notes how many buffers had been scrubbed when the session was dropped.
    struct ClosingSession {
        inner: MockSession,
        scrubs_at_close: Rc<Cell<Option<usize>>>,
    }

    impl TpmSession for ClosingSession {
        fn bind_owner_auth(&mut self, secret: &[u8]) -> crate::tpm::Result<()> {
            self.inner.bind_owner_auth(secret)
        }

        fn clear_owner(&mut self, force: bool) -> crate::tpm::Result<()> {
            self.inner.clear_owner(force)
        }
    }

    impl Drop for ClosingSession {
        fn drop(&mut self) {
            self.scrubs_at_close.set(Some(ledger::count()));
        }
    }

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn run(
        options: &Options,
        session: &mut MockSession,
        prompt: &mut ScriptedPrompt,
        env: &FakeEnvironment,
    ) -> Result<()> {
        init_logging();
        clear_ownership(options, move || Ok(session), prompt, env)
    }

    #[test]
    fn hex_secret_end_to_end() {
        ledger::take();
        let options = Options {
            owner: owner("74657374"),
            use_hex: true,
            ..Default::default()
        };
        let mut session = MockSession::default();
        run(
            &options,
            &mut session,
            &mut ScriptedPrompt::failing(),
            &FakeEnvironment::default(),
        )
        .unwrap();
        assert_eq!(
            session.calls,
            vec![
                Call::Bind(vec![0x74, 0x65, 0x73, 0x74]),
                Call::Clear { force: false }
            ]
        );
        let scrubbed = ledger::take();
        assert_eq!(scrubbed.len(), 2);
        assert!(scrubbed.iter().all(|r| r.zeroed));
        assert_eq!(scrubbed[1].provenance, Provenance::HexDecoded);
        assert_eq!(scrubbed[1].len, 4);
    }

    #[test]
    fn session_closes_after_scrub() {
        ledger::take();
        let scrubs_at_close = Rc::new(Cell::new(None));
        let session = ClosingSession {
            inner: MockSession::default(),
            scrubs_at_close: scrubs_at_close.clone(),
        };
        let options = Options {
            owner: owner("74657374"),
            use_hex: true,
            ..Default::default()
        };
        clear_ownership(
            &options,
            move || Ok(session),
            &mut ScriptedPrompt::failing(),
            &FakeEnvironment::default(),
        )
        .unwrap();
        // both the hex text and the decoded secret were gone before the close
        assert_eq!(scrubs_at_close.get(), Some(2));
        assert_eq!(ledger::take().len(), 2);
    }

    #[test]
    fn session_closes_after_scrub_on_failure() {
        ledger::take();
        let scrubs_at_close = Rc::new(Cell::new(None));
        let session = ClosingSession {
            inner: MockSession {
                reject_clear: true,
                ..Default::default()
            },
            scrubs_at_close: scrubs_at_close.clone(),
        };
        let err = clear_ownership(
            &Options::default(),
            move || Ok(session),
            &mut ScriptedPrompt::answering("wrong"),
            &FakeEnvironment::default(),
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::Tpm(TpmError::ClearRejected(_))));
        assert_eq!(scrubs_at_close.get(), Some(1));
    }

    #[test]
    fn forced_clear_reads_nothing() {
        let options = Options {
            owner: owner("IGNORED"),
            use_env: true,
            force: true,
            ..Default::default()
        };
        let mut session = MockSession::default();
        let mut prompt = ScriptedPrompt::answering("unused");
        let env = FakeEnvironment::default();
        run(&options, &mut session, &mut prompt, &env).unwrap();
        assert_eq!(session.calls, vec![Call::Clear { force: true }]);
        assert_eq!(prompt.calls, 0);
        assert_eq!(env.lookups.get(), 0);
    }

    #[test]
    fn undefined_env_var_issues_no_tpm_call() {
        let options = Options {
            owner: owner("FOO"),
            use_env: true,
            ..Default::default()
        };
        let mut session = MockSession::default();
        let err = run(
            &options,
            &mut session,
            &mut ScriptedPrompt::failing(),
            &FakeEnvironment::default(),
        )
        .unwrap_err();
        match err {
            WorkflowError::Credential(CredentialError::EnvVarUndefined { name }) => {
                assert_eq!(name, "FOO")
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(session.calls.is_empty());
    }

    #[test]
    fn rejected_clear_still_scrubs() {
        ledger::take();
        let options = Options {
            owner: owner("wrong"),
            ..Default::default()
        };
        let mut session = MockSession {
            reject_clear: true,
            ..Default::default()
        };
        let err = run(
            &options,
            &mut session,
            &mut ScriptedPrompt::failing(),
            &FakeEnvironment::default(),
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::Tpm(TpmError::ClearRejected(_))));
        let scrubbed = ledger::take();
        assert_eq!(scrubbed.len(), 1);
        assert_eq!(scrubbed[0].provenance, Provenance::Literal);
        assert!(scrubbed[0].zeroed);
    }

    #[test]
    fn bind_failure_still_scrubs() {
        ledger::take();
        let mut session = MockSession {
            reject_bind: true,
            ..Default::default()
        };
        let err = run(
            &Options::default(),
            &mut session,
            &mut ScriptedPrompt::answering("secret"),
            &FakeEnvironment::default(),
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::Tpm(TpmError::PolicyBindFailed(_))));
        assert_eq!(session.calls.len(), 1);
        let scrubbed = ledger::take();
        assert_eq!(scrubbed.len(), 1);
        assert_eq!(scrubbed[0].provenance, Provenance::Prompt);
    }

    #[test]
    fn session_failure_aborts_before_prompt() {
        let mut prompt = ScriptedPrompt::answering("secret");
        let err = clear_ownership::<MockSession, _, _, _>(
            &Options::default(),
            || Err(TpmError::SessionError(tss_error())),
            &mut prompt,
            &FakeEnvironment::default(),
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::Tpm(TpmError::SessionError(_))));
        assert_eq!(prompt.calls, 0);
    }

    #[test]
    fn well_known_end_to_end() {
        let options = Options {
            owner: owner("ignored"),
            well_known: true,
            ..Default::default()
        };
        let mut session = MockSession::default();
        run(
            &options,
            &mut session,
            &mut ScriptedPrompt::failing(),
            &FakeEnvironment::default(),
        )
        .unwrap();
        assert_eq!(
            session.calls,
            vec![Call::Bind(vec![0; 20]), Call::Clear { force: false }]
        );
    }
}
