//! Credential flow state machine.
//!
//! Each in-progress signup or recovery attempt is one `CredentialFlow`
//! record, held server-side (see `store.rs`) and advanced exactly one step
//! per successful operation. The email captured at initiation is pinned on
//! the record; verification always runs against the pinned email, never
//! against client input.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// One-time codes are fixed-length; anything shorter or longer is refused
/// before any provider call.
pub const OTP_CODE_LEN: usize = 8;

/// Flow records expire with the code they track.
pub const FLOW_TTL_SECS: u64 = 15 * 60;

/// Fixed user-facing message for every verification failure. Provider
/// internals are never echoed on this path.
pub const INVALID_CODE_MESSAGE: &str = "Invalid or expired code.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Signup,
    Recovery,
}

/// Ordered steps of a credential flow.
///
/// Signup:   `Form → Otp → Complete`
/// Recovery: `Form → Otp → Password → Complete`
///
/// `Form` is the entry step (identity collection); a stored record enters
/// `Otp` once a code has actually been dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStep {
    Form,
    Otp,
    Password,
    Complete,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error("Another request is already in progress")]
    AlreadyInFlight,

    #[error("This step is not available in the current flow state")]
    WrongStep,

    #[error("This operation does not apply to a {0:?} flow")]
    KindMismatch(FlowKind),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialFlow {
    pub id: Uuid,
    pub kind: FlowKind,
    pub step: FlowStep,
    /// Pinned at initiation; the only email verification may run against.
    email: String,
    /// Identity id issued by the provider at code generation, when known.
    pub user_id: Option<Uuid>,
    pub last_error: Option<String>,
    in_flight: bool,
}

impl CredentialFlow {
    pub fn signup(email: &str) -> Self {
        Self::new(FlowKind::Signup, email)
    }

    pub fn recovery(email: &str) -> Self {
        Self::new(FlowKind::Recovery, email)
    }

    fn new(kind: FlowKind, email: &str) -> Self {
        CredentialFlow {
            id: Uuid::new_v4(),
            kind,
            step: FlowStep::Form,
            email: email.trim().to_lowercase(),
            user_id: None,
            last_error: None,
            in_flight: false,
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Marks the start of a submission: refuses a second concurrent submit
    /// and clears the previous error before the new request is issued.
    pub fn begin_submit(&mut self) -> Result<(), FlowError> {
        if self.in_flight {
            return Err(FlowError::AlreadyInFlight);
        }
        self.in_flight = true;
        self.last_error = None;
        Ok(())
    }

    pub fn end_submit(&mut self) {
        self.in_flight = false;
    }

    /// `Form → Otp`: a one-time code has been generated and dispatched.
    pub fn code_dispatched(&mut self) -> Result<(), FlowError> {
        if self.step != FlowStep::Form {
            return Err(FlowError::WrongStep);
        }
        self.step = FlowStep::Otp;
        Ok(())
    }

    /// Advances past `Otp` after the provider accepted the code:
    /// signup completes, recovery moves on to the password step.
    pub fn code_verified(&mut self) -> Result<(), FlowError> {
        if self.step != FlowStep::Otp {
            return Err(FlowError::WrongStep);
        }
        self.step = match self.kind {
            FlowKind::Signup => FlowStep::Complete,
            FlowKind::Recovery => FlowStep::Password,
        };
        Ok(())
    }

    /// Records a rejected code. The flow stays at `Otp`.
    pub fn code_rejected(&mut self) {
        self.last_error = Some(INVALID_CODE_MESSAGE.to_string());
        self.in_flight = false;
    }

    /// `Password → Complete`, recovery flows only.
    pub fn password_updated(&mut self) -> Result<(), FlowError> {
        if self.kind != FlowKind::Recovery {
            return Err(FlowError::KindMismatch(self.kind));
        }
        if self.step != FlowStep::Password {
            return Err(FlowError::WrongStep);
        }
        self.step = FlowStep::Complete;
        Ok(())
    }

    /// Manual abort: back to the entry step with no memory of the previous
    /// code entry. The caller deletes the stored record, so a restarted flow
    /// begins from scratch.
    pub fn abort(&mut self) {
        self.step = FlowStep::Form;
        self.last_error = None;
        self.in_flight = false;
    }
}

/// Length gate applied before any provider call.
pub fn code_ready(code: &str) -> bool {
    code.chars().count() == OTP_CODE_LEN
}

/// Password/confirmation check applied before any provider call.
pub fn passwords_match(password: &str, confirm: &str) -> bool {
    !password.is_empty() && password == confirm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signup_happy_path_reaches_complete_once() {
        let mut flow = CredentialFlow::signup("a@x.com");
        assert_eq!(flow.step, FlowStep::Form);
        flow.code_dispatched().unwrap();
        assert_eq!(flow.step, FlowStep::Otp);
        flow.code_verified().unwrap();
        assert_eq!(flow.step, FlowStep::Complete);
        // A second verification cannot re-run after the terminal state.
        assert_eq!(flow.code_verified(), Err(FlowError::WrongStep));
    }

    #[test]
    fn test_recovery_happy_path() {
        let mut flow = CredentialFlow::recovery("a@x.com");
        flow.code_dispatched().unwrap();
        flow.code_verified().unwrap();
        assert_eq!(flow.step, FlowStep::Password);
        flow.password_updated().unwrap();
        assert_eq!(flow.step, FlowStep::Complete);
    }

    #[test]
    fn test_rejected_code_keeps_otp_step() {
        let mut flow = CredentialFlow::signup("a@x.com");
        flow.code_dispatched().unwrap();
        flow.begin_submit().unwrap();
        flow.code_rejected();
        assert_eq!(flow.step, FlowStep::Otp);
        assert_eq!(flow.last_error.as_deref(), Some(INVALID_CODE_MESSAGE));
        // The flow remains usable: a correct code still advances it.
        flow.begin_submit().unwrap();
        flow.code_verified().unwrap();
        assert_eq!(flow.step, FlowStep::Complete);
    }

    #[test]
    fn test_no_step_skipping() {
        let mut flow = CredentialFlow::recovery("a@x.com");
        // Password update straight from Form is rejected.
        assert_eq!(flow.password_updated(), Err(FlowError::WrongStep));
        flow.code_dispatched().unwrap();
        // Password update straight from Otp is rejected too.
        assert_eq!(flow.password_updated(), Err(FlowError::WrongStep));
    }

    #[test]
    fn test_password_step_is_recovery_only() {
        let mut flow = CredentialFlow::signup("a@x.com");
        flow.code_dispatched().unwrap();
        flow.code_verified().unwrap();
        assert_eq!(
            flow.password_updated(),
            Err(FlowError::KindMismatch(FlowKind::Signup))
        );
    }

    #[test]
    fn test_in_flight_latch_rejects_double_submit() {
        let mut flow = CredentialFlow::signup("a@x.com");
        flow.code_dispatched().unwrap();
        flow.begin_submit().unwrap();
        assert_eq!(flow.begin_submit(), Err(FlowError::AlreadyInFlight));
        flow.end_submit();
        assert!(flow.begin_submit().is_ok());
    }

    #[test]
    fn test_begin_submit_clears_previous_error() {
        let mut flow = CredentialFlow::signup("a@x.com");
        flow.code_dispatched().unwrap();
        flow.begin_submit().unwrap();
        flow.code_rejected();
        assert!(flow.last_error.is_some());
        flow.begin_submit().unwrap();
        assert!(flow.last_error.is_none());
    }

    #[test]
    fn test_abort_restarts_at_entry_step_with_no_stale_state() {
        let mut flow = CredentialFlow::recovery("a@x.com");
        flow.code_dispatched().unwrap();
        flow.begin_submit().unwrap();
        flow.code_rejected();
        flow.abort();
        assert_eq!(flow.step, FlowStep::Form);
        assert!(flow.last_error.is_none());
        assert!(flow.begin_submit().is_ok());
    }

    #[test]
    fn test_email_is_pinned_and_normalized() {
        let flow = CredentialFlow::signup("  Ada@X.Com ");
        assert_eq!(flow.email(), "ada@x.com");
    }

    #[test]
    fn test_code_ready_only_at_exact_length() {
        for len in 0..OTP_CODE_LEN {
            assert!(!code_ready(&"7".repeat(len)), "length {len} must be refused");
        }
        assert!(code_ready(&"7".repeat(OTP_CODE_LEN)));
        assert!(!code_ready(&"7".repeat(OTP_CODE_LEN + 1)));
    }

    #[test]
    fn test_passwords_match_rules() {
        assert!(passwords_match("Secret1!", "Secret1!"));
        assert!(!passwords_match("Secret1!", "secret1!"));
        assert!(!passwords_match("", ""));
    }
}
