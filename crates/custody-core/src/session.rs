//! Interactive submission of a secret, one answer at a time.
//!
//! A [`Session`] asks for the secret, then the number of shares, then the
//! threshold. Invalid answers are asked again without leaving the current
//! state; abandoning a session leaves nothing behind.
use std::{fmt, mem};
use thiserror::Error;
use threshold_sss::{MAX_SHARES, MIN_THRESHOLD};

/// The state of a submission in progress.
#[derive(Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingSecret,
    AwaitingShareCount { secret: Vec<u8> },
    AwaitingThreshold { secret: Vec<u8>, total_shares: usize },
}

// never print the secret
impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SessionState::Idle => f.write_str("Idle"),
            SessionState::AwaitingSecret => f.write_str("AwaitingSecret"),
            SessionState::AwaitingShareCount { .. } => f.write_str("AwaitingShareCount"),
            SessionState::AwaitingThreshold { total_shares, .. } => f
                .debug_struct("AwaitingThreshold")
                .field("total_shares", total_shares)
                .finish(),
        }
    }
}

/// A fully answered submission.
#[derive(Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    pub secret: Vec<u8>,
    pub total_shares: usize,
    pub threshold: usize,
}

impl fmt::Debug for SubmitRequest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SubmitRequest")
            .field("secret", &"<hidden>")
            .field("total_shares", &self.total_shares)
            .field("threshold", &self.threshold)
            .finish()
    }
}

/// What the session answers to an input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The answer was accepted, the next question follows
    Prompt(String),
    /// The answer was rejected, the same question is asked again
    Retry(String),
    /// Every answer was given; the session is idle again
    Ready(SubmitRequest),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("no submission in progress, start one first")]
    NotStarted,
}

#[derive(Debug, Default)]
pub struct Session {
    state: SessionState,
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Idle
    }
}

fn share_count_prompt() -> String {
    format!(
        "How many shares should be created? Enter a number between {} and {}.",
        MIN_THRESHOLD, MAX_SHARES
    )
}

fn threshold_prompt(total_shares: usize) -> String {
    format!(
        "How many shares should be required to reconstruct the secret? Enter a number between {} and {}.",
        MIN_THRESHOLD, total_shares
    )
}

fn parse_in_range(input: &str, min: usize, max: usize) -> Option<usize> {
    input
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|n| (min..=max).contains(n))
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == SessionState::Idle
    }

    /// Starts (or restarts) a submission and returns the first question.
    pub fn start(&mut self) -> String {
        self.state = SessionState::AwaitingSecret;
        "Please enter the secret you want to share.".to_string()
    }

    /// Abandons the submission in progress, if any.
    pub fn cancel(&mut self) {
        self.state = SessionState::Idle;
    }

    /// Feeds the answer to the current question.
    pub fn handle(&mut self, input: &str) -> Result<Step, SessionError> {
        let (next, step) = match mem::take(&mut self.state) {
            SessionState::Idle => return Err(SessionError::NotStarted),
            SessionState::AwaitingSecret => {
                if input.is_empty() {
                    (
                        SessionState::AwaitingSecret,
                        Step::Retry("The secret cannot be empty, please enter it again.".into()),
                    )
                } else {
                    (
                        SessionState::AwaitingShareCount {
                            secret: input.as_bytes().to_vec(),
                        },
                        Step::Prompt(share_count_prompt()),
                    )
                }
            }
            SessionState::AwaitingShareCount { secret } => {
                match parse_in_range(input, MIN_THRESHOLD, MAX_SHARES) {
                    Some(total_shares) => (
                        SessionState::AwaitingThreshold {
                            secret,
                            total_shares,
                        },
                        Step::Prompt(threshold_prompt(total_shares)),
                    ),
                    None => (
                        SessionState::AwaitingShareCount { secret },
                        Step::Retry(format!(
                            "Please enter a valid number between {} and {}.",
                            MIN_THRESHOLD, MAX_SHARES
                        )),
                    ),
                }
            }
            SessionState::AwaitingThreshold {
                secret,
                total_shares,
            } => match parse_in_range(input, MIN_THRESHOLD, total_shares) {
                Some(threshold) => (
                    SessionState::Idle,
                    Step::Ready(SubmitRequest {
                        secret,
                        total_shares,
                        threshold,
                    }),
                ),
                None => (
                    SessionState::AwaitingThreshold {
                        secret,
                        total_shares,
                    },
                    Step::Retry(format!(
                        "Please enter a valid number between {} and {}.",
                        MIN_THRESHOLD, total_shares
                    )),
                ),
            },
        };
        self.state = next;
        Ok(step)
    }
}
