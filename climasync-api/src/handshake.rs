use crate::frame::Frame;
use crate::models::Role;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    NotStarted,
    AwaitingPeerReady,
    Completed,
    Failed,
}

impl HandshakeState {
    pub fn name(self) -> &'static str {
        match self {
            Self::NotStarted => "not-started",
            Self::AwaitingPeerReady => "awaiting-peer-ready",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeEvent {
    /// Handshake is completed; `reply` must be sent back to the peer if present
    Completed { reply: Option<Frame> },
    Ignored,
}

/// Readiness exchange for one channel connection.
///
/// Pure state machine: it never touches the channel or the clock. The caller
/// transmits the frames it hands out and reports timeouts.
#[derive(Debug, Clone)]
pub struct Handshake {
    role: Role,
    state: HandshakeState,
    attempts: u8,
    policy: RetryPolicy,
}

impl Handshake {
    pub fn new(role: Role, policy: RetryPolicy) -> Self {
        Self {
            role,
            state: HandshakeState::NotStarted,
            attempts: 0,
            policy,
        }
    }

    /// Starts a fresh round and returns our readiness declaration.
    pub fn begin(&mut self) -> Frame {
        self.state = HandshakeState::AwaitingPeerReady;
        self.attempts = 1;
        self.declaration()
    }

    pub fn on_frame(&mut self, frame: &Frame) -> HandshakeEvent {
        let Frame::Handshake(sender) = frame else {
            return HandshakeEvent::Ignored;
        };
        if *sender != self.role.peer() {
            return HandshakeEvent::Ignored;
        }

        match self.state {
            HandshakeState::AwaitingPeerReady => {
                self.state = HandshakeState::Completed;
                HandshakeEvent::Completed {
                    reply: self.role.answers_peer().then(|| self.declaration()),
                }
            }
            // The responder re-synchronises whenever the peer restarts its side.
            _ if self.role.answers_peer() => {
                self.state = HandshakeState::Completed;
                self.attempts = 0;
                HandshakeEvent::Completed {
                    reply: Some(self.declaration()),
                }
            }
            _ => HandshakeEvent::Ignored,
        }
    }

    /// Called when the current attempt timed out. Returns the frame to resend,
    /// or `None` once the budget is spent and the state is `Failed`.
    pub fn on_timeout(&mut self) -> Option<Frame> {
        if self.state != HandshakeState::AwaitingPeerReady {
            return None;
        }

        if self.attempts >= self.policy.max_attempts {
            self.state = HandshakeState::Failed;
            return None;
        }

        self.attempts += 1;
        Some(self.declaration())
    }

    pub fn reset(&mut self) {
        self.state = HandshakeState::NotStarted;
        self.attempts = 0;
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn is_completed(&self) -> bool {
        self.state == HandshakeState::Completed
    }

    pub fn attempts(&self) -> u8 {
        self.attempts
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn declaration(&self) -> Frame {
        Frame::Handshake(self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_completes_on_hub_ready() {
        let mut handshake = Handshake::new(Role::Station, RetryPolicy::HANDSHAKE);
        assert_eq!(handshake.begin(), Frame::Handshake(Role::Station));
        assert_eq!(handshake.state(), HandshakeState::AwaitingPeerReady);

        assert_eq!(handshake.on_frame(&Frame::Ack), HandshakeEvent::Ignored);
        assert_eq!(
            handshake.on_frame(&Frame::Handshake(Role::Station)),
            HandshakeEvent::Ignored
        );

        let event = handshake.on_frame(&Frame::Handshake(Role::Hub));
        assert_eq!(event, HandshakeEvent::Completed { reply: None });
        assert!(handshake.is_completed());
    }

    #[test]
    fn test_station_ignores_unsolicited_ready() {
        let mut handshake = Handshake::new(Role::Station, RetryPolicy::HANDSHAKE);
        assert_eq!(
            handshake.on_frame(&Frame::Handshake(Role::Hub)),
            HandshakeEvent::Ignored
        );
        assert_eq!(handshake.state(), HandshakeState::NotStarted);
    }

    #[test]
    fn test_hub_answers_every_station_ready() {
        let mut handshake = Handshake::new(Role::Hub, RetryPolicy::HANDSHAKE);
        let ready = Frame::Handshake(Role::Station);

        for _ in 0..2 {
            let event = handshake.on_frame(&ready);
            assert_eq!(
                event,
                HandshakeEvent::Completed {
                    reply: Some(Frame::Handshake(Role::Hub))
                }
            );
            assert!(handshake.is_completed());
        }
    }

    #[test]
    fn test_timeouts_exhaust_into_failed() {
        let mut handshake = Handshake::new(Role::Station, RetryPolicy::HANDSHAKE);
        handshake.begin();

        for expected in 2..=5 {
            assert_eq!(handshake.on_timeout(), Some(Frame::Handshake(Role::Station)));
            assert_eq!(handshake.attempts(), expected);
        }

        assert_eq!(handshake.on_timeout(), None);
        assert_eq!(handshake.state(), HandshakeState::Failed);

        // a late READY no longer completes a failed station handshake
        assert_eq!(
            handshake.on_frame(&Frame::Handshake(Role::Hub)),
            HandshakeEvent::Ignored
        );

        handshake.reset();
        assert_eq!(handshake.state(), HandshakeState::NotStarted);
        assert_eq!(handshake.attempts(), 0);
    }

    #[test]
    fn test_timeout_outside_round_is_noop() {
        let mut handshake = Handshake::new(Role::Hub, RetryPolicy::HANDSHAKE);
        assert_eq!(handshake.on_timeout(), None);
        assert_eq!(handshake.state(), HandshakeState::NotStarted);
    }
}
