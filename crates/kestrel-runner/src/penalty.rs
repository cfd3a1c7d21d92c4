use kestrel_events::{SecurityViolation, Severity};
use kestrel_world::ConnectionId;

/// What happens to a connection after a contained violation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PenaltyAction {
    /// Log only
    Ignore,
    /// Tell the client it was noticed
    Warn,
    /// Drop the connection
    Disconnect,
}

/// Decides the consequence of a contained security violation
pub trait Penalty: Send + Sync {
    fn apply(&self, connection: ConnectionId, violation: &SecurityViolation) -> PenaltyAction;
}

impl<F> Penalty for F
where
    F: Fn(ConnectionId, &SecurityViolation) -> PenaltyAction + Send + Sync,
{
    fn apply(&self, connection: ConnectionId, violation: &SecurityViolation) -> PenaltyAction {
        (self)(connection, violation)
    }
}

/// Disconnects on severe violations and warns on anything milder
#[derive(Debug, Clone, Copy, Default)]
pub struct DisconnectPenalty;

impl Penalty for DisconnectPenalty {
    fn apply(&self, _connection: ConnectionId, violation: &SecurityViolation) -> PenaltyAction {
        match violation.severity {
            Severity::Severe => PenaltyAction::Disconnect,
            Severity::Mild | Severity::Moderate => PenaltyAction::Warn,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnect_penalty_by_severity() {
        let penalty = DisconnectPenalty;
        let conn = ConnectionId(1);
        assert_eq!(penalty.apply(conn, &SecurityViolation::mild("x")), PenaltyAction::Warn);
        assert_eq!(penalty.apply(conn, &SecurityViolation::moderate("x")), PenaltyAction::Warn);
        assert_eq!(
            penalty.apply(conn, &SecurityViolation::severe("x")),
            PenaltyAction::Disconnect
        );
    }
}
