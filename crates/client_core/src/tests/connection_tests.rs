use super::*;
use crate::notifications::Severity;

fn connected() -> ConnectionManager {
    let mut manager = ConnectionManager::default();
    manager.begin_connect().expect("connect");
    manager.transport_opened().expect("open");
    manager
}

fn authenticated() -> ConnectionManager {
    let mut manager = connected();
    manager.authenticate("agent", "secret").expect("auth command");
    assert!(matches!(
        manager.auth_response(true, None),
        AuthOutcome::Accepted(_)
    ));
    manager
}

#[test]
fn connect_then_open_emits_one_notification_each() {
    let mut manager = ConnectionManager::default();
    let connecting = manager.begin_connect().expect("connect");
    assert_eq!(connecting.from, ConnectionState::Disconnected);
    assert_eq!(connecting.to, ConnectionState::Connecting);

    let opened = manager.transport_opened().expect("open");
    assert_eq!(opened.to, ConnectionState::ConnectedUnauthenticated);
    assert_eq!(opened.notification.severity, Severity::Success);
    assert!(manager.is_connected());
    assert!(!manager.is_authenticated());
}

#[test]
fn connect_failure_returns_to_disconnected() {
    let mut manager = ConnectionManager::default();
    manager.begin_connect().expect("connect");
    let failed = manager.transport_failed("refused").expect("transition");
    assert_eq!(failed.to, ConnectionState::Disconnected);
    assert_eq!(failed.notification.severity, Severity::Error);
    assert!(manager.transport_failed("again").is_none());
}

#[test]
fn connect_is_rejected_while_connected() {
    let mut manager = connected();
    assert!(matches!(
        manager.begin_connect(),
        Err(ClientError::InvalidState { operation: "connect", .. })
    ));
}

#[test]
fn authenticate_requires_unauthenticated_connection() {
    let mut manager = ConnectionManager::default();
    assert!(matches!(
        manager.authenticate("agent", "secret"),
        Err(ClientError::NotConnected)
    ));

    let mut manager = connected();
    assert!(matches!(
        manager.authenticate("  ", "secret"),
        Err(ClientError::Validation(_))
    ));
    let command = manager.authenticate(" agent ", " secret ").expect("command");
    assert_eq!(
        command,
        ClientCommand::Authenticate {
            username: "agent".into(),
            password: "secret".into()
        }
    );

    let mut manager = authenticated();
    assert!(matches!(
        manager.authenticate("agent", "secret"),
        Err(ClientError::InvalidState { .. })
    ));
}

#[test]
fn rejected_auth_disconnects_without_retry() {
    let mut manager = connected();
    manager.authenticate("agent", "wrong").expect("command");
    let AuthOutcome::Rejected(transition) = manager.auth_response(false, Some("bad password"))
    else {
        panic!("expected rejection");
    };
    assert_eq!(transition.to, ConnectionState::Disconnected);
    assert_eq!(
        transition.notification.message,
        "Authentication failed: bad password"
    );

    // The forced close that follows must not schedule anything.
    let closure = manager.transport_closed(&CloseReason::Remote);
    assert_eq!(closure.transition, None);
    assert_eq!(closure.reconnect_after, None);
}

#[test]
fn rejection_without_message_uses_default_reason() {
    let mut manager = connected();
    let AuthOutcome::Rejected(transition) = manager.auth_response(false, Some(" ")) else {
        panic!("expected rejection");
    };
    assert_eq!(
        transition.notification.message,
        "Authentication failed: Invalid credentials"
    );
}

#[test]
fn drop_while_authenticated_schedules_exactly_one_retry() {
    let mut manager = authenticated();
    let closure = manager.transport_closed(&CloseReason::Remote);
    assert_eq!(closure.reconnect_after, Some(DEFAULT_RECONNECT_DELAY));
    assert_eq!(
        closure.transition.map(|t| t.to),
        Some(ConnectionState::ReconnectPending)
    );

    // A duplicate closure event must not schedule a second attempt.
    let again = manager.transport_closed(&CloseReason::Error("reset".into()));
    assert_eq!(again.reconnect_after, None);
    assert_eq!(again.transition, None);

    let reconnecting = manager.begin_connect().expect("retry");
    assert_eq!(reconnecting.from, ConnectionState::ReconnectPending);
    assert!(manager.is_reconnecting());
}

#[test]
fn drop_before_authentication_never_retries() {
    let mut manager = connected();
    let closure = manager.transport_closed(&CloseReason::Error("reset".into()));
    assert_eq!(closure.reconnect_after, None);
    let transition = closure.transition.expect("transition");
    assert_eq!(transition.to, ConnectionState::Disconnected);
    assert_eq!(transition.notification.severity, Severity::Error);

    let mut manager = ConnectionManager::default();
    manager.begin_connect().expect("connect");
    assert_eq!(
        manager.transport_closed(&CloseReason::Remote).reconnect_after,
        None
    );
}

#[test]
fn reconnect_replays_accepted_credentials_once_connected() {
    let mut manager = authenticated();
    assert!(manager.resume_authentication().is_none(), "not reconnecting");

    manager.transport_closed(&CloseReason::Remote);
    manager.begin_connect().expect("retry");
    assert!(manager.resume_authentication().is_none(), "not yet open");
    manager.transport_opened().expect("open");

    assert_eq!(
        manager.resume_authentication(),
        Some(ClientCommand::Authenticate {
            username: "agent".into(),
            password: "secret".into()
        })
    );
}

#[test]
fn failed_reauthentication_forgets_credentials() {
    let mut manager = authenticated();
    manager.transport_closed(&CloseReason::Remote);
    manager.begin_connect().expect("retry");
    manager.transport_opened().expect("open");
    manager.resume_authentication().expect("replay");
    assert!(matches!(
        manager.auth_response(false, None),
        AuthOutcome::Rejected(_)
    ));
    assert!(!manager.is_reconnecting());
}

#[test]
fn auth_response_outside_handshake_is_unexpected() {
    let mut manager = authenticated();
    assert_eq!(manager.auth_response(true, None), AuthOutcome::Unexpected);
}

#[test]
fn shutdown_disconnects_once() {
    let mut manager = authenticated();
    assert_eq!(
        manager.shutdown().map(|t| t.to),
        Some(ConnectionState::Disconnected)
    );
    assert!(manager.shutdown().is_none());
    assert_eq!(manager.transport_closed(&CloseReason::Remote).reconnect_after, None);
}

#[test]
fn credentials_debug_redacts_password() {
    let credentials = Credentials {
        username: "agent".into(),
        password: "hunter2".into(),
    };
    let rendered = format!("{credentials:?}");
    assert!(rendered.contains("agent"));
    assert!(!rendered.contains("hunter2"));
}
