//! Integration tests for trust state computation and notification.

use glimpse_core::{DocumentRef, HostTrust, SecurityMode, TrustGate};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn test_all_input_combinations() {
    for (trusted, scripts) in [(false, false), (false, true), (true, false), (true, true)] {
        let gate = TrustGate::new(Arc::new(HostTrust::new(trusted, scripts)));
        let state = gate.state();
        assert_eq!(state.project_trusted, trusted);
        assert_eq!(state.scripts_enabled, scripts);
        assert_eq!(state.can_execute, trusted && scripts, "inputs ({trusted}, {scripts})");
        assert_eq!(state.reason.is_some(), !(trusted && scripts), "inputs ({trusted}, {scripts})");
    }
}

#[test]
fn test_untrusted_workspace_reason_wins() {
    let gate = TrustGate::new(Arc::new(HostTrust::new(false, false)));
    assert_eq!(gate.state().reason.as_deref(), Some("workspace not trusted"));
    assert_eq!(gate.state().mode(), SecurityMode::Safe);
}

#[test]
fn test_remote_context_beats_untitled_allowance() {
    let host = Arc::new(HostTrust::new(true, true));
    host.set_remote_name(Some("wsl".into()));
    let gate = TrustGate::new(host);
    let state = gate.state_for_document(&DocumentRef::from_uri("untitled:Untitled-2"));
    assert!(!state.can_execute);
    assert!(state.reason.unwrap().contains("wsl"));
}

#[test]
fn test_listeners_receive_fresh_base_state() {
    let host = Arc::new(HostTrust::new(false, false));
    let gate = TrustGate::new(host.clone());
    let executable = Arc::new(AtomicUsize::new(0));
    let seen = executable.clone();
    let subscription = gate.subscribe(move |state| {
        if state.can_execute {
            seen.fetch_add(1, Ordering::SeqCst);
        }
    });

    gate.trust_changed();
    assert_eq!(executable.load(Ordering::SeqCst), 0);

    assert!(host.set_workspace_trusted(true));
    assert!(host.set_scripts_enabled(true));
    assert!(!host.set_scripts_enabled(true));
    gate.trust_changed();
    assert_eq!(executable.load(Ordering::SeqCst), 1);

    drop(subscription);
    gate.trust_changed();
    assert_eq!(executable.load(Ordering::SeqCst), 1);
    assert_eq!(gate.listener_count(), 0);
}

#[test]
fn test_state_serializes_camel_case() {
    let gate = TrustGate::new(Arc::new(HostTrust::new(true, false)));
    let json = serde_json::to_value(gate.state()).unwrap();
    assert_eq!(json["projectTrusted"], true);
    assert_eq!(json["canExecute"], false);
    assert_eq!(json["reason"], "scripts not enabled");
}
