//! Integration tests for the linkgate-kernel crate.
//!
//! A host registers integrations, looks them up by adapter id, and drives
//! both the authorization and the callback contracts through the registry.

use std::sync::Arc;
use std::sync::Mutex;

use linkgate_auth_engine::{
    AuthEngineError, AuthorizationProvider, AuthorizationRegistration, AuthorizationRequest,
    AuthorizationUrl, CallbackInput, ErrorKind, TokenSet, extract_authorization_code,
};
use linkgate_bridge::{
    CallbackRegistration, EventBridge, InstallContext, PollOutcome, PollRequest, PollState,
};
use linkgate_kernel::{IntegrationRegistry, KernelError, PollScheduler};
use serde_json::json;

fn register_demo(registry: &IntegrationRegistry, states: Arc<Mutex<Vec<PollState>>>) {
    let auth = AuthorizationRegistration::builder("demo")
        .get_authorization_url(|req: &AuthorizationRequest| {
            Ok(AuthorizationUrl::plain(format!(
                "https://demo.example/authorize?client_id={}&state={}",
                req.client_id, req.state
            )))
        })
        .handle_callback(|input: CallbackInput| async move {
            let code = extract_authorization_code(&input.callback_url)?;
            Ok(TokenSet::new(format!("token-{code}")))
        })
        .build()
        .unwrap();

    let callbacks = CallbackRegistration::builder("demo")
        .install(|ctx: InstallContext| async move { Ok(Some(json!({"hook": ctx.callback_id}))) })
        .handle(|_event| async { Ok(None) })
        .poll(move |req: PollRequest| {
            let states = Arc::clone(&states);
            async move {
                states.lock().unwrap().push(req.state.clone());
                let next = match req.state.get_str("cursor") {
                    None => "S1",
                    Some(_) => "S2",
                };
                Ok(PollOutcome::new(Vec::new(), PollState::new().with("cursor", next)))
            }
        })
        .build()
        .unwrap();

    registry.register_authorization("demo", Arc::new(auth));
    registry.register_callbacks("demo", EventBridge::new(Arc::new(callbacks)));
}

#[tokio::test]
async fn host_drives_both_contracts_through_registry() {
    let registry = IntegrationRegistry::new();
    let states = Arc::new(Mutex::new(Vec::new()));
    register_demo(&registry, Arc::clone(&states));

    let info = registry.get("demo").unwrap();
    assert!(info.authorization && info.callbacks && info.install && info.poll);

    // Authorization side.
    let provider = registry.authorization("demo").unwrap();
    let url = provider
        .authorization_url(&AuthorizationRequest {
            client_id: "C1".to_string(),
            state: "abc123".to_string(),
            ..Default::default()
        })
        .unwrap();
    assert!(url.authorization_url.contains("state=abc123"));

    let tokens = provider
        .handle_callback(&CallbackInput {
            callback_url: "https://host/cb?code=XYZ&state=abc123".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(tokens.access_token, "token-XYZ");

    let err = provider
        .handle_callback(&CallbackInput {
            callback_url: "https://host/cb?state=abc123".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AuthEngineError::MissingAuthorizationCode));
    assert_eq!(err.kind(), ErrorKind::Protocol);

    // Callback side.
    let bridge = registry.bridge("demo").unwrap();
    let meta = bridge
        .install(&InstallContext {
            callback_url: "https://host/hooks/cb-1".to_string(),
            callback_id: "cb-1".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(meta, Some(json!({"hook": "cb-1"})));

    let scheduler = PollScheduler::new();
    scheduler.poll_now(&bridge, "cb-1").await.unwrap();
    scheduler.poll_now(&bridge, "cb-1").await.unwrap();

    let states = states.lock().unwrap();
    assert!(states[0].is_initial());
    assert_eq!(states[1].get_str("cursor"), Some("S1"));
}

#[tokio::test]
async fn unregistered_adapter_is_a_configuration_error() {
    let registry = IntegrationRegistry::new();
    let err = registry.bridge("missing").unwrap_err();
    assert!(matches!(err, KernelError::AdapterNotFound { .. }));
    assert_eq!(err.kind(), ErrorKind::Configuration);
}
