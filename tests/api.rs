use std::net::TcpListener;
use std::sync::Arc;

use towfleets::api::AccountAPI;
use towfleets::auth::TokenIssuer;
use towfleets::client::{ClientConfig, Credential, TowClient};
use towfleets::config::Settings;
use towfleets::entities::{
    BasePricing, Coordinates, DriverStatus, NearbyQuery, NegotiationKind, NewTowRequest, Place,
    Registration, Role, StatusKind,
};
use towfleets::memory::MemoryEngine;
use towfleets::server::serve_listener;

async fn start() -> TowClient {
    let engine = MemoryEngine::new(Settings {
        tokens: TokenIssuer::new("http-test-secret", 60),
        base_pricing: BasePricing::default(),
    })
    .unwrap();
    engine
        .ensure_admin("admin@towfleets.test", "admin-pass")
        .await
        .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve_listener(Arc::new(engine), listener));

    TowClient::new(&ClientConfig::new(format!("http://{}", addr))).unwrap()
}

fn registration(email: &str, role: Role) -> Registration {
    Registration {
        email: email.into(),
        password: "password123".into(),
        full_name: "Test Member".into(),
        role,
        phone: None,
    }
}

async fn login(api: &TowClient, email: &str, password: &str) -> Credential {
    Credential::from(&api.login(email, password).await.unwrap())
}

/// Registers a client and an approved driver.
async fn parties(api: &TowClient) -> (Credential, Credential) {
    api.register(&registration("cat@example.com", Role::Client))
        .await
        .unwrap();
    let driver = api
        .register(&registration("dan@example.com", Role::Driver))
        .await
        .unwrap();

    let admin = login(api, "admin@towfleets.test", "admin-pass").await;
    api.approve_user(&admin, driver.id).await.unwrap();

    (
        login(api, "cat@example.com", "password123").await,
        login(api, "dan@example.com", "password123").await,
    )
}

fn manhattan_job() -> NewTowRequest {
    let mut params = NewTowRequest::new(
        Place::new("5th Ave", Coordinates::new(40.7128, -74.0060)),
        Place::new("Garage", Coordinates::new(40.7357, -74.1724)),
    );
    params.proposed_price = Some(300.0);
    params
}

#[tokio::test]
async fn drivers_log_in_only_after_approval() {
    let api = start().await;

    let driver = api
        .register(&registration("dan@example.com", Role::Driver))
        .await
        .unwrap();

    let err = api.login("dan@example.com", "password123").await.unwrap_err();
    assert_eq!(err.message, "Account pending approval");
    assert!(err.is_unauthorized_error());

    let admin = login(&api, "admin@towfleets.test", "admin-pass").await;
    let pending = api.pending_approvals(&admin).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, driver.id);

    api.approve_user(&admin, driver.id).await.unwrap();
    let credential = login(&api, "dan@example.com", "password123").await;
    assert_eq!(api.me(&credential).await.unwrap().id, driver.id);

    let err = api.me(&Credential::bearer("garbage")).await.unwrap_err();
    assert!(err.is_unauthenticated_error());
}

#[tokio::test]
async fn tow_job_from_request_to_completion() {
    let api = start().await;
    let (client, driver) = parties(&api).await;

    let request = api.create_request(&client, &manhattan_job()).await.unwrap();
    assert_eq!(request.status.kind(), StatusKind::Pending);
    assert_eq!(request.pickup.address, "5th Ave");

    let err = api
        .create_request(&driver, &manhattan_job())
        .await
        .unwrap_err();
    assert!(err.is_unauthorized_error());

    api.update_driver_status(&driver, DriverStatus::Available)
        .await
        .unwrap();
    api.update_driver_location(&driver, Coordinates::new(40.73, -73.99))
        .await
        .unwrap();

    let nearby = api
        .nearby_requests(&driver, &NearbyQuery::default())
        .await
        .unwrap();
    assert_eq!(nearby.len(), 1);
    assert_eq!(nearby[0].request.id, request.id);
    assert!(nearby[0].distance_km < 5.0);

    api.accept_request(&driver, request.id, None).await.unwrap();
    api.make_offer(&driver, request.id, 350.0, Some("long haul"))
        .await
        .unwrap();

    let err = api.accept_offer(&driver, request.id).await.unwrap_err();
    assert!(err.is_invalid_state_error());

    let agreed = api.accept_offer(&client, request.id).await.unwrap();
    assert_eq!(agreed.negotiation.kind(), NegotiationKind::PriceAgreed);
    assert_eq!(agreed.final_agreed_price(), Some(350.0));

    api.update_request(&driver, request.id, StatusKind::OnMission)
        .await
        .unwrap();
    let done = api
        .update_request(&driver, request.id, StatusKind::Completed)
        .await
        .unwrap();
    assert_eq!(done.status.kind(), StatusKind::Completed);

    let profile = api.driver_profile(&driver).await.unwrap();
    assert_eq!(profile.total_jobs, 1);
    assert_eq!(profile.status, DriverStatus::Available);

    let err = api
        .find_request(&client, uuid::Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(err.is_not_found_error());
}

#[tokio::test]
async fn rejected_transitions_carry_the_server_detail() {
    let api = start().await;
    let (client, driver) = parties(&api).await;

    let request = api.create_request(&client, &manhattan_job()).await.unwrap();

    let err = api
        .update_request(&client, request.id, StatusKind::Completed)
        .await
        .unwrap_err();
    assert!(err.is_invalid_state_error());
    assert_eq!(err.message, "Cannot change status from pending to completed");

    api.update_request(&client, request.id, StatusKind::Cancelled)
        .await
        .unwrap();

    let err = api
        .accept_request(&driver, request.id, None)
        .await
        .unwrap_err();
    assert_eq!(err.message, "Request is not pending");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn negotiation_view_follows_the_offer_history() {
    use std::time::Duration;

    use towfleets::auth::User;
    use towfleets::client::NegotiationView;

    let api = start().await;
    let (client, driver) = parties(&api).await;

    let member = api.me(&client).await.unwrap();
    let request = api.create_request(&client, &manhattan_job()).await.unwrap();
    api.accept_request(&driver, request.id, None).await.unwrap();

    let mut view = NegotiationView::open_with_period(
        api.clone(),
        client.clone(),
        User::from(&member),
        request.id,
        Duration::from_millis(50),
    );

    let snapshot = view.changed().await.unwrap().unwrap().unwrap();
    assert!(snapshot.offers.is_empty());
    assert!(snapshot.actions.make_offer);

    api.make_offer(&driver, request.id, 320.0, None).await.unwrap();

    let snapshot = loop {
        let snapshot = view.changed().await.unwrap().unwrap().unwrap();
        if !snapshot.offers.is_empty() {
            break snapshot;
        }
    };
    assert!(snapshot.actions.accept_offer && snapshot.actions.reject_offer);

    let agreed = view.accept_offer().await.unwrap();
    assert_eq!(agreed.final_agreed_price(), Some(320.0));

    view.close();
}
