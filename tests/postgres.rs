//! Runs against a PostGIS-enabled database named by `DATABASE_URL`:
//! `cargo test --test postgres -- --ignored`

use std::sync::Arc;

use towfleets::api::{AccountAPI, OfferAPI, TowRequestAPI};
use towfleets::auth::{TokenIssuer, User};
use towfleets::config::Settings;
use towfleets::db::PgPool;
use towfleets::engine::Engine;
use towfleets::entities::{
    BasePricing, Coordinates, NearbyQuery, NegotiationKind, NewTowRequest, Place, Registration,
    Role,
};

async fn engine() -> Engine {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL");
    let PgPool(pool) = PgPool::new(&url, 5).await.unwrap();

    Engine::new(
        pool,
        Settings {
            tokens: TokenIssuer::new("postgres-test-secret", 60),
            base_pricing: BasePricing::default(),
        },
    )
    .await
    .unwrap()
}

async fn member(engine: &Engine, role: Role) -> User {
    let member = engine
        .register(Registration {
            email: format!("{}@example.com", uuid::Uuid::new_v4()),
            password: "password123".into(),
            full_name: "Test Member".into(),
            role,
            phone: None,
        })
        .await
        .unwrap();

    if member.is_pending_approval() {
        let admin = engine
            .ensure_admin("admin@towfleets.test", "admin-pass")
            .await
            .unwrap();
        engine
            .approve_member(User::from(&admin), member.id)
            .await
            .unwrap();
    }

    User::from(&member)
}

fn job_at(lat: f64, lng: f64) -> NewTowRequest {
    let mut params = NewTowRequest::new(
        Place::new("Pickup", Coordinates::new(lat, lng)),
        Place::new("Dropoff", Coordinates::new(lat + 0.1, lng)),
    );
    params.proposed_price = Some(500.0);
    params
}

#[tokio::test]
#[ignore]
async fn concurrent_accepts_have_one_winner() {
    let engine = Arc::new(engine().await);
    let client = member(&engine, Role::Client).await;
    let first = member(&engine, Role::Driver).await;
    let second = member(&engine, Role::Driver).await;

    let request = engine.create_request(client, job_at(40.0, -74.0)).await.unwrap();
    let request_id = request.id;

    let attempts = [first, second].map(|driver| {
        let engine = engine.clone();
        tokio::spawn(async move { engine.accept_request(driver, request_id, None).await })
    });

    let mut winners = Vec::new();
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(request) => winners.push(request.assigned_driver_id()),
            Err(err) => assert!(err.is_invalid_state_error()),
        }
    }

    assert_eq!(winners.len(), 1);
    let stored = engine.find_request(client, request_id).await.unwrap();
    assert_eq!(stored.assigned_driver_id(), winners[0]);
}

#[tokio::test]
#[ignore]
async fn counter_offer_and_nearby_search() {
    let engine = engine().await;
    let client = member(&engine, Role::Client).await;
    let driver = member(&engine, Role::Driver).await;

    let near = engine.create_request(client, job_at(40.0, -74.0)).await.unwrap();

    let query = NearbyQuery::new(50.0, Some(Coordinates::new(40.0, -74.0)));
    let nearby = engine.nearby_requests(driver, query).await.unwrap();
    let found = nearby
        .iter()
        .find(|candidate| candidate.request.id == near.id)
        .unwrap();
    assert!(found.distance_km >= 0.0 && found.distance_km <= 50.0);
    assert!(nearby.iter().all(|candidate| candidate.distance_km <= 50.0));

    engine.accept_request(driver, near.id, None).await.unwrap();
    engine.make_offer(driver, near.id, 450.0, None).await.unwrap();

    let agreed = engine.accept_offer(client, near.id).await.unwrap();
    assert_eq!(agreed.final_agreed_price(), Some(450.0));
    assert_eq!(agreed.negotiation.kind(), NegotiationKind::PriceAgreed);
}

#[tokio::test]
#[ignore]
async fn admin_bootstrap_keeps_existing_roles() {
    let engine = engine().await;

    let email = format!("{}@example.com", uuid::Uuid::new_v4());
    engine
        .register(Registration {
            email: email.clone(),
            password: "password123".into(),
            full_name: "Not An Admin".into(),
            role: Role::Client,
            phone: None,
        })
        .await
        .unwrap();

    let err = engine.ensure_admin(&email, "admin-pass").await.unwrap_err();
    assert!(err.is_invalid_state_error());

    let first = engine
        .ensure_admin("admin@towfleets.test", "admin-pass")
        .await
        .unwrap();
    let again = engine
        .ensure_admin("admin@towfleets.test", "admin-pass")
        .await
        .unwrap();
    assert_eq!(first.id, again.id);
}
