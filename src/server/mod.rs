mod extract;
mod handlers;

use std::net::{SocketAddr, TcpListener};

use axum::{
    extract::Extension,
    routing::{get, post, put},
    Router,
};

use crate::api::DynAPI;
use crate::error::Error;
use crate::server::handlers::{admin, auth, drivers, offers, requests};

pub fn router(api: DynAPI) -> Router {
    let routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/tow-requests", post(requests::create).get(requests::list))
        .route("/tow-requests/nearby", get(requests::nearby))
        .route("/tow-requests/:id", get(requests::find).put(requests::update))
        .route("/tow-requests/:id/accept", post(requests::accept))
        .route("/tow-requests/:id/offer", post(offers::create))
        .route("/tow-requests/:id/offers", get(offers::list))
        .route("/tow-requests/:id/accept-offer", post(offers::accept))
        .route("/tow-requests/:id/reject-offer", post(offers::reject))
        .route("/drivers/profile", get(drivers::profile).put(drivers::update_profile))
        .route("/drivers/status", put(drivers::update_status))
        .route("/drivers/location", put(drivers::update_location))
        .route("/drivers/pricing", get(drivers::pricing).put(drivers::update_pricing))
        .route("/admin/pending-approvals", get(admin::pending_approvals))
        .route("/admin/approve-user/:id", post(admin::approve_user));

    Router::new()
        .nest("/api", routes)
        .layer(Extension(api))
}

pub async fn serve(api: DynAPI, addr: SocketAddr) -> Result<(), Error> {
    let listener = TcpListener::bind(addr).map_err(Error::network_error)?;

    serve_listener(api, listener).await
}

/// Serves on an already bound listener, e.g. one on an ephemeral port.
pub async fn serve_listener(api: DynAPI, listener: TcpListener) -> Result<(), Error> {
    let addr = listener.local_addr().map_err(Error::network_error)?;
    let app = router(api);

    tracing::info!("listening on {}", addr);

    axum::Server::from_tcp(listener)
        .map_err(Error::network_error)?
        .serve(app.into_make_service())
        .await
        .map_err(Error::network_error)
}
