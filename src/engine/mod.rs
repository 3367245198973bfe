mod account_api;
mod driver_api;
mod helpers;
mod offer_api;
mod request_api;

use oso::ToPolar;
use sqlx::{Executor, Pool, Postgres};

use crate::api::API;
use crate::auth::{Authorizor, User};
use crate::config::Settings;
use crate::error::Error;

type Database = Postgres;

pub struct Engine {
    pool: Pool<Database>,
    authorizor: Authorizor,
    settings: Settings,
}

impl Engine {
    #[tracing::instrument(name = "Engine::new", skip_all)]
    pub async fn new(pool: Pool<Database>, settings: Settings) -> Result<Self, Error> {
        pool.execute("CREATE EXTENSION IF NOT EXISTS postgis").await?;

        pool.execute("CREATE TABLE IF NOT EXISTS members (id UUID PRIMARY KEY, email VARCHAR NOT NULL UNIQUE, password_hash VARCHAR NOT NULL, status VARCHAR NOT NULL, data JSONB NOT NULL)")
            .await?;

        pool.execute("CREATE TABLE IF NOT EXISTS driver_profiles (user_id UUID PRIMARY KEY REFERENCES members(id), status VARCHAR NOT NULL, data JSONB NOT NULL)")
            .await?;

        pool.execute("CREATE TABLE IF NOT EXISTS driver_pricing (driver_id UUID PRIMARY KEY REFERENCES members(id), data JSONB NOT NULL)")
            .await?;

        pool.execute("CREATE TABLE IF NOT EXISTS tow_requests (id UUID PRIMARY KEY, client_id UUID NOT NULL, assigned_driver_id UUID, status VARCHAR NOT NULL, pickup geometry(Point, 4326) NOT NULL, data JSONB NOT NULL)")
            .await?;
        pool.execute("CREATE INDEX IF NOT EXISTS tow_requests_pickup_idx ON tow_requests USING GIST (pickup)")
            .await?;

        pool.execute("CREATE TABLE IF NOT EXISTS offers (id UUID PRIMARY KEY, request_id UUID NOT NULL REFERENCES tow_requests(id), status VARCHAR NOT NULL, created_at TIMESTAMPTZ NOT NULL, data JSONB NOT NULL)")
            .await?;
        pool.execute("CREATE UNIQUE INDEX IF NOT EXISTS offers_one_pending_idx ON offers (request_id) WHERE status = 'pending'")
            .await?;

        Ok(Self {
            pool,
            authorizor: Authorizor::new()?,
            settings,
        })
    }

    pub fn authorize<Resource: ToPolar>(
        &self,
        user: User,
        action: &str,
        resource: Resource,
        denied: &str,
    ) -> Result<(), Error> {
        self.authorizor.authorize(user, action, resource, denied)
    }
}

impl API for Engine {}
