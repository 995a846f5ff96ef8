#[macro_use] extern crate rocket;
#[macro_use] extern crate serde_derive;

use std::sync::Arc;

use rocket::{Request, Response};
use rocket::fairing::{AdHoc, Fairing, Info, Kind};
use rocket::http::Header;

use log::info;

mod common;
mod config;
mod error;
mod outcome;
mod reconciler;
mod relay;
mod rest_api;
mod service;
mod store;
#[cfg(test)]
mod testing;

use crate::reconciler::Reconciler;
use crate::relay::{Relay, RelayClient};
use crate::service::StreamService;
use crate::store::StreamStore;



// The web UI may be served from elsewhere, so every response carries permissive CORS headers.
pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
	fn info(&self) -> Info {
		Info {
			name: "Add CORS headers to responses",
			kind: Kind::Response
		}
	}

	async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
		response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
		response.set_header(Header::new("Access-Control-Allow-Methods", "GET, POST, DELETE, OPTIONS"));
		response.set_header(Header::new("Access-Control-Allow-Headers", "Content-Type"));
	}
}

/// Starts the one-shot relay restore once the server is up; Rocket's shutdown cancels it.
fn relay_restore(reconciler: Reconciler) -> AdHoc {
	AdHoc::on_liftoff("Relay restore", |rocket| Box::pin(async move {
		let shutdown = rocket.shutdown();
		tokio::spawn(reconciler.run(shutdown));
	}))
}


#[rocket::main]
async fn main() -> anyhow::Result<()> {
	let matches = config::command().get_matches();
	let settings = config::Settings::from_matches(&matches)?;

	let figment = rocket::Config::figment()
		.merge(("address", settings.listen_ip))
		.merge(("port", settings.listen_port));
	// Installs Rocket's logger, so everything below can log.
	let rocket = rocket::custom(figment);

	let store = Arc::new(StreamStore::open(&settings.store_path));
	let relay: Arc<dyn Relay> = Arc::new(RelayClient::new(&settings.relay_api_url, settings.relay_timeout)?);
	let reconciler = Reconciler::new(store.clone(), relay.clone())
		.with_schedule(settings.restore_interval, settings.restore_attempts);
	let service = StreamService::new(store, relay);

	info!("============================================");
	info!("  Camera stream manager");
	info!("  Listen:      {}", settings.listen_addr);
	info!("  Relay API:   {}", settings.relay_api_url);
	info!("  Store:       {} ({} streams)", service.store().snapshot_path().display(), service.store().len().await);
	info!("  Web UI:      http://localhost:{}", settings.listen_port);
	info!("  API:         http://localhost:{}/api/streams", settings.listen_port);
	info!("============================================");

	let _ = rocket
		.attach(rest_api::stage(service, settings))
		.attach(relay_restore(reconciler))
		.attach(CORS)
		.launch()
		.await?;

	anyhow::Ok(())
}
