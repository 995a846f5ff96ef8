use std::path::Path;

use rocket::fs::FileServer;
use rocket::http::Status;
use rocket::request::Request;
use rocket::serde::json::{self, Json, Value};
use rocket::State;

use log::warn;

use crate::common::{AddStreamRequest, StreamList, StreamRecord};
use crate::config::Settings;
use crate::error::ServiceError;
use crate::service::StreamService;



/// Envelope shared by every API response.
#[derive(Debug)]
#[derive(Serialize)]
pub struct ApiResponse<T> {
	pub success: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl<T> ApiResponse<T> {
	pub fn ok(data: T) -> Self {
		ApiResponse { success: true, data: Some(data), error: None }
	}

	pub fn failure(message: impl Into<String>) -> Self {
		ApiResponse { success: false, data: None, error: Some(message.into()) }
	}
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, (Status, Json<ApiResponse<()>>)>;

fn reject(err: ServiceError) -> (Status, Json<ApiResponse<()>>) {
	(err.status(), Json(ApiResponse::failure(err.to_string())))
}


#[post("/streams", data = "<body>")]
async fn add_stream(body: Result<Json<AddStreamRequest>, json::Error<'_>>, service: &State<StreamService>) -> ApiResult<StreamRecord> {
	let request = match body {
		Ok(request) => request.into_inner(),
		Err(err) => {
			warn!("Rejected add stream request body: {}", err);
			return Err((Status::BadRequest, Json(ApiResponse::failure("Invalid JSON body"))));
		},
	};
	let record = service.add_stream(request).await.map_err(reject)?;
	Ok(Json(ApiResponse::ok(record)))
}

#[get("/streams")]
async fn list_streams(service: &State<StreamService>) -> Json<ApiResponse<StreamList>> {
	Json(ApiResponse::ok(service.list_streams().await))
}

#[delete("/streams/<name>")]
async fn delete_stream(name: &str, service: &State<StreamService>) -> ApiResult<Value> {
	let deleted = service.delete_stream(name).await.map_err(reject)?;
	Ok(Json(ApiResponse::ok(json::json!({ "deleted": deleted }))))
}

#[get("/health")]
async fn health(service: &State<StreamService>, settings: &State<Settings>) -> Json<ApiResponse<Value>> {
	let reachability = service.health().await;
	Json(ApiResponse::ok(json::json!({
		"status": "ok",
		"mediamtx": reachability.as_str(),
		"ports": {
			"webrtc": settings.webrtc_port.to_string(),
			"hls": settings.hls_port.to_string(),
			"rtsp": settings.rtsp_port.to_string(),
		},
	})))
}

#[get("/config")]
fn client_config(settings: &State<Settings>) -> Json<ApiResponse<Value>> {
	Json(ApiResponse::ok(json::json!({
		"webrtcPort": settings.webrtc_port.to_string(),
		"hlsPort": settings.hls_port.to_string(),
		"rtspPort": settings.rtsp_port.to_string(),
	})))
}

// Preflight for any path; the CORS fairing supplies the headers.
#[options("/<_..>")]
fn preflight() -> Status {
	Status::NoContent
}


#[catch(404)]
fn not_found() -> Json<ApiResponse<()>> {
	Json(ApiResponse::failure("Resource was not found."))
}

#[catch(default)]
fn default_catcher(status: Status, _request: &Request<'_>) -> Json<ApiResponse<()>> {
	let reason = status.reason().unwrap_or("Request failed");
	Json(ApiResponse::failure(reason))
}



pub fn stage(service: StreamService, settings: Settings) -> rocket::fairing::AdHoc {
	let web_dir = settings.web_dir.clone();

	rocket::fairing::AdHoc::on_ignite("Stream API", |rocket| async move {
		let rocket = rocket
			.manage(service)
			.manage(settings)
			.register("/", catchers![not_found, default_catcher])
			.mount("/", routes![preflight])
			.mount("/api", routes![add_stream, list_streams, delete_stream, health, client_config]);

		mount_web_ui(rocket, &web_dir)
	})
}

fn mount_web_ui(rocket: rocket::Rocket<rocket::Build>, web_dir: &Path) -> rocket::Rocket<rocket::Build> {
	if web_dir.is_dir() {
		rocket.mount("/", FileServer::from(web_dir))
	} else {
		warn!("Web UI directory {} not found; static files are not served", web_dir.display());
		rocket
	}
}



#[cfg(test)]
mod tests {
	use super::*;

	use std::sync::Arc;

	use rocket::http::ContentType;
	use rocket::local::asynchronous::Client;

	use crate::config;
	use crate::store::StreamStore;
	use crate::testing::FakeRelay;

	struct TestApp {
		_dir: tempfile::TempDir,
		relay: Arc<FakeRelay>,
		client: Client,
	}

	async fn test_app(relay: FakeRelay) -> TestApp {
		let dir = tempfile::tempdir().unwrap();
		let web_dir = dir.path().join("web");
		std::fs::create_dir_all(&web_dir).unwrap();
		std::fs::write(web_dir.join("index.html"), "<h1>streams</h1>").unwrap();

		let matches = config::command().try_get_matches_from([
			"camera-stream-mgr",
			"--webrtc-port", "8889",
			"--hls-port", "8888",
			"--rtsp-port", "8554",
			"--store-path", dir.path().join("streams.json").to_str().unwrap(),
			"--web-dir", web_dir.to_str().unwrap(),
		]).unwrap();
		let settings = Settings::from_matches(&matches).unwrap();

		let relay = Arc::new(relay);
		let store = Arc::new(StreamStore::open(&settings.store_path));
		let service = StreamService::new(store, relay.clone());
		let rocket = rocket::build()
			.attach(stage(service, settings))
			.attach(crate::CORS);
		let client = Client::tracked(rocket).await.unwrap();
		TestApp { _dir: dir, relay, client }
	}

	async fn body_json(response: rocket::local::asynchronous::LocalResponse<'_>) -> serde_json::Value {
		serde_json::from_str(&response.into_string().await.unwrap()).unwrap()
	}

	#[rocket::async_test]
	async fn add_then_list_streams() {
		let app = test_app(FakeRelay::reachable()).await;

		let response = app.client.post("/api/streams")
			.header(ContentType::JSON)
			.body(r#"{"name":"Lobby Cam","rtspUrl":"rtsp://10.0.0.5:554/stream1"}"#)
			.dispatch()
			.await;
		assert_eq!(response.status(), Status::Ok);
		let body = body_json(response).await;
		assert_eq!(body["success"], true);
		assert_eq!(body["data"]["name"], "lobby-cam");
		assert_eq!(body["data"]["label"], "lobby-cam");
		assert_eq!(body["data"]["status"], "connecting");
		assert!(body.get("error").is_none());

		app.relay.set_live("lobby-cam", true);
		let body = body_json(app.client.get("/api/streams").dispatch().await).await;
		assert_eq!(body["data"][0]["name"], "lobby-cam");
		assert_eq!(body["data"][0]["status"], "online");
	}

	#[rocket::async_test]
	async fn add_maps_errors_to_statuses() {
		let app = test_app(FakeRelay::reachable()).await;

		let response = app.client.post("/api/streams")
			.header(ContentType::JSON)
			.body("{oops")
			.dispatch()
			.await;
		assert_eq!(response.status(), Status::BadRequest);
		assert_eq!(body_json(response).await["error"], "Invalid JSON body");

		let response = app.client.post("/api/streams")
			.header(ContentType::JSON)
			.body(r#"{"rtspUrl":"http://10.0.0.5/stream"}"#)
			.dispatch()
			.await;
		assert_eq!(response.status(), Status::BadRequest);
		let body = body_json(response).await;
		assert_eq!(body["success"], false);
		assert_eq!(body["error"], "URL must start with rtsp:// or rtsps://");

		let add = r#"{"name":"cam1","rtspUrl":"rtsp://h/1"}"#;
		let first = app.client.post("/api/streams").header(ContentType::JSON).body(add).dispatch().await;
		assert_eq!(first.status(), Status::Ok);
		let second = app.client.post("/api/streams").header(ContentType::JSON).body(add).dispatch().await;
		assert_eq!(second.status(), Status::Conflict);

		app.relay.reject_register(400, "bad path");
		let response = app.client.post("/api/streams")
			.header(ContentType::JSON)
			.body(r#"{"name":"cam2","rtspUrl":"rtsp://h/2"}"#)
			.dispatch()
			.await;
		assert_eq!(response.status(), Status::BadGateway);
		assert_eq!(body_json(response).await["error"], "relay error 400: bad path");
	}

	#[rocket::async_test]
	async fn delete_stream_and_unknown_name() {
		let app = test_app(FakeRelay::reachable()).await;
		app.client.post("/api/streams")
			.header(ContentType::JSON)
			.body(r#"{"name":"cam1","rtspUrl":"rtsp://h/1"}"#)
			.dispatch()
			.await;

		let response = app.client.delete("/api/streams/cam1").dispatch().await;
		assert_eq!(response.status(), Status::Ok);
		assert_eq!(body_json(response).await["data"]["deleted"], "cam1");

		let response = app.client.delete("/api/streams/ghost").dispatch().await;
		assert_eq!(response.status(), Status::NotFound);
		assert_eq!(body_json(response).await["error"], "Stream not found");
	}

	#[rocket::async_test]
	async fn health_and_config_report_ports() {
		let app = test_app(FakeRelay::unreachable()).await;

		let body = body_json(app.client.get("/api/health").dispatch().await).await;
		assert_eq!(body["data"]["status"], "ok");
		assert_eq!(body["data"]["mediamtx"], "unreachable");
		assert_eq!(body["data"]["ports"]["webrtc"], "8889");

		let body = body_json(app.client.get("/api/config").dispatch().await).await;
		assert_eq!(body["data"]["hlsPort"], "8888");
		assert_eq!(body["data"]["rtspPort"], "8554");
	}

	#[rocket::async_test]
	async fn unknown_api_path_uses_envelope() {
		let app = test_app(FakeRelay::reachable()).await;
		let response = app.client.get("/api/nope").dispatch().await;
		assert_eq!(response.status(), Status::NotFound);
		let body = body_json(response).await;
		assert_eq!(body["success"], false);
		assert_eq!(body["error"], "Resource was not found.");
	}

	#[rocket::async_test]
	async fn serves_web_ui_and_cors_preflight() {
		let app = test_app(FakeRelay::reachable()).await;

		let response = app.client.get("/").dispatch().await;
		assert_eq!(response.status(), Status::Ok);
		assert_eq!(response.into_string().await.unwrap(), "<h1>streams</h1>");

		let response = app.client.options("/api/streams").dispatch().await;
		assert_eq!(response.status(), Status::NoContent);
		assert_eq!(response.headers().get_one("Access-Control-Allow-Origin"), Some("*"));
		assert_eq!(response.headers().get_one("Access-Control-Allow-Methods"), Some("GET, POST, DELETE, OPTIONS"));
	}
}
