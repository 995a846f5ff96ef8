use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::{value_parser, Arg, ArgMatches, Command};



#[derive(Clone)]
#[derive(Debug, PartialEq)]
pub struct Settings {
	pub listen_addr: String,
	pub listen_ip: IpAddr,
	pub listen_port: u16,
	pub relay_api_url: String,
	pub relay_timeout: Duration,
	pub webrtc_port: u16,
	pub hls_port: u16,
	pub rtsp_port: u16,
	pub store_path: PathBuf,
	pub web_dir: PathBuf,
	pub restore_interval: Duration,
	pub restore_attempts: u32,
}

pub fn command() -> Command {
	Command::new("camera-stream-mgr")
		.version(env!("CARGO_PKG_VERSION"))
		.about("Registers RTSP cameras with a media relay and keeps them registered across restarts.")
		.arg(
			Arg::new("listen-addr")
				.long("listen-addr")
				.env("LISTEN_ADDR")
				.default_value(":8080")
				.help("Address the HTTP API listens on; \":port\" binds every interface")
		)
		.arg(
			Arg::new("relay-api-url")
				.long("relay-api-url")
				.env("MEDIAMTX_API_URL")
				.default_value("http://localhost:9997")
				.help("Base URL of the relay control API")
		)
		.arg(
			Arg::new("relay-timeout-secs")
				.long("relay-timeout-secs")
				.env("RELAY_TIMEOUT_SECS")
				.value_parser(value_parser!(u64).range(1..))
				.default_value("10")
		)
		.arg(
			Arg::new("webrtc-port")
				.long("webrtc-port")
				.env("WEBRTC_PORT")
				.value_parser(value_parser!(u16))
				.default_value("8889")
		)
		.arg(
			Arg::new("hls-port")
				.long("hls-port")
				.env("HLS_PORT")
				.value_parser(value_parser!(u16))
				.default_value("8888")
		)
		.arg(
			Arg::new("rtsp-port")
				.long("rtsp-port")
				.env("RTSP_PORT")
				.value_parser(value_parser!(u16))
				.default_value("8554")
		)
		.arg(
			Arg::new("store-path")
				.long("store-path")
				.env("STORE_PATH")
				.value_parser(value_parser!(PathBuf))
				.default_value("./data/streams.json")
				.help("JSON snapshot of registered streams")
		)
		.arg(
			Arg::new("web-dir")
				.long("web-dir")
				.env("WEB_DIR")
				.value_parser(value_parser!(PathBuf))
				.default_value("./web")
				.help("Static web UI directory")
		)
		.arg(
			Arg::new("restore-interval-secs")
				.long("restore-interval-secs")
				.env("RESTORE_INTERVAL_SECS")
				.value_parser(value_parser!(u64).range(1..))
				.default_value("2")
				.help("Delay between relay reachability checks at startup")
		)
		.arg(
			Arg::new("restore-attempts")
				.long("restore-attempts")
				.env("RESTORE_ATTEMPTS")
				.value_parser(value_parser!(u32))
				.default_value("30")
				.help("Reachability checks before the startup restore gives up")
		)
}

impl Settings {
	pub fn from_matches(matches: &ArgMatches) -> anyhow::Result<Self> {
		let listen_addr = required::<String>(matches, "listen-addr")?;
		let (listen_ip, listen_port) = parse_listen_addr(&listen_addr)?;

		Ok(Settings {
			listen_addr,
			listen_ip,
			listen_port,
			relay_api_url: required(matches, "relay-api-url")?,
			relay_timeout: Duration::from_secs(required(matches, "relay-timeout-secs")?),
			webrtc_port: required(matches, "webrtc-port")?,
			hls_port: required(matches, "hls-port")?,
			rtsp_port: required(matches, "rtsp-port")?,
			store_path: required(matches, "store-path")?,
			web_dir: required(matches, "web-dir")?,
			restore_interval: Duration::from_secs(required(matches, "restore-interval-secs")?),
			restore_attempts: required(matches, "restore-attempts")?,
		})
	}
}

fn required<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, id: &str) -> anyhow::Result<T> {
	matches.get_one::<T>(id)
		.cloned()
		.ok_or_else(|| anyhow!("missing value for --{}", id))
}

/// Accepts `host:port`, `[v6]:port` or `:port` (all interfaces).
pub fn parse_listen_addr(addr: &str) -> anyhow::Result<(IpAddr, u16)> {
	let (host, port) = addr.rsplit_once(':')
		.ok_or_else(|| anyhow!("listen address {:?} has no port", addr))?;
	let port = port.parse::<u16>()
		.with_context(|| format!("invalid port in listen address {:?}", addr))?;

	let host = host.trim_start_matches('[').trim_end_matches(']');
	let ip = match host {
		"" => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
		"localhost" => IpAddr::V4(Ipv4Addr::LOCALHOST),
		host => host.parse()
			.with_context(|| format!("invalid host in listen address {:?}", addr))?,
	};
	Ok((ip, port))
}
