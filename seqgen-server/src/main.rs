use std::io;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use clap::Parser;

use seqgen_core::{Artifacts, Generator};
use seqgen_server::config::ServerArgs;
use seqgen_server::{configure, AppState};

/// Main entry point for the server.
///
/// Loads the artifacts once, shares them read-only between workers and
/// starts the Actix-web HTTP server.
///
/// # Notes
/// - Missing artifacts are logged and do not prevent startup.
/// - An invalid generation configuration does.
#[actix_web::main]
async fn main() -> io::Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let args = ServerArgs::parse();
	let generator = Generator::new(args.generation_config())
		.map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
	log::info!("generation config: {:?}", generator.config());
	let artifacts = Artifacts::load(&args.model_dir, &args.tokenizer);

	let shared_state = web::Data::new(AppState {
		artifacts,
		generator,
		seed: args.seed,
		discard_limit: args.discard_limit,
	});

	log::info!("listening on http://{}:{}", args.host, args.port);
	HttpServer::new(move || {
		App::new()
			.wrap(Logger::default())
			.wrap(Cors::permissive())
			.app_data(shared_state.clone())
			.configure(configure)
	})
		.bind((args.host.as_str(), args.port))?
		.run()
		.await
}
