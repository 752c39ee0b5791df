//! HTTP front-end for prompt-to-text generation.
//!
//! Routes:
//! - `GET /` and `POST /`: HTML form
//! - `GET /v1/models`: loaded model names
//! - `POST /v1/generate`: JSON generation API

use actix_web::http::StatusCode;
use actix_web::{get, post, web, HttpResponse, Responder};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use seqgen_core::{Artifacts, GenError, Generation, Generator};

/// Command line configuration.
pub mod config;

/// HTML rendering of the form page.
pub mod page;

use page::IndexPage;

/// State shared by every worker.
///
/// Built once at startup and never mutated, so no lock is needed.
pub struct AppState {
	pub artifacts: Artifacts,
	pub generator: Generator,
	/// Fixed RNG seed per request, if any.
	pub seed: Option<u64>,
	pub discard_limit: usize,
}

impl AppState {
	/// Runs one generation and returns the resolved model name with it.
	///
	/// Blocks for the whole decoding loop; call it from `web::block`.
	pub fn run(&self, model_name: Option<&str>, prompt: &str) -> Result<(String, Generation), GenError> {
		let (name, _) = self.artifacts.resolve_model(model_name)?;
		let discard_limit = self.discard_limit;
		let abort = |progress: &seqgen_core::model::generator::Progress| progress.discarded >= discard_limit;

		let generation = match self.seed {
			Some(seed) => {
				let mut rng = StdRng::seed_from_u64(seed);
				self.artifacts.generate_with_abort(Some(name), prompt, &self.generator, &mut rng, abort)?
			}
			None => self.artifacts.generate_with_abort(Some(name), prompt, &self.generator, &mut rand::rng(), abort)?,
		};
		if generation.aborted {
			log::warn!(
				"generation with '{name}' aborted after {} discarded steps ({} of {} words)",
				generation.discarded,
				generation.words.len(),
				self.generator.config().max_new_tokens
			);
		}
		Ok((name.to_owned(), generation))
	}

	/// Short notice shown next to a result cut off by the discard limit.
	pub fn aborted_notice(&self, generation: &Generation) -> Option<String> {
		generation.aborted.then(|| {
			format!(
				"Generation stopped early: {} of {} words produced, {} sampled steps discarded.",
				generation.words.len(),
				self.generator.config().max_new_tokens,
				generation.discarded
			)
		})
	}
}

/// Fields posted by the HTML form.
#[derive(Deserialize, Debug)]
pub struct GenerateForm {
	#[serde(default)]
	prompt: String,
	model_select: Option<String>,
}

/// Body of `POST /v1/generate`.
#[derive(Deserialize, Debug)]
pub struct GenerateRequest {
	prompt: String,
	model: Option<String>,
}

#[derive(Serialize)]
struct GenerateResponse {
	model: String,
	text: String,
	generated: Vec<String>,
	discarded: usize,
	aborted: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
	error: String,
}

const NO_MODEL_MESSAGE: &str = "Error: no model was loaded.";

/// Registers every route.
pub fn configure(cfg: &mut web::ServiceConfig) {
	cfg.service(index)
		.service(submit)
		.service(get_models)
		.service(post_generate);
}

/// Runs the pipeline on the blocking pool, flattening pool errors into
/// the returned message.
async fn run_blocking(
	data: web::Data<AppState>,
	model_name: Option<String>,
	prompt: String,
) -> Result<(String, Generation), (StatusCode, String)> {
	let result = web::block(move || data.run(model_name.as_deref(), &prompt)).await;
	match result {
		Ok(Ok(output)) => Ok(output),
		Ok(Err(e)) => Err((status_for(&e), e.to_string())),
		Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
	}
}

/// Maps a pipeline error onto an HTTP status for the JSON API.
fn status_for(err: &GenError) -> StatusCode {
	match err {
		GenError::ModelNotFound(_) => StatusCode::NOT_FOUND,
		GenError::TokenizerMissing | GenError::NoModels => StatusCode::SERVICE_UNAVAILABLE,
		_ => StatusCode::INTERNAL_SERVER_ERROR,
	}
}

fn html(body: String) -> HttpResponse {
	HttpResponse::Ok().content_type("text/html; charset=utf-8").body(body)
}

/// HTTP GET `/`: renders the empty form.
#[get("/")]
async fn index(data: web::Data<AppState>) -> impl Responder {
	let artifacts = &data.artifacts;
	let page = IndexPage {
		models: artifacts.model_names(),
		selected_model: artifacts.default_model_name().unwrap_or_default(),
		error: (!artifacts.has_models()).then_some(NO_MODEL_MESSAGE),
		..Default::default()
	};
	html(page.render())
}

/// HTTP POST `/`: generates from the submitted prompt.
///
/// Generation failures are rendered in place of the result; an empty
/// prompt just renders the form again.
#[post("/")]
async fn submit(data: web::Data<AppState>, form: web::Form<GenerateForm>) -> impl Responder {
	let form = form.into_inner();
	let models: Vec<String> = data.artifacts.model_names().into_iter().map(str::to_owned).collect();
	if models.is_empty() {
		let page = IndexPage { error: Some(NO_MODEL_MESSAGE), ..Default::default() };
		return html(page.render());
	}

	let prompt = form.prompt.trim().to_owned();
	let selected = form
		.model_select
		.filter(|name| !name.trim().is_empty())
		.unwrap_or_else(|| models[0].clone());

	let (generated_text, notice) = if prompt.is_empty() {
		(None, None)
	} else {
		match run_blocking(data.clone(), Some(selected.clone()), prompt.clone()).await {
			Ok((_, generation)) => {
				let notice = data.aborted_notice(&generation);
				(Some(generation.text), notice)
			}
			Err((_, message)) => {
				log::warn!("generation with '{selected}' failed: {message}");
				(Some(format!("Error during generation with {selected}: {message}")), None)
			}
		}
	};

	let page = IndexPage {
		models: models.iter().map(String::as_str).collect(),
		selected_model: &selected,
		prompt: &prompt,
		generated_text: generated_text.as_deref(),
		notice: notice.as_deref(),
		error: None,
	};
	html(page.render())
}

/// HTTP GET `/v1/models`: JSON array of loaded model names.
#[get("/v1/models")]
async fn get_models(data: web::Data<AppState>) -> impl Responder {
	HttpResponse::Ok().json(data.artifacts.model_names())
}

/// HTTP POST `/v1/generate`: JSON generation endpoint.
#[post("/v1/generate")]
async fn post_generate(data: web::Data<AppState>, body: web::Json<GenerateRequest>) -> impl Responder {
	let request = body.into_inner();
	let prompt = request.prompt.trim().to_owned();
	if prompt.is_empty() {
		return HttpResponse::BadRequest().json(ErrorResponse { error: "Prompt cannot be empty".to_owned() });
	}

	match run_blocking(data, request.model, prompt).await {
		Ok((model, generation)) => HttpResponse::Ok().json(GenerateResponse {
			model,
			text: generation.text,
			generated: generation.words,
			discarded: generation.discarded,
			aborted: generation.aborted,
		}),
		Err((status, error)) => HttpResponse::build(status).json(ErrorResponse { error }),
	}
}
