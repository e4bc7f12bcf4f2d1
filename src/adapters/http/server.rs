//! HTTP adapter: routes and handlers for signing and public verification.
//!
//! Handlers translate between the wire protocol and the workflow/service
//! layer, and map the error taxonomy onto HTTP statuses. The verification
//! endpoints are unauthenticated by design.

use super::protocol::{
    error_codes, ErrorBody, HealthResponse, SignDocumentRequest, SignDocumentResponse,
    VerificationNotFound, VerificationResponse,
};
use crate::domain::record::VerificationOutcome;
use crate::domain::types::{
    DocumentKind, DocumentRef, PrincipalId, SignatureHash, SigningAttributes, UnlockSecret,
};
use crate::infra::error::SignError;
use crate::pipelines::SignWorkflow;
use crate::services::VerificationService;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use warp::http::StatusCode;
use warp::Filter;

/// Shared state for the HTTP handlers.
pub struct AppState {
    pub workflow: Arc<SignWorkflow>,
    pub verification: Arc<VerificationService>,
    pub public_base_url: String,
    pub official_validator_url: Option<String>,
    start_time: Instant,
}

impl AppState {
    #[must_use]
    pub fn new(
        workflow: Arc<SignWorkflow>,
        verification: Arc<VerificationService>,
        public_base_url: String,
        official_validator_url: Option<String>,
    ) -> Self {
        Self {
            workflow,
            verification,
            public_base_url,
            official_validator_url,
            start_time: Instant::now(),
        }
    }

    fn verification_url(&self, hash: &SignatureHash) -> String {
        format!("{}/verify/{}", self.public_base_url, hash)
    }
}

/// Build all API routes.
pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    sign_route(state.clone())
        .or(verify_page_route(state.clone()))
        .or(verify_route(state.clone()))
        .or(health_route(state))
}

/// `POST /documents/{kind}/{id}/sign`
fn sign_route(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::path!("documents" / String / u64 / "sign")
        .and(warp::post())
        .and(warp::header::optional::<String>("x-principal-id"))
        .and(warp::header::optional::<String>("x-principal-name"))
        .and(warp::body::json::<SignDocumentRequest>())
        .and(with_state(state))
        .and_then(handle_sign)
}

/// `GET /verify/{hash}` (machine, JSON)
fn verify_route(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::path!("verify" / String)
        .and(warp::get())
        .and(with_state(state))
        .and_then(handle_verify)
}

/// `GET /verify/{hash}/page` (human, HTML)
fn verify_page_route(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::path!("verify" / String / "page")
        .and(warp::get())
        .and(with_state(state))
        .and_then(handle_verify_page)
}

/// `GET /healthz`
fn health_route(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::path!("healthz")
        .and(warp::get())
        .and(with_state(state))
        .and_then(handle_health)
}

/// Inject state into handlers.
fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

async fn handle_sign(
    kind: String,
    id: u64,
    principal_id: Option<String>,
    principal_name: Option<String>,
    request: SignDocumentRequest,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, Infallible> {
    let Ok(kind) = kind.parse::<DocumentKind>() else {
        return Ok(reply_error(
            StatusCode::NOT_FOUND,
            error_codes::DOCUMENT_NOT_FOUND,
            format!("unknown document kind '{kind}'"),
        ));
    };
    let document = DocumentRef::new(kind, id);

    let signer = match principal_id.as_deref().map(PrincipalId::new) {
        Some(Ok(signer)) => signer,
        _ => {
            return Ok(reply_error(
                StatusCode::BAD_REQUEST,
                error_codes::BAD_REQUEST,
                "missing or invalid x-principal-id header",
            ))
        }
    };
    let Some(display_name) = principal_name.filter(|n| !n.is_empty()) else {
        return Ok(reply_error(
            StatusCode::BAD_REQUEST,
            error_codes::BAD_REQUEST,
            "missing x-principal-name header",
        ));
    };

    let secret = match UnlockSecret::new(request.unlock_secret) {
        Ok(secret) => secret,
        Err(e) => {
            return Ok(reply_error(
                StatusCode::BAD_REQUEST,
                error_codes::BAD_REQUEST,
                e.to_string(),
            ))
        }
    };

    let mut attributes = SigningAttributes::new(display_name);
    if let Some(reason) = request.reason {
        attributes = attributes.with_reason(reason);
    }
    if let Some(location) = request.location {
        attributes = attributes.with_location(location);
    }

    match state
        .workflow
        .sign_document(document, signer, attributes, secret)
        .await
    {
        Ok(handle) => {
            let response = SignDocumentResponse {
                signature_hash: handle.signature_hash.to_string(),
                signed_at: handle.signed_at,
                verification_url: state.verification_url(&handle.signature_hash),
            };
            Ok(warp::reply::with_status(
                warp::reply::json(&response),
                StatusCode::OK,
            ))
        }
        Err(e) => Ok(reply_sign_error(&e)),
    }
}

async fn handle_verify(
    hash: String,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, Infallible> {
    // A malformed handle gets the same answer as an unknown one; the public
    // endpoint reveals nothing about why a lookup missed.
    let outcome = SignatureHash::new(&hash)
        .ok()
        .and_then(|hash| state.verification.verify(&hash));

    match outcome {
        Some(outcome) => Ok(warp::reply::with_status(
            warp::reply::json(&VerificationResponse::from_outcome(&outcome)),
            StatusCode::OK,
        )),
        None => Ok(warp::reply::with_status(
            warp::reply::json(&VerificationNotFound::new()),
            StatusCode::NOT_FOUND,
        )),
    }
}

async fn handle_verify_page(
    hash: String,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, Infallible> {
    let outcome = SignatureHash::new(&hash)
        .ok()
        .and_then(|hash| state.verification.verify(&hash));

    match outcome {
        Some(outcome) => {
            let page = render_verification_page(
                &hash,
                &outcome,
                state.official_validator_url.as_deref(),
            );
            Ok(warp::reply::with_status(
                warp::reply::html(page),
                StatusCode::OK,
            ))
        }
        None => Ok(warp::reply::with_status(
            warp::reply::html(render_not_found_page()),
            StatusCode::NOT_FOUND,
        )),
    }
}

async fn handle_health(state: Arc<AppState>) -> Result<impl warp::Reply, Infallible> {
    let response = HealthResponse {
        status: "ok".to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    };
    Ok(warp::reply::json(&response))
}

/// Map a workflow error to an HTTP response per the taxonomy: user errors
/// 400/401/404, conflicts 409, infrastructure 503, everything else an opaque
/// 500 that is logged with context but never with secret material.
fn reply_sign_error(error: &SignError) -> warp::reply::WithStatus<warp::reply::Json> {
    let (status, code) = match error {
        SignError::WrongSecret => (StatusCode::UNAUTHORIZED, error_codes::WRONG_SECRET),
        SignError::CertificateExpired { .. } => {
            (StatusCode::BAD_REQUEST, error_codes::CERTIFICATE_EXPIRED)
        }
        SignError::CertificateNotYetValid { .. } => (
            StatusCode::BAD_REQUEST,
            error_codes::CERTIFICATE_NOT_YET_VALID,
        ),
        SignError::CertificateRevoked => {
            (StatusCode::BAD_REQUEST, error_codes::CERTIFICATE_REVOKED)
        }
        SignError::IncompleteChain { .. } => {
            (StatusCode::BAD_REQUEST, error_codes::INCOMPLETE_CHAIN)
        }
        SignError::CorruptContainer(_) => {
            (StatusCode::BAD_REQUEST, error_codes::CORRUPT_CONTAINER)
        }
        SignError::ValidationError(_) => (StatusCode::BAD_REQUEST, error_codes::BAD_REQUEST),
        SignError::CertificateNotFound => {
            (StatusCode::NOT_FOUND, error_codes::CERTIFICATE_NOT_FOUND)
        }
        SignError::DocumentNotFound(_) => {
            (StatusCode::NOT_FOUND, error_codes::DOCUMENT_NOT_FOUND)
        }
        SignError::AlreadySigned { .. } => (StatusCode::CONFLICT, error_codes::ALREADY_SIGNED),
        SignError::SigningBackendUnavailable(_) | SignError::StorageError(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            error_codes::BACKEND_UNAVAILABLE,
        ),
        SignError::InternalSigningFailure(_) | SignError::ConfigurationError(_) => {
            log::error!("Internal signing failure: {error}");
            return reply_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                error_codes::INTERNAL,
                "internal signing failure",
            );
        }
    };
    reply_error(status, code, error.to_string())
}

fn reply_error(
    status: StatusCode,
    code: &str,
    message: impl Into<String>,
) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(warp::reply::json(&ErrorBody::new(code, message)), status)
}

/// Render the human verification page: signature facts only, never document
/// content.
fn render_verification_page(
    hash: &str,
    outcome: &VerificationOutcome,
    official_validator_url: Option<&str>,
) -> String {
    let validity = if outcome.valid_at_signing {
        "certificate was valid at signing time"
    } else {
        "certificate was NOT valid at signing time"
    };
    let official = official_validator_url.map_or(String::new(), |url| {
        format!(
            "<p>For legally binding validation, use the <a href=\"{}\">official validator</a>.</p>",
            escape_html(url)
        )
    });
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>Signature verification</title></head>\n<body>\n\
         <h1>Signature found</h1>\n\
         <dl>\n\
         <dt>Handle</dt><dd><code>{hash}</code></dd>\n\
         <dt>Document type</dt><dd>{document_type}</dd>\n\
         <dt>Signed at</dt><dd>{signed_at}</dd>\n\
         <dt>Signer</dt><dd>{signer}</dd>\n\
         <dt>Certificate subject</dt><dd>{subject}</dd>\n\
         <dt>Certificate issuer</dt><dd>{issuer}</dd>\n\
         <dt>Certificate serial</dt><dd>{serial}</dd>\n\
         <dt>Certificate validity</dt><dd>{not_before} &ndash; {not_after}</dd>\n\
         <dt>Status</dt><dd>{validity}</dd>\n\
         </dl>\n{official}\n</body>\n</html>\n",
        hash = escape_html(hash),
        document_type = escape_html(&outcome.document_type),
        signed_at = outcome.signed_at.to_rfc3339(),
        signer = escape_html(&outcome.signer_display_name),
        subject = escape_html(&outcome.certificate.subject),
        issuer = escape_html(&outcome.certificate.issuer),
        serial = escape_html(&outcome.certificate.serial),
        not_before = outcome.certificate.not_before.to_rfc3339(),
        not_after = outcome.certificate.not_after.to_rfc3339(),
    )
}

fn render_not_found_page() -> String {
    "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>Signature verification</title></head>\n<body>\n\
     <h1>No signature found</h1>\n<p>The supplied handle does not match any recorded signature.</p>\n</body>\n</html>\n"
        .to_string()
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
