//! API endpoint handlers

use super::types::*;
use crate::error::ServerError;
use crate::render::{RenderMode, RenderOptions};
use crate::storage::ArtifactStore;
use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Form, Json,
};
use textcad_llm::{DesignRequest, LLMError};
use tracing::{error, info, warn};

/// Error text returned when the preview could not be rendered
pub(super) const RENDER_FAILED: &str = "OpenSCAD rendering failed.";

/// Health check endpoint
pub(super) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn generation_error_message(err: &LLMError) -> String {
    match err {
        LLMError::EmptyPrompt | LLMError::EmptyGeneration(_) => err.to_string(),
        other => format!("Server error: {}", other),
    }
}

/// Generate, persist and preview a design
#[axum::debug_handler]
pub(super) async fn submit(
    State(state): State<AppState>,
    Form(form): Form<SubmitForm>,
) -> Json<SubmitResponse> {
    let request = match DesignRequest::new(&form.text) {
        Ok(request) => request,
        Err(e) => {
            return Json(SubmitResponse::failure(
                e.to_string(),
                String::new(),
                String::new(),
            ))
        }
    };

    let selector = form.provider.as_deref();
    info!(
        provider = selector.unwrap_or("<primary>"),
        retrieval = form.wants_retrieval(),
        "Received design request"
    );

    let generated = match (&state.gate, form.wants_retrieval()) {
        (Some(gate), true) => gate.answer(&request, selector).await,
        (None, true) => {
            warn!("Retrieval requested but no knowledge index is configured");
            state.dispatcher.generate(&request, selector).await
        }
        _ => state.dispatcher.generate(&request, selector).await,
    };

    let (code, source) = match generated {
        Ok(result) => result.into_parts(),
        Err(e) => {
            error!("Generation failed: {}", e);
            return Json(SubmitResponse::failure(
                generation_error_message(&e),
                String::new(),
                String::new(),
            ));
        }
    };

    let artifact = match state.store.save_source(&code).await {
        Ok(artifact) => artifact,
        Err(e) => {
            error!("Failed to save source: {}", e);
            return Json(SubmitResponse::failure(
                format!("Server error: {}", e),
                code,
                source,
            ));
        }
    };

    if let Err(e) = state
        .renderer
        .render(&artifact.scad_path, &artifact.image_path, &state.render_options)
        .await
    {
        error!(stem = %artifact.stem, "Preview render failed: {}", e);
        return Json(SubmitResponse::failure(RENDER_FAILED, code, source));
    }

    info!(stem = %artifact.stem, source = %source, "Design rendered");
    Json(SubmitResponse::success(
        &artifact.stem,
        artifact.image_name(),
        code,
        source,
    ))
}

fn validate_stem(filename: &str) -> Result<(), ServerError> {
    if ArtifactStore::is_valid_stem(filename) {
        Ok(())
    } else {
        Err(ServerError::InvalidRequest(format!(
            "invalid file name '{}'",
            filename
        )))
    }
}

fn attachment(bytes: Vec<u8>, content_type: &'static str, file_name: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
        .into_response()
}

/// Download a persisted `.scad` source
pub(super) async fn download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ServerError> {
    validate_stem(&filename)?;

    let bytes = state.store.read_source(&filename).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ServerError::NotFound(format!("{}.scad", filename))
        } else {
            e.into()
        }
    })?;

    Ok(attachment(
        bytes,
        "application/x-openscad",
        format!("{}.scad", filename),
    ))
}

/// Render a persisted source to STL and download it
pub(super) async fn export(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ServerError> {
    validate_stem(&filename)?;

    let scad = state.store.scad_path(&filename);
    if !tokio::fs::try_exists(&scad).await.unwrap_or(false) {
        return Err(ServerError::NotFound(format!("{}.scad", filename)));
    }

    let stl = state.store.stl_path(&filename);
    let options = RenderOptions {
        mode: RenderMode::Render,
        ..state.render_options
    };
    state.renderer.render(&scad, &stl, &options).await?;
    info!(stem = %filename, "Exported STL");

    let bytes = tokio::fs::read(&stl).await?;
    Ok(attachment(bytes, "model/stl", format!("{}.stl", filename)))
}
