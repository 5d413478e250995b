use std::sync::Arc;

use tokio::io::BufReader;
use tracing::{info, warn};

use crate::auth::{CallerIdentity, StaticSessions};
use crate::bridge::handler::spawn_bridge;
use crate::bridge::host::serve_lines;
use crate::cli::config::AppConfig;
use crate::coordinator::Coordinator;
use crate::dom::document::Document;
use crate::filler::filler::fill_page;
use crate::mapper::heuristic::HeuristicMapper;
use crate::mapper::inference::{GeminiBackend, TextInference, UnconfiguredBackend};
use crate::mapper::mapper::{AuthorizedMapper, FieldMapper, MappingService};
use crate::mapper::mapping_model::{FieldMapping, StudentData, retain_confident};
use crate::mapper::remote::RemoteMapper;
use crate::page::access::{Accessibility, check_accessibility};
use crate::scanner::scanner::scan_page;
use crate::server::routes::{AppState, serve};
use crate::trace::logger::TraceLogger;
use crate::trace::trace::{PipelineStage, TraceEvent};

type CmdResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

// ============================================================================
// scan subcommand
// ============================================================================

pub fn cmd_scan(page_path: &str, output: Option<&str>) -> CmdResult {
    let mut page = Document::load(page_path)?;

    let access = check_accessibility(&page);
    if !access.is_accessible() {
        warn!(?access, "page looks blocked; scanning anyway");
    }

    let result = scan_page(&mut page);
    println!("{}", serde_json::to_string_pretty(&result)?);

    if let Some(path) = output {
        write_page(&page, path)?;
    }
    Ok(())
}

// ============================================================================
// map subcommand
// ============================================================================

pub async fn cmd_map(
    page_path: &str,
    student_path: &str,
    mapper_name: &str,
    config: &AppConfig,
) -> CmdResult {
    let mut page = Document::load(page_path)?;
    let student = load_student(student_path)?;
    let mapper = build_mapper(mapper_name, config)?;

    let scan = scan_page(&mut page);
    let mut mappings = mapper.map_fields(&scan.elements, &student).await?;
    retain_confident(&mut mappings);

    println!("{}", serde_json::to_string_pretty(&mappings)?);
    Ok(())
}

// ============================================================================
// fill subcommand
// ============================================================================

pub fn cmd_fill(page_path: &str, mapping_path: &str, output: Option<&str>) -> CmdResult {
    let mut page = Document::load(page_path)?;
    let content = std::fs::read_to_string(mapping_path)?;
    let mut mappings: Vec<FieldMapping> = serde_json::from_str(&content)?;

    let supplied = mappings.len();
    retain_confident(&mut mappings);
    if mappings.len() < supplied {
        warn!(dropped = supplied - mappings.len(), "ignoring low-confidence mappings");
    }

    let report = fill_page(&mut page, &mappings);
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(path) = output {
        write_page(&page, path)?;
    }
    Ok(())
}

// ============================================================================
// autofill subcommand
// ============================================================================

pub async fn cmd_autofill(
    page_path: &str,
    student_path: &str,
    mapper_name: &str,
    dry_run: bool,
    output: Option<&str>,
    config: &AppConfig,
) -> CmdResult {
    let page = Document::load(page_path)?;
    let trace = Arc::new(TraceLogger::from_path(config.trace.path.as_deref()));
    ensure_accessible(&page, &trace)?;

    let student = load_student(student_path)?;
    let mapper = build_mapper(mapper_name, config)?;

    let (bridge, page_task) = spawn_bridge(page);
    let coordinator = Coordinator::new(bridge, mapper, trace);

    let outcome = if dry_run {
        coordinator.preview(&student).await
    } else {
        coordinator.autofill(&student).await
    };

    // Dropping the coordinator releases the last bridge handle.
    drop(coordinator);
    let page = page_task.await?;
    let outcome = outcome?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if let (Some(path), false) = (output, dry_run) {
        write_page(&page, path)?;
    }
    Ok(())
}

/// Refuse to automate a blocked page. The verdict is traced as step 0,
/// ahead of the pipeline's own steps.
pub fn ensure_accessible(page: &Document, trace: &TraceLogger) -> CmdResult {
    let event = TraceEvent::now(0, PipelineStage::Access);
    match check_accessibility(page) {
        Accessibility::Accessible => {
            trace.log(&event.with_note("accessible"));
            Ok(())
        }
        Accessibility::Blocked { reason } => {
            trace.log(&event.with_error(&reason));
            Err(format!("page is not accessible: {}", reason).into())
        }
    }
}

// ============================================================================
// serve subcommand
// ============================================================================

pub async fn cmd_serve(bind: Option<&str>, config: &AppConfig) -> CmdResult {
    let (backend, model_configured): (Arc<dyn TextInference>, bool) =
        match GeminiBackend::new(config.mapper.clone()) {
            Ok(backend) => (Arc::new(backend), true),
            Err(e) => {
                warn!(error = %e, "serving without a model; mapping requests will fail");
                (Arc::new(UnconfiguredBackend { reason: e.to_string() }), false)
            }
        };

    if config.server.sessions.is_empty() {
        warn!("no sessions configured; every mapping request will be rejected");
    }

    let state = Arc::new(AppState {
        mapper: Arc::new(FieldMapper::new(backend)),
        sessions: Arc::new(StaticSessions::new(config.server.sessions.clone())),
        model_configured,
    });

    let addr = bind.unwrap_or(&config.server.bind);
    serve(addr, state).await?;
    Ok(())
}

// ============================================================================
// bridge subcommand
// ============================================================================

pub async fn cmd_bridge(page_path: &str, output: Option<&str>) -> CmdResult {
    let page = Document::load(page_path)?;
    let (handle, page_task) = spawn_bridge(page);

    let handled = serve_lines(&handle, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?;
    info!(handled, "bridge session finished");

    drop(handle);
    let page = page_task.await?;

    if let Some(path) = output {
        write_page(&page, path)?;
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Instantiate a mapper by name: "gemini", "heuristic" or "remote".
pub fn build_mapper(name: &str, config: &AppConfig) -> CmdResult<Arc<dyn MappingService>> {
    match name {
        "gemini" => {
            let backend = GeminiBackend::new(config.mapper.clone())?;
            let mapper = Arc::new(FieldMapper::new(Arc::new(backend)));
            Ok(Arc::new(AuthorizedMapper::new(mapper, Some(local_caller(config)))))
        }
        "heuristic" => Ok(Arc::new(HeuristicMapper)),
        "remote" => {
            let endpoint = config
                .remote
                .endpoint
                .as_deref()
                .ok_or("remote mapper needs --remote-endpoint or remote.endpoint in config")?;
            let mapper = RemoteMapper::new(
                endpoint,
                config.remote.resolved_session_token(),
                config.mapper.timeout(),
            )?;
            Ok(Arc::new(mapper))
        }
        other => Err(format!(
            "Unknown mapper '{}'. Use 'gemini', 'heuristic' or 'remote'.",
            other
        )
        .into()),
    }
}

/// Identity the CLI maps as: the user behind the configured session token
/// when the token is known locally, else the operator running the CLI.
fn local_caller(config: &AppConfig) -> CallerIdentity {
    config
        .remote
        .resolved_session_token()
        .and_then(|token| config.server.sessions.get(&token).cloned())
        .map(|user| CallerIdentity::new(&user))
        .unwrap_or_else(|| CallerIdentity::new("cli"))
}

pub fn load_student(path: &str) -> CmdResult<StudentData> {
    let content = std::fs::read_to_string(path)?;
    let student = StudentData(serde_json::from_str(&content)?);
    if !student.is_record() {
        return Err(format!("student record '{}' must be a JSON object", path).into());
    }
    Ok(student)
}

pub fn write_page(page: &Document, path: &str) -> CmdResult {
    let json = serde_json::to_string_pretty(&page.to_snapshot())?;
    std::fs::write(path, json)?;
    Ok(())
}
