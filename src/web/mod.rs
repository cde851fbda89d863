use std::{
    collections::BTreeMap,
    convert::Infallible,
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{
    net::TcpListener,
    sync::{broadcast, Mutex},
};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::{error, info, warn};

use crate::{
    catalog::{ResourceType, TileKind},
    engine::{ColonyControls, Engine, LaunchContext},
    error::ColonyError,
    grid::GridPosition,
    ledger::ResourceEntry,
    scenario::Scenario,
    transport::FileSaveStore,
};

#[derive(Clone, Serialize)]
pub struct TileView {
    pub x: i32,
    pub y: i32,
    pub name: String,
    pub label: String,
    pub kind: TileKind,
    pub replaceable: bool,
}

#[derive(Clone, Serialize)]
pub struct StateEnvelope {
    pub colony: String,
    pub tick: u64,
    pub explore_cost: i64,
    pub can_explore: bool,
    pub resources: BTreeMap<ResourceType, ResourceEntry>,
    pub tiles: Vec<TileView>,
}

#[derive(Deserialize)]
pub struct ExploreRequest {
    pub x: i32,
    pub y: i32,
}

#[derive(Deserialize)]
pub struct ReplaceRequest {
    pub x: i32,
    pub y: i32,
    pub tile: String,
    #[serde(default)]
    pub use_cargo: bool,
}

#[derive(Serialize)]
struct CommandResponse {
    tile: String,
    explore_cost: i64,
}

#[derive(Clone)]
struct AppState {
    engine: Arc<Mutex<Engine>>,
    broadcaster: broadcast::Sender<String>,
}

pub struct WebServerConfig {
    pub scenario: Scenario,
    pub save_dir: PathBuf,
    pub new_game: bool,
    pub tick_interval: Duration,
    pub host: String,
    pub port: u16,
}

pub async fn run(config: WebServerConfig) -> Result<()> {
    let WebServerConfig {
        scenario,
        save_dir,
        new_game,
        tick_interval,
        host,
        port,
    } = config;

    let store = FileSaveStore::new(&save_dir);
    let save_record = if new_game {
        None
    } else {
        store
            .read(&scenario.name)
            .with_context(|| format!("Failed to load save for '{}'", scenario.name))?
    };
    let engine = scenario.engine_builder()?.build(LaunchContext {
        new_game,
        save_record,
    })?;

    let (tx, _) = broadcast::channel::<String>(512);
    let state = AppState {
        engine: Arc::new(Mutex::new(engine)),
        broadcaster: tx,
    };

    tokio::spawn(tick_loop(state.clone(), store, tick_interval));

    let router = Router::new()
        .route("/api/state", get(latest_state))
        .route("/api/explore", post(explore))
        .route("/api/replace", post(replace))
        .route("/api/save", post(request_save))
        .route("/api/events", get(stream_events))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

    info!(colony = %scenario.name, %addr, "colony host listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down colony host");
}

/// Advances the colony on a fixed cadence, fans out resource changes and
/// flushes queued saves to disk one at a time.
async fn tick_loop(state: AppState, store: FileSaveStore, period: Duration) {
    let mut interval = tokio::time::interval(period);
    let mut last = Instant::now();
    loop {
        interval.tick().await;
        let now = Instant::now();
        let elapsed = now.duration_since(last).as_secs_f64();
        last = now;

        let (colony, pending) = {
            let mut engine = state.engine.lock().await;
            if let Err(err) = engine.advance(elapsed) {
                error!(error = ?err, "tick failed");
                continue;
            }
            publish_changes(&state.broadcaster, &mut engine);
            (engine.colony_name().to_string(), engine.take_pending_save())
        };

        let Some(record) = pending else {
            continue;
        };
        let writer = store.clone();
        let outcome = tokio::task::spawn_blocking(move || writer.write(&colony, &record)).await;
        let success = match outcome {
            Ok(Ok(_)) => true,
            Ok(Err(err)) => {
                warn!(error = %err, "save write failed");
                false
            }
            Err(err) => {
                warn!(error = %err, "save task failed");
                false
            }
        };
        state.engine.lock().await.complete_save(success);
    }
}

fn publish_changes(tx: &broadcast::Sender<String>, engine: &mut Engine) {
    for change in engine.drain_changes() {
        if let Ok(payload) = serde_json::to_string(&change) {
            let _ = tx.send(payload);
        }
    }
}

fn envelope(engine: &Engine) -> StateEnvelope {
    let ledger = &engine.colony().ledger;
    StateEnvelope {
        colony: engine.colony_name().to_string(),
        tick: engine.tick(),
        explore_cost: engine.explore_cost(),
        can_explore: engine.can_explore(),
        resources: ResourceType::ALL
            .iter()
            .map(|resource| (*resource, ledger.entry(*resource)))
            .collect(),
        tiles: engine
            .tiles()
            .map(|tile| TileView {
                x: tile.position.x,
                y: tile.position.y,
                name: tile.name().to_string(),
                label: tile.definition.label().to_string(),
                kind: tile.definition.kind,
                replaceable: tile.definition.is_replaceable(),
            })
            .collect(),
    }
}

async fn latest_state(State(state): State<AppState>) -> Json<StateEnvelope> {
    let engine = state.engine.lock().await;
    Json(envelope(&engine))
}

async fn explore(
    State(state): State<AppState>,
    Json(request): Json<ExploreRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let position = GridPosition::new(request.x, request.y);
    let mut engine = state.engine.lock().await;
    if engine.tile_at(position).is_some() {
        return Err(ApiError::Occupied(position));
    }
    if !engine.can_explore() {
        return Err(ApiError::Unaffordable);
    }
    let definition = engine.explore(position)?;
    publish_changes(&state.broadcaster, &mut engine);
    Ok(Json(CommandResponse {
        tile: definition.name.clone(),
        explore_cost: engine.explore_cost(),
    }))
}

async fn replace(
    State(state): State<AppState>,
    Json(request): Json<ReplaceRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let position = GridPosition::new(request.x, request.y);
    let mut engine = state.engine.lock().await;
    if !engine.can_afford(&request.tile, request.use_cargo)? {
        return Err(ApiError::Unaffordable);
    }
    engine.replace(position, &request.tile, request.use_cargo)?;
    publish_changes(&state.broadcaster, &mut engine);
    Ok(Json(CommandResponse {
        tile: request.tile,
        explore_cost: engine.explore_cost(),
    }))
}

async fn request_save(State(state): State<AppState>) -> StatusCode {
    state.engine.lock().await.request_save();
    StatusCode::ACCEPTED
}

async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.broadcaster.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(payload) => Some(Ok(Event::default().event("resource").data(payload))),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(2))
            .text("keep-alive"),
    )
}

enum ApiError {
    Colony(ColonyError),
    Occupied(GridPosition),
    Unaffordable,
}

impl From<ColonyError> for ApiError {
    fn from(err: ColonyError) -> Self {
        ApiError::Colony(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Colony(err @ ColonyError::UnknownTile(_)) => {
                (StatusCode::NOT_FOUND, err.to_string())
            }
            ApiError::Colony(err @ ColonyError::NotOccupied(_)) => {
                (StatusCode::NOT_FOUND, err.to_string())
            }
            ApiError::Colony(err) => (StatusCode::CONFLICT, err.to_string()),
            ApiError::Occupied(position) => {
                (StatusCode::CONFLICT, format!("{position} is already explored"))
            }
            ApiError::Unaffordable => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "insufficient resources".to_string(),
            ),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::ScenarioLoader;

    fn engine() -> Engine {
        let scenario = ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"))
            .load("scenarios/mars.yaml")
            .unwrap();
        scenario
            .engine_builder()
            .unwrap()
            .build(LaunchContext::new_game())
            .unwrap()
    }

    #[test]
    fn envelope_lists_every_resource_and_tile() {
        let engine = engine();
        let view = envelope(&engine);
        assert_eq!(view.colony, "mars");
        assert_eq!(view.resources.len(), ResourceType::ALL.len());
        assert_eq!(view.tiles.len(), 37);
        assert_eq!(view.explore_cost, 5);
    }

    #[test]
    fn changes_are_broadcast_as_json() {
        let mut engine = engine();
        engine.drain_changes();
        let (tx, mut rx) = broadcast::channel(16);
        let target = *engine.frontier().iter().next().unwrap();
        engine.explore(target).unwrap();
        publish_changes(&tx, &mut engine);
        let payload: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(payload["resource"], "Crystal");
        assert_eq!(payload["amount"], 95);
        assert_eq!(payload["animate"], true);
    }
}
