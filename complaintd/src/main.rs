//! Complaint map daemon
//!
//! Serves the complaint data endpoint and a headless complaint map over a
//! newline-delimited JSON protocol:
//! - list and submit complaints (validated, persisted to `complaints.json`)
//! - nearby-complaint queries
//! - marker selection and the detail panel
//! - live view status (markers, pulses, chain states)
//!
//! Storage locations:
//! - Linux: ~/.local/share/complaint_map/
//! - Windows: %APPDATA%\complaint_map\
//! - MacOS: ~/Library/Application Support/complaint_map/

use std::sync::Arc;
use std::time::Duration;

use complaint_map::complaint::ComplaintSubmission;
use complaint_map::proximity::{degree_distance, nearby_indices, NearbyQuery};
use complaint_map::selection::PanelView;
use complaint_map::surface::{RecordingSurface, SurfaceEvent};
use complaint_map::view::ViewStats;
use complaint_map::{Complaint, ComplaintMapView};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio::time;
use tracing::{error, info, warn};

mod config;
mod endpoint;
mod paths;

use config::DaemonConfig;
use endpoint::ComplaintRepository;
use paths::AppPaths;

// ═══════════════════════════════════════════════════════════════════════════
// Protocol Messages
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum Request {
    GetComplaints,
    SubmitComplaint { complaint: ComplaintSubmission },
    Nearby { index: usize, limit: Option<usize> },
    Select { index: usize },
    SelectNearby { n: usize },
    ToggleNearby,
    ClosePanel,
    GetPanel,
    GetStatus,
    Refresh,
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum Response {
    Complaints { complaints: Vec<Complaint> },
    Nearby { index: usize, nearby: Vec<NearbyHit> },
    Panel(PanelView),
    Status(StatusSnapshot),
    Success { message: String },
    Error { status: u16, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NearbyHit {
    index: usize,
    issue_type: String,
    distance_deg: f64,
    description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StatusSnapshot {
    complaints: usize,
    markers: usize,
    pulses: usize,
    selected: Option<usize>,
    awaiting_load: bool,
    chains: Vec<String>,
    data_file: String,
}

impl Response {
    fn error(status: u16, message: impl Into<String>) -> Self {
        Response::Error {
            status,
            message: message.into(),
        }
    }

    fn torn_down() -> Self {
        Response::error(503, "Map view has been torn down")
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Daemon State
// ═══════════════════════════════════════════════════════════════════════════

struct DaemonState {
    repo: ComplaintRepository,
    view: Option<ComplaintMapView>,
}

impl DaemonState {
    /// Mount the headless view on a fresh surface; the style "loads" right
    /// after mount, which applies the deferred layer sync.
    async fn start(repo: ComplaintRepository, config: DaemonConfig) -> Self {
        let surface = RecordingSurface::new(config.view.map_options());
        let probe = surface.clone();
        let view = ComplaintMapView::mount(Box::new(surface), &repo, config.view).await;
        probe.set_loaded(true);
        view.handle_event(SurfaceEvent::Loaded).await;

        Self {
            repo,
            view: Some(view),
        }
    }

    async fn status(&self) -> Option<StatusSnapshot> {
        let view = self.view.as_ref()?;
        let ViewStats {
            complaints,
            markers,
            pulses,
            selected,
            awaiting_load,
        } = view.stats().await;
        Some(StatusSnapshot {
            complaints,
            markers,
            pulses,
            selected,
            awaiting_load,
            chains: view
                .chain_states()
                .iter()
                .map(|s| format!("{:?}", s))
                .collect(),
            data_file: self.repo.path().display().to_string(),
        })
    }

    async fn teardown(&mut self) {
        if let Some(view) = self.view.take() {
            view.teardown().await;
        }
    }
}

async fn handle_request(state: &Arc<RwLock<DaemonState>>, request: Request) -> Response {
    match request {
        Request::GetComplaints => {
            let s = state.read().await;
            match s.repo.list().await {
                Ok(data) => Response::Complaints {
                    complaints: data.complaints,
                },
                Err(e) => Response::error(e.status(), e.to_string()),
            }
        }
        Request::SubmitComplaint { complaint } => {
            let s = state.read().await;
            match s.repo.submit(complaint).await {
                Ok(data) => {
                    if let Some(view) = &s.view {
                        if let Err(e) = view.refresh(&s.repo).await {
                            warn!("Stored complaint but view refresh failed: {}", e);
                        }
                    }
                    Response::Complaints {
                        complaints: data.complaints,
                    }
                }
                Err(e) => {
                    warn!("Rejected complaint submission: {}", e);
                    Response::error(e.status(), e.to_string())
                }
            }
        }
        Request::Nearby { index, limit } => {
            let s = state.read().await;
            let Some(view) = &s.view else {
                return Response::torn_down();
            };
            let set = view.store().snapshot().await;
            let Some(target) = set.get(index) else {
                return Response::error(404, format!("No complaint at index {}", index));
            };
            let query = NearbyQuery {
                limit: limit.unwrap_or(NearbyQuery::default().limit),
                ..NearbyQuery::default()
            };
            let nearby = nearby_indices(target, &set, query)
                .into_iter()
                .map(|i| NearbyHit {
                    index: i,
                    issue_type: set[i].issue_type.to_string(),
                    distance_deg: degree_distance(target.coordinates, set[i].coordinates),
                    description: set[i].description.clone(),
                })
                .collect();
            Response::Nearby { index, nearby }
        }
        Request::Select { index } => {
            let s = state.read().await;
            let Some(view) = &s.view else {
                return Response::torn_down();
            };
            if view.select_index(index).await {
                Response::Panel(view.panel().await)
            } else {
                Response::error(404, format!("No complaint at index {}", index))
            }
        }
        Request::SelectNearby { n } => {
            let s = state.read().await;
            let Some(view) = &s.view else {
                return Response::torn_down();
            };
            if view.select_nearby(n).await {
                Response::Panel(view.panel().await)
            } else {
                Response::error(404, format!("No nearby entry {}", n))
            }
        }
        Request::ToggleNearby => {
            let s = state.read().await;
            let Some(view) = &s.view else {
                return Response::torn_down();
            };
            view.toggle_nearby().await;
            Response::Panel(view.panel().await)
        }
        Request::ClosePanel => {
            let s = state.read().await;
            let Some(view) = &s.view else {
                return Response::torn_down();
            };
            view.close_panel().await;
            Response::Panel(view.panel().await)
        }
        Request::GetPanel => {
            let s = state.read().await;
            match &s.view {
                Some(view) => Response::Panel(view.panel().await),
                None => Response::torn_down(),
            }
        }
        Request::GetStatus => {
            let s = state.read().await;
            match s.status().await {
                Some(status) => Response::Status(status),
                None => Response::torn_down(),
            }
        }
        Request::Refresh => {
            let s = state.read().await;
            let Some(view) = &s.view else {
                return Response::torn_down();
            };
            match view.refresh(&s.repo).await {
                Ok(n) => Response::Success {
                    message: format!("Loaded {} complaints", n),
                },
                Err(e) => Response::error(500, e.to_string()),
            }
        }
        Request::Shutdown => {
            let mut s = state.write().await;
            s.teardown().await;
            info!("Shutdown requested; view torn down");
            tokio::spawn(async {
                // Give the response a moment to flush before exiting.
                time::sleep(Duration::from_millis(50)).await;
                std::process::exit(0);
            });
            Response::Success {
                message: "Shutting down".to_string(),
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Client Handler
// ═══════════════════════════════════════════════════════════════════════════

async fn handle_client(
    stream: TcpStream,
    state: Arc<RwLock<DaemonState>>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => handle_request(&state, request).await,
            Err(e) => Response::error(400, format!("Invalid request: {}", e)),
        };

        writer
            .write_all(serde_json::to_string(&response)?.as_bytes())
            .await?;
        writer.write_all(b"\n").await?;
    }

    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
// Main
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Setup application paths
    let paths = AppPaths::new()?;
    info!("Data directory: {:?}", paths.data_dir());

    let mut config = DaemonConfig::load(&paths.config_file());
    config.view.apply_env();

    let data_file = config
        .data_file
        .clone()
        .unwrap_or_else(|| paths.complaints_file());
    info!("Complaint file: {:?}", data_file);

    let repo = ComplaintRepository::new(data_file);
    if let Err(e) = repo.ensure_exists().await {
        warn!("Could not prepare complaint file: {}", e);
    }

    let bind = config.bind.clone();
    let state = Arc::new(RwLock::new(DaemonState::start(repo, config).await));

    // Tear the view down on Ctrl-C so no timers outlive the process state.
    {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                state.write().await.teardown().await;
                info!("Ctrl-C: view torn down");
                std::process::exit(0);
            }
        });
    }

    let listener = TcpListener::bind(&bind).await?;
    info!("Complaint daemon listening on {}", bind);

    // Accept client connections
    loop {
        let (stream, addr) = listener.accept().await?;
        info!("Client connected: {}", addr);
        let state_clone = Arc::clone(&state);

        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, state_clone).await {
                error!("Client handler error: {}", e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use complaint_map::config::PulseConfig;

    async fn state(name: &str, body: &str) -> (Arc<RwLock<DaemonState>>, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!(
            "complaintd_main_{}_{}",
            name,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("complaints.json");
        std::fs::write(&file, body).unwrap();

        let mut config = DaemonConfig::default();
        config.view.pulse = PulseConfig {
            seed: Some(17),
            ..PulseConfig::default()
        };
        let s = DaemonState::start(ComplaintRepository::new(file), config).await;
        (Arc::new(RwLock::new(s)), dir)
    }

    const TWO: &str = r#"{"complaints":[
        {"issue_type":"Illegal Dumping","date":"2024-01-15","coordinates":[37.43,-122.17]},
        {"issue_type":"Air Quality","date":"2024-01-16","coordinates":[37.4301,-122.1701]}
    ]}"#;

    #[tokio::test(start_paused = true)]
    async fn submit_refreshes_view_and_rejects_invalid() {
        let (state, dir) = state("submit", TWO).await;

        let bad: Request = serde_json::from_str(
            r#"{"type":"SubmitComplaint","complaint":{"coordinates":[1.0,2.0]}}"#,
        )
        .unwrap();
        match handle_request(&state, bad).await {
            Response::Error { status, .. } => assert_eq!(status, 400),
            other => panic!("unexpected {other:?}"),
        }

        let good: Request = serde_json::from_str(
            r#"{"type":"SubmitComplaint","complaint":{"issue_type":"Encampment Waste","coordinates":[37.4302,-122.1702]}}"#,
        )
        .unwrap();
        match handle_request(&state, good).await {
            Response::Complaints { complaints } => assert_eq!(complaints.len(), 3),
            other => panic!("unexpected {other:?}"),
        }

        // Date text is stored as given, not validated.
        let dated: Request = serde_json::from_str(
            r#"{"type":"SubmitComplaint","complaint":{"issue_type":"Air Quality","date":"January 15, 2024","coordinates":[37.4303,-122.1703]}}"#,
        )
        .unwrap();
        match handle_request(&state, dated).await {
            Response::Complaints { complaints } => {
                assert_eq!(complaints.len(), 4);
                assert_eq!(complaints[3].date.raw(), "January 15, 2024");
            }
            other => panic!("unexpected {other:?}"),
        }

        match handle_request(&state, Request::GetStatus).await {
            Response::Status(s) => {
                assert_eq!(s.complaints, 4);
                assert_eq!(s.markers, 4);
                assert_eq!(s.chains.len(), 3);
                assert!(!s.awaiting_load);
            }
            other => panic!("unexpected {other:?}"),
        }

        state.write().await.teardown().await;
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test(start_paused = true)]
    async fn nearby_and_selection_round_trip() {
        let (state, dir) = state("nearby", TWO).await;

        match handle_request(&state, Request::Nearby { index: 0, limit: None }).await {
            Response::Nearby { nearby, .. } => {
                assert_eq!(nearby.len(), 1);
                assert_eq!(nearby[0].index, 1);
                assert!(nearby[0].distance_deg < 0.005);
            }
            other => panic!("unexpected {other:?}"),
        }

        match handle_request(&state, Request::Select { index: 1 }).await {
            Response::Panel(PanelView::Detail(d)) => assert_eq!(d.issue_type, "Air Quality"),
            other => panic!("unexpected {other:?}"),
        }
        match handle_request(&state, Request::Select { index: 9 }).await {
            Response::Error { status, .. } => assert_eq!(status, 404),
            other => panic!("unexpected {other:?}"),
        }
        match handle_request(&state, Request::ClosePanel).await {
            Response::Panel(PanelView::Empty { .. }) => {}
            other => panic!("unexpected {other:?}"),
        }

        state.write().await.teardown().await;
        match handle_request(&state, Request::GetPanel).await {
            Response::Error { status, .. } => assert_eq!(status, 503),
            other => panic!("unexpected {other:?}"),
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn responses_are_tagged_json() {
        let json = serde_json::to_value(Response::error(400, "bad")).unwrap();
        assert_eq!(json["type"], "Error");
        assert_eq!(json["status"], 400);

        let panel = serde_json::to_value(Response::Panel(PanelView::Empty {
            hint: "x".to_string(),
        }))
        .unwrap();
        assert_eq!(panel["type"], "Panel");
        assert_eq!(panel["state"], "empty");
    }
}
