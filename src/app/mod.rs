use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::Duration;

use eframe::egui::{self, Context, Vec2};
use serde_json::Value;
use tokio::runtime::Runtime;
use tracing::{info, warn};

use crate::api::{ApiClient, AuthClient, FetchEvent, FetchTask, spawn_explorer_fetch};
use crate::config::AppConfig;
use crate::layout::TreeLayout;
use crate::taxonomy::AnomalyRow;

mod graph;
mod render_utils;
mod state;
mod ui;

pub use state::{ExplorerEvent, ExplorerState, NodeClick, ViewMode};

use ui::login::{LoginForm, PasswordDialog};
use ui::sensors::SensorPanel;

const FETCH_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Data the explorer shows until the live fetch replaces it.
#[derive(Clone, Debug, Default)]
pub struct SeedData {
    pub rows: Vec<AnomalyRow>,
    pub taxonomy: Value,
}

pub struct ExplorerApp {
    config: AppConfig,
    config_path: Option<PathBuf>,
    runtime: Arc<Runtime>,
    api: ApiClient,
    auth: AuthClient,
    seed: SeedData,
    state: AppState,
}

enum AppState {
    CheckingSession { rx: Receiver<bool> },
    Login(Box<LoginForm>),
    Ready(Box<ViewModel>),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Tab {
    Sensors,
    #[default]
    Anomalies,
}

struct ViewModel {
    explorer: ExplorerState,
    fetch: Option<FetchTask>,
    tab: Tab,
    pan: Vec2,
    zoom: f32,
    layout_cache: Option<LayoutCache>,
    search_match_cache: Option<SearchMatchCache>,
    sensors: SensorPanel,
    password_dialog: Option<PasswordDialog>,
    notice: Option<String>,
}

struct LayoutCache {
    tree_revision: u64,
    layout: TreeLayout,
}

struct SearchMatchCache {
    query: String,
    tree_revision: u64,
    matches: Arc<HashSet<usize>>,
}

/// What the top bar asked the shell to do this frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct ShellRequest {
    reload: bool,
    logout: bool,
    change_password: bool,
}

impl ExplorerApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        config: AppConfig,
        config_path: Option<PathBuf>,
        runtime: Arc<Runtime>,
        clients: (ApiClient, AuthClient),
        seed: SeedData,
        skip_login: bool,
    ) -> Self {
        let (api, auth) = clients;
        let state = if skip_login {
            Self::explorer(&config, &runtime, &api, &seed)
        } else {
            Self::start_session_check(&runtime, &auth)
        };

        Self {
            config,
            config_path,
            runtime,
            api,
            auth,
            seed,
            state,
        }
    }

    fn start_session_check(runtime: &Runtime, auth: &AuthClient) -> AppState {
        let (tx, rx) = mpsc::channel();
        let auth = auth.clone();

        runtime.spawn(async move {
            let signed_in = match auth.check().await {
                Ok(signed_in) => signed_in,
                Err(error) => {
                    warn!("session check failed: {error}");
                    false
                }
            };
            let _ = tx.send(signed_in);
        });

        AppState::CheckingSession { rx }
    }

    fn login_form(&self) -> AppState {
        AppState::Login(Box::new(LoginForm::new(
            self.config.remembered_username.clone().unwrap_or_default(),
        )))
    }

    fn explorer(
        config: &AppConfig,
        runtime: &Runtime,
        api: &ApiClient,
        seed: &SeedData,
    ) -> AppState {
        let mut model = ViewModel::new(
            ExplorerState::new(seed.rows.clone(), seed.taxonomy.clone(), config.default_view),
            SensorPanel::new(config),
        );
        model.fetch = Some(Self::spawn_fetch(runtime, api));
        model.sensors.request_time_range(runtime, api);
        AppState::Ready(Box::new(model))
    }

    fn enter_explorer(&self) -> AppState {
        Self::explorer(&self.config, &self.runtime, &self.api, &self.seed)
    }

    fn spawn_fetch(runtime: &Runtime, api: &ApiClient) -> FetchTask {
        info!(api = api.base_url(), "fetching anomaly list and taxonomy");
        spawn_explorer_fetch(runtime.handle(), Arc::new(api.clone()))
    }

    fn remember_username(&mut self, username: String) {
        if self.config.remembered_username.as_deref() == Some(username.as_str()) {
            return;
        }

        self.config.remembered_username = Some(username);
        if let Some(path) = &self.config_path
            && let Err(error) = self.config.save(path)
        {
            warn!("failed to persist config: {error:#}");
        }
    }

    fn logout(&self) {
        let auth = self.auth.clone();
        self.runtime.spawn(async move {
            if let Err(error) = auth.logout().await {
                warn!("logout failed: {error}");
            }
        });
    }
}

impl eframe::App for ExplorerApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;

        match &mut self.state {
            AppState::CheckingSession { rx } => {
                match rx.try_recv() {
                    Ok(true) => transition = Some(self.enter_explorer()),
                    Ok(false) | Err(TryRecvError::Disconnected) => {
                        transition = Some(self.login_form());
                    }
                    Err(TryRecvError::Empty) => ctx.request_repaint_after(FETCH_POLL_INTERVAL),
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Checking session...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
            }
            AppState::Login(form) => {
                if let Some(username) = form.show(ctx, self.runtime.handle(), &self.auth) {
                    info!(%username, "signed in");
                    self.remember_username(username);
                    transition = Some(self.enter_explorer());
                }
            }
            AppState::Ready(model) => {
                model.poll_fetch(ctx);
                model.sensors.poll(ctx);

                let request = model.show(ctx, &self.runtime, &self.api);

                if request.change_password {
                    model.password_dialog.get_or_insert_with(PasswordDialog::default);
                }
                if let Some(dialog) = &mut model.password_dialog
                    && !dialog.show(ctx, self.runtime.handle(), &self.auth)
                {
                    model.password_dialog = None;
                }

                if request.reload {
                    // Replacing the handle cancels whatever is still in flight.
                    model.fetch = None;
                    model.notice = None;
                    model.fetch = Some(Self::spawn_fetch(&self.runtime, &self.api));
                }

                if request.logout {
                    model.teardown();
                    self.logout();
                    transition = Some(self.login_form());
                }
            }
        }

        if let Some(next_state) = transition {
            self.state = next_state;
        }
    }
}

impl Drop for ExplorerApp {
    fn drop(&mut self) {
        if let AppState::Ready(model) = &mut self.state {
            model.teardown();
        }
    }
}

impl ViewModel {
    fn dispatch(&mut self, event: ExplorerEvent) {
        let state = std::mem::take(&mut self.explorer);
        self.explorer = state.reduce(event);
    }

    fn poll_fetch(&mut self, ctx: &Context) {
        let Some(task) = self.fetch.as_mut() else {
            return;
        };

        let mut events = Vec::new();
        while let Some(event) = task.try_next() {
            events.push(event);
        }
        let done = task.is_done();

        for event in events {
            let event = match event {
                FetchEvent::AnomalyList(Ok(rows)) => {
                    info!(rows = rows.len(), "anomaly list received");
                    ExplorerEvent::RowsFetched(rows)
                }
                FetchEvent::DynamicTree(Ok(taxonomy)) => {
                    info!("taxonomy received");
                    ExplorerEvent::TaxonomyFetched(taxonomy)
                }
                FetchEvent::AnomalyList(Err(error)) | FetchEvent::DynamicTree(Err(error)) => {
                    self.notice = Some(format!("Could not load anomaly data: {error}"));
                    ExplorerEvent::FetchFailed(error.to_string())
                }
            };
            self.dispatch(event);
        }

        if done {
            self.fetch = None;
        } else {
            ctx.request_repaint_after(FETCH_POLL_INTERVAL);
        }
    }

    fn teardown(&mut self) {
        if let Some(mut task) = self.fetch.take() {
            task.cancel();
        }
        self.sensors.cancel();
        self.dispatch(ExplorerEvent::Teardown);
    }
}
