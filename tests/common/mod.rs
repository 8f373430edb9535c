//! Shared utilities for API integration tests.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use routectl::config::AppSettings;
use routectl::http::{AppState, HttpServer};
use routectl::lifecycle::Shutdown;
use routectl::service::{ServiceAction, ServiceControl, ServiceError, ServiceInfo, ServiceStatus, SystemRunner};
use routectl::validator::{BinaryLocator, ConfigValidator, LocatorSettings, ValidatorError};

/// Counts every call and rejects any candidate containing an outbound or
/// rule set whose `type` is `"bad"`.
#[derive(Default)]
pub struct FakeValidator {
    pub calls: AtomicUsize,
}

impl FakeValidator {
    #[allow(dead_code)]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn has_bad_type(section: &Value) -> bool {
    match section {
        Value::Array(items) => items.iter().any(|item| item["type"] == "bad"),
        Value::Object(_) => section["type"] == "bad",
        _ => false,
    }
}

#[async_trait]
impl ConfigValidator for FakeValidator {
    async fn validate(&self, candidate: &Value) -> Result<(), ValidatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if has_bad_type(&candidate["outbounds"]) || has_bad_type(&candidate["route"]["rule_set"]) {
            return Err(ValidatorError::Rejected {
                output: "FATAL[0000] unknown type: bad".into(),
            });
        }
        Ok(())
    }

    async fn validate_file(&self, path: &Path) -> Result<(), ValidatorError> {
        let content = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&content)?;
        self.validate(&value).await
    }
}

/// Records actions; reports whatever status it is told to.
pub struct FakeServices {
    pub actions: Mutex<Vec<(String, ServiceAction)>>,
    pub status: Mutex<ServiceStatus>,
}

impl Default for FakeServices {
    fn default() -> Self {
        Self {
            actions: Mutex::new(Vec::new()),
            status: Mutex::new(ServiceStatus::Running),
        }
    }
}

impl FakeServices {
    #[allow(dead_code)]
    pub fn actions(&self) -> Vec<(String, ServiceAction)> {
        self.actions.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn set_status(&self, status: ServiceStatus) {
        *self.status.lock().unwrap() = status;
    }
}

#[async_trait]
impl ServiceControl for FakeServices {
    async fn control(&self, service: &str, action: ServiceAction) -> Result<(), ServiceError> {
        self.actions.lock().unwrap().push((service.to_string(), action));
        Ok(())
    }

    async fn status(&self, service: &str) -> Result<ServiceInfo, ServiceError> {
        let status = *self.status.lock().unwrap();
        Ok(ServiceInfo::new(service, status))
    }
}

/// A running server over a scratch directory.
pub struct TestServer {
    pub addr: SocketAddr,
    pub dir: TempDir,
    pub config_path: PathBuf,
    pub validator: Arc<FakeValidator>,
    pub services: Arc<FakeServices>,
    pub shutdown: Shutdown,
    pub client: reqwest::Client,
}

#[allow(dead_code)]
impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// The sing-box document as currently on disk.
    pub fn read_config(&self) -> Value {
        let content = std::fs::read_to_string(&self.config_path).unwrap();
        serde_json::from_str(&content).unwrap()
    }

    pub fn read_raw(&self) -> String {
        std::fs::read_to_string(&self.config_path).unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Settings rooted in `dir` with zero rollback delays.
pub fn test_settings(dir: &Path) -> AppSettings {
    let mut settings = AppSettings::default();
    settings.server.bind_address = "127.0.0.1:0".into();
    settings.server.web_dir = dir.join("web");
    settings.engine.config_path = dir.join("config.json");
    settings.engine.fallback_paths = Vec::new();
    settings.dns.config_path = dir.join("mosdns.yaml");
    settings.backup.dir = dir.join("backups");
    settings.rollback.flush_delay_secs = 0;
    settings.rollback.verify_delay_secs = 0;
    settings
}

#[allow(dead_code)]
pub async fn spawn_server(config: Value) -> TestServer {
    spawn_server_with(config, |_| {}).await
}

/// Write `config` as the sing-box document, let `adjust` tweak the
/// settings, then serve on an ephemeral port.
pub async fn spawn_server_with<F>(config: Value, adjust: F) -> TestServer
where
    F: FnOnce(&mut AppSettings),
{
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.json");
    std::fs::write(&config_path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

    let mut settings = test_settings(dir.path());
    adjust(&mut settings);

    let validator = Arc::new(FakeValidator::default());
    let services = Arc::new(FakeServices::default());
    let runner = Arc::new(SystemRunner::new(Duration::from_secs(5)));
    let locator = Arc::new(BinaryLocator::new(LocatorSettings::for_service("sing-box"), runner));

    let state = AppState::assemble(settings, validator.clone(), services.clone(), locator);
    let server = HttpServer::from_state(state);

    let shutdown = Shutdown::new();
    let (_, config_updates) = mpsc::unbounded_channel();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(100)).await;

    let client = reqwest::Client::builder().no_proxy().build().unwrap();

    TestServer {
        addr,
        dir,
        config_path,
        validator,
        services,
        shutdown,
        client,
    }
}
