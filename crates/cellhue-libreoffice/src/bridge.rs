//! LibreOffice bridge: manages the soffice process and URP connection.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use libreoffice_urp::interface::{x_component_loader, x_desktop};
use libreoffice_urp::marshal::property_value;
use libreoffice_urp::proxy::returned_proxy;
use libreoffice_urp::{type_names, Type, UnoEnvironment, UnoValue, UrpConnection};
use tokio::process::{Child, Command};
use tokio::time::{sleep, Instant};
use url::Url;

use crate::error::{BridgeError, Result};
use crate::workbook::Workbook;

/// Pause between connection attempts while a spawned office starts up.
const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// How long a spawned office gets to exit after `terminate` before it is
/// killed.
const EXIT_GRACE: Duration = Duration::from_secs(5);

/// Configuration for the LibreOffice bridge.
#[derive(Debug, Clone)]
pub struct LibreOfficeConfig {
    /// Path to the `soffice` executable. If None, searches PATH.
    pub soffice_path: Option<PathBuf>,
    /// Host to connect to (or listen on). Default: "localhost".
    pub host: String,
    /// Port for URP socket communication. Default: 2002.
    pub port: u16,
    /// Timeout for waiting for LibreOffice to start. Default: 30 seconds.
    pub startup_timeout: Duration,
    /// Extra arguments to pass to soffice.
    pub extra_args: Vec<String>,
}

impl Default for LibreOfficeConfig {
    fn default() -> Self {
        Self {
            soffice_path: None,
            host: "localhost".to_string(),
            port: 2002,
            startup_timeout: Duration::from_secs(30),
            extra_args: Vec::new(),
        }
    }
}

impl LibreOfficeConfig {
    /// The `--accept` connection string soffice listens on.
    pub fn accept_string(&self) -> String {
        format!(
            "socket,host={},port={};urp;{}",
            self.host,
            self.port,
            libreoffice_urp::connection::INITIAL_OBJECT
        )
    }

    fn command(&self) -> Command {
        let soffice = self
            .soffice_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("soffice"));
        let mut cmd = Command::new(soffice);
        cmd.arg("--headless")
            .arg("--invisible")
            .arg("--nocrashreport")
            .arg("--nodefault")
            .arg("--nologo")
            .arg("--nofirststartwizard")
            .arg("--norestore")
            .arg(format!("--accept={}", self.accept_string()))
            .args(&self.extra_args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

/// The main handle for communicating with LibreOffice via URP.
pub struct LibreOfficeBridge {
    conn: UrpConnection,
    /// The child process, if we spawned it.
    child: Option<Child>,
    env: UnoEnvironment,
}

impl LibreOfficeBridge {
    /// Connect to an already-running LibreOffice instance.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let mut conn = UrpConnection::connect(host, port).await?;
        let env = conn.bootstrap().await?;
        Ok(Self {
            conn,
            child: None,
            env,
        })
    }

    /// Start a new LibreOffice instance and connect to it.
    ///
    /// Connection attempts repeat until `startup_timeout` runs out or the
    /// process exits.
    pub async fn start(config: LibreOfficeConfig) -> Result<Self> {
        let mut cmd = config.command();
        tracing::info!("Starting LibreOffice: {:?}", cmd);
        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BridgeError::NotFound(
                    config
                        .soffice_path
                        .clone()
                        .unwrap_or_else(|| PathBuf::from("soffice")),
                )
            } else {
                BridgeError::SpawnFailed(e)
            }
        })?;

        let deadline = Instant::now() + config.startup_timeout;
        let mut attempts = 0u32;
        let mut conn = loop {
            attempts += 1;
            match UrpConnection::connect(&config.host, config.port).await {
                Ok(conn) => break conn,
                Err(e) => tracing::debug!(attempts, error = %e, "office not listening yet"),
            }
            if let Some(status) = child.try_wait()? {
                return Err(BridgeError::Process(format!(
                    "soffice exited during startup ({status})"
                )));
            }
            if Instant::now() >= deadline {
                let _ = child.kill().await;
                return Err(BridgeError::Timeout(config.startup_timeout.as_secs()));
            }
            sleep(CONNECT_RETRY_INTERVAL).await;
        };
        tracing::info!(attempts, "LibreOffice is accepting connections");

        let env = conn.bootstrap().await?;
        Ok(Self {
            conn,
            child: Some(child),
            env,
        })
    }

    /// Whether this bridge spawned the office it talks to.
    pub fn owns_process(&self) -> bool {
        self.child.is_some()
    }

    /// Open a workbook read-only and hidden.
    pub async fn open_workbook(&mut self, path: &Path) -> Result<Workbook<'_>> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|_| BridgeError::InvalidPath(path.to_path_buf()))?
                .join(path)
        };
        let url = Url::from_file_path(&absolute)
            .map_err(|()| BridgeError::InvalidPath(absolute.clone()))?;
        self.load(url.as_str()).await
    }

    /// Create a new, empty spreadsheet document.
    pub async fn new_workbook(&mut self) -> Result<Workbook<'_>> {
        self.load("private:factory/scalc").await
    }

    async fn load(&mut self, url: &str) -> Result<Workbook<'_>> {
        let properties = UnoValue::Sequence(vec![
            property_value("Hidden", Type::boolean(), UnoValue::Bool(true)),
            property_value("ReadOnly", Type::boolean(), UnoValue::Bool(true)),
        ]);
        let loaded = self
            .conn
            .call(
                &self.env.desktop,
                &x_component_loader::LOAD_COMPONENT_FROM_URL,
                &[
                    UnoValue::String(url.to_string()),
                    UnoValue::String("_blank".to_string()),
                    UnoValue::Long(0),
                    properties,
                ],
            )
            .await
            .map_err(|e| BridgeError::WorkbookOpen {
                url: url.to_string(),
                source: Some(e),
            })?;

        // The loader answers null for files it cannot import.
        let doc = returned_proxy(&x_component_loader::LOAD_COMPONENT_FROM_URL, &loaded)
            .ok_or_else(|| BridgeError::WorkbookOpen {
                url: url.to_string(),
                source: None,
            })?;
        tracing::info!(%url, oid = %doc.oid, "Loaded document");

        Ok(Workbook::new(&mut self.conn, doc, url.to_string()))
    }

    /// Shut down the bridge.
    ///
    /// A spawned office is asked to terminate and killed if it is still
    /// running after a grace period. An office we only attached to is left
    /// running.
    pub async fn shutdown(mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        match self
            .conn
            .require_interface(&self.env.desktop, type_names::X_DESKTOP)
            .await
        {
            Ok(desktop) => {
                // The office may drop the socket before replying.
                if let Err(e) = self.conn.call(&desktop, &x_desktop::TERMINATE, &[]).await {
                    tracing::debug!(error = %e, "terminate did not complete");
                }
            }
            Err(e) => tracing::debug!(error = %e, "desktop has no XDesktop"),
        }
        drop(self.conn);

        match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
            Ok(status) => {
                let status = status?;
                tracing::info!(%status, "LibreOffice exited");
            }
            Err(_) => {
                tracing::warn!("LibreOffice did not exit, killing it");
                child.kill().await?;
            }
        }
        Ok(())
    }
}
