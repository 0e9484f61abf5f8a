//! Browser process supervision
//!
//! Guarantees the remote-debugging endpoint is reachable: probes it, launches
//! the browser with computed flags when absent, waits for readiness, and
//! tears a launched process down with a bounded graceful-then-forced
//! shutdown. The profile directory and debugging address are process-wide
//! singletons; stale single-instance lock artifacts from an uncleanly
//! terminated browser are removed before every launch.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::{Error, Result};

/// Explicit launch surface consumed by the supervisor
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Browser executable path
    pub binary: String,
    /// Dedicated profile directory
    pub user_data_dir: PathBuf,
    /// Remote debugging host
    pub host: String,
    /// Remote debugging port
    pub port: u16,
    /// Run headless
    pub headless: bool,
    /// Shell-style extra argument string
    pub extra_args: String,
    /// Deadline for the endpoint to become reachable after launch
    pub startup_timeout: Duration,
    /// Whether the supervisor may spawn the browser itself
    pub manage_process: bool,
    /// Whether a supervisor-launched browser is shut down on scope exit
    pub auto_close: bool,
}

/// Supervises one browser process bound to a fixed debugging address
pub struct Supervisor {
    options: LaunchOptions,
    http: reqwest::Client,
    /// Handle of a process launched here; also serializes ensure/shutdown
    child: Mutex<Option<Child>>,
}

impl Supervisor {
    /// Create a supervisor for the given launch surface
    pub fn new(options: LaunchOptions) -> Self {
        Self {
            options,
            http: reqwest::Client::new(),
            child: Mutex::new(None),
        }
    }

    /// HTTP base URL of the supervised debugging endpoint
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.options.host, self.options.port)
    }

    async fn endpoint_alive(&self) -> bool {
        let url = format!("{}/json/version", self.base_url());
        match self
            .http
            .get(&url)
            .timeout(Duration::from_secs(2))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Ensure the debugging endpoint is reachable. Idempotent.
    ///
    /// Returns `false` when the endpoint already answers, `true` when this
    /// call launched the browser. Fails fast when the endpoint is down and
    /// process management is disabled.
    pub async fn ensure(&self) -> Result<bool> {
        let mut slot = self.child.lock().await;

        if self.endpoint_alive().await {
            return Ok(false);
        }

        if !self.options.manage_process {
            return Err(Error::launch(
                "Remote debugging endpoint is unreachable and process management is disabled. \
                 Start the browser with --remote-debugging-port manually and retry.",
            ));
        }

        clean_stale_locks(&self.options.user_data_dir);

        let mut child = self.spawn()?;
        let ready = self.wait_until_ready(&mut child).await;

        // The handle is stored even on readiness failure so a later
        // shutdown() can still reap the half-started process.
        *slot = Some(child);
        ready?;
        Ok(true)
    }

    fn spawn(&self) -> Result<Child> {
        std::fs::create_dir_all(&self.options.user_data_dir).map_err(|e| {
            Error::launch(format!(
                "Failed to create profile directory {}: {}",
                self.options.user_data_dir.display(),
                e
            ))
        })?;

        let args = compute_args(&self.options);
        info!(
            "Launching managed browser: {} {}",
            self.options.binary,
            args.join(" ")
        );

        Command::new(&self.options.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::launch(format!("Failed to spawn {}: {}", self.options.binary, e)))
    }

    async fn wait_until_ready(&self, child: &mut Child) -> Result<()> {
        let deadline = Instant::now() + self.options.startup_timeout;
        loop {
            if self.endpoint_alive().await {
                debug!("Debugging endpoint is reachable");
                return Ok(());
            }
            if let Some(status) = child
                .try_wait()
                .map_err(|e| Error::launch(format!("Failed to poll browser process: {}", e)))?
            {
                return Err(Error::launch(format!(
                    "Browser exited during startup ({})",
                    status
                )));
            }
            if Instant::now() >= deadline {
                return Err(Error::launch(
                    "Debugging endpoint did not become reachable before the startup deadline",
                ));
            }
            sleep(Duration::from_millis(400)).await;
        }
    }

    /// Shut down a process this supervisor launched: graceful terminate with
    /// a bounded wait, escalating to a forced kill. Clears the handle so a
    /// later `ensure()` can relaunch. No-op when nothing was launched here.
    pub async fn shutdown(&self) {
        let mut slot = self.child.lock().await;
        let Some(mut child) = slot.take() else {
            return;
        };

        info!("Shutting down managed browser");
        terminate(&mut child).await;
    }

    /// Scoped lifecycle: `ensure()` on entry, then `shutdown()` on exit.
    /// The shutdown runs on both success and error exits of the workload,
    /// but only when this invocation performed the launch and auto-close is
    /// enabled.
    pub async fn scoped<T, F, Fut>(&self, work: F) -> Result<T>
    where
        F: FnOnce(bool) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let launched = self.ensure().await?;
        let result = work(launched).await;
        if launched && self.options.auto_close {
            self.shutdown().await;
        }
        result
    }
}

async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
            if timeout(Duration::from_secs(3), child.wait()).await.is_ok() {
                return;
            }
            warn!("Browser did not exit gracefully, forcing kill");
        }
    }

    match timeout(Duration::from_secs(2), child.kill()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Failed to kill browser process: {}", e),
        Err(_) => error!("Browser process did not exit after kill"),
    }
}

/// Compute the launch argument set: fixed debugging address, dedicated
/// profile, headless or visible-mode flags, then caller-supplied extras.
fn compute_args(options: &LaunchOptions) -> Vec<String> {
    let mut args = vec![
        format!("--remote-debugging-port={}", options.port),
        format!("--remote-debugging-address={}", options.host),
        format!("--user-data-dir={}", options.user_data_dir.display()),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
    ];

    if options.headless {
        args.push("--headless=new".to_string());
        // Large viewport keeps scroll-driven collection behaving like a
        // desktop session.
        args.push("--window-size=1920,1080".to_string());
    } else {
        // Visible mode: suppress the automation fingerprint a default
        // launch would expose.
        args.extend(
            [
                "--start-maximized",
                "--disable-software-rasterizer",
                "--disable-blink-features=AutomationControlled",
                "--disable-infobars",
                "--exclude-switches=enable-automation",
                "--use-mock-keychain",
            ]
            .map(String::from),
        );
    }

    args.extend(split_extra_args(&options.extra_args));
    args
}

/// Shell-style splitting of the extra-argument string, honoring single and
/// double quotes so paths with spaces survive.
fn split_extra_args(raw: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in raw.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c.is_whitespace() => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            None => current.push(c),
        }
    }
    if !current.is_empty() {
        args.push(current);
    }
    args
}

/// Best-effort removal of single-instance lock artifacts left by an
/// uncleanly terminated browser. Permission failures are logged, not fatal;
/// launch proceeds either way.
fn clean_stale_locks(profile_dir: &Path) {
    for name in ["SingletonLock", "SingletonCookie", "SingletonSocket"] {
        let target = profile_dir.join(name);
        let meta = match std::fs::symlink_metadata(&target) {
            Ok(meta) => meta,
            Err(_) => continue,
        };

        // symlink_metadata keeps symlinks-to-dirs on the file path
        let removed = if meta.is_dir() {
            std::fs::remove_dir_all(&target)
        } else {
            std::fs::remove_file(&target)
        };

        match removed {
            Ok(()) => info!("Removed stale lock artifact: {}", target.display()),
            Err(e) => warn!(
                "Could not remove {}: {}; the browser may fail to start",
                target.display(),
                e
            ),
        }
    }
}
