//! Playwright browser automation
//!
//! Browsers are driven through a small Node.js bridge: the script below is
//! written next to the test artifacts and started with a JSON launch config.
//! Commands and replies are newline-delimited JSON over stdin/stdout.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use qa_common::{QaError, QaResult};

use crate::page::{ActionOptions, LoadState, Page};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

/// When an artifact is kept
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureMode {
    #[default]
    On,
    Off,
    RetainOnFailure,
}

impl CaptureMode {
    fn records(&self) -> bool {
        *self != CaptureMode::Off
    }

    fn keeps(&self, failed: bool) -> bool {
        match self {
            CaptureMode::On => true,
            CaptureMode::Off => false,
            CaptureMode::RetainOnFailure => failed,
        }
    }
}

/// Browser settings, the `[web]` table of a suite config
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Site under test; relative page URLs resolve against it
    pub base_url: String,

    /// One project per browser
    pub browsers: Vec<Browser>,

    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Default timeout for a single browser action
    pub action_timeout_ms: u64,
    pub navigation_timeout_ms: u64,

    pub trace: CaptureMode,
    pub screenshot: CaptureMode,
    pub video: CaptureMode,

    /// Node.js executable
    pub node: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            base_url: "https://blog.agibank.com.br".to_string(),
            browsers: vec![Browser::Chromium],
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            action_timeout_ms: 10_000,
            navigation_timeout_ms: 30_000,
            trace: CaptureMode::On,
            screenshot: CaptureMode::On,
            video: CaptureMode::On,
            node: "node".to_string(),
        }
    }
}

/// Check if Playwright is installed
pub fn check_playwright_installed() -> QaResult<()> {
    let output = Command::new("npx")
        .args(["playwright", "--version"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match output {
        Ok(status) if status.success() => Ok(()),
        _ => Err(QaError::PlaywrightNotFound),
    }
}

const BRIDGE_SCRIPT: &str = r#"
const readline = require('readline');
const playwright = require('playwright');

const config = JSON.parse(process.argv[2]);
let browser, context, page;

function send(msg) {
  process.stdout.write(JSON.stringify(msg) + '\n');
}

async function start() {
  browser = await playwright[config.browser].launch({ headless: config.headless });
  const options = {
    baseURL: config.baseUrl,
    viewport: { width: config.viewport.width, height: config.viewport.height },
  };
  if (config.videoDir) options.recordVideo = { dir: config.videoDir };
  context = await browser.newContext(options);
  context.setDefaultTimeout(config.actionTimeout);
  context.setDefaultNavigationTimeout(config.navigationTimeout);
  if (config.trace) await context.tracing.start({ screenshots: true, snapshots: true });
  page = await context.newPage();
}

async function withLoad(m, action) {
  if (m.waitUntil) {
    await Promise.all([page.waitForLoadState(m.waitUntil), action()]);
  } else {
    await action();
  }
  return null;
}

const ops = {
  goto: async (m) => { await page.goto(m.url, { waitUntil: m.waitUntil }); return null; },
  count: (m) => page.locator(m.selector).count(),
  is_visible: (m) => page.locator(m.selector).first().isVisible(),
  click: (m) => withLoad(m, () => page.locator(m.selector).first().click({ timeout: m.timeout ?? undefined })),
  fill: async (m) => { await page.locator(m.selector).first().fill(m.value); return null; },
  type: async (m) => { await page.locator(m.selector).first().pressSequentially(m.text); return null; },
  press: (m) => withLoad(m, () => page.locator(m.selector).first().press(m.key, { timeout: m.timeout ?? undefined })),
  url: async () => page.url(),
  text_visible: (m) => page.getByText(new RegExp(m.pattern, 'i')).first().isVisible(),
  close: async (m) => {
    const files = [];
    if (m.screenshot) {
      await page.screenshot({ path: m.screenshot, fullPage: true });
      files.push(m.screenshot);
    }
    if (m.trace) {
      await context.tracing.stop({ path: m.trace });
      files.push(m.trace);
    }
    const video = page.video();
    await context.close();
    if (video) files.push(await video.path());
    await browser.close();
    return files;
  },
};

start().then(() => {
  send({ id: 0, ok: true, value: 'ready' });
  const rl = readline.createInterface({ input: process.stdin });
  rl.on('line', async (line) => {
    let msg;
    try {
      msg = JSON.parse(line);
    } catch (e) {
      send({ id: null, ok: false, error: 'bad request: ' + e.message });
      return;
    }
    try {
      const op = ops[msg.op];
      if (!op) throw new Error('unknown op: ' + msg.op);
      const value = await op(msg);
      send({ id: msg.id, ok: true, value: value === undefined ? null : value });
      if (msg.op === 'close') process.exit(0);
    } catch (e) {
      send({ id: msg.id, ok: false, error: e.message });
    }
  });
  rl.on('close', () => browser.close().finally(() => process.exit(0)));
}).catch((e) => {
  send({ id: 0, ok: false, error: e.message });
  process.exit(1);
});
"#;

/// Launch settings handed to the bridge script
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LaunchConfig<'a> {
    browser: &'a str,
    headless: bool,
    base_url: &'a str,
    viewport: Viewport,
    action_timeout: u64,
    navigation_timeout: u64,
    trace: bool,
    video_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct Viewport {
    width: u32,
    height: u32,
}

#[derive(Debug, Deserialize)]
struct BridgeReply {
    id: Option<u64>,
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

struct BridgeIo {
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
}

/// One browser, context and page, owned by one test attempt
pub struct PlaywrightSession {
    io: Mutex<BridgeIo>,
    // Killed on drop when the attempt is aborted
    _child: Child,
    artifacts_dir: PathBuf,
    screenshot: CaptureMode,
    trace: CaptureMode,
    video: CaptureMode,
}

const LAUNCH_TIMEOUT: Duration = Duration::from_secs(60);

impl PlaywrightSession {
    /// Start a bridge for `browser`, keeping artifacts under `artifacts_dir`
    pub async fn launch(
        config: &WebConfig,
        browser: Browser,
        artifacts_dir: &Path,
    ) -> QaResult<Self> {
        std::fs::create_dir_all(artifacts_dir)?;
        let script_path = artifacts_dir.join("bridge.js");
        std::fs::write(&script_path, BRIDGE_SCRIPT)?;

        let launch = LaunchConfig {
            browser: browser.as_str(),
            headless: config.headless,
            base_url: &config.base_url,
            viewport: Viewport {
                width: config.viewport_width,
                height: config.viewport_height,
            },
            action_timeout: config.action_timeout_ms,
            navigation_timeout: config.navigation_timeout_ms,
            trace: config.trace.records(),
            video_dir: config
                .video
                .records()
                .then(|| artifacts_dir.join("video")),
        };

        debug!("Starting Playwright bridge: {}", script_path.display());
        let log = std::fs::File::create(artifacts_dir.join("bridge.log"))?;
        let mut command = TokioCommand::new(&config.node);
        if std::env::var_os("NODE_PATH").is_none() {
            // The script lives under the output dir; resolve modules from the working dir
            command.env("NODE_PATH", std::env::current_dir()?.join("node_modules"));
        }
        let mut child = command
            .arg(&script_path)
            .arg(serde_json::to_string(&launch)?)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::from(log))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| QaError::Bridge(format!("failed to start {}: {}", config.node, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| QaError::Bridge("bridge stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| QaError::Bridge("bridge stdout unavailable".into()))?;

        let session = Self {
            io: Mutex::new(BridgeIo {
                stdin,
                stdout: BufReader::new(stdout).lines(),
                next_id: 0,
            }),
            _child: child,
            artifacts_dir: artifacts_dir.to_path_buf(),
            screenshot: config.screenshot,
            trace: config.trace,
            video: config.video,
        };

        match tokio::time::timeout(LAUNCH_TIMEOUT, session.wait_ready()).await {
            Ok(Ok(_)) => {
                info!("Launched {} for {}", browser.as_str(), config.base_url);
                Ok(session)
            }
            Ok(Err(e)) => Err(QaError::Bridge(format!("browser launch failed: {}", e))),
            Err(_) => Err(QaError::timeout("browser launch", LAUNCH_TIMEOUT)),
        }
    }

    async fn wait_ready(&self) -> QaResult<Value> {
        let mut io = self.io.lock().await;
        read_reply(&mut io, 0, "launch").await
    }

    /// Send one command and wait for its reply
    async fn call(&self, op: &str, args: Value) -> QaResult<Value> {
        let mut io = self.io.lock().await;
        io.next_id += 1;
        let id = io.next_id;

        let mut request = match args {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        request.insert("id".into(), json!(id));
        request.insert("op".into(), json!(op));
        let line = serde_json::to_string(&request)?;

        debug!("bridge <- {}", line);
        io.stdin.write_all(line.as_bytes()).await?;
        io.stdin.write_all(b"\n").await?;
        io.stdin.flush().await?;

        read_reply(&mut io, id, op).await
    }
}

async fn read_reply(io: &mut BridgeIo, id: u64, op: &str) -> QaResult<Value> {
    loop {
        let Some(line) = io.stdout.next_line().await? else {
            return Err(QaError::Bridge(format!("bridge exited during {}", op)));
        };
        let reply: BridgeReply = match serde_json::from_str(&line) {
            Ok(reply) => reply,
            Err(_) => {
                debug!("bridge: {}", line);
                continue;
            }
        };
        if reply.id != Some(id) {
            continue;
        }
        return if reply.ok {
            Ok(reply.value)
        } else {
            Err(QaError::Browser {
                action: op.to_string(),
                reason: reply.error.unwrap_or_else(|| "unknown error".into()),
            })
        };
    }
}

fn timeout_ms(options: &ActionOptions) -> Value {
    options
        .timeout
        .map(|t| json!(t.as_millis() as u64))
        .unwrap_or(Value::Null)
}

fn wait_until(options: &ActionOptions) -> Value {
    options
        .wait_for
        .map(|s| json!(s.as_str()))
        .unwrap_or(Value::Null)
}

#[async_trait]
impl Page for PlaywrightSession {
    async fn goto(&self, url: &str, wait_until: LoadState) -> QaResult<()> {
        self.call("goto", json!({ "url": url, "waitUntil": wait_until.as_str() }))
            .await
            .map(|_| ())
            .map_err(|e| match e {
                QaError::Browser { reason, .. } => QaError::Navigation {
                    url: url.to_string(),
                    reason,
                },
                other => other,
            })
    }

    async fn count(&self, selector: &str) -> QaResult<usize> {
        let value = self.call("count", json!({ "selector": selector })).await?;
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| QaError::Bridge(format!("count returned {}", value)))
    }

    async fn is_visible(&self, selector: &str) -> QaResult<bool> {
        let value = self.call("is_visible", json!({ "selector": selector })).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn click(&self, selector: &str, options: ActionOptions) -> QaResult<()> {
        self.call(
            "click",
            json!({
                "selector": selector,
                "timeout": timeout_ms(&options),
                "waitUntil": wait_until(&options),
            }),
        )
        .await
        .map(|_| ())
    }

    async fn fill(&self, selector: &str, value: &str) -> QaResult<()> {
        self.call("fill", json!({ "selector": selector, "value": value }))
            .await
            .map(|_| ())
    }

    async fn type_text(&self, selector: &str, text: &str) -> QaResult<()> {
        self.call("type", json!({ "selector": selector, "text": text }))
            .await
            .map(|_| ())
    }

    async fn press(&self, selector: &str, key: &str, options: ActionOptions) -> QaResult<()> {
        self.call(
            "press",
            json!({
                "selector": selector,
                "key": key,
                "timeout": timeout_ms(&options),
                "waitUntil": wait_until(&options),
            }),
        )
        .await
        .map(|_| ())
    }

    async fn url(&self) -> QaResult<String> {
        let value = self.call("url", json!({})).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| QaError::Bridge(format!("url returned {}", value)))
    }

    async fn text_visible(&self, pattern: &str) -> QaResult<bool> {
        let value = self.call("text_visible", json!({ "pattern": pattern })).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn close(&self, failed: bool) -> QaResult<Vec<PathBuf>> {
        let screenshot = self
            .screenshot
            .keeps(failed)
            .then(|| self.artifacts_dir.join("screenshot.png"));
        let trace = self
            .trace
            .records()
            .then(|| self.artifacts_dir.join("trace.zip"));

        let value = self
            .call("close", json!({ "screenshot": screenshot, "trace": trace }))
            .await?;
        let files: Vec<PathBuf> = serde_json::from_value(value)?;

        let mut kept = Vec::with_capacity(files.len());
        for file in files {
            let keep = if Some(&file) == trace.as_ref() {
                self.trace.keeps(failed)
            } else if Some(&file) == screenshot.as_ref() {
                true
            } else {
                self.video.keeps(failed)
            };
            if keep {
                kept.push(file);
            } else if let Err(e) = std::fs::remove_file(&file) {
                warn!("Failed to remove {}: {}", file.display(), e);
            }
        }
        Ok(kept)
    }
}
