//! Playwright browser automation
//!
//! Each [`PageSession`] owns a Node process running a small Playwright
//! driver. The process launches its own browser and context, so sessions
//! share nothing. Requests and replies are single JSON lines on the
//! driver's stdin/stdout.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tracing::{debug, warn};

use crate::artifacts::absolute;
use crate::config::PlaywrightConfig;
use crate::error::{E2eError, E2eResult};
use crate::scenario::TranslatorPage;

/// Placeholder of the Singlish text box
pub const INPUT_PLACEHOLDER: &str = "Input Your Singlish Text Here.";

/// Exact text of the label whose next sibling holds the translation
pub const OUTPUT_LABEL: &str = "Sinhala";

/// Slack on top of the in-browser timeout before the driver is considered hung
const REPLY_GRACE: Duration = Duration::from_secs(5);

const EXIT_GRACE: Duration = Duration::from_secs(10);

/// A request understood by the driver script
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DriverRequest {
    Goto { url: String, timeout_ms: u64 },
    Fill { placeholder: String, text: String, timeout_ms: u64 },
    OutputText { label: String, timeout_ms: u64 },
    Screenshot { path: PathBuf, full_page: bool },
    Close,
}

impl DriverRequest {
    fn op(&self) -> &'static str {
        match self {
            DriverRequest::Goto { .. } => "goto",
            DriverRequest::Fill { .. } => "fill",
            DriverRequest::OutputText { .. } => "output_text",
            DriverRequest::Screenshot { .. } => "screenshot",
            DriverRequest::Close => "close",
        }
    }
}

/// One reply line from the driver
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DriverReply {
    pub ok: bool,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    /// Set when Playwright raised a TimeoutError
    #[serde(default)]
    pub timeout: bool,
}

impl DriverReply {
    pub fn into_result(self, op: &str) -> E2eResult<Option<String>> {
        if self.ok {
            return Ok(self.text);
        }
        let message = format!("{}: {}", op, self.error.unwrap_or_else(|| "unknown error".to_string()));
        if self.timeout {
            Err(E2eError::Timeout(message))
        } else {
            Err(E2eError::Playwright(message))
        }
    }
}

/// Check if Playwright is installed
pub fn check_playwright_installed() -> E2eResult<()> {
    let output = Command::new("npx")
        .args(["playwright", "--version"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match output {
        Ok(status) if status.success() => Ok(()),
        _ => Err(E2eError::PlaywrightNotFound),
    }
}

/// Build the Node driver for the configured browser
pub fn build_driver_script(config: &PlaywrightConfig) -> String {
    format!(
        r#"
const {{ chromium, firefox, webkit }} = require('playwright');
const readline = require('readline');

const reply = (message) => process.stdout.write(JSON.stringify(message) + '\n');

(async () => {{
  const browser = await {browser}.launch({{ headless: {headless} }});
  const context = await browser.newContext({{
    viewport: {{ width: {width}, height: {height} }}
  }});
  const page = await context.newPage();
  reply({{ ok: true, ready: true }});

  const lines = readline.createInterface({{ input: process.stdin }});
  try {{
    for await (const line of lines) {{
      if (!line.trim()) continue;
      const request = JSON.parse(line);
      if (request.op === 'close') {{
        reply({{ ok: true }});
        break;
      }}
      try {{
        switch (request.op) {{
          case 'goto':
            await page.goto(request.url, {{ waitUntil: 'domcontentloaded', timeout: request.timeout_ms }});
            reply({{ ok: true }});
            break;
          case 'fill':
            await page.getByPlaceholder(request.placeholder).fill(request.text, {{ timeout: request.timeout_ms }});
            reply({{ ok: true }});
            break;
          case 'output_text': {{
            const output = page
              .getByText(request.label, {{ exact: true }})
              .locator('xpath=following-sibling::*[1]');
            const text = await output.textContent({{ timeout: request.timeout_ms }});
            reply({{ ok: true, text: text ?? '' }});
            break;
          }}
          case 'screenshot':
            await page.screenshot({{ path: request.path, fullPage: request.full_page }});
            reply({{ ok: true }});
            break;
          default:
            reply({{ ok: false, error: `unknown op: ${{request.op}}` }});
        }}
      }} catch (error) {{
        reply({{ ok: false, timeout: error.name === 'TimeoutError', error: error.message }});
      }}
    }}
  }} finally {{
    await context.close();
    await browser.close();
  }}
}})().catch((error) => {{
  process.stderr.write(error.stack + '\n');
  process.exit(1);
}});
"#,
        browser = config.browser.as_str(),
        headless = config.headless,
        width = config.viewport_width,
        height = config.viewport_height,
    )
}

/// A fresh browser context bound to one scenario.
///
/// Call [`PageSession::close`] on the normal path; dropping an unclosed
/// session kills the driver and removes its script directory.
pub struct PageSession {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
    root_url: String,
    action_timeout_ms: u64,
    closed: bool,
    _script_dir: TempDir,
}

impl PageSession {
    /// Launch the driver and wait for its browser to come up
    pub async fn open(config: &PlaywrightConfig, root_url: impl Into<String>) -> E2eResult<Self> {
        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("driver.js");
        std::fs::write(&script_path, build_driver_script(config))?;

        let mut child = TokioCommand::new(&config.node_binary)
            .arg(&script_path)
            .env("NODE_PATH", absolute(&config.node_modules))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                E2eError::Playwright(format!(
                    "Failed to spawn {}: {}",
                    config.node_binary.display(),
                    e
                ))
            })?;

        let stdin = child.stdin.take().ok_or(E2eError::DriverExited)?;
        let stdout = child.stdout.take().ok_or(E2eError::DriverExited)?;

        let mut session = Self {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout).lines(),
            root_url: root_url.into(),
            action_timeout_ms: config.action_timeout_ms,
            closed: false,
            _script_dir: script_dir,
        };

        let budget = session.reply_budget();
        session.read_reply(budget).await?.into_result("launch")?;
        debug!(browser = config.browser.as_str(), "Browser session ready");

        Ok(session)
    }

    fn reply_budget(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms) + REPLY_GRACE
    }

    /// Send one request and wait for its reply
    pub async fn request(&mut self, request: DriverRequest) -> E2eResult<Option<String>> {
        let op = request.op();
        let mut line = serde_json::to_string(&request)?;
        line.push('\n');
        debug!(op, "Driver request");

        let stdin = self.stdin.as_mut().ok_or(E2eError::DriverExited)?;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|_| E2eError::DriverExited)?;
        stdin.flush().await.map_err(|_| E2eError::DriverExited)?;

        let budget = self.reply_budget();
        self.read_reply(budget).await?.into_result(op)
    }

    async fn read_reply(&mut self, budget: Duration) -> E2eResult<DriverReply> {
        match tokio::time::timeout(budget, next_reply(&mut self.stdout)).await {
            Ok(reply) => reply,
            Err(_) => Err(E2eError::Timeout(format!(
                "driver reply within {} ms",
                budget.as_millis()
            ))),
        }
    }

    /// Close the context and browser, then wait for the driver to exit
    pub async fn close(mut self) -> E2eResult<()> {
        self.request(DriverRequest::Close).await?;
        self.stdin.take();

        match tokio::time::timeout(EXIT_GRACE, self.child.wait()).await {
            Ok(status) => {
                let status = status?;
                if !status.success() {
                    warn!("Driver exited with {}", status);
                }
            }
            Err(_) => {
                warn!("Driver did not exit after close, killing it");
                self.child.start_kill()?;
            }
        }

        self.closed = true;
        Ok(())
    }
}

impl Drop for PageSession {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.child.start_kill();
        }
    }
}

#[async_trait]
impl TranslatorPage for PageSession {
    async fn open_root(&mut self) -> E2eResult<()> {
        let url = self.root_url.clone();
        let timeout_ms = self.action_timeout_ms;
        self.request(DriverRequest::Goto { url, timeout_ms }).await?;
        Ok(())
    }

    async fn fill_input(&mut self, text: &str) -> E2eResult<()> {
        let request = DriverRequest::Fill {
            placeholder: INPUT_PLACEHOLDER.to_string(),
            text: text.to_string(),
            timeout_ms: self.action_timeout_ms,
        };
        self.request(request).await?;
        Ok(())
    }

    async fn output_text(&mut self, timeout: Duration) -> E2eResult<String> {
        let request = DriverRequest::OutputText {
            label: OUTPUT_LABEL.to_string(),
            timeout_ms: in_browser_timeout(timeout, self.action_timeout_ms),
        };
        Ok(self.request(request).await?.unwrap_or_default())
    }

    async fn screenshot(&mut self, path: &Path) -> E2eResult<()> {
        let request = DriverRequest::Screenshot {
            path: absolute(path),
            full_page: false,
        };
        self.request(request).await?;
        Ok(())
    }
}

/// Milliseconds for a Playwright `timeout` option, capped at the action timeout.
///
/// Playwright reads 0 as "no timeout", so the result is never below 1.
fn in_browser_timeout(limit: Duration, action_timeout_ms: u64) -> u64 {
    (limit.as_millis() as u64).min(action_timeout_ms).max(1)
}

/// Next line that parses as a reply; anything else the driver prints is logged
async fn next_reply(stdout: &mut Lines<BufReader<ChildStdout>>) -> E2eResult<DriverReply> {
    while let Some(line) = stdout.next_line().await? {
        match serde_json::from_str::<DriverReply>(&line) {
            Ok(reply) => return Ok(reply),
            Err(_) => debug!("driver: {}", line),
        }
    }
    Err(E2eError::DriverExited)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Browser;

    #[test]
    fn test_driver_script_uses_config() {
        let config = PlaywrightConfig {
            browser: Browser::Firefox,
            headless: false,
            viewport_width: 1920,
            viewport_height: 1080,
            ..Default::default()
        };
        let script = build_driver_script(&config);
        assert!(script.contains("await firefox.launch({ headless: false })"));
        assert!(script.contains("viewport: { width: 1920, height: 1080 }"));
        assert!(script.contains("waitUntil: 'domcontentloaded'"));
        assert!(script.contains("xpath=following-sibling::*[1]"));
    }

    #[test]
    fn test_request_wire_format() {
        let json = serde_json::to_value(DriverRequest::OutputText {
            label: OUTPUT_LABEL.to_string(),
            timeout_ms: 500,
        })
        .unwrap();
        assert_eq!(json["op"], "output_text");
        assert_eq!(json["label"], "Sinhala");
        assert_eq!(json["timeout_ms"], 500);

        let json = serde_json::to_value(DriverRequest::Close).unwrap();
        assert_eq!(json, serde_json::json!({ "op": "close" }));
    }

    #[test]
    fn test_op_names_match_wire_tag() {
        let requests = [
            DriverRequest::Goto { url: "http://localhost/".into(), timeout_ms: 1 },
            DriverRequest::Fill { placeholder: INPUT_PLACEHOLDER.into(), text: "mama".into(), timeout_ms: 1 },
            DriverRequest::OutputText { label: OUTPUT_LABEL.into(), timeout_ms: 1 },
            DriverRequest::Screenshot { path: PathBuf::from("shot.png"), full_page: false },
            DriverRequest::Close,
        ];

        for request in requests {
            let json = serde_json::to_value(&request).unwrap();
            assert_eq!(json["op"], request.op(), "{:?}", request);
        }
    }

    #[test]
    fn test_in_browser_timeout_is_capped() {
        assert_eq!(in_browser_timeout(Duration::from_secs(15), 30_000), 15_000);
        assert_eq!(in_browser_timeout(Duration::from_secs(60), 30_000), 30_000);
        assert_eq!(in_browser_timeout(Duration::ZERO, 30_000), 1);
    }

    #[test]
    fn test_reply_classification() {
        let ok: DriverReply = serde_json::from_str(r#"{"ok":true,"text":"මම"}"#).unwrap();
        assert_eq!(ok.into_result("output_text").unwrap().as_deref(), Some("මම"));

        let timeout: DriverReply =
            serde_json::from_str(r#"{"ok":false,"timeout":true,"error":"Timeout 500ms exceeded."}"#).unwrap();
        assert!(matches!(timeout.into_result("fill"), Err(E2eError::Timeout(m)) if m.starts_with("fill:")));

        let broken: DriverReply = serde_json::from_str(r#"{"ok":false,"error":"boom"}"#).unwrap();
        assert!(matches!(broken.into_result("goto"), Err(E2eError::Playwright(_))));
    }

    /// Stand-in driver speaking the same line protocol
    #[cfg(unix)]
    fn fake_driver(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-node.sh");
        std::fs::write(
            &path,
            r#"#!/bin/sh
echo "launching browser"
echo '{"ok":true,"ready":true}'
while read -r line; do
  case "$line" in
    *'"op":"output_text"'*) echo '{"ok":true,"text":"මම ගෙදර යනවා"}' ;;
    *'"op":"fill"'*) echo '{"ok":false,"timeout":true,"error":"locator not found"}' ;;
    *'"op":"close"'*) echo '{"ok":true}'; exit 0 ;;
    *) echo '{"ok":true}' ;;
  esac
done
"#,
        )
        .unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_session_round_trip_with_fake_driver() {
        let dir = tempfile::tempdir().unwrap();
        let config = PlaywrightConfig {
            node_binary: fake_driver(dir.path()),
            action_timeout_ms: 2_000,
            ..Default::default()
        };

        let mut session = PageSession::open(&config, "http://127.0.0.1:1/").await.unwrap();
        session.open_root().await.unwrap();
        let text = session.output_text(Duration::from_secs(1)).await.unwrap();
        assert_eq!(text, "මම ගෙදර යනවා");
        assert!(matches!(session.fill_input("mama").await, Err(E2eError::Timeout(_))));
        session.close().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_session_reports_driver_exit() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dead-node.sh");
        std::fs::write(&path, "#!/bin/sh\nexit 1\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

        let config = PlaywrightConfig {
            node_binary: path,
            ..Default::default()
        };
        let err = PageSession::open(&config, "http://127.0.0.1:1/").await.err().unwrap();
        assert!(matches!(err, E2eError::DriverExited));
    }
}
