// ABOUTME: Reload signalling for the markdownreveal application
// ABOUTME: Tells open browser tabs that the slides changed, by marker file or HTTP push

use crate::config::ReloadMode;
use crate::errors::{RevealError, Result};
use log::debug;
use reqwest::blocking::Client;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Marker file appended to in poll mode, relative to the output root
pub const RELOAD_MARKER: &str = ".reload";
/// Endpoint receiving reload requests in push mode
pub const RELOAD_ENDPOINT: &str = "/__reload";
/// WebSocket endpoint browsers subscribe to in push mode
pub const LIVERELOAD_SOCKET: &str = "/__livereload";

const POLL_CLIENT: &str = r#"<script>
(function () {
  var last = null;
  function check() {
    fetch('/.reload', { cache: 'no-store' })
      .then(function (response) { return response.ok ? response.text() : ''; })
      .then(function (marker) {
        if (last !== null && marker.length !== last) { window.location.reload(); }
        last = marker.length;
      })
      .catch(function () {})
      .then(function () { setTimeout(check, 500); });
  }
  check();
})();
</script>"#;

const PUSH_CLIENT: &str = r#"<script>
(function () {
  var protocol = window.location.protocol === 'https:' ? 'wss:' : 'ws:';
  function connect() {
    var socket = new WebSocket(protocol + '//' + window.location.host + '/__livereload');
    socket.onmessage = function (event) {
      if (event.data === 'reload') { window.location.reload(); }
    };
    socket.onclose = function () { setTimeout(connect, 1000); };
  }
  connect();
})();
</script>"#;

/// Emits the no-payload "something changed" signal
pub trait Notifier: Send + Sync {
    fn notify(&self, output_root: &Path) -> Result<()>;
}

/// Poll mode: append a line to the marker file in the output root
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkerFileNotifier;

impl MarkerFileNotifier {
    /// Create an empty marker if none exists, so browsers polling a fresh
    /// output root start from a known length
    pub fn prepare(output_root: &Path) -> Result<()> {
        let marker = output_root.join(RELOAD_MARKER);
        OpenOptions::new().create(true).append(true).open(&marker)?;
        Ok(())
    }
}

impl Notifier for MarkerFileNotifier {
    fn notify(&self, output_root: &Path) -> Result<()> {
        let marker = output_root.join(RELOAD_MARKER);
        let mut file = OpenOptions::new().create(true).append(true).open(&marker)?;
        file.write_all(b"x\n")?;
        debug!("Touched reload marker {:?}", marker);
        Ok(())
    }
}

/// Push mode: POST to the live server's reload endpoint
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: Client,
    endpoint: Url,
}

impl HttpNotifier {
    /// Notifier for the live server listening on `host:port`
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let host = match host {
            "0.0.0.0" | "" => "127.0.0.1",
            "::" => "[::1]",
            other => other,
        };
        let base = Url::parse(&format!("http://{}:{}/", host, port))
            .map_err(|e| RevealError::ValidationError(format!("Invalid server address: {}", e)))?;
        let endpoint = base
            .join(RELOAD_ENDPOINT)
            .map_err(|e| RevealError::ValidationError(format!("Invalid reload endpoint: {}", e)))?;
        let client = Client::builder().timeout(Duration::from_secs(5)).build()?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl Notifier for HttpNotifier {
    fn notify(&self, _output_root: &Path) -> Result<()> {
        let response = self.client.post(self.endpoint.clone()).send()?;
        if !response.status().is_success() {
            return Err(RevealError::ServerError(format!(
                "Reload endpoint answered {}",
                response.status()
            )));
        }
        debug!("Sent reload request to {}", self.endpoint);
        Ok(())
    }
}

/// The notifier for a reload mode and live server address
pub fn notifier_for(mode: ReloadMode, host: &str, port: u16) -> Result<Arc<dyn Notifier>> {
    Ok(match mode {
        ReloadMode::Poll => Arc::new(MarkerFileNotifier),
        ReloadMode::Push => Arc::new(HttpNotifier::new(host, port)?),
    })
}

/// The browser-side script listening for reload signals
pub fn client_script(mode: ReloadMode) -> &'static str {
    match mode {
        ReloadMode::Poll => POLL_CLIENT,
        ReloadMode::Push => PUSH_CLIENT,
    }
}

/// Add the reload client to an HTML page, before `</body>` when present
pub fn inject_client(html: &str, mode: ReloadMode) -> String {
    let script = client_script(mode);
    match html.rfind("</body>") {
        Some(index) => {
            let mut injected = String::with_capacity(html.len() + script.len() + 1);
            injected.push_str(&html[..index]);
            injected.push_str(script);
            injected.push('\n');
            injected.push_str(&html[index..]);
            injected
        }
        None => format!("{}\n{}", html, script),
    }
}
