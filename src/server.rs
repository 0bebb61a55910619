// ABOUTME: Live HTTP server for the markdownreveal application
// ABOUTME: Serves the output directory and pushes reload messages to connected browsers

use crate::config::ReloadMode;
use crate::errors::{RevealError, Result};
use crate::pipeline::INDEX_FILE;
use crate::reload::{self, LIVERELOAD_SOCKET, RELOAD_ENDPOINT};
use log::{debug, error, info};
use parking_lot::Mutex;
use percent_encoding::percent_decode_str;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
use tungstenite::handshake::derive_accept_key;
use tungstenite::protocol::Role;
use tungstenite::{Message, WebSocket};
use url::Url;

/// Fan-out of reload signals to every connected browser
#[derive(Default)]
pub struct ReloadHub {
    subscribers: Mutex<Vec<mpsc::Sender<()>>>,
}

impl ReloadHub {
    pub fn subscribe(&self) -> mpsc::Receiver<()> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Signal every live subscriber; returns how many were reached
    pub fn broadcast(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(()).is_ok());
        subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

/// Content type by file extension
pub fn content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css",
        "js" | "mjs" => "application/javascript",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "md" | "txt" | "reload" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// Map a request path to a file under `root`; `None` for paths escaping it
pub fn resolve_request_path(root: &Path, url_path: &str) -> Option<PathBuf> {
    let base = Url::parse("http://localhost/").ok()?;
    let url = base.join(url_path).ok()?;

    let mut path = root.to_path_buf();
    for segment in url.path_segments()? {
        if segment.is_empty() {
            continue;
        }
        let segment = percent_decode_str(segment).decode_utf8().ok()?;
        if segment == ".." || segment.contains('/') || segment.contains('\\') {
            return None;
        }
        path.push(&*segment);
    }

    if path.is_dir() {
        path.push(INDEX_FILE);
    }
    Some(path)
}

/// Serves the output root on the main thread
pub struct LiveServer {
    server: Server,
    root: PathBuf,
    mode: ReloadMode,
    hub: Arc<ReloadHub>,
}

impl LiveServer {
    /// Bind the listening socket; requests queue until [`LiveServer::run`]
    pub fn bind(host: &str, port: u16, root: PathBuf, mode: ReloadMode) -> Result<Self> {
        let address = if host.contains(':') {
            format!("[{}]:{}", host, port)
        } else {
            format!("{}:{}", host, port)
        };
        let server = Server::http(&address).map_err(|e| {
            RevealError::ServerError(format!("Failed to start HTTP server on {}: {}", address, e))
        })?;
        Ok(Self {
            server,
            root,
            mode,
            hub: Arc::new(ReloadHub::default()),
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    pub fn hub(&self) -> Arc<ReloadHub> {
        Arc::clone(&self.hub)
    }

    /// Serve requests until the process exits
    pub fn run(self) {
        if let Some(addr) = self.local_addr() {
            info!("HTTP server listening on http://{}", addr);
        }
        for request in self.server.incoming_requests() {
            self.handle(request);
        }
    }

    fn handle(&self, request: Request) {
        let path = request
            .url()
            .split('?')
            .next()
            .unwrap_or("/")
            .to_string();
        let method = request.method().clone();
        debug!("{} {}", method, path);

        match (&method, path.as_str()) {
            (Method::Post, RELOAD_ENDPOINT) => {
                let reached = self.hub.broadcast();
                debug!("Reload pushed to {} browser(s)", reached);
                respond(request, Response::empty(StatusCode(204)));
            }
            (Method::Get, LIVERELOAD_SOCKET) => self.upgrade(request),
            (Method::Get, _) | (Method::Head, _) => self.serve_file(request, &path),
            _ => respond(
                request,
                Response::from_string("405 Method Not Allowed").with_status_code(StatusCode(405)),
            ),
        }
    }

    fn serve_file(&self, request: Request, url_path: &str) {
        let file_path = match resolve_request_path(&self.root, url_path) {
            Some(path) if path.is_file() => path,
            _ => {
                respond(
                    request,
                    Response::from_string("404 Not Found").with_status_code(StatusCode(404)),
                );
                return;
            }
        };

        let content = match fs::read(&file_path) {
            Ok(content) => content,
            Err(e) => {
                error!("Failed to read file {:?}: {}", file_path, e);
                respond(
                    request,
                    Response::from_string(format!("Failed to read file: {}", e))
                        .with_status_code(StatusCode(500)),
                );
                return;
            }
        };

        let content_type = content_type(&file_path);
        let body = if content_type.starts_with("text/html") {
            reload::inject_client(&String::from_utf8_lossy(&content), self.mode).into_bytes()
        } else {
            content
        };

        let mut response = Response::from_data(body);
        for (field, value) in [("Content-Type", content_type), ("Cache-Control", "no-store")] {
            match Header::from_bytes(field, value) {
                Ok(header) => response.add_header(header),
                Err(()) => error!("Invalid header {}: {}", field, value),
            }
        }
        respond(request, response);
    }

    fn upgrade(&self, request: Request) {
        let key = request
            .headers()
            .iter()
            .find(|header| header.field.equiv("Sec-WebSocket-Key"))
            .map(|header| header.value.as_str().to_string());
        let Some(key) = key else {
            respond(
                request,
                Response::from_string("Expected a WebSocket upgrade")
                    .with_status_code(StatusCode(400)),
            );
            return;
        };

        let accept = derive_accept_key(key.as_bytes());
        let header = match Header::from_bytes("Sec-WebSocket-Accept", accept.as_bytes()) {
            Ok(header) => header,
            Err(()) => {
                error!("Invalid WebSocket accept key {:?}", accept);
                return;
            }
        };
        let response = Response::empty(StatusCode(101)).with_header(header);
        let stream = request.upgrade("websocket", response);

        // Subscribe before returning so a reload sent right after the
        // handshake already reaches this browser
        let reloads = self.hub.subscribe();
        debug!("Browser connected ({} listening)", self.hub.subscriber_count());

        thread::spawn(move || {
            let mut socket = WebSocket::from_raw_socket(stream, Role::Server, None);
            while reloads.recv().is_ok() {
                if let Err(e) = socket.send(Message::text("reload")) {
                    debug!("Browser disconnected: {}", e);
                    return;
                }
            }
            let _ = socket.close(None);
        });
    }
}

fn respond<R: std::io::Read>(request: Request, response: Response<R>) {
    if let Err(e) = request.respond(response) {
        error!("Failed to send response: {}", e);
    }
}
