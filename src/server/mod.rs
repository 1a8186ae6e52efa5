//! Development server with live reload

use anyhow::Result;
use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::{header, Request, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::commands::build;
use crate::Site;

const LIVE_RELOAD_PATH: &str = "/__livereload";

/// Live reload client, inserted before `</body>`
const LIVE_RELOAD_SCRIPT: &str = r#"<script>
(function() {
    var ws = new WebSocket('ws://' + location.host + '/__livereload');
    ws.onmessage = function(msg) {
        if (msg.data === 'reload') {
            location.reload();
        }
    };
    ws.onclose = function() {
        setTimeout(function() { location.reload(); }, 1000);
    };
})();
</script>
"#;

struct ServerState {
    output_dir: PathBuf,
    path_prefix: String,
    reload_tx: broadcast::Sender<()>,
    live_reload: bool,
}

/// Serve the output directory, rebuilding and reloading browsers on change
pub async fn start(site: &Site, ip: &str, port: u16, watch: bool, open: bool) -> Result<()> {
    let (reload_tx, _) = broadcast::channel::<()>(16);

    let state = Arc::new(ServerState {
        output_dir: site.output_dir.clone(),
        path_prefix: site.config.path_prefix.clone(),
        reload_tx: reload_tx.clone(),
        live_reload: watch,
    });

    let app = Router::new()
        .route(LIVE_RELOAD_PATH, get(livereload_handler))
        .fallback(fallback_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    let url = format!("http://{}:{}{}", ip, port, site.config.path_prefix);
    println!("Server running at {}", url);
    if watch {
        println!("Live reload enabled. Watching for changes...");
    }
    println!("Press Ctrl+C to stop.");

    if open {
        if let Err(e) = open_browser(&url) {
            tracing::warn!("Failed to open browser: {}", e);
        }
    }

    if watch {
        let site = site.clone();
        tokio::task::spawn_blocking(move || {
            let result = build::watch_with(&site, |_| {
                // No subscribers just means no browser is open
                let _ = reload_tx.send(());
            });
            if let Err(e) = result {
                tracing::error!("File watcher error: {:#}", e);
            }
        });
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn livereload_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    let reload_rx = state.reload_tx.subscribe();
    ws.on_upgrade(move |socket| serve_reload_socket(socket, reload_rx))
}

/// Push `reload` to one browser tab until either side goes away
async fn serve_reload_socket(mut socket: WebSocket, mut reload_rx: broadcast::Receiver<()>) {
    tracing::debug!("Reload client connected");

    loop {
        let keep_open = tokio::select! {
            signal = reload_rx.recv() => match signal {
                Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => socket
                    .send(Message::Text("reload".to_string()))
                    .await
                    .is_ok(),
                Err(broadcast::error::RecvError::Closed) => false,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Ping(payload))) => socket.send(Message::Pong(payload)).await.is_ok(),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => false,
                Some(Ok(_)) => true,
            },
        };
        if !keep_open {
            break;
        }
    }

    tracing::debug!("Reload client disconnected");
}

async fn fallback_handler(
    State(state): State<Arc<ServerState>>,
    mut request: Request<Body>,
) -> Response {
    let path = request.uri().path().to_string();

    // The site is deployed under the prefix, so it is served there too
    let Some(site_path) = strip_prefix(&state.path_prefix, &path) else {
        if path == "/" {
            return (
                StatusCode::TEMPORARY_REDIRECT,
                [(header::LOCATION, state.path_prefix.clone())],
            )
                .into_response();
        }
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    };

    let file_path = resolve_file(&state.output_dir, &site_path);
    let is_html = file_path
        .extension()
        .map(|ext| ext == "html" || ext == "htm")
        .unwrap_or(false);

    if is_html && state.live_reload {
        return match tokio::fs::read_to_string(&file_path).await {
            Ok(content) => Html(inject_live_reload(&content)).into_response(),
            Err(_) => (StatusCode::NOT_FOUND, "Not found").into_response(),
        };
    }

    let rewritten = match request.uri().query() {
        Some(query) => format!("{}?{}", site_path, query),
        None => site_path.clone(),
    };
    match rewritten.parse::<Uri>() {
        Ok(uri) => *request.uri_mut() = uri,
        Err(_) => return (StatusCode::BAD_REQUEST, "Bad request").into_response(),
    }

    let mut service = ServeDir::new(&state.output_dir).append_index_html_on_directories(true);
    match service.try_call(request).await {
        Ok(response) => response.into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
    }
}

/// Request path relative to the site root, or `None` outside the prefix
fn strip_prefix(prefix: &str, path: &str) -> Option<String> {
    if prefix == "/" {
        return Some(path.to_string());
    }
    if path == prefix.trim_end_matches('/') {
        return Some("/".to_string());
    }
    path.strip_prefix(prefix.trim_end_matches('/'))
        .filter(|rest| rest.starts_with('/'))
        .map(str::to_string)
}

/// File in the output tree that answers a site path
fn resolve_file(output_dir: &Path, site_path: &str) -> PathBuf {
    // Only plain names, so `..` cannot climb out of the output tree
    let relative: PathBuf = Path::new(site_path)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect();
    if relative.as_os_str().is_empty() {
        return output_dir.join("index.html");
    }

    let candidate = output_dir.join(&relative);
    if candidate.is_dir() {
        return candidate.join("index.html");
    }
    if candidate.exists() {
        return candidate;
    }
    let mut html_name = relative.into_os_string();
    html_name.push(".html");
    let with_html = output_dir.join(html_name);
    if with_html.exists() {
        with_html
    } else {
        candidate
    }
}

fn inject_live_reload(html: &str) -> String {
    match html.rfind("</body>") {
        Some(pos) => format!("{}{}{}", &html[..pos], LIVE_RELOAD_SCRIPT, &html[pos..]),
        None => format!("{}{}", html, LIVE_RELOAD_SCRIPT),
    }
}

fn open_browser(url: &str) -> Result<()> {
    let (program, args): (&str, Vec<&str>) = if cfg!(target_os = "macos") {
        ("open", vec![url])
    } else if cfg!(target_os = "windows") {
        ("cmd", vec!["/c", "start", url])
    } else {
        ("xdg-open", vec![url])
    };
    std::process::Command::new(program).args(args).spawn()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_strip_prefix() {
        assert_eq!(strip_prefix("/", "/posts/a/").as_deref(), Some("/posts/a/"));
        assert_eq!(strip_prefix("/blog/", "/blog/posts/a/").as_deref(), Some("/posts/a/"));
        assert_eq!(strip_prefix("/blog/", "/blog").as_deref(), Some("/"));
        assert_eq!(strip_prefix("/blog/", "/blogroll/"), None);
        assert_eq!(strip_prefix("/blog/", "/"), None);
    }

    #[test]
    fn test_resolve_file() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("posts/hello")).unwrap();
        fs::write(dir.path().join("posts/hello/index.html"), "").unwrap();
        fs::write(dir.path().join("about.html"), "").unwrap();

        assert_eq!(resolve_file(dir.path(), "/"), dir.path().join("index.html"));
        assert_eq!(
            resolve_file(dir.path(), "/posts/hello/"),
            dir.path().join("posts/hello/index.html")
        );
        assert_eq!(resolve_file(dir.path(), "/about"), dir.path().join("about.html"));
        assert_eq!(
            resolve_file(dir.path(), "/feed.xml"),
            dir.path().join("feed.xml")
        );
    }

    #[test]
    fn test_resolve_file_stays_in_output() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("_site");
        fs::create_dir_all(&output).unwrap();
        fs::write(dir.path().join("secret.html"), "private").unwrap();

        assert_eq!(
            resolve_file(&output, "/../secret.html"),
            output.join("secret.html")
        );
        assert_eq!(
            resolve_file(&output, "/posts/../../secret"),
            output.join("posts/secret")
        );
    }

    #[test]
    fn test_inject_live_reload() {
        let html = inject_live_reload("<html><body><p>hi</p></body></html>");
        assert!(html.contains("/__livereload"));
        assert!(html.ends_with("</body></html>"));

        let fragment = inject_live_reload("<p>hi</p>");
        assert!(fragment.starts_with("<p>hi</p><script>"));
    }
}
