/// Integration tests for command handlers against a mock backend.
///
/// # Safety
///
/// Handlers read their backend URL from the environment, and
/// `std::env::set_var` is `unsafe` in Rust 2024 edition. Everything runs in
/// a single `#[test]` so nothing else in this binary reads the variables
/// concurrently.
use std::io::Read;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tiny_http::{Response, Server};

use railroad::cli::{self, GraphSelection};
use railroad::client::FilterQuery;

const META_RESPONSE: &str = r#"[
    {"host": "web1", "service": "cpu", "start": 0, "end": 100, "state": 2},
    {"host": "web2", "service": "cpu", "start": 0, "end": 100}
]"#;

/// Helper: set an env var (wraps the `unsafe` call).
///
/// # Safety
/// Must only be called from single-threaded test contexts.
unsafe fn set_env(key: &str, val: &str) {
    unsafe { std::env::set_var(key, val) }
}

/// Helper: remove an env var (wraps the `unsafe` call).
///
/// # Safety
/// Must only be called from single-threaded test contexts.
unsafe fn remove_env(key: &str) {
    unsafe { std::env::remove_var(key) }
}

#[test]
fn permalink_only_talks_to_meta_and_permalink_endpoints() {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        while let Ok(Some(mut request)) = server.recv_timeout(Duration::from_secs(2)) {
            let mut body = String::new();
            let _ = request.as_reader().read_to_string(&mut body);
            let path = request.url().to_string();
            let reply = match path.as_str() {
                "/configurator/meta" => META_RESPONSE,
                "/permalink/generate/" => "Qx9k2P",
                _ => "[]",
            };
            let _ = tx.send(path);
            let _ = request.respond(Response::from_string(reply));
        }
    });

    unsafe {
        set_env("RAILROAD_URL", &format!("http://{addr}"));
        set_env("RAILROAD_LOGGING", "0");
    }

    let selection = GraphSelection {
        query: FilterQuery {
            group: "web".to_string(),
            ..FilterQuery::default()
        },
        ..GraphSelection::default()
    };
    cli::run_permalink(&selection, Some("incident")).unwrap();

    unsafe {
        remove_env("RAILROAD_URL");
        remove_env("RAILROAD_LOGGING");
    }

    let paths: Vec<String> = rx.iter().collect();
    assert_eq!(paths, vec!["/configurator/meta", "/permalink/generate/"]);
}
