mod admin;
mod catalog;
mod config;
mod db;
mod export;
mod ipc;
mod report;
mod results;
mod scoring;
mod session;

use std::io::{self, BufRead, Write};

fn main() {
    // stdout carries responses only; logs go to stderr.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = config::Config::from_env();
    let mut state = ipc::AppState::new(config);

    if let Some(path) = state.config.workspace.clone() {
        if let Err(e) = ipc::open_workspace(&mut state, &path) {
            log::warn!("configured workspace {} not opened: {e:?}", path.display());
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                log::error!("stdin read failed: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => {
                log::debug!("request {} {}", req.id, req.method);
                ipc::handle_request(&mut state, req)
            }
            Err(e) => {
                log::warn!("unparseable request line: {}", e);
                ipc::bad_json(e.to_string())
            }
        };
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
