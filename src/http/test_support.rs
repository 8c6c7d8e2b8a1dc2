//! Std-thread HTTP mock of the video-game catalog shared by async tests.
use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use crate::error::AppResult;

pub(crate) type Route = fn(&str, &str) -> (u16, &'static str, Duration);

pub(crate) struct MockServer {
    pub(crate) base: String,
    seen: Arc<Mutex<Vec<String>>>,
    shutdown: mpsc::Sender<()>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Drop for MockServer {
    fn drop(&mut self) {
        drop(self.shutdown.send(()));
        if let Some(handle) = self.thread.take() {
            drop(handle.join());
        }
    }
}

impl MockServer {
    pub(crate) fn requests(&self) -> Vec<String> {
        self.seen
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }
}

pub(crate) fn spawn_mock(route: Route) -> AppResult<MockServer> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    listener.set_nonblocking(true)?;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (shutdown_tx, shutdown_rx) = mpsc::channel();

    let accept_seen = Arc::clone(&seen);
    let handle = thread::spawn(move || {
        loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }
            match listener.accept() {
                Ok((stream, _)) => {
                    let seen = Arc::clone(&accept_seen);
                    thread::spawn(move || handle_client(stream, route, &seen));
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(5));
                }
                Err(_) => break,
            }
        }
    });

    Ok(MockServer {
        base: format!("http://{}", addr),
        seen,
        shutdown: shutdown_tx,
        thread: Some(handle),
    })
}

fn handle_client(mut stream: TcpStream, route: Route, seen: &Mutex<Vec<String>>) {
    if stream.set_nonblocking(false).is_err() {
        return;
    }
    let Some(request) = read_request(&mut stream) else {
        return;
    };
    let request_line = request.lines().next().unwrap_or_default().to_owned();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_owned();
    let path = parts.next().unwrap_or_default().to_owned();
    if let Ok(mut seen) = seen.lock() {
        seen.push(request.clone());
    }

    let (status, body, delay) = route(&method, &path);
    thread::sleep(delay);
    let response = format!(
        "HTTP/1.1 {} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    if stream.write_all(response.as_bytes()).is_err() {
        return;
    }
    drop(stream.flush());
    drop(stream.shutdown(Shutdown::Both));
}

fn read_request(stream: &mut TcpStream) -> Option<String> {
    let mut data = Vec::new();
    let mut chunk = [0_u8; 1024];
    loop {
        let read = stream.read(&mut chunk).ok()?;
        if read == 0 {
            break;
        }
        data.extend_from_slice(chunk.get(..read)?);
        let text = String::from_utf8_lossy(&data);
        if let Some(head_end) = text.find("\r\n\r\n") {
            let content_length = text
                .get(..head_end)?
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if data.len() >= head_end.saturating_add(4).saturating_add(content_length) {
                break;
            }
        }
    }
    Some(String::from_utf8_lossy(&data).into_owned())
}

pub(crate) fn catalog_route(method: &str, path: &str) -> (u16, &'static str, Duration) {
    match (method, path) {
        ("POST", "/api/authenticate") => (200, r#"{"token":"abc"}"#, Duration::ZERO),
        ("GET", "/api/videogame/7") => (200, r#"{"id":7,"name":"Zelda"}"#, Duration::ZERO),
        ("GET", "/api/slow") => (200, "{}", Duration::from_millis(600)),
        ("DELETE", "/api/videogame/7") => (200, "Video game deleted", Duration::ZERO),
        _ => (404, r#"{"error":"not found"}"#, Duration::ZERO),
    }
}
