//! Shared utilities for integration tests.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use socket_mux::{Connection, Handler, ListenerError, Request, ServeMux, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::task::JoinHandle;

/// Socket path inside a fresh temporary directory.
pub fn socket_in(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("mux.sock")
}

/// Run `mux` on `path` in the background.
pub fn start_server(
    mux: &ServeMux,
    shutdown: &Shutdown,
    path: &Path,
) -> JoinHandle<Result<(), ListenerError>> {
    let mux = mux.clone();
    let shutdown = shutdown.clone();
    let path = path.to_path_buf();
    tokio::spawn(async move { mux.listen_and_serve(&shutdown, path).await })
}

/// Connect, retrying until the listener is up.
pub async fn connect(path: &Path) -> UnixStream {
    for _ in 0..200 {
        match UnixStream::connect(path).await {
            Ok(stream) => return stream,
            Err(e)
                if e.kind() == io::ErrorKind::NotFound
                    || e.kind() == io::ErrorKind::ConnectionRefused =>
            {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            Err(e) => panic!("connect to {}: {e}", path.display()),
        }
    }
    panic!("listener at {} never came up", path.display());
}

/// Send one line and read the reply until the server closes.
pub async fn send_line(path: &Path, line: &str) -> String {
    let mut stream = connect(path).await;
    stream.write_all(line.as_bytes()).await.unwrap();

    let mut reply = String::new();
    stream.read_to_string(&mut reply).await.unwrap();
    reply
}

/// Handler that writes `text` and closes.
pub fn reply(text: &'static str) -> impl Handler {
    move |mut conn: Connection, _req: Request| async move {
        conn.write(text.as_bytes()).await.unwrap();
        conn.close().await.unwrap();
    }
}
