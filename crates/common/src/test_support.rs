//! Local HTTP endpoints for exercising the Ollama clients

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Answers every connection with `response` and closes it
pub(crate) async fn canned_server(response: &'static str) -> String {
    serve(response, Duration::ZERO).await
}

/// Writes `head` (possibly empty) and then holds the connection open
pub(crate) async fn stalled_server(head: &'static str) -> String {
    serve(head, Duration::from_secs(300)).await
}

async fn serve(payload: &'static str, hold: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 8192];
                let _ = socket.read(&mut buf).await;
                if !payload.is_empty() {
                    let _ = socket.write_all(payload.as_bytes()).await;
                    let _ = socket.flush().await;
                }
                tokio::time::sleep(hold).await;
            });
        }
    });

    format!("http://{}", addr)
}
