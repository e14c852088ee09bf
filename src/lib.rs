pub mod auth;
pub mod discovery;
pub mod http;
pub mod tracker;

/// Test helpers shared by unit tests across modules.
#[cfg(test)]
pub mod test_utils {
    use crate::auth::{AccessToken, MockCredentialsProvider};
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// A credentials provider handing out one fixed token.
    pub fn static_credentials(secret: &str) -> MockCredentialsProvider {
        scripted_credentials(&[secret])
    }

    /// A credentials provider handing out the given tokens in call order.
    /// The last token repeats once the script runs out.
    pub fn scripted_credentials(secrets: &[&str]) -> MockCredentialsProvider {
        let secrets: Vec<String> = secrets.iter().map(|s| s.to_string()).collect();
        let calls = AtomicUsize::new(0);
        let mut provider = MockCredentialsProvider::new();
        provider.expect_access_token().returning(move |_| {
            let index = calls.fetch_add(1, Ordering::SeqCst).min(secrets.len() - 1);
            Ok(AccessToken::new(secrets[index].clone()))
        });
        provider
    }

    /// A minimal discovery document covering the issue tracker methods the
    /// tests exercise, rooted at the given base URL.
    pub fn discovery_document(base_url: &str) -> String {
        r#"{
            "name": "issuetracker",
            "version": "v1",
            "baseUrl": "BASE/",
            "resources": {
                "issues": {
                    "methods": {
                        "get": {
                            "id": "issuetracker.issues.get",
                            "path": "v1/issues/{+issueId}",
                            "httpMethod": "GET"
                        },
                        "list": {
                            "id": "issuetracker.issues.list",
                            "path": "v1/issues",
                            "httpMethod": "GET"
                        },
                        "create": {
                            "id": "issuetracker.issues.create",
                            "path": "v1/issues",
                            "httpMethod": "POST"
                        },
                        "modify": {
                            "id": "issuetracker.issues.modify",
                            "path": "v1/issues/{+issueId}:modify",
                            "httpMethod": "POST"
                        }
                    },
                    "resources": {
                        "issueUpdates": {
                            "methods": {
                                "list": {
                                    "id": "issuetracker.issues.issueUpdates.list",
                                    "path": "v1/issues/{+issueId}/issueUpdates",
                                    "httpMethod": "GET"
                                }
                            }
                        }
                    }
                },
                "hotlists": {
                    "methods": {
                        "createEntries": {
                            "id": "issuetracker.hotlists.createEntries",
                            "path": "v1/hotlists/{+hotlistId}/entries",
                            "httpMethod": "POST"
                        }
                    },
                    "resources": {
                        "entries": {
                            "methods": {
                                "delete": {
                                    "id": "issuetracker.hotlists.entries.delete",
                                    "path": "v1/hotlists/{+hotlistId}/entries/{+issueId}",
                                    "httpMethod": "DELETE"
                                }
                            }
                        }
                    }
                }
            }
        }"#
        .replace("BASE", base_url)
    }

    /// Serves a fixed sequence of canned HTTP responses, one per request,
    /// for flows mockito cannot script (different responses to the same
    /// request). Responses beyond the script answer 500.
    pub struct ScriptedServer {
        addr: SocketAddr,
        hits: Arc<AtomicUsize>,
    }

    impl ScriptedServer {
        pub async fn start(responses: Vec<(u16, String)>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let hits = Arc::new(AtomicUsize::new(0));
            let hits_handle = hits.clone();

            tokio::spawn(async move {
                let mut responses = responses.into_iter();
                loop {
                    let Ok((mut socket, _)) = listener.accept().await else {
                        break;
                    };
                    hits_handle.fetch_add(1, Ordering::SeqCst);
                    let (status, body) = responses
                        .next()
                        .unwrap_or((500, "script exhausted".to_string()));

                    read_request(&mut socket).await;
                    let reason = match status {
                        200 => "OK",
                        401 => "Unauthorized",
                        404 => "Not Found",
                        _ => "Internal Server Error",
                    };
                    let response = format!(
                        "HTTP/1.1 {} {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                        status,
                        reason,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                }
            });

            Self { addr, hits }
        }

        pub fn url(&self) -> String {
            format!("http://{}", self.addr)
        }

        pub fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }
    }

    /// Reads one request (headers plus any content-length body) so the
    /// client is never cut off mid-write.
    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        let header_end = loop {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => data.extend_from_slice(&buf[..n]),
            }
            if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let headers = String::from_utf8_lossy(&data[..header_end]).to_lowercase();
        let content_length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        while data.len() < header_end + content_length {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => data.extend_from_slice(&buf[..n]),
            }
        }
    }
}
