//! Plugin transport.
//!
//! Serves the volume plugin protocol as HTTP/1.1 over a Unix domain socket
//! and routes each decoded request to the lifecycle driver.

use std::convert::Infallible;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use hyper::header::{HeaderValue, CONTENT_TYPE as CONTENT_TYPE_HEADER};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::UnixListener;
use tokio_stream::wrappers::UnixListenerStream;

use imagefs_core::error::{ImagefsError, Result};

use crate::driver::LifecycleDriver;
use crate::error::error_response;
use crate::protocol::{
    endpoint, ActivateResponse, CapabilitiesResponse, Capability, CreateRequest, ErrResponse,
    GetResponse, ListResponse, MountRequest, MountpointResponse, NameRequest, WireVolume,
    CONTENT_TYPE,
};

/// A serialized plugin response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginReply {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl PluginReply {
    fn json<T: Serialize>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self { status, body },
            Err(e) => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: format!(r#"{{"Err":"failed to encode response: {}"}}"#, e).into_bytes(),
            },
        }
    }

    fn ok<T: Serialize>(value: &T) -> Self {
        Self::json(StatusCode::OK, value)
    }

    fn error(err: &ImagefsError) -> Self {
        let (status, body) = error_response(err);
        Self::json(status, &body)
    }

    fn into_response(self) -> Response<Body> {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE_HEADER, HeaderValue::from_static(CONTENT_TYPE));
        response
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> std::result::Result<T, PluginReply> {
    let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        body
    };
    serde_json::from_slice(body).map_err(|e| {
        PluginReply::json(
            StatusCode::BAD_REQUEST,
            &ErrResponse::new(format!("malformed request: {}", e)),
        )
    })
}

/// Route one plugin request to the driver.
pub async fn dispatch(driver: &LifecycleDriver, path: &str, body: &[u8]) -> PluginReply {
    tracing::debug!(path = %path, "Plugin request");

    match path {
        endpoint::ACTIVATE => PluginReply::ok(&ActivateResponse::default()),

        endpoint::CREATE => {
            let req: CreateRequest = match decode(body) {
                Ok(req) => req,
                Err(reply) => return reply,
            };
            let opts = req.opts.unwrap_or_default();
            match driver.create(&req.name, &opts).await {
                Ok(()) => PluginReply::ok(&ErrResponse::default()),
                Err(e) => PluginReply::error(&e),
            }
        }

        endpoint::REMOVE => {
            let req: NameRequest = match decode(body) {
                Ok(req) => req,
                Err(reply) => return reply,
            };
            match driver.remove(&req.name).await {
                Ok(()) => PluginReply::ok(&ErrResponse::default()),
                Err(e) => PluginReply::error(&e),
            }
        }

        endpoint::MOUNT => {
            let req: MountRequest = match decode(body) {
                Ok(req) => req,
                Err(reply) => return reply,
            };
            match driver.mount(&req.name, &req.id).await {
                Ok(mountpoint) => PluginReply::ok(&MountpointResponse {
                    mountpoint,
                    err: String::new(),
                }),
                Err(e) => PluginReply::error(&e),
            }
        }

        endpoint::PATH => {
            let req: NameRequest = match decode(body) {
                Ok(req) => req,
                Err(reply) => return reply,
            };
            match driver.path(&req.name).await {
                Ok(mountpoint) => PluginReply::ok(&MountpointResponse {
                    mountpoint,
                    err: String::new(),
                }),
                Err(e) => PluginReply::error(&e),
            }
        }

        endpoint::UNMOUNT => {
            let req: MountRequest = match decode(body) {
                Ok(req) => req,
                Err(reply) => return reply,
            };
            match driver.unmount(&req.name, &req.id).await {
                Ok(()) => PluginReply::ok(&ErrResponse::default()),
                Err(e) => PluginReply::error(&e),
            }
        }

        endpoint::GET => {
            let req: NameRequest = match decode(body) {
                Ok(req) => req,
                Err(reply) => return reply,
            };
            match driver.get(&req.name).await {
                Ok(info) => PluginReply::ok(&GetResponse {
                    volume: Some(WireVolume {
                        name: info.name,
                        mountpoint: info.mountpoint,
                    }),
                    err: String::new(),
                }),
                Err(e) => PluginReply::error(&e),
            }
        }

        endpoint::LIST => match driver.list().await {
            Ok(names) => PluginReply::ok(&ListResponse {
                volumes: names
                    .into_iter()
                    .map(|name| WireVolume {
                        name,
                        mountpoint: String::new(),
                    })
                    .collect(),
                err: String::new(),
            }),
            Err(e) => PluginReply::error(&e),
        },

        endpoint::CAPABILITIES => PluginReply::ok(&CapabilitiesResponse {
            capabilities: Capability {
                scope: driver.capabilities().to_string(),
            },
        }),

        _ => PluginReply::json(
            StatusCode::NOT_FOUND,
            &ErrResponse::new(format!("unknown endpoint: {}", path)),
        ),
    }
}

async fn handle(
    driver: Arc<LifecycleDriver>,
    request: Request<Body>,
) -> std::result::Result<Response<Body>, Infallible> {
    if request.method() != Method::POST {
        let reply = PluginReply::json(
            StatusCode::METHOD_NOT_ALLOWED,
            &ErrResponse::new(format!("method {} not allowed", request.method())),
        );
        return Ok(reply.into_response());
    }

    let path = request.uri().path().to_string();
    let reply = match hyper::body::to_bytes(request.into_body()).await {
        Ok(body) => dispatch(&driver, &path, &body).await,
        Err(e) => PluginReply::json(
            StatusCode::BAD_REQUEST,
            &ErrResponse::new(format!("failed to read request body: {}", e)),
        ),
    };

    if !reply.status.is_success() {
        tracing::warn!(path = %path, status = %reply.status, "Plugin request failed");
    }
    Ok(reply.into_response())
}

/// Volume plugin server.
pub struct PluginServer {
    /// Path to the Unix domain socket.
    socket_path: PathBuf,
    driver: Arc<LifecycleDriver>,
}

impl PluginServer {
    pub fn new(socket_path: PathBuf, driver: LifecycleDriver) -> Self {
        Self {
            socket_path,
            driver: Arc::new(driver),
        }
    }

    /// Serve plugin requests until `shutdown` resolves.
    pub async fn serve(&self, shutdown: impl Future<Output = ()>) -> Result<()> {
        // Remove existing socket file if present
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        // Ensure parent directory exists
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        let incoming = hyper::server::accept::from_stream(UnixListenerStream::new(listener));

        let driver = self.driver.clone();
        let make_service = make_service_fn(move |_| {
            let driver = driver.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |request| handle(driver.clone(), request)))
            }
        });

        tracing::info!(
            socket = %self.socket_path.display(),
            "Volume plugin listening"
        );

        let result = Server::builder(incoming)
            .serve(make_service)
            .with_graceful_shutdown(shutdown)
            .await;

        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            tracing::debug!(error = %e, "Socket already gone");
        }
        result.map_err(std::io::Error::other)?;

        tracing::info!("Volume plugin stopped");
        Ok(())
    }
}
