use std::{
    convert::Infallible,
    io,
    net::SocketAddr,
    pin::pin,
};

use anyhow::Result;
use hyper::{
    server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::{
    TcpListener,
    TcpStream,
};
use tokio_util::sync::CancellationToken;

use crate::interceptor::Interceptor;

/// Owns the listener and hands every connection to the [`Interceptor`].
pub struct InterceptorServer {
    listener: TcpListener,
    interceptor: Interceptor,
}

impl InterceptorServer {
    pub fn new(listener: TcpListener, interceptor: Interceptor) -> Self {
        Self {
            listener,
            interceptor,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until the cancellation token is cancelled.
    /// Open connections are asked to shut down gracefully.
    pub async fn run(self, cancel_token: CancellationToken) -> Result<()> {
        loop {
            tokio::select! {
                () = cancel_token.cancelled() => {
                    tracing::info!("Interceptor received cancellation signal, shutting down...");
                    break;
                }
                res = self.listener.accept() => {
                    match res {
                        Ok((stream, socketaddr)) => {
                            serve_connection(
                                stream,
                                socketaddr,
                                self.interceptor.clone(),
                                cancel_token.clone(),
                            );
                        }
                        Err(err) => {
                            tracing::error!(?err, "Error accepting connection");
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

fn serve_connection(
    stream: TcpStream,
    socketaddr: SocketAddr,
    interceptor: Interceptor,
    shutdown_token: CancellationToken,
) {
    tracing::debug!("Connection from: {}", socketaddr);

    // Use an adapter to access something implementing `tokio::io` traits as if they implement
    // `hyper::rt` IO traits.
    let io = TokioIo::new(stream);

    tokio::task::spawn(async move {
        let service = service_fn(move |req| {
            let interceptor = interceptor.clone();
            async move { Ok::<_, Infallible>(interceptor.handle(req, socketaddr).await) }
        });
        let mut connection = pin!(http1::Builder::new().serve_connection(io, service));

        let result = tokio::select! {
            res = connection.as_mut() => res,
            () = shutdown_token.cancelled() => {
                connection.as_mut().graceful_shutdown();
                connection.await
            }
        };
        if let Err(err) = result {
            tracing::error!(?err, "Error serving connection");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Limits,
        executor::ComputeExecutor,
        test_utils::MockProofOfWork,
        upstream::HttpUpstream,
    };
    use std::sync::Arc;
    use url::Url;

    #[tokio::test]
    async fn test_server_cancellation() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let upstream = HttpUpstream::new(Url::parse("http://127.0.0.1:1").unwrap()).unwrap();
        let interceptor = Interceptor::new(
            Limits::default(),
            ComputeExecutor::new(Arc::new(MockProofOfWork::default())),
            Arc::new(upstream),
        );
        let server = InterceptorServer::new(listener, interceptor);
        assert_ne!(server.local_addr().unwrap().port(), 0);

        let cancel_token = CancellationToken::new();
        let cancel_token_clone = cancel_token.clone();
        let server_handle = tokio::spawn(async move {
            server.run(cancel_token_clone).await.unwrap();
        });

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        cancel_token.cancel();

        server_handle.await.unwrap();
    }
}
