//! Control and data channel setup.
//!
//! Both failures here are fatal to session start and carry enough context
//! for the caller to report them without guessing.

use crate::error::ClientError;
use log::info;
use tokio::net::{TcpStream, UdpSocket};

/// Open the control channel to the server.
pub async fn connect_control(addr: &str, port: u16) -> Result<TcpStream, ClientError> {
    let target = format!("{addr}:{port}");
    let stream = TcpStream::connect(&target)
        .await
        .map_err(|source| ClientError::ConnectionFailure {
            addr: target.clone(),
            source,
        })?;
    info!("control channel connected to {target}");
    Ok(stream)
}

/// Bind the local data channel the server will send fragments to.
pub async fn bind_data(port: u16) -> Result<UdpSocket, ClientError> {
    let socket = UdpSocket::bind(("0.0.0.0", port))
        .await
        .map_err(|source| ClientError::BindFailure { port, source })?;
    info!("data channel bound on port {port}");
    Ok(socket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connects_to_a_listening_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        assert!(connect_control("127.0.0.1", port).await.is_ok());
    }

    #[tokio::test]
    async fn connect_failure_carries_the_address() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = connect_control("127.0.0.1", port).await.unwrap_err();
        assert!(matches!(err, ClientError::ConnectionFailure { .. }));
        assert!(err.to_string().contains(&port.to_string()));
    }

    #[tokio::test]
    async fn bind_failure_carries_the_port() {
        let taken = UdpSocket::bind("0.0.0.0:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let err = bind_data(port).await.unwrap_err();
        assert!(matches!(err, ClientError::BindFailure { .. }));
        assert!(err.to_string().contains(&port.to_string()));
    }
}
