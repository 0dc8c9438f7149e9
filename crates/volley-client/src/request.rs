//! Request payload: the body file and the HTTP request wrapped around it.

use bytes::Bytes;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum PayloadError {
    Open(PathBuf, std::io::Error),
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadError::Open(path, e) => {
                write!(f, "Failed to open request file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for PayloadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PayloadError::Open(_, e) => Some(e),
        }
    }
}

/// Reads the request body file in full.
pub fn load_payload(path: &Path) -> Result<Vec<u8>, PayloadError> {
    std::fs::read(path).map_err(|e| PayloadError::Open(path.to_path_buf(), e))
}

/// Builds the keep-alive JSON POST sent on every connection.
pub fn build_post_request(host: &str, port: u16, endpoint: &str, body: &[u8]) -> Bytes {
    let head = format!(
        "POST {} HTTP/1.1\r\n\
         Host: {}:{}\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Connection: keep-alive\r\n\r\n",
        endpoint,
        host,
        port,
        body.len()
    );

    let mut request = Vec::with_capacity(head.len() + body.len());
    request.extend_from_slice(head.as_bytes());
    request.extend_from_slice(body);
    Bytes::from(request)
}
