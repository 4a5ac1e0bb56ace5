use bytes::{BufMut, Bytes, BytesMut};
use pingora_proxy::Session;

use crate::{
    error::{BridgeError, BridgeResult},
    utils::request::declared_content_length,
};

/// Reads the whole request body, refusing anything over `limit` bytes.
pub async fn read_request_body(session: &mut Session, limit: usize) -> BridgeResult<Bytes> {
    if let Some(len) = declared_content_length(session.req_header()) {
        if len > limit {
            log::warn!("Declared body of {len} bytes exceeds limit");
            return Err(BridgeError::PayloadTooLarge { limit });
        }
    }

    let mut buf = BytesMut::new();
    loop {
        let chunk = session
            .downstream_session
            .read_request_body()
            .await
            .map_err(|e| {
                log::error!("Failed to read request body: {e}");
                BridgeError::ReadBody(e.to_string())
            })?;
        match chunk {
            Some(chunk) => append_chunk(&mut buf, &chunk, limit)?,
            None => break,
        }
    }
    log::debug!("Request body size: {}", buf.len());
    Ok(buf.freeze())
}

fn append_chunk(buf: &mut BytesMut, chunk: &[u8], limit: usize) -> BridgeResult<()> {
    if buf.len() + chunk.len() > limit {
        return Err(BridgeError::PayloadTooLarge { limit });
    }
    buf.put_slice(chunk);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_chunk_enforces_limit() {
        let mut buf = BytesMut::new();
        append_chunk(&mut buf, b"12345", 8).unwrap();
        append_chunk(&mut buf, b"678", 8).unwrap();
        assert_eq!(&buf[..], b"12345678");

        let err = append_chunk(&mut buf, b"9", 8).unwrap_err();
        assert!(matches!(err, BridgeError::PayloadTooLarge { limit: 8 }));
        assert_eq!(buf.len(), 8);
    }
}
