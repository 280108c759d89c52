use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::command::Command;
use crate::error::ProtocolError;
use crate::event::Event;

/// Frames larger than this are rejected rather than trusted blindly off the
/// wire.
const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// Writes one length-prefixed, JSON-encoded frame per call: a big-endian
/// `u32` length followed by that many bytes of payload.
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    async fn write_frame(&mut self, payload: &[u8]) -> Result<(), ProtocolError> {
        let len = u32::try_from(payload.len()).map_err(|_| ProtocolError::FrameTooLarge {
            len: u32::MAX,
            max: MAX_FRAME_LEN,
        })?;
        self.inner.write_all(&len.to_be_bytes()).await?;
        self.inner.write_all(payload).await?;
        self.inner.flush().await?;
        Ok(())
    }

    pub async fn write_command(&mut self, command: &Command) -> Result<(), ProtocolError> {
        self.write_value(command).await
    }

    pub async fn write_event(&mut self, event: &Event) -> Result<(), ProtocolError> {
        self.write_value(event).await
    }

    async fn write_value<T: Serialize>(&mut self, value: &T) -> Result<(), ProtocolError> {
        let payload = serde_json::to_vec(value)?;
        self.write_frame(&payload).await
    }
}

/// Reads length-prefixed, JSON-encoded frames written by [`FrameWriter`].
pub struct FrameReader<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
        let mut len_buf = [0u8; 4];
        match self.inner.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let len = u32::from_be_bytes(len_buf);
        if len > MAX_FRAME_LEN {
            return Err(ProtocolError::FrameTooLarge {
                len,
                max: MAX_FRAME_LEN,
            });
        }
        let mut payload = vec![0u8; len as usize];
        self.inner.read_exact(&mut payload).await?;
        Ok(Some(payload))
    }

    pub async fn read_command(&mut self) -> Result<Option<Command>, ProtocolError> {
        self.read_value().await
    }

    pub async fn read_event(&mut self) -> Result<Option<Event>, ProtocolError> {
        self.read_value().await
    }

    /// Read the single starting command a worker expects as the first
    /// frame on its stdin: `Eval` or `Build` (spec §4.7: "the worker
    /// processes exactly one starting command ... any other starting
    /// command is fatal"). The stream closing before any command arrives is
    /// just as fatal as an unexpected one.
    pub async fn read_starting_command(&mut self) -> Result<Command, ProtocolError> {
        match self.read_command().await? {
            Some(command) if command.is_eval_or_build_starting() => Ok(command),
            Some(other) => Err(ProtocolError::UnexpectedStartingCommand(format!("{other:?}"))),
            None => Err(ProtocolError::UnexpectedEof),
        }
    }

    async fn read_value<T: DeserializeOwned>(&mut self) -> Result<Option<T>, ProtocolError> {
        match self.read_frame().await? {
            Some(payload) => Ok(Some(serde_json::from_slice(&payload)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::EvalParams;

    #[tokio::test]
    async fn roundtrips_a_command_through_an_in_memory_pipe() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        let command = Command::Eval(EvalParams {
            attribute_path: vec!["packages".to_string(), "default".to_string()],
        });

        let mut writer = FrameWriter::new(&mut a);
        writer.write_command(&command).await.unwrap();

        let mut reader = FrameReader::new(&mut b);
        let read_back = reader.read_command().await.unwrap().unwrap();
        assert_eq!(read_back, command);
    }

    #[tokio::test]
    async fn reading_past_a_closed_stream_yields_none() {
        let (a, b) = tokio::io::duplex(4096);
        drop(a);
        let mut reader = FrameReader::new(b);
        assert!(reader.read_command().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let (mut a, b) = tokio::io::duplex(8);
        a.write_all(&(MAX_FRAME_LEN + 1).to_be_bytes()).await.unwrap();
        let mut reader = FrameReader::new(b);
        let err = reader.read_command().await.unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge { .. }));
    }

    #[tokio::test]
    async fn starting_command_accepts_eval_or_build() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        let command = Command::Eval(EvalParams {
            attribute_path: vec!["packages".to_string(), "default".to_string()],
        });

        let mut writer = FrameWriter::new(&mut a);
        writer.write_command(&command).await.unwrap();

        let mut reader = FrameReader::new(&mut b);
        let started = reader.read_starting_command().await.unwrap();
        assert_eq!(started, command);
    }

    #[tokio::test]
    async fn non_starting_command_first_is_fatal() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        let mut writer = FrameWriter::new(&mut a);
        writer
            .write_command(&Command::StartDaemon {
                socket_path: "/tmp/daemon.sock".to_string(),
            })
            .await
            .unwrap();

        let mut reader = FrameReader::new(&mut b);
        let err = reader.read_starting_command().await.unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedStartingCommand(_)));
    }

    #[tokio::test]
    async fn closed_stream_before_any_command_is_unexpected_eof() {
        let (a, b) = tokio::io::duplex(4096);
        drop(a);
        let mut reader = FrameReader::new(b);
        let err = reader.read_starting_command().await.unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedEof));
    }
}
