// Connection handler

use crate::commands::{CommandDispatcher, ConnContext, HandlerFlow};
use crate::protocol::{CommandFrame, RespError, RespParser, RespSerializer};
use bytes::BytesMut;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};

/// One client connection: buffers inbound bytes, decodes complete frames,
/// dispatches them synchronously and writes the replies back. Generic over
/// the stream so TCP and unix-socket clients share the same loop.
pub struct Connection<S> {
    stream: BufWriter<S>,
    buffer: BytesMut,
    dispatcher: Arc<CommandDispatcher>,
    ctx: ConnContext,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    pub fn new(stream: S, dispatcher: Arc<CommandDispatcher>) -> Self {
        Self {
            stream: BufWriter::new(stream),
            buffer: BytesMut::with_capacity(4096),
            dispatcher,
            ctx: ConnContext::new(),
        }
    }

    /// Main processing loop for this connection. A framing error propagates
    /// and closes the socket without a reply.
    pub async fn process(&mut self) -> anyhow::Result<()> {
        loop {
            match self.parse_frame()? {
                Some(frame) => {
                    let flow = self.dispatcher.dispatch(&mut self.ctx, frame);
                    if !self.ctx.reply.is_unset() {
                        let data = RespSerializer::serialize(&self.ctx.reply);
                        self.stream.write_all(&data).await?;
                        self.stream.flush().await?;
                    }
                    if flow == HandlerFlow::Close {
                        return Ok(());
                    }
                }
                None => {
                    // Need more data
                    if self.read_frame().await? == 0 {
                        if self.buffer.is_empty() {
                            return Ok(());
                        }
                        return Err(anyhow::anyhow!("connection reset by peer"));
                    }
                }
            }
        }
    }

    /// Try to split one complete frame off the buffer.
    fn parse_frame(&mut self) -> anyhow::Result<Option<CommandFrame>> {
        match RespParser::check_complete(&self.buffer) {
            Ok(Some(len)) => {
                let frame_data = self.buffer.split_to(len);
                let frame = RespParser::parse(&frame_data)?;
                Ok(Some(frame))
            }
            Ok(None) => Ok(None),
            Err(RespError::Incomplete) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read data from the socket into the buffer.
    async fn read_frame(&mut self) -> anyhow::Result<usize> {
        let stream = self.stream.get_mut();
        let mut read_buf = [0u8; 4096];
        let n = stream.read(&mut read_buf).await?;
        if n > 0 {
            self.buffer.extend_from_slice(&read_buf[..n]);
        }
        Ok(n)
    }
}
