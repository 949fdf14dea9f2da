use bytes::BytesMut;
use std::time::Duration;

use crate::codec::{self, Header};
use crate::error::AgentError;
use crate::symbols::{Sym, SymbolTable};
use crate::transport::{ClaimBuf, OfferResult, Publication};
use crate::value::{Format, Value};

const SCRATCH_CAPACITY: usize = 4096;
const DROP_LOG_INTERVAL: Duration = Duration::from_secs(1);

/// Encode and publish one message on a stream.
///
/// Scalar payloads go through the claim path (encode straight into the
/// claimed region); array and tensor payloads offer `[prefix, elements]`
/// as a vectored write so the element buffer is never copied.
fn publish_message<P: Publication>(
    stream: &mut P,
    stream_index: usize,
    scratch: &mut BytesMut,
    header: &Header,
    tag: &str,
    key: Sym,
    value: &Value,
    symbols: &SymbolTable,
) -> Result<(), AgentError> {
    match value.format() {
        Format::ArrayInt | Format::ArrayFloat | Format::TensorInt | Format::TensorFloat => {
            let prefix_len = codec::prefix_len(tag, key, value, symbols);
            scratch.clear();
            scratch.resize(prefix_len, 0);
            codec::encode_prefix_into(scratch, header, tag, key, value, symbols)?;
            match stream.offer(&[&scratch[..], value.payload_bytes()]) {
                OfferResult::Success => Ok(()),
                OfferResult::BackPressure => Err(AgentError::BackPressure {
                    stream: stream_index,
                }),
                other => Err(AgentError::PublicationFailure {
                    stream: stream_index,
                    reason: format!("{other:?}"),
                }),
            }
        }
        _ => {
            let len = codec::encoded_len(tag, key, value, symbols);
            if len > stream.max_message_len() {
                return Err(AgentError::Communication(format!(
                    "message of {len} bytes exceeds stream MTU"
                )));
            }
            match stream.try_claim(len) {
                Some(mut claim) => {
                    match codec::encode_into(claim.buffer(), header, tag, key, value, symbols) {
                        Ok(_) => {
                            claim.commit();
                            Ok(())
                        }
                        Err(e) => {
                            claim.abort();
                            Err(e)
                        }
                    }
                }
                None => Err(AgentError::ClaimBuffer {
                    stream: stream_index,
                    length: len,
                }),
            }
        }
    }
}

/// Back-pressure drops are routine: the strategy engine re-evaluates next
/// cycle. Everything else is logged.
fn absorb(result: Result<(), AgentError>) -> bool {
    match result {
        Ok(()) => true,
        Err(AgentError::ClaimBuffer { .. } | AgentError::BackPressure { .. }) => {
            crate::debug_throttled!(DROP_LOG_INTERVAL, "back-pressure, dropping publish");
            false
        }
        Err(e) => {
            crate::warn_throttled!(DROP_LOG_INTERVAL, "publish failed, dropping: {e}");
            false
        }
    }
}

/// Publishes status events (state changes, heartbeats, event responses) on
/// the agent's status stream. Owns its scratch buffer; nothing allocates
/// per publish.
pub struct StatusProxy<P: Publication> {
    stream: P,
    scratch: BytesMut,
    tag: String,
}

impl<P: Publication> StatusProxy<P> {
    pub fn new(stream: P, tag: impl Into<String>) -> Self {
        Self {
            stream,
            scratch: BytesMut::with_capacity(SCRATCH_CAPACITY),
            tag: tag.into(),
        }
    }

    pub fn publish_event(
        &mut self,
        key: Sym,
        value: &Value,
        symbols: &SymbolTable,
        timestamp_ns: i64,
        correlation_id: i64,
    ) -> bool {
        let header = Header {
            timestamp_ns,
            correlation_id,
        };
        absorb(publish_message(
            &mut self.stream,
            0,
            &mut self.scratch,
            &header,
            &self.tag,
            key,
            value,
            symbols,
        ))
    }
}

/// Publishes property values on the agent's output data streams, addressed
/// by 1-based stream index.
pub struct PropertyProxy<P: Publication> {
    streams: Vec<P>,
    scratch: BytesMut,
    tag: String,
}

impl<P: Publication> PropertyProxy<P> {
    pub fn new(streams: Vec<P>, tag: impl Into<String>) -> Self {
        Self {
            streams,
            scratch: BytesMut::with_capacity(SCRATCH_CAPACITY),
            tag: tag.into(),
        }
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    pub fn publish(
        &mut self,
        stream_index: usize,
        field: Sym,
        value: &Value,
        symbols: &SymbolTable,
        timestamp_ns: i64,
        correlation_id: i64,
    ) -> bool {
        let Some(stream) = stream_index
            .checked_sub(1)
            .and_then(|i| self.streams.get_mut(i))
        else {
            crate::warn_throttled!(DROP_LOG_INTERVAL, "no output stream {stream_index}");
            return false;
        };
        let header = Header {
            timestamp_ns,
            correlation_id,
        };
        absorb(publish_message(
            stream,
            stream_index,
            &mut self.scratch,
            &header,
            &self.tag,
            field,
            value,
            symbols,
        ))
    }
}
