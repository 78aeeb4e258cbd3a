//! Turns the transport's reply callback into the completion of an `Eventual`.

use buspack::CodecConfig;
use buspack::Unpack;
use tracing::trace;

use crate::error::Error;
use crate::error::Result;
use crate::eventual::Completer;
use crate::transport::ReplyHandler;

/// Builds the reply handler that resolves `completer`.
///
/// - A delivery failure completes with the matching error (see `Error::from`).
/// - An empty body completes with `R::absent()`.
/// - A fault completes with `Error::Remote`; anything else is the value.
pub fn reply_handler<R: Unpack + Send + 'static>(codec: CodecConfig, completer: Completer<R>) -> ReplyHandler {
    Box::new(move |outcome| {
        let result = match outcome {
            Ok(reply) => decode_reply::<R>(&codec, reply.body()),
            Err(e) => Err(Error::from(e)),
        };
        trace!(ok = result.is_ok(), "reply");
        completer.complete(result);
    })
}

/// Decodes a reply body into a value or the fault sent in its place.
pub fn decode_reply<R: Unpack>(codec: &CodecConfig, body: &[u8]) -> Result<R> {
    if body.is_empty() {
        return R::absent().map_err(Error::Codec);
    }
    codec.with_codec(|codec| codec.decode_outcome::<R>(body))?.map_err(Error::Remote)
}
