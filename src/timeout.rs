//! Timeout-wrapped read/write. `Session::receive`/`send` race their I/O
//! directly against `deadline_budget()` here rather than against a separate
//! supervisor holding the socket, since the socket is owned by the in-flight
//! future and nothing external can cancel it out from under that.

use compio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use compio::time::timeout;
use std::io;
use std::time::Duration;

/// `None` blocks indefinitely; `Some(d)` fails with `TimedOut` if the read
/// doesn't complete within `d`. `Session::deadline_budget` never yields
/// `Some(Duration::ZERO)`, so a zero duration is not handled specially here.
pub async fn read_with_timeout<S, B>(
    stream: &mut S,
    buf: B,
    duration: Option<Duration>,
) -> io::Result<compio::buf::BufResult<usize, B>>
where
    S: AsyncRead + Unpin,
    B: compio::buf::IoBufMut,
{
    match duration {
        None => Ok(stream.read(buf).await),
        Some(d) => match timeout(d, stream.read(buf)).await {
            Ok(result) => Ok(result),
            Err(_elapsed) => Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out")),
        },
    }
}

/// Write-side counterpart to [`read_with_timeout`].
pub async fn write_with_timeout<S, B>(
    stream: &mut S,
    buf: B,
    duration: Option<Duration>,
) -> io::Result<compio::buf::BufResult<usize, B>>
where
    S: AsyncWrite + Unpin,
    B: compio::buf::IoBuf,
{
    match duration {
        None => Ok(stream.write(buf).await),
        Some(d) => match timeout(d, stream.write(buf)).await {
            Ok(result) => Ok(result),
            Err(_elapsed) => Err(io::Error::new(io::ErrorKind::TimedOut, "write timed out")),
        },
    }
}
