//! # Worker invocation: declarative argv construction.
//!
//! An [`Invocation`] is the complete description of how to launch one worker
//! process: program, arguments, and the destination the worker pushes to.
//! Invocations are built by an [`InvocationFactory`] so they can be unit
//! tested without spawning anything, and so embedders/tests can substitute a
//! different worker program entirely.
//!
//! [`EncoderFactory`] is the production factory: it emits the ffmpeg
//! invocation that reads a webm byte stream on stdin, re-encodes to
//! H.264/AAC, and pushes flv to `<rtmp_base><stream_key>`.

use std::fmt;
use std::sync::Arc;

use crate::error::RelayError;

/// Default RTMP ingest prefix the destination credential is appended to.
pub const DEFAULT_RTMP_BASE: &str = "rtmp://a.rtmp.youtube.com/live2/";

/// Default encoder binary.
pub const DEFAULT_FFMPEG_BIN: &str = "ffmpeg";

/// Destination credential (stream key) for the remote ingest endpoint.
///
/// Opaque to this crate; only non-emptiness is validated. The full key is
/// never logged: `Debug` and `Display` render a masked form.
///
/// ```
/// use streamvisor::StreamKey;
///
/// let key = StreamKey::new("abcd-1234-efgh");
/// assert!(!format!("{key}").contains("1234"));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct StreamKey(Arc<str>);

impl StreamKey {
    /// Wraps a raw credential string.
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self(key.into())
    }

    /// True if the credential is empty (start requests must be rejected).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The raw credential, for embedding into a destination address.
    /// Deliberately crate-private: callers outside the factory never need it.
    pub(crate) fn expose(&self) -> &str {
        &self.0
    }

    /// Masked rendition safe for logs: first three characters, then `***`.
    pub fn masked(&self) -> String {
        let prefix: String = self.0.chars().take(3).collect();
        format!("{prefix}***")
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

impl fmt::Debug for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamKey({})", self.masked())
    }
}

impl From<&str> for StreamKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Complete, inert description of a worker process launch.
#[derive(Clone, Debug)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
}

impl Invocation {
    /// Creates an invocation for the given program with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, a: impl Into<String>) -> Self {
        self.args.push(a.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, it: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(it.into_iter().map(Into::into));
        self
    }

    /// Program path or name.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Full argument vector, in order.
    pub fn argv(&self) -> &[String] {
        &self.args
    }
}

/// Builds a worker invocation for one client session.
///
/// Factories must be cheap and side-effect free; process creation happens in
/// [`PipeHandle::spawn`](crate::worker::PipeHandle::spawn).
pub trait InvocationFactory: Send + Sync + 'static {
    /// Builds the invocation for `client_id` pushing to the destination
    /// identified by `key`.
    ///
    /// Fails with [`RelayError::MissingCredential`] when the key is empty.
    /// The key's authenticity is not validated.
    fn build(&self, client_id: &str, key: &StreamKey) -> Result<Invocation, RelayError>;
}

/// Production factory producing the ffmpeg relay invocation.
///
/// Input: continuous webm byte stream on stdin, read at native frame rate.
/// Output: H.264 (veryfast/zerolatency, 2.5 Mbps) + AAC 128k stereo, muxed
/// to flv and pushed to `<rtmp_base><key>`.
pub struct EncoderFactory {
    ffmpeg_bin: String,
    rtmp_base: String,
}

impl EncoderFactory {
    /// Creates a factory for the given encoder binary and ingest prefix.
    pub fn new(ffmpeg_bin: impl Into<String>, rtmp_base: impl Into<String>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
            rtmp_base: rtmp_base.into(),
        }
    }
}

impl Default for EncoderFactory {
    fn default() -> Self {
        Self::new(DEFAULT_FFMPEG_BIN, DEFAULT_RTMP_BASE)
    }
}

impl InvocationFactory for EncoderFactory {
    fn build(&self, _client_id: &str, key: &StreamKey) -> Result<Invocation, RelayError> {
        if key.is_empty() {
            return Err(RelayError::MissingCredential);
        }
        let destination = format!("{}{}", self.rtmp_base, key.expose());

        Ok(Invocation::new(&self.ffmpeg_bin)
            // input: webm byte stream on stdin, read at native frame rate
            .args(["-re", "-f", "webm", "-i", "pipe:0"])
            // video: H.264 tuned for low-latency live relay
            .args(["-c:v", "libx264"])
            .args(["-preset", "veryfast"])
            .args(["-tune", "zerolatency"])
            .args(["-r", "25"])
            .args(["-g", "50"])
            .args(["-keyint_min", "25"])
            .args(["-crf", "23"])
            .args(["-pix_fmt", "yuv420p"])
            .args(["-sc_threshold", "0"])
            .args(["-profile:v", "high"])
            .args(["-level", "4.1"])
            .args(["-b:v", "2500k"])
            .args(["-maxrate", "2500k"])
            .args(["-bufsize", "5000k"])
            // audio: AAC stereo at a fixed sample rate
            .args(["-c:a", "aac"])
            .args(["-b:a", "128k"])
            .args(["-ar", "44100"])
            .args(["-ac", "2"])
            // output: flv push to the ingest endpoint
            .args(["-f", "flv"])
            .args(["-flvflags", "no_duration_filesize"])
            .arg(destination))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_rejected() {
        let factory = EncoderFactory::default();
        let err = factory.build("u1", &StreamKey::new("")).unwrap_err();
        assert!(matches!(err, RelayError::MissingCredential));
    }

    #[test]
    fn destination_is_prefix_plus_key() {
        let factory = EncoderFactory::new("ffmpeg", "rtmp://ingest.example/live/");
        let inv = factory.build("u1", &StreamKey::new("abc123")).unwrap();
        assert_eq!(inv.program(), "ffmpeg");
        assert_eq!(
            inv.argv().last().map(String::as_str),
            Some("rtmp://ingest.example/live/abc123")
        );
    }

    #[test]
    fn argv_declares_stdin_input_and_flv_output() {
        let inv = EncoderFactory::default()
            .build("u1", &StreamKey::new("abc123"))
            .unwrap();
        let argv = inv.argv();
        assert!(argv.windows(2).any(|w| w == ["-i", "pipe:0"]));
        assert!(argv.windows(2).any(|w| w == ["-f", "flv"]));
    }

    #[test]
    fn key_display_is_masked() {
        let key = StreamKey::new("super-secret-key");
        assert_eq!(key.masked(), "sup***");
        assert!(!format!("{key:?}").contains("secret"));
    }

    #[test]
    fn short_key_masks_without_panic() {
        assert_eq!(StreamKey::new("ab").masked(), "ab***");
    }
}
