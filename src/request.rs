use std::{io, time::Instant};

use http::{HeaderValue, Version};

use crate::body::chain::Segment;
use crate::body::{discard, ingress, RequestBody};
use crate::bytes::BytesMut;
use crate::config::BodyConfig;
use crate::io::ClientIo;

/// Header buffer handed over by the request line and header parser.
///
/// `[pos, last)` holds the bytes already read past the headers: the preread
/// part of the body, possibly followed by pipelined request bytes. The body
/// engines advance `pos` but never write before `last` so the parser can
/// resume from `[pos, last)` afterwards.
pub struct HeaderBuf {
    pub(crate) data: BytesMut,
    pub(crate) pos: usize,
    pub(crate) last: usize,
}

impl HeaderBuf {
    pub fn with_capacity(capacity: usize) -> Self {
        let mut data = BytesMut::with_capacity(capacity);
        data.resize(capacity, 0);
        Self { data, pos: 0, last: 0 }
    }

    /// Place preread bytes at the given offset and point `[pos, last)` at
    /// them.
    pub fn fill(&mut self, at: usize, bytes: &[u8]) {
        assert!(at + bytes.len() <= self.data.len());
        self.data[at..at + bytes.len()].copy_from_slice(bytes);
        self.pos = at;
        self.last = at + bytes.len();
    }

    /// The unconsumed bytes, body preread first.
    pub fn unread(&self) -> &[u8] {
        &self.data[self.pos..self.last]
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn last(&self) -> usize {
        self.last
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }
}

/// Read event handler installed on the connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadHandler {
    /// Reading is blocked; events are ignored until a new handler is set.
    Blocked,
    /// Body ingestion in progress.
    ReadBody,
    /// Body discard in progress.
    DiscardBody,
}

/// What a dispatched read event did.
#[derive(Debug, PartialEq, Eq)]
pub enum Event {
    /// No read handler is installed.
    Blocked,
    /// The handler needs another readiness or timer event.
    Again,
    /// The body completed and the post handler ran.
    Complete,
    /// The request was handed to the finalize primitive. See
    /// [Request::finalized].
    Finalized,
}

/// Disposition recorded by the finalize primitive.
#[derive(Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Finalized with an http status to surface to the client.
    Status(http::StatusCode),
    /// Finalized because the connection is unusable.
    Error,
    /// Finalized after the discard path drained the body.
    Done,
}

/// Per request context the body engines operate on.
///
/// Owns the connection half, the header buffer shared with the parser, the
/// declared content length and the staging policy. The reference `count` is
/// the only coordination primitive with the enclosing request lifecycle:
/// ingestion increments it and [finalize](Self::finalize) decrements it.
pub struct Request<Io> {
    pub(crate) io: Io,
    pub(crate) config: BodyConfig,
    pub(crate) header_buf: HeaderBuf,
    pub(crate) content_length: Option<u64>,
    pub(crate) version: Version,
    pub(crate) expect: Option<HeaderValue>,
    pub(crate) expect_tested: bool,
    pub(crate) main: bool,
    pub(crate) count: u32,
    pub(crate) request_length: u64,
    pub(crate) error: bool,
    pub(crate) timed_out: bool,
    pub(crate) discard_body: bool,
    pub(crate) lingering_close: bool,
    pub(crate) lingering_time: Option<Instant>,
    pub(crate) read_handler: ReadHandler,
    pub(crate) request_body: Option<RequestBody<Io>>,
    pub(crate) filter: Box<dyn crate::filter::InputBodyFilter>,
    pub(crate) finalized: Option<Disposition>,
}

impl<Io: ClientIo> Request<Io> {
    pub fn new(io: Io, config: BodyConfig) -> Self {
        Self {
            io,
            config,
            header_buf: HeaderBuf::with_capacity(0),
            content_length: None,
            version: Version::HTTP_11,
            expect: None,
            expect_tested: false,
            main: true,
            count: 1,
            request_length: 0,
            error: false,
            timed_out: false,
            discard_body: false,
            lingering_close: false,
            lingering_time: None,
            read_handler: ReadHandler::Blocked,
            request_body: None,
            filter: Box::new(crate::filter::NoopFilter),
            finalized: None,
        }
    }

    pub fn set_header_buf(&mut self, buf: HeaderBuf) {
        self.header_buf = buf;
    }

    pub fn header_buf(&self) -> &HeaderBuf {
        &self.header_buf
    }

    pub fn set_content_length(&mut self, len: Option<u64>) {
        self.content_length = len;
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    pub fn set_expect(&mut self, value: Option<HeaderValue>) {
        self.expect = value;
    }

    /// Mark the request as a subrequest. Subrequests never discard.
    pub fn set_subrequest(&mut self) {
        self.main = false;
    }

    /// Absolute deadline bounding a lingering discard, set by the enclosing
    /// lifecycle when lingering close begins.
    pub fn set_lingering_time(&mut self, deadline: Option<Instant>) {
        self.lingering_time = deadline;
    }

    /// Enter lingering close: grant the discard path the configured
    /// `lingering_time` budget from now.
    pub fn start_lingering_close(&mut self) {
        self.lingering_close = true;
        self.lingering_time = Some(Instant::now() + self.config.lingering_time);
    }

    pub fn set_filter(&mut self, filter: Box<dyn crate::filter::InputBodyFilter>) {
        self.filter = filter;
    }

    pub fn io(&self) -> &Io {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut Io {
        &mut self.io
    }

    pub fn config(&self) -> &BodyConfig {
        &self.config
    }

    pub fn request_body(&self) -> Option<&RequestBody<Io>> {
        self.request_body.as_ref()
    }

    pub fn request_length(&self) -> u64 {
        self.request_length
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn error(&self) -> bool {
        self.error
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    pub fn discard_body(&self) -> bool {
        self.discard_body
    }

    pub fn lingering_close(&self) -> bool {
        self.lingering_close
    }

    pub fn read_handler(&self) -> ReadHandler {
        self.read_handler
    }

    pub fn finalized(&self) -> Option<&Disposition> {
        self.finalized.as_ref()
    }

    /// Dispatch a read event to the installed handler. The event loop calls
    /// this when the connection turns readable or its read deadline fires.
    pub fn on_read_event(&mut self) -> Event {
        match self.read_handler {
            ReadHandler::Blocked => Event::Blocked,
            ReadHandler::ReadBody => ingress::read_body_handler(self),
            ReadHandler::DiscardBody => discard::discarded_body_handler(self),
        }
    }

    /// Request finalize primitive: record the disposition and release the
    /// ingestion's claim on the request. When the count reaches zero the
    /// body, its segments and the spill file are released.
    pub fn finalize(&mut self, disposition: Disposition) {
        self.count = self.count.saturating_sub(1);
        self.finalized = Some(disposition);
        if self.count == 0 {
            self.request_body = None;
        }
    }

    /// Assemble the bytes the body chain currently exposes, reading file
    /// segments back from the spill file.
    pub fn body_bytes(&self) -> io::Result<Vec<u8>> {
        let rb = match self.request_body.as_ref() {
            Some(rb) => rb,
            None => return Ok(Vec::new()),
        };

        let mut out = Vec::new();
        for seg in rb.chain.iter() {
            match *seg {
                Segment::Buf(ref b) => out.extend_from_slice(b.bytes(&self.header_buf)),
                Segment::File { pos, last } => {
                    use std::io::{Read, Seek, SeekFrom};

                    let spill = rb
                        .spill
                        .as_ref()
                        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no spill file"))?;
                    let mut file = spill.file().try_clone()?;
                    file.seek(SeekFrom::Start(pos))?;
                    let mut range = vec![0; (last - pos) as usize];
                    file.read_exact(&mut range)?;
                    out.extend_from_slice(&range);
                }
            }
        }
        Ok(out)
    }
}
