use std::{cmp, io};

use http::StatusCode;
use tracing::{error, info, trace};

use crate::body::chain::{BodyBuf, Chain, Segment, Storage};
use crate::body::spill::SpillFile;
use crate::body::{PostHandler, ReadOutcome, RequestBody};
use crate::config::BodyConfig;
use crate::error::Error;
use crate::filter::{self, Filtered};
use crate::io::ClientIo;
use crate::request::{Disposition, Event, HeaderBuf, ReadHandler, Request};

use super::expect;

/// Acquire the request body and deliver it to `post_handler`.
///
/// On completion the body chain holds one or two segments: the memory
/// segment preread into the header buffer, and/or a memory or file segment
/// with the rest of the body. `Ok(ReadOutcome::Again)` means the read
/// handler finishes the job asynchronously; the caller must not invoke the
/// handler itself.
pub fn read_client_request_body<Io: ClientIo>(
    r: &mut Request<Io>,
    post_handler: PostHandler<Io>,
) -> Result<ReadOutcome, Error> {
    r.count += 1;

    if r.request_body.is_some() || r.discard_body {
        post_handler(r);
        return Ok(ReadOutcome::Done);
    }

    if expect::test_expect(r).is_err() {
        return fail(r, Error::Internal);
    }

    r.request_body = Some(RequestBody::new());

    let cl = match r.content_length {
        Some(cl) => cl,
        None => {
            post_handler(r);
            return Ok(ReadOutcome::Done);
        }
    };

    if cl == 0 {
        if r.config.body_in_file_only {
            let rc = {
                let Request {
                    config,
                    header_buf,
                    request_body,
                    ..
                } = &mut *r;
                match request_body.as_mut() {
                    Some(rb) => write_request_body(rb, header_buf, config, None).map(|_| {
                        rb.chain.push(Segment::File { pos: 0, last: 0 });
                    }),
                    None => Err(Error::Internal),
                }
            };
            if let Err(e) = rc {
                return fail(r, e);
            }
        }

        post_handler(r);
        return Ok(ReadOutcome::Done);
    }

    if let Some(rb) = r.request_body.as_mut() {
        rb.post_handler = Some(post_handler);
    }

    let preread = (r.header_buf.last - r.header_buf.pos) as u64;

    if preread > 0 {
        trace!(target: "h1_body", "http client request body preread {}", preread);

        // alias the preread region of the header buffer, no copy. The filter
        // sees at most content_length bytes so pipelined request bytes after
        // the body stay untouched.
        let rc = {
            let Request {
                header_buf,
                request_body,
                filter,
                ..
            } = &mut *r;
            match request_body.as_mut() {
                Some(rb) => {
                    let b = BodyBuf::header_alias(
                        header_buf.pos,
                        header_buf.last,
                        header_buf.capacity(),
                    );
                    rb.chain.push(Segment::Buf(b));
                    rb.active = 0;

                    let view_last =
                        cmp::min(header_buf.last, header_buf.pos + cl as usize);
                    let view = &header_buf.data[header_buf.pos..view_last];
                    filter::run(filter.as_mut(), view)
                }
                None => Err(Error::Internal),
            }
        };
        match rc {
            Ok(Filtered::Ok) => {}
            Ok(Filtered::Again) => return Ok(ReadOutcome::Again),
            Err(e) => return fail(r, e),
        }

        if preread >= cl {
            // the whole request body was preread
            r.header_buf.pos += cl as usize;
            r.request_length += cl;

            let new_last = r.header_buf.pos;
            if let Some(rb) = r.request_body.as_mut() {
                if let Some(b) = rb.chain.get_mut(0).and_then(Segment::as_buf_mut) {
                    b.last = new_last;
                }
            }

            if r.config.body_in_file_only {
                let rc = {
                    let Request {
                        config,
                        header_buf,
                        request_body,
                        ..
                    } = &mut *r;
                    match request_body.as_mut() {
                        Some(rb) => write_request_body(rb, header_buf, config, Some(0)).map(|_| {
                            let last = rb.spill.as_ref().map_or(0, |s| s.offset());
                            rb.chain.set(0, Segment::File { pos: 0, last });
                        }),
                        None => Err(Error::Internal),
                    }
                };
                if let Err(e) = rc {
                    return fail(r, e);
                }
            }

            invoke_post_handler(r);
            return Ok(ReadOutcome::Done);
        }

        // consume the rest of the preread so the keep-alive parser does not
        // take it for a pipelined request
        r.header_buf.pos = r.header_buf.last;
        r.request_length += preread;

        let mut fits_header = false;
        if let Some(rb) = r.request_body.as_mut() {
            rb.rest = cl - preread;
            if let Some(b) = rb.chain.get(0).and_then(Segment::as_buf) {
                fits_header = rb.rest <= b.slack() as u64;
            }
            if fits_header {
                // the whole request body may be placed in the header buffer
                rb.to_write = 0;
            }
        }
        if fits_header {
            r.read_handler = ReadHandler::ReadBody;
            let rc = do_read(r);
            return finish(r, rc);
        }
    } else if let Some(rb) = r.request_body.as_mut() {
        rb.rest = cl;
    }

    // size a fresh buffer for the remainder
    let rest = r.request_body.as_ref().map_or(0, |rb| rb.rest);
    let nominal = r.config.client_body_buffer_size + r.config.client_body_buffer_size / 4;

    let mut coalesce = preread > 0;
    let size = if rest < nominal as u64 {
        let mut size = rest as usize;
        if r.config.body_in_single_buf {
            size += preread as usize;
        }
        size
    } else {
        // the remainder does not fit in one buffer: coalescing is dropped
        // and body_in_single_buf is not honored for a body this large; the
        // preread alias stays a separate chain node
        coalesce = false;
        r.config.client_body_buffer_size
    };

    {
        let Request {
            config,
            header_buf,
            request_body,
            ..
        } = &mut *r;
        if let Some(rb) = request_body.as_mut() {
            let mut fresh = BodyBuf::owned(size);

            if coalesce && config.body_in_single_buf {
                if let Some((from, to)) = rb
                    .chain
                    .get(0)
                    .and_then(Segment::as_buf)
                    .map(|b| (b.pos, b.last))
                {
                    let n = to - from;
                    if let Storage::Owned(ref mut s) = fresh.storage {
                        s[..n].copy_from_slice(&header_buf.data[from..to]);
                    }
                    fresh.last = n;
                }
                // the preread now lives in the fresh buffer; the alias node
                // goes away
                rb.chain = Chain::new();
            }

            rb.chain.push(Segment::Buf(fresh));
            rb.active = rb.chain.len() - 1;

            rb.to_write = if config.body_in_file_only || config.body_in_single_buf {
                0
            } else if rb.chain.len() > 1 {
                // the aliased preread lives in a buffer the spill path does
                // not own; skip it
                1
            } else {
                0
            };
        }
    }

    r.read_handler = ReadHandler::ReadBody;
    let rc = do_read(r);
    finish(r, rc)
}

/// Read event callback while body ingestion is in progress.
pub(crate) fn read_body_handler<Io: ClientIo>(r: &mut Request<Io>) -> Event {
    if r.io.read_timed_out() {
        r.timed_out = true;
        r.finalize(Disposition::Status(StatusCode::REQUEST_TIMEOUT));
        return Event::Finalized;
    }

    match do_read(r) {
        Ok(ReadOutcome::Done) => Event::Complete,
        Ok(ReadOutcome::Again) => Event::Again,
        Err(e) => {
            let e = e.log();
            r.finalize(Disposition::Status(e.status_code()));
            Event::Finalized
        }
    }
}

/// Drain the socket into the active buffer until the body is complete or
/// the read would block.
pub(crate) fn do_read<Io: ClientIo>(r: &mut Request<Io>) -> Result<ReadOutcome, Error> {
    trace!(target: "h1_body", "http read client request body");

    'outer: loop {
        loop {
            let Request {
                io,
                config,
                header_buf,
                request_body,
                filter,
                request_length,
                error,
                ..
            } = &mut *r;
            let rb = match request_body.as_mut() {
                Some(rb) => rb,
                None => return Ok(ReadOutcome::Done),
            };

            let full = rb
                .chain
                .get(rb.active)
                .and_then(Segment::as_buf)
                .map_or(false, BodyBuf::is_full);
            if full {
                let tail = rb.to_write;
                write_request_body(rb, header_buf, config, Some(tail))?;
                rb.to_write = if rb.chain.len() > 1 { 1 } else { 0 };
                if let Some(b) = rb.chain.get_mut(rb.active).and_then(Segment::as_buf_mut) {
                    // reuse the flushed buffer
                    b.pos = b.start;
                    b.last = b.start;
                }
            }

            let (at, size) = match rb.chain.get(rb.active).and_then(Segment::as_buf) {
                Some(b) => (b.last, cmp::min(b.slack() as u64, rb.rest) as usize),
                None => return Err(Error::Internal),
            };

            let recvd = {
                let dst = match rb.chain.get_mut(rb.active).and_then(Segment::as_buf_mut) {
                    Some(b) => match b.storage {
                        Storage::Owned(ref mut s) => &mut s[at..at + size],
                        Storage::Header => &mut header_buf.data[at..at + size],
                    },
                    None => return Err(Error::Internal),
                };
                io.recv(dst)
            };

            let n = match recvd {
                Ok(0) => {
                    info!(target: "h1_body", "client prematurely closed connection");
                    *error = true;
                    return Err(Error::BadRequest);
                }
                Ok(n) => n,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(_) => {
                    *error = true;
                    return Err(Error::BadRequest);
                }
            };

            trace!(target: "h1_body", "http client request body recv {}", n);

            if let Some(b) = rb.chain.get_mut(rb.active).and_then(Segment::as_buf_mut) {
                b.last += n;
            }
            rb.rest -= n as u64;
            *request_length += n as u64;

            let view = match rb.chain.get(rb.active).and_then(Segment::as_buf) {
                Some(b) => match b.storage {
                    Storage::Owned(ref s) => &s[at..at + n],
                    Storage::Header => &header_buf.data[at..at + n],
                },
                None => return Err(Error::Internal),
            };
            match filter::run(filter.as_mut(), view)? {
                Filtered::Ok => {}
                Filtered::Again => return Ok(ReadOutcome::Again),
            }

            if rb.rest == 0 {
                break;
            }
            let full = rb
                .chain
                .get(rb.active)
                .and_then(Segment::as_buf)
                .map_or(false, BodyBuf::is_full);
            if !full {
                break;
            }
        }

        let rest = r.request_body.as_ref().map_or(0, |rb| rb.rest);
        trace!(target: "h1_body", "http client request body rest {}", rest);

        if rest == 0 {
            break 'outer;
        }

        if !r.io.read_ready() {
            r.io.arm_read_timer(r.config.client_body_timeout);
            if r.io.schedule_read().is_err() {
                return Err(Error::Internal);
            }
            return Ok(ReadOutcome::Again);
        }
    }

    if r.io.read_timer_armed() {
        r.io.cancel_read_timer();
    }

    {
        let Request {
            config,
            header_buf,
            request_body,
            ..
        } = &mut *r;
        if let Some(rb) = request_body.as_mut() {
            if rb.spill.is_some() || config.body_in_file_only {
                // save the last part
                let tail = rb.to_write;
                write_request_body(rb, header_buf, config, Some(tail))?;

                let last = rb.spill.as_ref().map_or(0, |s| s.offset());
                let seg = Segment::File { pos: 0, last };
                if rb.chain.len() > 1 {
                    rb.chain.set(1, seg);
                } else if rb.chain.is_empty() {
                    rb.chain.push(seg);
                } else {
                    rb.chain.set(0, seg);
                }
            }

            if rb.chain.len() > 1
                && (config.body_in_file_only || config.body_in_single_buf)
            {
                // expose the single canonical segment the policy demands
                rb.chain.advance_head();
            }
        }
    }

    r.read_handler = ReadHandler::Blocked;
    invoke_post_handler(r);

    Ok(ReadOutcome::Done)
}

/// Lazily create the spill file and append the live ranges of the chain
/// starting at `tail`. `None` preallocates an empty file.
pub(crate) fn write_request_body<Io>(
    rb: &mut RequestBody<Io>,
    header: &HeaderBuf,
    config: &BodyConfig,
    tail: Option<usize>,
) -> Result<(), Error> {
    if rb.spill.is_none() {
        let spill = match SpillFile::create(config) {
            Ok(spill) => spill,
            Err(e) => {
                error!(target: "h1_body", "failed to create client body temp file: {}", e);
                return Err(Error::Internal);
            }
        };
        rb.spill = Some(spill);

        if tail.is_none() {
            // empty body, file only
            return Ok(());
        }
    }

    let from = match tail {
        Some(from) => from,
        None => return Ok(()),
    };

    let RequestBody { chain, spill, .. } = rb;
    let spill = match spill.as_mut() {
        Some(spill) => spill,
        None => return Err(Error::Internal),
    };

    for at in from..chain.len() {
        if let Some(b) = chain.get(at).and_then(Segment::as_buf) {
            let live = b.bytes(header);
            if !live.is_empty() {
                if let Err(e) = spill.append(live) {
                    error!(target: "h1_body", "failed to write client body to temp file: {}", e);
                    return Err(Error::Internal);
                }
            }
        }
    }

    Ok(())
}

fn invoke_post_handler<Io: ClientIo>(r: &mut Request<Io>) {
    if let Some(handler) = r.request_body.as_mut().and_then(|rb| rb.post_handler.take()) {
        handler(r);
    }
}

fn fail<Io: ClientIo>(r: &mut Request<Io>, e: Error) -> Result<ReadOutcome, Error> {
    r.count = r.count.saturating_sub(1);
    Err(e.log())
}

fn finish<Io: ClientIo>(
    r: &mut Request<Io>,
    rc: Result<ReadOutcome, Error>,
) -> Result<ReadOutcome, Error> {
    match rc {
        Err(e) => fail(r, e),
        rc => rc,
    }
}
