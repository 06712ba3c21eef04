use std::{cmp, io, time::Instant};

use tracing::trace;

use crate::body::ReadOutcome;
use crate::error::Error;
use crate::io::ClientIo;
use crate::request::{Disposition, Event, ReadHandler, Request};

use super::expect;

const DISCARD_BUFFER_SIZE: usize = 4096;

/// Drain and drop the request body because no handler wants it.
///
/// Only the main request discards; subrequests share the connection and
/// short-circuit to success. Once the discard read handler is installed the
/// drain continues asynchronously and never surfaces I/O errors: the
/// guarantee is best effort, not reliable transport.
pub fn discard_request_body<Io: ClientIo>(r: &mut Request<Io>) -> Result<(), Error> {
    if !r.main || r.discard_body {
        return Ok(());
    }

    if expect::test_expect(r).is_err() {
        return Err(Error::Internal.log());
    }

    trace!(target: "h1_body", "http set discard body");

    if r.io.read_timer_armed() {
        r.io.cancel_read_timer();
    }

    let cl = match r.content_length {
        Some(cl) if cl > 0 => cl,
        _ => return Ok(()),
    };
    if r.request_body.is_some() {
        return Ok(());
    }

    // drain the preread part first
    let size = (r.header_buf.last - r.header_buf.pos) as u64;
    if size > 0 {
        if cl > size {
            r.header_buf.pos = r.header_buf.last;
            r.content_length = Some(cl - size);
        } else {
            r.header_buf.pos += cl as usize;
            r.content_length = Some(0);
            return Ok(());
        }
    }

    match read_discarded_body(r) {
        ReadOutcome::Done => {
            r.lingering_close = false;
            Ok(())
        }
        ReadOutcome::Again => {
            r.read_handler = ReadHandler::DiscardBody;
            if r.io.schedule_read().is_err() {
                return Err(Error::Internal.log());
            }
            r.count += 1;
            r.discard_body = true;
            Ok(())
        }
    }
}

/// Read event callback while a discard is in progress.
pub(crate) fn discarded_body_handler<Io: ClientIo>(r: &mut Request<Io>) -> Event {
    if r.io.read_timed_out() {
        r.timed_out = true;
        r.error = true;
        r.finalize(Disposition::Error);
        return Event::Finalized;
    }

    // remaining wall clock budget when a lingering deadline is set
    let budget = match r.lingering_time {
        Some(deadline) => {
            let now = Instant::now();
            if deadline <= now {
                r.discard_body = false;
                r.lingering_close = false;
                r.finalize(Disposition::Error);
                return Event::Finalized;
            }
            Some(deadline - now)
        }
        None => None,
    };

    match read_discarded_body(r) {
        ReadOutcome::Done => {
            r.discard_body = false;
            r.lingering_close = false;
            r.finalize(Disposition::Done);
            Event::Finalized
        }
        ReadOutcome::Again => {
            if r.io.schedule_read().is_err() {
                r.error = true;
                r.finalize(Disposition::Error);
                return Event::Finalized;
            }

            if let Some(budget) = budget {
                r.io
                    .arm_read_timer(cmp::min(budget, r.config.lingering_timeout));
            }

            Event::Again
        }
    }
}

/// Inner drain loop: read into a throwaway buffer until the declared length
/// is consumed. Errors and EOF end the drain silently.
fn read_discarded_body<Io: ClientIo>(r: &mut Request<Io>) -> ReadOutcome {
    trace!(target: "h1_body", "http read discarded body");

    let mut buffer = [0u8; DISCARD_BUFFER_SIZE];

    loop {
        let cl = match r.content_length {
            Some(cl) if cl > 0 => cl,
            _ => {
                r.read_handler = ReadHandler::Blocked;
                return ReadOutcome::Done;
            }
        };

        if !r.io.read_ready() {
            return ReadOutcome::Again;
        }

        let size = cmp::min(cl, DISCARD_BUFFER_SIZE as u64) as usize;

        match r.io.recv(&mut buffer[..size]) {
            Ok(0) => return ReadOutcome::Done,
            Ok(n) => r.content_length = Some(cl - n as u64),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return ReadOutcome::Again,
            Err(_) => {
                r.error = true;
                return ReadOutcome::Done;
            }
        }
    }
}
