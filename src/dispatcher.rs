//! Tokio adapter driving the engines over a real socket: readiness and
//! timers come from the runtime, the engines stay event loop agnostic.

use std::{io, time::Duration};

use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};
use tracing::trace;

use crate::body::{self, PostHandler, ReadOutcome};
use crate::error::Error;
use crate::io::ClientIo;
use crate::request::{Disposition, Event, Request};

/// Non-blocking [ClientIo] over a tokio tcp stream.
///
/// `recv`/`send` map onto `try_read`/`try_write`; a read that would block
/// clears the readiness belief until the driver observes the socket readable
/// again. Timers are deadlines serviced by [ingest]/[discard].
pub struct TcpIo {
    stream: TcpStream,
    ready: bool,
    deadline: Option<Instant>,
    timed_out: bool,
}

impl TcpIo {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            ready: true,
            deadline: None,
            timed_out: false,
        }
    }

    pub fn into_stream(self) -> TcpStream {
        self.stream
    }
}

impl ClientIo for TcpIo {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.stream.try_read(buf) {
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                self.ready = false;
                Err(e)
            }
            res => res,
        }
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.try_write(buf)
    }

    fn read_ready(&self) -> bool {
        self.ready
    }

    fn schedule_read(&mut self) -> io::Result<()> {
        // readiness interest is re-registered by the next `readable` await
        Ok(())
    }

    fn arm_read_timer(&mut self, timeout: Duration) {
        self.deadline = Some(Instant::now() + timeout);
    }

    fn cancel_read_timer(&mut self) {
        self.deadline = None;
    }

    fn read_timer_armed(&self) -> bool {
        self.deadline.is_some()
    }

    fn read_timed_out(&self) -> bool {
        self.timed_out
    }
}

/// Acquire the request body, suspending on the runtime whenever the engines
/// yield, and resolve once the completion callback has run.
pub async fn ingest(
    r: &mut Request<TcpIo>,
    post_handler: PostHandler<TcpIo>,
) -> Result<(), Error> {
    match body::read_client_request_body(r, post_handler)? {
        ReadOutcome::Done => return Ok(()),
        ReadOutcome::Again => {}
    }

    drive(r).await
}

/// Drain a discarded body to completion.
pub async fn discard(r: &mut Request<TcpIo>) -> Result<(), Error> {
    body::discard_request_body(r)?;

    if !r.discard_body() {
        return Ok(());
    }

    drive(r).await
}

async fn drive(r: &mut Request<TcpIo>) -> Result<(), Error> {
    loop {
        wait_read_event(r).await?;

        match r.on_read_event() {
            Event::Again => {}
            Event::Complete | Event::Blocked => return Ok(()),
            Event::Finalized => {
                return match r.finalized() {
                    Some(&Disposition::Done) => Ok(()),
                    Some(&Disposition::Status(code)) => Err(Error::from_status(code)),
                    _ => Err(Error::BadRequest),
                };
            }
        }
    }
}

/// Wait for readability or the armed read deadline, whichever comes first.
async fn wait_read_event(r: &mut Request<TcpIo>) -> Result<(), Error> {
    let io = r.io_mut();

    match io.deadline {
        Some(deadline) => match timeout_at(deadline, io.stream.readable()).await {
            Ok(res) => {
                res.map_err(|_| Error::BadRequest)?;
                io.ready = true;
            }
            Err(_) => {
                trace!(target: "h1_body", "client body read timed out");
                io.timed_out = true;
            }
        },
        None => {
            io.stream.readable().await.map_err(|_| Error::BadRequest)?;
            io.ready = true;
        }
    }

    Ok(())
}
