use std::{io, time::Duration};

/// Non-blocking connection half plus its read event bookkeeping, as exposed
/// by the surrounding event loop.
///
/// `recv` and `send` must never block: a read that would block reports
/// [io::ErrorKind::WouldBlock]. Timer and readiness hooks map onto the event
/// loop the connection is registered with; the engines call them right
/// before yielding so a suspended request is always woken by readiness or by
/// its deadline.
pub trait ClientIo {
    /// Read into `buf`. `Ok(0)` means the peer closed the connection.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write from `buf`, returning how many bytes were accepted.
    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Whether the connection is believed readable. Cleared by a `recv`
    /// returning would-block, set again by the event loop on readiness.
    fn read_ready(&self) -> bool;

    /// Make sure read readiness is registered with the multiplexer.
    fn schedule_read(&mut self) -> io::Result<()>;

    /// Arm the per request read deadline.
    fn arm_read_timer(&mut self, timeout: Duration);

    /// Disarm the read deadline if armed.
    fn cancel_read_timer(&mut self);

    fn read_timer_armed(&self) -> bool;

    /// Whether the current read event was delivered because the deadline
    /// fired rather than because data arrived.
    fn read_timed_out(&self) -> bool;
}

#[cfg(test)]
pub(crate) mod mock {
    use std::collections::VecDeque;

    use super::*;

    /// Scripted connection for driving the engines deterministically.
    pub(crate) enum ReadStep {
        Data(Vec<u8>),
        WouldBlock,
        Eof,
        Error,
    }

    #[derive(Default)]
    pub(crate) struct MockIo {
        pub(crate) reads: VecDeque<ReadStep>,
        pub(crate) sent: Vec<u8>,
        pub(crate) send_limit: Option<usize>,
        pub(crate) timer: Option<Duration>,
        pub(crate) timer_armed: bool,
        pub(crate) timed_out: bool,
        pub(crate) scheduled: usize,
        pub(crate) schedule_fail: bool,
    }

    impl MockIo {
        pub(crate) fn new(reads: Vec<ReadStep>) -> Self {
            Self {
                reads: reads.into(),
                ..Self::default()
            }
        }
    }

    impl ClientIo for MockIo {
        fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop_front() {
                Some(ReadStep::Data(mut data)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    if n < data.len() {
                        data.drain(..n);
                        self.reads.push_front(ReadStep::Data(data));
                    }
                    Ok(n)
                }
                Some(ReadStep::WouldBlock) | None => Err(io::ErrorKind::WouldBlock.into()),
                Some(ReadStep::Eof) => Ok(0),
                Some(ReadStep::Error) => Err(io::ErrorKind::ConnectionReset.into()),
            }
        }

        fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = self.send_limit.unwrap_or(buf.len()).min(buf.len());
            self.sent.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn read_ready(&self) -> bool {
            !matches!(self.reads.front(), Some(ReadStep::WouldBlock) | None)
        }

        fn schedule_read(&mut self) -> io::Result<()> {
            if self.schedule_fail {
                return Err(io::ErrorKind::Other.into());
            }
            self.scheduled += 1;
            Ok(())
        }

        fn arm_read_timer(&mut self, timeout: Duration) {
            self.timer = Some(timeout);
            self.timer_armed = true;
        }

        fn cancel_read_timer(&mut self) {
            self.timer_armed = false;
        }

        fn read_timer_armed(&self) -> bool {
            self.timer_armed
        }

        fn read_timed_out(&self) -> bool {
            self.timed_out
        }
    }
}
