//! Body acquisition: staging buffers, the spill file, the read engine and
//! the discard engine.

pub mod chain;
pub mod spill;

pub(crate) mod discard;
pub(crate) mod expect;
pub(crate) mod ingress;

pub use self::discard::discard_request_body;
pub use self::ingress::read_client_request_body;

use crate::request::Request;

use self::chain::Chain;
use self::spill::SpillFile;

/// Completion callback receiving the request once the body chain is
/// populated.
pub type PostHandler<Io> = Box<dyn FnOnce(&mut Request<Io>)>;

/// Result of an engine invocation that may suspend.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The operation ran to completion.
    Done,
    /// Asynchronous continuation: the read handler re-enters on readiness or
    /// timeout. The caller must not invoke the completion callback.
    Again,
}

/// Body state owned by the request context. Created at most once per
/// request.
pub struct RequestBody<Io> {
    /// Segments exposed to downstream code.
    pub(crate) chain: Chain,
    /// Chain index of the buffer the read engine is filling.
    pub(crate) active: usize,
    /// Body bytes still owed from the socket.
    pub(crate) rest: u64,
    /// Chain index the next spill flush starts at.
    pub(crate) to_write: usize,
    pub(crate) spill: Option<SpillFile>,
    pub(crate) post_handler: Option<PostHandler<Io>>,
}

impl<Io> RequestBody<Io> {
    pub(crate) fn new() -> Self {
        Self {
            chain: Chain::new(),
            active: 0,
            rest: 0,
            to_write: 0,
            spill: None,
            post_handler: None,
        }
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn rest(&self) -> u64 {
        self.rest
    }

    pub fn spill(&self) -> Option<&SpillFile> {
        self.spill.as_ref()
    }
}
