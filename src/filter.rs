use http::StatusCode;
use tracing::error;

use crate::error::Error;

/// Lowest numeric return treated as a special response a filter may request.
const SPECIAL_RESPONSE: u16 = 300;

/// Head of the input body filter chain.
///
/// The engine invokes the head with every freshly acquired slice, in strict
/// byte order of arrival. Each body byte is observed exactly once.
pub trait InputBodyFilter {
    fn input(&mut self, slice: &[u8]) -> FilterStatus;
}

/// Return value of an input body filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterStatus {
    /// Slice consumed. Keep reading.
    Ok,
    /// Filter is not ready. Propagated to the caller as asynchronous
    /// continuation.
    Again,
    /// Numeric status. Codes below 300 other than `Ok`/`Again` are filter
    /// misuse and demote to 500; codes of 300 and above are surfaced as is.
    Code(u16),
}

/// Filter pass-through with no transformation. Installed by default.
pub struct NoopFilter;

impl InputBodyFilter for NoopFilter {
    fn input(&mut self, _: &[u8]) -> FilterStatus {
        FilterStatus::Ok
    }
}

pub(crate) enum Filtered {
    Ok,
    Again,
}

/// Run the filter head over a slice and apply the single return translation
/// rule of the engine.
pub(crate) fn run(filter: &mut dyn InputBodyFilter, slice: &[u8]) -> Result<Filtered, Error> {
    match filter.input(slice) {
        FilterStatus::Ok => Ok(Filtered::Ok),
        FilterStatus::Again => Ok(Filtered::Again),
        FilterStatus::Code(code) if code >= SPECIAL_RESPONSE => match StatusCode::from_u16(code) {
            Ok(code) => Err(Error::from_status(code)),
            Err(_) => Err(Error::Internal),
        },
        FilterStatus::Code(_) => {
            error!(
                target: "h1_body",
                "input filter: return code 1xx or 2xx will cause trouble and is converted to 500"
            );
            Err(Error::Internal)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Fixed(FilterStatus);

    impl InputBodyFilter for Fixed {
        fn input(&mut self, _: &[u8]) -> FilterStatus {
            self.0
        }
    }

    #[test]
    fn ok_and_again_pass_through() {
        assert!(matches!(run(&mut Fixed(FilterStatus::Ok), b"x"), Ok(Filtered::Ok)));
        assert!(matches!(run(&mut Fixed(FilterStatus::Again), b"x"), Ok(Filtered::Again)));
    }

    #[test]
    fn low_codes_demote_to_internal() {
        for code in [100, 101, 200, 204, 299] {
            match run(&mut Fixed(FilterStatus::Code(code)), b"x") {
                Err(Error::Internal) => {}
                other => panic!("code {} produced {:?}", code, other.err()),
            }
        }
    }

    #[test]
    fn special_codes_surface() {
        match run(&mut Fixed(FilterStatus::Code(403)), b"x") {
            Err(Error::Status(code)) => assert_eq!(code, StatusCode::FORBIDDEN),
            other => panic!("unexpected {:?}", other.err()),
        }
        match run(&mut Fixed(FilterStatus::Code(302)), b"x") {
            Err(Error::Status(code)) => assert_eq!(code.as_u16(), 302),
            other => panic!("unexpected {:?}", other.err()),
        }
    }

    #[test]
    fn invalid_numeric_demotes() {
        assert!(matches!(run(&mut Fixed(FilterStatus::Code(1000)), b"x"), Err(Error::Internal)));
    }
}
