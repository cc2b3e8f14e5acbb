//! Status codes returned by the remote billing service.

use strum::{Display, FromRepr};

/// Status code carried by synchronous acknowledgments and by asynchronous
/// response-code pushes.
///
/// The wire value is the discriminant. Codes this library does not recognize
/// decode to [`ResponseCode::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromRepr)]
#[repr(i64)]
pub enum ResponseCode {
    /// The request was accepted.
    Ok = 0,
    /// The user canceled the operation.
    UserCanceled = 1,
    /// The billing service is temporarily unavailable.
    ServiceUnavailable = 2,
    /// Billing is not available for this caller.
    BillingUnavailable = 3,
    /// The requested item does not exist.
    ItemUnavailable = 4,
    /// The request was malformed or the caller is misconfigured.
    DeveloperError = 5,
    /// Generic failure; also the fallback for unrecognized codes.
    Error = 6,
}

impl ResponseCode {
    /// Decodes a raw wire code, mapping unrecognized values to [`Self::Error`].
    #[must_use]
    pub fn from_code(code: i64) -> Self {
        Self::from_repr(code).unwrap_or(Self::Error)
    }

    /// Returns the wire value of this code.
    #[must_use]
    pub const fn code(self) -> i64 {
        self as i64
    }

    /// Returns true when `code` is the OK sentinel.
    #[must_use]
    pub const fn is_ok_code(code: i64) -> bool {
        code == Self::Ok as i64
    }
}
