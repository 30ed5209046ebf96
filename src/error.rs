/***************************************************************************************************
 * Copyright (c) 2020-2023 Qualcomm Innovation Center, Inc. All rights reserved.
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy of this software
 * and associated documentation files (the “Software”), to deal in the Software without
 * restriction, including without limitation the rights to use, copy, modify, merge, publish,
 * distribute, sublicense, and/or sell copies of the Software, and to permit persons to whom the
 * Software is furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice (including the next
 * paragraph) shall be included in all copies or substantial portions of the
 * Software.
 *
 * THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING
 * BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
 * NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
 * DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.
 **************************************************************************************************/
/***************************************************************************************************
 * rs_maxicbor CBOR Error API
 *
 * A fairly comprehensive deserializer for CBOR (RFC8949) with support for shared references,
 * string references and the common extension tags.
 **************************************************************************************************/
use std::result;

use thiserror::Error;

/// An alias for Result<T, CBORError> used throughout this crate.
pub type Result<T> = result::Result<T, CBORError>;

/// `CBORError` provides information about errors decoding CBOR items.
///
/// Errors fall into three groups: end-of-stream errors (`EndOfStream`, `Io`), malformed or
/// semantically invalid input, and construction-time misuse (`BadStrErrors`).
#[derive(Error, Debug)]
pub enum CBORError {
    /// The byte source ran out before a complete item could be read.
    #[error("premature end of stream (expected to read {expected} bytes, got {actual} instead)")]
    EndOfStream {
        /// Number of bytes that were required.
        expected: usize,
        /// Number of bytes actually obtained.
        actual: usize,
    },
    /// The underlying byte source failed.
    #[error("read error: {0}")]
    Io(#[from] std::io::Error),
    /// An Additional Information encoding that does not describe an unsigned integer argument.
    #[error("unknown unsigned integer subtype 0x{0:x}")]
    UnknownSubtype(u8),
    /// Major type 7 subtypes 28, 29 and 30 are reserved by RFC8949.
    #[error("Undefined Reserved major type 7 subtype 0x{0:x}")]
    ReservedSubtype(u8),
    /// A declared length exceeds the host-addressable maximum.
    #[error("invalid length for {kind} 0x{length:x}")]
    LengthOverflow {
        /// The kind of item whose length overflowed.
        kind: &'static str,
        /// The declared length.
        length: u64,
    },
    /// An indefinite-length byte string contained a chunk of another major type.
    #[error("non-bytestring found in indefinite length bytestring")]
    NonBytestringChunk,
    /// An indefinite-length text string contained a chunk of another major type.
    #[error("non-string found in indefinite length string")]
    NonStringChunk,
    /// A tstr input contains an invalid UTF8 sequence.
    #[error("a text string contains an invalid UTF8 sequence")]
    UTF8Error,
    /// Simple values 0..=31 must use the one byte encoding.
    #[error("invalid simple value {0}")]
    BadSimpleValue(u8),
    /// A shared reference points past the end of the shareables table.
    #[error("shared reference {0} not found")]
    SharedRefNotFound(u64),
    /// A shared reference points at a slot whose value has not been decoded yet.
    #[error("shared value {0} has not been initialized")]
    SharedRefUninitialized(u64),
    /// The payload of a shared reference was not an unsigned integer.
    #[error("shared reference index is not an unsigned integer")]
    BadSharedIndex,
    /// A string reference was encountered with no enclosing namespace.
    #[error("string reference outside of namespace")]
    StringRefOutsideNamespace,
    /// A string reference points past the end of the active namespace.
    #[error("string reference {0} not found")]
    StringRefNotFound(u64),
    /// The payload of a string reference was not an unsigned integer.
    #[error("string reference index is not an unsigned integer")]
    BadStringRefIndex,
    /// The payload of a built-in tag did not have the required shape.
    #[error("Incorrect tag {0} payload")]
    BadTagPayload(u64),
    /// The provided value is not a legal Date/Time.
    #[error("Bad Date/Time value")]
    BadDateTime,
    /// The payload of an IP address tag was not 4, 6 or 16 bytes.
    #[error("invalid ipaddress value")]
    BadIpAddress,
    /// The payload of an IP network tag was not a one-entry address-to-prefix mapping.
    #[error("invalid ipnetwork value")]
    BadIpNetwork,
    /// The payload of a regular expression tag did not compile.
    #[error("invalid regular expression payload")]
    BadRegex,
    /// Nesting exceeded the configured recursion cap.
    #[error("maximum nesting depth {0} exceeded")]
    DepthExceeded(usize),
    /// An unrecognized UTF-8 error policy was supplied at construction.
    #[error("invalid str_errors value {0:?} (must be one of 'strict', 'error', or 'replace')")]
    BadStrErrors(String),
    /// Attempt to convert an item to an incompatible type.
    #[error("attempt to convert an item of incompatible type")]
    IncompatibleType,
    /// A number conversion has overflowed or underflowed.
    #[error("overflow or underflow in number conversion")]
    OutOfRange,
}
