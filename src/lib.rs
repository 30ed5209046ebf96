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
 * rs_maxicbor module definition
 *
 * A fairly comprehensive deserializer for CBOR (RFC8949) with support for shared references,
 * string references and the common extension tags.
 **************************************************************************************************/

#![warn(missing_docs)]

//! # RS_MAXICBOR
//!
//! The `rs_maxicbor` crate provides a streaming CBOR decoder for std targets. It is the
//! heap-backed sibling of `tps_minicbor`: where the embedded variant parses in place over a
//! borrowed byte slice, this crate materializes owned value trees, which is what makes the
//! reference-oriented extension tags workable:
//!
//! - **Shared references** (tags 28/29), including cyclic and aliased object graphs. A value
//!   can contain itself; identity is preserved and observable through `Rc::ptr_eq`.
//! - **String references** (tags 25/256), resolving compact back-references to previously
//!   decoded text and byte strings within a namespace scope.
//! - **Numeric extensions**: bignums (2/3), decimal fractions (4), bigfloats (5) and rationals
//!   (30), backed by arbitrary precision integers.
//! - **Date/times** (0/1) via `chrono`, regular expressions (35), MIME messages (36), UUIDs
//!   (37), sets (258), IP addresses (260) and networks (261), and the self-describe envelope
//!   (55799).
//!
//! Tag interpretation is pluggable: the built-in [`decoder::TagHandler`] may be extended,
//! overridden per tag, or replaced wholesale with any [`decoder::TagHook`], and an object hook
//! can intercept every decoded mapping. Decoding is value-at-a-time from any
//! [`std::io::Read`] source; all three IEEE 754 float widths decode (widened to `f64`),
//! indefinite-length strings and containers are supported, and map keys decode into immutable,
//! ordered shapes so they can key the decoded mappings.
//!
//! ## Example
//!
//! ```
//! use rs_maxicbor::decoder::CBORDecoder;
//! use rs_maxicbor::error::CBORError;
//! use rs_maxicbor::types::CBOR;
//!
//! fn main() -> Result<(), CBORError> {
//!     // {"a": 1, "b": [2, 3]}
//!     let input: &[u8] = &[
//!         0xa2, 0x61, 0x61, 0x01, 0x61, 0x62, 0x82, 0x02, 0x03,
//!     ];
//!     let mut decoder = CBORDecoder::from_slice(input);
//!     let value = decoder.decode()?;
//!
//!     if let CBOR::Map(entries) = &value {
//!         let entries = entries.borrow();
//!         assert_eq!(entries.get(&CBOR::from("a")), Some(&CBOR::Int(1)));
//!     } else {
//!         panic!("expected a map");
//!     }
//!     assert_eq!(format!("{}", value), r#"{"a": 1, "b": [2, 3]}"#);
//!     Ok(())
//! }
//! ```
//!
//! ## Decoding a cyclic graph
//!
//! ```
//! use std::rc::Rc;
//! use rs_maxicbor::decoder::CBORDecoder;
//! use rs_maxicbor::error::CBORError;
//! use rs_maxicbor::types::CBOR;
//!
//! fn main() -> Result<(), CBORError> {
//!     // 28([29(0)]): an array whose only element is the array itself
//!     let input: &[u8] = &[0xd8, 0x1c, 0x81, 0xd8, 0x1d, 0x00];
//!     let value = CBORDecoder::from_slice(input).decode()?;
//!     if let CBOR::Array(cell) = &value {
//!         if let CBOR::Array(first) = &cell.borrow()[0] {
//!             assert!(Rc::ptr_eq(cell, first));
//!         } else {
//!             panic!("expected the inner element to be an array");
//!         }
//!     } else {
//!         panic!("expected an array");
//!     }
//!     Ok(())
//! }
//! ```

pub(crate) mod ast;
mod cbor_diag;
pub(crate) mod decode;
pub(crate) mod tag;

/// The `constants` module exports the major type numbers, additional information encodings and
/// well-known tag numbers used on the wire.
pub mod constants;

/// The `error` module contains error definitions used throughout `rs_maxicbor`.
pub mod error;

/// The `types` module exports the main [`types::CBOR`] structure which represents a single
/// decoded CBOR item, together with the carrier types for the extension tags.
pub mod types {
    pub use super::ast::{BigFloat, CBORTag, DecimalFraction, MimeMessage, CBOR};
}

/// The `decoder` module exports [`decoder::CBORDecoder`] and the tag dispatch machinery.
pub mod decoder {
    pub use super::decode::{CBORDecoder, ObjectHook, StrErrors};
    pub use super::tag::{TagConstructor, TagHandler, TagHook};
}
