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
 * CBOR Decoder
 *
 * A fairly comprehensive deserializer for CBOR (RFC8949) with support for shared references,
 * string references and the common extension tags. This implementation materializes owned value
 * trees, which is what allows it to resolve aliased and cyclic graphs while decoding.
 **************************************************************************************************/
/// # Streaming CBOR decoding
///
/// This module contains [`CBORDecoder`], a value-at-a-time consumer of the CBOR byte grammar.
/// The decoder pulls bytes from any [`std::io::Read`] source and hands back one fully
/// materialized [`CBOR`] item per call to [`CBORDecoder::decode`].
///
/// Alongside the eight major types the decoder maintains two side tables: a *shareables* table
/// resolving tag 28/29 references (including references to values still under construction,
/// which is how cyclic graphs decode), and a *string reference namespace* resolving tag 25
/// back-references within a tag 256 scope. Semantic tags are dispatched to a pluggable
/// [`TagHook`].
///
/// ## Example
///
/// ```
/// use rs_maxicbor::decoder::CBORDecoder;
/// use rs_maxicbor::error::CBORError;
/// use rs_maxicbor::types::CBOR;
///
/// fn main() -> Result<(), CBORError> {
///     let mut decoder = CBORDecoder::from_slice(&[0x83, 0x01, 0x02, 0x18, 0x18]);
///     let value = decoder.decode()?;
///     assert_eq!(
///         value,
///         CBOR::array(vec![CBOR::Int(1), CBOR::Int(2), CBOR::Int(24)])
///     );
///     Ok(())
/// }
/// ```
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::io::{Cursor, ErrorKind, Read};
use std::rc::Rc;
use std::str::FromStr;

use half::f16;

use crate::ast::{CBOR, CBORTag};
use crate::constants::*;
use crate::error::{CBORError, Result};
use crate::tag::{TagHandler, TagHook};

/// Policy for handling invalid UTF-8 in text string payloads.
///
/// `Strict` and `Error` both reject malformed sequences; `Replace` substitutes U+FFFD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrErrors {
    /// Reject malformed UTF-8.
    Strict,
    /// Reject malformed UTF-8 (alias kept for compatibility with the codec naming).
    Error,
    /// Substitute U+FFFD for malformed sequences.
    Replace,
}

impl FromStr for StrErrors {
    type Err = CBORError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "strict" => Ok(StrErrors::Strict),
            "error" => Ok(StrErrors::Error),
            "replace" => Ok(StrErrors::Replace),
            other => Err(CBORError::BadStrErrors(other.to_string())),
        }
    }
}

/// Hook applied to every completed mapping before any immutable coercion. The return value is
/// substituted for the mapping in the decoded output; if the mapping occupies a key position
/// the hook is responsible for returning something usable as a key.
pub type ObjectHook<'h, R> = Rc<dyn Fn(&mut CBORDecoder<'h, R>, CBOR) -> Result<CBOR> + 'h>;

/// A streaming decoder over a byte source.
///
/// The decoder owns the shareables table, the string reference namespace and the per-recursion
/// context flags for the duration of its lifetime; consecutive calls to [`decode`] on the same
/// instance therefore share one reference registry, which is what
/// [`decode_from_bytes`] relies on.
///
/// A decoder is single threaded and must not be reused after an error: the position of the
/// underlying byte source is unknown at that point.
///
/// [`decode`]: CBORDecoder::decode
/// [`decode_from_bytes`]: CBORDecoder::decode_from_bytes
pub struct CBORDecoder<'h, R> {
    reader: R,
    /// Byte-buffer overlays installed by `decode_from_bytes`, innermost last.
    overlays: Vec<Cursor<Vec<u8>>>,
    tag_hook: Rc<dyn TagHook<R> + 'h>,
    object_hook: Option<ObjectHook<'h, R>>,
    str_errors: StrErrors,
    disable_builtin_tags: bool,
    max_depth: usize,
    depth: usize,
    immutable: bool,
    share_index: Option<usize>,
    shareables: Vec<Option<CBOR>>,
    stringref_namespace: Option<Vec<CBOR>>,
}

impl<'h, 'buf: 'h> CBORDecoder<'h, &'buf [u8]> {
    /// Construct a decoder over a byte slice.
    pub fn from_slice(buf: &'buf [u8]) -> CBORDecoder<'h, &'buf [u8]> {
        CBORDecoder::new(buf)
    }
}

impl<'h, R: Read + 'h> CBORDecoder<'h, R> {
    /// Construct a decoder over a byte source with the default built-in tag handler, strict
    /// UTF-8 handling and the default recursion cap.
    pub fn new(reader: R) -> CBORDecoder<'h, R> {
        CBORDecoder {
            reader,
            overlays: Vec::new(),
            tag_hook: Rc::new(TagHandler::new()),
            object_hook: None,
            str_errors: StrErrors::Strict,
            disable_builtin_tags: false,
            max_depth: DEFAULT_MAX_DEPTH,
            depth: 0,
            immutable: false,
            share_index: None,
            shareables: Vec::new(),
            stringref_namespace: None,
        }
    }

    /// Replace the tag handler. The handler is consulted for every semantic tag without a
    /// decoder-level interpretation (and for *every* tag when built-in tags are disabled).
    pub fn with_tag_hook(mut self, hook: Rc<dyn TagHook<R> + 'h>) -> CBORDecoder<'h, R> {
        self.tag_hook = hook;
        self
    }

    /// Install a hook applied to every completed mapping.
    pub fn with_object_hook(mut self, hook: ObjectHook<'h, R>) -> CBORDecoder<'h, R> {
        self.object_hook = Some(hook);
        self
    }

    /// Set the UTF-8 error policy for text string payloads.
    pub fn with_str_errors(mut self, str_errors: StrErrors) -> CBORDecoder<'h, R> {
        self.str_errors = str_errors;
        self
    }

    /// When set, tags 28, 29 and 256 lose their decoder-level interpretation and are passed to
    /// the tag handler like any other tag. Shared references and string references no longer
    /// resolve.
    pub fn with_disable_builtin_tags(mut self, disable: bool) -> CBORDecoder<'h, R> {
        self.disable_builtin_tags = disable;
        self
    }

    /// Set the cap on decode recursion depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> CBORDecoder<'h, R> {
        self.max_depth = max_depth;
        self
    }

    /// True while decoding a position whose result must be usable as a map key. Tag and object
    /// hooks should consult this before returning a mutable container.
    pub fn immutable(&self) -> bool {
        self.immutable
    }

    /*
     * Byte source plumbing
     */

    fn source_read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        loop {
            let result = match self.overlays.last_mut() {
                Some(cursor) => cursor.read(buf),
                None => self.reader.read(buf),
            };
            match result {
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }

    /// Read exactly `amount` bytes from the byte source.
    ///
    /// Reads are performed in bounded chunks so a hostile declared length cannot force a huge
    /// up-front allocation. A short read fails with an end-of-stream error carrying the
    /// expected and actual counts.
    pub fn read(&mut self, amount: usize) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        while data.len() < amount {
            let want = (amount - data.len()).min(READ_CHUNK);
            let start = data.len();
            data.resize(start + want, 0);
            let got = self.source_read(&mut data[start..])?;
            data.truncate(start + got);
            if got == 0 {
                return Err(CBORError::EndOfStream {
                    expected: amount,
                    actual: data.len(),
                });
            }
        }
        Ok(data)
    }

    fn read_fixed<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        let mut filled = 0;
        while filled < N {
            let got = self.source_read(&mut buf[filled..])?;
            if got == 0 {
                return Err(CBORError::EndOfStream {
                    expected: N,
                    actual: filled,
                });
            }
            filled += got;
        }
        Ok(buf)
    }

    /*
     * Shareables and string references
     */

    /// Set the shareable value for the last encountered shareable marker, if any. If there is
    /// no outstanding marker this does nothing. Returns the value to permit chaining.
    ///
    /// Tag handlers that construct their own container may call this to make the container
    /// visible to shared references inside a payload they decode re-entrantly.
    pub fn set_shareable(&mut self, value: CBOR) -> CBOR {
        if let Some(index) = self.share_index {
            self.shareables[index] = Some(value.clone());
        }
        value
    }

    /// Record a definite-length string in the active namespace when it is long enough to be
    /// worth referencing. The threshold grows with the namespace because the reference itself
    /// grows: an index under 24 encodes in two bytes, so only strings of three or more bytes
    /// are included, and so on up the length brackets.
    fn stringref_namespace_add(&mut self, string: &CBOR, length: u64) {
        if let Some(namespace) = self.stringref_namespace.as_mut() {
            let next_index = namespace.len() as u64;
            let is_referenced = if next_index < 24 {
                length >= 3
            } else if next_index < 256 {
                length >= 4
            } else if next_index < 65536 {
                length >= 5
            } else if next_index < 4294967296 {
                length >= 7
            } else {
                length >= 11
            };
            if is_referenced {
                namespace.push(string.clone());
            }
        }
    }

    /// Resolve a string reference in the innermost active namespace.
    pub(crate) fn string_reference(&self, index: u64) -> Result<CBOR> {
        match self.stringref_namespace.as_ref() {
            None => Err(CBORError::StringRefOutsideNamespace),
            Some(namespace) => usize::try_from(index)
                .ok()
                .and_then(|i| namespace.get(i))
                .cloned()
                .ok_or(CBORError::StringRefNotFound(index)),
        }
    }

    /*
     * Decode entry points
     */

    /// Decode the next value from the stream.
    pub fn decode(&mut self) -> Result<CBOR> {
        self.decode_item()
    }

    /// Redirect the byte source to `buf` for one decode, then restore it.
    ///
    /// This is intended for use from a tag handler that needs to decode an embedded payload
    /// separately from the rest of the stream while still sharing the ambient shareables table
    /// and string reference namespace. Calls may nest.
    pub fn decode_from_bytes(&mut self, buf: &[u8]) -> Result<CBOR> {
        self.overlays.push(Cursor::new(buf.to_vec()));
        let result = self.decode_item();
        self.overlays.pop();
        result
    }

    fn decode_item(&mut self) -> Result<CBOR> {
        if self.depth >= self.max_depth {
            return Err(CBORError::DepthExceeded(self.max_depth));
        }
        self.depth += 1;
        let result = self.decode_major();
        self.depth -= 1;
        result
    }

    /// Decode one item with the context flags adjusted, restoring them on every exit path.
    fn decode_with(&mut self, immutable: bool, unshared: bool) -> Result<CBOR> {
        let old_immutable = self.immutable;
        let old_index = self.share_index;
        if immutable {
            self.immutable = true;
        }
        if unshared {
            self.share_index = None;
        }
        let result = self.decode_item();
        self.immutable = old_immutable;
        self.share_index = old_index;
        result
    }

    fn decode_major(&mut self) -> Result<CBOR> {
        let initial_byte = self.read_fixed::<1>()?[0];
        let major_type = initial_byte >> 5;
        let subtype = initial_byte & AI_MASK;
        match major_type {
            MT_UINT => self.decode_uint(subtype),
            MT_NINT => self.decode_negint(subtype),
            MT_BSTR => self.decode_bytestring(subtype),
            MT_TSTR => self.decode_string(subtype),
            MT_ARRAY => self.decode_array(subtype),
            MT_MAP => self.decode_map(subtype),
            MT_TAG => self.decode_semantic(subtype),
            _ => self.decode_special(subtype),
        }
    }

    /*
     * Heads
     */

    /// Resolve the argument of an initial byte: an unsigned integer of 0/1/2/4/8 bytes, or
    /// `None` for the indefinite length marker where the caller permits it.
    fn decode_length(&mut self, subtype: u8, allow_indefinite: bool) -> Result<Option<u64>> {
        match subtype {
            0..=PAYLOAD_AI_BITS => Ok(Some(subtype as u64)),
            PAYLOAD_ONE_BYTE => Ok(Some(self.read_fixed::<1>()?[0] as u64)),
            PAYLOAD_TWO_BYTES => Ok(Some(u16::from_be_bytes(self.read_fixed()?) as u64)),
            PAYLOAD_FOUR_BYTES => Ok(Some(u32::from_be_bytes(self.read_fixed()?) as u64)),
            PAYLOAD_EIGHT_BYTES => Ok(Some(u64::from_be_bytes(self.read_fixed()?))),
            PAYLOAD_INDEFINITE if allow_indefinite => Ok(None),
            _ => Err(CBORError::UnknownSubtype(subtype)),
        }
    }

    fn decode_length_finite(&mut self, subtype: u8) -> Result<u64> {
        match self.decode_length(subtype, false)? {
            Some(length) => Ok(length),
            None => Err(CBORError::UnknownSubtype(subtype)),
        }
    }

    /// Reject declared lengths beyond the host-addressable maximum.
    fn checked_len(length: u64, kind: &'static str) -> Result<usize> {
        if length > isize::MAX as u64 {
            Err(CBORError::LengthOverflow { kind, length })
        } else {
            Ok(length as usize)
        }
    }

    /*
     * Major types 0..=5
     */

    fn decode_uint(&mut self, subtype: u8) -> Result<CBOR> {
        // Major type 0
        let value = self.decode_length_finite(subtype)?;
        Ok(self.set_shareable(CBOR::Int(value as i128)))
    }

    fn decode_negint(&mut self, subtype: u8) -> Result<CBOR> {
        // Major type 1
        let value = self.decode_length_finite(subtype)?;
        Ok(self.set_shareable(CBOR::Int(-1 - (value as i128))))
    }

    fn decode_bytestring(&mut self, subtype: u8) -> Result<CBOR> {
        // Major type 2
        let result = match self.decode_length(subtype, true)? {
            None => {
                // Indefinite length: a sequence of definite bstr chunks up to the break marker
                let mut buf: Vec<u8> = Vec::new();
                loop {
                    let initial_byte = self.read_fixed::<1>()?[0];
                    if initial_byte == BREAK_BYTE {
                        break;
                    } else if initial_byte >> 5 == MT_BSTR {
                        let length = self.decode_length_finite(initial_byte & AI_MASK)?;
                        let length = Self::checked_len(length, "indefinite bytestring chunk")?;
                        buf.extend_from_slice(&self.read(length)?);
                    } else {
                        return Err(CBORError::NonBytestringChunk);
                    }
                }
                CBOR::Bstr(buf)
            }
            Some(length) => {
                let length = Self::checked_len(length, "bytestring")?;
                let value = CBOR::Bstr(self.read(length)?);
                self.stringref_namespace_add(&value, length as u64);
                value
            }
        };
        Ok(self.set_shareable(result))
    }

    fn decode_string(&mut self, subtype: u8) -> Result<CBOR> {
        // Major type 3.
        //
        // Indefinite text strings are not routed through the bytestring path: RFC8949 s3.2.3
        // requires every chunk to be a well-formed text string in its own right (a UTF-8 code
        // point must not straddle a chunk boundary), so each chunk is decoded separately.
        let result = match self.decode_length(subtype, true)? {
            None => {
                let mut buf = String::new();
                loop {
                    let initial_byte = self.read_fixed::<1>()?[0];
                    if initial_byte == BREAK_BYTE {
                        break;
                    } else if initial_byte >> 5 == MT_TSTR {
                        let length = self.decode_length_finite(initial_byte & AI_MASK)?;
                        let length = Self::checked_len(length, "indefinite string chunk")?;
                        let bytes = self.read(length)?;
                        buf.push_str(&self.decode_utf8(bytes)?);
                    } else {
                        return Err(CBORError::NonStringChunk);
                    }
                }
                CBOR::Tstr(buf)
            }
            Some(length) => {
                let length = Self::checked_len(length, "string")?;
                let bytes = self.read(length)?;
                let value = CBOR::Tstr(self.decode_utf8(bytes)?);
                self.stringref_namespace_add(&value, length as u64);
                value
            }
        };
        Ok(self.set_shareable(result))
    }

    fn decode_utf8(&self, bytes: Vec<u8>) -> Result<String> {
        match self.str_errors {
            StrErrors::Strict | StrErrors::Error => {
                String::from_utf8(bytes).map_err(|_| CBORError::UTF8Error)
            }
            StrErrors::Replace => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        }
    }

    fn decode_array(&mut self, subtype: u8) -> Result<CBOR> {
        // Major type 4.
        //
        // The empty container is registered as shareable *before* its elements are decoded so
        // that a shared reference inside an element resolves to the container itself. In key
        // context the result must be immutable, so registration is deferred to the completed
        // tuple. Elements inherit the ambient context flags.
        let length = self.decode_length(subtype, true)?;
        if let Some(length) = length {
            Self::checked_len(length, "array")?;
        }
        let items: Rc<RefCell<Vec<CBOR>>> = Rc::new(RefCell::new(Vec::new()));
        if !self.immutable {
            self.set_shareable(CBOR::Array(Rc::clone(&items)));
        }
        match length {
            None => loop {
                let value = self.decode_item()?;
                if value.is_break() {
                    break;
                }
                items.borrow_mut().push(value);
            },
            Some(length) => {
                for _ in 0..length {
                    let value = self.decode_item()?;
                    items.borrow_mut().push(value);
                }
            }
        }
        if self.immutable {
            let tuple = CBOR::Tuple(Rc::new(items.take()));
            Ok(self.set_shareable(tuple))
        } else {
            Ok(CBOR::Array(items))
        }
    }

    fn decode_map(&mut self, subtype: u8) -> Result<CBOR> {
        // Major type 5.
        //
        // Keys decode in immutable context; keys and values both decode unshared so that a
        // shareable marker inside either binds to that sub-value rather than to the mapping.
        let length = self.decode_length(subtype, true)?;
        let entries: Rc<RefCell<BTreeMap<CBOR, CBOR>>> = Rc::new(RefCell::new(BTreeMap::new()));
        self.set_shareable(CBOR::Map(Rc::clone(&entries)));
        match length {
            None => loop {
                let key = self.decode_with(true, true)?;
                if key.is_break() {
                    break;
                }
                let value = self.decode_with(false, true)?;
                entries.borrow_mut().insert(key, value);
            },
            Some(length) => {
                for _ in 0..length {
                    let key = self.decode_with(true, true)?;
                    let value = self.decode_with(false, true)?;
                    entries.borrow_mut().insert(key, value);
                }
            }
        }
        if let Some(hook) = self.object_hook.clone() {
            let object = (hook.as_ref())(self, CBOR::Map(Rc::clone(&entries)))?;
            Ok(self.set_shareable(object))
        } else if self.immutable {
            let frozen = CBOR::FrozenMap(Rc::new(entries.borrow().clone()));
            Ok(self.set_shareable(frozen))
        } else {
            Ok(CBOR::Map(entries))
        }
    }

    /*
     * Major type 6
     */

    fn decode_semantic(&mut self, subtype: u8) -> Result<CBOR> {
        let tagnum = self.decode_length_finite(subtype)?;
        // Tags 28, 29 and 256 modify the decoder itself rather than wrapping a value
        if !self.disable_builtin_tags {
            match tagnum {
                TAG_SHAREABLE => {
                    // Reserve the slot before the payload is decoded; the payload fills it via
                    // set_shareable, so references to it resolve even mid-construction.
                    let old_index = self.share_index;
                    self.share_index = Some(self.shareables.len());
                    self.shareables.push(None);
                    let result = self.decode_item();
                    self.share_index = old_index;
                    return result;
                }
                TAG_SHARED_REF => {
                    let index = match self.decode_with(false, true)? {
                        CBOR::Int(i) if (0..=u64::MAX as i128).contains(&i) => i as u64,
                        _ => return Err(CBORError::BadSharedIndex),
                    };
                    let slot = usize::try_from(index)
                        .ok()
                        .and_then(|i| self.shareables.get(i));
                    return match slot {
                        None => Err(CBORError::SharedRefNotFound(index)),
                        Some(None) => Err(CBORError::SharedRefUninitialized(index)),
                        Some(Some(shared)) => Ok(shared.clone()),
                    };
                }
                TAG_STRINGREF_NAMESPACE => {
                    let old_namespace = self.stringref_namespace.replace(Vec::new());
                    let result = self.decode_with(false, true);
                    self.stringref_namespace = old_namespace;
                    return result;
                }
                _ => {}
            }
        }
        // All other tags: register the tag cell before decoding the payload, then assign the
        // payload into the cell so that a tag can reference itself through tag 28/29.
        let cell = Rc::new(RefCell::new(CBORTag {
            tag: tagnum,
            value: CBOR::Null,
        }));
        self.set_shareable(CBOR::Tag(Rc::clone(&cell)));
        // Set contents may end up used as keys, so tag 258 payloads always decode immutably
        let immutable = self.immutable || tagnum == TAG_SET;
        let payload = self.decode_with(immutable, true)?;
        cell.borrow_mut().value = payload;
        let hook = Rc::clone(&self.tag_hook);
        let value = hook.handle(self, &cell)?;
        Ok(self.set_shareable(value))
    }

    /*
     * Major type 7
     */

    fn decode_special(&mut self, subtype: u8) -> Result<CBOR> {
        match subtype {
            0..=19 => Ok(CBOR::Simple(subtype)),
            20 => Ok(CBOR::False),
            21 => Ok(CBOR::True),
            22 => Ok(CBOR::Null),
            23 => Ok(CBOR::Undefined),
            24 => {
                let value = self.read_fixed::<1>()?[0];
                if value < 32 {
                    Err(CBORError::BadSimpleValue(value))
                } else {
                    Ok(CBOR::Simple(value))
                }
            }
            25 => {
                let value = f16::from_be_bytes(self.read_fixed()?);
                Ok(self.set_shareable(CBOR::Float64(value.to_f64())))
            }
            26 => {
                let value = f32::from_be_bytes(self.read_fixed()?);
                Ok(self.set_shareable(CBOR::Float64(value as f64)))
            }
            27 => {
                let value = f64::from_be_bytes(self.read_fixed()?);
                Ok(self.set_shareable(CBOR::Float64(value)))
            }
            PAYLOAD_INDEFINITE => Ok(CBOR::Break),
            _ => Err(CBORError::ReservedSubtype(subtype)),
        }
    }
}
