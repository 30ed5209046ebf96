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
 * rs_maxicbor CBOR Tag semantics
 *
 * A fairly comprehensive deserializer for CBOR (RFC8949) with support for shared references,
 * string references and the common extension tags.
 **************************************************************************************************/
/// # Semantic tag dispatch
///
/// [`TagHook`] is the seam between the decoder and tag semantics: the decoder hands every tag
/// without a decoder-level interpretation to the installed hook, and the hook's return value is
/// substituted for the tag in the decoded output.
///
/// [`TagHandler`] is the default hook: a registry from tag number to constructor covering the
/// common extension tags (date/times, bignums, decimal fractions, rationals, regular
/// expressions, MIME, UUIDs, sets, IP addresses and networks, string references and the
/// self-describe envelope). Constructors receive the decoder, so they can inspect key context,
/// register shareables and re-enter decoding; user constructors registered with
/// [`TagHandler::register`] get the same powers.
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::convert::TryFrom;
use std::io::Read;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::rc::Rc;

use chrono::offset::{Offset, TimeZone};
use chrono::{DateTime, Utc};
use ipnetwork::IpNetwork;
use num_bigint::{BigInt, Sign};
use num_rational::BigRational;
use num_traits::{ToPrimitive, Zero};
use regex::Regex;
use uuid::Uuid;

#[cfg(feature = "trace")]
use func_trace::trace;

#[cfg(feature = "trace")]
func_trace::init_depth_var!();

use crate::ast::{BigFloat, CBOR, CBORTag, DecimalFraction, MimeMessage};
use crate::constants::*;
use crate::decode::CBORDecoder;
use crate::error::{CBORError, Result};

/// Interpreter for semantic tags.
///
/// `handle` receives the decoder and the already-registered tag cell whose payload has been
/// decoded. Returning `CBOR::Tag` built from the *same* cell passes the tag through
/// uninterpreted while preserving its identity for shared references. The hook must tolerate
/// re-entry: it is called during decoding and may itself drive the decoder (for example via
/// [`CBORDecoder::decode_from_bytes`]).
pub trait TagHook<'h, R> {
    /// Interpret one tag; the return value replaces the tag in the output.
    fn handle(&self, decoder: &mut CBORDecoder<'h, R>, tag: &Rc<RefCell<CBORTag>>) -> Result<CBOR>;
}

/// A constructor turning a tag payload into a decoded value.
pub type TagConstructor<'h, R> = Box<dyn Fn(&mut CBORDecoder<'h, R>, CBOR) -> Result<CBOR> + 'h>;

/// The default tag interpreter: a registry from tag number to constructor, preloaded with the
/// common extension tags. Unregistered tags pass through unchanged.
pub struct TagHandler<'h, R> {
    handlers: HashMap<u64, TagConstructor<'h, R>>,
}

impl<'h, R: Read + 'h> TagHandler<'h, R> {
    /// Construct a handler with all built-in tag constructors registered.
    pub fn new() -> TagHandler<'h, R> {
        let mut this = TagHandler {
            handlers: HashMap::new(),
        };
        this.register(TAG_DATE_TIME_STRING, |_, value| isodatetime(value));
        this.register(TAG_EPOCH_DATE_TIME, |_, value| epochdatetime(value));
        this.register(TAG_POSITIVE_BIGNUM, |_, value| positive_bignum(value));
        this.register(TAG_NEGATIVE_BIGNUM, |_, value| negative_bignum(value));
        this.register(TAG_DECIMAL_FRACTION, |_, value| decimal_fraction(value));
        this.register(TAG_BIGFLOAT, |_, value| bigfloat(value));
        this.register(TAG_STRING_REF, stringref);
        this.register(TAG_RATIONAL, |_, value| rational(value));
        this.register(TAG_REGEXP, |_, value| regexp(value));
        this.register(TAG_MIME, |_, value| mime(value));
        this.register(TAG_UUID, |_, value| uuid(value));
        this.register(TAG_SET, set);
        this.register(TAG_IPADDRESS, |_, value| ipaddress(value));
        this.register(TAG_IPNETWORK, |_, value| ipnetwork(value));
        this.register(TAG_SELF_DESCRIBE, |_, value| Ok(value));
        this
    }

    /// Register a constructor for `tag`, overriding any previous registration. Returns the
    /// handler to permit chaining.
    pub fn register<F>(&mut self, tag: u64, constructor: F) -> &mut TagHandler<'h, R>
    where
        F: Fn(&mut CBORDecoder<'h, R>, CBOR) -> Result<CBOR> + 'h,
    {
        self.handlers.insert(tag, Box::new(constructor));
        self
    }
}

impl<'h, R: Read + 'h> Default for TagHandler<'h, R> {
    fn default() -> Self {
        TagHandler::new()
    }
}

impl<'h, R: Read + 'h> TagHook<'h, R> for TagHandler<'h, R> {
    fn handle(&self, decoder: &mut CBORDecoder<'h, R>, tag: &Rc<RefCell<CBORTag>>) -> Result<CBOR> {
        let (number, payload) = {
            let t = tag.borrow();
            (t.tag, t.value.clone())
        };
        match self.handlers.get(&number) {
            None => Ok(CBOR::Tag(Rc::clone(tag))),
            Some(constructor) => constructor(decoder, payload),
        }
    }
}

/***************************************************************************************************
 * Built-in tag constructors
 **************************************************************************************************/

#[cfg_attr(feature = "trace", trace)]
fn isodatetime(value: CBOR) -> Result<CBOR> {
    // Tag 0
    let text = match &value {
        CBOR::Tstr(text) => text,
        _ => return Err(CBORError::BadDateTime),
    };
    DateTime::parse_from_rfc3339(text)
        .map(CBOR::DateTime)
        .map_err(|_| CBORError::BadDateTime)
}

#[cfg_attr(feature = "trace", trace)]
fn epochdatetime(value: CBOR) -> Result<CBOR> {
    // Tag 1
    let instant = match value {
        CBOR::Int(seconds) => {
            let seconds = i64::try_from(seconds).map_err(|_| CBORError::BadDateTime)?;
            Utc.timestamp_opt(seconds, 0)
                .single()
                .ok_or(CBORError::BadDateTime)?
        }
        CBOR::Float64(seconds) => {
            if !seconds.is_finite()
                || seconds < i64::MIN as f64
                || seconds > i64::MAX as f64
            {
                return Err(CBORError::BadDateTime);
            }
            // Microsecond resolution; converting the fraction alone avoids the precision
            // loss of a single seconds-to-nanos multiply on large timestamps
            let mut whole = seconds.floor();
            let mut micros = ((seconds - whole) * 1e6).round();
            if micros >= 1e6 {
                whole += 1.0;
                micros = 0.0;
            }
            Utc.timestamp_opt(whole as i64, micros as u32 * 1000)
                .single()
                .ok_or(CBORError::BadDateTime)?
        }
        _ => return Err(CBORError::BadDateTime),
    };
    Ok(CBOR::DateTime(instant.with_timezone(&Utc.fix())))
}

fn normalized_bignum(value: BigInt) -> CBOR {
    match value.to_i128() {
        Some(small) => CBOR::Int(small),
        None => CBOR::BigInt(value),
    }
}

#[cfg_attr(feature = "trace", trace)]
fn positive_bignum(value: CBOR) -> Result<CBOR> {
    // Tag 2
    let bytes = match &value {
        CBOR::Bstr(bytes) => bytes,
        _ => return Err(CBORError::BadTagPayload(TAG_POSITIVE_BIGNUM)),
    };
    Ok(normalized_bignum(BigInt::from_bytes_be(Sign::Plus, bytes)))
}

#[cfg_attr(feature = "trace", trace)]
fn negative_bignum(value: CBOR) -> Result<CBOR> {
    // Tag 3: -1 - n
    let bytes = match &value {
        CBOR::Bstr(bytes) => bytes,
        _ => return Err(CBORError::BadTagPayload(TAG_NEGATIVE_BIGNUM)),
    };
    let magnitude = BigInt::from_bytes_be(Sign::Plus, bytes);
    Ok(normalized_bignum(-magnitude - 1))
}

/// Unpack a two-element integer sequence, the payload shape shared by tags 4, 5 and 30.
fn integer_pair(value: &CBOR, tag: u64) -> Result<(BigInt, BigInt)> {
    let items = value
        .sequence_items()
        .ok_or(CBORError::BadTagPayload(tag))?;
    if items.len() != 2 {
        return Err(CBORError::BadTagPayload(tag));
    }
    let first = items[0]
        .big_integer()
        .ok_or(CBORError::BadTagPayload(tag))?;
    let second = items[1]
        .big_integer()
        .ok_or(CBORError::BadTagPayload(tag))?;
    Ok((first, second))
}

#[cfg_attr(feature = "trace", trace)]
fn decimal_fraction(value: CBOR) -> Result<CBOR> {
    // Tag 4: mantissa * 10^exponent
    let (exponent, mantissa) = integer_pair(&value, TAG_DECIMAL_FRACTION)?;
    let exponent = exponent
        .to_i64()
        .ok_or(CBORError::BadTagPayload(TAG_DECIMAL_FRACTION))?;
    Ok(CBOR::Decimal(DecimalFraction { exponent, mantissa }))
}

#[cfg_attr(feature = "trace", trace)]
fn bigfloat(value: CBOR) -> Result<CBOR> {
    // Tag 5: mantissa * 2^exponent
    let (exponent, mantissa) = integer_pair(&value, TAG_BIGFLOAT)?;
    let exponent = exponent
        .to_i64()
        .ok_or(CBORError::BadTagPayload(TAG_BIGFLOAT))?;
    Ok(CBOR::BigFloat(BigFloat { exponent, mantissa }))
}

fn stringref<'h, R: Read + 'h>(decoder: &mut CBORDecoder<'h, R>, value: CBOR) -> Result<CBOR> {
    // Tag 25
    let index = match value {
        CBOR::Int(i) if (0..=u64::MAX as i128).contains(&i) => i as u64,
        _ => return Err(CBORError::BadStringRefIndex),
    };
    decoder.string_reference(index)
}

#[cfg_attr(feature = "trace", trace)]
fn rational(value: CBOR) -> Result<CBOR> {
    // Tag 30
    let (numerator, denominator) = integer_pair(&value, TAG_RATIONAL)?;
    if denominator.is_zero() {
        return Err(CBORError::BadTagPayload(TAG_RATIONAL));
    }
    Ok(CBOR::Rational(BigRational::new(numerator, denominator)))
}

#[cfg_attr(feature = "trace", trace)]
fn regexp(value: CBOR) -> Result<CBOR> {
    // Tag 35
    let pattern = match &value {
        CBOR::Tstr(pattern) => pattern,
        _ => return Err(CBORError::BadRegex),
    };
    Regex::new(pattern)
        .map(CBOR::Regex)
        .map_err(|_| CBORError::BadRegex)
}

#[cfg_attr(feature = "trace", trace)]
fn mime(value: CBOR) -> Result<CBOR> {
    // Tag 36
    match value {
        CBOR::Tstr(text) => Ok(CBOR::Mime(MimeMessage::parse(&text))),
        _ => Err(CBORError::BadTagPayload(TAG_MIME)),
    }
}

#[cfg_attr(feature = "trace", trace)]
fn uuid(value: CBOR) -> Result<CBOR> {
    // Tag 37
    let bytes = match &value {
        CBOR::Bstr(bytes) => bytes,
        _ => return Err(CBORError::BadTagPayload(TAG_UUID)),
    };
    Uuid::from_slice(bytes)
        .map(CBOR::Uuid)
        .map_err(|_| CBORError::BadTagPayload(TAG_UUID))
}

fn set<'h, R: Read + 'h>(decoder: &mut CBORDecoder<'h, R>, value: CBOR) -> Result<CBOR> {
    // Tag 258. The payload was decoded in immutable context; whether the *set* must itself be
    // immutable depends on whether it sits in key position.
    let items = value
        .sequence_items()
        .ok_or(CBORError::BadTagPayload(TAG_SET))?;
    let entries: BTreeSet<CBOR> = items.into_iter().collect();
    if decoder.immutable() {
        Ok(CBOR::FrozenSet(Rc::new(entries)))
    } else {
        Ok(CBOR::Set(Rc::new(RefCell::new(entries))))
    }
}

#[cfg_attr(feature = "trace", trace)]
fn ipaddress(value: CBOR) -> Result<CBOR> {
    // Tag 260. 4 and 16 byte payloads are addresses; 6 byte payloads are MAC addresses, which
    // pass through as an uninterpreted tag.
    let bytes = match &value {
        CBOR::Bstr(bytes) => bytes,
        _ => return Err(CBORError::BadIpAddress),
    };
    match bytes.len() {
        4 => {
            let mut octets = [0u8; 4];
            octets.copy_from_slice(bytes);
            Ok(CBOR::IpAddress(IpAddr::V4(Ipv4Addr::from(octets))))
        }
        16 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(bytes);
            Ok(CBOR::IpAddress(IpAddr::V6(Ipv6Addr::from(octets))))
        }
        6 => Ok(CBOR::tagged(TAG_IPADDRESS, value.clone())),
        _ => Err(CBORError::BadIpAddress),
    }
}

#[cfg_attr(feature = "trace", trace)]
fn ipnetwork(value: CBOR) -> Result<CBOR> {
    // Tag 261: a one-entry mapping from address bytes to prefix length. Networks are built
    // non-strict: host bits in the address are preserved, not rejected.
    let entries = match &value {
        CBOR::Map(cell) => cell.borrow().clone(),
        CBOR::FrozenMap(entries) => (**entries).clone(),
        _ => return Err(CBORError::BadIpNetwork),
    };
    if entries.len() != 1 {
        return Err(CBORError::BadIpNetwork);
    }
    let (key, prefix) = entries.into_iter().next().ok_or(CBORError::BadIpNetwork)?;
    let prefix = match prefix {
        CBOR::Int(p) if (0..=128).contains(&p) => p as u8,
        _ => return Err(CBORError::BadIpNetwork),
    };
    let address = match &key {
        CBOR::Bstr(bytes) if bytes.len() == 4 => {
            let mut octets = [0u8; 4];
            octets.copy_from_slice(bytes);
            IpAddr::V4(Ipv4Addr::from(octets))
        }
        CBOR::Bstr(bytes) if bytes.len() == 16 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(bytes);
            IpAddr::V6(Ipv6Addr::from(octets))
        }
        _ => return Err(CBORError::BadIpNetwork),
    };
    IpNetwork::new(address, prefix)
        .map(CBOR::IpNetwork)
        .map_err(|_| CBORError::BadIpNetwork)
}
