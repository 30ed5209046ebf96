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
 * CBOR Abstract Syntax Tree
 *
 * A fairly comprehensive deserializer for CBOR (RFC8949) with support for shared references,
 * string references and the common extension tags.
 **************************************************************************************************/
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::convert::TryFrom;
use std::hash::{Hash, Hasher};
use std::net::IpAddr;
use std::rc::Rc;

use chrono::{DateTime, FixedOffset};
use ipnetwork::IpNetwork;
use num_bigint::BigInt;
use num_rational::BigRational;
use regex::Regex;
use uuid::Uuid;

use crate::error::CBORError;

/// The data type for decoded CBOR items.
///
/// CBOR item representations are as follows:
///
/// - Positive and negative wire integers are stored as an `i128` (`Int`); bignums which do not
///   fit are stored as a `BigInt`
/// - All floating point widths are widened to `f64` on decode
/// - The bstr and tstr types are owned buffers
/// - Arrays, maps, sets and uninterpreted tags are held behind `Rc` cells. The cell for an
///   in-progress container is registered in the shareables table before its contents are
///   decoded, which is what allows a shared reference to resolve to a value that is still
///   being constructed (cyclic graphs). Aliasing, including self-reference, is therefore
///   observable through `Rc::ptr_eq`
/// - Immutable variants (`Tuple`, `FrozenMap`, `FrozenSet`) are produced wherever a value must
///   be usable as a map key
/// - The extension tag types (date/times, big numbers, regular expressions and so on) decode
///   into dedicated variants rather than uninterpreted tags
#[derive(Debug, Clone)]
pub enum CBOR {
    /// Wire integer, in [-2^64, 2^64).
    Int(i128),
    /// Bignum (tags 2/3) too large for `Int`.
    BigInt(BigInt),
    /// Any of the three floating point widths, widened.
    Float64(f64),
    /// Byte string.
    Bstr(Vec<u8>),
    /// Text string.
    Tstr(String),
    /// Mutable sequence.
    Array(Rc<RefCell<Vec<CBOR>>>),
    /// Immutable sequence, produced in key context.
    Tuple(Rc<Vec<CBOR>>),
    /// Mutable mapping.
    Map(Rc<RefCell<BTreeMap<CBOR, CBOR>>>),
    /// Immutable mapping, produced in key context.
    FrozenMap(Rc<BTreeMap<CBOR, CBOR>>),
    /// Mutable set (tag 258).
    Set(Rc<RefCell<BTreeSet<CBOR>>>),
    /// Immutable set (tag 258 in key context).
    FrozenSet(Rc<BTreeSet<CBOR>>),
    /// An uninterpreted tagged value. The cell is mutable so that a tag can be registered as
    /// shareable before its payload has been decoded.
    Tag(Rc<RefCell<CBORTag>>),
    /// Simple value in [0,19] or [32,255].
    Simple(u8),
    /// Simple value 20.
    False,
    /// Simple value 21.
    True,
    /// Simple value 22.
    Null,
    /// Simple value 23.
    Undefined,
    /// The 0xff break sentinel. Only seen by callers when a break marker appears outside any
    /// indefinite length item.
    Break,
    /// Date/time (tags 0 and 1).
    DateTime(DateTime<FixedOffset>),
    /// Decimal fraction (tag 4).
    Decimal(DecimalFraction),
    /// Bigfloat (tag 5).
    BigFloat(BigFloat),
    /// Rational number (tag 30).
    Rational(BigRational),
    /// Compiled regular expression (tag 35).
    Regex(Regex),
    /// Parsed MIME message (tag 36).
    Mime(MimeMessage),
    /// UUID (tag 37).
    Uuid(Uuid),
    /// IP address (tag 260).
    IpAddress(IpAddr),
    /// IP network (tag 261).
    IpNetwork(IpNetwork),
}

/// A decoded but uninterpreted semantic tag: a tag number and its payload.
///
/// Equality, ordering and hashing are lexicographic over `(tag, value)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CBORTag {
    /// The tag number.
    pub tag: u64,
    /// The enclosed item.
    pub value: CBOR,
}

/// A decimal fraction (tag 4): the value `mantissa * 10^exponent`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DecimalFraction {
    /// Base-10 exponent.
    pub exponent: i64,
    /// Arbitrary precision mantissa.
    pub mantissa: BigInt,
}

/// A bigfloat (tag 5): the value `mantissa * 2^exponent`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BigFloat {
    /// Base-2 exponent.
    pub exponent: i64,
    /// Arbitrary precision mantissa.
    pub mantissa: BigInt,
}

/// A MIME message (tag 36), split into unfolded header fields and a body.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MimeMessage {
    /// Header fields in order of appearance.
    pub headers: Vec<(String, String)>,
    /// The message body.
    pub body: String,
}

impl MimeMessage {
    /// Parse RFC2822-style text into header fields and a body. Header fields end at the first
    /// empty line; folded continuation lines are joined onto the preceding field.
    pub fn parse(text: &str) -> MimeMessage {
        let text = text.replace("\r\n", "\n");
        let (head, body) = match text.find("\n\n") {
            Some(position) => (&text[..position], &text[position + 2..]),
            None => (text.as_str(), ""),
        };
        let mut headers: Vec<(String, String)> = Vec::new();
        for line in head.split('\n') {
            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some(last) = headers.last_mut() {
                    last.1.push(' ');
                    last.1.push_str(line.trim_start());
                }
            } else if let Some((name, value)) = line.split_once(':') {
                headers.push((name.trim().to_string(), value.trim().to_string()));
            }
        }
        MimeMessage {
            headers,
            body: body.to_string(),
        }
    }

    /// Look up a header field by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/***************************************************************************************************
 * Constructors and accessors
 **************************************************************************************************/

impl CBOR {
    /// Construct a mutable sequence.
    pub fn array(items: Vec<CBOR>) -> CBOR {
        CBOR::Array(Rc::new(RefCell::new(items)))
    }

    /// Construct an immutable sequence.
    pub fn tuple(items: Vec<CBOR>) -> CBOR {
        CBOR::Tuple(Rc::new(items))
    }

    /// Construct a mutable mapping.
    pub fn map(entries: BTreeMap<CBOR, CBOR>) -> CBOR {
        CBOR::Map(Rc::new(RefCell::new(entries)))
    }

    /// Construct an immutable mapping.
    pub fn frozen_map(entries: BTreeMap<CBOR, CBOR>) -> CBOR {
        CBOR::FrozenMap(Rc::new(entries))
    }

    /// Construct a mutable set.
    pub fn set(entries: BTreeSet<CBOR>) -> CBOR {
        CBOR::Set(Rc::new(RefCell::new(entries)))
    }

    /// Construct an immutable set.
    pub fn frozen_set(entries: BTreeSet<CBOR>) -> CBOR {
        CBOR::FrozenSet(Rc::new(entries))
    }

    /// Construct an uninterpreted tagged value.
    pub fn tagged(tag: u64, value: CBOR) -> CBOR {
        CBOR::Tag(Rc::new(RefCell::new(CBORTag { tag, value })))
    }

    /// True for the break sentinel.
    #[inline]
    pub fn is_break(&self) -> bool {
        matches!(self, CBOR::Break)
    }

    /// The integer value, if this item is a wire integer.
    pub fn as_int(&self) -> Option<i128> {
        match self {
            CBOR::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// The text, if this item is a tstr.
    pub fn as_tstr(&self) -> Option<&str> {
        match self {
            CBOR::Tstr(value) => Some(value),
            _ => None,
        }
    }

    /// The bytes, if this item is a bstr.
    pub fn as_bstr(&self) -> Option<&[u8]> {
        match self {
            CBOR::Bstr(value) => Some(value),
            _ => None,
        }
    }

    /// The float value, if this item is a float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CBOR::Float64(value) => Some(*value),
            _ => None,
        }
    }

    /// The shared cell, if this item is a mutable sequence.
    pub fn as_array(&self) -> Option<&Rc<RefCell<Vec<CBOR>>>> {
        match self {
            CBOR::Array(cell) => Some(cell),
            _ => None,
        }
    }

    /// The shared sequence, if this item is a tuple.
    pub fn as_tuple(&self) -> Option<&Rc<Vec<CBOR>>> {
        match self {
            CBOR::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// The shared cell, if this item is a mutable mapping.
    pub fn as_map(&self) -> Option<&Rc<RefCell<BTreeMap<CBOR, CBOR>>>> {
        match self {
            CBOR::Map(cell) => Some(cell),
            _ => None,
        }
    }

    /// The shared cell, if this item is a mutable set.
    pub fn as_set(&self) -> Option<&Rc<RefCell<BTreeSet<CBOR>>>> {
        match self {
            CBOR::Set(cell) => Some(cell),
            _ => None,
        }
    }

    /// The shared set, if this item is a frozen set.
    pub fn as_frozen_set(&self) -> Option<&Rc<BTreeSet<CBOR>>> {
        match self {
            CBOR::FrozenSet(entries) => Some(entries),
            _ => None,
        }
    }

    /// The shared cell, if this item is an uninterpreted tag.
    pub fn as_tag(&self) -> Option<&Rc<RefCell<CBORTag>>> {
        match self {
            CBOR::Tag(cell) => Some(cell),
            _ => None,
        }
    }

    /// The elements of a sequence (mutable or immutable), cloned out of the cell.
    pub fn sequence_items(&self) -> Option<Vec<CBOR>> {
        match self {
            CBOR::Array(cell) => Some(cell.borrow().clone()),
            CBOR::Tuple(items) => Some((**items).clone()),
            _ => None,
        }
    }

    /// The integer value widened to a `BigInt`, if this item is any kind of integer.
    pub fn big_integer(&self) -> Option<BigInt> {
        match self {
            CBOR::Int(value) => Some(BigInt::from(*value)),
            CBOR::BigInt(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Total order rank of the variant, used as the major sort key.
    fn rank(&self) -> u8 {
        match self {
            CBOR::Int(_) => 0,
            CBOR::BigInt(_) => 1,
            CBOR::Float64(_) => 2,
            CBOR::Bstr(_) => 3,
            CBOR::Tstr(_) => 4,
            CBOR::Array(_) => 5,
            CBOR::Tuple(_) => 6,
            CBOR::Map(_) => 7,
            CBOR::FrozenMap(_) => 8,
            CBOR::Set(_) => 9,
            CBOR::FrozenSet(_) => 10,
            CBOR::Tag(_) => 11,
            CBOR::Simple(_) => 12,
            CBOR::False => 13,
            CBOR::True => 14,
            CBOR::Null => 15,
            CBOR::Undefined => 16,
            CBOR::Break => 17,
            CBOR::DateTime(_) => 18,
            CBOR::Decimal(_) => 19,
            CBOR::BigFloat(_) => 20,
            CBOR::Rational(_) => 21,
            CBOR::Regex(_) => 22,
            CBOR::Mime(_) => 23,
            CBOR::Uuid(_) => 24,
            CBOR::IpAddress(_) => 25,
            CBOR::IpNetwork(_) => 26,
        }
    }
}

/***************************************************************************************************
 * Equality, ordering and hashing
 *
 * Keys of decoded maps live in BTreeMap/BTreeSet, so every item carries a total order: variant
 * rank first, then payload. Floats order by total_cmp. Shared cells short-circuit on pointer
 * identity before structural comparison; comparing two *distinct* cyclic graphs diverges, the
 * same way it does in reference implementations that hash or compare cyclic structures.
 **************************************************************************************************/

impl Ord for CBOR {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (CBOR::Int(a), CBOR::Int(b)) => a.cmp(b),
            (CBOR::BigInt(a), CBOR::BigInt(b)) => a.cmp(b),
            (CBOR::Float64(a), CBOR::Float64(b)) => a.total_cmp(b),
            (CBOR::Bstr(a), CBOR::Bstr(b)) => a.cmp(b),
            (CBOR::Tstr(a), CBOR::Tstr(b)) => a.cmp(b),
            (CBOR::Array(a), CBOR::Array(b)) => {
                if Rc::ptr_eq(a, b) {
                    Ordering::Equal
                } else {
                    a.borrow().cmp(&*b.borrow())
                }
            }
            (CBOR::Tuple(a), CBOR::Tuple(b)) => {
                if Rc::ptr_eq(a, b) {
                    Ordering::Equal
                } else {
                    a.cmp(b)
                }
            }
            (CBOR::Map(a), CBOR::Map(b)) => {
                if Rc::ptr_eq(a, b) {
                    Ordering::Equal
                } else {
                    a.borrow().cmp(&*b.borrow())
                }
            }
            (CBOR::FrozenMap(a), CBOR::FrozenMap(b)) => {
                if Rc::ptr_eq(a, b) {
                    Ordering::Equal
                } else {
                    a.cmp(b)
                }
            }
            (CBOR::Set(a), CBOR::Set(b)) => {
                if Rc::ptr_eq(a, b) {
                    Ordering::Equal
                } else {
                    a.borrow().cmp(&*b.borrow())
                }
            }
            (CBOR::FrozenSet(a), CBOR::FrozenSet(b)) => {
                if Rc::ptr_eq(a, b) {
                    Ordering::Equal
                } else {
                    a.cmp(b)
                }
            }
            (CBOR::Tag(a), CBOR::Tag(b)) => {
                if Rc::ptr_eq(a, b) {
                    Ordering::Equal
                } else {
                    a.borrow().cmp(&*b.borrow())
                }
            }
            (CBOR::Simple(a), CBOR::Simple(b)) => a.cmp(b),
            (CBOR::DateTime(a), CBOR::DateTime(b)) => a.cmp(b),
            (CBOR::Decimal(a), CBOR::Decimal(b)) => a.cmp(b),
            (CBOR::BigFloat(a), CBOR::BigFloat(b)) => a.cmp(b),
            (CBOR::Rational(a), CBOR::Rational(b)) => a.cmp(b),
            (CBOR::Regex(a), CBOR::Regex(b)) => a.as_str().cmp(b.as_str()),
            (CBOR::Mime(a), CBOR::Mime(b)) => a.cmp(b),
            (CBOR::Uuid(a), CBOR::Uuid(b)) => a.cmp(b),
            (CBOR::IpAddress(a), CBOR::IpAddress(b)) => a.cmp(b),
            (CBOR::IpNetwork(a), CBOR::IpNetwork(b)) => {
                (a.ip(), a.prefix()).cmp(&(b.ip(), b.prefix()))
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for CBOR {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for CBOR {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CBOR {}

impl Hash for CBOR {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            CBOR::Int(value) => value.hash(state),
            CBOR::BigInt(value) => value.hash(state),
            CBOR::Float64(value) => value.to_bits().hash(state),
            CBOR::Bstr(value) => value.hash(state),
            CBOR::Tstr(value) => value.hash(state),
            CBOR::Array(cell) => cell.borrow().hash(state),
            CBOR::Tuple(items) => items.hash(state),
            CBOR::Map(cell) => cell.borrow().hash(state),
            CBOR::FrozenMap(entries) => entries.hash(state),
            CBOR::Set(cell) => cell.borrow().hash(state),
            CBOR::FrozenSet(entries) => entries.hash(state),
            CBOR::Tag(cell) => cell.borrow().hash(state),
            CBOR::Simple(value) => value.hash(state),
            CBOR::False | CBOR::True | CBOR::Null | CBOR::Undefined | CBOR::Break => {}
            CBOR::DateTime(value) => value.hash(state),
            CBOR::Decimal(value) => value.hash(state),
            CBOR::BigFloat(value) => value.hash(state),
            CBOR::Rational(value) => value.hash(state),
            CBOR::Regex(value) => value.as_str().hash(state),
            CBOR::Mime(value) => value.hash(state),
            CBOR::Uuid(value) => value.hash(state),
            CBOR::IpAddress(value) => value.hash(state),
            CBOR::IpNetwork(value) => {
                value.ip().hash(state);
                value.prefix().hash(state);
            }
        }
    }
}

/***************************************************************************************************
 * Standard Trait Implementations: From value to CBOR. Always succeeds
 **************************************************************************************************/

/// Convert a bool into CBOR
impl From<bool> for CBOR {
    #[inline(always)]
    fn from(v: bool) -> Self {
        if v {
            Self::True
        } else {
            Self::False
        }
    }
}

macro_rules! from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for CBOR {
                #[inline(always)]
                fn from(v: $t) -> Self {
                    Self::Int(v as i128)
                }
            }
        )*
    };
}

from_integer!(u8, u16, u32, u64, i8, i16, i32, i64, i128);

/// Convert a str reference into CBOR
impl From<&str> for CBOR {
    #[inline(always)]
    fn from(v: &str) -> Self {
        Self::Tstr(v.to_string())
    }
}

/// Convert a String into CBOR
impl From<String> for CBOR {
    #[inline(always)]
    fn from(v: String) -> Self {
        Self::Tstr(v)
    }
}

/// Convert a byte slice into CBOR
impl From<&[u8]> for CBOR {
    #[inline(always)]
    fn from(v: &[u8]) -> Self {
        Self::Bstr(v.to_vec())
    }
}

/// Convert a byte vector into CBOR
impl From<Vec<u8>> for CBOR {
    #[inline(always)]
    fn from(v: Vec<u8>) -> Self {
        Self::Bstr(v)
    }
}

/// Convert an f64 into CBOR
impl From<f64> for CBOR {
    #[inline(always)]
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

/***************************************************************************************************
 * Standard Trait Implementations: From CBOR to value. May fail
 **************************************************************************************************/

impl TryFrom<CBOR> for i128 {
    type Error = CBORError;

    fn try_from(value: CBOR) -> Result<Self, Self::Error> {
        match value {
            CBOR::Int(v) => Ok(v),
            _ => Err(CBORError::IncompatibleType),
        }
    }
}

impl TryFrom<CBOR> for u64 {
    type Error = CBORError;

    fn try_from(value: CBOR) -> Result<Self, Self::Error> {
        match value {
            CBOR::Int(v) => u64::try_from(v).map_err(|_| CBORError::OutOfRange),
            _ => Err(CBORError::IncompatibleType),
        }
    }
}

impl TryFrom<CBOR> for i64 {
    type Error = CBORError;

    fn try_from(value: CBOR) -> Result<Self, Self::Error> {
        match value {
            CBOR::Int(v) => i64::try_from(v).map_err(|_| CBORError::OutOfRange),
            _ => Err(CBORError::IncompatibleType),
        }
    }
}

impl TryFrom<CBOR> for bool {
    type Error = CBORError;

    fn try_from(value: CBOR) -> Result<Self, Self::Error> {
        match value {
            CBOR::True => Ok(true),
            CBOR::False => Ok(false),
            _ => Err(CBORError::IncompatibleType),
        }
    }
}

impl TryFrom<CBOR> for String {
    type Error = CBORError;

    fn try_from(value: CBOR) -> Result<Self, Self::Error> {
        match value {
            CBOR::Tstr(v) => Ok(v),
            _ => Err(CBORError::IncompatibleType),
        }
    }
}

impl TryFrom<CBOR> for Vec<u8> {
    type Error = CBORError;

    fn try_from(value: CBOR) -> Result<Self, Self::Error> {
        match value {
            CBOR::Bstr(v) => Ok(v),
            _ => Err(CBORError::IncompatibleType),
        }
    }
}

impl TryFrom<CBOR> for f64 {
    type Error = CBORError;

    fn try_from(value: CBOR) -> Result<Self, Self::Error> {
        match value {
            CBOR::Float64(v) => Ok(v),
            _ => Err(CBORError::IncompatibleType),
        }
    }
}
