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
 * rs_maxicbor CBOR constants
 *
 * A fairly comprehensive deserializer for CBOR (RFC8949) with support for shared references,
 * string references and the common extension tags.
 **************************************************************************************************/

/// Additional Information bitmask
pub const AI_MASK: u8 = 0b000_11111;

/// Major Type 0 (Positive integers)
pub const MT_UINT: u8 = 0;
/// Major Type 1 (Negative integers)
pub const MT_NINT: u8 = 1;
/// Major Type 2 (Byte Strings)
pub const MT_BSTR: u8 = 2;
/// Major Type 3 (Text Strings)
pub const MT_TSTR: u8 = 3;
/// Major Type 4 (Array)
pub const MT_ARRAY: u8 = 4;
/// Major Type 5 (Map)
pub const MT_MAP: u8 = 5;
/// Major Type 6 (Tag)
pub const MT_TAG: u8 = 6;
/// Major Type 7 (Floats, simple types etc.)
pub const MT_SIMPLE: u8 = 7;

/// Maximum value of a "simple" payload mapped on AI bits
pub const PAYLOAD_AI_BITS: u8 = 23;
/// Indicates one byte of length or value information follows the MT/AI byte
pub const PAYLOAD_ONE_BYTE: u8 = 24;
/// Indicates two bytes of length or value information follow the MT/AI byte
pub const PAYLOAD_TWO_BYTES: u8 = 25;
/// Indicates four bytes of length or value information follow the MT/AI byte
pub const PAYLOAD_FOUR_BYTES: u8 = 26;
/// Indicates eight bytes of length or value information follow the MT/AI byte
pub const PAYLOAD_EIGHT_BYTES: u8 = 27;
/// Indicates an indefinite number of items or bytes follow
pub const PAYLOAD_INDEFINITE: u8 = 31;

/// The break marker terminating indefinite length items
pub const BREAK_BYTE: u8 = 0xff;

/// Tag 0: RFC3339 date/time string
pub const TAG_DATE_TIME_STRING: u64 = 0;
/// Tag 1: epoch-based date/time (integer or float seconds)
pub const TAG_EPOCH_DATE_TIME: u64 = 1;
/// Tag 2: unsigned bignum (big-endian byte string)
pub const TAG_POSITIVE_BIGNUM: u64 = 2;
/// Tag 3: negative bignum (-1 - n)
pub const TAG_NEGATIVE_BIGNUM: u64 = 3;
/// Tag 4: decimal fraction [exponent, mantissa]
pub const TAG_DECIMAL_FRACTION: u64 = 4;
/// Tag 5: bigfloat [exponent, mantissa]
pub const TAG_BIGFLOAT: u64 = 5;
/// Tag 25: reference to a previously seen string
pub const TAG_STRING_REF: u64 = 25;
/// Tag 28: mark a value as shareable
pub const TAG_SHAREABLE: u64 = 28;
/// Tag 29: reference to a previously marked shareable value
pub const TAG_SHARED_REF: u64 = 29;
/// Tag 30: rational number [numerator, denominator]
pub const TAG_RATIONAL: u64 = 30;
/// Tag 35: regular expression (PCRE/ECMA262 text)
pub const TAG_REGEXP: u64 = 35;
/// Tag 36: MIME message (headers and body)
pub const TAG_MIME: u64 = 36;
/// Tag 37: binary UUID
pub const TAG_UUID: u64 = 37;
/// Tag 256: string reference namespace
pub const TAG_STRINGREF_NAMESPACE: u64 = 256;
/// Tag 258: mathematical finite set
pub const TAG_SET: u64 = 258;
/// Tag 260: IP address (or MAC address for 6-byte payloads)
pub const TAG_IPADDRESS: u64 = 260;
/// Tag 261: IP network (one-entry map of address bytes to prefix length)
pub const TAG_IPNETWORK: u64 = 261;
/// Tag 55799: self-described CBOR
pub const TAG_SELF_DESCRIBE: u64 = 55799;

/// Default cap on decode recursion depth
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Upper bound on a single read from the byte source. Lengths are attacker
/// controlled, so buffers grow in bounded steps rather than being reserved
/// up front.
pub const READ_CHUNK: usize = 65536;
