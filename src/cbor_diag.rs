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
/// # diag - CBOR diagnostic style output for decoded values
///
/// CBOR diagnostic notation is defined in RFC8949 section 8. A recap of the format:
///
/// - `<tag> ( <data> )` is used to denote tags.
/// - uint, int and float types are formatted in their natural programming language formats.
/// - Infinity, -Infinity and NaN are written as you might expect.
/// - true, false, null and undefined mean what you would expect.
/// - Text strings are written "as a string" in double quotes.
/// - Byte strings are written as h'0123456789abcdef'.
///
/// The implementation here renders through `Display`, so any decoded item can be dumped with
/// `format!("{}", item)`. Decoded graphs may contain cycles, so the formatter tracks the cells
/// on the current rendering path and prints `...` when it meets one again.
use std::fmt::{self, Display, Formatter, Write as _};
use std::rc::Rc;

use crate::ast::CBOR;

impl Display for CBOR {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut on_path: Vec<*const ()> = Vec::new();
        diag_item(self, f, &mut on_path)
    }
}

/// Pointer used for cycle detection: the address of the shared cell, if the item has one.
fn cell_address(item: &CBOR) -> Option<*const ()> {
    match item {
        CBOR::Array(cell) => Some(Rc::as_ptr(cell) as *const ()),
        CBOR::Map(cell) => Some(Rc::as_ptr(cell) as *const ()),
        CBOR::Set(cell) => Some(Rc::as_ptr(cell) as *const ()),
        CBOR::Tag(cell) => Some(Rc::as_ptr(cell) as *const ()),
        CBOR::Tuple(items) => Some(Rc::as_ptr(items) as *const ()),
        CBOR::FrozenMap(entries) => Some(Rc::as_ptr(entries) as *const ()),
        CBOR::FrozenSet(entries) => Some(Rc::as_ptr(entries) as *const ()),
        _ => None,
    }
}

fn diag_item(item: &CBOR, f: &mut Formatter<'_>, on_path: &mut Vec<*const ()>) -> fmt::Result {
    if let Some(address) = cell_address(item) {
        if on_path.contains(&address) {
            return write!(f, "...");
        }
        on_path.push(address);
        let result = diag_cell(item, f, on_path);
        on_path.pop();
        return result;
    }
    diag_scalar(item, f)
}

fn diag_cell(item: &CBOR, f: &mut Formatter<'_>, on_path: &mut Vec<*const ()>) -> fmt::Result {
    match item {
        CBOR::Array(cell) => diag_sequence(&cell.borrow(), f, on_path),
        CBOR::Tuple(items) => diag_sequence(items, f, on_path),
        CBOR::Map(cell) => {
            diag_entries(cell.borrow().iter().map(|(k, v)| (k.clone(), v.clone())), f, on_path)
        }
        CBOR::FrozenMap(entries) => {
            diag_entries(entries.iter().map(|(k, v)| (k.clone(), v.clone())), f, on_path)
        }
        CBOR::Set(cell) => {
            write!(f, "258(")?;
            diag_sequence(&cell.borrow().iter().cloned().collect::<Vec<_>>(), f, on_path)?;
            write!(f, ")")
        }
        CBOR::FrozenSet(entries) => {
            write!(f, "258(")?;
            diag_sequence(&entries.iter().cloned().collect::<Vec<_>>(), f, on_path)?;
            write!(f, ")")
        }
        CBOR::Tag(cell) => {
            let tag = cell.borrow();
            write!(f, "{}(", tag.tag)?;
            diag_item(&tag.value, f, on_path)?;
            write!(f, ")")
        }
        _ => diag_scalar(item, f),
    }
}

fn diag_sequence(items: &[CBOR], f: &mut Formatter<'_>, on_path: &mut Vec<*const ()>) -> fmt::Result {
    write!(f, "[")?;
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            write!(f, ", ")?;
        }
        diag_item(item, f, on_path)?;
    }
    write!(f, "]")
}

fn diag_entries<I>(entries: I, f: &mut Formatter<'_>, on_path: &mut Vec<*const ()>) -> fmt::Result
where
    I: Iterator<Item = (CBOR, CBOR)>,
{
    write!(f, "{{")?;
    for (index, (key, value)) in entries.enumerate() {
        if index > 0 {
            write!(f, ", ")?;
        }
        diag_item(&key, f, on_path)?;
        write!(f, ": ")?;
        diag_item(&value, f, on_path)?;
    }
    write!(f, "}}")
}

fn diag_scalar(item: &CBOR, f: &mut Formatter<'_>) -> fmt::Result {
    match item {
        CBOR::Int(value) => write!(f, "{}", value),
        CBOR::BigInt(value) => write!(f, "{}", value),
        CBOR::Float64(value) => diag_float(*value, f),
        CBOR::Bstr(bytes) => diag_bstr(bytes, f),
        CBOR::Tstr(text) => diag_tstr(text, f),
        CBOR::Simple(value) => write!(f, "simple({})", value),
        CBOR::False => write!(f, "false"),
        CBOR::True => write!(f, "true"),
        CBOR::Null => write!(f, "null"),
        CBOR::Undefined => write!(f, "undefined"),
        CBOR::Break => write!(f, "break"),
        CBOR::DateTime(value) => write!(f, "0(\"{}\")", value.to_rfc3339()),
        CBOR::Decimal(value) => write!(f, "4([{}, {}])", value.exponent, value.mantissa),
        CBOR::BigFloat(value) => write!(f, "5([{}, {}])", value.exponent, value.mantissa),
        CBOR::Rational(value) => write!(f, "30([{}, {}])", value.numer(), value.denom()),
        CBOR::Regex(value) => diag_quoted_with_tag(35, value.as_str(), f),
        CBOR::Mime(value) => write!(f, "36(<{} header(s), {} body bytes>)", value.headers.len(), value.body.len()),
        CBOR::Uuid(value) => {
            write!(f, "37(h'")?;
            for byte in value.as_bytes() {
                write!(f, "{:02x}", byte)?;
            }
            write!(f, "')")
        }
        CBOR::IpAddress(value) => write!(f, "260(\"{}\")", value),
        CBOR::IpNetwork(value) => write!(f, "261(\"{}/{}\")", value.ip(), value.prefix()),
        // Cells are handled by diag_cell
        _ => Ok(()),
    }
}

fn diag_float(value: f64, f: &mut Formatter<'_>) -> fmt::Result {
    if value.is_nan() {
        write!(f, "NaN")
    } else if value == f64::INFINITY {
        write!(f, "Infinity")
    } else if value == f64::NEG_INFINITY {
        write!(f, "-Infinity")
    } else {
        write!(f, "{:?}", value)
    }
}

fn diag_bstr(bytes: &[u8], f: &mut Formatter<'_>) -> fmt::Result {
    write!(f, "h'")?;
    for byte in bytes {
        write!(f, "{:02x}", byte)?;
    }
    write!(f, "'")
}

fn diag_tstr(text: &str, f: &mut Formatter<'_>) -> fmt::Result {
    f.write_char('"')?;
    for c in text.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            other => f.write_char(other)?,
        }
    }
    f.write_char('"')
}

fn diag_quoted_with_tag(tag: u64, text: &str, f: &mut Formatter<'_>) -> fmt::Result {
    write!(f, "{}(", tag)?;
    diag_tstr(text, f)?;
    write!(f, ")")
}
