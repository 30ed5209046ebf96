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
 * Semantic tag test cases: the built-in extension tags, immutable key coercion, and the
 * pluggable tag and object hooks.
 **************************************************************************************************/

extern crate rs_maxicbor;

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use std::rc::Rc;

use chrono::DateTime;
use ipnetwork::IpNetwork;
use num_bigint::{BigInt, Sign};
use num_rational::BigRational;
use uuid::Uuid;

use rs_maxicbor::decoder::{CBORDecoder, TagHandler, TagHook};
use rs_maxicbor::error::{CBORError, Result};
use rs_maxicbor::types::{BigFloat, CBORTag, DecimalFraction, CBOR};

fn decode_hex(payload: &str) -> Result<CBOR> {
    let bytes = hex::decode(payload).expect("valid hex fixture");
    CBORDecoder::from_slice(&bytes).decode()
}

fn decoded(payload: &str) -> CBOR {
    decode_hex(payload).expect("fixture should decode")
}

fn decode_error(payload: &str) -> CBORError {
    decode_hex(payload).expect_err("fixture should fail to decode")
}

fn rfc3339(text: &str) -> CBOR {
    CBOR::DateTime(DateTime::parse_from_rfc3339(text).expect("valid fixture date"))
}

/***************************************************************************************************
 * Tags 0 and 1: date/times
 **************************************************************************************************/

#[test]
fn datetime_from_text() {
    let cases: &[(&str, &str)] = &[
        (
            "c074323031332d30332d32315432303a30343a30305a",
            "2013-03-21T20:04:00Z",
        ),
        (
            "c0781b323031332d30332d32315432303a30343a30302e3338303834315a",
            "2013-03-21T20:04:00.380841Z",
        ),
        (
            "c07819323031332d30332d32315432323a30343a30302b30323a3030",
            "2013-03-21T22:04:00+02:00",
        ),
    ];
    for (payload, expected) in cases {
        assert_eq!(decoded(payload), rfc3339(expected));
    }
}

#[test]
fn datetime_from_epoch() {
    assert_eq!(decoded("c11a514b67b0"), rfc3339("2013-03-21T20:04:00Z"));
    // Instants compare across offsets
    assert_eq!(
        decoded("c11a514b67b0"),
        rfc3339("2013-03-21T22:04:00+02:00")
    );
    // Fractional epoch seconds keep microsecond resolution
    assert_eq!(
        decoded("c1fb41d452d9ec200000"),
        rfc3339("2013-03-21T20:04:00.500Z")
    );
}

#[test]
fn bad_datetime_payloads() {
    // "0000-123-01"
    let err = decode_error("c06b303030302d3132332d3031");
    assert_eq!(err.to_string(), "Bad Date/Time value");
    // Tag 0 requires text
    assert!(matches!(decode_error("c001"), CBORError::BadDateTime));
    // Tag 1 requires a number
    assert!(matches!(
        decode_error("c16161"),
        CBORError::BadDateTime
    ));
}

/***************************************************************************************************
 * Tags 2 and 3: bignums
 **************************************************************************************************/

#[test]
fn positive_bignum() {
    assert_eq!(
        decoded("c249010000000000000000"),
        CBOR::Int(18446744073709551616)
    );
}

#[test]
fn negative_bignum() {
    assert_eq!(
        decoded("c349010000000000000000"),
        CBOR::Int(-18446744073709551617)
    );
}

#[test]
fn oversized_bignum_stays_big() {
    // 2^128 does not fit the inline integer representation
    let payload = "c2510100000000000000000000000000000000";
    let expected = BigInt::from(1u8) << 128;
    assert_eq!(decoded(payload), CBOR::BigInt(expected));
}

/***************************************************************************************************
 * Tags 4, 5 and 30: decimal fractions, bigfloats, rationals
 **************************************************************************************************/

#[test]
fn decimal_fraction() {
    assert_eq!(
        decoded("c48221196ab3"),
        CBOR::Decimal(DecimalFraction {
            exponent: -2,
            mantissa: BigInt::from(27315),
        })
    );
}

#[test]
fn decimal_fraction_with_bignum_mantissa() {
    let mantissa_bytes = hex::decode("011f1fe37d0c70ff50456ba8b891997b07d6").unwrap();
    assert_eq!(
        decoded("c482384dc252011f1fe37d0c70ff50456ba8b891997b07d6"),
        CBOR::Decimal(DecimalFraction {
            exponent: -78,
            mantissa: BigInt::from_bytes_be(Sign::Plus, &mantissa_bytes),
        })
    );
}

#[test]
fn bigfloat() {
    assert_eq!(
        decoded("c5822003"),
        CBOR::BigFloat(BigFloat {
            exponent: -1,
            mantissa: BigInt::from(3),
        })
    );
}

#[test]
fn rational() {
    assert_eq!(
        decoded("d81e820205"),
        CBOR::Rational(BigRational::new(BigInt::from(2), BigInt::from(5)))
    );
}

#[test]
fn malformed_number_payloads() {
    assert_eq!(decode_error("c400").to_string(), "Incorrect tag 4 payload");
    assert_eq!(decode_error("c500").to_string(), "Incorrect tag 5 payload");
    // One element instead of two
    assert_eq!(
        decode_error("d81e81196ab3").to_string(),
        "Incorrect tag 30 payload"
    );
    // Zero denominator
    assert_eq!(
        decode_error("d81e820200").to_string(),
        "Incorrect tag 30 payload"
    );
}

/***************************************************************************************************
 * Tags 35, 36 and 37: regular expressions, MIME, UUIDs
 **************************************************************************************************/

#[test]
fn regular_expression() {
    let value = decoded("d8236d68656c6c6f2028776f726c6429");
    match &value {
        CBOR::Regex(regex) => {
            assert_eq!(regex.as_str(), "hello (world)");
            assert!(regex.is_match("well hello (world)... hello world"));
        }
        other => panic!("expected a regex, got {:?}", other),
    }
    assert_eq!(value, decoded("d8236d68656c6c6f2028776f726c6429"));
}

#[test]
fn mime_message() {
    let value = decoded(
        "d824787b436f6e74656e742d547970653a20746578742f706c61696e3b20636861727365743d2269736f2d38\
         3835392d3135220a4d494d452d56657273696f6e3a20312e300a436f6e74656e742d5472616e736665722d45\
         6e636f64696e673a2071756f7465642d7072696e7461626c650a0a48656c6c6f203d413475726f",
    );
    match &value {
        CBOR::Mime(message) => {
            assert_eq!(message.body, "Hello =A4uro");
            assert_eq!(
                message.header("content-type"),
                Some("text/plain; charset=\"iso-8859-15\"")
            );
            assert_eq!(message.header("MIME-Version"), Some("1.0"));
        }
        other => panic!("expected a MIME message, got {:?}", other),
    }
}

#[test]
fn uuid() {
    assert_eq!(
        decoded("d825505eaffac8b51e480581277fdcc7842faf"),
        CBOR::Uuid(Uuid::parse_str("5eaffac8b51e480581277fdcc7842faf").unwrap())
    );
    // Wrong payload length
    assert_eq!(
        decode_error("d825430102ff").to_string(),
        "Incorrect tag 37 payload"
    );
}

/***************************************************************************************************
 * Tags 260 and 261: IP addresses and networks
 **************************************************************************************************/

#[test]
fn ip_addresses() {
    assert_eq!(
        decoded("d9010444c00a0a01"),
        CBOR::IpAddress("192.10.10.1".parse::<IpAddr>().unwrap())
    );
    assert_eq!(
        decoded("d901045020010db885a3000000008a2e03707334"),
        CBOR::IpAddress("2001:db8:85a3::8a2e:370:7334".parse::<IpAddr>().unwrap())
    );
}

#[test]
fn mac_address_passes_through() {
    let value = decoded("d9010446010203040506");
    assert_eq!(
        value,
        CBOR::tagged(260, CBOR::Bstr(vec![1, 2, 3, 4, 5, 6]))
    );
}

#[test]
fn bad_ip_address_payloads() {
    assert_eq!(
        decode_error("d9010443c00a0a").to_string(),
        "invalid ipaddress value"
    );
    assert_eq!(decode_error("d9010401").to_string(), "invalid ipaddress value");
}

#[test]
fn ip_networks() {
    assert_eq!(
        decoded("d90105a144c0a800641818"),
        CBOR::IpNetwork(IpNetwork::new("192.168.0.100".parse().unwrap(), 24).unwrap())
    );
    assert_eq!(
        decoded("d90105a15020010db885a3000000008a2e000000001860"),
        CBOR::IpNetwork(
            IpNetwork::new("2001:db8:85a3::8a2e:0:0".parse().unwrap(), 96).unwrap()
        )
    );
}

#[test]
fn bad_ip_network_payloads() {
    // Two entries
    assert_eq!(
        decode_error("d90105a244c0a80064181844c0a800001818").to_string(),
        "invalid ipnetwork value"
    );
    // Prefix is not an integer
    assert_eq!(
        decode_error("d90105a144c0a80064420102").to_string(),
        "invalid ipnetwork value"
    );
}

/***************************************************************************************************
 * Tag 258: sets, and immutable key coercion
 **************************************************************************************************/

fn int_set(values: &[i128]) -> BTreeSet<CBOR> {
    values.iter().map(|v| CBOR::Int(*v)).collect()
}

#[test]
fn set_decodes_mutable_at_top_level() {
    let value = decoded("d9010283616361626161");
    let expected: BTreeSet<CBOR> = ["a", "b", "c"].iter().map(|s| CBOR::from(*s)).collect();
    assert!(matches!(value, CBOR::Set(_)));
    assert_eq!(value, CBOR::set(expected));
}

#[test]
fn set_in_key_position_freezes() {
    let mut expected = BTreeMap::new();
    expected.insert(CBOR::frozen_set(int_set(&[1, 2, 3])), CBOR::Int(4));
    assert_eq!(decoded("a1d901028301020304"), CBOR::map(expected));
}

#[test]
fn set_of_frozen_sets() {
    let mut entries = BTreeSet::new();
    entries.insert(CBOR::frozen_set(int_set(&[1, 2])));
    entries.insert(CBOR::frozen_set(int_set(&[3, 4])));
    let value = decoded("d9010282d90102820102d90102820304");
    assert!(matches!(value, CBOR::Set(_)));
    assert_eq!(value, CBOR::set(entries));
}

#[test]
fn streamed_set() {
    assert_eq!(decoded("d901029f010203ff"), CBOR::set(int_set(&[1, 2, 3])));
}

#[test]
fn sequence_key_becomes_tuple() {
    let mut expected = BTreeMap::new();
    expected.insert(CBOR::tuple(vec![CBOR::Int(1), CBOR::Int(2)]), CBOR::Int(3));
    assert_eq!(decoded("a182010203"), CBOR::map(expected));
}

#[test]
fn map_key_becomes_frozen() {
    let mut inner = BTreeMap::new();
    inner.insert(CBOR::from("a"), CBOR::from("b"));
    let mut expected = BTreeMap::new();
    expected.insert(CBOR::frozen_map(inner), CBOR::from("c"));
    assert_eq!(decoded("a1a1616161626163"), CBOR::map(expected));
}

#[test]
fn nested_keys_freeze_transitively() {
    // {{{1: 1}: {"nested": true}}: {"nested": false}}
    let mut innermost = BTreeMap::new();
    innermost.insert(CBOR::Int(1), CBOR::Int(1));
    let mut nested_true = BTreeMap::new();
    nested_true.insert(CBOR::from("nested"), CBOR::True);
    let mut key = BTreeMap::new();
    key.insert(
        CBOR::frozen_map(innermost),
        CBOR::frozen_map(nested_true),
    );
    let mut nested_false = BTreeMap::new();
    nested_false.insert(CBOR::from("nested"), CBOR::False);
    let mut expected = BTreeMap::new();
    // The value position is not a key, so the inner mapping there stays mutable
    expected.insert(CBOR::frozen_map(key), CBOR::map(nested_false));
    assert_eq!(
        decoded("a1a1a10101a1666e6573746564f5a1666e6573746564f4"),
        CBOR::map(expected)
    );
}

#[test]
fn streamed_string_key() {
    let mut expected = BTreeMap::new();
    expected.insert(CBOR::from("streaming"), CBOR::Int(1));
    assert_eq!(decoded("a17f657374726561646d696e67ff01"), CBOR::map(expected));
}

#[test]
fn tagged_key_with_tuple_payload() {
    let mut expected = BTreeMap::new();
    expected.insert(
        CBOR::tagged(6000, CBOR::tuple(vec![CBOR::Int(1), CBOR::Int(2)])),
        CBOR::Int(1),
    );
    assert_eq!(decoded("a1d9177082010201"), CBOR::map(expected));
}

/***************************************************************************************************
 * Tag 55799: self-describe
 **************************************************************************************************/

#[test]
fn self_describe_passthrough() {
    assert_eq!(decoded("d9d9f71903e8"), CBOR::Int(1000));
    assert_eq!(
        decoded("d9d9f7c249010000000000000000"),
        CBOR::Int(18446744073709551616)
    );
}

/***************************************************************************************************
 * Hooks
 **************************************************************************************************/

#[test]
fn unhandled_tag_passes_through() {
    assert_eq!(
        decoded("d917706548656c6c6f"),
        CBOR::tagged(6000, CBOR::from("Hello"))
    );
}

#[test]
fn registered_handler_overrides_a_tag() {
    let mut handler = TagHandler::new();
    handler.register(6000, |_decoder: &mut CBORDecoder<&[u8]>, value| match value {
        CBOR::Tstr(text) => Ok(CBOR::Tstr(text.chars().rev().collect())),
        other => Ok(other),
    });
    let bytes = hex::decode("d917706548656c6c6f").unwrap();
    let value = CBORDecoder::from_slice(&bytes)
        .with_tag_hook(Rc::new(handler))
        .decode()
        .unwrap();
    assert_eq!(value, CBOR::from("olleH"));
}

#[test]
fn replacement_hook_sees_every_tag() {
    struct EchoHook;

    impl<'buf> TagHook<&'buf [u8]> for EchoHook {
        fn handle(
            &self,
            _decoder: &mut CBORDecoder<&'buf [u8]>,
            tag: &Rc<RefCell<CBORTag>>,
        ) -> Result<CBOR> {
            let tag = tag.borrow();
            Ok(CBOR::array(vec![CBOR::from(tag.tag), tag.value.clone()]))
        }
    }

    // 1("not a timestamp") no longer decodes as an epoch instant
    let bytes = hex::decode("c16f6e6f7420612074696d657374616d70").unwrap();
    let value = CBORDecoder::from_slice(&bytes)
        .with_tag_hook(Rc::new(EchoHook))
        .decode()
        .unwrap();
    assert_eq!(
        value,
        CBOR::array(vec![CBOR::Int(1), CBOR::from("not a timestamp")])
    );
}

#[test]
fn handler_can_decode_cyclic_custom_payloads() {
    // 28(3000(bytes(28(3000(bytes(29(0))))))): a custom wrapper that contains itself.
    // The handler registers its replacement cell before re-entering the decoder, so the
    // innermost shared reference resolves to the outermost wrapper.
    let mut handler = TagHandler::new();
    handler.register(3000, |decoder: &mut CBORDecoder<&[u8]>, value| {
        let bytes = match &value {
            CBOR::Bstr(bytes) => bytes.clone(),
            _ => return Err(CBORError::IncompatibleType),
        };
        let cell = Rc::new(RefCell::new(CBORTag {
            tag: 3000,
            value: CBOR::Null,
        }));
        decoder.set_shareable(CBOR::Tag(Rc::clone(&cell)));
        let inner = decoder.decode_from_bytes(&bytes)?;
        cell.borrow_mut().value = inner;
        Ok(CBOR::Tag(cell))
    });

    let bytes = hex::decode("d81cd90bb849d81cd90bb843d81d00").unwrap();
    let value = CBORDecoder::from_slice(&bytes)
        .with_tag_hook(Rc::new(handler))
        .decode()
        .unwrap();

    let outer = value.as_tag().expect("expected the custom wrapper");
    let middle = outer.borrow().value.clone();
    let middle = middle.as_tag().expect("expected the nested wrapper");
    let innermost = middle.borrow().value.clone();
    let innermost = innermost.as_tag().expect("expected the cyclic reference");
    assert!(Rc::ptr_eq(outer, innermost));
}

#[test]
fn object_hook_wraps_every_mapping() {
    let bytes = hex::decode("a2616103616205").unwrap();
    let value = CBORDecoder::from_slice(&bytes)
        .with_object_hook(Rc::new(|_decoder: &mut CBORDecoder<&[u8]>, mapping| {
            Ok(CBOR::tagged(49999, mapping))
        }))
        .decode()
        .unwrap();

    let cell = value.as_tag().expect("expected the wrapper tag");
    assert_eq!(cell.borrow().tag, 49999);
    let mut expected = BTreeMap::new();
    expected.insert(CBOR::from("a"), CBOR::Int(3));
    expected.insert(CBOR::from("b"), CBOR::Int(5));
    assert_eq!(cell.borrow().value, CBOR::map(expected));
}

#[test]
fn disabled_builtin_tags_pass_through() {
    let cases: &[(&str, u64)] = &[("d81d05", 29), ("d81c01", 28)];
    for (payload, tag) in cases {
        let bytes = hex::decode(payload).unwrap();
        let value = CBORDecoder::from_slice(&bytes)
            .with_disable_builtin_tags(true)
            .decode()
            .unwrap();
        let cell = value.as_tag().expect("expected an uninterpreted tag");
        assert_eq!(cell.borrow().tag, *tag);
    }

    // With tag 256 uninterpreted, no namespace ever becomes active, so string
    // references cannot resolve
    let bytes = hex::decode("d901008263616263d81900").unwrap();
    let err = CBORDecoder::from_slice(&bytes)
        .with_disable_builtin_tags(true)
        .decode()
        .unwrap_err();
    assert_eq!(err.to_string(), "string reference outside of namespace");
}

/***************************************************************************************************
 * Tag entity ordering
 **************************************************************************************************/

#[test]
fn tags_order_lexicographically() {
    assert!(CBOR::tagged(1, CBOR::from("z")) < CBOR::tagged(2, CBOR::from("a")));
    assert!(CBOR::tagged(5, CBOR::Int(1)) < CBOR::tagged(5, CBOR::Int(2)));
    assert_eq!(
        CBOR::tagged(6000, CBOR::from("x")),
        CBOR::tagged(6000, CBOR::from("x"))
    );
}
