mod common;

use std::{sync::Arc, thread};

use chrono::{TimeZone, Utc};
use rand::Rng;
use sfdu::chdo::{Identity, CHDO_HEADER_LEN, LABEL_LEN};
use sfdu::dictionary::{Condition, DictionaryConfig, EqualityClause, Property};
use sfdu::{As, Dictionary, Error, FieldValue, FrameDecoder};

use common::*;

#[test]
fn frame_unit_fields() {
    let secondary = Secondary {
        turbo_rate_denominator: 6,
        ..Secondary::default()
    };
    let payload = hex::decode("1acffc1d0a0b0c0d").unwrap();
    let dat = frame_unit(&secondary, &payload);

    let mut decoder = FrameDecoder::new(dictionary());
    let unit = decoder.decode(&dat).unwrap();

    assert_eq!(
        unit.identity().unwrap(),
        &Identity {
            ddp_id: "NJPLC022".to_string(),
            mission_id: 42,
            major: 1,
            minor: 1,
            format: 3,
        }
    );
    let types: Vec<u16> = unit.records().map(|r| r.chdo_type()).collect();
    assert_eq!(types, vec![1, PRIMARY, SECONDARY, TERTIARY, DATA]);

    assert_eq!(unit.scid().unwrap(), Some(168));
    assert_eq!(unit.vcid().unwrap(), Some(5));
    assert_eq!(unit.dss_id().unwrap(), Some(14));
    assert_eq!(unit.turbo_rate().unwrap(), Some("1/6".to_string()));
    assert_eq!(unit.number_of_data_bits().unwrap(), 8920);
    assert_eq!(unit.bit_rate().unwrap(), Some(2000.0));
    assert_eq!(
        unit.ert().unwrap(),
        Some(Utc.with_ymd_and_hms(2020, 1, 1, 1, 0, 0).unwrap())
    );
    assert_eq!(unit.ascii("station").unwrap(), Some("DSS-14".to_string()));
    assert_eq!(unit.signed("signed_offset").unwrap(), Some(-5));
    let sclk = unit.sclk("sclk").unwrap().unwrap();
    assert_eq!(sclk.coarse, 1_000_000);
    assert_eq!(sclk.as_seconds(), 1_000_000.5);

    assert_eq!(unit.data_payload().unwrap(), &payload[..]);
    assert_eq!(unit.raw_bytes(), &dat[..]);
    let data_offset = dat.len() - payload.len() - CHDO_HEADER_LEN;
    assert_eq!(unit.last_record_offset(), Some(data_offset));
    assert_eq!(unit.entire_header(), &dat[..dat.len() - payload.len()]);
}

#[test]
fn extended_resolution_ert() {
    let secondary = Secondary {
        extension: 123,
        extended: true,
        ..Secondary::default()
    };
    let unit = FrameDecoder::new(dictionary())
        .decode(&frame_unit(&secondary, &[0]))
        .unwrap();
    let expected = Utc.with_ymd_and_hms(2020, 1, 1, 1, 0, 0).unwrap()
        + chrono::Duration::microseconds(123);
    assert_eq!(unit.ert().unwrap(), Some(expected));

    let secondary = Secondary {
        tenths_of_micros: true,
        ..secondary
    };
    let unit = FrameDecoder::new(dictionary())
        .decode(&frame_unit(&secondary, &[0]))
        .unwrap();
    let expected = Utc.with_ymd_and_hms(2020, 1, 1, 1, 0, 0).unwrap()
        + chrono::Duration::nanoseconds(12_300);
    assert_eq!(unit.ert().unwrap(), Some(expected));
}

#[test]
fn version_1_and_2_labels_decode_the_same_records() {
    let chdos = [primary(2, 0, 42, 1), Secondary::default().chdo(), chdo(DATA, &[1, 2])];
    let mut decoder = FrameDecoder::new(dictionary());

    let one = decoder.decode(&v1(&chdos)).unwrap();
    let two = decoder.decode(&v2(&chdos)).unwrap();

    assert_eq!(one.label().version, 1);
    assert_eq!(two.label().version, 2);
    assert_eq!(one.identity(), two.identity());
    assert_eq!(
        &one.raw_bytes()[LABEL_LEN..],
        &two.raw_bytes()[LABEL_LEN..]
    );
    assert!(one.is_packet().unwrap());
}

#[test]
fn major_field() {
    let dat = v1(&[chdo(PRIMARY, &[0x07, 0, 0, 0, 0]), chdo(DATA, &[])]);
    assert_eq!(&dat[LABEL_LEN..LABEL_LEN + 5], &[0x02, 0x00, 0x00, 0x05, 0x07]);

    let unit = FrameDecoder::new(dictionary()).decode(&dat).unwrap();
    assert_eq!(
        unit.field_value("major", As::Unsigned).unwrap(),
        Some(FieldValue::Unsigned(7))
    );
}

#[test]
fn resync_tolerates_garbage() {
    let dat = frame_unit(&Secondary::default(), &[0xaa; 16]);
    let mut decoder = FrameDecoder::new(dictionary());
    let expected = decoder.decode(&dat).unwrap();

    let mut rng = rand::thread_rng();
    for num in 0..64 {
        // bytes below 'A' cannot form an anchor
        let mut prefixed: Vec<u8> = (0..num).map(|_| rng.gen_range(0..0x41)).collect();
        prefixed.extend_from_slice(&dat);

        let unit = decoder.decode(&prefixed).unwrap();
        assert_eq!(unit.raw_bytes(), expected.raw_bytes(), "{num} garbage bytes");
        assert_eq!(unit.identity(), expected.identity());
        assert_eq!(
            unit.records().map(|r| r.bytes()).collect::<Vec<_>>(),
            expected.records().map(|r| r.bytes()).collect::<Vec<_>>(),
        );
    }
}

#[test]
fn unknown_record_is_skipped() {
    let secondary = Secondary::default();
    let with = v2(&[
        primary(1, 1, 42, 3),
        chdo(999, &[0xff; 11]),
        secondary.chdo(),
        chdo(DATA, &[1]),
    ]);
    let without = v2(&[primary(1, 1, 42, 3), secondary.chdo(), chdo(DATA, &[1])]);

    let mut decoder = FrameDecoder::new(dictionary());
    let a = decoder.decode(&with).unwrap();
    assert_eq!(decoder.stats.unknown_records, 1);
    let b = decoder.decode(&without).unwrap();

    for name in ["scft_id", "data_source", "virtual_channel_id", "number_bits"] {
        assert_eq!(
            a.field_value(name, As::Unsigned).unwrap(),
            b.field_value(name, As::Unsigned).unwrap(),
            "{name}"
        );
    }
    assert_eq!(a.identity(), b.identity());
    assert!(!a.has_record(999));
}

#[test]
fn data_record_must_be_last() {
    let dat = v2(&[primary(1, 1, 42, 3), Secondary::default().chdo()]);
    let mut decoder = FrameDecoder::new(dictionary());

    let zult = decoder.decode(&dat);
    assert!(matches!(zult, Err(Error::MissingDataRecord)), "{zult:?}");

    let unit = decoder.decode_header_only(&dat).unwrap();
    assert_eq!(unit.identity().unwrap().mission_id, 42);
    assert_eq!(unit.vcid().unwrap(), Some(5));
    assert!(unit.data_record().is_none());
}

#[test]
fn header_only_without_payload() {
    let dat = frame_unit(&Secondary::default(), &[0x55; 1000]);
    let header_len = dat.len() - 1000;

    let mut decoder = FrameDecoder::new(dictionary());
    let unit = decoder.decode_header_only(&dat[..header_len]).unwrap();
    assert_eq!(unit.entire_header(), &dat[..header_len]);
    assert_eq!(unit.scid().unwrap(), Some(168));
    assert!(unit.data_payload().is_none());
}

#[test]
fn property_or_and() {
    let mut decoder = FrameDecoder::new(dictionary());

    // first condition satisfied, tertiary absent
    let unit = decoder
        .decode(&v2(&[primary(1, 1, 42, 3), chdo(DATA, &[])]))
        .unwrap();
    assert!(unit.is_frame().unwrap());

    // first condition partially satisfied, tertiary absent
    let unit = decoder
        .decode(&v2(&[primary(1, 0, 42, 3), chdo(DATA, &[])]))
        .unwrap();
    assert!(!unit.is_frame().unwrap());

    // second condition satisfied
    let unit = decoder
        .decode(&v2(&[
            primary(1, 0, 42, 3),
            tertiary(0, false, false),
            chdo(DATA, &[]),
        ]))
        .unwrap();
    assert!(unit.is_frame().unwrap());

    // no applicable conditions
    assert!(!unit.is_out_of_sync().unwrap());
}

#[test]
fn named_properties() {
    let secondary = Secondary {
        decode_status: 3,
        turbo_rate_denominator: 2,
        out_of_sync: true,
        ..Secondary::default()
    };
    let dat = v2(&[
        primary(1, 1, 42, 3),
        secondary.chdo(),
        tertiary(2, true, true),
        chdo(DATA, &[]),
    ]);
    let unit = FrameDecoder::new(dictionary()).decode(&dat).unwrap();

    assert!(unit.is_idle().unwrap());
    assert!(unit.is_out_of_sync().unwrap());
    assert!(unit.is_invalid().unwrap());
    assert!(unit.is_turbo().unwrap());
    assert!(unit.is_anomaly().unwrap());
    assert!(unit.is_data_padded().unwrap());
    assert!(unit.property("isDss14").unwrap());
    assert!(!unit.is_packet().unwrap());

    let zult = unit.is_gif_frame();
    assert!(
        matches!(zult, Err(Error::UnknownProperty(ref name)) if name == "isGifFrame"),
        "{zult:?}"
    );
}

#[test]
fn unknown_field_in_property() {
    let mut config: DictionaryConfig =
        serde_json::from_reader(std::fs::File::open(fixture_path("dictionary.json")).unwrap())
            .unwrap();
    config.properties.push(Property::new(
        "isBroken",
        vec![
            Condition::new(TERTIARY, vec![EqualityClause::equals("no_such_field", "1")]),
            Condition::new(
                PRIMARY,
                vec![EqualityClause::equals("not_a_field_either", "1")],
            ),
        ],
    ));
    let dictionary = Arc::new(Dictionary::new(config).unwrap());
    let mut decoder = FrameDecoder::new(dictionary);

    // tertiary condition is not applicable and is skipped
    let unit = decoder
        .decode(&v2(&[primary(1, 1, 42, 3), chdo(DATA, &[])]))
        .unwrap();
    let zult = unit.property("isBroken");
    assert!(
        matches!(
            zult,
            Err(Error::UnknownField { ref property, ref field })
                if property == "isBroken" && field == "not_a_field_either"
        ),
        "{zult:?}"
    );
}

#[test]
fn single_precision_property() {
    let mut config: DictionaryConfig =
        serde_json::from_reader(std::fs::File::open(fixture_path("dictionary.json")).unwrap())
            .unwrap();
    config.properties.push(Property::new(
        "isSlow",
        vec![Condition::new(
            SECONDARY,
            vec![EqualityClause::equals("bit_rate", "0.1")],
        )],
    ));
    let mut decoder = FrameDecoder::new(Arc::new(Dictionary::new(config).unwrap()));

    let secondary = Secondary {
        bit_rate: 0.1,
        ..Secondary::default()
    };
    let unit = decoder.decode(&frame_unit(&secondary, &[0])).unwrap();
    assert_eq!(unit.bit_rate().unwrap(), Some(f64::from(0.1f32)));
    assert!(unit.property("isSlow").unwrap());

    let unit = decoder
        .decode(&frame_unit(&Secondary::default(), &[0]))
        .unwrap();
    assert!(!unit.property("isSlow").unwrap());
}

#[test]
fn header_only_cut_within_data_header() {
    let dat = frame_unit(&Secondary::default(), &[0x55; 100]);
    let data_offset = dat.len() - 100 - CHDO_HEADER_LEN;
    let cut = &dat[..data_offset + 2];

    let unit = FrameDecoder::new(dictionary())
        .decode_header_only(cut)
        .unwrap();
    assert_eq!(unit.last_record_offset(), Some(data_offset));
    assert_eq!(unit.entire_header(), cut);
    assert_eq!(unit.signed("signed_offset").unwrap(), Some(-5));
}

#[test]
fn shared_dictionary() {
    let dictionary = dictionary();
    let dat = Arc::new(frame_unit(&Secondary::default(), &[1, 2, 3]));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let dictionary = dictionary.clone();
            let dat = dat.clone();
            thread::spawn(move || {
                let mut decoder = FrameDecoder::new(dictionary);
                decoder.decode(&dat).unwrap().identity().cloned()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap().mission_id, 42);
    }
}
