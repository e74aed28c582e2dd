use medform_core::{Decimal, FieldValue, QuantityValue, RangeValue};
use medform_forms::forms::{implanted_device, lab_observation};
use medform_forms::FormError;

#[test]
fn parses_input_by_field_kind() {
    let lab = lab_observation::definition().unwrap();
    let device = implanted_device::definition().unwrap();

    assert_eq!(
        lab.field("value").unwrap().parse_input("7.25 mmol/L").unwrap(),
        FieldValue::Quantity(QuantityValue {
            value: Some(Decimal::parse("7.25").unwrap()),
            unit: Some("mmol/L".to_string()),
        })
    );
    assert_eq!(
        lab.field("reference_range").unwrap().parse_input("..5.1").unwrap(),
        FieldValue::Range(RangeValue {
            low: None,
            high: Some(Decimal::parse("5.1").unwrap()),
        })
    );
    assert_eq!(
        device.field("implanted_on").unwrap().parse_input("2023-11-30").unwrap(),
        FieldValue::Date(jiff::civil::date(2023, 11, 30))
    );
    assert_eq!(
        device.field("status").unwrap().parse_input(" active ").unwrap(),
        FieldValue::code("active")
    );
    assert_eq!(
        lab.field("note").unwrap().parse_input("   ").unwrap(),
        FieldValue::Empty
    );
}

#[test]
fn rejects_unreadable_input() {
    let lab = lab_observation::definition().unwrap();

    let err = lab
        .field("value")
        .unwrap()
        .parse_input("seven mmol/L")
        .unwrap_err();
    assert!(matches!(err, FormError::InvalidInput { field, .. } if field == "value"));

    assert!(lab
        .field("reference_range")
        .unwrap()
        .parse_input("3-5")
        .is_err());
}

mod coded {
    use medform_core::Coding;
    use medform_forms::{CodingMemory, FieldBinder, FieldId, FormError};
    use medform_vocab::{Catalogs, VocabularyRegistry};

    use super::*;

    fn catalogs() -> Catalogs {
        Catalogs::load(
            &VocabularyRegistry::builtin(),
            ["device-kind", "device-status", "body-site"],
        )
        .unwrap()
    }

    #[test]
    fn codes_and_labels_resolve_through_the_catalog() {
        let form = implanted_device::definition().unwrap();
        let catalogs = catalogs();
        let binder = FieldBinder::new(&form, &catalogs).unwrap();
        let none = CodingMemory::default();

        assert_eq!(
            binder.parse_input("device_kind", "14106009", &none).unwrap(),
            FieldValue::code("14106009")
        );
        assert_eq!(
            binder
                .parse_input("device_kind", " Cardiac pacemaker ", &none)
                .unwrap(),
            FieldValue::code("14106009")
        );
        assert_eq!(
            binder.parse_input("device_kind", "", &none).unwrap(),
            FieldValue::Empty
        );
    }

    #[test]
    fn unknown_coded_input_is_rejected() {
        let form = implanted_device::definition().unwrap();
        let catalogs = catalogs();
        let binder = FieldBinder::new(&form, &catalogs).unwrap();

        let err = binder
            .parse_input("device_kind", "Cardiac pacemakr", &CodingMemory::default())
            .unwrap_err();
        assert!(matches!(err, FormError::InvalidInput { field, .. } if field == "device_kind"));
    }

    #[test]
    fn stored_code_no_longer_listed_is_still_accepted() {
        let form = implanted_device::definition().unwrap();
        let catalogs = catalogs();
        let binder = FieldBinder::new(&form, &catalogs).unwrap();
        let mut codings = CodingMemory::default();
        codings.insert(
            FieldId::from("device_kind"),
            Coding {
                system: Some("http://snomed.info/sct".into()),
                version: None,
                code: "999999".into(),
                display: Some("Retired".into()),
            },
        );

        assert_eq!(
            binder.parse_input("device_kind", "999999", &codings).unwrap(),
            FieldValue::code("999999")
        );
        assert!(binder
            .parse_input("device_kind", "888888", &codings)
            .is_err());
    }

    #[test]
    fn other_kinds_parse_as_before() {
        let form = implanted_device::definition().unwrap();
        let catalogs = catalogs();
        let binder = FieldBinder::new(&form, &catalogs).unwrap();

        assert_eq!(
            binder
                .parse_input("implanted_on", "2023-11-30", &CodingMemory::default())
                .unwrap(),
            FieldValue::Date(jiff::civil::date(2023, 11, 30))
        );
    }
}
