//! Tests for property accessors

use super::*;
use pretty_assertions::assert_eq;
use rstest::rstest;

#[derive(Debug, Default, Clone, PartialEq)]
struct Account {
    id: i64,
    owner: Option<String>,
    balance: f64,
}

#[rstest]
#[case(0)]
#[case(-17)]
#[case(i64::MAX)]
fn test_setter_then_getter_round_trip(#[case] id: i64) {
    let prop = property!(Account, id: i64);
    let getter = prop.compile_getter();
    let setter = prop.compile_setter().expect("stored property has a setter");

    let mut account = Account::default();
    setter(&mut account, Value::Int64(id)).expect("matching kind");

    assert_eq!(getter(&account), Value::Int64(id));
    assert_eq!(account.id, id);
}

#[test]
fn test_optional_property_round_trips_null() {
    let prop = property!(Account, owner: Option<String>);
    let getter = prop.compile_getter();
    let setter = prop.compile_setter().expect("stored property has a setter");

    let mut account = Account {
        owner: Some("Ada".into()),
        ..Default::default()
    };
    assert_eq!(getter(&account), Value::String("Ada".into()));

    setter(&mut account, Value::Null).expect("null fits an option");
    assert_eq!(account.owner, None);
    assert_eq!(getter(&account), Value::Null);
}

#[test]
fn test_setter_rejects_wrong_kind() {
    let prop = property!(Account, balance: f64);
    let setter = prop.compile_setter().expect("stored property has a setter");

    let mut account = Account::default();
    let err = setter(&mut account, Value::String("12.5".into())).unwrap_err();
    assert_eq!(
        err,
        ConversionError::TypeMismatch {
            expected: "float64",
            found: "string"
        }
    );
}

#[test]
fn test_computed_property_has_no_setter() {
    let prop = property!(Account, label: String => |account: &Account| format!("#{}", account.id));
    assert!(!prop.has_storage());

    let getter = prop.compile_getter();
    assert_eq!(
        getter(&Account {
            id: 7,
            ..Default::default()
        }),
        Value::String("#7".into())
    );

    let err = match prop.compile_setter() {
        Ok(_) => panic!("computed property must not compile a setter"),
        Err(err) => err,
    };
    assert!(err.is_configuration());
    assert!(err.to_string().contains("Property 'label' of 'Account'"));
}

#[test]
fn test_direct_setter_skips_value_conversion() {
    let prop = property!(Account, balance: f64);
    let set = prop.compile_setter_direct().expect("stored property");

    let mut account = Account::default();
    set(&mut account, 99.5);
    assert_eq!(account.balance, 99.5);
}

#[test]
fn test_erased_access_reports_type() {
    let prop: Arc<dyn PropertyAccess<Account>> = Arc::new(property!(Account, owner: Option<String>));

    assert_eq!(prop.name(), "owner");
    assert_eq!(prop.kind(), ValueKind::String);
    assert_eq!(prop.type_info(), TypeInfo::of::<Option<String>>());
    assert!(prop.has_storage());
}
