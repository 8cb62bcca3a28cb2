use super::*;
use crate::format::load_from_str;
use crate::option::OptionCell;
use crate::store::ConfigStore;
use crate::test_support::capture_logs;
use std::cell::Cell;

fn int_double_entries() -> Vec<CompoundEntry> {
    vec![
        CompoundEntry::new::<i32>("hey_"),
        CompoundEntry::new::<f64>("bey_"),
    ]
}

/// Load `body` into a `[plugin]` section holding `compound`.
fn load_into(compound: &Rc<CompoundOption>, body: &str) -> ConfigStore {
    let mut section = Section::new("plugin");
    section
        .register_new_option(compound.clone())
        .expect("valid option name");
    let mut store = ConfigStore::new();
    store.merge_section(section);
    load_from_str(&mut store, &format!("[plugin]\n{body}"), "test");
    store
}

fn row(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn test_row_key_order() {
    let mut keys = vec!["b", "10", "a", "9", "1a", "02", "2"];
    keys.sort_by(|a, b| row_key_order(a, b));
    assert_eq!(keys, ["02", "2", "9", "10", "1a", "a", "b"]);
}

#[test]
fn test_entry_default_must_parse() {
    let entry = CompoundEntry::new::<i32>("n_").with_default("12");
    assert_eq!(entry.default_value(), Some("12"));

    let (entry, logs) = capture_logs(|| CompoundEntry::new::<i32>("n_").with_default("x"));
    assert_eq!(entry.default_value(), None);
    assert!(logs.contains("Ignoring invalid default 'x'"), "{logs}");
}

#[test]
fn test_entry_for_kind() {
    let entry = CompoundEntry::for_kind(ValueKind::Color, "c_");
    assert_eq!(entry.kind(), ValueKind::Color);
    assert!(entry.is_parsable("#FFFFFFFF"));
    assert!(!entry.is_parsable("white"));
}

#[test]
fn test_hey_bey_scenario() {
    let compound = Rc::new(CompoundOption::new("list", int_double_entries()));
    load_into(&compound, "hey_k1 = 1\nbey_k1 = 1.2\n");

    assert_eq!(compound.get_value_untyped(), vec![row(&["k1", "1", "1.2"])]);
    assert_eq!(
        compound.get_value::<(i32, f64)>().unwrap(),
        vec![("k1".to_string(), (1, 1.2))]
    );
}

#[test]
fn test_longest_prefix_wins() {
    let compound = Rc::new(CompoundOption::new(
        "commands",
        vec![
            CompoundEntry::new::<String>("cmd_"),
            CompoundEntry::new::<String>("cmd_ext_").with_default("none"),
        ],
    ));
    load_into(&compound, "cmd_a = run\ncmd_ext_a = extra\ncmd_b = go\n");

    assert_eq!(
        compound.get_value_untyped(),
        vec![row(&["a", "run", "extra"]), row(&["b", "go", "none"])]
    );
}

#[test]
fn test_missing_column_drops_row_and_logs() {
    let compound = Rc::new(CompoundOption::new("list", int_double_entries()));
    let (_store, logs) = capture_logs(|| load_into(&compound, "hey_a = 1\nbey_a = 2\nhey_b = 3\n"));

    assert_eq!(compound.get_value_untyped(), vec![row(&["a", "1", "2"])]);
    assert!(
        logs.contains("Dropping entry 'b' of the list option plugin/list: missing value for bey_b"),
        "{logs}"
    );
}

#[test]
fn test_invalid_column_falls_back_to_default() {
    let compound = Rc::new(CompoundOption::new(
        "list",
        vec![
            CompoundEntry::new::<i32>("hey_").with_default("7"),
            CompoundEntry::new::<f64>("bey_"),
        ],
    ));
    let (_store, logs) = capture_logs(|| load_into(&compound, "hey_a = oops\nbey_a = 2\n"));

    assert_eq!(compound.get_value_untyped(), vec![row(&["a", "7", "2"])]);
    assert!(
        logs.contains("Failed parsing option plugin/hey_a as part of the list option plugin/list"),
        "{logs}"
    );
}

#[test]
fn test_schema_options_are_not_candidates() {
    let compound = Rc::new(CompoundOption::new("list", int_double_entries()));
    let mut section = Section::new("plugin");
    section.register_new_option(compound.clone()).unwrap();
    let declared = Rc::new(OptionCell::new("hey_fixed", 3));
    declared.set_schema_defined(true);
    section.register_new_option(declared).unwrap();
    let mut store = ConfigStore::new();
    store.merge_section(section);

    load_from_str(&mut store, "[plugin]\nhey_fixed = 4\nbey_fixed = 1\n", "test");
    assert!(compound.get_value_untyped().is_empty());
}

#[test]
fn test_rows_sorted_naturally() {
    let compound = Rc::new(CompoundOption::new_plain(
        "list",
        vec![CompoundEntry::new::<i32>("item_")],
    ));
    load_into(&compound, "item_10 = 10\nitem_2 = 2\nitem_1 = 1\n");
    assert_eq!(compound.get_value_simple::<(i32,)>().unwrap(), [(1,), (2,), (10,)]);
}

#[test]
fn test_set_untyped_is_all_or_nothing() {
    let compound = CompoundOption::new("list", int_double_entries());
    assert!(compound.set_value_untyped(vec![row(&["a", "1", "0.5"])]));

    let bad_width = vec![row(&["b", "2", "1.0"]), row(&["c", "3"])];
    assert!(!compound.set_value_untyped(bad_width));
    let bad_value = vec![row(&["b", "2", "1.0"]), row(&["c", "x", "1.0"])];
    assert!(!compound.set_value_untyped(bad_value));

    assert_eq!(compound.get_value_untyped(), vec![row(&["a", "1", "0.5"])]);
}

#[test]
fn test_typed_access_checks_column_types() {
    let compound = CompoundOption::new("list", int_double_entries());
    assert!(compound.get_value::<(f64, i32)>().is_none());
    assert!(compound.get_value::<(i32,)>().is_none());
    assert!(!compound.set_value(vec![("a".to_string(), (1.0, 2))]));
    assert!(compound.set_value(vec![("a".to_string(), (1, 2.0))]));
    assert_eq!(
        compound.get_value_untyped(),
        vec![row(&["a", "1", "2.000000"])]
    );
}

#[test]
fn test_set_simple_uses_positional_keys() {
    let compound = CompoundOption::new_plain(
        "list",
        vec![
            CompoundEntry::new::<String>("name_"),
            CompoundEntry::new::<bool>("on_"),
        ],
    );
    assert!(compound.is_plain());
    assert!(compound.set_value_simple(vec![
        ("first".to_string(), true),
        ("second".to_string(), false),
    ]));

    assert_eq!(
        compound.expand(),
        vec![
            ("name_0".to_string(), "first".to_string()),
            ("on_0".to_string(), "true".to_string()),
            ("name_1".to_string(), "second".to_string()),
            ("on_1".to_string(), "false".to_string()),
        ]
    );
}

#[test]
fn test_plain_list_keys_rows_by_position() {
    let keyed = Rc::new(CompoundOption::new(
        "devices",
        vec![CompoundEntry::new::<String>("device_")],
    ));
    let plain = Rc::new(CompoundOption::new_plain(
        "device_list",
        vec![CompoundEntry::new::<String>("device_")],
    ));

    let mut section = Section::new("plugin");
    section.register_new_option(keyed.clone()).unwrap();
    section.register_new_option(plain.clone()).unwrap();
    let mut store = ConfigStore::new();
    store.merge_section(section);
    load_from_str(
        &mut store,
        "[plugin]\ndevice_mouse = usb-1\ndevice_kbd = usb-2\n",
        "test",
    );

    assert_eq!(
        keyed.get_value_untyped(),
        vec![row(&["kbd", "usb-2"]), row(&["mouse", "usb-1"])]
    );
    assert_eq!(
        plain.get_value_untyped(),
        vec![row(&["0", "usb-2"]), row(&["1", "usb-1"])]
    );
    assert_eq!(
        plain.expand(),
        vec![
            ("device_0".to_string(), "usb-2".to_string()),
            ("device_1".to_string(), "usb-1".to_string()),
        ]
    );

    // Keys given to a plain list are replaced too.
    assert!(plain.set_value(vec![("touchpad".to_string(), ("i2c-1".to_string(),))]));
    assert_eq!(plain.get_value_untyped(), vec![row(&["0", "i2c-1"])]);
    assert!(keyed.set_value(vec![("touchpad".to_string(), ("i2c-1".to_string(),))]));
    assert_eq!(keyed.get_value_untyped(), vec![row(&["touchpad", "i2c-1"])]);
}

#[test]
fn test_set_notifies_only_on_change() {
    let compound = Rc::new(CompoundOption::new("list", int_double_entries()));
    let fired = Rc::new(Cell::new(0));
    let counter = fired.clone();
    compound.add_subscriber(Rc::new(move || counter.set(counter.get() + 1)));

    let rows = vec![row(&["a", "1", "0.5"])];
    compound.set_value_untyped(rows.clone());
    compound.set_value_untyped(rows);
    assert_eq!(fired.get(), 1);
    assert_eq!(compound.age(), 1);

    compound.reset_to_default();
    assert_eq!(fired.get(), 2);
    assert!(compound.get_value_untyped().is_empty());
}

#[test]
fn test_string_interface_is_inert() {
    let compound = CompoundOption::new("list", int_double_entries());
    assert!(!compound.set_value_str("anything"));
    assert!(!compound.set_default_value_str("anything"));
    assert_eq!(compound.get_value_str(), "");
    assert_eq!(compound.kind_name(), "compound");
}

#[test]
fn test_clone_copies_rows_not_subscribers() {
    let compound = CompoundOption::new("list", int_double_entries());
    compound.set_value_untyped(vec![row(&["a", "1", "0.5"])]);
    compound.add_subscriber(Rc::new(|| {}));

    let copy = compound.clone_option();
    let copy = try_as_compound_ref(&copy);
    assert_eq!(copy.get_value_untyped(), compound.get_value_untyped());
    assert_eq!(copy.subscriber_count(), 0);

    copy.set_value_untyped(Vec::new());
    assert_eq!(compound.get_value_untyped().len(), 1);
}

fn try_as_compound_ref(handle: &OptionHandle) -> Rc<CompoundOption> {
    crate::option::try_as_compound(handle).expect("clone should stay a compound option")
}

#[test]
fn test_owns_name() {
    let compound = CompoundOption::new("list", int_double_entries());
    assert!(compound.owns_name("hey_x"));
    assert!(compound.owns_name("bey_"));
    assert!(!compound.owns_name("hay_x"));
}
