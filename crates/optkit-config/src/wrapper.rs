use std::cell::RefCell;
use std::rc::{Rc, Weak};

use optkit_core::{ConfigError, OptionValue};

use crate::option::{AnyOption, OptionCell, Subscriber, try_as};
use crate::store::ConfigStore;

type Callback = Rc<dyn Fn()>;

/// Typed view of a store option that follows its changes.
///
/// The wrapper holds a weak reference: the section keeps the option alive.
/// An optional callback runs after every change and the listener is
/// unsubscribed when the wrapper is dropped.
pub struct OptionWrapper<T: OptionValue> {
    option: Weak<OptionCell<T>>,
    listener: Subscriber,
    callback: Rc<RefCell<Option<Callback>>>,
}

impl<T: OptionValue> OptionWrapper<T> {
    /// Look up `<section>/<option>` and check that it holds a `T`.
    pub fn load(store: &ConfigStore, path: &str) -> Result<Self, ConfigError> {
        let handle = store.find_option(path)?;
        let cell = try_as::<T>(&handle).ok_or_else(|| ConfigError::TypeMismatch {
            name: path.to_string(),
            expected: T::kind().as_str(),
        })?;
        Ok(Self::attach(&cell))
    }

    pub fn attach(cell: &Rc<OptionCell<T>>) -> Self {
        let callback: Rc<RefCell<Option<Callback>>> = Rc::new(RefCell::new(None));
        let forward = Rc::clone(&callback);
        let listener: Subscriber = Rc::new(move || {
            // Clone out first so the callback may replace itself.
            let current = forward.borrow().clone();
            if let Some(callback) = current {
                callback();
            }
        });
        cell.add_subscriber(Rc::clone(&listener));

        Self {
            option: Rc::downgrade(cell),
            listener,
            callback,
        }
    }

    /// Current value, or `None` once the option has been dropped.
    pub fn value(&self) -> Option<T> {
        self.option.upgrade().map(|cell| cell.value())
    }

    pub fn option(&self) -> Option<Rc<OptionCell<T>>> {
        self.option.upgrade()
    }

    pub fn set_callback(&self, callback: impl Fn() + 'static) {
        *self.callback.borrow_mut() = Some(Rc::new(callback));
    }

    pub fn clear_callback(&self) {
        *self.callback.borrow_mut() = None;
    }
}

impl<T: OptionValue> Drop for OptionWrapper<T> {
    fn drop(&mut self) {
        if let Some(cell) = self.option.upgrade() {
            cell.remove_subscriber(&self.listener);
        }
    }
}

/// A free-standing option, not registered in any section.
pub fn create_option<T: OptionValue>(value: T) -> Rc<OptionCell<T>> {
    Rc::new(OptionCell::new("Static", value))
}

/// Like [`create_option`], parsing the value from text.
pub fn create_option_string<T: OptionValue>(text: &str) -> Option<Rc<OptionCell<T>>> {
    T::parse_value(text).map(create_option)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::Section;
    use std::cell::Cell;

    fn store_with_option() -> (ConfigStore, Rc<OptionCell<i32>>) {
        let option = Rc::new(OptionCell::new("Option1", 5));
        let mut section = Section::new("Test");
        section.register_new_option(option.clone()).unwrap();
        let mut store = ConfigStore::new();
        store.merge_section(section);
        (store, option)
    }

    #[test]
    fn test_wrapper_follows_option() {
        let (store, option) = store_with_option();
        let wrapper = OptionWrapper::<i32>::load(&store, "Test/Option1").unwrap();
        assert!(Rc::ptr_eq(&wrapper.option().unwrap(), &option));
        assert_eq!(wrapper.value(), Some(5));

        let updated = Rc::new(Cell::new(false));
        let flag = updated.clone();
        wrapper.set_callback(move || flag.set(true));
        option.set_value(6);
        assert!(updated.get());
        assert_eq!(wrapper.value(), Some(6));
    }

    #[test]
    fn test_wrapper_without_callback_is_silent() {
        let (store, option) = store_with_option();
        let wrapper = OptionWrapper::<i32>::load(&store, "Test/Option1").unwrap();
        option.set_value(9);
        assert_eq!(wrapper.value(), Some(9));

        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        wrapper.set_callback(move || counter.set(counter.get() + 1));
        wrapper.clear_callback();
        option.set_value(10);
        assert_eq!(fired.get(), 0);
    }

    #[test]
    fn test_wrapper_load_errors() {
        let (store, _option) = store_with_option();
        assert!(matches!(
            OptionWrapper::<i32>::load(&store, "Test/Missing"),
            Err(ConfigError::OptionNotFound { .. })
        ));
        assert!(matches!(
            OptionWrapper::<String>::load(&store, "Test/Option1"),
            Err(ConfigError::TypeMismatch { expected: "string", .. })
        ));
    }

    #[test]
    fn test_drop_unsubscribes() {
        let (store, option) = store_with_option();
        let wrapper = OptionWrapper::<i32>::load(&store, "Test/Option1").unwrap();
        assert_eq!(option.subscriber_count(), 1);
        drop(wrapper);
        assert_eq!(option.subscriber_count(), 0);
    }

    #[test]
    fn test_wrapper_outlived_by_nothing() {
        let option = create_option(3);
        let wrapper = OptionWrapper::attach(&option);
        drop(option);
        assert_eq!(wrapper.value(), None);
        // Dropping after the option is gone is fine.
        drop(wrapper);
    }

    #[test]
    fn test_callback_may_replace_itself() {
        let option = create_option(0);
        let wrapper = Rc::new(OptionWrapper::attach(&option));
        let inner = Rc::downgrade(&wrapper);
        wrapper.set_callback(move || {
            if let Some(wrapper) = inner.upgrade() {
                wrapper.set_callback(|| {});
            }
        });
        option.set_value(1);
        option.set_value(2);
    }

    #[test]
    fn test_create_static_options() {
        let option = create_option(String::from("text"));
        assert_eq!(option.name(), "Static");
        assert_eq!(option.value(), "text");

        let parsed = create_option_string::<f64>("2.5").unwrap();
        assert_eq!(parsed.value(), 2.5);
        assert!(create_option_string::<i32>("x").is_none());
    }
}
