//! Named, typed, change-notifying option cells.
//!
//! Every option is reachable through an [`OptionHandle`], a reference-counted
//! pointer to a type-erased [`AnyOption`]. Sections own the handles; wrappers
//! and subscribers hold clones or weak references. The typed view is
//! [`OptionCell<T>`], reached with [`try_as`].

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use optkit_core::{BoundedValue, OptionValue};
use tracing::error;

use crate::compound::CompoundOption;

/// Shared handle to a type-erased option.
pub type OptionHandle = Rc<dyn AnyOption>;

/// Callback invoked synchronously after an option's value changes.
pub type Subscriber = Rc<dyn Fn()>;

/// What `set_value_str_with` does when the text does not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetMode {
    /// Leave the current value untouched.
    #[default]
    Reject,
    /// Reset the option to its default value.
    Fallback,
}

#[derive(Default)]
struct SubscriberList {
    next_id: u64,
    entries: Vec<(u64, Subscriber)>,
}

impl SubscriberList {
    fn add(&mut self, callback: Subscriber) {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, callback));
    }

    /// Remove one registration of `callback`, if any.
    fn remove(&mut self, callback: &Subscriber) {
        if let Some(pos) = self
            .entries
            .iter()
            .position(|(_, cb)| std::ptr::addr_eq(Rc::as_ptr(cb), Rc::as_ptr(callback)))
        {
            self.entries.remove(pos);
        }
    }

    fn contains(&self, id: u64) -> bool {
        self.entries.iter().any(|(entry_id, _)| *entry_id == id)
    }

    fn snapshot(&self) -> Vec<(u64, Subscriber)> {
        self.entries.clone()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// State common to every option regardless of its value type.
pub struct OptionBase {
    name: String,
    lock_count: Cell<i32>,
    subscribers: RefCell<SubscriberList>,
    age: Cell<u64>,
    in_config_file: Cell<bool>,
    schema_defined: Cell<bool>,
}

impl OptionBase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lock_count: Cell::new(0),
            subscribers: RefCell::new(SubscriberList::default()),
            age: Cell::new(0),
            in_config_file: Cell::new(false),
            schema_defined: Cell::new(false),
        }
    }

    /// Copy for a cloned option: same name and schema linkage, nothing else.
    pub(crate) fn detached_copy(&self) -> Self {
        let copy = Self::new(self.name.clone());
        copy.schema_defined.set(self.schema_defined.get());
        copy
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record a value change and fan out to subscribers.
    ///
    /// Dispatch works on a snapshot, and each entry is re-checked right
    /// before its call: a callback removed mid-pass is never invoked, and
    /// one added mid-pass first fires on the next change.
    pub(crate) fn mark_changed(&self) {
        self.age.set(self.age.get() + 1);

        let snapshot = self.subscribers.borrow().snapshot();
        for (id, callback) in snapshot {
            let live = self.subscribers.borrow().contains(id);
            if live {
                callback();
            }
        }
    }

    pub(crate) fn set_in_config_file(&self, present: bool) {
        self.in_config_file.set(present);
    }
}

/// The type-erased contract every option implements.
pub trait AnyOption: Any {
    fn base(&self) -> &OptionBase;

    /// Name of the value type, e.g. `int` or `compound`.
    fn kind_name(&self) -> &'static str;

    /// Parse `text` and assign it. Returns `false`, leaving the value
    /// unchanged, if the text is not valid for this option's type.
    fn set_value_str(&self, text: &str) -> bool;

    /// Canonical text of the current value.
    fn get_value_str(&self) -> String;

    fn reset_to_default(&self);

    /// Parse `text` and, only if valid, make it the new default.
    fn set_default_value_str(&self, text: &str) -> bool;

    fn get_default_value_str(&self) -> String;

    /// An independent copy with no subscribers.
    fn clone_option(&self) -> OptionHandle;

    fn as_compound(&self) -> Option<&CompoundOption> {
        None
    }

    fn name(&self) -> &str {
        self.base().name()
    }

    fn set_value_str_with(&self, text: &str, mode: SetMode) -> bool {
        if self.set_value_str(text) {
            return true;
        }
        if mode == SetMode::Fallback {
            self.reset_to_default();
        }
        false
    }

    fn is_locked(&self) -> bool {
        self.base().lock_count.get() > 0
    }

    /// Increment (`true`) or decrement (`false`) the lock counter.
    fn set_locked(&self, locked: bool) {
        let counter = &self.base().lock_count;
        if locked {
            counter.set(counter.get() + 1);
        } else if counter.get() == 0 {
            error!(option = self.name(), "Unbalanced option unlock, lock count stays at 0");
        } else {
            counter.set(counter.get() - 1);
        }
    }

    fn add_subscriber(&self, callback: Subscriber) {
        self.base().subscribers.borrow_mut().add(callback);
    }

    /// Remove one registration of `callback`; no-op if it is not registered.
    fn remove_subscriber(&self, callback: &Subscriber) {
        self.base().subscribers.borrow_mut().remove(callback);
    }

    fn subscriber_count(&self) -> usize {
        self.base().subscribers.borrow().len()
    }

    /// Number of value changes since creation.
    fn age(&self) -> u64 {
        self.base().age.get()
    }

    /// Whether the last parse pass supplied this option's value.
    fn is_in_config_file(&self) -> bool {
        self.base().in_config_file.get()
    }

    /// Whether the option was declared by a schema provider.
    fn is_schema_defined(&self) -> bool {
        self.base().schema_defined.get()
    }

    fn set_schema_defined(&self, defined: bool) {
        self.base().schema_defined.set(defined);
    }
}

/// Checked downcast of a handle to its typed cell.
pub fn try_as<T: OptionValue>(handle: &OptionHandle) -> Option<Rc<OptionCell<T>>> {
    let any: Rc<dyn Any> = handle.clone();
    any.downcast::<OptionCell<T>>().ok()
}

/// Checked downcast of a handle to a compound option.
pub fn try_as_compound(handle: &OptionHandle) -> Option<Rc<CompoundOption>> {
    let any: Rc<dyn Any> = handle.clone();
    any.downcast::<CompoundOption>().ok()
}

#[derive(Clone)]
struct Bounds<T> {
    minimum: Option<T>,
    maximum: Option<T>,
    clamp: fn(T, Option<&T>, Option<&T>) -> T,
}

impl<T: BoundedValue> Bounds<T> {
    fn unbounded() -> Self {
        Self {
            minimum: None,
            maximum: None,
            clamp: T::clamp_to,
        }
    }
}

/// An option holding a value of type `T`.
pub struct OptionCell<T: OptionValue> {
    base: OptionBase,
    value: RefCell<T>,
    default: RefCell<T>,
    // Only ever `Some` for `T: BoundedValue`; see `set_minimum`.
    bounds: RefCell<Option<Bounds<T>>>,
}

impl<T: OptionValue> OptionCell<T> {
    pub fn new(name: impl Into<String>, default: T) -> Self {
        Self {
            base: OptionBase::new(name),
            value: RefCell::new(default.clone()),
            default: RefCell::new(default),
            bounds: RefCell::new(None),
        }
    }

    pub fn value(&self) -> T {
        self.value.borrow().clone()
    }

    pub fn default_value(&self) -> T {
        self.default.borrow().clone()
    }

    /// Replace the default. The current value is left alone.
    pub fn set_default_value(&self, default: T) {
        *self.default.borrow_mut() = default;
    }

    /// Assign `value`, clamped to the bounds if any.
    ///
    /// Subscribers run only when the stored value actually changes.
    pub fn set_value(&self, value: T) {
        let real = self.closest_valid_value(value);
        let changed = {
            let mut current = self.value.borrow_mut();
            if *current == real {
                false
            } else {
                *current = real;
                true
            }
        };
        if changed {
            self.base.mark_changed();
        }
    }

    fn closest_valid_value(&self, value: T) -> T {
        match &*self.bounds.borrow() {
            Some(bounds) => (bounds.clamp)(value, bounds.minimum.as_ref(), bounds.maximum.as_ref()),
            None => value,
        }
    }
}

impl<T: BoundedValue> OptionCell<T> {
    pub fn minimum(&self) -> Option<T> {
        self.bounds.borrow().as_ref().and_then(|b| b.minimum.clone())
    }

    pub fn maximum(&self) -> Option<T> {
        self.bounds.borrow().as_ref().and_then(|b| b.maximum.clone())
    }

    /// Set the lower bound and re-clamp the current value.
    pub fn set_minimum(&self, minimum: T) {
        self.bounds
            .borrow_mut()
            .get_or_insert_with(Bounds::unbounded)
            .minimum = Some(minimum);
        self.set_value(self.value());
    }

    /// Set the upper bound and re-clamp the current value.
    pub fn set_maximum(&self, maximum: T) {
        self.bounds
            .borrow_mut()
            .get_or_insert_with(Bounds::unbounded)
            .maximum = Some(maximum);
        self.set_value(self.value());
    }
}

impl<T: OptionValue> AnyOption for OptionCell<T> {
    fn base(&self) -> &OptionBase {
        &self.base
    }

    fn kind_name(&self) -> &'static str {
        T::kind().as_str()
    }

    fn set_value_str(&self, text: &str) -> bool {
        match T::parse_value(text) {
            Some(value) => {
                self.set_value(value);
                true
            }
            None => false,
        }
    }

    fn get_value_str(&self) -> String {
        self.value.borrow().format_value()
    }

    fn reset_to_default(&self) {
        self.set_value(self.default_value());
    }

    fn set_default_value_str(&self, text: &str) -> bool {
        match T::parse_value(text) {
            Some(default) => {
                self.set_default_value(default);
                true
            }
            None => false,
        }
    }

    fn get_default_value_str(&self) -> String {
        self.default.borrow().format_value()
    }

    fn clone_option(&self) -> OptionHandle {
        Rc::new(Self {
            base: self.base.detached_copy(),
            value: RefCell::new(self.value()),
            default: RefCell::new(self.default_value()),
            bounds: RefCell::new(self.bounds.borrow().clone()),
        })
    }
}

#[cfg(test)]
#[path = "option_tests.rs"]
mod tests;
