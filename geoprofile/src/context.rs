//! Dataset context: a scoped release year that table lookups fall back to when a request does
//! not name a year or release explicitly.

use std::cell::RefCell;

use log::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetContext {
    pub year: Option<String>,
}

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<DatasetContext>> = const { RefCell::new(Vec::new()) };
}

/// The innermost active dataset context, or an empty one.
pub fn current_context() -> DatasetContext {
    CONTEXT_STACK.with(|stack| stack.borrow().last().cloned().unwrap_or_default())
}

/// Keeps a dataset context active until dropped.
#[must_use = "the dataset context is popped as soon as the guard is dropped"]
pub struct DatasetContextGuard {
    _private: (),
}

impl DatasetContextGuard {
    pub fn enter(context: DatasetContext) -> Self {
        debug!("Entering dataset context {context:?}");
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(context));
        Self { _private: () }
    }
}

impl Drop for DatasetContextGuard {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().pop());
    }
}

/// Run `f` with `year` as the current dataset context year.
pub fn with_dataset_context<T>(year: &str, f: impl FnOnce() -> T) -> T {
    let _guard = DatasetContextGuard::enter(DatasetContext {
        year: Some(year.to_string()),
    });
    f()
}
