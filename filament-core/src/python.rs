//! Python Bindings
//!
//! Exposes the engine to a Python host: create signals, root computations
//! at the currently active scope, register cleanup callbacks, and
//! force-dispose scopes when the host tears a construct down.
//!
//! Values are stored as GIL-independent `Py<PyAny>` references; host value
//! equality is Python `==`. All classes are `unsendable` because the engine
//! is single-threaded by design: a graph belongs to the thread that created
//! it.
//!
//! Python exceptions raised inside computation bodies are logged and
//! swallowed (a memo body that raises yields `None` for that run); engine
//! errors surface to Python as `RuntimeError`.

use std::rc::Rc;

use pyo3::exceptions::PyRuntimeError;
use pyo3::prelude::*;
use tracing::error;

use crate::reactive::{on_cleanup, Effect, Memo, ReactiveError, Runtime, Scope, Signal};

/// A Python object used as a reactive value.
#[derive(Clone)]
pub struct PyValue(Py<PyAny>);

impl PartialEq for PyValue {
    fn eq(&self, other: &Self) -> bool {
        Python::with_gil(|py| self.0.bind(py).eq(other.0.bind(py)).unwrap_or(false))
    }
}

fn reactive_err(err: ReactiveError) -> PyErr {
    PyRuntimeError::new_err(err.to_string())
}

/// Python-exposed graph coordinator.
///
/// One `Runtime` is one isolated graph with its own root scope.
#[pyclass(name = "Runtime", unsendable)]
pub struct PyRuntime {
    rt: Rc<Runtime<PyValue>>,
    root: Scope<PyValue>,
}

#[pymethods]
impl PyRuntime {
    #[new]
    fn new() -> Self {
        let rt = Rc::new(Runtime::new());
        let root = Scope::root(&rt);
        Self { rt, root }
    }

    /// Create a signal with the given initial value.
    fn signal(&self, value: PyObject) -> PySignal {
        PySignal {
            rt: Rc::clone(&self.rt),
            inner: Signal::new(&self.rt, PyValue(value)),
        }
    }

    /// Create an effect from a Python callable.
    ///
    /// The effect is owned by the currently active scope, or by the root
    /// when created from outside any computation.
    fn effect(&self, callback: PyObject) -> PyResult<PyScope> {
        let owner = Scope::active(&self.rt).unwrap_or(self.root);
        let effect = Effect::new(&self.rt, owner, move |_| {
            Python::with_gil(|py| {
                if let Err(err) = callback.call0(py) {
                    error!(%err, "effect body raised");
                }
            });
        })
        .map_err(reactive_err)?;
        Ok(PyScope {
            rt: Rc::clone(&self.rt),
            inner: effect.scope(),
        })
    }

    /// Create a memo from a Python callable returning the cached value.
    ///
    /// A body that raises yields `None` for that run.
    fn memo(&self, callback: PyObject) -> PyResult<PyMemo> {
        let owner = Scope::active(&self.rt).unwrap_or(self.root);
        let memo = Memo::new(&self.rt, owner, move |_| {
            Python::with_gil(|py| match callback.call0(py) {
                Ok(value) => PyValue(value),
                Err(err) => {
                    error!(%err, "memo body raised");
                    PyValue(py.None())
                }
            })
        })
        .map_err(reactive_err)?;
        Ok(PyMemo {
            rt: Rc::clone(&self.rt),
            inner: memo,
        })
    }

    /// Create a bare child scope under the active scope (or the root).
    fn scope(&self) -> PyResult<PyScope> {
        let owner = Scope::active(&self.rt).unwrap_or(self.root);
        let scope = Scope::child(&self.rt, owner).map_err(reactive_err)?;
        Ok(PyScope {
            rt: Rc::clone(&self.rt),
            inner: scope,
        })
    }

    /// Register a cleanup callback on the currently active scope.
    fn on_cleanup(&self, callback: PyObject) {
        on_cleanup(&self.rt, move || {
            Python::with_gil(|py| {
                if let Err(err) = callback.call0(py) {
                    error!(%err, "cleanup callback raised");
                }
            });
        });
    }

    /// Defer propagation until the matching `end_batch`.
    fn begin_batch(&self) {
        self.rt.begin_batch();
    }

    /// Close a batch, flushing once if it was the outermost.
    fn end_batch(&self) -> PyResult<()> {
        self.rt.end_batch().map_err(reactive_err)
    }

    /// Current value of the logical clock.
    fn clock(&self) -> u64 {
        self.rt.clock()
    }

    /// The root scope of this runtime.
    fn root(&self) -> PyScope {
        PyScope {
            rt: Rc::clone(&self.rt),
            inner: self.root,
        }
    }

    /// Tear down the whole graph under the root scope.
    fn dispose(&self) -> PyResult<()> {
        self.root.clean_up(&self.rt).map_err(reactive_err)
    }

    fn __repr__(&self) -> String {
        format!("Runtime(clock={})", self.rt.clock())
    }
}

/// Python-exposed signal handle.
#[pyclass(name = "Signal", unsendable)]
pub struct PySignal {
    rt: Rc<Runtime<PyValue>>,
    inner: Signal<PyValue>,
}

#[pymethods]
impl PySignal {
    /// Read the value, registering the running computation as an observer.
    fn get(&self) -> PyResult<PyObject> {
        self.inner
            .get(&self.rt)
            .map(|value| value.0)
            .map_err(reactive_err)
    }

    /// Read the value without registering an observer.
    fn peek(&self) -> PyResult<PyObject> {
        self.inner
            .get_untracked(&self.rt)
            .map(|value| value.0)
            .map_err(reactive_err)
    }

    /// Write a new value; equal values (Python `==`) are ignored.
    fn set(&self, value: PyObject) -> PyResult<()> {
        self.inner.set(&self.rt, PyValue(value)).map_err(reactive_err)
    }

    /// How many times the signal has been written with a distinct value.
    fn version(&self) -> PyResult<u64> {
        self.inner.version(&self.rt).map_err(reactive_err)
    }

    /// Remove the cell from the graph.
    fn dispose(&self) -> PyResult<()> {
        self.inner.dispose(&self.rt).map_err(reactive_err)
    }

    fn __repr__(&self, py: Python<'_>) -> String {
        let value = match self.inner.get_untracked(&self.rt) {
            Ok(value) => value
                .0
                .bind(py)
                .repr()
                .map(|repr| repr.to_string())
                .unwrap_or_else(|_| "?".to_string()),
            Err(_) => "<disposed>".to_string(),
        };
        format!("Signal(id={}, value={})", self.inner.id(), value)
    }
}

/// Python-exposed memo handle.
#[pyclass(name = "Memo", unsendable)]
pub struct PyMemo {
    rt: Rc<Runtime<PyValue>>,
    inner: Memo<PyValue>,
}

#[pymethods]
impl PyMemo {
    /// Read the cached value, registering the running computation as an
    /// observer.
    fn get(&self) -> PyResult<PyObject> {
        self.inner
            .get(&self.rt)
            .map(|value| value.0)
            .map_err(reactive_err)
    }

    /// Read the cached value without registering an observer.
    fn peek(&self) -> PyResult<PyObject> {
        self.inner
            .get_untracked(&self.rt)
            .map(|value| value.0)
            .map_err(reactive_err)
    }

    /// Dispose the memo and everything it owns.
    fn dispose(&self) -> PyResult<()> {
        self.inner.dispose(&self.rt).map_err(reactive_err)
    }

    fn __repr__(&self) -> String {
        format!("Memo(id={})", self.inner.id())
    }
}

/// Python-exposed scope handle, used to force-dispose a subtree when the
/// host tears down a language-level construct.
#[pyclass(name = "Scope", unsendable)]
pub struct PyScope {
    rt: Rc<Runtime<PyValue>>,
    inner: Scope<PyValue>,
}

#[pymethods]
impl PyScope {
    /// Dispose the scope and everything it transitively owns.
    fn dispose(&self) -> PyResult<()> {
        self.inner.clean_up(&self.rt).map_err(reactive_err)
    }

    /// Whether the scope is still alive.
    fn is_alive(&self) -> bool {
        self.inner.is_alive(&self.rt)
    }

    fn __repr__(&self) -> String {
        format!(
            "Scope(id={}, alive={})",
            self.inner.id(),
            self.inner.is_alive(&self.rt)
        )
    }
}
