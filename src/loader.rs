//! Dynamic-library module loading and the module ABI.
//!
//! A loadable module library exports two C-linkage entry points with fixed
//! names: a factory returning a freshly allocated [`ModuleExport`] and a
//! destroyer releasing it in the library that allocated it. The
//! [`declare_module!`] macro generates both from a constructor expression.
//! Both symbols must resolve or the load fails.
//!
//! Module libraries share vtables with the host, so they must be built with
//! the same toolchain as the host binary, the usual contract for Rust plugin
//! systems.
//!
//! [`declare_module!`]: crate::declare_module

use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;
use thiserror::Error;

use crate::module::Module;

pub const MODULE_CTOR_SYMBOL: &str = "__module_ctor__";
pub const MODULE_DTOR_SYMBOL: &str = "__module_dtor__";

/// Heap cell handed across the ABI boundary by a module library. The factory
/// allocates it, the destroyer frees it.
pub struct ModuleExport {
    pub module: Arc<dyn Module>,
}

pub type ModuleCtorFn = unsafe extern "C" fn() -> *mut ModuleExport;
pub type ModuleDtorFn = unsafe extern "C" fn(*mut ModuleExport);

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("library path is empty")]
    InvalidPath,
    #[error("{0}: shared object not found")]
    FileNotFound(PathBuf),
    #[error("{path}: failed to open shared object: {source}")]
    Open {
        path: PathBuf,
        source: libloading::Error,
    },
    #[error("failed to resolve `{name}' for module: {source}")]
    Symbol {
        name: String,
        source: libloading::Error,
    },
    #[error("{0}: module factory returned null")]
    NullModule(PathBuf),
}

/// An open module library.
pub struct ModuleLibrary {
    library: Library,
    path: PathBuf,
}

impl ModuleLibrary {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(LoadError::InvalidPath);
        }
        if !path.is_file() {
            return Err(LoadError::FileNotFound(path.to_path_buf()));
        }
        let library = unsafe { Library::new(path) }.map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            library,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolves both entry points and runs the factory. Returns the module
    /// handle plus the guard that will hand the allocation back to the
    /// library's destroyer. The guard must be dropped before the library.
    pub fn create_module(&self) -> Result<(Arc<dyn Module>, ExportGuard), LoadError> {
        let ctor: libloading::Symbol<'_, ModuleCtorFn> =
            unsafe { self.library.get(MODULE_CTOR_SYMBOL.as_bytes()) }.map_err(|source| {
                LoadError::Symbol {
                    name: MODULE_CTOR_SYMBOL.to_string(),
                    source,
                }
            })?;
        let dtor: libloading::Symbol<'_, ModuleDtorFn> =
            unsafe { self.library.get(MODULE_DTOR_SYMBOL.as_bytes()) }.map_err(|source| {
                LoadError::Symbol {
                    name: MODULE_DTOR_SYMBOL.to_string(),
                    source,
                }
            })?;

        let dtor: ModuleDtorFn = *dtor;
        let ptr = unsafe { ctor() };
        if ptr.is_null() {
            return Err(LoadError::NullModule(self.path.clone()));
        }

        let module = unsafe { Arc::clone(&(*ptr).module) };
        Ok((module, ExportGuard { ptr, dtor }))
    }
}

/// Owns the export cell returned by a module factory; releases it through
/// the library's own destroyer on drop.
pub struct ExportGuard {
    ptr: *mut ModuleExport,
    dtor: ModuleDtorFn,
}

// The cell only carries an `Arc<dyn Module>`, which is Send + Sync; the raw
// pointer alone blocks the auto impl.
unsafe impl Send for ExportGuard {}

impl Drop for ExportGuard {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe { (self.dtor)(self.ptr) };
        }
    }
}

/// Shared-object file name for a module name, by platform convention.
pub fn library_filename(name: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{name}.dll")
    } else if cfg!(target_os = "macos") {
        format!("lib{name}.dylib")
    } else {
        format!("lib{name}.so")
    }
}

/// Generates the two C-linkage entry points a module library must export.
///
/// ```ignore
/// struct LinkModule { /* ... */ }
/// impl patchbay::Module for LinkModule { /* ... */ }
///
/// patchbay::declare_module!(LinkModule::new());
/// ```
#[macro_export]
macro_rules! declare_module {
    ($ctor:expr) => {
        #[no_mangle]
        pub extern "C" fn __module_ctor__() -> *mut $crate::loader::ModuleExport {
            let module: ::std::sync::Arc<dyn $crate::Module> = ::std::sync::Arc::new($ctor);
            ::std::boxed::Box::into_raw(::std::boxed::Box::new($crate::loader::ModuleExport {
                module,
            }))
        }

        #[no_mangle]
        pub extern "C" fn __module_dtor__(ptr: *mut $crate::loader::ModuleExport) {
            if !ptr.is_null() {
                drop(unsafe { ::std::boxed::Box::from_raw(ptr) });
            }
        }
    };
}
