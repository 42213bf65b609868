#![doc = r#"# patchbay

An in-process component runtime. A host constructs a [`Dispatcher`] with a
table of api points and a logger sink, registers modules (statically linked or
loaded from shared libraries), and calls [`Dispatcher::exec`]. The dispatcher
wires every declared emitter to every matching detector over a typed
signal/slot bus, runs the staged start-up across cooperating threads, and
tears everything down in reverse once quit is requested.

## Module Overview
- [`queue`]      – deferred-callback mailbox, the unit of cross-thread delivery.
- [`sigslot`]    – typed signal/slot bus with per-receiver delivery discipline.
- [`timer`]      – shared pool of one-shot and periodic timers on one worker thread.
- [`module`]     – module kinds, lifecycle hooks, and the per-module context.
- [`dispatcher`] – api-point registry, registration, and start/run/stop orchestration.
- [`loader`]     – dynamic-library module loading and the module ABI.
- [`logger`]     – logging sinks consumed by the runtime.
"#]

pub mod dispatcher;
pub mod loader;
pub mod logger;
pub mod module;
pub mod queue;
pub mod sigslot;
pub mod timer;

pub use dispatcher::{
    api_point, exit_status, ApiId, ApiPoint, Dispatcher, QuitHandle, RegisterError,
};
pub use loader::{library_filename, LoadError, ModuleLibrary};
pub use logger::{FacadeLogger, Logger, SimpleLogger};
pub use module::{
    detector, emitter, DetectorEntry, EmitterEntry, Module, ModuleContext, ModuleKind, Settings,
};
pub use queue::Mailbox;
pub use sigslot::{Signal, SlotHolder};
pub use timer::{TimerId, TimerPool};

#[cfg(test)]
mod tests;
