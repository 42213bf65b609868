//! Module kinds, lifecycle hooks, and the per-module context.
//!
//! A module is a hosted component with a name, a lifecycle and two
//! declarative endpoint tables. The dispatcher consults [`ModuleKind`] to
//! decide where the module's slots execute and which thread drives it:
//!
//! - **Plain** — no mailbox; slots run synchronously on the emitting thread,
//!   `on_start` runs on the thread calling [`Dispatcher::exec`].
//! - **Async** — owns a mailbox and a run loop on its own thread; slot
//!   invocations are enqueued onto that mailbox.
//! - **Slave** — delivery is redirected onto the master's mailbox, so the
//!   slave's slots execute on the master's thread. The master is either an
//!   async module or the dispatcher itself.
//!
//! [`Dispatcher::exec`]: crate::dispatcher::Dispatcher::exec

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::dispatcher::{exit_status, DispatcherCore};
use crate::queue::Mailbox;
use crate::sigslot::{Signal, SlotFn};
use crate::timer::TimerId;
use crate::ApiId;

/// Kind of a module, fixed at construction.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    Plain,
    Async,
    Slave,
}

impl ModuleKind {
    /// Whether slot invocations are deferred onto a mailbox owned by the
    /// module itself.
    pub fn uses_mailbox(self) -> bool {
        matches!(self, ModuleKind::Async)
    }

    /// Whether delivery is redirected onto a master.
    pub fn is_slave(self) -> bool {
        matches!(self, ModuleKind::Slave)
    }
}

/// Opaque settings bag handed to every module's `on_start`.
#[derive(Clone)]
pub struct Settings {
    inner: Arc<dyn Any + Send + Sync>,
}

impl Settings {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
        }
    }

    pub fn empty() -> Self {
        Self::new(())
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::empty()
    }
}

/// A declared emitter: an api-point id and a handle to a signal owned by the
/// module. Built with [`emitter`].
pub struct EmitterEntry {
    pub(crate) id: ApiId,
    pub(crate) signal: Box<dyn Any + Send>,
}

/// Declares `signal` as an emitter for api point `id`.
pub fn emitter<A: Clone + Send + 'static>(id: ApiId, signal: &Signal<A>) -> EmitterEntry {
    EmitterEntry {
        id,
        signal: Box::new(signal.clone()),
    }
}

/// A declared detector: an api-point id and a slot over the module's shared
/// state. Built with [`detector`].
pub struct DetectorEntry {
    pub(crate) id: ApiId,
    pub(crate) slot: Box<dyn Any + Send>,
}

/// Declares `slot` as a detector for api point `id`.
///
/// The slot captures whatever module state it needs; it may run on another
/// thread, so captured state must be shared (`Arc`) and internally
/// synchronized.
pub fn detector<A, F>(id: ApiId, slot: F) -> DetectorEntry
where
    A: Clone + Send + 'static,
    F: Fn(A) + Send + Sync + 'static,
{
    let slot: SlotFn<A> = Arc::new(slot);
    DetectorEntry {
        id,
        slot: Box::new(slot),
    }
}

/// A hosted component.
///
/// Lifecycle: `on_loaded` runs inside registration, before the endpoint tables
/// are wired; `on_start` runs once start-up is orchestrated (on the caller
/// thread for plain modules, on the module's own thread for async modules, on
/// the master's thread for slaves); `run` is the event loop of async modules;
/// `on_finish` is delivered exactly once to every module that started.
///
/// Returning `false` from `on_loaded` fails the registration. Returning
/// `false` from `on_start` keeps the module out of the started set and quits
/// the runtime after the start rendezvous.
pub trait Module: Send + Sync + 'static {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Plain
    }

    /// The module's emitter table. Typically one entry per signal field.
    fn emitters(&self) -> Vec<EmitterEntry> {
        Vec::new()
    }

    /// The module's detector table.
    fn detectors(&self) -> Vec<DetectorEntry> {
        Vec::new()
    }

    fn on_loaded(&self, _ctx: &ModuleContext) -> bool {
        true
    }

    fn on_start(&self, _ctx: &ModuleContext, _settings: &Settings) -> bool {
        true
    }

    fn on_finish(&self, _ctx: &ModuleContext) -> bool {
        true
    }

    fn on_before_run(&self, _ctx: &ModuleContext) {}

    fn on_after_run(&self, _ctx: &ModuleContext) {}

    /// Event loop of an async module, entered on the module's thread after
    /// the start rendezvous.
    ///
    /// The default implementation drains the mailbox until quit. An override
    /// may integrate its own I/O loop but remains obliged to drain
    /// [`ModuleContext::mailbox`] regularly.
    fn run(&self, ctx: &ModuleContext) -> i32 {
        let Some(mailbox) = ctx.mailbox() else {
            ctx.log_error("run requires a mailbox");
            return exit_status::FAILURE;
        };
        self.on_before_run(ctx);
        while !ctx.is_quit() {
            mailbox.wait_for(ctx.wait_period());
            mailbox.call_all();
        }
        self.on_after_run(ctx);
        exit_status::SUCCESS
    }
}

/// Per-module handle bound in at registration, cloneable and thread-safe.
///
/// Hooks receive a reference; a module that needs runtime services from its
/// slots or timers can stash a clone during `on_loaded`.
#[derive(Clone)]
pub struct ModuleContext {
    pub(crate) name: Arc<str>,
    pub(crate) kind: ModuleKind,
    pub(crate) core: Arc<DispatcherCore>,
    pub(crate) mailbox: Option<Arc<Mailbox>>,
    pub(crate) master_mailbox: Option<Arc<Mailbox>>,
}

impl ModuleContext {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    /// Requests runtime shutdown. Safe to call from any thread.
    pub fn quit(&self) {
        self.core.quit();
    }

    pub fn is_quit(&self) -> bool {
        self.core.is_quit()
    }

    /// The mailbox wait period configured on the dispatcher.
    pub fn wait_period(&self) -> Duration {
        self.core.wait_period()
    }

    /// The module's own mailbox; `None` unless the module is async.
    pub fn mailbox(&self) -> Option<&Arc<Mailbox>> {
        self.mailbox.as_ref()
    }

    pub fn log_info(&self, message: &str) {
        self.core.log_info(&format!("{}: {}", self.name, message));
    }

    pub fn log_debug(&self, message: &str) {
        self.core.log_debug(&format!("{}: {}", self.name, message));
    }

    pub fn log_warn(&self, message: &str) {
        self.core.log_warn(&format!("{}: {}", self.name, message));
    }

    pub fn log_error(&self, message: &str) {
        self.core.log_error(&format!("{}: {}", self.name, message));
    }

    /// Acquires a timer whose callback is routed like one of this module's
    /// slots: onto the module's mailbox for async modules, onto the master's
    /// mailbox for slaves, invoked directly on the timer worker thread for
    /// plain modules. A zero `period` means one-shot.
    pub fn acquire_timer<F>(&self, delay: Duration, period: Duration, callback: F) -> TimerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        match self.delivery_mailbox() {
            Some(mailbox) => {
                let mailbox = Arc::clone(mailbox);
                let callback: Arc<dyn Fn() + Send + Sync> = Arc::new(callback);
                self.core.timers.create(delay, period, move || {
                    let callback = Arc::clone(&callback);
                    mailbox.push(move || callback());
                })
            }
            None => self.core.timers.create(delay, period, callback),
        }
    }

    /// Acquires a timer whose callback is processed from the dispatcher's
    /// mailbox.
    pub fn acquire_dispatcher_timer<F>(&self, delay: Duration, period: Duration, callback: F) -> TimerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mailbox = Arc::clone(&self.core.queue);
        let callback: Arc<dyn Fn() + Send + Sync> = Arc::new(callback);
        self.core.timers.create(delay, period, move || {
            let callback = Arc::clone(&callback);
            mailbox.push(move || callback());
        })
    }

    pub fn destroy_timer(&self, id: TimerId) -> bool {
        self.core.timers.destroy(id)
    }

    fn delivery_mailbox(&self) -> Option<&Arc<Mailbox>> {
        match self.kind {
            ModuleKind::Async => self.mailbox.as_ref(),
            ModuleKind::Slave => self.master_mailbox.as_ref(),
            ModuleKind::Plain => None,
        }
    }
}

/// Dispatcher-side view of a registered module: the instance plus its
/// lifecycle flags, shared with the threads that drive it.
#[derive(Clone)]
pub(crate) struct ModuleHandle {
    pub(crate) module: Arc<dyn Module>,
    pub(crate) ctx: ModuleContext,
    pub(crate) started: Arc<AtomicBool>,
    pub(crate) finished: Arc<AtomicBool>,
}

impl ModuleHandle {
    pub(crate) fn new(module: Arc<dyn Module>, ctx: ModuleContext) -> Self {
        Self {
            module,
            ctx,
            started: Arc::new(AtomicBool::new(false)),
            finished: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.ctx.name
    }

    pub(crate) fn start(&self, settings: &Settings) -> bool {
        let ok = self.module.on_start(&self.ctx, settings);
        self.started.store(ok, Ordering::SeqCst);
        if !ok {
            self.ctx
                .core
                .log_error(&format!("{}: failed to start module", self.ctx.name));
        }
        ok
    }

    /// Delivers `on_finish` at most once, and only to a started module.
    pub(crate) fn finish(&self) {
        if !self.started.load(Ordering::SeqCst) {
            return;
        }
        if self.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        if !self.module.on_finish(&self.ctx) {
            self.ctx
                .core
                .log_warn(&format!("{}: failed to finalize module", self.ctx.name));
        }
    }
}
