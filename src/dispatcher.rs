//! Module dispatcher.
//!
//! The dispatcher owns the api-point registry, the registered modules, the
//! timer pool and its own mailbox. [`Dispatcher::exec`] wires every declared
//! emitter to every matching detector, runs the staged start-up (plain
//! modules on the caller thread, async modules each on their own thread,
//! slaves on their master's thread), holds every runnable entity at a start
//! rendezvous until the whole set has reported, then runs the event loops
//! until quit and tears everything down in reverse.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::loader::{self, ExportGuard, LoadError, ModuleLibrary};
use crate::logger::Logger;
use crate::module::{Module, ModuleContext, ModuleHandle, ModuleKind, Settings};
use crate::queue::Mailbox;
use crate::sigslot::{Signal, SlotAnchor, SlotFn, SlotHolder};
use crate::timer::TimerPool;

/// Process exit codes surfaced by [`Dispatcher::exec`].
pub mod exit_status {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = -1;
}

const DEFAULT_WAIT_PERIOD: Duration = Duration::from_millis(10);

/// Identifier of an api point, unique within one dispatcher.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiId(pub i32);

impl fmt::Display for ApiId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("{0}: module already registered")]
    DuplicateName(String),
    #[error("{master}: master module not found for slave {module}")]
    MasterNotFound { module: String, master: String },
    #[error("{master}: master of slave {module} must be asynchronous")]
    MasterNotAsync { module: String, master: String },
    #[error("{0}: on_loaded stage failed")]
    LoadedStageFailed(String),
    #[error("{0}: main module not found")]
    MainNotFound(String),
    #[error("{0}: main module must be asynchronous")]
    MainNotAsync(String),
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// The per-id collector connecting every emitter to every detector sharing
/// one api point. The concrete argument type is fixed by [`api_point`]; the
/// dispatcher only sees this interface.
pub(crate) trait SlotMapper: Send {
    fn connect_all(&self);
    fn disconnect_all(&self);
    fn add_emitter(&mut self, signal: Box<dyn Any + Send>) -> bool;
    fn add_detector(&mut self, anchor: Weak<SlotAnchor>, slot: Box<dyn Any + Send>) -> bool;
}

struct TypedMapper<A: Clone + Send + 'static> {
    emitters: Vec<Signal<A>>,
    detectors: Vec<(Weak<SlotAnchor>, SlotFn<A>)>,
}

impl<A: Clone + Send + 'static> SlotMapper for TypedMapper<A> {
    fn connect_all(&self) {
        for signal in &self.emitters {
            for (anchor, slot) in &self.detectors {
                if anchor.strong_count() > 0 {
                    signal.connect_erased(anchor.clone(), Arc::clone(slot));
                }
            }
        }
    }

    fn disconnect_all(&self) {
        for signal in &self.emitters {
            signal.disconnect_all();
        }
    }

    fn add_emitter(&mut self, signal: Box<dyn Any + Send>) -> bool {
        match signal.downcast::<Signal<A>>() {
            Ok(signal) => {
                self.emitters.push(*signal);
                true
            }
            Err(_) => false,
        }
    }

    fn add_detector(&mut self, anchor: Weak<SlotAnchor>, slot: Box<dyn Any + Send>) -> bool {
        match slot.downcast::<SlotFn<A>>() {
            Ok(slot) => {
                self.detectors.push((anchor, *slot));
                true
            }
            Err(_) => false,
        }
    }
}

/// A registry entry: id, human-readable description and the typed mapper.
pub struct ApiPoint {
    id: ApiId,
    desc: String,
    mapper: Box<dyn SlotMapper>,
}

impl ApiPoint {
    pub fn id(&self) -> ApiId {
        self.id
    }

    pub fn description(&self) -> &str {
        &self.desc
    }
}

/// Builds the registry entry for api point `id`, fixing `A` as the argument
/// type of every emitter and detector registered under that id.
pub fn api_point<A: Clone + Send + 'static>(id: ApiId, desc: &str) -> ApiPoint {
    ApiPoint {
        id,
        desc: desc.to_string(),
        mapper: Box::new(TypedMapper::<A> {
            emitters: Vec::new(),
            detectors: Vec::new(),
        }),
    }
}

/// Rendezvous holding every runnable entity until the whole set has reported
/// its start result. Crossed once per process lifetime, so the micro-sleep
/// spin on the reader side is acceptable.
pub(crate) struct StartBarrier {
    expected: AtomicUsize,
    reported: AtomicUsize,
    failed: AtomicBool,
}

impl StartBarrier {
    fn new() -> Self {
        Self {
            expected: AtomicUsize::new(0),
            reported: AtomicUsize::new(0),
            failed: AtomicBool::new(false),
        }
    }

    fn reset(&self, expected: usize) {
        self.expected.store(expected, Ordering::SeqCst);
        self.reported.store(0, Ordering::SeqCst);
        self.failed.store(false, Ordering::SeqCst);
    }

    pub(crate) fn report(&self, ok: bool) {
        if !ok {
            self.failed.store(true, Ordering::SeqCst);
        }
        self.reported.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn complete(&self) -> bool {
        self.reported.load(Ordering::SeqCst) >= self.expected.load(Ordering::SeqCst)
    }

    pub(crate) fn succeeded(&self) -> bool {
        !self.failed.load(Ordering::SeqCst)
    }

    pub(crate) fn wait(&self) {
        while !self.complete() {
            thread::sleep(Duration::from_micros(10));
        }
    }
}

/// State shared between the dispatcher, module contexts, timer callbacks and
/// the threads spawned by `exec`.
pub(crate) struct DispatcherCore {
    quit: AtomicBool,
    pub(crate) queue: Arc<Mailbox>,
    pub(crate) timers: TimerPool,
    logger: Arc<dyn Logger>,
    queued_log: AtomicBool,
    wait_period_us: AtomicU64,
    pub(crate) barrier: StartBarrier,
}

impl DispatcherCore {
    fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            quit: AtomicBool::new(false),
            queue: Arc::new(Mailbox::new()),
            timers: TimerPool::new(),
            logger,
            queued_log: AtomicBool::new(false),
            wait_period_us: AtomicU64::new(DEFAULT_WAIT_PERIOD.as_micros() as u64),
            barrier: StartBarrier::new(),
        }
    }

    pub(crate) fn quit(&self) {
        self.quit.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_quit(&self) -> bool {
        self.quit.load(Ordering::SeqCst)
    }

    pub(crate) fn wait_period(&self) -> Duration {
        Duration::from_micros(self.wait_period_us.load(Ordering::Relaxed))
    }

    fn set_wait_period(&self, period: Duration) {
        self.wait_period_us
            .store(period.as_micros() as u64, Ordering::Relaxed);
    }

    /// Switches log routing: `false` calls the sink directly, `true` defers
    /// every message onto the dispatcher mailbox.
    fn set_queued_log(&self, queued: bool) {
        self.queued_log.store(queued, Ordering::SeqCst);
    }

    pub(crate) fn log_info(&self, text: &str) {
        if self.queued_log.load(Ordering::SeqCst) {
            let logger = Arc::clone(&self.logger);
            let text = text.to_owned();
            self.queue.push(move || logger.info(&text));
        } else {
            self.logger.info(text);
        }
    }

    pub(crate) fn log_debug(&self, text: &str) {
        if self.queued_log.load(Ordering::SeqCst) {
            let logger = Arc::clone(&self.logger);
            let text = text.to_owned();
            self.queue.push(move || logger.debug(&text));
        } else {
            self.logger.debug(text);
        }
    }

    pub(crate) fn log_warn(&self, text: &str) {
        if self.queued_log.load(Ordering::SeqCst) {
            let logger = Arc::clone(&self.logger);
            let text = text.to_owned();
            self.queue.push(move || logger.warn(&text));
        } else {
            self.logger.warn(text);
        }
    }

    pub(crate) fn log_error(&self, text: &str) {
        if self.queued_log.load(Ordering::SeqCst) {
            let logger = Arc::clone(&self.logger);
            let text = text.to_owned();
            self.queue.push(move || logger.error(&text));
        } else {
            self.logger.error(text);
        }
    }
}

/// Owning record of a registered module.
///
/// Field order matters: the module instance (inside `handle`) and the export
/// guard go away before the library handle does.
struct ModuleRecord {
    handle: ModuleHandle,
    kind: ModuleKind,
    /// Keeps the receiver anchor alive; dropping it severs every connection
    /// aimed at this module.
    _holder: SlotHolder,
    mailbox: Option<Arc<Mailbox>>,
    /// Master module name for slaves; `None` means the dispatcher itself.
    master: Option<String>,
    _export: Option<ExportGuard>,
    _library: Option<ModuleLibrary>,
}

/// Cloneable handle whose `quit` is one atomic store, safe to call from any
/// thread and from OS signal handlers.
#[derive(Clone)]
pub struct QuitHandle {
    core: Arc<DispatcherCore>,
}

impl QuitHandle {
    pub fn quit(&self) {
        self.core.quit();
    }

    pub fn is_quit(&self) -> bool {
        self.core.is_quit()
    }
}

/// The process-wide orchestrator.
pub struct Dispatcher {
    core: Arc<DispatcherCore>,
    api: BTreeMap<ApiId, ApiPoint>,
    records: Vec<ModuleRecord>,
    main_module: Option<String>,
    settings: Settings,
    search_paths: Vec<PathBuf>,
    module_registered: Signal<String>,
    module_started: Signal<String>,
}

impl Dispatcher {
    /// Builds a dispatcher over the given api-point registry. The logger sink
    /// outlives the dispatcher by construction (shared ownership).
    pub fn new(api: Vec<ApiPoint>, settings: Settings, logger: Arc<dyn Logger>) -> Self {
        Self {
            core: Arc::new(DispatcherCore::new(logger)),
            api: api.into_iter().map(|point| (point.id, point)).collect(),
            records: Vec::new(),
            main_module: None,
            settings,
            search_paths: Vec::new(),
            module_registered: Signal::new(),
            module_started: Signal::new(),
        }
    }

    /// Sets how long run loops block on their mailbox before re-checking the
    /// quit flag.
    pub fn set_wait_period(&self, period: Duration) {
        self.core.set_wait_period(period);
    }

    /// Appends a directory searched when a module library is given by a
    /// relative path. With no search paths configured the current directory
    /// is used.
    pub fn add_search_path(&mut self, dir: impl Into<PathBuf>) {
        self.search_paths.push(dir.into());
    }

    /// Requests shutdown of every run loop. Safe from any thread.
    pub fn quit(&self) {
        self.core.quit();
    }

    pub fn is_quit(&self) -> bool {
        self.core.is_quit()
    }

    pub fn quit_handle(&self) -> QuitHandle {
        QuitHandle {
            core: Arc::clone(&self.core),
        }
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn is_module_registered(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Emitted with the module name after each successful registration.
    pub fn module_registered(&self) -> &Signal<String> {
        &self.module_registered
    }

    /// Emitted with the module name as each async-managed module reports a
    /// successful start.
    pub fn module_started(&self) -> &Signal<String> {
        &self.module_started
    }

    /// Designates the async module run inline on the thread that calls
    /// `exec` (the dispatcher loop then moves to its own thread).
    pub fn set_main_module(&mut self, name: &str) -> Result<(), RegisterError> {
        match self.find(name) {
            None => {
                self.core.log_error(&format!("{name}: main module not found"));
                Err(RegisterError::MainNotFound(name.to_string()))
            }
            Some(record) if !record.kind.uses_mailbox() => {
                self.core
                    .log_error(&format!("{name}: main module must be asynchronous"));
                Err(RegisterError::MainNotAsync(name.to_string()))
            }
            Some(_) => {
                self.main_module = Some(name.to_string());
                Ok(())
            }
        }
    }

    /// Registers a statically constructed module.
    ///
    /// `master` names the master of a slave module; `None` binds a slave to
    /// the dispatcher itself. Non-slave modules ignore it.
    pub fn register_module(
        &mut self,
        name: &str,
        master: Option<&str>,
        module: Arc<dyn Module>,
    ) -> Result<(), RegisterError> {
        self.register_internal(name, master, module, None, None)
    }

    /// Registers a module loaded from the shared library at `path`. Relative
    /// paths are resolved against the configured search directories.
    pub fn register_module_from_path(
        &mut self,
        path: impl AsRef<Path>,
        name: &str,
        master: Option<&str>,
    ) -> Result<(), RegisterError> {
        let resolved = match self.resolve_library_path(path.as_ref()) {
            Ok(resolved) => resolved,
            Err(err) => {
                self.core.log_error(&err.to_string());
                return Err(err.into());
            }
        };
        let library = match ModuleLibrary::open(&resolved) {
            Ok(library) => library,
            Err(err) => {
                self.core.log_error(&err.to_string());
                return Err(err.into());
            }
        };
        let (module, export) = match library.create_module() {
            Ok(created) => created,
            Err(err) => {
                self.core
                    .log_error(&format!("{}: {}", resolved.display(), err));
                return Err(err.into());
            }
        };
        self.register_internal(name, master, module, Some(export), Some(library))
    }

    /// Registers a module from the shared library whose file name is derived
    /// from the module name by the platform convention.
    pub fn register_module_by_name(
        &mut self,
        name: &str,
        master: Option<&str>,
    ) -> Result<(), RegisterError> {
        self.register_module_from_path(loader::library_filename(name), name, master)
    }

    /// Runs the staged start-up, the event loops and the teardown. Returns 0
    /// on success and nonzero when start-up failed or the main module's run
    /// returned a failure.
    pub fn exec(&mut self) -> i32 {
        self.connect_all();

        let started = self.start_plain_modules();
        let mut rc = exit_status::FAILURE;

        if started {
            // From here until finalize, log calls arrive through the
            // dispatcher mailbox.
            self.core.set_queued_log(true);
            rc = self.exec_main();
        }

        self.finalize(started);
        rc
    }

    fn connect_all(&self) {
        for point in self.api.values() {
            point.mapper.connect_all();
        }
    }

    fn start_plain_modules(&self) -> bool {
        for record in &self.records {
            if record.kind != ModuleKind::Plain {
                continue;
            }
            if !record.handle.start(&self.settings) {
                return false;
            }
        }
        true
    }

    fn exec_main(&mut self) -> i32 {
        let mut entries = Vec::new();
        let mut main_entry = None;

        for record in &self.records {
            if record.kind != ModuleKind::Async {
                continue;
            }
            let slaves = self
                .records
                .iter()
                .filter(|r| {
                    r.kind.is_slave() && r.master.as_deref() == Some(record.handle.name())
                })
                .map(|r| r.handle.clone())
                .collect();
            let entry = AsyncEntry {
                handle: record.handle.clone(),
                mailbox: Arc::clone(
                    record.mailbox.as_ref().expect("async module has a mailbox"),
                ),
                slaves,
                core: Arc::clone(&self.core),
                settings: self.settings.clone(),
                started_signal: self.module_started.clone(),
            };
            if self.main_module.as_deref() == Some(record.handle.name()) {
                main_entry = Some(entry);
            } else {
                entries.push(entry);
            }
        }

        let dispatcher_slaves: Vec<ModuleHandle> = self
            .records
            .iter()
            .filter(|r| r.kind.is_slave() && r.master.is_none())
            .map(|r| r.handle.clone())
            .collect();

        // Runnable entities: every async module plus the dispatcher loop.
        let runnable = entries.len() + usize::from(main_entry.is_some()) + 1;
        self.core.barrier.reset(runnable);

        let mut threads = Vec::new();
        for entry in entries {
            threads.push(thread::spawn(move || entry.run()));
        }

        let main_rc = match main_entry {
            Some(entry) => {
                let core = Arc::clone(&self.core);
                let settings = self.settings.clone();
                let loop_thread =
                    thread::spawn(move || dispatcher_loop(core, dispatcher_slaves, settings));
                let rc = entry.run();
                let _ = loop_thread.join();
                rc
            }
            None => {
                dispatcher_loop(
                    Arc::clone(&self.core),
                    dispatcher_slaves,
                    self.settings.clone(),
                );
                exit_status::SUCCESS
            }
        };

        for thread in threads {
            let _ = thread.join();
        }

        if main_rc == exit_status::SUCCESS && self.core.barrier.succeeded() {
            exit_status::SUCCESS
        } else {
            exit_status::FAILURE
        }
    }

    /// Idempotent teardown, also run from `Drop`.
    fn finalize(&mut self, clean_start: bool) {
        // Timers first, so no firing can touch a module below.
        self.core.timers.shutdown();

        if clean_start {
            self.core.queue.call_all();
        } else {
            self.core.queue.clear();
        }

        self.core.set_queued_log(false);

        // Async-managed modules were finished by their run wrappers; the
        // at-most-once guard makes this a plain sweep in reverse
        // registration order.
        for record in self.records.iter().rev() {
            record.handle.finish();
        }

        for point in self.api.values() {
            point.mapper.disconnect_all();
        }
        self.module_registered.disconnect_all();
        self.module_started.disconnect_all();

        for record in self.records.drain(..).rev() {
            self.core
                .log_debug(&format!("{}: unregistered", record.handle.name()));
            drop(record);
        }

        self.core.queue.call_all();
    }

    fn find(&self, name: &str) -> Option<&ModuleRecord> {
        self.records.iter().find(|r| r.handle.name() == name)
    }

    fn resolve_master(
        &self,
        module: &str,
        master: Option<&str>,
    ) -> Result<(Arc<Mailbox>, Option<String>), RegisterError> {
        let Some(master_name) = master else {
            return Ok((Arc::clone(&self.core.queue), None));
        };
        let Some(record) = self.find(master_name) else {
            self.core.log_error(&format!(
                "{master_name}: master module not found for slave {module}"
            ));
            return Err(RegisterError::MasterNotFound {
                module: module.to_string(),
                master: master_name.to_string(),
            });
        };
        match &record.mailbox {
            Some(mailbox) if record.kind.uses_mailbox() => {
                Ok((Arc::clone(mailbox), Some(master_name.to_string())))
            }
            _ => {
                self.core.log_error(&format!(
                    "{master_name}: master of slave {module} must be asynchronous"
                ));
                Err(RegisterError::MasterNotAsync {
                    module: module.to_string(),
                    master: master_name.to_string(),
                })
            }
        }
    }

    fn resolve_library_path(&self, path: &Path) -> Result<PathBuf, LoadError> {
        if path.as_os_str().is_empty() {
            return Err(LoadError::InvalidPath);
        }
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        if self.search_paths.is_empty() {
            return Ok(Path::new(".").join(path));
        }
        for dir in &self.search_paths {
            let candidate = dir.join(path);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
        Err(LoadError::FileNotFound(path.to_path_buf()))
    }

    fn register_internal(
        &mut self,
        name: &str,
        master: Option<&str>,
        module: Arc<dyn Module>,
        export: Option<ExportGuard>,
        library: Option<ModuleLibrary>,
    ) -> Result<(), RegisterError> {
        if self.find(name).is_some() {
            self.core
                .log_error(&format!("{name}: module already registered"));
            return Err(RegisterError::DuplicateName(name.to_string()));
        }

        let kind = module.kind();
        let (mailbox, holder, master_mailbox, master_name) = match kind {
            ModuleKind::Plain => (None, SlotHolder::direct(), None, None),
            ModuleKind::Async => {
                let mailbox = Arc::new(Mailbox::new());
                (
                    Some(Arc::clone(&mailbox)),
                    SlotHolder::queued(mailbox),
                    None,
                    None,
                )
            }
            ModuleKind::Slave => {
                let (target, master_name) = self.resolve_master(name, master)?;
                (
                    None,
                    SlotHolder::queued(Arc::clone(&target)),
                    Some(target),
                    master_name,
                )
            }
        };

        let ctx = ModuleContext {
            name: Arc::from(name),
            kind,
            core: Arc::clone(&self.core),
            mailbox: mailbox.clone(),
            master_mailbox,
        };

        if !module.on_loaded(&ctx) {
            self.core
                .log_error(&format!("{name}: on_loaded stage failed"));
            return Err(RegisterError::LoadedStageFailed(name.to_string()));
        }

        for entry in module.emitters() {
            match self.api.get_mut(&entry.id) {
                Some(point) => {
                    if !point.mapper.add_emitter(entry.signal) {
                        self.core.log_error(&format!(
                            "{name}: emitter {} has a mismatched argument type, endpoint dropped",
                            entry.id
                        ));
                    }
                }
                None => {
                    self.core.log_warn(&format!(
                        "{name}: emitter {} has no api point, endpoint dropped",
                        entry.id
                    ));
                }
            }
        }

        for entry in module.detectors() {
            match self.api.get_mut(&entry.id) {
                Some(point) => {
                    let anchor = Arc::downgrade(holder.anchor());
                    if !point.mapper.add_detector(anchor, entry.slot) {
                        self.core.log_error(&format!(
                            "{name}: detector {} has a mismatched argument type, endpoint dropped",
                            entry.id
                        ));
                    }
                }
                None => {
                    self.core.log_warn(&format!(
                        "{name}: detector {} has no api point, endpoint dropped",
                        entry.id
                    ));
                }
            }
        }

        let handle = ModuleHandle::new(module, ctx);
        self.records.push(ModuleRecord {
            handle,
            kind,
            _holder: holder,
            mailbox,
            master: master_name,
            _export: export,
            _library: library,
        });

        self.module_registered.emit(name.to_string());
        self.core.log_debug(&format!("{name}: registered"));
        Ok(())
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.finalize(true);
    }
}

/// Everything an async module's thread needs: the module, its mailbox, its
/// slave children and the shared core.
struct AsyncEntry {
    handle: ModuleHandle,
    mailbox: Arc<Mailbox>,
    slaves: Vec<ModuleHandle>,
    core: Arc<DispatcherCore>,
    settings: Settings,
    started_signal: Signal<String>,
}

impl AsyncEntry {
    /// Thread entry of an async module: start self and slaves, rendezvous,
    /// drain, run, drain, finish.
    fn run(self) -> i32 {
        let mut ok = self.handle.start(&self.settings);
        if ok {
            self.started_signal.emit(self.handle.name().to_string());
            for slave in &self.slaves {
                if slave.start(&self.settings) {
                    self.started_signal.emit(slave.name().to_string());
                } else {
                    ok = false;
                }
            }
        }

        self.core.barrier.report(ok);
        self.core.barrier.wait();

        if !self.core.barrier.succeeded() {
            self.core.quit();
            self.finish_all();
            return exit_status::FAILURE;
        }

        self.mailbox.call_all();
        if self.core.is_quit() {
            self.finish_all();
            return exit_status::FAILURE;
        }

        let rc = self.handle.module.run(&self.handle.ctx);

        self.mailbox.call_all();
        self.finish_all();
        rc
    }

    fn finish_all(&self) {
        for slave in &self.slaves {
            slave.finish();
        }
        self.handle.finish();
    }
}

/// The dispatcher's own loop: hosts dispatcher-bound slaves and drains the
/// dispatcher mailbox (queued log calls, dispatcher-routed timers,
/// dispatcher-bound slave slots) until quit.
fn dispatcher_loop(core: Arc<DispatcherCore>, slaves: Vec<ModuleHandle>, settings: Settings) {
    let mut ok = true;
    for slave in &slaves {
        if !slave.start(&settings) {
            ok = false;
        }
    }

    core.barrier.report(ok);
    core.barrier.wait();

    if !core.barrier.succeeded() {
        core.quit();
    }

    while !core.is_quit() {
        core.queue.wait_for(core.wait_period());
        core.queue.call_all();
    }

    // Timers stop firing before any module can be torn down.
    core.timers.destroy_all();
    core.queue.call_all();
}
