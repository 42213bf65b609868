//! Loadable module used by the loader round-trip tests.

use patchbay::{declare_module, Module, ModuleContext, Settings};

struct FixtureModule;

impl Module for FixtureModule {
    fn on_start(&self, ctx: &ModuleContext, _settings: &Settings) -> bool {
        ctx.log_debug("on_start()");
        ctx.quit();
        true
    }

    fn on_finish(&self, ctx: &ModuleContext) -> bool {
        ctx.log_debug("on_finish()");
        true
    }
}

declare_module!(FixtureModule);
