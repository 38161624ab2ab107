//! weft session - the high-level API for the weft template engine.
//!
//! This crate provides the [`Engine`] struct, which is the main entry
//! point for:
//! - Loading templates through a resource loader
//! - Compiling them to immutable artifacts, cached with staleness checks
//! - Rendering against a variable scope
//!
//! # Quick Start
//!
//! ```
//! use weft_session::{Engine, Value};
//! use weft_source::InMemoryLoader;
//!
//! let loader = InMemoryLoader::new().with("hello.tpl", "Hello {$name|upper}!");
//! let engine = Engine::new(loader);
//!
//! let out = engine
//!     .render("hello.tpl", [("name".to_string(), Value::from("joe"))])
//!     .unwrap();
//! assert_eq!(out, "Hello JOE!");
//! ```

mod cache;
mod config;

pub use cache::{CacheEntry, Fingerprint, TemplateCache};
pub use config::{ConfigError, EngineConfig};

// Re-export commonly used types from dependencies for convenience
pub use weft_core::{
    CompileError, Error, Reflect, RuntimeError, Template, Token, TokenizeError, Value,
};
pub use weft_lang::{
    Block, Compiler, Function, HostFunctions, Renderer, TemplateContext, TemplateEnv,
};
pub use weft_source::{DirLoader, InMemoryLoader, ResourceLoader, SourceError};

use std::cell::RefCell;
use std::sync::Arc;

use tracing::{debug, trace};

use weft_stdlib::register_standard;

/// The template engine: a resource loader, a compiled-artifact cache and
/// a base context carrying the standard registries.
///
/// An engine is single-threaded; run one per thread, sharing nothing.
/// Compiled artifacts are immutable once produced, so cache races at
/// worst cost a redundant recompile.
pub struct Engine {
    loader: Box<dyn ResourceLoader>,
    config: EngineConfig,
    base: TemplateContext,
    cache: RefCell<TemplateCache>,
}

impl Engine {
    /// Create an engine with the default configuration.
    pub fn new(loader: impl ResourceLoader + 'static) -> Self {
        Self::with_config(loader, EngineConfig::default())
    }

    /// Create an engine with a custom configuration.
    pub fn with_config(loader: impl ResourceLoader + 'static, config: EngineConfig) -> Self {
        let mut base = TemplateContext::new();
        register_standard(&mut base);
        if config.auto_escape {
            base.add_output_filter("escape");
        }
        Self {
            loader: Box::new(loader),
            cache: RefCell::new(TemplateCache::new(config.cache_limit)),
            config,
            base,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The base context new renders derive from.
    pub fn context(&self) -> &TemplateContext {
        &self.base
    }

    /// Register a custom block.
    pub fn register_block(&mut self, block: Arc<dyn Block>) {
        self.base.set_block(block);
    }

    /// Register a custom function (usable as a filter too).
    pub fn register_function(&mut self, name: impl Into<String>, function: Function) {
        self.base.set_function(name, function);
    }

    /// Register an output filter appended to every printed expression.
    pub fn register_output_filter(&mut self, name: impl Into<String>) {
        self.base.add_output_filter(name);
    }

    /// Set a variable visible to every render.
    pub fn set_global(&mut self, name: &str, value: Value) {
        self.base.set_variable(name, value);
    }

    /// Install the host-function fallback consulted for unregistered
    /// function names.
    pub fn set_host_functions(&mut self, host: Arc<dyn HostFunctions>) {
        self.base.set_host_functions(host);
    }

    /// Render a template by resource name.
    pub fn render(
        &self,
        name: &str,
        vars: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<String, Error> {
        let template = self.load_template(name)?;
        self.render_template(&template, vars)
    }

    /// Compile and render a template source directly. String templates
    /// are not cached.
    pub fn render_str(
        &self,
        source: &str,
        vars: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<String, Error> {
        let mut compiler = Compiler::new(&*self.loader, self.base.create_child());
        let template = compiler.compile("<string>", source)?;
        self.render_template(&template, vars)
    }

    /// Compile a template by name (or fetch it from the cache) without
    /// rendering it.
    pub fn load_template(&self, name: &str) -> Result<Arc<Template>, Error> {
        let options = self.config.compile_signature();
        let fingerprint = Fingerprint::compute(name, &options, None);

        let cached = self.cache.borrow_mut().get(fingerprint);
        if let Some(entry) = cached {
            if self.config.trust_cache || self.is_fresh(&entry) {
                trace!(resource = name, "template cache hit");
                return Ok(entry.template);
            }
            debug!(resource = name, "cached template is stale");
            self.cache.borrow_mut().invalidate(fingerprint);
        }

        debug!(resource = name, "compiling template");
        let source = match self.loader.get_resource(name) {
            Ok(source) => source,
            Err(SourceError::NotFound(n)) => return Err(Error::NotFound(n)),
            Err(e) => {
                return Err(CompileError::new(name, 0, format!("failed to load: {e}")).into());
            }
        };
        let mut compiler = Compiler::new(&*self.loader, self.base.create_child());
        let template = Arc::new(compiler.compile(name, &source)?);
        self.cache
            .borrow_mut()
            .insert(fingerprint, Arc::clone(&template));
        Ok(template)
    }

    /// Precompile every resource matching the configured glob.
    pub fn warm_cache(&self) -> Result<usize, Error> {
        let names = self
            .loader
            .names(&self.config.template_glob)
            .map_err(|e| CompileError::new("<cache warm>", 0, e.to_string()))?;
        let count = names.len();
        for name in names {
            self.load_template(&name)?;
        }
        debug!(count, "cache warmed");
        Ok(count)
    }

    /// Drop every cached artifact.
    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    /// Number of cached artifacts.
    pub fn cached_templates(&self) -> usize {
        self.cache.borrow().len()
    }

    fn render_template(
        &self,
        template: &Template,
        vars: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<String, Error> {
        let mut ctx = self.base.create_child();
        for (name, value) in vars {
            ctx.set_variable(&name, value);
        }
        let mut renderer = Renderer::new(self);
        renderer.render(template, &mut ctx)
    }

    /// Advisory staleness check: a cached artifact is fresh while none
    /// of the resources it touched is newer than its creation time.
    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        entry.template.dependencies.iter().all(|dep| {
            match self.loader.modification_time(dep) {
                Some(mtime) => mtime <= entry.created,
                None => true,
            }
        })
    }
}

impl TemplateEnv for Engine {
    fn load(&self, name: &str) -> Result<Arc<Template>, Error> {
        self.load_template(name)
    }
}
