//! Template compilation and rendering on top of a [`Loader`].

use std::collections::HashMap;

use handlebars::Handlebars;
use log::debug;
use serde::Serialize;

use crate::loader::{normalize, Loader};
use crate::{fs, Error};

/// A [Handlebars](https://handlebarsjs.com/) registry whose templates are
/// pulled from a loader on demand.
///
/// Compiled templates are registered under their loader cache key, so two
/// names referring to the same file share one compiled template. A template
/// is recompiled whenever the loader reports that it has changed since it
/// was last compiled.
pub struct Templates<'reg, L> {
    loader: L,
    hb: Handlebars<'reg>,
    // Maps cache keys -> time of compilation (seconds since the Unix epoch).
    compiled: HashMap<String, u64>,
}

impl<'reg, L: Loader> Templates<'reg, L> {
    /// Constructor.
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            hb: Handlebars::new(),
            compiled: HashMap::new(),
        }
    }

    /// Fail rendering when a template refers to a missing variable.
    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.hb.set_strict_mode(strict);
        self
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Make sure an up-to-date compiled copy of the template with the given
    /// name is registered, returning the name under which it is registered.
    pub fn compile(&mut self, name: &str) -> Result<String, Error> {
        let key = self.loader.cache_key(name)?;
        if let Some(&compiled_at) = self.compiled.get(&key) {
            if self.loader.is_fresh(name, compiled_at)? {
                debug!("Template {} is fresh, skipping compilation", key);
                return Ok(key);
            }
            debug!("Template {} changed since {}, recompiling", key, compiled_at);
        }
        let source = self.loader.source(name)?;
        self.hb
            .register_template_string(&key, source)
            .map_err(|e| Error::TemplateCompile(name.to_string(), e))?;
        self.compiled.insert(key.clone(), fs::now());
        debug!("Compiled template {}", key);
        Ok(key)
    }

    /// Load the template with the given name and register it as a partial, so
    /// that other templates can include it using `{{> name}}`.
    ///
    /// The partial is registered under the name with leading `.` and `/`
    /// characters removed.
    pub fn register_partial(&mut self, name: &str) -> Result<(), Error> {
        let source = self.loader.source(name)?;
        let partial = normalize(name);
        self.hb
            .register_partial(partial, source)
            .map_err(|e| Error::TemplateCompile(name.to_string(), e))?;
        debug!("Registered partial {}", partial);
        Ok(())
    }

    /// Render the template with the given name using the given data.
    pub fn render<T: Serialize>(&mut self, name: &str, data: &T) -> Result<String, Error> {
        let key = self.compile(name)?;
        self.hb
            .render(&key, data)
            .map_err(|e| Error::TemplateRender(name.to_string(), e))
    }
}
