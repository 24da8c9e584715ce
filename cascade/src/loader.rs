//! Loading of template source code by name.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::debug;

use crate::finder::FileFinder;
use crate::{fs, Error, Options};

/// The resource category under which templates are looked up.
pub const VIEWS: &str = "views";

/// The file extension assumed for template names that do not carry one.
pub const DEFAULT_EXTENSION: &str = "twig";

/// What a template engine needs from a source of templates.
pub trait Loader {
    /// Gets the source code of the template with the given name.
    fn source(&self, name: &str) -> Result<String, Error>;

    /// Gets the key under which the compiled form of the template with the
    /// given name should be cached. Names referring to the same template
    /// produce the same key.
    fn cache_key(&self, name: &str) -> Result<String, Error>;

    /// Returns `true` if the template has not been modified since `time`
    /// (seconds since the Unix epoch), i.e. if a compiled copy produced at
    /// `time` is still usable.
    fn is_fresh(&self, name: &str, time: u64) -> Result<bool, Error>;
}

impl<L: Loader + ?Sized> Loader for &L {
    fn source(&self, name: &str) -> Result<String, Error> {
        (**self).source(name)
    }

    fn cache_key(&self, name: &str) -> Result<String, Error> {
        (**self).cache_key(name)
    }

    fn is_fresh(&self, name: &str, time: u64) -> Result<bool, Error> {
        (**self).is_fresh(name, time)
    }
}

/// Loads templates from the `views` category of a cascading file system.
///
/// Resolved paths are remembered for the lifetime of the loader. If a
/// template file is moved, a new loader is needed to find it again.
#[derive(Debug)]
pub struct ViewLoader<F> {
    finder: F,
    extension: String,
    options: Options,
    // Normalized template name -> resolved path.
    cache: Mutex<HashMap<String, PathBuf>>,
}

impl<F: FileFinder> ViewLoader<F> {
    /// Constructor. Templates without an explicit extension are assumed to
    /// use [`DEFAULT_EXTENSION`].
    pub fn new(finder: F) -> Self {
        Self {
            finder,
            extension: DEFAULT_EXTENSION.to_string(),
            options: Options::default(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Override the default template file extension. An empty extension is
    /// ignored.
    pub fn with_extension<S: AsRef<str>>(mut self, extension: S) -> Self {
        let extension = extension.as_ref();
        if !extension.is_empty() {
            self.extension = extension.to_string();
        }
        self
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn finder(&self) -> &F {
        &self.finder
    }

    /// Find the absolute path of the template with the given name.
    ///
    /// Leading `.` and `/` characters are ignored, so `./page` and `page`
    /// refer to the same template. An extension in the name overrides the
    /// default one.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, Error> {
        let normalized = normalize(name);
        // Held across the lookup so that concurrent first requests for the
        // same name only search once.
        let mut cache = self.lock_cache();
        if let Some(path) = cache.get(normalized) {
            debug!("Template {} already resolved to {}", name, path.display());
            return Ok(path.clone());
        }

        let (relative, extension) = split_extension(normalized);
        if relative.is_empty() && extension.is_none() {
            return Err(Error::TemplateNotFound(name.to_string()));
        }
        let extension = extension.unwrap_or(self.extension.as_str());
        let path = self
            .finder
            .find_file(VIEWS, &relative, extension)
            .ok_or_else(|| Error::TemplateNotFound(name.to_string()))?;
        debug!("Resolved template {} to {}", name, path.display());
        cache.insert(normalized.to_string(), path.clone());
        Ok(path)
    }

    fn lock_cache(&self) -> MutexGuard<'_, HashMap<String, PathBuf>> {
        // The map only ever holds complete entries, so a panic elsewhere
        // cannot leave it inconsistent.
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<F: FileFinder> Loader for ViewLoader<F> {
    fn source(&self, name: &str) -> Result<String, Error> {
        fs::read_source(self.resolve(name)?)
    }

    fn cache_key(&self, name: &str) -> Result<String, Error> {
        Ok(self.resolve(name)?.to_string_lossy().into_owned())
    }

    fn is_fresh(&self, name: &str, time: u64) -> Result<bool, Error> {
        Ok(fs::modified(self.resolve(name)?)? < time)
    }
}

/// Strips any leading `.` and `/` characters from a template name.
pub fn normalize(name: &str) -> &str {
    name.trim_start_matches(&['.', '/'][..])
}

// Splits "dir/file.ext" into ("dir/file", Some("ext")). Only the final path
// segment is inspected for an extension, and trailing slashes are ignored. A
// trailing dot gives an explicit empty extension: "page." is the bare file
// "page".
fn split_extension(name: &str) -> (String, Option<&str>) {
    let name = name.trim_end_matches('/');
    let (dir, file) = match name.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, name),
    };
    let (stem, extension) = match file.rsplit_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (file, None),
    };
    let relative = match dir {
        Some(dir) if !dir.is_empty() => format!("{}/{}", dir, stem),
        _ => stem.to_string(),
    };
    (relative, extension)
}

#[cfg(test)]
mod test {
    use std::fs as stdfs;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::CascadingFinder;

    /// A finder backed by a fixed table, counting how often it is asked.
    #[derive(Default)]
    struct FakeFinder {
        files: HashMap<(String, String, String), PathBuf>,
        calls: AtomicUsize,
        requests: Mutex<Vec<(String, String, String)>>,
    }

    impl FakeFinder {
        fn with(mut self, category: &str, relative: &str, extension: &str, path: &Path) -> Self {
            self.files.insert(
                (
                    category.to_string(),
                    relative.to_string(),
                    extension.to_string(),
                ),
                path.to_path_buf(),
            );
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn last_request(&self) -> (String, String, String) {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    impl FileFinder for FakeFinder {
        fn find_file(&self, category: &str, relative: &str, extension: &str) -> Option<PathBuf> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let key = (
                category.to_string(),
                relative.to_string(),
                extension.to_string(),
            );
            self.requests.lock().unwrap().push(key.clone());
            self.files.get(&key).cloned()
        }
    }

    fn cached(loader: &ViewLoader<impl FileFinder>) -> usize {
        loader.lock_cache().len()
    }

    #[test]
    fn normalization_strips_leading_dots_and_slashes() {
        assert_eq!(normalize("./page"), "page");
        assert_eq!(normalize("...//page"), "page");
        assert_eq!(normalize("/layouts/main"), "layouts/main");
        assert_eq!(normalize("layouts/./main"), "layouts/./main");
        assert_eq!(normalize("page."), "page.");
    }

    #[test]
    fn extension_splitting() {
        assert_eq!(split_extension("page"), ("page".to_string(), None));
        assert_eq!(
            split_extension("page.html"),
            ("page".to_string(), Some("html"))
        );
        assert_eq!(
            split_extension("emails/welcome.txt.twig"),
            ("emails/welcome.txt".to_string(), Some("twig"))
        );
        assert_eq!(
            split_extension("v1.2/page"),
            ("v1.2/page".to_string(), None)
        );
        assert_eq!(split_extension("page."), ("page".to_string(), Some("")));
        assert_eq!(split_extension("a/"), ("a".to_string(), None));
        assert_eq!(
            split_extension("layouts/main.tpl//"),
            ("layouts/main".to_string(), Some("tpl"))
        );
        assert_eq!(split_extension(""), ("".to_string(), None));
    }

    #[test]
    fn trailing_dots_and_slashes_reach_the_finder_trimmed() {
        let finder = FakeFinder::default();
        let loader = ViewLoader::new(&finder);

        let _ = loader.resolve("page.");
        assert_eq!(
            finder.last_request(),
            ("views".to_string(), "page".to_string(), "".to_string())
        );
        let _ = loader.resolve("a/");
        assert_eq!(
            finder.last_request(),
            ("views".to_string(), "a".to_string(), "twig".to_string())
        );
        assert_eq!(finder.calls(), 2);
    }

    #[test]
    fn empty_names_are_never_looked_up() {
        let finder = FakeFinder::default();
        let loader = ViewLoader::new(&finder);

        for name in ["", "./", "..//"] {
            match loader.resolve(name) {
                Err(Error::TemplateNotFound(n)) => assert_eq!(n, name),
                other => panic!("expected TemplateNotFound, but got {:?}", other),
            }
        }
        assert_eq!(finder.calls(), 0);
        assert_eq!(cached(&loader), 0);
    }

    #[test]
    fn default_extension_is_used_without_an_explicit_one() {
        let finder = FakeFinder::default();
        let loader = ViewLoader::new(&finder);
        assert_eq!(loader.extension(), DEFAULT_EXTENSION);

        let _ = loader.resolve("page");
        assert_eq!(
            finder.last_request(),
            ("views".to_string(), "page".to_string(), "twig".to_string())
        );
    }

    #[test]
    fn explicit_extension_overrides_the_default() {
        let finder = FakeFinder::default();
        let loader = ViewLoader::new(&finder).with_extension("tpl");

        let _ = loader.resolve("page.html");
        assert_eq!(
            finder.last_request(),
            ("views".to_string(), "page".to_string(), "html".to_string())
        );
        let _ = loader.resolve("layouts/main");
        assert_eq!(
            finder.last_request(),
            (
                "views".to_string(),
                "layouts/main".to_string(),
                "tpl".to_string()
            )
        );
    }

    #[test]
    fn empty_extension_override_is_ignored() {
        let loader = ViewLoader::new(FakeFinder::default()).with_extension("");
        assert_eq!(loader.extension(), DEFAULT_EXTENSION);
    }

    #[test]
    fn leading_dot_slash_is_stripped_before_lookup() {
        let finder = FakeFinder::default();
        let loader = ViewLoader::new(&finder);

        let _ = loader.resolve("./page");
        assert_eq!(finder.last_request().1, "page");
    }

    #[test]
    fn cache_keys_are_stable() {
        let path = Path::new("/app/views/page.twig");
        let finder = FakeFinder::default().with("views", "page", "twig", path);
        let loader = ViewLoader::new(&finder);

        let first = loader.cache_key("page").unwrap();
        let second = loader.cache_key("page").unwrap();
        assert_eq!(first, "/app/views/page.twig");
        assert_eq!(first, second);
        assert_eq!(finder.calls(), 1);
    }

    #[test]
    fn equivalent_names_share_a_cache_entry() {
        let path = Path::new("/app/views/page.twig");
        let finder = FakeFinder::default().with("views", "page", "twig", path);
        let loader = ViewLoader::new(&finder);

        let a = loader.resolve("./page").unwrap();
        let b = loader.resolve("page").unwrap();
        let c = loader.resolve("/.page").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(finder.calls(), 1);
        assert_eq!(cached(&loader), 1);
    }

    #[test]
    fn names_resolving_to_one_file_share_a_key() {
        let path = Path::new("/app/views/page.twig");
        let finder = FakeFinder::default().with("views", "page", "twig", path);
        let loader = ViewLoader::new(&finder);

        assert_eq!(
            loader.cache_key("page").unwrap(),
            loader.cache_key("page.twig").unwrap()
        );
        // Distinct normalized names are resolved separately.
        assert_eq!(finder.calls(), 2);
    }

    #[test]
    fn missing_templates_are_not_found_and_not_cached() {
        let finder = FakeFinder::default();
        let loader = ViewLoader::new(&finder);

        for result in [
            loader.source("./missing").map(|_| ()),
            loader.cache_key("./missing").map(|_| ()),
            loader.is_fresh("./missing", 0).map(|_| ()),
        ] {
            match result {
                Err(Error::TemplateNotFound(name)) => assert_eq!(name, "./missing"),
                other => panic!("expected TemplateNotFound, but got {:?}", other),
            }
        }
        assert_eq!(cached(&loader), 0);
        assert_eq!(finder.calls(), 3);
        assert_eq!(
            Error::TemplateNotFound("./missing".to_string()).to_string(),
            "unable to find template \"./missing\""
        );
    }

    #[test]
    fn freshness_is_strictly_before() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.twig");
        stdfs::write(&path, "{{ title }}").unwrap();
        let mtime = fs::modified(&path).unwrap();

        let finder = FakeFinder::default().with("views", "page", "twig", &path);
        let loader = ViewLoader::new(&finder);
        assert!(loader.is_fresh("page", mtime + 1).unwrap());
        assert!(!loader.is_fresh("page", mtime).unwrap());
        assert!(!loader.is_fresh("page", mtime.saturating_sub(1)).unwrap());
    }

    #[test]
    fn io_errors_surface_after_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.twig");
        stdfs::write(&path, "content").unwrap();

        let finder = FakeFinder::default().with("views", "page", "twig", &path);
        let loader = ViewLoader::new(&finder);
        assert_eq!(loader.source("page").unwrap(), "content");

        stdfs::remove_file(&path).unwrap();
        assert!(matches!(loader.source("page"), Err(Error::Io(_, _))));
        assert!(matches!(loader.is_fresh("page", 0), Err(Error::Io(_, _))));
        // The resolved path is still remembered.
        assert_eq!(loader.cache_key("page").unwrap(), path.to_string_lossy());
    }

    #[test]
    fn end_to_end_with_custom_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app/views/layouts/main.tpl");
        stdfs::create_dir_all(path.parent().unwrap()).unwrap();
        stdfs::write(&path, "<html>{{{ body }}}</html>").unwrap();

        let finder = FakeFinder::default().with("views", "layouts/main", "tpl", &path);
        let loader = ViewLoader::new(&finder)
            .with_extension("tpl")
            .with_options(Options::default().with("debug", true).unwrap());

        assert_eq!(
            loader.source("layouts/main").unwrap(),
            "<html>{{{ body }}}</html>"
        );
        assert_eq!(finder.calls(), 1);
        assert_eq!(
            loader.source("layouts/main").unwrap(),
            "<html>{{{ body }}}</html>"
        );
        assert_eq!(finder.calls(), 1);
        assert!(loader.options().contains_key("debug"));
    }

    #[test]
    fn application_views_override_system_views() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("application");
        let system = dir.path().join("system");
        stdfs::create_dir_all(app.join("views")).unwrap();
        stdfs::create_dir_all(system.join("views/layouts")).unwrap();
        stdfs::write(app.join("views/page.twig"), "application page").unwrap();
        stdfs::write(system.join("views/page.twig"), "system page").unwrap();
        stdfs::write(system.join("views/layouts/main.twig"), "system layout").unwrap();

        let loader = ViewLoader::new(CascadingFinder::new([&app, &system]).unwrap());
        assert_eq!(loader.source("./page").unwrap(), "application page");
        assert_eq!(loader.source("layouts/main.twig").unwrap(), "system layout");
        assert_eq!(
            loader.cache_key("page").unwrap(),
            app.canonicalize()
                .unwrap()
                .join("views/page.twig")
                .to_string_lossy()
        );
        assert!(loader.source("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn concurrent_first_requests_search_once() {
        let path = Path::new("/app/views/page.twig");
        let finder = Arc::new(FakeFinder::default().with("views", "page", "twig", path));
        let loader = Arc::new(ViewLoader::new(Arc::clone(&finder)));

        let handles = (0..8)
            .map(|_| {
                let loader = Arc::clone(&loader);
                std::thread::spawn(move || loader.cache_key("./page").unwrap())
            })
            .collect::<Vec<_>>();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), "/app/views/page.twig");
        }
        assert_eq!(finder.calls(), 1);
    }
}
