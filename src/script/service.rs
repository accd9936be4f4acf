//! Script engine registry

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::{ExecutableUnit, NativeScriptEngine, RankerScriptEngine, ScriptContext, ScriptEngine};
use crate::error::{Error, Result};
use crate::ranker::RankerParserFactory;

/// Routes script compilation to the engine registered for its language
pub struct ScriptService {
    engines: RwLock<HashMap<String, Arc<dyn ScriptEngine>>>,
}

impl ScriptService {
    pub fn new() -> Self {
        Self {
            engines: RwLock::new(HashMap::new()),
        }
    }

    /// A service with the `native` and `ltr` engines registered
    pub fn with_defaults(factory: Arc<RankerParserFactory>) -> Self {
        let service = Self::new();
        service.engines.write().extend([
            (
                NativeScriptEngine.lang().to_string(),
                Arc::new(NativeScriptEngine) as Arc<dyn ScriptEngine>,
            ),
            (
                super::ranker::RANKER_LANG.to_string(),
                Arc::new(RankerScriptEngine::new(factory)) as Arc<dyn ScriptEngine>,
            ),
        ]);
        service
    }

    /// Register an engine
    pub fn register(&self, engine: Arc<dyn ScriptEngine>) -> Result<()> {
        let mut engines = self.engines.write();
        let lang = engine.lang();
        if engines.contains_key(lang) {
            return Err(Error::AlreadyExists(format!(
                "Script engine [{}] already registered",
                lang
            )));
        }
        engines.insert(lang.to_string(), engine);
        info!(lang = %lang, "Registered script engine");
        Ok(())
    }

    /// Unregister an engine
    pub fn unregister(&self, lang: &str) -> Result<()> {
        self.engines
            .write()
            .remove(lang)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("Script engine [{}] not found", lang)))
    }

    pub fn get(&self, lang: &str) -> Option<Arc<dyn ScriptEngine>> {
        self.engines.read().get(lang).cloned()
    }

    /// Registered languages, sorted
    pub fn langs(&self) -> Vec<String> {
        let mut langs: Vec<String> = self.engines.read().keys().cloned().collect();
        langs.sort();
        langs
    }

    pub fn compile(
        &self,
        lang: &str,
        name: Option<&str>,
        source: &str,
        context: &ScriptContext,
    ) -> Result<Arc<dyn ExecutableUnit>> {
        let engine = self.get(lang).ok_or_else(|| {
            Error::UnsupportedOperation(format!("No script engine for lang [{}]", lang))
        })?;
        debug!(lang = %lang, context = %context, name = ?name, "Compiling script");
        engine.compile(name, source, context)
    }
}

impl Default for ScriptService {
    fn default() -> Self {
        Self::with_defaults(Arc::new(RankerParserFactory::with_defaults()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::native::FEATURE_EXTRACTOR;

    #[test]
    fn test_default_langs() {
        assert_eq!(ScriptService::default().langs(), vec!["ltr", "native"]);
        assert!(ScriptService::new().langs().is_empty());
    }

    #[test]
    fn test_duplicate_lang() {
        let service = ScriptService::default();
        assert!(matches!(
            service.register(Arc::new(NativeScriptEngine)),
            Err(Error::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_unknown_lang() {
        let service = ScriptService::default();
        assert!(matches!(
            service.compile("painless", None, "1 + 1", &ScriptContext::Search),
            Err(Error::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_unregister() {
        let service = ScriptService::default();
        service.unregister("native").unwrap();
        assert!(service
            .compile("native", None, FEATURE_EXTRACTOR, &ScriptContext::Search)
            .is_err());
        assert!(matches!(
            service.unregister("native"),
            Err(Error::NotFound(_))
        ));
        service.register(Arc::new(NativeScriptEngine)).unwrap();
        assert!(service
            .compile("native", None, FEATURE_EXTRACTOR, &ScriptContext::Search)
            .is_ok());
    }
}
