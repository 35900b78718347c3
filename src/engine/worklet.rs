//! Custom processor modules, registered once and instantiated by name.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::EngineError;

/// A running processor instance. Called on the render thread once per block.
pub trait AudioProcessor: Send {
    /// Fill `output` from `input` (which may be empty for pure sources).
    /// Returning `false` ends the processor; it renders silence afterwards.
    fn process(&mut self, input: &[f32], output: &mut [f32]) -> bool;
}

/// A loadable unit that produces processors.
pub trait ProcessorModule: Send + Sync {
    fn name(&self) -> &str;

    /// Load/compile step run once when the module is added to a context.
    fn load(&self) -> Result<(), String> {
        Ok(())
    }

    fn instantiate(&self, sample_rate: f64) -> Box<dyn AudioProcessor>;
}

/// Modules registered with one context.
#[derive(Default)]
pub struct ProcessorRegistry {
    modules: HashMap<String, Arc<dyn ProcessorModule>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `module` and register it under its name. A name may only be
    /// registered once per context.
    pub fn register(&mut self, module: Arc<dyn ProcessorModule>) -> Result<(), EngineError> {
        let name = module.name().to_string();
        let fail = |reason: &str| EngineError::ModuleLoad {
            name: name.clone(),
            reason: reason.to_string(),
        };

        if name.is_empty() {
            return Err(fail("processor name must not be empty"));
        }
        if self.modules.contains_key(&name) {
            return Err(fail("a processor with this name is already registered"));
        }
        module.load().map_err(|reason| fail(&reason))?;

        self.modules.insert(name, module);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn instantiate(
        &self,
        name: &str,
        sample_rate: f64,
    ) -> Result<Box<dyn AudioProcessor>, EngineError> {
        self.modules
            .get(name)
            .map(|m| m.instantiate(sample_rate))
            .ok_or_else(|| EngineError::UnknownProcessor(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Constant;

    impl AudioProcessor for Constant {
        fn process(&mut self, _input: &[f32], output: &mut [f32]) -> bool {
            output.fill(0.5);
            true
        }
    }

    struct ConstantModule(&'static str, Result<(), String>);

    impl ProcessorModule for ConstantModule {
        fn name(&self) -> &str {
            self.0
        }

        fn load(&self) -> Result<(), String> {
            self.1.clone()
        }

        fn instantiate(&self, _sample_rate: f64) -> Box<dyn AudioProcessor> {
            Box::new(Constant)
        }
    }

    #[test]
    fn registered_module_instantiates_by_name() {
        let mut reg = ProcessorRegistry::new();
        reg.register(Arc::new(ConstantModule("constant", Ok(())))).unwrap();
        assert!(reg.contains("constant"));

        let mut p = reg.instantiate("constant", 44100.0).unwrap();
        let mut out = [0.0f32; 4];
        assert!(p.process(&[], &mut out));
        assert_eq!(out, [0.5; 4]);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut reg = ProcessorRegistry::new();
        reg.register(Arc::new(ConstantModule("constant", Ok(())))).unwrap();
        let err = reg
            .register(Arc::new(ConstantModule("constant", Ok(()))))
            .unwrap_err();
        assert!(matches!(err, EngineError::ModuleLoad { .. }));
    }

    #[test]
    fn load_failure_is_reported_and_not_registered() {
        let mut reg = ProcessorRegistry::new();
        let err = reg
            .register(Arc::new(ConstantModule("broken", Err("syntax error".into()))))
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::ModuleLoad {
                name: "broken".to_string(),
                reason: "syntax error".to_string(),
            }
        );
        assert!(!reg.contains("broken"));
    }

    #[test]
    fn unknown_name_is_an_error() {
        let reg = ProcessorRegistry::new();
        assert!(matches!(
            reg.instantiate("missing", 44100.0),
            Err(EngineError::UnknownProcessor(_))
        ));
    }
}
