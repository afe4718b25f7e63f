//! Build helpers wiring a fixture into a bundler and a theme engine

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use themesplit_core::bundle::{Assets, BundleOptions, Bundler};
use themesplit_core::{BuildError, ThemeEngine};

use crate::fixtures::Fixture;
use crate::mocks::CountingIdentGenerator;

/// A bundler and engine pair kept alive across rebuilds
pub struct ThemedBuild {
    pub bundler: Bundler,
    pub engine: ThemeEngine,
    generator_calls: Arc<AtomicUsize>,
}

impl ThemedBuild {
    pub fn new(fixture: &Fixture) -> Result<Self, BuildError> {
        let engine = ThemeEngine::new(&fixture.themes, &fixture.root, fixture.fs.as_ref())?;
        let generator = CountingIdentGenerator::new();
        let generator_calls = generator.counter();

        let mut options = BundleOptions::new(fixture.root.clone());
        options.entries = fixture.entries.clone();
        let bundler = Bundler::new(fixture.fs.clone(), options).with_generator(Box::new(generator));

        Ok(Self {
            bundler,
            engine,
            generator_calls,
        })
    }

    pub fn compile(&mut self) -> Result<Assets, BuildError> {
        self.bundler.compile(&mut self.engine)
    }

    pub fn rebuild(&mut self, changed: &[PathBuf]) -> Result<Assets, BuildError> {
        self.bundler.rebuild(changed, &mut self.engine)
    }

    pub fn generator_calls(&self) -> usize {
        self.generator_calls.load(Ordering::SeqCst)
    }
}

/// Compile a fixture once with the theme engine installed
pub fn compile_themed(fixture: &Fixture) -> Result<Assets, BuildError> {
    ThemedBuild::new(fixture)?.compile()
}

/// Compile a fixture without any hooks, the single-theme baseline
pub fn compile_plain(fixture: &Fixture) -> Result<Assets, BuildError> {
    let mut options = BundleOptions::new(fixture.root.clone());
    options.entries = fixture.entries.clone();
    Bundler::new(fixture.fs.clone(), options)
        .with_generator(Box::new(CountingIdentGenerator::new()))
        .compile(&mut themesplit_core::NoopHooks)
}
