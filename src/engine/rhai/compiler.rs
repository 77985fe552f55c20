//! The sandboxed Rhai engine, plus a compile cache keyed by the SHA-256 of
//! the source so that replaying a journal full of identical definitions
//! parses each one once. Only scripts that were actually installed are
//! cached, and the cache has a fixed capacity.

use std::sync::Arc;

use dashmap::DashMap;
use rhai::{AST, Engine, Position};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::RhaiConfig;

/// Most ASTs kept in the compile cache.
const MAX_CACHED_SCRIPTS: usize = 256;

/// Keywords installed functions may not use.
const DISABLED_SYMBOLS: &[&str] = &["eval", "import", "export"];

/// A script that failed to parse.
#[derive(Debug, Clone, Error)]
#[error("Rhai compilation error: {0}")]
pub struct RhaiCompilerError(#[from] rhai::ParseError);

/// Owns the sandboxed engine and the ASTs compiled with it.
#[derive(Debug)]
pub struct RhaiCompiler {
    engine: Engine,
    compiled: DashMap<[u8; 32], Arc<AST>>,
}

impl RhaiCompiler {
    /// Builds an engine with the configured resource limits.
    pub fn new(limits: &RhaiConfig) -> Self {
        let mut engine = Engine::new();
        engine
            .set_max_operations(limits.max_operations)
            .set_max_call_levels(limits.max_call_levels)
            .set_max_string_size(limits.max_string_size)
            .set_max_array_size(limits.max_array_size)
            .set_max_map_size(limits.max_array_size);
        for symbol in DISABLED_SYMBOLS {
            engine.disable_symbol(*symbol);
        }

        // Functions have no console; their output goes to the log.
        engine.on_print(|text| tracing::info!(target: "vigil::functions", "{text}"));
        engine.on_debug(|text, source, position: Position| {
            tracing::debug!(target: "vigil::functions", source, %position, "{text}")
        });

        Self { engine, compiled: DashMap::new() }
    }

    /// The engine functions are executed with.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Compiles `script`, reusing the AST of an identical script passed to
    /// [`Self::retain`] earlier.
    pub fn compile(&self, script: &str) -> Result<Arc<AST>, RhaiCompilerError> {
        if let Some(ast) = self.compiled.get(&digest(script)) {
            return Ok(Arc::clone(ast.value()));
        }
        Ok(Arc::new(self.engine.compile(script)?))
    }

    /// Keeps `ast` for later compiles of the same `script`. Does nothing once
    /// the cache is full.
    pub fn retain(&self, script: &str, ast: &Arc<AST>) {
        if self.compiled.len() >= MAX_CACHED_SCRIPTS {
            tracing::debug!("Compile cache is full, not caching script.");
            return;
        }
        self.compiled.insert(digest(script), Arc::clone(ast));
    }

    #[cfg(test)]
    pub(crate) fn cached_scripts(&self) -> usize {
        self.compiled.len()
    }
}

fn digest(script: &str) -> [u8; 32] {
    Sha256::digest(script.as_bytes()).into()
}
