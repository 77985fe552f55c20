//! The table of functions installed at runtime with `add_function`.

use std::{collections::BTreeMap, sync::Arc};

use rhai::{AST, CallFnOptions, Dynamic, Scope};
use serde_json::Value;
use thiserror::Error;

use super::compiler::{RhaiCompiler, RhaiCompilerError};

/// Errors produced while installing or calling functions.
#[derive(Debug, Error)]
pub enum FunctionRegistryError {
    /// Function definitions are switched off in the configuration.
    #[error("Function definitions are disabled")]
    Disabled,

    /// The name cannot be used as a Rhai function name.
    #[error("Invalid function name '{0}'")]
    InvalidName(String),

    /// The code did not compile.
    #[error(transparent)]
    Compilation(#[from] RhaiCompilerError),

    /// The code compiled but does not define a function with the given name.
    #[error("Code does not define a function named '{0}'")]
    MissingDefinition(String),

    /// The arguments could not be handed to the script.
    #[error("Failed to convert arguments: {0}")]
    Conversion(String),

    /// The function failed while running.
    #[error("Function '{name}' failed: {message}")]
    Execution {
        /// The function that failed.
        name: String,
        /// The runtime error.
        message: String,
    },
}

/// Named, sandboxed functions that the running instance can call.
///
/// Installing a function under an existing name replaces it. A failed
/// installation leaves the table untouched.
#[derive(Debug)]
pub struct FunctionRegistry {
    compiler: Arc<RhaiCompiler>,
    enabled: bool,
    functions: BTreeMap<String, Arc<AST>>,
}

impl FunctionRegistry {
    pub fn new(compiler: Arc<RhaiCompiler>, enabled: bool) -> Self {
        Self { compiler, enabled, functions: BTreeMap::new() }
    }

    /// Compiles `code` and installs the function `name` it defines.
    pub fn install(&mut self, name: &str, code: &str) -> Result<(), FunctionRegistryError> {
        if !self.enabled {
            return Err(FunctionRegistryError::Disabled);
        }
        if !is_identifier(name) {
            return Err(FunctionRegistryError::InvalidName(name.to_string()));
        }

        let ast = self.compiler.compile(code)?;
        if !ast.iter_functions().any(|f| f.name == name) {
            return Err(FunctionRegistryError::MissingDefinition(name.to_string()));
        }

        self.compiler.retain(code, &ast);
        let replaced = self.functions.insert(name.to_string(), ast).is_some();
        tracing::info!(function = %name, replaced, "Function installed.");
        Ok(())
    }

    /// Calls the installed function `name` with `args` converted to Rhai values.
    /// Returns `Ok(None)` when no such function is installed.
    pub fn call(
        &self,
        name: &str,
        args: &[Value],
    ) -> Result<Option<Dynamic>, FunctionRegistryError> {
        let Some(ast) = self.functions.get(name) else {
            return Ok(None);
        };

        let args = args
            .iter()
            .map(rhai::serde::to_dynamic)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| FunctionRegistryError::Conversion(e.to_string()))?;

        let options = CallFnOptions::new().eval_ast(false);
        let result = self
            .compiler
            .engine()
            .call_fn_with_options::<Dynamic>(options, &mut Scope::new(), ast, name, args)
            .map_err(|e| FunctionRegistryError::Execution {
                name: name.to_string(),
                message: e.to_string(),
            })?;
        Ok(Some(result))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Names of the installed functions, sorted.
    pub fn names(&self) -> Vec<String> {
        self.functions.keys().cloned().collect()
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
