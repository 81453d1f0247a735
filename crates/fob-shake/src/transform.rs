//! Output regeneration for edited modules.

use async_trait::async_trait;
use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;

use crate::editor::SyntaxTree;
use crate::error::TransformError;
use crate::module::ModuleOutput;
use crate::module_id::ModuleId;

/// Produces a module's compiled output from its (edited) tree.
///
/// Called once per edited module after pruning; calls for different modules may run
/// concurrently.
#[async_trait]
pub trait Transformer: Send + Sync {
    async fn regenerate(
        &self,
        id: &ModuleId,
        tree: &dyn SyntaxTree,
    ) -> Result<ModuleOutput, TransformError>;
}

/// Re-prints the tree with `oxc_codegen`.
#[derive(Debug, Clone, Default)]
pub struct CodegenTransformer {
    source_maps: bool,
}

impl CodegenTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also emit a JSON source map for each module.
    pub fn with_source_maps(mut self, enabled: bool) -> Self {
        self.source_maps = enabled;
        self
    }

    fn print(&self, id: &ModuleId, source: &str) -> Result<ModuleOutput, TransformError> {
        let source_type = SourceType::from_path(id.as_path()).unwrap_or(SourceType::mjs());
        let allocator = Allocator::default();
        let parsed = Parser::new(&allocator, source, source_type).parse();
        if parsed.panicked || !parsed.errors.is_empty() {
            return Err(TransformError::Parse {
                module: id.clone(),
                message: parsed
                    .errors
                    .first()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "parser gave up".to_string()),
            });
        }

        let options = CodegenOptions {
            source_map_path: self.source_maps.then(|| id.as_path().to_path_buf()),
            ..CodegenOptions::default()
        };
        let printed = Codegen::new()
            .with_options(options)
            .build(&parsed.program);

        let mut output = ModuleOutput::from_code(printed.code);
        output.map = printed.map.map(|map| map.to_json_string());
        Ok(output)
    }
}

#[async_trait]
impl Transformer for CodegenTransformer {
    async fn regenerate(
        &self,
        id: &ModuleId,
        tree: &dyn SyntaxTree,
    ) -> Result<ModuleOutput, TransformError> {
        self.print(id, tree.source())
    }
}
