//! Whole-program walks used by the oxc tree.

use oxc_ast::ast::{
    Argument, CallExpression, ExportSpecifier, Expression, IdentifierReference, ImportExpression,
};
use oxc_ast_visit::{Visit, walk};
use oxc_semantic::{Scoping, SymbolId};
use rustc_hash::FxHashMap;

/// Records the start offset of every resolved identifier reference, grouped by symbol.
///
/// Export specifiers are not walked: `export { a }` names a binding without using it.
pub(super) struct ReferenceSiteCollector<'s> {
    scoping: &'s Scoping,
    pub(super) sites: FxHashMap<SymbolId, Vec<u32>>,
}

impl<'s> ReferenceSiteCollector<'s> {
    pub(super) fn new(scoping: &'s Scoping) -> Self {
        Self {
            scoping,
            sites: FxHashMap::default(),
        }
    }
}

impl<'a> Visit<'a> for ReferenceSiteCollector<'_> {
    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        let Some(reference_id) = ident.reference_id.get() else {
            return;
        };
        if let Some(symbol_id) = self.scoping.get_reference(reference_id).symbol_id() {
            self.sites
                .entry(symbol_id)
                .or_default()
                .push(ident.span.start);
        }
    }

    fn visit_export_specifier(&mut self, _specifier: &ExportSpecifier<'a>) {}
}

/// Collects string sources of `import('x')` and `require('x')`.
///
/// Both hand the caller the whole module object, so they are recorded as namespace usage.
#[derive(Default)]
pub(super) struct DynamicImportCollector {
    pub(super) sources: Vec<String>,
}

impl<'a> Visit<'a> for DynamicImportCollector {
    fn visit_import_expression(&mut self, expr: &ImportExpression<'a>) {
        if let Expression::StringLiteral(source) = &expr.source {
            self.sources.push(source.value.to_string());
        }
        walk::walk_import_expression(self, expr);
    }

    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        let is_require =
            matches!(&call.callee, Expression::Identifier(callee) if callee.name == "require");
        if is_require && call.arguments.len() == 1 {
            if let Some(Argument::StringLiteral(source)) = call.arguments.first() {
                self.sources.push(source.value.to_string());
            }
        }
        walk::walk_call_expression(self, call);
    }
}
