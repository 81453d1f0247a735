//! [`SyntaxTree`] backed by the oxc toolchain.
//!
//! The tree is kept as source text and re-parsed into a fresh arena for every outline or edit.
//! Edits re-serialise the program with `oxc_codegen`, so the text after an edit is normalised.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    BindingIdentifier, BindingPatternKind, Declaration, ExportDefaultDeclarationKind,
    ImportDeclarationSpecifier, Program, Statement, VariableDeclaration,
};
use oxc_ast_visit::Visit;
use oxc_codegen::Codegen;
use oxc_parser::{Parser, ParserReturn};
use oxc_semantic::{SemanticBuilder, SymbolId};
use oxc_span::{GetSpan, SourceType};

use super::visitor::{DynamicImportCollector, ReferenceSiteCollector};
use super::{
    BindingInfo, DeclarationSite, DeclaratorInfo, EditPlan, ExportDeclKind, ExportStatement,
    ImportDeclarationInfo, ImportSpecifierInfo, Imported, ModuleOutline, Origin, SpecifierInfo,
    SpecifierSite, SyntaxTree, TextRange,
};
use crate::error::EditError;
use crate::export_table::ImportUsage;

/// JavaScript/TypeScript module tree parsed with `oxc_parser`.
#[derive(Debug, Clone)]
pub struct OxcTree {
    path: PathBuf,
    source: String,
    source_type: SourceType,
}

/// Parse-time facts about a module: what it declares and how it uses each import source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleFacts {
    /// Names the module exports itself, excluding `default`. Re-exported names count.
    pub local_exports: Vec<String>,
    /// Usage per import source, in first-seen order.
    pub dependencies: IndexMap<String, ImportUsage>,
}

impl ModuleFacts {
    fn usage(&mut self, source: &str) -> &mut ImportUsage {
        self.dependencies.entry(source.to_string()).or_default()
    }

    fn export(&mut self, name: &str) {
        if name != "default" && !self.local_exports.iter().any(|known| known == name) {
            self.local_exports.push(name.to_string());
        }
    }
}

struct PendingBinding {
    name: String,
    origin: Origin,
    symbol: Option<SymbolId>,
    declaration: Option<TextRange>,
}

impl OxcTree {
    pub fn new(path: impl Into<PathBuf>, source: impl Into<String>) -> Self {
        let path = path.into();
        let source_type = SourceType::from_path(&path).unwrap_or(SourceType::mjs());
        Self {
            path,
            source: source.into(),
            source_type,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scan the module's imports and exports.
    pub fn facts(&self) -> Result<ModuleFacts, EditError> {
        let allocator = Allocator::default();
        let program = self.parse(&allocator)?;
        let mut facts = ModuleFacts::default();

        for stmt in &program.body {
            match stmt {
                Statement::ImportDeclaration(decl) => {
                    if decl.import_kind.is_type() {
                        continue;
                    }
                    let usage = facts.usage(&decl.source.value);
                    for specifier in decl.specifiers.iter().flatten() {
                        match specifier {
                            ImportDeclarationSpecifier::ImportSpecifier(named) => {
                                if named.import_kind.is_type() {
                                    continue;
                                }
                                usage.add_named(named.imported.name().to_string(), 1);
                            }
                            ImportDeclarationSpecifier::ImportDefaultSpecifier(_) => {
                                usage.default += 1;
                            }
                            ImportDeclarationSpecifier::ImportNamespaceSpecifier(_) => {
                                usage.namespace += 1;
                            }
                        }
                    }
                }
                Statement::ExportNamedDeclaration(decl) => {
                    if decl.export_kind.is_type() {
                        continue;
                    }
                    if let Some(declaration) = &decl.declaration {
                        for name in declared_names(declaration) {
                            facts.export(&name);
                        }
                        continue;
                    }
                    for specifier in &decl.specifiers {
                        if specifier.export_kind.is_type() {
                            continue;
                        }
                        facts.export(&specifier.exported.name());
                        if let Some(source) = &decl.source {
                            let local = specifier.local.name();
                            let usage = facts.usage(&source.value);
                            if local.as_str() == "default" {
                                usage.default += 1;
                            } else {
                                usage.add_named(local.to_string(), 1);
                            }
                        }
                    }
                }
                Statement::ExportAllDeclaration(decl) => {
                    if decl.export_kind.is_type() {
                        continue;
                    }
                    match &decl.exported {
                        Some(alias) => {
                            facts.export(&alias.name());
                            facts.usage(&decl.source.value).namespace += 1;
                        }
                        None => facts.usage(&decl.source.value).all += 1,
                    }
                }
                _ => {}
            }
        }

        let mut dynamic = DynamicImportCollector::default();
        dynamic.visit_program(&program);
        for source in dynamic.sources {
            facts.usage(&source).namespace += 1;
        }

        Ok(facts)
    }

    fn parse<'a>(&'a self, allocator: &'a Allocator) -> Result<Program<'a>, EditError> {
        let ParserReturn {
            program,
            errors,
            panicked,
            ..
        } = Parser::new(allocator, &self.source, self.source_type).parse();

        if panicked || !errors.is_empty() {
            let message = errors
                .first()
                .map(ToString::to_string)
                .unwrap_or_else(|| "parser gave up".to_string());
            return Err(EditError::Parse {
                path: self.path.to_string_lossy().into_owned(),
                message,
            });
        }
        Ok(program)
    }
}

impl SyntaxTree for OxcTree {
    fn source(&self) -> &str {
        &self.source
    }

    fn outline(&self) -> Result<ModuleOutline, EditError> {
        let allocator = Allocator::default();
        let program = self.parse(&allocator)?;

        let mut outline = ModuleOutline::default();
        let mut pending = Vec::new();

        for (index, stmt) in program.body.iter().enumerate() {
            let range = to_range(stmt.span());
            outline.statements.push(range);

            match stmt {
                Statement::ImportDeclaration(decl) => {
                    let mut specifiers = Vec::new();
                    for (position, specifier) in decl.specifiers.iter().flatten().enumerate() {
                        let (local, imported) = match specifier {
                            ImportDeclarationSpecifier::ImportSpecifier(named) => (
                                &named.local,
                                Imported::Named(named.imported.name().to_string()),
                            ),
                            ImportDeclarationSpecifier::ImportDefaultSpecifier(default) => {
                                (&default.local, Imported::Default)
                            }
                            ImportDeclarationSpecifier::ImportNamespaceSpecifier(namespace) => {
                                (&namespace.local, Imported::Namespace)
                            }
                        };
                        pending.push(pending_binding(
                            local,
                            Origin::Import {
                                statement: index,
                                specifier: position,
                            },
                            None,
                        ));
                        specifiers.push(ImportSpecifierInfo {
                            local: local.name.to_string(),
                            imported,
                        });
                    }
                    outline.imports.push(ImportDeclarationInfo {
                        statement: index,
                        source: decl.source.value.to_string(),
                        specifiers,
                    });
                }
                Statement::ExportNamedDeclaration(decl) => {
                    if let Some(declaration) = &decl.declaration {
                        let kind = match declaration {
                            Declaration::FunctionDeclaration(function) => {
                                function.id.as_ref().map(|id| ExportDeclKind::Function {
                                    binding: push_declared(&mut pending, id, index, range),
                                })
                            }
                            Declaration::ClassDeclaration(class) => {
                                class.id.as_ref().map(|id| ExportDeclKind::Class {
                                    binding: push_declared(&mut pending, id, index, range),
                                })
                            }
                            Declaration::VariableDeclaration(variables) => {
                                Some(ExportDeclKind::Variable {
                                    declarators: push_declarators(&mut pending, variables, index),
                                })
                            }
                            _ => None,
                        };
                        if let Some(kind) = kind {
                            outline.exports.push(ExportStatement {
                                statement: index,
                                kind,
                            });
                        }
                        continue;
                    }

                    let specifiers = decl
                        .specifiers
                        .iter()
                        .map(|specifier| SpecifierInfo {
                            local: specifier.local.name().to_string(),
                            exported: specifier.exported.name().to_string(),
                            binding: None,
                        })
                        .collect();
                    outline.exports.push(ExportStatement {
                        statement: index,
                        kind: ExportDeclKind::Specifiers {
                            source: decl.source.as_ref().map(|source| source.value.to_string()),
                            specifiers,
                        },
                    });
                }
                Statement::ExportDefaultDeclaration(decl) => {
                    let id = match &decl.declaration {
                        ExportDefaultDeclarationKind::FunctionDeclaration(function) => {
                            function.id.as_ref()
                        }
                        ExportDefaultDeclarationKind::ClassDeclaration(class) => class.id.as_ref(),
                        _ => None,
                    };
                    let binding = id.map(|id| push_declared(&mut pending, id, index, range));
                    outline.exports.push(ExportStatement {
                        statement: index,
                        kind: ExportDeclKind::DefaultExpr { binding },
                    });
                }
                Statement::ExportAllDeclaration(decl) => {
                    outline.exports.push(ExportStatement {
                        statement: index,
                        kind: ExportDeclKind::ForwardAll {
                            source: decl.source.value.to_string(),
                            alias: decl.exported.as_ref().map(|alias| alias.name().to_string()),
                        },
                    });
                }
                Statement::FunctionDeclaration(function) => {
                    if let Some(id) = &function.id {
                        push_declared(&mut pending, id, index, range);
                    }
                }
                Statement::ClassDeclaration(class) => {
                    if let Some(id) = &class.id {
                        push_declared(&mut pending, id, index, range);
                    }
                }
                Statement::VariableDeclaration(variables) => {
                    push_declarators(&mut pending, variables, index);
                }
                _ => {}
            }
        }

        let semantic = SemanticBuilder::new().build(&program).semantic;
        let mut collector = ReferenceSiteCollector::new(semantic.scoping());
        collector.visit_program(&program);

        for binding in pending {
            let symbol = binding.symbol.ok_or_else(|| EditError::UnresolvedBinding {
                name: binding.name.clone(),
            })?;
            let references = collector
                .sites
                .get(&symbol)
                .into_iter()
                .flatten()
                .copied()
                .filter(|offset| {
                    !binding
                        .declaration
                        .is_some_and(|declaration| declaration.contains(*offset))
                })
                .collect();
            outline.bindings.push(BindingInfo {
                name: binding.name,
                origin: binding.origin,
                declaration: binding.declaration,
                references,
                export_sites: Vec::new(),
            });
        }

        // Local specifier lists may precede the declarations they name.
        for export in &mut outline.exports {
            let ExportDeclKind::Specifiers {
                source: None,
                specifiers,
            } = &mut export.kind
            else {
                continue;
            };
            for (position, specifier) in specifiers.iter_mut().enumerate() {
                let Some(binding) = outline
                    .bindings
                    .iter()
                    .position(|binding| binding.name == specifier.local)
                else {
                    continue;
                };
                specifier.binding = Some(binding);
                outline.bindings[binding].export_sites.push(SpecifierSite {
                    statement: export.statement,
                    specifier: position,
                });
            }
        }

        Ok(outline)
    }

    fn apply(&mut self, plan: &EditPlan) -> Result<(), EditError> {
        if plan.is_empty() {
            return Ok(());
        }

        let allocator = Allocator::default();
        let mut program = self.parse(&allocator)?;
        let body_len = program.body.len();

        for statement in plan.statements() {
            if statement >= body_len {
                return Err(EditError::OutOfRange {
                    statement,
                    index: 0,
                });
            }
        }

        for (statement, removed) in plan.declarators() {
            let declarations = match program.body.get_mut(statement) {
                Some(Statement::VariableDeclaration(variables)) => &mut variables.declarations,
                Some(Statement::ExportNamedDeclaration(export)) => match &mut export.declaration {
                    Some(Declaration::VariableDeclaration(variables)) => {
                        &mut variables.declarations
                    }
                    _ => {
                        return Err(EditError::StaleTarget {
                            statement,
                            expected: "variable declaration",
                        });
                    }
                },
                _ => {
                    return Err(EditError::StaleTarget {
                        statement,
                        expected: "variable declaration",
                    });
                }
            };
            check_indices(statement, removed, declarations.len())?;
            retain_unremoved(declarations, removed);
        }

        for (statement, removed) in plan.export_specifiers() {
            let Some(Statement::ExportNamedDeclaration(export)) = program.body.get_mut(statement)
            else {
                return Err(EditError::StaleTarget {
                    statement,
                    expected: "export list",
                });
            };
            check_indices(statement, removed, export.specifiers.len())?;
            retain_unremoved(&mut export.specifiers, removed);
        }

        for (statement, removed) in plan.import_specifiers() {
            let Some(Statement::ImportDeclaration(import)) = program.body.get_mut(statement) else {
                return Err(EditError::StaleTarget {
                    statement,
                    expected: "import declaration",
                });
            };
            let Some(specifiers) = &mut import.specifiers else {
                return Err(EditError::StaleTarget {
                    statement,
                    expected: "import declaration with specifiers",
                });
            };
            check_indices(statement, removed, specifiers.len())?;
            retain_unremoved(specifiers, removed);
        }

        let mut index = 0;
        program.body.retain(|_| {
            let keep = !plan.is_statement_removed(index);
            index += 1;
            keep
        });

        self.source = Codegen::new().build(&program).code;
        Ok(())
    }
}

fn to_range(span: oxc_span::Span) -> TextRange {
    TextRange::new(span.start, span.end)
}

fn pending_binding(
    id: &BindingIdentifier<'_>,
    origin: Origin,
    declaration: Option<TextRange>,
) -> PendingBinding {
    PendingBinding {
        name: id.name.to_string(),
        origin,
        symbol: id.symbol_id.get(),
        declaration,
    }
}

/// Record a function or class declaration binding and return its binding index.
fn push_declared(
    pending: &mut Vec<PendingBinding>,
    id: &BindingIdentifier<'_>,
    statement: usize,
    range: TextRange,
) -> usize {
    pending.push(pending_binding(
        id,
        Origin::Declaration(DeclarationSite::Statement { statement }),
        Some(range),
    ));
    pending.len() - 1
}

fn push_declarators(
    pending: &mut Vec<PendingBinding>,
    variables: &VariableDeclaration<'_>,
    statement: usize,
) -> Vec<DeclaratorInfo> {
    let total = variables.declarations.len();
    variables
        .declarations
        .iter()
        .enumerate()
        .map(|(index, declarator)| {
            let range = to_range(declarator.span);
            let binding = match &declarator.id.kind {
                BindingPatternKind::BindingIdentifier(id) => {
                    pending.push(pending_binding(
                        id,
                        Origin::Declaration(DeclarationSite::Declarator {
                            statement,
                            index,
                            total,
                        }),
                        Some(range),
                    ));
                    Some(pending.len() - 1)
                }
                pattern => {
                    let mut ids = Vec::new();
                    pattern_identifiers(pattern, &mut ids);
                    for id in ids {
                        pending.push(pending_binding(id, Origin::Other, Some(range)));
                    }
                    None
                }
            };
            DeclaratorInfo { binding, range }
        })
        .collect()
}

fn declared_names(declaration: &Declaration<'_>) -> Vec<String> {
    match declaration {
        Declaration::FunctionDeclaration(function) => {
            function.id.iter().map(|id| id.name.to_string()).collect()
        }
        Declaration::ClassDeclaration(class) => {
            class.id.iter().map(|id| id.name.to_string()).collect()
        }
        Declaration::VariableDeclaration(variables) => {
            let mut ids = Vec::new();
            for declarator in &variables.declarations {
                pattern_identifiers(&declarator.id.kind, &mut ids);
            }
            ids.into_iter().map(|id| id.name.to_string()).collect()
        }
        _ => Vec::new(),
    }
}

fn pattern_identifiers<'p, 'a>(
    kind: &'p BindingPatternKind<'a>,
    out: &mut Vec<&'p BindingIdentifier<'a>>,
) {
    match kind {
        BindingPatternKind::BindingIdentifier(id) => out.push(id),
        BindingPatternKind::ObjectPattern(object) => {
            for property in &object.properties {
                pattern_identifiers(&property.value.kind, out);
            }
            if let Some(rest) = &object.rest {
                pattern_identifiers(&rest.argument.kind, out);
            }
        }
        BindingPatternKind::ArrayPattern(array) => {
            for element in array.elements.iter().flatten() {
                pattern_identifiers(&element.kind, out);
            }
            if let Some(rest) = &array.rest {
                pattern_identifiers(&rest.argument.kind, out);
            }
        }
        BindingPatternKind::AssignmentPattern(assignment) => {
            pattern_identifiers(&assignment.left.kind, out);
        }
    }
}

fn check_indices(
    statement: usize,
    removed: &std::collections::BTreeSet<usize>,
    len: usize,
) -> Result<(), EditError> {
    match removed.iter().next_back() {
        Some(&index) if index >= len => Err(EditError::OutOfRange { statement, index }),
        _ => Ok(()),
    }
}

fn retain_unremoved<T>(
    items: &mut oxc_allocator::Vec<'_, T>,
    removed: &std::collections::BTreeSet<usize>,
) {
    let mut index = 0;
    items.retain(|_| {
        let keep = !removed.contains(&index);
        index += 1;
        keep
    });
}
