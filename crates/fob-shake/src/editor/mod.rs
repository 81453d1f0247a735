//! Syntax editing contract.
//!
//! The shaking core never touches an AST directly. It asks a [`SyntaxTree`] for a
//! [`ModuleOutline`] (what the module exports, imports and which top-level bindings are still
//! referenced), decides on an [`EditPlan`] and hands the plan back to the tree.
//!
//! Everything in an outline is addressed by *original* indices: statement indices into the
//! program body, declarator indices inside a variable declaration and specifier indices inside
//! an export or import list. A plan built from one outline stays valid regardless of the order
//! in which its removals are applied.

mod oxc;
mod visitor;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub use oxc::{ModuleFacts, OxcTree};

use crate::error::EditError;

/// A module's owned syntax tree.
pub trait SyntaxTree: Send + Sync + fmt::Debug {
    /// Current serialized form of the tree.
    fn source(&self) -> &str;

    /// Enumerate exports, imports and top-level bindings of the current tree.
    fn outline(&self) -> Result<ModuleOutline, EditError>;

    /// Remove everything the plan names. On error the tree is left unchanged.
    fn apply(&mut self, plan: &EditPlan) -> Result<(), EditError>;
}

/// Byte range of a syntax node in the current source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextRange {
    pub start: u32,
    pub end: u32,
}

impl TextRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, offset: u32) -> bool {
        self.start <= offset && offset < self.end
    }
}

/// Classification of a module's top level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleOutline {
    /// Range of every top-level statement, indexed by statement index.
    pub statements: Vec<TextRange>,
    /// Export statements in source order.
    pub exports: Vec<ExportStatement>,
    /// Import declarations in source order.
    pub imports: Vec<ImportDeclarationInfo>,
    /// Top-level bindings. Referenced by index from exports and specifiers.
    pub bindings: Vec<BindingInfo>,
}

impl ModuleOutline {
    pub fn binding(&self, index: usize) -> Option<&BindingInfo> {
        self.bindings.get(index)
    }

    pub fn binding_named(&self, name: &str) -> Option<usize> {
        self.bindings.iter().position(|binding| binding.name == name)
    }

    /// The import declaration at `statement`, if there is one.
    pub fn import_at(&self, statement: usize) -> Option<&ImportDeclarationInfo> {
        self.imports.iter().find(|import| import.statement == statement)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportStatement {
    pub statement: usize,
    pub kind: ExportDeclKind,
}

/// The shapes of export statement the pruner distinguishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportDeclKind {
    /// `export class A {}`
    Class { binding: usize },
    /// `export function a() {}`
    Function { binding: usize },
    /// `export const a = 1, b = 2`. Declarators binding a pattern carry no binding and are
    /// never removed.
    Variable { declarators: Vec<DeclaratorInfo> },
    /// `export { a, b as c }` or `export { a } from 'x'`
    Specifiers {
        source: Option<String>,
        specifiers: Vec<SpecifierInfo>,
    },
    /// `export default <expr>`. `binding` is set for named default functions and classes.
    DefaultExpr { binding: Option<usize> },
    /// `export * from 'x'` or `export * as ns from 'x'`
    ForwardAll {
        source: String,
        alias: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaratorInfo {
    pub binding: Option<usize>,
    pub range: TextRange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecifierInfo {
    /// Local (or imported, for sourced lists) name.
    pub local: String,
    /// Name the module exports.
    pub exported: String,
    /// Resolved top-level binding for local lists.
    pub binding: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDeclarationInfo {
    pub statement: usize,
    pub source: String,
    pub specifiers: Vec<ImportSpecifierInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpecifierInfo {
    pub local: String,
    pub imported: Imported,
}

/// What an import specifier pulls from its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Imported {
    Default,
    Namespace,
    Named(String),
}

/// A top-level binding and where it is still used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingInfo {
    pub name: String,
    pub origin: Origin,
    /// Range of the declaring statement or declarator, if the binding has one.
    pub declaration: Option<TextRange>,
    /// Offsets of resolved references outside the binding's own declaration. References
    /// that are export specifiers are tracked in `export_sites` instead.
    pub references: Vec<u32>,
    /// Local export specifiers naming this binding.
    pub export_sites: Vec<SpecifierSite>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SpecifierSite {
    pub statement: usize,
    pub specifier: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Introduced by an import specifier.
    Import { statement: usize, specifier: usize },
    /// Introduced by a removable declaration.
    Declaration(DeclarationSite),
    /// Anything else (destructuring, TypeScript enums, ...). Never removed.
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationSite {
    /// Function or class declaration occupying a whole statement.
    Statement { statement: usize },
    /// One declarator of a variable declaration statement.
    Declarator {
        statement: usize,
        index: usize,
        total: usize,
    },
}

/// Removals to apply to one tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditPlan {
    statements: BTreeSet<usize>,
    declarators: BTreeMap<usize, BTreeSet<usize>>,
    export_specifiers: BTreeMap<usize, BTreeSet<usize>>,
    import_specifiers: BTreeMap<usize, BTreeSet<usize>>,
}

impl EditPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
            && self.declarators.is_empty()
            && self.export_specifiers.is_empty()
            && self.import_specifiers.is_empty()
    }

    /// Remove a whole statement. Returns false if it was already removed.
    pub fn remove_statement(&mut self, statement: usize) -> bool {
        self.statements.insert(statement)
    }

    /// Remove one declarator out of `total`. Returns true when the declaration became empty,
    /// in which case the statement itself is removed.
    pub fn remove_declarator(&mut self, statement: usize, index: usize, total: usize) -> bool {
        remove_child(
            &mut self.statements,
            &mut self.declarators,
            statement,
            index,
            total,
        )
    }

    /// Remove one export specifier out of `total`. Returns true when the list became empty.
    pub fn remove_export_specifier(
        &mut self,
        statement: usize,
        specifier: usize,
        total: usize,
    ) -> bool {
        remove_child(
            &mut self.statements,
            &mut self.export_specifiers,
            statement,
            specifier,
            total,
        )
    }

    /// Remove one import specifier out of `total`. Returns true when the declaration became
    /// empty.
    pub fn remove_import_specifier(
        &mut self,
        statement: usize,
        specifier: usize,
        total: usize,
    ) -> bool {
        remove_child(
            &mut self.statements,
            &mut self.import_specifiers,
            statement,
            specifier,
            total,
        )
    }

    pub fn is_statement_removed(&self, statement: usize) -> bool {
        self.statements.contains(&statement)
    }

    pub fn is_declarator_removed(&self, statement: usize, index: usize) -> bool {
        self.is_statement_removed(statement) || contains(&self.declarators, statement, index)
    }

    pub fn is_export_specifier_removed(&self, site: SpecifierSite) -> bool {
        self.is_statement_removed(site.statement)
            || contains(&self.export_specifiers, site.statement, site.specifier)
    }

    pub fn is_import_specifier_removed(&self, statement: usize, specifier: usize) -> bool {
        self.is_statement_removed(statement)
            || contains(&self.import_specifiers, statement, specifier)
    }

    /// Whether `site` is gone, whichever way it was declared.
    pub fn is_declaration_removed(&self, site: DeclarationSite) -> bool {
        match site {
            DeclarationSite::Statement { statement } => self.is_statement_removed(statement),
            DeclarationSite::Declarator {
                statement, index, ..
            } => self.is_declarator_removed(statement, index),
        }
    }

    pub fn statements(&self) -> impl Iterator<Item = usize> + '_ {
        self.statements.iter().copied()
    }

    /// Declarator removals inside statements that are kept.
    pub fn declarators(&self) -> impl Iterator<Item = (usize, &BTreeSet<usize>)> + '_ {
        self.partial(&self.declarators)
    }

    pub fn export_specifiers(&self) -> impl Iterator<Item = (usize, &BTreeSet<usize>)> + '_ {
        self.partial(&self.export_specifiers)
    }

    pub fn import_specifiers(&self) -> impl Iterator<Item = (usize, &BTreeSet<usize>)> + '_ {
        self.partial(&self.import_specifiers)
    }

    /// Number of individual removals, for reporting.
    pub fn len(&self) -> usize {
        self.statements.len()
            + self.declarators().map(|(_, set)| set.len()).sum::<usize>()
            + self.export_specifiers().map(|(_, set)| set.len()).sum::<usize>()
            + self.import_specifiers().map(|(_, set)| set.len()).sum::<usize>()
    }

    fn partial<'a>(
        &'a self,
        map: &'a BTreeMap<usize, BTreeSet<usize>>,
    ) -> impl Iterator<Item = (usize, &'a BTreeSet<usize>)> + 'a {
        map.iter()
            .filter(|(statement, _)| !self.statements.contains(statement))
            .map(|(statement, set)| (*statement, set))
    }
}

fn remove_child(
    statements: &mut BTreeSet<usize>,
    children: &mut BTreeMap<usize, BTreeSet<usize>>,
    statement: usize,
    index: usize,
    total: usize,
) -> bool {
    let removed = children.entry(statement).or_default();
    removed.insert(index);
    if removed.len() >= total {
        statements.insert(statement);
        true
    } else {
        false
    }
}

fn contains(map: &BTreeMap<usize, BTreeSet<usize>>, statement: usize, index: usize) -> bool {
    map.get(&statement).is_some_and(|set| set.contains(&index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removing_every_child_removes_the_statement() {
        let mut plan = EditPlan::new();
        assert!(!plan.remove_export_specifier(3, 0, 2));
        assert!(!plan.is_statement_removed(3));
        assert!(plan.remove_export_specifier(3, 1, 2));
        assert!(plan.is_statement_removed(3));

        // Children of removed statements are not reported separately.
        assert_eq!(plan.export_specifiers().count(), 0);
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn removal_queries_see_through_statement_removal() {
        let mut plan = EditPlan::new();
        plan.remove_statement(1);
        assert!(plan.is_declarator_removed(1, 4));
        assert!(plan.is_import_specifier_removed(1, 0));
        assert!(plan.is_export_specifier_removed(SpecifierSite {
            statement: 1,
            specifier: 7
        }));
        assert!(!plan.is_declarator_removed(2, 0));
    }

    #[test]
    fn partial_removals_are_listed_per_statement() {
        let mut plan = EditPlan::new();
        plan.remove_declarator(0, 2, 3);
        plan.remove_import_specifier(4, 0, 2);
        let declarators: Vec<_> = plan.declarators().collect();
        assert_eq!(declarators.len(), 1);
        assert_eq!(declarators[0].0, 0);
        assert!(declarators[0].1.contains(&2));
        assert_eq!(plan.len(), 2);
        assert!(!plan.is_empty());
    }

    #[test]
    fn ranges_are_half_open() {
        let range = TextRange::new(4, 8);
        assert!(range.contains(4));
        assert!(range.contains(7));
        assert!(!range.contains(8));
    }
}
